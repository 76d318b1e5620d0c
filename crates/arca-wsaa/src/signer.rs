//! CMS signing of ticket requests.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use arca_core::{AfipConfig, Error, Result};

/// How long the signing tool may run.
pub const SIGNING_TIMEOUT: Duration = Duration::from_secs(30);

/// Produces a CMS `SignedData` structure (DER) that embeds the content.
#[async_trait]
pub trait CmsSigner: Send + Sync {
    /// Signs `content` and returns the DER-encoded CMS.
    async fn sign(&self, content: &[u8]) -> Result<Vec<u8>>;
}

/// Signs with the `openssl smime` command.
#[derive(Debug, Clone)]
pub struct OpensslSigner {
    openssl: PathBuf,
    cert_path: PathBuf,
    key_path: PathBuf,
    timeout: Duration,
}

impl OpensslSigner {
    /// Creates a signer using `openssl` from `PATH`.
    pub fn new(cert_path: impl Into<PathBuf>, key_path: impl Into<PathBuf>) -> Self {
        Self {
            openssl: PathBuf::from("openssl"),
            cert_path: cert_path.into(),
            key_path: key_path.into(),
            timeout: SIGNING_TIMEOUT,
        }
    }

    /// Creates a signer from the `[afip]` section.
    pub fn from_config(config: &AfipConfig) -> Self {
        let signer = Self::new(&config.cert_path, &config.key_path);
        match &config.openssl_path {
            Some(path) => signer.with_binary(path),
            None => signer,
        }
    }

    /// Uses an explicit `openssl` binary.
    pub fn with_binary(mut self, openssl: impl Into<PathBuf>) -> Self {
        self.openssl = openssl.into();
        self
    }

    /// Overrides the signing timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Binary that will be executed.
    pub fn binary(&self) -> &Path {
        &self.openssl
    }

    /// Reports `openssl version`, for diagnostics.
    pub async fn version(&self) -> Result<String> {
        let output = tokio::time::timeout(
            self.timeout,
            Command::new(&self.openssl)
                .arg("version")
                .kill_on_drop(true)
                .output(),
        )
        .await
        .map_err(|_| Error::signing("openssl version timed out", ""))?
        .map_err(|e| self.spawn_error(e))?;

        if !output.status.success() {
            return Err(Error::signing(
                format!("openssl version exited with {}", output.status),
                String::from_utf8_lossy(&output.stderr),
            ));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    fn check_files(&self) -> Result<()> {
        if !self.cert_path.exists() {
            return Err(Error::signing(
                format!("certificate not found at {}", self.cert_path.display()),
                "",
            ));
        }
        if !self.key_path.exists() {
            return Err(Error::signing(
                format!("private key not found at {}", self.key_path.display()),
                "",
            ));
        }
        Ok(())
    }

    fn spawn_error(&self, e: std::io::Error) -> Error {
        if e.kind() == std::io::ErrorKind::NotFound {
            Error::signing(
                format!("signing tool '{}' not found", self.openssl.display()),
                "",
            )
        } else {
            Error::signing(
                format!("cannot run '{}': {e}", self.openssl.display()),
                "",
            )
        }
    }
}

#[async_trait]
impl CmsSigner for OpensslSigner {
    async fn sign(&self, content: &[u8]) -> Result<Vec<u8>> {
        self.check_files()?;
        tracing::debug!(openssl = %self.openssl.display(), "signing ticket request");

        let mut child = Command::new(&self.openssl)
            .args(["smime", "-sign", "-signer"])
            .arg(&self.cert_path)
            .arg("-inkey")
            .arg(&self.key_path)
            .args(["-outform", "DER", "-nodetach", "-binary"])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| self.spawn_error(e))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(content)
                .await
                .map_err(|e| Error::signing(format!("cannot write to openssl: {e}"), ""))?;
        }

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| {
                Error::signing(
                    format!("openssl did not finish within {:?}", self.timeout),
                    "",
                )
            })?
            .map_err(|e| Error::signing(format!("openssl failed: {e}"), ""))?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        if !output.status.success() {
            return Err(Error::signing(
                format!("openssl exited with {}", output.status),
                stderr,
            ));
        }
        if output.stdout.is_empty() {
            return Err(Error::signing("openssl produced no signature", stderr));
        }
        Ok(output.stdout)
    }
}
