//! Printer outputs.
//!
//! Thermal printers accept raw ESC/POS either on a network port (9100) or
//! through a device node such as `/dev/usb/lp0`. Writing to a regular file
//! is the same operation, which also makes receipts easy to inspect.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

use arca_core::{Error, Result};

/// Default raw printing port.
pub const RAW_PORT: u16 = 9100;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Destination for rendered documents.
#[async_trait]
pub trait PrinterSink: Send {
    /// Sends one job.
    async fn send(&mut self, job_name: &str, bytes: &[u8]) -> Result<()>;

    /// Human-readable destination, for logs.
    fn describe(&self) -> String;
}

/// Raw TCP printer.
#[derive(Debug, Clone)]
pub struct TcpSink {
    addr: String,
    timeout: Duration,
}

impl TcpSink {
    /// Sink for `host:port`.
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            timeout: CONNECT_TIMEOUT,
        }
    }

    /// Overrides the connect/write timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

fn io_error(addr: &str, e: std::io::Error) -> Error {
    Error::io_with_path(e, addr)
}

#[async_trait]
impl PrinterSink for TcpSink {
    async fn send(&mut self, job_name: &str, bytes: &[u8]) -> Result<()> {
        let timed_out =
            || std::io::Error::new(std::io::ErrorKind::TimedOut, "printer did not respond");

        let mut stream = tokio::time::timeout(self.timeout, TcpStream::connect(&self.addr))
            .await
            .map_err(|_| io_error(&self.addr, timed_out()))?
            .map_err(|e| io_error(&self.addr, e))?;

        tokio::time::timeout(self.timeout, async {
            stream.write_all(bytes).await?;
            stream.flush().await?;
            stream.shutdown().await
        })
        .await
        .map_err(|_| io_error(&self.addr, timed_out()))?
        .map_err(|e| io_error(&self.addr, e))?;

        tracing::info!(job = job_name, printer = %self.addr, bytes = bytes.len(), "job sent");
        Ok(())
    }

    fn describe(&self) -> String {
        format!("tcp://{}", self.addr)
    }
}

/// Device node or file.
#[derive(Debug, Clone)]
pub struct FileSink {
    path: PathBuf,
}

impl FileSink {
    /// Sink writing to `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl PrinterSink for FileSink {
    async fn send(&mut self, job_name: &str, bytes: &[u8]) -> Result<()> {
        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&self.path)
            .await
            .map_err(|e| Error::io_with_path(e, &self.path))?;
        file.write_all(bytes)
            .await
            .map_err(|e| Error::io_with_path(e, &self.path))?;
        file.flush()
            .await
            .map_err(|e| Error::io_with_path(e, &self.path))?;

        tracing::info!(job = job_name, printer = %self.path.display(), bytes = bytes.len(), "job sent");
        Ok(())
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Parsed printer destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrinterTarget {
    /// `tcp://host[:port]`
    Tcp(String),
    /// Anything else is a path
    File(PathBuf),
}

impl PrinterTarget {
    /// Parses `tcp://host[:port]` (port defaults to 9100) or a path.
    pub fn parse(target: &str) -> Result<Self> {
        let target = target.trim();
        if target.is_empty() {
            return Err(Error::config("printer target is empty"));
        }
        match target.strip_prefix("tcp://") {
            Some(rest) => {
                let rest = rest.trim_end_matches('/');
                if rest.is_empty() {
                    return Err(Error::config(format!("'{target}' has no host")));
                }
                // `[v6]` hosts carry colons of their own; the port follows `]`.
                let port = match rest.strip_prefix('[') {
                    Some(bracketed) => {
                        let (_, after) = bracketed.split_once(']').ok_or_else(|| {
                            Error::config(format!("'{target}' has an unclosed '['"))
                        })?;
                        match after {
                            "" => None,
                            _ => Some(after.strip_prefix(':').ok_or_else(|| {
                                Error::config(format!("'{target}' has an invalid port"))
                            })?),
                        }
                    }
                    None => rest.rsplit_once(':').map(|(_, port)| port),
                };
                let addr = match port {
                    Some(port) => {
                        port.parse::<u16>().map_err(|_| {
                            Error::config(format!("'{target}' has an invalid port"))
                        })?;
                        rest.to_string()
                    }
                    None => format!("{rest}:{RAW_PORT}"),
                };
                Ok(Self::Tcp(addr))
            }
            None => Ok(Self::File(PathBuf::from(target))),
        }
    }

    /// Opens the sink for this target.
    pub fn into_sink(self) -> Box<dyn PrinterSink> {
        match self {
            Self::Tcp(addr) => Box::new(TcpSink::new(addr)),
            Self::File(path) => Box::new(FileSink::new(path)),
        }
    }
}
