//! Layered configuration.
//!
//! Values come from, in increasing priority:
//! 1. Built-in defaults
//! 2. A TOML file (`--config`, `$ARCA_CONFIG`, or the platform config dir)
//! 3. `ARCA_*` environment variables
//!
//! ```toml
//! [issuer]
//! cuit = "20291687297"
//! point_of_sale = 9
//! business_name = "Schiro Diego Raul"
//!
//! [afip]
//! environment = "production"
//! cert_path = "certificados/certificado.crt"
//! key_path = "certificados/private.key"
//!
//! [printer]
//! target = "tcp://192.168.0.50:9100"
//! paper_width_mm = 80
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::fiscal::{Cuit, PointOfSale};
use crate::{Error, Result};

// ============================================================================
// ConfigManager
// ============================================================================

/// Load/save behaviour shared by configuration types.
pub trait ConfigManager: Default + Serialize + DeserializeOwned {
    /// Project name used for the config directory and messages.
    fn project_name() -> &'static str;

    /// Environment variable that can point at the config file.
    fn config_env_var() -> &'static str;

    /// Default config file location for this platform.
    fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(Self::project_name()).join("config.toml"))
    }

    /// Resolves the config path: explicit argument, then env var, then default.
    fn resolve_config_path(explicit: Option<&str>) -> Option<PathBuf> {
        if let Some(path) = explicit {
            return Some(PathBuf::from(path));
        }
        if let Ok(path) = std::env::var(Self::config_env_var()) {
            if !path.is_empty() {
                return Some(PathBuf::from(path));
            }
        }
        Self::default_config_path()
    }

    /// Applies overrides from a key lookup (normally the process environment).
    fn apply_overrides(&mut self, _lookup: &dyn Fn(&str) -> Option<String>) -> Result<()> {
        Ok(())
    }

    /// Loads the config file (defaults when it does not exist) and applies
    /// environment overrides.
    fn load(config_path: Option<&str>) -> Result<Self> {
        let mut config = match Self::resolve_config_path(config_path) {
            Some(path) if path.exists() => Self::from_file(&path)?,
            Some(path) => {
                tracing::debug!(path = %path.display(), "config file not found, using defaults");
                Self::default()
            }
            None => Self::default(),
        };
        config.apply_overrides(&|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Parses a TOML file.
    fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::io_with_path(e, path))?;
        toml::from_str(&content)
            .map_err(|e| Error::config(format!("Failed to parse {}: {e}", path.display())))
    }

    /// Serializes to pretty TOML.
    fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::config(e.to_string()))
    }

    /// Flattens the config into `KEY=value` pairs.
    fn to_env_vars(&self) -> Result<Vec<(String, String)>>;
}

// ============================================================================
// Environment
// ============================================================================

/// AFIP environment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Homologación (testing)
    #[default]
    Homologation,
    /// Producción
    Production,
}

impl Environment {
    /// WSAA `LoginCms` endpoint.
    pub fn wsaa_url(&self) -> &'static str {
        match self {
            Self::Homologation => "https://wsaahomo.afip.gov.ar/ws/services/LoginCms",
            Self::Production => "https://wsaa.afip.gov.ar/ws/services/LoginCms",
        }
    }

    /// WSFEv1 endpoint.
    pub fn wsfe_url(&self) -> &'static str {
        match self {
            Self::Homologation => "https://wswhomo.afip.gov.ar/wsfev1/service.asmx",
            Self::Production => "https://servicios1.afip.gov.ar/wsfev1/service.asmx",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Homologation => write!(f, "homologation"),
            Self::Production => write!(f, "production"),
        }
    }
}

impl FromStr for Environment {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "homologation" | "homologacion" | "homologación" | "homo" | "testing" => {
                Ok(Self::Homologation)
            }
            "production" | "produccion" | "producción" | "prod" => Ok(Self::Production),
            other => Err(Error::config(format!("unknown environment '{other}'"))),
        }
    }
}

// ============================================================================
// Sections
// ============================================================================

/// `[issuer]`: the business issuing vouchers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IssuerConfig {
    /// Issuer CUIT, 11 digits
    pub cuit: String,
    /// Point of sale registered with AFIP
    pub point_of_sale: u32,
    /// Razón social
    pub business_name: String,
    /// Street address printed on receipts
    pub address: String,
    /// VAT condition printed on receipts
    pub vat_condition: String,
    /// Optional slogan printed under the header
    pub tagline: Option<String>,
}

impl Default for IssuerConfig {
    fn default() -> Self {
        Self {
            cuit: String::new(),
            point_of_sale: 1,
            business_name: String::new(),
            address: String::new(),
            vat_condition: "Responsable Inscripto".to_string(),
            tagline: None,
        }
    }
}

impl IssuerConfig {
    /// Parsed issuer CUIT.
    pub fn cuit(&self) -> Result<Cuit> {
        Cuit::parse(&self.cuit)
    }

    /// Parsed point of sale.
    pub fn point_of_sale(&self) -> Result<PointOfSale> {
        PointOfSale::new(self.point_of_sale)
    }
}

/// `[afip]`: web service access.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AfipConfig {
    /// Homologation or production
    pub environment: Environment,
    /// X.509 certificate issued by AFIP (PEM)
    pub cert_path: PathBuf,
    /// Private key for the certificate (PEM)
    pub key_path: PathBuf,
    /// Explicit `openssl` binary; `PATH` is searched when unset
    pub openssl_path: Option<PathBuf>,
    /// File where access tickets are cached between runs
    pub token_cache: Option<PathBuf>,
    /// HTTP timeout in seconds
    pub timeout_secs: u64,
    /// Skip TLS certificate verification
    pub accept_invalid_certs: bool,
    /// Override for the WSAA endpoint
    pub wsaa_url: Option<String>,
    /// Override for the WSFEv1 endpoint
    pub wsfe_url: Option<String>,
}

impl Default for AfipConfig {
    fn default() -> Self {
        Self {
            environment: Environment::default(),
            cert_path: PathBuf::from("certificados/certificado.crt"),
            key_path: PathBuf::from("certificados/private.key"),
            openssl_path: None,
            token_cache: None,
            timeout_secs: 60,
            accept_invalid_certs: false,
            wsaa_url: None,
            wsfe_url: None,
        }
    }
}

impl AfipConfig {
    /// Effective WSAA endpoint.
    pub fn wsaa_url(&self) -> &str {
        self.wsaa_url
            .as_deref()
            .unwrap_or_else(|| self.environment.wsaa_url())
    }

    /// Effective WSFEv1 endpoint.
    pub fn wsfe_url(&self) -> &str {
        self.wsfe_url
            .as_deref()
            .unwrap_or_else(|| self.environment.wsfe_url())
    }

    /// HTTP timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// `[printer]`: thermal printer output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrinterConfig {
    /// `tcp://host:port` or a device/file path
    pub target: Option<String>,
    /// Display name used on test pages
    pub name: Option<String>,
    /// 80 or 58; other values are taken as a column count
    pub paper_width_mm: u16,
    /// Print the fiscal QR on authorized receipts
    pub print_qr: bool,
}

impl Default for PrinterConfig {
    fn default() -> Self {
        Self {
            target: None,
            name: None,
            paper_width_mm: 80,
            print_qr: true,
        }
    }
}

// ============================================================================
// ArcaConfig
// ============================================================================

/// Complete configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArcaConfig {
    /// Issuer data
    pub issuer: IssuerConfig,
    /// Web service access
    pub afip: AfipConfig,
    /// Printer output
    pub printer: PrinterConfig,
}

impl ArcaConfig {
    /// Lists every configuration problem found.
    ///
    /// Missing certificate files are reported too, since authentication
    /// cannot work without them.
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();

        if let Err(e) = self.issuer.cuit() {
            problems.push(format!("issuer.cuit: {e}"));
        }
        if let Err(e) = self.issuer.point_of_sale() {
            problems.push(format!("issuer.point_of_sale: {e}"));
        }
        if self.issuer.business_name.trim().chars().count() < 3 {
            problems.push(format!(
                "issuer.business_name: '{}' is too short",
                self.issuer.business_name
            ));
        }
        if !self.afip.cert_path.exists() {
            problems.push(format!(
                "afip.cert_path: certificate not found at {}",
                self.afip.cert_path.display()
            ));
        }
        if !self.afip.key_path.exists() {
            problems.push(format!(
                "afip.key_path: private key not found at {}",
                self.afip.key_path.display()
            ));
        }
        if self.afip.timeout_secs == 0 {
            problems.push("afip.timeout_secs: must be greater than zero".to_string());
        }

        problems
    }
}

fn parse_override<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| Error::config(format!("{key}: cannot parse '{value}'")))
}

impl ConfigManager for ArcaConfig {
    fn project_name() -> &'static str {
        "arca-pos"
    }

    fn config_env_var() -> &'static str {
        "ARCA_CONFIG"
    }

    fn apply_overrides(&mut self, lookup: &dyn Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(v) = lookup("ARCA_CUIT") {
            self.issuer.cuit = v;
        }
        if let Some(v) = lookup("ARCA_POINT_OF_SALE") {
            self.issuer.point_of_sale = parse_override("ARCA_POINT_OF_SALE", &v)?;
        }
        if let Some(v) = lookup("ARCA_ENVIRONMENT") {
            self.afip.environment = v.parse()?;
        }
        if let Some(v) = lookup("ARCA_CERT_PATH") {
            self.afip.cert_path = PathBuf::from(v);
        }
        if let Some(v) = lookup("ARCA_KEY_PATH") {
            self.afip.key_path = PathBuf::from(v);
        }
        if let Some(v) = lookup("ARCA_OPENSSL") {
            self.afip.openssl_path = Some(PathBuf::from(v));
        }
        if let Some(v) = lookup("ARCA_PRINTER") {
            self.printer.target = Some(v);
        }
        Ok(())
    }

    fn to_env_vars(&self) -> Result<Vec<(String, String)>> {
        let mut vars = vec![
            ("ARCA_CUIT".to_string(), self.issuer.cuit.clone()),
            (
                "ARCA_POINT_OF_SALE".to_string(),
                self.issuer.point_of_sale.to_string(),
            ),
            (
                "ARCA_ENVIRONMENT".to_string(),
                self.afip.environment.to_string(),
            ),
            (
                "ARCA_CERT_PATH".to_string(),
                self.afip.cert_path.display().to_string(),
            ),
            (
                "ARCA_KEY_PATH".to_string(),
                self.afip.key_path.display().to_string(),
            ),
        ];
        if let Some(openssl) = &self.afip.openssl_path {
            vars.push(("ARCA_OPENSSL".to_string(), openssl.display().to_string()));
        }
        if let Some(target) = &self.printer.target {
            vars.push(("ARCA_PRINTER".to_string(), target.clone()));
        }
        Ok(vars)
    }
}
