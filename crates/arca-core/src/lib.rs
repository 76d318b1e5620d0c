//! arca-core: shared types, errors, configuration, and SOAP plumbing.
//!
//! This crate has no internal arca dependencies. The web-service clients
//! (`arca-wsaa`, `arca-wsfe`), the QR builder and the receipt printer all
//! build on the invoice model defined here.
//!
//! # Modules
//!
//! - [`error`]: Error type and Result alias
//! - [`fiscal`]: CUIT, points of sale, voucher/document types, VAT rates
//! - [`money`]: Fixed-point amounts and quantities
//! - [`invoice`]: Invoice model and totals
//! - [`config`]: Layered TOML + environment configuration
//! - [`soap`] / [`xml`]: SOAP 1.1 transport and response parsing
//!
//! ```
//! use arca_core::{Amount, Cuit};
//!
//! let cuit: Cuit = "20-29168729-7".parse().unwrap();
//! assert_eq!(cuit.digits(), "20291687297");
//!
//! let total: Amount = "1210".parse().unwrap();
//! assert_eq!(total.grouped(), "1,210.00");
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod fiscal;
pub mod invoice;
pub mod money;
pub mod soap;
pub mod xml;

// Re-export key types at crate root for convenience
pub use config::{AfipConfig, ArcaConfig, ConfigManager, Environment, IssuerConfig, PrinterConfig};
pub use error::{Error, Result, ServiceError};
pub use fiscal::{
    Cuit, DocumentType, PointOfSale, Recipient, VatRate, VoucherNumber, VoucherType,
};
pub use invoice::{AssociatedVoucher, Authorization, FiscalAmounts, Invoice, InvoiceLine, VatLine};
pub use money::{Amount, Quantity};
