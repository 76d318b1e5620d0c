//! arca-wsaa: access tickets for AFIP/ARCA web services.
//!
//! A ticket request (TRA) is built, signed as CMS with the issuer's
//! certificate, and exchanged at WSAA's `loginCms` for a token and sign
//! pair. Tickets last 12 hours and are cached until shortly before expiry.
//!
//! # Modules
//!
//! - [`request`]: `loginTicketRequest` construction
//! - [`signer`]: CMS signing through `openssl smime`
//! - [`ticket`]: Ticket parsing and the `Credentials` triple
//! - [`cache`]: In-memory and file-backed ticket cache
//! - [`client`]: `WsaaClient` and the `TicketProvider` seam

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cache;
pub mod client;
pub mod request;
pub mod signer;
pub mod ticket;

pub use cache::TicketCache;
pub use client::{StaticCredentials, TicketProvider, WsaaClient};
pub use request::{TicketRequest, WSFE_SERVICE};
pub use signer::{CmsSigner, OpensslSigner};
pub use ticket::{Credentials, LoginTicket};
