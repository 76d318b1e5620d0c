//! arca-wsfe: WSFEv1 electronic invoicing.
//!
//! [`WsfeClient`] queries the last authorized number and requests CAEs for
//! invoices, debit notes and credit notes. Credentials come from any
//! [`TicketProvider`](arca_wsaa::TicketProvider), normally a
//! [`WsaaClient`](arca_wsaa::WsaaClient).
//!
//! A rejected voucher is an [`AuthorizationOutcome::Rejected`], not an error.
//! An `Errors` list in the response is surfaced as
//! [`arca_core::Error::Service`] with every entry kept verbatim.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod client;
pub mod model;
pub mod wire;

pub use client::WsfeClient;
pub use model::{AuthorizationOutcome, Observation, ServerStatus};
