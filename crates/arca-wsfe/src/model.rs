//! WSFEv1 results.

use std::fmt;

use chrono::NaiveDate;
use serde::Serialize;

use arca_core::Authorization;

/// Result of `FEDummy`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerStatus {
    /// `AppServer`
    pub app: String,
    /// `DbServer`
    pub db: String,
    /// `AuthServer`
    pub auth: String,
}

impl ServerStatus {
    /// Whether all three servers report `OK`.
    pub fn is_ok(&self) -> bool {
        [&self.app, &self.db, &self.auth]
            .iter()
            .all(|s| s.eq_ignore_ascii_case("ok"))
    }
}

impl fmt::Display for ServerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "app={} db={} auth={}", self.app, self.db, self.auth)
    }
}

/// An `Obs` or `Evt` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Observation {
    /// Numeric code
    pub code: i64,
    /// Message, verbatim
    pub message: String,
}

impl fmt::Display for Observation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

/// What AFIP decided about a voucher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum AuthorizationOutcome {
    /// `Resultado = A`
    Approved {
        /// Authorization code
        cae: String,
        /// Last day the CAE is valid
        expires_on: NaiveDate,
        /// Observations attached to an approval
        observations: Vec<Observation>,
    },
    /// Any other `Resultado`
    Rejected {
        /// Reasons given by AFIP
        observations: Vec<Observation>,
    },
}

impl AuthorizationOutcome {
    /// Authorization to store on the invoice, when approved.
    pub fn authorization(&self) -> Option<Authorization> {
        match self {
            Self::Approved {
                cae, expires_on, ..
            } => Some(Authorization {
                cae: cae.clone(),
                expires_on: *expires_on,
            }),
            Self::Rejected { .. } => None,
        }
    }

    /// Whether the voucher was approved.
    pub fn is_approved(&self) -> bool {
        matches!(self, Self::Approved { .. })
    }

    /// Observations in either case.
    pub fn observations(&self) -> &[Observation] {
        match self {
            Self::Approved { observations, .. } | Self::Rejected { observations } => observations,
        }
    }
}
