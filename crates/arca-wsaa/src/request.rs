//! Login ticket request (TRA).

use chrono::{DateTime, Duration, SecondsFormat, Utc};

use arca_core::soap::escape;

/// Service name for electronic invoicing.
pub const WSFE_SERVICE: &str = "wsfe";

/// How far back `generationTime` is set to absorb clock skew with WSAA.
pub const CLOCK_SKEW_MARGIN: Duration = Duration::minutes(10);

/// Lifetime requested for the ticket.
pub const TICKET_LIFETIME: Duration = Duration::hours(12);

/// A `loginTicketRequest` document, signed and sent to `loginCms`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TicketRequest {
    /// Request id; Unix seconds at creation
    pub unique_id: u32,
    /// Start of validity
    pub generation_time: DateTime<Utc>,
    /// End of validity
    pub expiration_time: DateTime<Utc>,
    /// Target service (`wsfe`)
    pub service: String,
}

impl TicketRequest {
    /// Builds a request for `service` valid from shortly before `now` for 12 hours.
    pub fn new(service: impl Into<String>, now: DateTime<Utc>) -> Self {
        let unique_id = u32::try_from(now.timestamp()).unwrap_or(u32::MAX);
        Self {
            unique_id,
            generation_time: now - CLOCK_SKEW_MARGIN,
            expiration_time: now + TICKET_LIFETIME,
            service: service.into(),
        }
    }

    /// Renders the XML document to be signed.
    pub fn to_xml(&self) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?><loginTicketRequest version="1.0"><header><uniqueId>{}</uniqueId><generationTime>{}</generationTime><expirationTime>{}</expirationTime></header><service>{}</service></loginTicketRequest>"#,
            self.unique_id,
            self.generation_time.to_rfc3339_opts(SecondsFormat::Secs, false),
            self.expiration_time.to_rfc3339_opts(SecondsFormat::Secs, false),
            escape(&self.service),
        )
    }
}
