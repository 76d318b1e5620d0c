//! Access tickets returned by `loginCms`.

use std::fmt;

use chrono::{DateTime, Duration, FixedOffset};
use serde::{Deserialize, Serialize};

use arca_core::xml::XmlNode;
use arca_core::{Cuit, Error, Result};

use crate::request::TICKET_LIFETIME;

/// A parsed `loginTicketResponse`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginTicket {
    /// Session token
    pub token: String,
    /// Signature over the token
    pub sign: String,
    /// Start of validity
    pub generation_time: DateTime<FixedOffset>,
    /// End of validity
    pub expiration_time: DateTime<FixedOffset>,
}

// Token and sign are credentials; keep them out of logs.
impl fmt::Debug for LoginTicket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginTicket")
            .field("token", &"<redacted>")
            .field("sign", &"<redacted>")
            .field("generation_time", &self.generation_time)
            .field("expiration_time", &self.expiration_time)
            .finish()
    }
}

impl LoginTicket {
    /// Parses the document carried inside `loginCmsReturn`.
    pub fn parse(document: &str) -> Result<Self> {
        let root = XmlNode::parse(document)?;
        let credentials = root
            .find("credentials")
            .ok_or_else(|| Error::missing_field("credentials"))?;
        let token = credentials.require_text("token")?.to_string();
        let sign = credentials.require_text("sign")?.to_string();

        let header = root
            .find("header")
            .ok_or_else(|| Error::missing_field("header"))?;
        let generation_time = parse_time(header.require_text("generationTime")?)?;
        let expiration_time = match header.child_text("expirationTime") {
            Some(text) if !text.is_empty() => parse_time(text)?,
            _ => generation_time + TICKET_LIFETIME,
        };

        Ok(Self {
            token,
            sign,
            generation_time,
            expiration_time,
        })
    }

    /// Whether the ticket is still usable at `now`, keeping `margin` in reserve.
    pub fn is_valid_at(&self, now: DateTime<FixedOffset>, margin: Duration) -> bool {
        now + margin < self.expiration_time
    }

    /// Binds the ticket to the CUIT that will use it.
    pub fn credentials(&self, cuit: Cuit) -> Credentials {
        Credentials {
            token: self.token.clone(),
            sign: self.sign.clone(),
            cuit,
        }
    }
}

fn parse_time(text: &str) -> Result<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(text)
        .map_err(|e| Error::xml(format!("invalid ticket time '{text}': {e}")))
}

/// The `Auth` triple sent with every WSFEv1 call.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Session token
    pub token: String,
    /// Signature over the token
    pub sign: String,
    /// Issuer CUIT
    pub cuit: Cuit,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("token", &"<redacted>")
            .field("sign", &"<redacted>")
            .field("cuit", &self.cuit)
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use super::*;

    pub(crate) const TICKET_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<loginTicketResponse version="1.0">
    <header>
        <source>CN=wsaahomo, O=AFIP, C=AR, SERIALNUMBER=CUIT 33693450239</source>
        <destination>SERIALNUMBER=CUIT 20291687297, CN=pos</destination>
        <uniqueId>1757001600</uniqueId>
        <generationTime>2025-09-04T12:50:00.512-03:00</generationTime>
        <expirationTime>2025-09-05T00:50:00.512-03:00</expirationTime>
    </header>
    <credentials>
        <token>PD94bWwgdmVyc2lvbj0iMS4wIj8+</token>
        <sign>aXRzIGEgc2lnbmF0dXJl</sign>
    </credentials>
</loginTicketResponse>"#;

    #[test]
    fn test_parse_ticket() {
        let ticket = LoginTicket::parse(TICKET_XML).unwrap();
        assert_eq!(ticket.token, "PD94bWwgdmVyc2lvbj0iMS4wIj8+");
        assert_eq!(ticket.sign, "aXRzIGEgc2lnbmF0dXJl");
        assert_eq!(
            ticket.expiration_time - ticket.generation_time,
            Duration::hours(12)
        );
    }

    #[test]
    fn test_missing_sign() {
        let xml = TICKET_XML.replace("<sign>aXRzIGEgc2lnbmF0dXJl</sign>", "");
        let err = LoginTicket::parse(&xml).unwrap_err();
        let Error::MissingField { field } = err else {
            unreachable!("Expected MissingField error variant");
        };
        assert_eq!(field, "credentials/sign");
    }

    #[test]
    fn test_missing_token() {
        let xml = TICKET_XML.replace("<token>PD94bWwgdmVyc2lvbj0iMS4wIj8+</token>", "<token/>");
        assert!(matches!(
            LoginTicket::parse(&xml),
            Err(Error::MissingField { .. })
        ));
    }

    #[test]
    fn test_missing_expiration_defaults_to_twelve_hours() {
        let xml = TICKET_XML.replace(
            "<expirationTime>2025-09-05T00:50:00.512-03:00</expirationTime>",
            "",
        );
        let ticket = LoginTicket::parse(&xml).unwrap();
        assert_eq!(
            ticket.expiration_time,
            ticket.generation_time + Duration::hours(12)
        );
    }

    #[test]
    fn test_validity_margin() {
        let ticket = LoginTicket::parse(TICKET_XML).unwrap();
        let near_end = ticket.expiration_time - Duration::minutes(5);
        assert!(ticket.is_valid_at(near_end, Duration::zero()));
        assert!(!ticket.is_valid_at(near_end, Duration::minutes(10)));
    }

    #[test]
    fn test_debug_redacts_credentials() {
        let ticket = LoginTicket::parse(TICKET_XML).unwrap();
        let rendered = format!("{ticket:?}");
        assert!(!rendered.contains("PD94bWwg"));
        let creds = ticket.credentials(Cuit::parse("20291687297").unwrap());
        assert!(!format!("{creds:?}").contains("aXRzIGEg"));
    }
}
