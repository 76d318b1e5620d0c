//! SOAP 1.1 transport shared by the WSAA and WSFEv1 clients.

use std::time::Duration;

use crate::config::AfipConfig;
use crate::xml::XmlNode;
use crate::{Error, Result};

const ENVELOPE_NS: &str = "http://schemas.xmlsoap.org/soap/envelope/";

/// Wraps a body fragment in a SOAP 1.1 envelope.
pub fn envelope(body: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><soapenv:Envelope xmlns:soapenv="{ENVELOPE_NS}"><soapenv:Header/><soapenv:Body>{body}</soapenv:Body></soapenv:Envelope>"#
    )
}

/// Escapes text for use inside an XML element.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            other => out.push(other),
        }
    }
    out
}

/// Posts SOAP envelopes and returns the parsed `Body` element.
#[derive(Debug, Clone)]
pub struct SoapTransport {
    client: reqwest::Client,
}

impl SoapTransport {
    /// Builds a transport with the given timeout.
    pub fn new(timeout: Duration, accept_invalid_certs: bool) -> Result<Self> {
        if accept_invalid_certs {
            tracing::warn!("TLS certificate verification is disabled");
        }
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .danger_accept_invalid_certs(accept_invalid_certs)
            .build()?;
        Ok(Self { client })
    }

    /// Builds a transport from the `[afip]` section.
    pub fn from_config(config: &AfipConfig) -> Result<Self> {
        Self::new(config.timeout(), config.accept_invalid_certs)
    }

    /// Sends `body` inside an envelope and returns the response `Body`.
    ///
    /// A `Fault` in the response becomes [`Error::Soap`], as does a
    /// non-success status without a parseable fault.
    pub async fn call(&self, url: &str, action: &str, body: &str) -> Result<XmlNode> {
        tracing::debug!(url, action, "sending SOAP request");

        let response = self
            .client
            .post(url)
            .header("Content-Type", "text/xml; charset=utf-8")
            .header("SOAPAction", format!("\"{action}\""))
            .body(envelope(body))
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        tracing::trace!(%status, bytes = text.len(), "SOAP response received");

        let parsed = XmlNode::parse(&text);
        let root = match parsed {
            Ok(root) => root,
            Err(e) if status.is_success() => return Err(e),
            Err(_) => {
                return Err(Error::Soap {
                    code: status.as_u16().to_string(),
                    message: status
                        .canonical_reason()
                        .unwrap_or("unexpected HTTP status")
                        .to_string(),
                });
            }
        };

        if let Some(fault) = root.find("Fault") {
            let code = fault.child_text("faultcode").unwrap_or_default().to_string();
            let message = fault
                .child_text("faultstring")
                .unwrap_or_default()
                .to_string();
            tracing::warn!(%code, %message, "SOAP fault");
            return Err(Error::Soap { code, message });
        }

        if !status.is_success() {
            return Err(Error::Soap {
                code: status.as_u16().to_string(),
                message: format!("HTTP {status} without a SOAP fault"),
            });
        }

        root.find("Body")
            .filter(|_| root.name == "Envelope")
            .cloned()
            .ok_or_else(|| Error::xml("response is not a SOAP envelope"))
    }
}
