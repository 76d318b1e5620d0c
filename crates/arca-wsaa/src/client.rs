//! `loginCms` client.

use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::Utc;
use tokio::sync::Mutex;

use arca_core::soap::SoapTransport;
use arca_core::{ArcaConfig, Cuit, Error, Result};

use crate::cache::TicketCache;
use crate::request::TicketRequest;
use crate::signer::{CmsSigner, OpensslSigner};
use crate::ticket::{Credentials, LoginTicket};

const WSAA_NS: &str = "http://wsaa.view.sua.dvadac.desein.afip.gov";

/// Source of WSFEv1 credentials.
#[async_trait]
pub trait TicketProvider: Send + Sync {
    /// Returns credentials for `service`, logging in if needed.
    async fn credentials(&self, service: &str) -> Result<Credentials>;

    /// Forgets any cached ticket for `service`.
    async fn invalidate(&self, service: &str) -> Result<()>;
}

/// Fixed credentials, for tests and for tickets obtained elsewhere.
#[derive(Debug, Clone)]
pub struct StaticCredentials(pub Credentials);

#[async_trait]
impl TicketProvider for StaticCredentials {
    async fn credentials(&self, _service: &str) -> Result<Credentials> {
        Ok(self.0.clone())
    }

    async fn invalidate(&self, _service: &str) -> Result<()> {
        Ok(())
    }
}

/// WSAA client with ticket caching.
pub struct WsaaClient {
    url: String,
    transport: SoapTransport,
    signer: Arc<dyn CmsSigner>,
    cache: TicketCache,
    cuit: Cuit,
    login_lock: Mutex<()>,
}

impl WsaaClient {
    /// Creates a client.
    pub fn new(
        url: impl Into<String>,
        transport: SoapTransport,
        signer: Arc<dyn CmsSigner>,
        cache: TicketCache,
        cuit: Cuit,
    ) -> Self {
        Self {
            url: url.into(),
            transport,
            signer,
            cache,
            cuit,
            login_lock: Mutex::new(()),
        }
    }

    /// Builds a client with the `openssl` signer and the configured cache file.
    pub fn from_config(config: &ArcaConfig) -> Result<Self> {
        let cuit = config.issuer.cuit()?;
        let cache = match &config.afip.token_cache {
            Some(path) => TicketCache::with_file(path),
            None => TicketCache::in_memory(),
        }
        .scoped(config.afip.environment, cuit);
        Ok(Self::new(
            config.afip.wsaa_url(),
            SoapTransport::from_config(&config.afip)?,
            Arc::new(OpensslSigner::from_config(&config.afip)),
            cache,
            cuit,
        ))
    }

    /// Issuer CUIT bound to the credentials.
    pub fn cuit(&self) -> Cuit {
        self.cuit
    }

    /// Requests a new ticket from WSAA, bypassing the cache, and caches it.
    pub async fn login(&self, service: &str) -> Result<LoginTicket> {
        let request = TicketRequest::new(service, Utc::now());
        tracing::info!(service, unique_id = request.unique_id, "requesting access ticket");

        let cms = self.signer.sign(request.to_xml().as_bytes()).await?;
        let body = format!(
            r#"<wsaa:loginCms xmlns:wsaa="{WSAA_NS}"><wsaa:in0>{}</wsaa:in0></wsaa:loginCms>"#,
            STANDARD.encode(cms)
        );

        let response = self.transport.call(&self.url, "", &body).await?;
        let payload = response
            .find("loginCmsReturn")
            .map(|n| n.text.trim())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| Error::missing_field("loginCmsReturn"))?;

        let ticket = LoginTicket::parse(payload)?;
        tracing::info!(
            service,
            expires = %ticket.expiration_time,
            "access ticket obtained"
        );
        self.cache.store(service, ticket.clone())?;
        Ok(ticket)
    }

    /// Returns a cached ticket or logs in.
    pub async fn ticket(&self, service: &str) -> Result<LoginTicket> {
        if let Some(ticket) = self.cached(service) {
            return Ok(ticket);
        }

        // One login at a time; a concurrent caller may have just refreshed.
        let _guard = self.login_lock.lock().await;
        if let Some(ticket) = self.cached(service) {
            return Ok(ticket);
        }
        self.login(service).await
    }

    fn cached(&self, service: &str) -> Option<LoginTicket> {
        let ticket = self.cache.get(service, Utc::now().fixed_offset())?;
        tracing::debug!(service, expires = %ticket.expiration_time, "using cached access ticket");
        Some(ticket)
    }
}

#[async_trait]
impl TicketProvider for WsaaClient {
    async fn credentials(&self, service: &str) -> Result<Credentials> {
        Ok(self.ticket(service).await?.credentials(self.cuit))
    }

    async fn invalidate(&self, service: &str) -> Result<()> {
        self.cache.remove(service)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::time::Duration as StdDuration;

    use arca_core::soap::escape;
    use chrono::{DateTime, Duration, SecondsFormat};
    use wiremock::matchers::{body_string_contains, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct FakeSigner;

    #[async_trait]
    impl CmsSigner for FakeSigner {
        async fn sign(&self, content: &[u8]) -> Result<Vec<u8>> {
            assert!(content.starts_with(b"<?xml"));
            Ok(b"fake-cms".to_vec())
        }
    }

    struct FailingSigner;

    #[async_trait]
    impl CmsSigner for FailingSigner {
        async fn sign(&self, _content: &[u8]) -> Result<Vec<u8>> {
            Err(Error::signing("openssl exited with status 1", "unable to load key"))
        }
    }

    fn ticket_xml(generation: DateTime<Utc>) -> String {
        format!(
            "<loginTicketResponse version=\"1.0\"><header><generationTime>{}</generationTime><expirationTime>{}</expirationTime></header><credentials><token>T0K3N</token><sign>S1GN</sign></credentials></loginTicketResponse>",
            generation.to_rfc3339_opts(SecondsFormat::Millis, false),
            (generation + Duration::hours(12)).to_rfc3339_opts(SecondsFormat::Millis, false),
        )
    }

    fn login_response(generation: DateTime<Utc>) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?><soapenv:Envelope xmlns:soapenv="http://schemas.xmlsoap.org/soap/envelope/"><soapenv:Body><loginCmsResponse xmlns="{WSAA_NS}"><loginCmsReturn>{}</loginCmsReturn></loginCmsResponse></soapenv:Body></soapenv:Envelope>"#,
            escape(&ticket_xml(generation))
        )
    }

    fn client(url: String, signer: Arc<dyn CmsSigner>) -> WsaaClient {
        WsaaClient::new(
            url,
            SoapTransport::new(StdDuration::from_secs(5), false).unwrap(),
            signer,
            TicketCache::in_memory(),
            Cuit::parse("20291687297").unwrap(),
        )
    }

    #[tokio::test]
    async fn test_ticket_is_cached() {
        let server = MockServer::start().await;
        // base64("fake-cms")
        Mock::given(method("POST"))
            .and(body_string_contains("<wsaa:in0>ZmFrZS1jbXM=</wsaa:in0>"))
            .respond_with(ResponseTemplate::new(200).set_body_string(login_response(Utc::now())))
            .expect(1)
            .mount(&server)
            .await;

        let wsaa = client(server.uri(), Arc::new(FakeSigner));
        let first = wsaa.credentials("wsfe").await.unwrap();
        let second = wsaa.credentials("wsfe").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.token, "T0K3N");
        assert_eq!(first.sign, "S1GN");
        assert_eq!(first.cuit.as_u64(), 20291687297);
    }

    #[tokio::test]
    async fn test_expiring_ticket_is_renewed() {
        let server = MockServer::start().await;
        // Issued 11h55m ago: inside the renewal margin.
        let stale = Utc::now() - Duration::hours(11) - Duration::minutes(55);
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string(login_response(stale)))
            .expect(2)
            .mount(&server)
            .await;

        let wsaa = client(server.uri(), Arc::new(FakeSigner));
        wsaa.ticket("wsfe").await.unwrap();
        wsaa.ticket("wsfe").await.unwrap();
    }

    #[tokio::test]
    async fn test_invalidate_forces_login() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string(login_response(Utc::now())))
            .expect(2)
            .mount(&server)
            .await;

        let wsaa = client(server.uri(), Arc::new(FakeSigner));
        wsaa.ticket("wsfe").await.unwrap();
        wsaa.invalidate("wsfe").await.unwrap();
        wsaa.ticket("wsfe").await.unwrap();
    }

    #[tokio::test]
    async fn test_already_authenticated_fault() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string(
                r#"<soapenv:Envelope xmlns:soapenv="http://schemas.xmlsoap.org/soap/envelope/"><soapenv:Body><soapenv:Fault><faultcode>ns1:coe.alreadyAuthenticated</faultcode><faultstring>El CEE ya posee un TA valido para el acceso al WSN solicitado</faultstring></soapenv:Fault></soapenv:Body></soapenv:Envelope>"#,
            ))
            .mount(&server)
            .await;

        let wsaa = client(server.uri(), Arc::new(FakeSigner));
        let err = wsaa.login("wsfe").await.unwrap_err();
        let Error::Soap { code, .. } = err else {
            unreachable!("Expected Soap error variant");
        };
        assert!(code.ends_with("coe.alreadyAuthenticated"));
    }

    #[tokio::test]
    async fn test_empty_return_is_missing_field() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<soapenv:Envelope xmlns:soapenv="http://schemas.xmlsoap.org/soap/envelope/"><soapenv:Body><loginCmsResponse><loginCmsReturn/></loginCmsResponse></soapenv:Body></soapenv:Envelope>"#,
            ))
            .mount(&server)
            .await;

        let wsaa = client(server.uri(), Arc::new(FakeSigner));
        let err = wsaa.login("wsfe").await.unwrap_err();
        assert!(matches!(err, Error::MissingField { .. }));
    }

    #[tokio::test]
    async fn test_signing_failure_skips_network() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let wsaa = client(server.uri(), Arc::new(FailingSigner));
        let err = wsaa.ticket("wsfe").await.unwrap_err();
        assert!(err.to_string().contains("unable to load key"));
    }

    #[test]
    fn test_config_cache_is_scoped_to_environment_and_cuit() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = ArcaConfig::default();
        config.issuer.cuit = "20291687297".into();
        config.afip.token_cache = Some(dir.path().join("tickets.json"));
        let ticket = LoginTicket::parse(crate::ticket::tests::TICKET_XML).unwrap();
        let at = ticket.generation_time;

        let homologation = WsaaClient::from_config(&config).unwrap();
        homologation.cache.store("wsfe", ticket.clone()).unwrap();

        config.afip.environment = arca_core::Environment::Production;
        let production = WsaaClient::from_config(&config).unwrap();
        assert!(production.cache.get("wsfe", at).is_none());

        config.afip.environment = arca_core::Environment::Homologation;
        let reopened = WsaaClient::from_config(&config).unwrap();
        assert_eq!(reopened.cache.get("wsfe", at), Some(ticket));
    }
}
