//! End-to-end WSFEv1 flows against a mocked service.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use wiremock::matchers::{body_string_contains, header, method};
use wiremock::{Mock, MockServer, ResponseTemplate};

use arca_core::soap::SoapTransport;
use arca_core::{
    Authorization, Cuit, Error, Invoice, InvoiceLine, PointOfSale, Quantity, Recipient, Result,
    VoucherType,
};
use arca_wsaa::{Credentials, StaticCredentials, TicketProvider};
use arca_wsfe::{AuthorizationOutcome, WsfeClient};

// ----------------------------------------------------------------------------
// Helpers
// ----------------------------------------------------------------------------

fn credentials() -> Credentials {
    Credentials {
        token: "T0K3N".into(),
        sign: "S1GN".into(),
        cuit: Cuit::parse("20291687297").unwrap(),
    }
}

fn envelope(inner: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="utf-8"?><soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/"><soap:Body>{inner}</soap:Body></soap:Envelope>"#
    )
}

fn soap_action(op: &str) -> String {
    format!("\"http://ar.gov.afip.dif.FEV1/{op}\"")
}

fn client(server: &MockServer, tickets: Arc<dyn TicketProvider>) -> WsfeClient {
    WsfeClient::new(
        format!("{}/wsfev1/service.asmx", server.uri()),
        SoapTransport::new(Duration::from_secs(5), false).unwrap(),
        tickets,
        PointOfSale::new(9).unwrap(),
    )
}

fn invoice() -> Invoice {
    let issued = NaiveDate::from_ymd_opt(2025, 9, 4)
        .unwrap()
        .and_hms_opt(13, 2, 41)
        .unwrap();
    Invoice::from_lines(
        VoucherType::InvoiceB,
        issued,
        Recipient::final_consumer(),
        vec![InvoiceLine::new(
            "Yerba 1kg",
            Quantity::units(2),
            "3500".parse().unwrap(),
        )],
    )
}

async fn mount_last(server: &MockServer, last: u64) {
    Mock::given(method("POST"))
        .and(header("SOAPAction", soap_action("FECompUltimoAutorizado").as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_string(envelope(&format!(
            "<FECompUltimoAutorizadoResponse xmlns=\"http://ar.gov.afip.dif.FEV1/\"><FECompUltimoAutorizadoResult><PtoVta>9</PtoVta><CbteTipo>6</CbteTipo><CbteNro>{last}</CbteNro></FECompUltimoAutorizadoResult></FECompUltimoAutorizadoResponse>"
        ))))
        .mount(server)
        .await;
}

/// Counts invalidations so tests can see a rejected ticket being dropped.
struct CountingProvider {
    invalidated: AtomicUsize,
}

#[async_trait]
impl TicketProvider for CountingProvider {
    async fn credentials(&self, _service: &str) -> Result<Credentials> {
        Ok(credentials())
    }

    async fn invalidate(&self, _service: &str) -> Result<()> {
        self.invalidated.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_dummy() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(header("SOAPAction", soap_action("FEDummy").as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_string(envelope(
            "<FEDummyResponse xmlns=\"http://ar.gov.afip.dif.FEV1/\"><FEDummyResult><AppServer>OK</AppServer><DbServer>OK</DbServer><AuthServer>OK</AuthServer></FEDummyResult></FEDummyResponse>",
        )))
        .expect(1)
        .mount(&server)
        .await;

    let wsfe = client(&server, Arc::new(StaticCredentials(credentials())));
    let status = wsfe.dummy().await.unwrap();
    assert!(status.is_ok());
}

#[tokio::test]
async fn test_next_number_sends_auth() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_string_contains("<ar:Token>T0K3N</ar:Token>"))
        .and(body_string_contains("<ar:Cuit>20291687297</ar:Cuit>"))
        .and(body_string_contains("<ar:CbteTipo>6</ar:CbteTipo>"))
        .respond_with(ResponseTemplate::new(200).set_body_string(envelope(
            "<FECompUltimoAutorizadoResponse><FECompUltimoAutorizadoResult><CbteNro>1234</CbteNro></FECompUltimoAutorizadoResult></FECompUltimoAutorizadoResponse>",
        )))
        .expect(1)
        .mount(&server)
        .await;

    let wsfe = client(&server, Arc::new(StaticCredentials(credentials())));
    assert_eq!(wsfe.next_number(VoucherType::InvoiceB).await.unwrap(), 1235);
}

#[tokio::test]
async fn test_authorize_next_records_cae() {
    let server = MockServer::start().await;
    mount_last(&server, 1234).await;
    Mock::given(method("POST"))
        .and(header("SOAPAction", soap_action("FECAESolicitar").as_str()))
        .and(body_string_contains("<ar:CbteDesde>1235</ar:CbteDesde>"))
        .respond_with(ResponseTemplate::new(200).set_body_string(envelope(
            "<FECAESolicitarResponse><FECAESolicitarResult><FeCabResp><Resultado>A</Resultado></FeCabResp><FeDetResp><FECAEDetResponse><Resultado>A</Resultado><CAE>75361234567890</CAE><CAEFchVto>20250914</CAEFchVto></FECAEDetResponse></FeDetResp></FECAESolicitarResult></FECAESolicitarResponse>",
        )))
        .expect(1)
        .mount(&server)
        .await;

    let wsfe = client(&server, Arc::new(StaticCredentials(credentials())));
    let mut inv = invoice();
    let outcome = wsfe.authorize_next(&mut inv).await.unwrap();

    assert!(outcome.is_approved());
    assert_eq!(inv.number, Some(1235));
    let auth = inv.authorization.unwrap();
    assert_eq!(auth.cae, "75361234567890");
    assert_eq!(auth.expires_on, NaiveDate::from_ymd_opt(2025, 9, 14).unwrap());
}

#[tokio::test]
async fn test_rejection_leaves_invoice_unauthorized() {
    let server = MockServer::start().await;
    mount_last(&server, 10).await;
    Mock::given(method("POST"))
        .and(header("SOAPAction", soap_action("FECAESolicitar").as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_string(envelope(
            "<FECAESolicitarResponse><FECAESolicitarResult><FeDetResp><FECAEDetResponse><Observaciones><Obs><Code>10016</Code><Msg>El numero o fecha del comprobante no se corresponde con el proximo a autorizar.</Msg></Obs></Observaciones><Resultado>R</Resultado></FECAEDetResponse></FeDetResp></FECAESolicitarResult></FECAESolicitarResponse>",
        )))
        .mount(&server)
        .await;

    let wsfe = client(&server, Arc::new(StaticCredentials(credentials())));
    let mut inv = invoice();
    let outcome = wsfe.authorize_next(&mut inv).await.unwrap();

    let AuthorizationOutcome::Rejected { observations } = outcome else {
        unreachable!("Expected Rejected outcome");
    };
    assert_eq!(observations[0].code, 10016);
    assert_eq!(inv.number, Some(11));
    assert!(inv.authorization.is_none());
}

#[tokio::test]
async fn test_token_error_invalidates_ticket() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string(envelope(
            "<FECompUltimoAutorizadoResponse><FECompUltimoAutorizadoResult><CbteNro>0</CbteNro><Errors><Err><Code>600</Code><Msg>ValidacionDeToken: No validaron las fechas del token GenTime, ExpTime, NowUTC</Msg></Err></Errors></FECompUltimoAutorizadoResult></FECompUltimoAutorizadoResponse>",
        )))
        .mount(&server)
        .await;

    let provider = Arc::new(CountingProvider {
        invalidated: AtomicUsize::new(0),
    });
    let wsfe = client(&server, provider.clone());
    let err = wsfe.last_authorized(VoucherType::InvoiceB).await.unwrap_err();

    let Error::Service { errors } = err else {
        unreachable!("Expected Service error variant");
    };
    assert_eq!(errors[0].code, 600);
    assert_eq!(provider.invalidated.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_invalid_invoice_is_not_sent() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let wsfe = client(&server, Arc::new(StaticCredentials(credentials())));
    let mut inv = invoice();
    inv.number = Some(1);
    inv.voucher_type = VoucherType::CreditNoteB;
    let err = wsfe.authorize(&inv).await.unwrap_err();
    assert!(matches!(err, Error::Validation { .. }));
}

#[tokio::test]
async fn test_authorized_invoice_is_not_authorized_again() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let wsfe = client(&server, Arc::new(StaticCredentials(credentials())));
    let mut inv = invoice();
    inv.number = Some(1235);
    inv.authorization = Some(Authorization {
        cae: "75361234567890".into(),
        expires_on: NaiveDate::from_ymd_opt(2025, 9, 14).unwrap(),
    });
    let err = wsfe.authorize_next(&mut inv).await.unwrap_err();

    let Error::Validation { field, .. } = err else {
        unreachable!("Expected Validation error variant");
    };
    assert_eq!(field.as_deref(), Some("authorization"));
    assert_eq!(inv.number, Some(1235));
}

#[tokio::test]
async fn test_inconsistent_amounts_are_not_sent() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let wsfe = client(&server, Arc::new(StaticCredentials(credentials())));
    let mut inv = invoice();
    inv.number = Some(1);
    inv.vat = "10".parse().unwrap();
    inv.total = inv.net + inv.vat;
    let err = wsfe.authorize(&inv).await.unwrap_err();

    let Error::Validation { field, .. } = err else {
        unreachable!("Expected Validation error variant");
    };
    assert_eq!(field.as_deref(), Some("vat"));
}
