//! Request bodies and response parsing for WSFEv1.

use chrono::NaiveDate;

use arca_core::soap::escape;
use arca_core::xml::XmlNode;
use arca_core::{Error, Invoice, PointOfSale, Result, ServiceError, VoucherType};
use arca_wsaa::Credentials;

use crate::model::{AuthorizationOutcome, Observation, ServerStatus};

/// WSFEv1 target namespace.
pub const FEV1_NS: &str = "http://ar.gov.afip.dif.FEV1/";

/// `Concepto` for sales of goods.
const CONCEPT_PRODUCTS: u8 = 1;

/// `SOAPAction` for an operation.
pub fn action(operation: &str) -> String {
    format!("{FEV1_NS}{operation}")
}

/// Builds `ar:`-prefixed elements.
struct Body {
    xml: String,
}

impl Body {
    fn operation(name: &str) -> Self {
        Self {
            xml: format!(r#"<ar:{name} xmlns:ar="{FEV1_NS}">"#),
        }
    }

    fn open(&mut self, name: &str) -> &mut Self {
        self.xml.push_str(&format!("<ar:{name}>"));
        self
    }

    fn close(&mut self, name: &str) -> &mut Self {
        self.xml.push_str(&format!("</ar:{name}>"));
        self
    }

    fn leaf(&mut self, name: &str, value: impl std::fmt::Display) -> &mut Self {
        let value = escape(&value.to_string());
        self.xml.push_str(&format!("<ar:{name}>{value}</ar:{name}>"));
        self
    }

    fn auth(&mut self, credentials: &Credentials) -> &mut Self {
        self.open("Auth")
            .leaf("Token", &credentials.token)
            .leaf("Sign", &credentials.sign)
            .leaf("Cuit", credentials.cuit.as_u64())
            .close("Auth")
    }

    fn finish(mut self, name: &str) -> String {
        self.close(name);
        self.xml
    }
}

/// `FEDummy` body.
pub fn dummy_body() -> String {
    Body::operation("FEDummy").finish("FEDummy")
}

/// `FECompUltimoAutorizado` body.
pub fn last_authorized_body(
    credentials: &Credentials,
    point_of_sale: PointOfSale,
    voucher_type: VoucherType,
) -> String {
    let mut body = Body::operation("FECompUltimoAutorizado");
    body.auth(credentials)
        .leaf("PtoVta", point_of_sale.get())
        .leaf("CbteTipo", voucher_type.code());
    body.finish("FECompUltimoAutorizado")
}

/// `FECAESolicitar` body for a single voucher.
pub fn authorize_body(
    credentials: &Credentials,
    point_of_sale: PointOfSale,
    invoice: &Invoice,
) -> Result<String> {
    let number = invoice
        .number
        .ok_or_else(|| Error::validation_field("number", "voucher number not assigned"))?;
    let amounts = invoice.fiscal_amounts();

    let mut body = Body::operation("FECAESolicitar");
    body.auth(credentials)
        .open("FeCAEReq")
        .open("FeCabReq")
        .leaf("CantReg", 1)
        .leaf("PtoVta", point_of_sale.get())
        .leaf("CbteTipo", invoice.voucher_type.code())
        .close("FeCabReq")
        .open("FeDetReq")
        .open("FECAEDetRequest")
        .leaf("Concepto", CONCEPT_PRODUCTS)
        .leaf("DocTipo", invoice.recipient.doc_type.code())
        .leaf("DocNro", invoice.recipient.doc_number)
        .leaf("CbteDesde", number)
        .leaf("CbteHasta", number)
        .leaf("CbteFch", invoice.issued_at.format("%Y%m%d"))
        .leaf("ImpTotal", amounts.total.wire())
        .leaf("ImpTotConc", "0.00")
        .leaf("ImpNeto", amounts.net.wire())
        .leaf("ImpOpEx", "0.00")
        .leaf("ImpTrib", "0.00")
        .leaf("ImpIVA", amounts.vat.wire())
        .leaf("MonId", "PES")
        .leaf("MonCotiz", 1);

    if let Some(assoc) = &invoice.associated {
        body.open("CbtesAsoc")
            .open("CbteAsoc")
            .leaf("Tipo", assoc.voucher_type.code())
            .leaf("PtoVta", assoc.point_of_sale.get())
            .leaf("Nro", assoc.number)
            .close("CbteAsoc")
            .close("CbtesAsoc");
    }

    if !amounts.vat_lines.is_empty() {
        body.open("Iva");
        for line in &amounts.vat_lines {
            body.open("AlicIva")
                .leaf("Id", line.rate.afip_id())
                .leaf("BaseImp", line.base.wire())
                .leaf("Importe", line.amount.wire())
                .close("AlicIva");
        }
        body.close("Iva");
    }

    body.close("FECAEDetRequest")
        .close("FeDetReq")
        .close("FeCAEReq");
    Ok(body.finish("FECAESolicitar"))
}

// ============================================================================
// Responses
// ============================================================================

/// Locates `<operation>Result` inside the SOAP body.
pub fn result_node<'a>(body: &'a XmlNode, operation: &str) -> Result<&'a XmlNode> {
    let name = format!("{operation}Result");
    body.find(&name).ok_or_else(|| Error::missing_field(name))
}

fn entries(node: &XmlNode, list: &str, item: &str) -> Vec<Observation> {
    node.child(list)
        .map(|l| {
            l.children_named(item)
                .map(|e| Observation {
                    code: e
                        .child_text("Code")
                        .and_then(|c| c.parse().ok())
                        .unwrap_or_default(),
                    message: e.child_text("Msg").unwrap_or_default().to_string(),
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Logs `Events` and fails with [`Error::Service`] when `Errors` is present.
pub fn check_result(result: &XmlNode) -> Result<()> {
    for event in entries(result, "Events", "Evt") {
        tracing::warn!(code = event.code, message = %event.message, "AFIP event");
    }

    let errors: Vec<ServiceError> = entries(result, "Errors", "Err")
        .into_iter()
        .map(|e| ServiceError {
            code: e.code,
            message: e.message,
        })
        .collect();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(Error::Service { errors })
    }
}

/// Parses `FEDummyResult`.
pub fn parse_dummy(body: &XmlNode) -> Result<ServerStatus> {
    let result = result_node(body, "FEDummy")?;
    Ok(ServerStatus {
        app: result.require_text("AppServer")?.to_string(),
        db: result.require_text("DbServer")?.to_string(),
        auth: result.require_text("AuthServer")?.to_string(),
    })
}

/// Parses `FECompUltimoAutorizadoResult`.
pub fn parse_last_authorized(body: &XmlNode) -> Result<u64> {
    let result = result_node(body, "FECompUltimoAutorizado")?;
    check_result(result)?;
    result.parse_child("CbteNro")
}

/// Parses `FECAESolicitarResult`.
pub fn parse_authorization(body: &XmlNode) -> Result<AuthorizationOutcome> {
    let result = result_node(body, "FECAESolicitar")?;
    check_result(result)?;

    let detail = result
        .find("FECAEDetResponse")
        .ok_or_else(|| Error::missing_field("FECAEDetResponse"))?;
    let observations = entries(detail, "Observaciones", "Obs");

    if detail.child_text("Resultado") != Some("A") {
        return Ok(AuthorizationOutcome::Rejected { observations });
    }

    let cae = detail.require_text("CAE")?.to_string();
    let expires = detail.require_text("CAEFchVto")?;
    let expires_on = NaiveDate::parse_from_str(expires, "%Y%m%d")
        .map_err(|e| Error::xml(format!("invalid CAEFchVto '{expires}': {e}")))?;

    Ok(AuthorizationOutcome::Approved {
        cae,
        expires_on,
        observations,
    })
}
