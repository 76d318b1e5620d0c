//! arca-qr: the fiscal QR printed on authorized vouchers.
//!
//! The QR encodes a verification URL whose `p` parameter is the base64 of a
//! small JSON document describing the voucher. Scanning it opens AFIP's
//! validator.
//!
//! ```
//! use arca_core::{Authorization, Cuit, Invoice, InvoiceLine, PointOfSale, Quantity, Recipient, VoucherType};
//! use arca_qr::QrPayload;
//! use chrono::NaiveDate;
//!
//! let issued = NaiveDate::from_ymd_opt(2025, 9, 4).unwrap().and_hms_opt(13, 2, 41).unwrap();
//! let line = InvoiceLine::new("Yerba", Quantity::ONE, "1000".parse().unwrap());
//! let mut invoice = Invoice::from_lines(VoucherType::InvoiceB, issued, Recipient::final_consumer(), vec![line]);
//! invoice.number = Some(1235);
//! invoice.authorization = Some(Authorization {
//!     cae: "75361234567890".into(),
//!     expires_on: NaiveDate::from_ymd_opt(2025, 9, 14).unwrap(),
//! });
//!
//! let payload = QrPayload::from_invoice(
//!     Cuit::parse("20291687297").unwrap(),
//!     PointOfSale::new(9).unwrap(),
//!     &invoice,
//! ).unwrap();
//! assert!(payload.url().unwrap().starts_with("https://www.afip.gob.ar/fe/qr/?p="));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

use arca_core::{Cuit, Error, Invoice, PointOfSale, Result};

/// Base URL of AFIP's QR validator.
pub const VERIFY_URL: &str = "https://www.afip.gob.ar/fe/qr/";

/// Minimum CAE length accepted.
pub const CAE_MIN_DIGITS: usize = 14;

/// JSON document carried by the QR.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QrPayload {
    /// Format version, always 1
    pub ver: u8,
    /// Issue date, `YYYY-MM-DD`
    pub fecha: String,
    /// Issuer CUIT
    pub cuit: u64,
    /// Point of sale
    pub pto_vta: u32,
    /// Voucher type code
    pub tipo_cmp: u16,
    /// Voucher number
    pub nro_cmp: u64,
    /// Total amount
    pub importe: f64,
    /// Currency, `PES`
    pub moneda: String,
    /// Exchange rate, 1 for pesos
    pub ctz: f64,
    /// Recipient document type
    pub tipo_doc_rec: u16,
    /// Recipient document number
    pub nro_doc_rec: u64,
    /// Authorization kind, `E` for CAE
    pub tipo_cod_aut: String,
    /// Authorization code
    pub cod_aut: u64,
}

impl QrPayload {
    /// Builds the payload for an authorized invoice.
    pub fn from_invoice(
        issuer: Cuit,
        point_of_sale: PointOfSale,
        invoice: &Invoice,
    ) -> Result<Self> {
        let authorization = invoice
            .authorization
            .as_ref()
            .ok_or_else(|| Error::validation_field("cae", "voucher has no CAE"))?;
        let cae = authorization.cae.trim();
        if cae.len() < CAE_MIN_DIGITS || !cae.chars().all(|c| c.is_ascii_digit()) {
            return Err(Error::validation_field(
                "cae",
                format!("'{cae}' is not a valid CAE"),
            ));
        }
        let cod_aut = cae
            .parse()
            .map_err(|_| Error::validation_field("cae", format!("'{cae}' is out of range")))?;
        if !invoice.total.is_positive() {
            return Err(Error::validation_field(
                "total",
                format!("must be positive, got {}", invoice.total),
            ));
        }
        let number = invoice
            .number
            .ok_or_else(|| Error::validation_field("number", "voucher number not assigned"))?;

        Ok(Self {
            ver: 1,
            fecha: invoice.issued_at.format("%Y-%m-%d").to_string(),
            cuit: issuer.as_u64(),
            pto_vta: point_of_sale.get(),
            tipo_cmp: invoice.voucher_type.code(),
            nro_cmp: number,
            importe: invoice.total.as_f64(),
            moneda: "PES".to_string(),
            ctz: 1.0,
            tipo_doc_rec: invoice.recipient.doc_type.code(),
            nro_doc_rec: invoice.recipient.doc_number,
            tipo_cod_aut: "E".to_string(),
            cod_aut,
        })
    }

    /// Verification URL to encode in the QR.
    pub fn url(&self) -> Result<String> {
        let json = serde_json::to_vec(self)?;
        Ok(format!("{VERIFY_URL}?p={}", STANDARD.encode(json)))
    }

    /// Decodes a verification URL back into its payload.
    pub fn from_url(url: &str) -> Result<Self> {
        let encoded = url
            .split_once("?p=")
            .map(|(_, p)| p)
            .ok_or_else(|| Error::validation_field("url", "missing p parameter"))?;
        let json = STANDARD
            .decode(encoded)
            .map_err(|e| Error::validation_field("url", e.to_string()))?;
        Ok(serde_json::from_slice(&json)?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use arca_core::{Authorization, InvoiceLine, Quantity, Recipient, VoucherType};
    use chrono::NaiveDate;

    fn authorized(cae: &str) -> Invoice {
        let issued = NaiveDate::from_ymd_opt(2025, 9, 4)
            .unwrap()
            .and_hms_opt(13, 2, 41)
            .unwrap();
        let line = InvoiceLine::new("Yerba 1kg", Quantity::units(2), "3500".parse().unwrap());
        let mut inv = Invoice::from_lines(
            VoucherType::InvoiceB,
            issued,
            Recipient::from_tax_id("20-33342943-3"),
            vec![line],
        );
        inv.number = Some(1235);
        inv.authorization = Some(Authorization {
            cae: cae.to_string(),
            expires_on: NaiveDate::from_ymd_opt(2025, 9, 14).unwrap(),
        });
        inv
    }

    fn issuer() -> Cuit {
        Cuit::parse("20291687297").unwrap()
    }

    fn pos() -> PointOfSale {
        PointOfSale::new(9).unwrap()
    }

    #[test]
    fn test_payload_fields() {
        let payload = QrPayload::from_invoice(issuer(), pos(), &authorized("75361234567890")).unwrap();
        assert_eq!(payload.fecha, "2025-09-04");
        assert_eq!(payload.cuit, 20291687297);
        assert_eq!(payload.pto_vta, 9);
        assert_eq!(payload.tipo_cmp, 6);
        assert_eq!(payload.nro_cmp, 1235);
        assert_eq!(payload.importe, 8470.0);
        assert_eq!(payload.tipo_doc_rec, 80);
        assert_eq!(payload.nro_doc_rec, 20333429433);
        assert_eq!(payload.cod_aut, 75361234567890);
    }

    #[test]
    fn test_json_uses_afip_field_names() {
        let payload = QrPayload::from_invoice(issuer(), pos(), &authorized("75361234567890")).unwrap();
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["ptoVta"], 9);
        assert_eq!(json["tipoCmp"], 6);
        assert_eq!(json["tipoCodAut"], "E");
        assert_eq!(json["moneda"], "PES");
    }

    #[test]
    fn test_url_decodes_back() {
        let payload = QrPayload::from_invoice(issuer(), pos(), &authorized("75361234567890")).unwrap();
        let url = payload.url().unwrap();
        assert!(url.starts_with("https://www.afip.gob.ar/fe/qr/?p=eyJ"));
        assert_eq!(QrPayload::from_url(&url).unwrap(), payload);
    }

    #[test]
    fn test_requires_cae() {
        let mut inv = authorized("75361234567890");
        inv.authorization = None;
        let err = QrPayload::from_invoice(issuer(), pos(), &inv).unwrap_err();
        assert!(err.to_string().contains("no CAE"));
    }

    #[test]
    fn test_rejects_short_cae() {
        let err = QrPayload::from_invoice(issuer(), pos(), &authorized("7536123")).unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
    }

    #[test]
    fn test_rejects_unnumbered_and_zero_total() {
        let mut inv = authorized("75361234567890");
        inv.number = None;
        assert!(QrPayload::from_invoice(issuer(), pos(), &inv).is_err());

        let mut inv = authorized("75361234567890");
        inv.total = arca_core::Amount::ZERO;
        assert!(QrPayload::from_invoice(issuer(), pos(), &inv).is_err());
    }
}
