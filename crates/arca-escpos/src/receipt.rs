//! Receipt documents.

use chrono::NaiveDateTime;

use arca_core::{Amount, Cuit, Invoice, IssuerConfig, PointOfSale};

use crate::codepage;
use crate::commands::{self, Align, QrErrorLevel};
use crate::layout::{ITEM_HEADER, LineFormatter, center_in, truncate};

/// Notice required by the consumer tax transparency regime.
pub const TRANSPARENCY_NOTICE: &str = "Transparencia Fiscal al Consumidor - Ley 27.743";

const QR_MODULE_SIZE: u8 = 3;
const SELLER_WIDTH: usize = 20;
const LABEL_NAME_WIDTH: usize = 30;

/// Business data printed in the receipt header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issuer {
    /// Razón social
    pub business_name: String,
    /// CUIT as printed
    pub cuit: String,
    /// VAT condition
    pub vat_condition: String,
    /// Street address
    pub address: String,
    /// Optional slogan
    pub tagline: Option<String>,
    /// Point of sale used in voucher numbers
    pub point_of_sale: PointOfSale,
}

impl Issuer {
    /// Builds the header data from the `[issuer]` section.
    pub fn from_config(config: &IssuerConfig) -> arca_core::Result<Self> {
        let cuit = Cuit::parse(&config.cuit)
            .map(|c| c.to_string())
            .unwrap_or_else(|_| config.cuit.clone());
        Ok(Self {
            business_name: config.business_name.clone(),
            cuit,
            vat_condition: config.vat_condition.clone(),
            address: config.address.clone(),
            tagline: config.tagline.clone(),
            point_of_sale: config.point_of_sale()?,
        })
    }
}

/// An ESC/POS document under construction.
///
/// Starts with `ESC @` and the CP850 code page; [`finish`](Self::finish)
/// feeds and cuts.
#[derive(Debug, Clone)]
pub struct Receipt {
    buf: Vec<u8>,
    fmt: LineFormatter,
}

impl Receipt {
    /// Starts a document.
    pub fn new(fmt: LineFormatter) -> Self {
        let mut buf = Vec::with_capacity(2048);
        buf.extend_from_slice(commands::INIT);
        buf.extend_from_slice(commands::CODEPAGE_CP850);
        Self { buf, fmt }
    }

    /// Layout in use.
    pub fn formatter(&self) -> LineFormatter {
        self.fmt
    }

    /// Appends a text line.
    pub fn line(&mut self, text: &str) -> &mut Self {
        self.buf.extend_from_slice(&codepage::encode(text));
        self.buf.push(b'\n');
        self
    }

    /// Appends an empty line.
    pub fn blank(&mut self) -> &mut Self {
        self.buf.push(b'\n');
        self
    }

    /// Appends raw command bytes.
    pub fn raw(&mut self, bytes: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(bytes);
        self
    }

    /// Appends a centered line.
    pub fn centered(&mut self, text: &str) -> &mut Self {
        let line = self.fmt.center(text);
        self.line(&line)
    }

    /// Appends a full-width separator.
    pub fn separator(&mut self, ch: char) -> &mut Self {
        let line = self.fmt.separator(ch);
        self.line(&line)
    }

    /// Appends a left/right justified line.
    pub fn justified(&mut self, left: &str, right: &str) -> &mut Self {
        let line = self.fmt.justify(left, right);
        self.line(&line)
    }

    /// Appends word-wrapped text.
    pub fn wrapped(&mut self, text: &str) -> &mut Self {
        for line in self.fmt.wrap(text) {
            self.line(&line);
        }
        self
    }

    /// Appends a bold, double-size line centered for double-width glyphs.
    pub fn headline(&mut self, text: &str) -> &mut Self {
        let padded = center_in(text, self.fmt.width() / 2);
        self.raw(commands::BOLD_ON)
            .raw(commands::DOUBLE_SIZE)
            .raw(&codepage::encode(&padded))
            .raw(commands::NORMAL_SIZE)
            .raw(commands::BOLD_OFF)
            .blank()
    }

    /// Appends a centered native QR code; data the printer cannot hold is skipped.
    pub fn qr(&mut self, data: &str) -> &mut Self {
        match commands::qr_code(data.as_bytes(), QR_MODULE_SIZE, QrErrorLevel::M) {
            Some(qr) => {
                self.raw(&commands::align(Align::Center))
                    .raw(&qr)
                    .blank()
                    .raw(&commands::align(Align::Left));
            }
            None => tracing::warn!(bytes = data.len(), "QR data does not fit, skipping"),
        }
        self
    }

    /// Feeds, cuts, and returns the bytes.
    pub fn finish(mut self) -> Vec<u8> {
        self.buf.extend_from_slice(b"\n\n");
        self.buf.extend_from_slice(commands::PARTIAL_CUT);
        self.buf
    }

    // ------------------------------------------------------------------------
    // Documents
    // ------------------------------------------------------------------------

    /// Thermal receipt for an invoice or note.
    pub fn invoice(
        issuer: &Issuer,
        invoice: &Invoice,
        qr_url: Option<&str>,
        fmt: LineFormatter,
    ) -> Vec<u8> {
        let mut r = Self::new(fmt);

        // Header
        r.blank().headline(&issuer.business_name).blank();
        r.centered(&format!("CUIT: {}", issuer.cuit));
        r.centered(&format!("IVA: {}", issuer.vat_condition));
        if !issuer.address.trim().is_empty() {
            r.centered(&format!("Dir: {}", issuer.address));
        }
        if let Some(tagline) = issuer.tagline.as_deref().filter(|t| !t.trim().is_empty()) {
            r.centered(tagline);
        }
        r.blank();

        // Voucher
        r.centered(&format!("=== {} ===", invoice.voucher_type.receipt_label()));
        let number = invoice
            .voucher_number(issuer.point_of_sale)
            .map(|n| n.to_string())
            .unwrap_or_else(|| "-".to_string());
        r.centered(&format!("Nro: {number}"));
        if let Some(assoc) = &invoice.associated {
            r.centered(&format!(
                "Ref: {} {}-{:08}",
                assoc.voucher_type.receipt_label(),
                assoc.point_of_sale,
                assoc.number
            ));
        }
        r.blank();
        r.line(&format!("Fecha: {}", invoice.issued_at.format("%d/%m/%Y %H:%M")));
        let seller = invoice.seller.as_deref().unwrap_or("Sistema");
        r.line(&format!("Vendedor: {}", truncate(seller, SELLER_WIDTH)));
        r.separator('-');

        // Customer
        let customer = invoice.customer_name.as_deref().unwrap_or("Consumidor Final");
        r.line(&truncate(&format!("Cliente: {customer}"), fmt.width()));
        if !invoice.recipient.is_anonymous() {
            r.line(&format!(
                "{}: {}",
                invoice.recipient.doc_type.label(),
                invoice.recipient.doc_number
            ));
        }
        r.separator('-');

        // Items
        r.line(&fmt.fit(ITEM_HEADER)).separator('-');
        if invoice.lines.is_empty() {
            r.line("Sin productos");
        }
        for item in &invoice.lines {
            let row = fmt.item_row(&item.description, item.quantity, item.unit_price, item.subtotal);
            r.line(&row);
        }
        r.separator('-');

        // Totals
        r.justified("SUBTOTAL:", &money(invoice.net));
        if invoice.voucher_type.itemizes_vat() {
            for vat in invoice.vat_breakdown() {
                if !vat.amount.is_positive() {
                    continue;
                }
                let label = if vat.rate.basis_points() == 0 {
                    "EXENTO:".to_string()
                } else {
                    format!("IVA {}:", vat.rate.label())
                };
                r.justified(&label, &money(vat.amount));
            }
        }
        if let Some(discount) = invoice.discount() {
            r.justified("DESCUENTO:", &format!("-{}", money(discount)));
        }
        r.separator('-');
        r.justified("TOTAL:", &money(invoice.total));
        r.separator('-');

        // Authorization
        r.blank().wrapped(TRANSPARENCY_NOTICE).blank();
        match &invoice.authorization {
            Some(auth) => {
                r.centered("*** AUTORIZADO AFIP ***").blank();
                let cae_line = format!("CAE: {}", auth.cae);
                if cae_line.chars().count() > fmt.width() {
                    r.line("CAE:").line(&format!("  {}", auth.cae));
                } else {
                    r.line(&cae_line);
                }
                r.line(&format!("Vto CAE: {}", auth.expires_on.format("%d/%m/%Y")));
                if let Some(url) = qr_url {
                    r.blank().qr(url);
                }
                r.blank()
                    .centered("Verificar en:")
                    .centered("www.arca.gob.ar");
            }
            None => {
                r.centered("*** NO AUTORIZADO ***")
                    .centered("VERIFICAR AFIP");
            }
        }

        // Footer
        r.blank().centered("Gracias por elegirnos");
        for _ in 0..4 {
            r.blank();
        }
        r.finish()
    }

    /// Shelf price card.
    pub fn price_label(
        name: &str,
        price: Amount,
        offer: bool,
        savings: Option<Amount>,
        fmt: LineFormatter,
    ) -> Vec<u8> {
        let mut r = Self::new(fmt);
        r.centered("PRECIO DE VENTA");
        if offer {
            r.blank()
                .separator('*')
                .centered("¡OFERTA ESPECIAL!")
                .separator('*');
        }
        let short: String = name.chars().take(LABEL_NAME_WIDTH).collect();
        r.blank().centered(&short).blank().separator('-');

        let price_text = center_in(&format!("$ {}", price.wire()), fmt.width() / 2);
        r.raw(commands::DOUBLE_SIZE)
            .raw(&codepage::encode(&price_text))
            .raw(commands::NORMAL_SIZE)
            .blank()
            .blank()
            .separator('-');

        if let Some(savings) = savings.filter(|s| offer && s.is_positive()) {
            r.blank().centered(&format!("Ahorro: $ {}", savings.wire()));
        }
        for _ in 0..4 {
            r.blank();
        }
        r.finish()
    }

    /// Printer self-test page.
    pub fn test_page(printer_name: &str, now: NaiveDateTime, fmt: LineFormatter) -> Vec<u8> {
        let mut r = Self::new(fmt);
        r.blank()
            .line("=== PRUEBA DE IMPRESION ===")
            .blank()
            .line("Test de sistema POS")
            .line(&format!("Fecha: {}", now.format("%d/%m/%Y %H:%M")))
            .blank()
            .line("Impresora detectada:")
            .line(printer_name)
            .blank()
            .separator('-')
            .line("ESTADO: FUNCIONANDO CORRECTAMENTE")
            .separator('-')
            .blank()
            .line("*** EXITO ***");
        for _ in 0..4 {
            r.blank();
        }
        r.finish()
    }
}

fn money(amount: Amount) -> String {
    format!("${}", amount.grouped())
}
