//! Invoice model shared by the web-service client, the QR builder and the
//! receipt printer.

use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::fiscal::{PointOfSale, Recipient, VatRate, VoucherNumber, VoucherType};
use crate::money::{Amount, Quantity};
use crate::{Error, Result};

/// One item line.
///
/// `subtotal` is the net line amount; VAT is computed on top of it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceLine {
    /// Product name
    pub description: String,
    /// Quantity sold
    #[serde(default)]
    pub quantity: Quantity,
    /// Unit price
    pub unit_price: Amount,
    /// Net line amount
    pub subtotal: Amount,
    /// VAT rate; 21% when absent
    #[serde(default)]
    pub vat_rate: Option<VatRate>,
}

impl InvoiceLine {
    /// Creates a line whose subtotal is `unit_price × quantity`.
    pub fn new(description: impl Into<String>, quantity: Quantity, unit_price: Amount) -> Self {
        Self {
            description: description.into(),
            quantity,
            unit_price,
            subtotal: unit_price.times(quantity),
            vat_rate: None,
        }
    }

    /// Sets the VAT rate.
    pub fn with_vat_rate(mut self, rate: VatRate) -> Self {
        self.vat_rate = Some(rate);
        self
    }

    /// Effective VAT rate.
    pub fn rate(&self) -> VatRate {
        self.vat_rate.unwrap_or_default()
    }

    /// VAT for this line, rounded to the cent.
    pub fn vat(&self) -> Amount {
        self.subtotal.percent_of(self.rate().basis_points())
    }
}

/// VAT subtotal for one rate (`AlicIva`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VatLine {
    /// Rate
    pub rate: VatRate,
    /// Taxable base (`BaseImp`)
    pub base: Amount,
    /// Tax amount (`Importe`)
    pub amount: Amount,
}

/// Amounts as reported to WSFEv1.
///
/// `total == net + vat` always holds, and `vat_lines` sums to `net` and
/// `vat`. A discount is spread over the rates in proportion to their gross.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FiscalAmounts {
    /// `ImpNeto`
    pub net: Amount,
    /// `ImpIVA`
    pub vat: Amount,
    /// `ImpTotal`
    pub total: Amount,
    /// `Iva/AlicIva` entries; empty for vouchers that do not itemize VAT
    pub vat_lines: Vec<VatLine>,
}

/// Voucher referenced by a credit or debit note (`CbtesAsoc`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssociatedVoucher {
    /// Type of the original voucher
    pub voucher_type: VoucherType,
    /// Point of sale of the original voucher
    pub point_of_sale: PointOfSale,
    /// Number of the original voucher
    pub number: u64,
}

/// Authorization granted by AFIP.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Authorization {
    /// Código de Autorización Electrónico (14 digits)
    pub cae: String,
    /// Last day the CAE is valid
    pub expires_on: NaiveDate,
}

/// An invoice, debit note or credit note.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    /// Voucher type
    pub voucher_type: VoucherType,
    /// Sequence number, assigned right before authorization
    #[serde(default)]
    pub number: Option<u64>,
    /// Issue date and time, Argentina local time
    pub issued_at: NaiveDateTime,
    /// Counterparty
    #[serde(default)]
    pub recipient: Recipient,
    /// Customer name printed on the receipt
    #[serde(default)]
    pub customer_name: Option<String>,
    /// Seller name printed on the receipt
    #[serde(default)]
    pub seller: Option<String>,
    /// Item lines
    #[serde(default)]
    pub lines: Vec<InvoiceLine>,
    /// Net taxed amount (`ImpNeto`)
    pub net: Amount,
    /// VAT amount (`ImpIVA`)
    pub vat: Amount,
    /// Total (`ImpTotal`)
    pub total: Amount,
    /// Original voucher, required for credit notes
    #[serde(default)]
    pub associated: Option<AssociatedVoucher>,
    /// CAE, once authorized
    #[serde(default)]
    pub authorization: Option<Authorization>,
}

impl Invoice {
    /// Builds an unauthorized invoice from its lines, computing net, VAT and total.
    pub fn from_lines(
        voucher_type: VoucherType,
        issued_at: NaiveDateTime,
        recipient: Recipient,
        lines: Vec<InvoiceLine>,
    ) -> Self {
        let net: Amount = lines.iter().map(|l| l.subtotal).sum();
        let vat: Amount = if voucher_type.itemizes_vat() {
            lines.iter().map(InvoiceLine::vat).sum()
        } else {
            Amount::ZERO
        };
        Self {
            voucher_type,
            number: None,
            issued_at,
            recipient,
            customer_name: None,
            seller: None,
            lines,
            net,
            vat,
            total: net + vat,
            associated: None,
            authorization: None,
        }
    }

    /// Builds the credit note that cancels this invoice.
    ///
    /// Returns `None` when the voucher type has no credit note counterpart.
    pub fn credit_note(&self, point_of_sale: PointOfSale, issued_at: NaiveDateTime) -> Option<Self> {
        let voucher_type = self.voucher_type.credit_note_for()?;
        let number = self.number?;
        Some(Self {
            voucher_type,
            number: None,
            issued_at,
            associated: Some(AssociatedVoucher {
                voucher_type: self.voucher_type,
                point_of_sale,
                number,
            }),
            authorization: None,
            ..self.clone()
        })
    }

    /// VAT grouped by rate, in ascending rate order.
    ///
    /// Per-line VAT is rounded first and then summed. With no lines, the
    /// whole net and VAT are reported at 21%.
    pub fn vat_breakdown(&self) -> Vec<VatLine> {
        if self.lines.is_empty() {
            if self.vat.is_zero() && self.net.is_zero() {
                return Vec::new();
            }
            return vec![VatLine {
                rate: VatRate::TwentyOne,
                base: self.net,
                amount: self.vat,
            }];
        }

        let mut by_rate: BTreeMap<VatRate, (Amount, Amount)> = BTreeMap::new();
        for line in &self.lines {
            let entry = by_rate.entry(line.rate()).or_default();
            entry.0 += line.subtotal;
            entry.1 += line.vat();
        }
        by_rate
            .into_iter()
            .map(|(rate, (base, amount))| VatLine { rate, base, amount })
            .collect()
    }

    /// Discount implied by `net + vat - total`, when positive.
    pub fn discount(&self) -> Option<Amount> {
        let difference = self.net + self.vat - self.total;
        difference.is_positive().then_some(difference)
    }

    /// Net, VAT and per-rate breakdown with any discount applied.
    ///
    /// Vouchers that do not itemize VAT report the whole total as net.
    pub fn fiscal_amounts(&self) -> FiscalAmounts {
        if !self.voucher_type.itemizes_vat() {
            return FiscalAmounts {
                net: self.total,
                vat: Amount::ZERO,
                total: self.total,
                vat_lines: Vec::new(),
            };
        }

        let breakdown = self.vat_breakdown();
        let gross: Amount = breakdown.iter().map(|l| l.base + l.amount).sum();
        let vat_lines = if gross == self.total {
            breakdown
        } else {
            spread_total(&breakdown, gross, self.total)
        };
        FiscalAmounts {
            net: vat_lines.iter().map(|l| l.base).sum(),
            vat: vat_lines.iter().map(|l| l.amount).sum(),
            total: self.total,
            vat_lines,
        }
    }

    /// Full voucher number, if assigned.
    pub fn voucher_number(&self, point_of_sale: PointOfSale) -> Option<VoucherNumber> {
        self.number.map(|number| VoucherNumber {
            point_of_sale,
            number,
        })
    }

    /// Whether AFIP has authorized this voucher.
    pub fn is_authorized(&self) -> bool {
        self.authorization.is_some()
    }

    /// Checks the invariants AFIP enforces before sending anything.
    pub fn validate(&self) -> Result<()> {
        if !self.total.is_positive() {
            return Err(Error::validation_field(
                "total",
                format!("must be positive, got {}", self.total),
            ));
        }
        if self.net.cents() < 0 || self.vat.cents() < 0 {
            return Err(Error::validation("net and vat cannot be negative"));
        }
        if !self.voucher_type.itemizes_vat() && !self.vat.is_zero() {
            return Err(Error::validation_field(
                "vat",
                format!("{} vouchers cannot carry VAT", self.voucher_type),
            ));
        }
        if (self.voucher_type.is_credit_note() || self.voucher_type.is_debit_note())
            && self.associated.is_none()
        {
            return Err(Error::validation_field(
                "associated",
                format!("{} requires the original voucher", self.voucher_type),
            ));
        }
        let gross = self.net + self.vat;
        if self.total > gross {
            return Err(Error::validation_field(
                "total",
                format!("{} exceeds net plus VAT {}", self.total, gross),
            ));
        }
        if !self.lines.is_empty() {
            let net: Amount = self.lines.iter().map(|l| l.subtotal).sum();
            if net != self.net {
                return Err(Error::validation_field(
                    "net",
                    format!("{} does not match the lines ({net})", self.net),
                ));
            }
            if self.voucher_type.itemizes_vat() {
                let vat: Amount = self.lines.iter().map(InvoiceLine::vat).sum();
                if vat != self.vat {
                    return Err(Error::validation_field(
                        "vat",
                        format!("{} does not match the lines ({vat})", self.vat),
                    ));
                }
            }
        }
        if let Some(line) = self.lines.iter().find(|l| l.description.trim().is_empty()) {
            return Err(Error::validation_field(
                "lines",
                format!("line priced {} has no description", line.unit_price),
            ));
        }
        Ok(())
    }
}

/// Prorates `total` over the rates by gross, then splits each share back
/// into base and VAT at its rate. The rounding remainder goes to the
/// largest rate group.
fn spread_total(breakdown: &[VatLine], gross: Amount, total: Amount) -> Vec<VatLine> {
    let mut shares: Vec<Amount> = breakdown
        .iter()
        .map(|l| total.prorate((l.base + l.amount).cents(), gross.cents()))
        .collect();
    let remainder = total - shares.iter().copied().sum::<Amount>();
    if let Some(largest) = breakdown
        .iter()
        .enumerate()
        .max_by_key(|(_, l)| l.base + l.amount)
        .map(|(i, _)| i)
    {
        shares[largest] += remainder;
    }

    breakdown
        .iter()
        .zip(shares)
        .map(|(line, share)| {
            let bp = line.rate.basis_points();
            let base = share.prorate(10_000, 10_000 + bp);
            VatLine {
                rate: line.rate,
                base,
                amount: share - base,
            }
        })
        .collect()
}
