//! Fiscal identifiers used by AFIP/ARCA.
//!
//! - [`Cuit`]: the 11-digit tax ID with its mod-11 check digit
//! - [`PointOfSale`]: the issuing point registered with AFIP
//! - [`VoucherType`]: invoice, debit note and credit note codes (A, B, C)
//! - [`DocumentType`] and [`Recipient`]: who the voucher is addressed to
//! - [`VoucherNumber`]: the `PPPP-NNNNNNNN` display form
//! - [`VatRate`]: VAT rates with their `AlicIva` ids

use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Time zone used for invoice dates.
pub const TIMEZONE: Tz = chrono_tz::America::Argentina::Buenos_Aires;

/// Current wall-clock time in Argentina.
pub fn local_now() -> NaiveDateTime {
    Utc::now().with_timezone(&TIMEZONE).naive_local()
}

// ============================================================================
// CUIT
// ============================================================================

const CUIT_WEIGHTS: [u32; 10] = [5, 4, 3, 2, 7, 6, 5, 4, 3, 2];

/// Clave Única de Identificación Tributaria.
///
/// Always 11 digits with a valid check digit. Displays as `XX-XXXXXXXX-X`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Cuit(u64);

impl Cuit {
    /// Parses a CUIT, accepting `-` and space separators.
    ///
    /// # Examples
    ///
    /// ```
    /// use arca_core::Cuit;
    ///
    /// let cuit = Cuit::parse("20-29261831-0").unwrap();
    /// assert_eq!(cuit.as_u64(), 20292618310);
    /// assert_eq!(cuit.to_string(), "20-29261831-0");
    /// ```
    pub fn parse(input: &str) -> Result<Self> {
        let digits: String = input
            .chars()
            .filter(|c| *c != '-' && !c.is_whitespace())
            .collect();

        if digits.len() != 11 || !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(Error::validation_field(
                "cuit",
                format!("'{input}' must have exactly 11 digits"),
            ));
        }

        let values: Vec<u32> = digits.chars().filter_map(|c| c.to_digit(10)).collect();
        let expected = check_digit(&values[..10]).ok_or_else(|| {
            Error::validation_field("cuit", format!("'{input}' has no valid check digit"))
        })?;
        if values[10] != expected {
            return Err(Error::validation_field(
                "cuit",
                format!("'{input}' has check digit {} (expected {expected})", values[10]),
            ));
        }

        digits
            .parse::<u64>()
            .map(Self)
            .map_err(|e| Error::validation_field("cuit", e.to_string()))
    }

    /// Returns the numeric form sent on the wire.
    pub fn as_u64(&self) -> u64 {
        self.0
    }

    /// Returns the 11 digits without separators.
    pub fn digits(&self) -> String {
        format!("{:011}", self.0)
    }
}

/// Computes the mod-11 check digit over the first ten digits.
///
/// Returns `None` when the remainder yields 10, which AFIP never issues.
fn check_digit(digits: &[u32]) -> Option<u32> {
    let sum: u32 = digits
        .iter()
        .zip(CUIT_WEIGHTS.iter())
        .map(|(d, w)| d * w)
        .sum();
    match 11 - (sum % 11) {
        11 => Some(0),
        10 => None,
        n => Some(n),
    }
}

impl fmt::Display for Cuit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let d = self.digits();
        write!(f, "{}-{}-{}", &d[..2], &d[2..10], &d[10..])
    }
}

impl FromStr for Cuit {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Cuit {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        Self::parse(&s)
    }
}

impl From<Cuit> for String {
    fn from(cuit: Cuit) -> Self {
        cuit.digits()
    }
}

// ============================================================================
// PointOfSale
// ============================================================================

/// Point of sale number registered with AFIP (1..=99998).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct PointOfSale(u32);

impl PointOfSale {
    /// Highest point of sale number AFIP accepts.
    pub const MAX: u32 = 99_998;

    /// Creates a point of sale, rejecting 0 and values above [`Self::MAX`].
    pub fn new(number: u32) -> Result<Self> {
        if number == 0 || number > Self::MAX {
            return Err(Error::validation_field(
                "point_of_sale",
                format!("{number} is outside 1..={}", Self::MAX),
            ));
        }
        Ok(Self(number))
    }

    /// Returns the raw number.
    pub fn get(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for PointOfSale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}", self.0)
    }
}

impl TryFrom<u32> for PointOfSale {
    type Error = Error;

    fn try_from(n: u32) -> Result<Self> {
        Self::new(n)
    }
}

impl From<PointOfSale> for u32 {
    fn from(p: PointOfSale) -> Self {
        p.0
    }
}

// ============================================================================
// VoucherType
// ============================================================================

/// Comprobante type, identified on the wire by its AFIP code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub enum VoucherType {
    /// Factura A (1)
    InvoiceA,
    /// Nota de Débito A (2)
    DebitNoteA,
    /// Nota de Crédito A (3)
    CreditNoteA,
    /// Factura B (6)
    InvoiceB,
    /// Nota de Débito B (7)
    DebitNoteB,
    /// Nota de Crédito B (8)
    CreditNoteB,
    /// Factura C (11)
    InvoiceC,
    /// Nota de Débito C (12)
    DebitNoteC,
    /// Nota de Crédito C (13)
    CreditNoteC,
}

impl VoucherType {
    /// Every supported voucher type, in code order.
    pub const ALL: [VoucherType; 9] = [
        Self::InvoiceA,
        Self::DebitNoteA,
        Self::CreditNoteA,
        Self::InvoiceB,
        Self::DebitNoteB,
        Self::CreditNoteB,
        Self::InvoiceC,
        Self::DebitNoteC,
        Self::CreditNoteC,
    ];

    /// AFIP code (`CbteTipo`).
    pub fn code(&self) -> u16 {
        match self {
            Self::InvoiceA => 1,
            Self::DebitNoteA => 2,
            Self::CreditNoteA => 3,
            Self::InvoiceB => 6,
            Self::DebitNoteB => 7,
            Self::CreditNoteB => 8,
            Self::InvoiceC => 11,
            Self::DebitNoteC => 12,
            Self::CreditNoteC => 13,
        }
    }

    /// Looks a voucher type up by its AFIP code.
    pub fn from_code(code: u16) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|t| t.code() == code)
            .ok_or_else(|| {
                Error::validation_field("voucher_type", format!("unsupported code {code}"))
            })
    }

    /// Letter printed on the voucher.
    pub fn letter(&self) -> char {
        match self {
            Self::InvoiceA | Self::DebitNoteA | Self::CreditNoteA => 'A',
            Self::InvoiceB | Self::DebitNoteB | Self::CreditNoteB => 'B',
            Self::InvoiceC | Self::DebitNoteC | Self::CreditNoteC => 'C',
        }
    }

    /// Whether the voucher is a credit note.
    pub fn is_credit_note(&self) -> bool {
        matches!(
            self,
            Self::CreditNoteA | Self::CreditNoteB | Self::CreditNoteC
        )
    }

    /// Whether the voucher is a debit note.
    pub fn is_debit_note(&self) -> bool {
        matches!(self, Self::DebitNoteA | Self::DebitNoteB | Self::DebitNoteC)
    }

    /// Whether VAT is itemized (`Iva` block) for this letter.
    ///
    /// Letter C is issued by monotributistas, who do not discriminate VAT.
    pub fn itemizes_vat(&self) -> bool {
        self.letter() != 'C'
    }

    /// Credit note that cancels this invoice, if any.
    pub fn credit_note_for(&self) -> Option<VoucherType> {
        match self {
            Self::InvoiceA => Some(Self::CreditNoteA),
            Self::InvoiceB => Some(Self::CreditNoteB),
            Self::InvoiceC => Some(Self::CreditNoteC),
            _ => None,
        }
    }

    /// Upper-case label used on thermal receipts.
    pub fn receipt_label(&self) -> String {
        let kind = if self.is_credit_note() {
            "NOTA CRED"
        } else if self.is_debit_note() {
            "NOTA DEB"
        } else {
            "FACTURA"
        };
        format!("{kind} {}", self.letter())
    }

    /// Spanish description, as listed by AFIP.
    pub fn description(&self) -> String {
        let kind = if self.is_credit_note() {
            "Nota de Crédito"
        } else if self.is_debit_note() {
            "Nota de Débito"
        } else {
            "Factura"
        };
        format!("{kind} {}", self.letter())
    }
}

impl fmt::Display for VoucherType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.description())
    }
}

impl TryFrom<u16> for VoucherType {
    type Error = Error;

    fn try_from(code: u16) -> Result<Self> {
        Self::from_code(code)
    }
}

impl From<VoucherType> for u16 {
    fn from(t: VoucherType) -> Self {
        t.code()
    }
}

impl FromStr for VoucherType {
    type Err = Error;

    /// Accepts `"6"`, `"06"`, or a letter form such as `"B"` (invoice).
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if let Ok(code) = s.parse::<u16>() {
            return Self::from_code(code);
        }
        match s.to_ascii_uppercase().as_str() {
            "A" => Ok(Self::InvoiceA),
            "B" => Ok(Self::InvoiceB),
            "C" => Ok(Self::InvoiceC),
            _ => Err(Error::validation_field(
                "voucher_type",
                format!("unknown voucher type '{s}'"),
            )),
        }
    }
}

// ============================================================================
// DocumentType / Recipient
// ============================================================================

/// Recipient document type (`DocTipo`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub enum DocumentType {
    /// CUIT (80)
    Cuit,
    /// CUIL (86)
    Cuil,
    /// DNI (96)
    Dni,
    /// Unidentified / daily global sale (99)
    Unidentified,
}

impl DocumentType {
    /// AFIP code.
    pub fn code(&self) -> u16 {
        match self {
            Self::Cuit => 80,
            Self::Cuil => 86,
            Self::Dni => 96,
            Self::Unidentified => 99,
        }
    }

    /// Looks a document type up by its AFIP code.
    pub fn from_code(code: u16) -> Result<Self> {
        match code {
            80 => Ok(Self::Cuit),
            86 => Ok(Self::Cuil),
            96 => Ok(Self::Dni),
            99 => Ok(Self::Unidentified),
            other => Err(Error::validation_field(
                "doc_type",
                format!("unsupported document type {other}"),
            )),
        }
    }

    /// Short label printed on receipts.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Cuit => "CUIT",
            Self::Cuil => "CUIL",
            Self::Dni => "DNI",
            Self::Unidentified => "Sin identificar",
        }
    }
}

impl TryFrom<u16> for DocumentType {
    type Error = Error;

    fn try_from(code: u16) -> Result<Self> {
        Self::from_code(code)
    }
}

impl From<DocumentType> for u16 {
    fn from(t: DocumentType) -> Self {
        t.code()
    }
}

/// Counterparty of a voucher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    /// Document type
    pub doc_type: DocumentType,
    /// Document number; 0 when unidentified
    pub doc_number: u64,
}

impl Recipient {
    /// Anonymous final consumer (99 / 0).
    pub fn final_consumer() -> Self {
        Self {
            doc_type: DocumentType::Unidentified,
            doc_number: 0,
        }
    }

    /// Recipient identified by DNI.
    pub fn dni(number: u64) -> Self {
        Self {
            doc_type: DocumentType::Dni,
            doc_number: number,
        }
    }

    /// Builds a recipient from a free-form tax id.
    ///
    /// An 11-digit id is sent as a CUIT; anything else (empty, `"0"`,
    /// short ids) falls back to an unidentified final consumer.
    pub fn from_tax_id(tax_id: &str) -> Self {
        let digits: String = tax_id.chars().filter(|c| *c != '-').collect();
        if digits.len() == 11 && digits.chars().all(|c| c.is_ascii_digit()) {
            if let Ok(number) = digits.parse() {
                return Self {
                    doc_type: DocumentType::Cuit,
                    doc_number: number,
                };
            }
        }
        Self::final_consumer()
    }

    /// Whether the recipient is anonymous.
    pub fn is_anonymous(&self) -> bool {
        self.doc_type == DocumentType::Unidentified
    }
}

impl Default for Recipient {
    fn default() -> Self {
        Self::final_consumer()
    }
}

// ============================================================================
// VoucherNumber
// ============================================================================

/// Full voucher number: point of sale plus sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VoucherNumber {
    /// Issuing point of sale
    pub point_of_sale: PointOfSale,
    /// Sequence number within (point of sale, voucher type)
    pub number: u64,
}

impl VoucherNumber {
    /// Parses `PPPP-NNNNNNNN`, or a bare sequence number with `default_pos`.
    pub fn parse(input: &str, default_pos: PointOfSale) -> Result<Self> {
        let invalid = || Error::validation_field("number", format!("invalid voucher number '{input}'"));
        match input.trim().split_once('-') {
            Some((pos, number)) => {
                let pos = pos.parse::<u32>().map_err(|_| invalid())?;
                Ok(Self {
                    point_of_sale: PointOfSale::new(pos)?,
                    number: number.parse().map_err(|_| invalid())?,
                })
            }
            None => Ok(Self {
                point_of_sale: default_pos,
                number: input.trim().parse().map_err(|_| invalid())?,
            }),
        }
    }
}

impl fmt::Display for VoucherNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{:08}", self.point_of_sale, self.number)
    }
}

// ============================================================================
// VatRate
// ============================================================================

/// VAT rate, identified on the wire by its `AlicIva` id.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(try_from = "f64", into = "f64")]
pub enum VatRate {
    /// 0% (exempt)
    Zero,
    /// 2.5%
    TwoAndHalf,
    /// 5%
    Five,
    /// 10.5%
    TenAndHalf,
    /// 21%
    #[default]
    TwentyOne,
    /// 27%
    TwentySeven,
}

impl VatRate {
    /// Rate in basis points (21% = 2100).
    pub fn basis_points(&self) -> i64 {
        match self {
            Self::Zero => 0,
            Self::TwoAndHalf => 250,
            Self::Five => 500,
            Self::TenAndHalf => 1050,
            Self::TwentyOne => 2100,
            Self::TwentySeven => 2700,
        }
    }

    /// `AlicIva/Id` code.
    pub fn afip_id(&self) -> u16 {
        match self {
            Self::Zero => 3,
            Self::TwoAndHalf => 9,
            Self::Five => 8,
            Self::TenAndHalf => 4,
            Self::TwentyOne => 5,
            Self::TwentySeven => 6,
        }
    }

    /// Percentage label without trailing zeros (`"10.5%"`).
    pub fn label(&self) -> &'static str {
        match self {
            Self::Zero => "0%",
            Self::TwoAndHalf => "2.5%",
            Self::Five => "5%",
            Self::TenAndHalf => "10.5%",
            Self::TwentyOne => "21%",
            Self::TwentySeven => "27%",
        }
    }

    /// Parses a percentage such as `21.0` or `10.5`.
    pub fn from_percent(percent: f64) -> Result<Self> {
        let bp = (percent * 100.0).round() as i64;
        [
            Self::Zero,
            Self::TwoAndHalf,
            Self::Five,
            Self::TenAndHalf,
            Self::TwentyOne,
            Self::TwentySeven,
        ]
        .into_iter()
        .find(|r| r.basis_points() == bp)
        .ok_or_else(|| Error::validation_field("vat_rate", format!("unsupported rate {percent}%")))
    }
}

impl TryFrom<f64> for VatRate {
    type Error = Error;

    fn try_from(percent: f64) -> Result<Self> {
        Self::from_percent(percent)
    }
}

impl From<VatRate> for f64 {
    fn from(rate: VatRate) -> Self {
        rate.basis_points() as f64 / 100.0
    }
}
