//! Exact money and quantity values.
//!
//! [`Amount`] stores integer cents and [`Quantity`] stores thousandths of a
//! unit. Floating point only appears at the JSON boundary, where numbers
//! are rounded once to the nearest cent or thousandth.

use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::{Error, Result};

/// Monetary amount in Argentine pesos, stored as cents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Amount(i64);

impl Amount {
    /// Zero pesos.
    pub const ZERO: Amount = Amount(0);

    /// Creates an amount from cents.
    pub const fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    /// Returns the value in cents.
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Whether the amount is strictly positive.
    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Whether the amount is zero.
    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Applies a rate expressed in basis points, rounding half away from zero.
    ///
    /// ```
    /// use arca_core::Amount;
    ///
    /// let net: Amount = "100.05".parse().unwrap();
    /// assert_eq!(net.percent_of(2100).wire(), "21.01");
    /// ```
    pub fn percent_of(&self, basis_points: i64) -> Self {
        Self(div_round(i128::from(self.0) * i128::from(basis_points), 10_000))
    }

    /// Multiplies a unit price by a quantity, rounding to the cent.
    pub fn times(&self, quantity: Quantity) -> Self {
        Self(div_round(
            i128::from(self.0) * i128::from(quantity.milli()),
            1_000,
        ))
    }

    /// `self * part / whole`, rounded to the cent. A zero `whole` yields zero.
    pub fn prorate(&self, part: i64, whole: i64) -> Self {
        if whole == 0 {
            return Self::ZERO;
        }
        Self(div_round(i128::from(self.0) * i128::from(part), i128::from(whole)))
    }

    /// Plain decimal form for SOAP requests: `1234.56`.
    pub fn wire(&self) -> String {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        format!("{sign}{}.{:02}", abs / 100, abs % 100)
    }

    /// Receipt form with thousands separators: `1,234.56`.
    pub fn grouped(&self) -> String {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        format!("{sign}{}.{:02}", group_thousands(abs / 100), abs % 100)
    }

    /// Lossy conversion for display-only contexts such as the QR payload.
    pub fn as_f64(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    fn from_f64(value: f64) -> Result<Self> {
        if !value.is_finite() {
            return Err(Error::validation(format!("invalid amount {value}")));
        }
        Ok(Self((value * 100.0).round() as i64))
    }
}

fn div_round(numerator: i128, denominator: i128) -> i64 {
    let q = (numerator.abs() + denominator / 2) / denominator;
    let q = if numerator < 0 { -q } else { q };
    q as i64
}

fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Splits `"-12.5"` into sign, integer digits and fractional digits.
fn split_decimal(input: &str) -> Option<(bool, &str, &str)> {
    let s = input.trim();
    let (negative, s) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s),
    };
    let (int, frac) = s.split_once('.').unwrap_or((s, ""));
    if int.is_empty() && frac.is_empty() {
        return None;
    }
    if !int.chars().all(|c| c.is_ascii_digit()) || !frac.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    Some((negative, int, frac))
}

fn parse_scaled(input: &str, places: usize, what: &str) -> Result<i64> {
    let invalid = || Error::validation(format!("invalid {what} '{input}'"));
    let (negative, int, frac) = split_decimal(input).ok_or_else(invalid)?;
    if frac.len() > places {
        return Err(Error::validation(format!(
            "{what} '{input}' has more than {places} decimals"
        )));
    }
    let int: i64 = if int.is_empty() {
        0
    } else {
        int.parse().map_err(|_| invalid())?
    };
    let padded = format!("{frac:0<places$}");
    let frac: i64 = if places == 0 {
        0
    } else {
        padded.parse().map_err(|_| invalid())?
    };
    let scale = 10_i64.pow(places as u32);
    let value = int
        .checked_mul(scale)
        .and_then(|v| v.checked_add(frac))
        .ok_or_else(invalid)?;
    Ok(if negative { -value } else { value })
}

impl FromStr for Amount {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        parse_scaled(s, 2, "amount").map(Self)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.wire())
    }
}

impl Add for Amount {
    type Output = Amount;

    fn add(self, rhs: Amount) -> Amount {
        Amount(self.0 + rhs.0)
    }
}

impl AddAssign for Amount {
    fn add_assign(&mut self, rhs: Amount) {
        self.0 += rhs.0;
    }
}

impl Sub for Amount {
    type Output = Amount;

    fn sub(self, rhs: Amount) -> Amount {
        Amount(self.0 - rhs.0)
    }
}

impl SubAssign for Amount {
    fn sub_assign(&mut self, rhs: Amount) {
        self.0 -= rhs.0;
    }
}

impl Neg for Amount {
    type Output = Amount;

    fn neg(self) -> Amount {
        Amount(-self.0)
    }
}

impl Sum for Amount {
    fn sum<I: Iterator<Item = Amount>>(iter: I) -> Amount {
        iter.fold(Amount::ZERO, Add::add)
    }
}

impl<'a> Sum<&'a Amount> for Amount {
    fn sum<I: Iterator<Item = &'a Amount>>(iter: I) -> Amount {
        iter.copied().sum()
    }
}

/// JSON accepts either a number (`1210.5`) or a string (`"1210.50"`).
#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(f64),
    Text(String),
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.wire())
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        match NumberOrString::deserialize(deserializer)? {
            NumberOrString::Number(n) => Amount::from_f64(n),
            NumberOrString::Text(s) => s.parse(),
        }
        .map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// Quantity
// ============================================================================

/// Quantity sold, stored in thousandths (weighed goods use three decimals).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Quantity(i64);

impl Quantity {
    /// One unit.
    pub const ONE: Quantity = Quantity(1_000);

    /// Creates a quantity from thousandths.
    pub const fn from_milli(milli: i64) -> Self {
        Self(milli)
    }

    /// Creates a whole-unit quantity.
    pub const fn units(units: i64) -> Self {
        Self(units * 1_000)
    }

    /// Returns the value in thousandths.
    pub const fn milli(&self) -> i64 {
        self.0
    }
}

impl Default for Quantity {
    fn default() -> Self {
        Self::ONE
    }
}

impl fmt::Display for Quantity {
    /// Always three decimals, as printed on receipts (`1.500`).
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}{}.{:03}", abs / 1_000, abs % 1_000)
    }
}

impl FromStr for Quantity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        parse_scaled(s, 3, "quantity").map(Self)
    }
}

impl Serialize for Quantity {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Quantity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        match NumberOrString::deserialize(deserializer)? {
            NumberOrString::Number(n) if n.is_finite() => Ok(Quantity((n * 1_000.0).round() as i64)),
            NumberOrString::Number(n) => Err(Error::validation(format!("invalid quantity {n}"))),
            NumberOrString::Text(s) => s.parse(),
        }
        .map_err(serde::de::Error::custom)
    }
}
