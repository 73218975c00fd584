//! Fixed-point monetary amounts.
//!
//! Every amount is held in integer minor units (cents) so sums and products
//! never pick up binary floating-point drift. Only parsing and formatting deal
//! with the decimal form.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Money(i64);

impl Money {
    pub const ZERO: Money = Money(0);

    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    pub const fn cents(self) -> i64 {
        self.0
    }

    /// Convert a major-unit float through its shortest round-trip text, so a
    /// JSON number and the same amount typed as a string land on the same cents.
    pub fn from_major(value: f64) -> Result<Self, ValidationError> {
        value.to_string().parse()
    }

    /// Round to cents, halves away from zero.
    fn from_decimal(value: Decimal, raw: &str) -> Result<Self, ValidationError> {
        value
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
            .checked_mul(Decimal::ONE_HUNDRED)
            .and_then(|cents| cents.to_i64())
            .map(Money)
            .ok_or_else(|| ValidationError::OutOfRange(raw.to_string()))
    }
}

impl FromStr for Money {
    type Err = ValidationError;

    /// Accepts `12`, `12.5`, `-3.40`, `+0,75`. More than two fraction digits
    /// are rounded half away from zero.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.trim();
        let invalid = || ValidationError::NotANumber(s.to_string());

        let (negative, unsigned) = match raw.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, raw.strip_prefix('+').unwrap_or(raw)),
        };

        let (whole, fraction) = match unsigned.find(|c: char| c == '.' || c == ',') {
            Some(idx) => (&unsigned[..idx], &unsigned[idx + 1..]),
            None => (unsigned, ""),
        };

        // Only plain digits: no exponents, underscores, NaN or inf
        if whole.is_empty() && fraction.is_empty() {
            return Err(invalid());
        }
        if !whole.bytes().all(|b| b.is_ascii_digit()) || !fraction.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }

        let canonical = format!(
            "{}{}.{}",
            if negative { "-" } else { "" },
            if whole.is_empty() { "0" } else { whole },
            if fraction.is_empty() { "0" } else { fraction },
        );
        let value = Decimal::from_str(&canonical).map_err(|_| ValidationError::OutOfRange(s.to_string()))?;

        Money::from_decimal(value, s)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        f.pad(&format!("{}{}.{:02}", sign, abs / 100, abs % 100))
    }
}

impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Stored amounts show up both as typed-in strings and as plain numbers.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawAmount {
    Text(String),
    Number(f64),
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let parsed = match RawAmount::deserialize(deserializer)? {
            RawAmount::Text(text) => text.parse(),
            RawAmount::Number(value) => Money::from_major(value),
        };
        parsed.map_err(serde::de::Error::custom)
    }
}
