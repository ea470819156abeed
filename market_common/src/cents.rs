use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, Neg, Sub, SubAssign},
    str::FromStr,
};

use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

use crate::op;

//--------------------------------------        Cents          ---------------------------------------------------------
/// A monetary amount in minor units (hundredths) of whatever currency it accompanies.
#[derive(Debug, Clone, Copy, Default, Type, PartialEq, Eq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct Cents(i64);

op!(binary Cents, Add, add);
op!(binary Cents, Sub, sub);
op!(inplace Cents, SubAssign, sub_assign);
op!(unary Cents, Neg, neg);

impl Sum for Cents {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CentsConversionError {
    #[error("Not a valid two-decimal amount: {0}")]
    InvalidAmount(String),
    #[error("Amount {0} cannot be converted at rate {1}")]
    InvalidRate(i64, String),
}

impl From<i64> for Cents {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl Cents {
    pub fn value(&self) -> i64 {
        self.0
    }

    pub fn from_whole_units(units: i64) -> Self {
        Self(units * 100)
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Formats the amount as a fixed two-decimal string, e.g. `1250` becomes `"12.50"`.
    ///
    /// This is the only representation that is ever sent to the payment gateway.
    pub fn to_fixed_string(&self) -> String {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        format!("{sign}{}.{:02}", abs / 100, abs % 100)
    }

    /// Converts this amount into another currency, using `rate` units of the target currency per unit of this one.
    /// The result is rounded half away from zero to the nearest minor unit.
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
    pub fn convert(&self, rate: f64) -> Result<Cents, CentsConversionError> {
        if !rate.is_finite() || rate <= 0.0 {
            return Err(CentsConversionError::InvalidRate(self.0, rate.to_string()));
        }
        let converted = (self.0 as f64 * rate).round();
        if !converted.is_finite() || converted.abs() >= i64::MAX as f64 {
            return Err(CentsConversionError::InvalidRate(self.0, rate.to_string()));
        }
        Ok(Cents(converted as i64))
    }
}

impl Display for Cents {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_fixed_string())
    }
}

/// Parses decimal strings with at most two fractional digits ("12", "12.5", "12.50").
///
/// Gateways are string-typed and tolerant of garbage, so anything else (exponents, thousands separators, stray
/// whitespace, a third decimal) is rejected.
impl FromStr for Cents {
    type Err = CentsConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || CentsConversionError::InvalidAmount(s.to_string());
        let (negative, digits) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s),
        };
        let (whole, frac) = match digits.split_once('.') {
            Some((w, f)) => (w, f),
            None => (digits, ""),
        };
        let all_digits = |p: &str| p.bytes().all(|b| b.is_ascii_digit());
        if whole.is_empty() || !all_digits(whole) || !all_digits(frac) || frac.len() > 2 {
            return Err(invalid());
        }
        if digits.contains('.') && frac.is_empty() {
            return Err(invalid());
        }
        let whole = whole.parse::<i64>().map_err(|_| invalid())?;
        let frac = match frac.len() {
            0 => 0,
            1 => frac.parse::<i64>().map_err(|_| invalid())? * 10,
            _ => frac.parse::<i64>().map_err(|_| invalid())?,
        };
        let value = whole.checked_mul(100).and_then(|w| w.checked_add(frac)).ok_or_else(invalid)?;
        Ok(Cents(if negative { -value } else { value }))
    }
}
