use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AmountError {
    #[error("amount must be positive")]
    NotPositive,
    #[error("amount has more than two decimal places: {0}")]
    TooPrecise(String),
    #[error("invalid amount: {0}")]
    Invalid(String),
}

/// Positive payment amount held in minor units (1/100 of the display unit).
///
/// Currency-agnostic: the gateway decides what the unit means.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct Amount(i64);

impl Amount {
    pub fn from_minor(minor: i64) -> Result<Self, AmountError> {
        if minor <= 0 {
            return Err(AmountError::NotPositive);
        }
        Ok(Self(minor))
    }

    pub fn from_major(major: i64) -> Result<Self, AmountError> {
        let minor = major.checked_mul(100).ok_or_else(|| AmountError::Invalid(major.to_string()))?;
        Self::from_minor(minor)
    }

    pub fn minor(&self) -> i64 {
        self.0
    }

    /// Value sent to the gateway as `price_amount`.
    pub fn as_f64(&self) -> f64 {
        self.0 as f64 / 100.0
    }
}

impl TryFrom<i64> for Amount {
    type Error = AmountError;

    fn try_from(minor: i64) -> Result<Self, Self::Error> {
        Self::from_minor(minor)
    }
}

impl From<Amount> for i64 {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

impl FromStr for Amount {
    type Err = AmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (whole, frac) = match s.split_once('.') {
            Some((w, f)) => (w, f),
            None => (s, ""),
        };

        if whole.is_empty() || !whole.bytes().all(|b| b.is_ascii_digit()) {
            return Err(AmountError::Invalid(s.to_string()));
        }
        if !frac.bytes().all(|b| b.is_ascii_digit()) {
            return Err(AmountError::Invalid(s.to_string()));
        }
        if frac.len() > 2 {
            return Err(AmountError::TooPrecise(s.to_string()));
        }

        let whole: i64 = whole.parse().map_err(|_| AmountError::Invalid(s.to_string()))?;
        let frac: i64 = match frac.len() {
            0 => 0,
            1 => frac.parse::<i64>().map_err(|_| AmountError::Invalid(s.to_string()))? * 10,
            _ => frac.parse().map_err(|_| AmountError::Invalid(s.to_string()))?,
        };

        let minor = whole
            .checked_mul(100)
            .and_then(|m| m.checked_add(frac))
            .ok_or_else(|| AmountError::Invalid(s.to_string()))?;
        Self::from_minor(minor)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (whole, frac) = (self.0 / 100, self.0 % 100);
        if frac == 0 {
            write!(f, "{}", whole)
        } else {
            write!(f, "{}.{:02}", whole, frac)
        }
    }
}
