//! Fixed-point credit amounts.
//!
//! [`Credits`] stores hundredths of a credit in an `i64`, so the 0.50 AI
//! session fee and the 1.00 human session fee are exact. Amounts are
//! serialized in JSON as decimal strings (`"1.50"`) and accepted as either
//! strings or numbers.

use std::fmt;
use std::ops::{Add, Neg, Sub};
use std::str::FromStr;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use utoipa::ToSchema;

/// Hundredths per whole credit.
const SCALE: i64 = 100;

/// A signed credit amount with two fractional digits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, ToSchema)]
#[schema(value_type = String, example = "1.00")]
pub struct Credits(i64);

/// Error returned when a string is not a valid credit amount.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid credit amount: {0}")]
pub struct ParseCreditsError(String);

impl Credits {
    /// Zero credits.
    pub const ZERO: Self = Self(0);

    /// Creates an amount from a count of hundredths.
    #[must_use]
    pub const fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    /// Creates an amount from whole credits.
    #[must_use]
    pub const fn whole(credits: i64) -> Self {
        Self(credits * SCALE)
    }

    /// Returns the amount as a count of hundredths.
    #[must_use]
    pub const fn cents(self) -> i64 {
        self.0
    }

    /// Returns `true` if the amount is strictly positive.
    #[must_use]
    pub const fn is_positive(self) -> bool {
        self.0 > 0
    }

    /// Returns `true` if the amount is strictly negative.
    #[must_use]
    pub const fn is_negative(self) -> bool {
        self.0 < 0
    }

    /// Adds two amounts, returning `None` on overflow.
    #[must_use]
    pub const fn checked_add(self, other: Self) -> Option<Self> {
        match self.0.checked_add(other.0) {
            Some(v) => Some(Self(v)),
            None => None,
        }
    }
}

impl Add for Credits {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0.saturating_add(rhs.0))
    }
}

impl Sub for Credits {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self(self.0.saturating_sub(rhs.0))
    }
}

impl Neg for Credits {
    type Output = Self;

    fn neg(self) -> Self {
        Self(self.0.saturating_neg())
    }
}

impl fmt::Display for Credits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let scale = SCALE.unsigned_abs();
        write!(f, "{sign}{}.{:02}", abs / scale, abs % scale)
    }
}

impl FromStr for Credits {
    type Err = ParseCreditsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseCreditsError(s.to_string());
        let trimmed = s.trim();
        let (negative, digits) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
        };
        let (int_part, frac_part) = match digits.split_once('.') {
            Some((i, f)) => (i, f),
            None => (digits, ""),
        };
        if int_part.is_empty() && frac_part.is_empty() {
            return Err(err());
        }
        if frac_part.len() > 2
            || !int_part.bytes().all(|b| b.is_ascii_digit())
            || !frac_part.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(err());
        }
        let whole: i64 = if int_part.is_empty() {
            0
        } else {
            int_part.parse().map_err(|_| err())?
        };
        let frac: i64 = match frac_part.len() {
            0 => 0,
            1 => frac_part.parse::<i64>().map_err(|_| err())? * 10,
            _ => frac_part.parse().map_err(|_| err())?,
        };
        let cents = whole
            .checked_mul(SCALE)
            .and_then(|c| c.checked_add(frac))
            .ok_or_else(err)?;
        Ok(Self(if negative { -cents } else { cents }))
    }
}

impl Serialize for Credits {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Credits {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(CreditsVisitor)
    }
}

struct CreditsVisitor;

impl Visitor<'_> for CreditsVisitor {
    type Value = Credits;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a credit amount as a decimal string or number")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Credits, E> {
        v.parse().map_err(E::custom)
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Credits, E> {
        v.checked_mul(SCALE)
            .map(Credits)
            .ok_or_else(|| E::custom("credit amount out of range"))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Credits, E> {
        i64::try_from(v)
            .map_err(|_| E::custom("credit amount out of range"))
            .and_then(|v| self.visit_i64(v))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Credits, E> {
        // Rounded to hundredths before conversion.
        format!("{v:.2}").parse().map_err(E::custom)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn display_pads_fraction() {
        assert_eq!(Credits::from_cents(150).to_string(), "1.50");
        assert_eq!(Credits::from_cents(5).to_string(), "0.05");
        assert_eq!(Credits::from_cents(-50).to_string(), "-0.50");
        assert_eq!(Credits::whole(3).to_string(), "3.00");
    }

    #[test]
    fn parses_common_forms() {
        assert_eq!("1".parse(), Ok(Credits::from_cents(100)));
        assert_eq!("1.5".parse(), Ok(Credits::from_cents(150)));
        assert_eq!("0.50".parse(), Ok(Credits::from_cents(50)));
        assert_eq!(".25".parse(), Ok(Credits::from_cents(25)));
        assert_eq!("-2.00".parse(), Ok(Credits::from_cents(-200)));
    }

    #[test]
    fn rejects_malformed_amounts() {
        assert!("".parse::<Credits>().is_err());
        assert!("1.234".parse::<Credits>().is_err());
        assert!("abc".parse::<Credits>().is_err());
        assert!("1.2.3".parse::<Credits>().is_err());
        assert!(".".parse::<Credits>().is_err());
    }

    #[test]
    fn deserializes_strings_and_numbers() {
        let Ok(a) = serde_json::from_str::<Credits>("\"2.50\"") else {
            panic!("string form should parse");
        };
        let Ok(b) = serde_json::from_str::<Credits>("2.5") else {
            panic!("float form should parse");
        };
        let Ok(c) = serde_json::from_str::<Credits>("3") else {
            panic!("integer form should parse");
        };
        assert_eq!(a, Credits::from_cents(250));
        assert_eq!(b, a);
        assert_eq!(c, Credits::whole(3));
    }

    #[test]
    fn serializes_as_string() {
        let Ok(json) = serde_json::to_string(&Credits::from_cents(50)) else {
            panic!("serialization failed");
        };
        assert_eq!(json, "\"0.50\"");
    }

    #[test]
    fn arithmetic_and_sign() {
        let balance = Credits::whole(1) - Credits::from_cents(150);
        assert!(balance.is_negative());
        assert_eq!(-balance, Credits::from_cents(50));
        assert_eq!(Credits::whole(1) + Credits::from_cents(50), Credits::from_cents(150));
        assert!(Credits::from_cents(1).is_positive());
        assert!(!Credits::ZERO.is_positive());
    }
}
