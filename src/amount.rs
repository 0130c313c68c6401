use serde::{
    Deserialize,
    Deserializer,
    Serialize,
    Serializer,
    de,
};
use std::{
    fmt,
    str::FromStr,
};

/// Number of decimal places carried by a TON amount.
pub const DECIMAL_PLACES: u32 = 9;
const ONE_TON: u64 = 1_000_000_000;

/// A non-negative TON amount held as integer nano-TON.
///
/// The backend exchanges amounts as JSON decimal numbers of TON, so the serde
/// impls convert at the boundary and everything in between stays integral.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Amount(u64);

#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum ParseAmountError {
    #[error("amount is empty")]
    Empty,
    #[error("'{0}' is not a decimal amount")]
    Invalid(String),
    #[error("'{0}' has more than 9 decimal places")]
    TooPrecise(String),
    #[error("'{0}' is too large")]
    Overflow(String),
}

impl Amount {
    pub const ZERO: Amount = Amount(0);

    pub const fn from_nanotons(nanotons: u64) -> Self {
        Amount(nanotons)
    }

    pub const fn from_ton(ton: u64) -> Self {
        Amount(ton.saturating_mul(ONE_TON))
    }

    pub const fn nanotons(self) -> u64 {
        self.0
    }

    /// Converts a wire value in TON, rounding to the nearest nano-TON.
    pub fn from_ton_f64(ton: f64) -> Option<Self> {
        if !ton.is_finite() || ton < 0.0 {
            return None;
        }
        let scaled = (ton * ONE_TON as f64).round();
        if scaled > u64::MAX as f64 {
            return None;
        }
        Some(Amount(scaled as u64))
    }

    pub fn as_ton_f64(self) -> f64 {
        self.0 as f64 / ONE_TON as f64
    }

    pub fn saturating_add(self, other: Amount) -> Amount {
        Amount(self.0.saturating_add(other.0))
    }

    pub fn saturating_sub(self, other: Amount) -> Amount {
        Amount(self.0.saturating_sub(other.0))
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0 / ONE_TON;
        let fractional = self.0 % ONE_TON;
        if fractional == 0 {
            write!(f, "{whole}")
        } else {
            let digits = format!("{:09}", fractional);
            write!(f, "{}.{}", whole, digits.trim_end_matches('0'))
        }
    }
}

impl FromStr for Amount {
    type Err = ParseAmountError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ParseAmountError::Empty);
        }
        let (whole, fraction) = match trimmed.split_once('.') {
            Some((w, f)) => (w, f),
            None => (trimmed, ""),
        };
        if (whole.is_empty() && fraction.is_empty())
            || !whole.chars().all(|c| c.is_ascii_digit())
            || !fraction.chars().all(|c| c.is_ascii_digit())
        {
            return Err(ParseAmountError::Invalid(trimmed.to_string()));
        }
        if fraction.len() > DECIMAL_PLACES as usize {
            return Err(ParseAmountError::TooPrecise(trimmed.to_string()));
        }
        let whole_value: u64 = if whole.is_empty() {
            0
        } else {
            whole
                .parse()
                .map_err(|_| ParseAmountError::Overflow(trimmed.to_string()))?
        };
        let fraction_value: u64 = if fraction.is_empty() {
            0
        } else {
            let padded = format!("{:0<9}", fraction);
            padded
                .parse()
                .map_err(|_| ParseAmountError::Invalid(trimmed.to_string()))?
        };
        whole_value
            .checked_mul(ONE_TON)
            .and_then(|n| n.checked_add(fraction_value))
            .map(Amount)
            .ok_or_else(|| ParseAmountError::Overflow(trimmed.to_string()))
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.as_ton_f64())
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct AmountVisitor;

        impl de::Visitor<'_> for AmountVisitor {
            type Value = Amount;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a non-negative TON amount")
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> Result<Amount, E> {
                Amount::from_ton_f64(v)
                    .ok_or_else(|| E::custom(format!("invalid TON amount {v}")))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Amount, E> {
                v.checked_mul(ONE_TON)
                    .map(Amount)
                    .ok_or_else(|| E::custom(format!("TON amount {v} overflows")))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Amount, E> {
                let v = u64::try_from(v)
                    .map_err(|_| E::custom(format!("negative TON amount {v}")))?;
                self.visit_u64(v)
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Amount, E> {
                v.parse().map_err(E::custom)
            }
        }

        deserializer.deserialize_any(AmountVisitor)
    }
}
