use std::str::FromStr;

use bigdecimal::BigDecimal;
use serde::{de, Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// Normalize a monetary value to 2 decimal places (plain truncation/extension via with_scale).
pub fn normalize_scale(value: &BigDecimal) -> BigDecimal {
    value.with_scale(2)
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AmountError {
    #[error("amount is not numeric: {0}")]
    NotNumeric(String),
}

/// Monetary amount pinned to a scale of two decimal places.
///
/// Accepts JSON strings ("10.5") as well as JSON numbers (10.5) on the wire;
/// callers embedding amounts in outbound payloads use [`Amount::formatted`],
/// which always renders exactly two decimals ("10.50").
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Amount(BigDecimal);

impl Amount {
    pub fn parse(raw: &str) -> Result<Self, AmountError> {
        let value = BigDecimal::from_str(raw.trim())
            .map_err(|_| AmountError::NotNumeric(raw.to_string()))?;
        Ok(Self(normalize_scale(&value)))
    }

    /// Wire form with exactly two decimal places, e.g. "10.50".
    pub fn formatted(&self) -> String {
        self.0.to_string()
    }

    pub fn inner(&self) -> &BigDecimal {
        &self.0
    }
}

impl From<BigDecimal> for Amount {
    fn from(value: BigDecimal) -> Self {
        Self(normalize_scale(&value))
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        match serde_json::Value::deserialize(deserializer)? {
            serde_json::Value::String(s) => Amount::parse(&s).map_err(de::Error::custom),
            serde_json::Value::Number(n) => Amount::parse(&n.to_string()).map_err(de::Error::custom),
            other => Err(de::Error::custom(format!(
                "amount must be a number or numeric string, got {other}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_two_decimals() {
        assert_eq!(Amount::parse("10.5").unwrap().formatted(), "10.50");
        assert_eq!(Amount::parse("7").unwrap().formatted(), "7.00");
        assert_eq!(Amount::parse("0.1").unwrap().formatted(), "0.10");
    }

    #[test]
    fn extra_precision_is_cut_to_scale() {
        let v = BigDecimal::parse_bytes(b"12.3456", 10).unwrap();
        assert_eq!(normalize_scale(&v).to_string(), "12.34");
    }

    #[test]
    fn rejects_non_numeric() {
        assert!(matches!(
            Amount::parse("ten"),
            Err(AmountError::NotNumeric(_))
        ));
    }

    #[test]
    fn deserializes_from_string_and_number() {
        let from_string: Amount = serde_json::from_str("\"10.5\"").unwrap();
        let from_number: Amount = serde_json::from_str("10.5").unwrap();
        assert_eq!(from_string, from_number);
        assert_eq!(from_string.formatted(), "10.50");
    }

    #[test]
    fn rejects_other_json_shapes() {
        assert!(serde_json::from_str::<Amount>("true").is_err());
        assert!(serde_json::from_str::<Amount>("[1]").is_err());
    }
}
