//! Upper bound on stored amounts (warehouse capacities, product prices).
//!
//! Stores keep amounts as signed 64-bit integers, so anything above
//! [`MAX_AMOUNT`] is refused where it enters the domain.

use serde::{Deserialize, Deserializer};

use crate::error::{DomainError, DomainResult};

/// Largest capacity or price the domain accepts.
pub const MAX_AMOUNT: u64 = i64::MAX as u64;

/// Validate that `value` is at most [`MAX_AMOUNT`].
pub fn check_amount(what: &str, value: u64) -> DomainResult<u64> {
    if value > MAX_AMOUNT {
        return Err(DomainError::validation(format!(
            "{what} {value} exceeds the maximum of {MAX_AMOUNT}"
        )));
    }
    Ok(value)
}

/// `#[serde(deserialize_with)]` helper applying [`check_amount`].
pub fn deserialize_amount<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = u64::deserialize(deserializer)?;
    check_amount("amount", value).map_err(serde::de::Error::custom)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize)]
    struct Priced {
        #[serde(deserialize_with = "deserialize_amount")]
        price: u64,
    }

    #[test]
    fn amounts_up_to_the_bound_pass() {
        assert_eq!(check_amount("capacity", 0), Ok(0));
        assert_eq!(check_amount("capacity", MAX_AMOUNT), Ok(MAX_AMOUNT));
    }

    #[test]
    fn amounts_above_the_bound_are_validation_errors() {
        assert!(matches!(
            check_amount("price", MAX_AMOUNT + 1),
            Err(DomainError::Validation(msg)) if msg.starts_with("price 9223372036854775808")
        ));
    }

    #[test]
    fn deserialization_applies_the_bound() {
        let ok: Priced = serde_json::from_str(r#"{"price": 9223372036854775807}"#).unwrap();
        assert_eq!(ok.price, MAX_AMOUNT);

        let err = serde_json::from_str::<Priced>(r#"{"price": 9223372036854775808}"#).unwrap_err();
        assert!(err.to_string().contains("exceeds the maximum"));
    }
}
