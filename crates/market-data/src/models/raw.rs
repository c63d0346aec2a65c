//! Accessors for the opaque raw field maps returned by upstream providers.
//!
//! Raw payloads are `serde_json::Value` objects. These helpers read a single
//! field and convert it, returning `None` when the field is absent, null, or
//! not convertible - the null-field policy of every canonical model rests on
//! them.

use num_traits::FromPrimitive;
use rust_decimal::Decimal;
use serde_json::Value;

/// Read a numeric field as a `Decimal`.
pub(crate) fn decimal_field(raw: &Value, key: &str) -> Option<Decimal> {
    raw.get(key)
        .and_then(Value::as_f64)
        .and_then(Decimal::from_f64_retain)
}

/// Read an integer field as a `u64`.
pub(crate) fn u64_field(raw: &Value, key: &str) -> Option<u64> {
    raw.get(key).and_then(Value::as_u64).or_else(|| {
        // Some upstreams serialize counts as floats
        raw.get(key)
            .and_then(Value::as_f64)
            .and_then(u64::from_f64)
    })
}

/// Read a string field.
pub(crate) fn string_field(raw: &Value, key: &str) -> Option<String> {
    raw.get(key)
        .and_then(Value::as_str)
        .map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn test_decimal_field_present() {
        let raw = json!({"price": 150.25});
        assert_eq!(decimal_field(&raw, "price"), Some(dec!(150.25)));
    }

    #[test]
    fn test_decimal_field_missing_and_null() {
        let raw = json!({"price": null});
        assert_eq!(decimal_field(&raw, "price"), None);
        assert_eq!(decimal_field(&raw, "absent"), None);
    }

    #[test]
    fn test_decimal_field_wrong_type() {
        let raw = json!({"price": "150.25"});
        assert_eq!(decimal_field(&raw, "price"), None);
    }

    #[test]
    fn test_u64_field_from_float() {
        let raw = json!({"volume": 1000000.0});
        assert_eq!(u64_field(&raw, "volume"), Some(1_000_000));
    }

    #[test]
    fn test_string_field() {
        let raw = json!({"name": "Apple Inc."});
        assert_eq!(string_field(&raw, "name"), Some("Apple Inc.".to_string()));
        assert_eq!(string_field(&raw, "absent"), None);
    }
}
