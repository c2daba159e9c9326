//! The datum tagged union and its document conversion.
//!
//! A datum is the opaque value carried by literal terms: the JSON scalar
//! and container types plus a temporal type. Conversion from a decoded
//! document enforces the configured limits; the schema version is part of
//! the conversion contract so replayed terms from older nodes convert the
//! same way they did when first ingested.

use std::collections::BTreeMap;

use serde_json::Value;

use super::errors::{DatumError, DatumResult};
use super::limits::ParseLimits;
use super::version::SchemaVersion;

/// Key marking an object as the wire form of a non-JSON datum type
const TYPE_KEY: &str = "$type";

/// Tag value for temporal datums
const TIME_TAG: &str = "TIME";

/// Field holding the epoch seconds of a temporal datum
const EPOCH_KEY: &str = "epoch_seconds";

/// Datum type tags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatumTag {
    Null,
    Bool,
    Num,
    Str,
    Array,
    Object,
    Time,
}

/// A single immutable value
#[derive(Debug, Clone, PartialEq)]
pub enum Datum {
    Null,
    Bool(bool),
    Num(f64),
    Str(String),
    Array(Vec<Datum>),
    Object(BTreeMap<String, Datum>),
    /// Seconds since the Unix epoch, UTC
    Time(f64),
}

impl Datum {
    /// Convert a decoded document into a datum under the given limits and
    /// schema version.
    pub fn from_json(
        value: &Value,
        limits: &ParseLimits,
        version: SchemaVersion,
    ) -> DatumResult<Datum> {
        match value {
            Value::Null => Ok(Datum::Null),
            Value::Bool(b) => Ok(Datum::Bool(*b)),
            Value::Number(n) => {
                let num = n.as_f64().unwrap_or(f64::NAN);
                if !num.is_finite() {
                    return Err(DatumError::NonFiniteNumber(num));
                }
                Ok(Datum::Num(num))
            }
            Value::String(s) => Ok(Datum::Str(s.clone())),
            Value::Array(items) => {
                if let Some(limit) = limits.max_array_size {
                    if items.len() > limit {
                        return Err(DatumError::ArrayTooLarge {
                            size: items.len(),
                            limit,
                        });
                    }
                }
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(Datum::from_json(item, limits, version)?);
                }
                Ok(Datum::Array(out))
            }
            Value::Object(fields) => {
                if fields.get(TYPE_KEY).and_then(Value::as_str) == Some(TIME_TAG) {
                    return Self::time_from_fields(fields);
                }
                let mut out = BTreeMap::new();
                for (key, field) in fields {
                    out.insert(key.clone(), Datum::from_json(field, limits, version)?);
                }
                Ok(Datum::Object(out))
            }
        }
    }

    fn time_from_fields(fields: &serde_json::Map<String, Value>) -> DatumResult<Datum> {
        let epoch = fields
            .get(EPOCH_KEY)
            .and_then(Value::as_f64)
            .ok_or_else(|| {
                DatumError::MalformedTime(format!("missing numeric `{}` field", EPOCH_KEY))
            })?;
        if !epoch.is_finite() {
            return Err(DatumError::MalformedTime(format!(
                "epoch {} is not finite",
                epoch
            )));
        }
        Ok(Datum::Time(epoch))
    }

    /// The inverse of `from_json`; temporal values surface in their
    /// tagged wire shape.
    pub fn to_json(&self) -> Value {
        match self {
            Datum::Null => Value::Null,
            Datum::Bool(b) => Value::Bool(*b),
            Datum::Num(n) => serde_json::json!(n),
            Datum::Str(s) => Value::String(s.clone()),
            Datum::Array(items) => Value::Array(items.iter().map(Datum::to_json).collect()),
            Datum::Object(fields) => {
                let mut out = serde_json::Map::new();
                for (key, field) in fields {
                    out.insert(key.clone(), field.to_json());
                }
                Value::Object(out)
            }
            Datum::Time(epoch) => serde_json::json!({
                TYPE_KEY: TIME_TAG,
                EPOCH_KEY: epoch,
            }),
        }
    }

    /// Type tag of this datum
    pub fn tag(&self) -> DatumTag {
        match self {
            Datum::Null => DatumTag::Null,
            Datum::Bool(_) => DatumTag::Bool,
            Datum::Num(_) => DatumTag::Num,
            Datum::Str(_) => DatumTag::Str,
            Datum::Array(_) => DatumTag::Array,
            Datum::Object(_) => DatumTag::Object,
            Datum::Time(_) => DatumTag::Time,
        }
    }

    /// The boolean payload, if this is a boolean datum
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Datum::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// The string payload, if this is a string datum
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Datum::Str(s) => Some(s.as_str()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn convert(value: &Value) -> Datum {
        Datum::from_json(value, &ParseLimits::unlimited(), SchemaVersion::Latest).unwrap()
    }

    #[test]
    fn test_scalar_conversion() {
        assert_eq!(convert(&json!(null)), Datum::Null);
        assert_eq!(convert(&json!(true)), Datum::Bool(true));
        assert_eq!(convert(&json!(2.5)), Datum::Num(2.5));
        assert_eq!(convert(&json!("abc")), Datum::Str("abc".into()));
    }

    #[test]
    fn test_nested_containers() {
        let datum = convert(&json!({"a": [1, 2], "b": {"c": null}}));
        match datum {
            Datum::Object(fields) => {
                assert_eq!(
                    fields["a"],
                    Datum::Array(vec![Datum::Num(1.0), Datum::Num(2.0)])
                );
                assert!(matches!(&fields["b"], Datum::Object(inner) if inner["c"] == Datum::Null));
            }
            other => panic!("expected object, got {:?}", other.tag()),
        }
    }

    #[test]
    fn test_array_limit_enforced() {
        let limits = ParseLimits::with_array_limit(2);
        let result = Datum::from_json(&json!([1, 2, 3]), &limits, SchemaVersion::Latest);
        assert!(matches!(
            result,
            Err(DatumError::ArrayTooLarge { size: 3, limit: 2 })
        ));
    }

    #[test]
    fn test_unlimited_allows_large_arrays() {
        let big: Vec<u32> = (0..10_000).collect();
        let datum = convert(&json!(big));
        assert!(matches!(datum, Datum::Array(items) if items.len() == 10_000));
    }

    #[test]
    fn test_time_round_trips_through_json() {
        let time = Datum::Time(1_500_000_000.25);
        let recovered = convert(&time.to_json());
        assert_eq!(recovered, time);
    }

    #[test]
    fn test_malformed_time_tag_rejected() {
        let result = Datum::from_json(
            &json!({"$type": "TIME"}),
            &ParseLimits::unlimited(),
            SchemaVersion::Latest,
        );
        assert!(matches!(result, Err(DatumError::MalformedTime(_))));
    }

    #[test]
    fn test_as_bool_probe() {
        assert_eq!(Datum::Bool(true).as_bool(), Some(true));
        assert_eq!(Datum::Num(1.0).as_bool(), None);
        assert_eq!(Datum::Null.as_bool(), None);
    }
}
