use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;

/// Declared semantic type of a record field, used to coerce incoming filter
/// and update values that arrive as plain strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Uuid,
    Instant,
    Enum(&'static [&'static str]),
    Int,
    Bool,
    Str,
}

/// Field schema of a record type: `(field name, kind)` pairs. Fields not
/// listed are treated as plain strings.
pub type FieldSchema = &'static [(&'static str, FieldKind)];

pub fn field_kind(schema: FieldSchema, field: &str) -> FieldKind {
    schema
        .iter()
        .find(|(name, _)| *name == field)
        .map(|(_, kind)| *kind)
        .unwrap_or(FieldKind::Str)
}

/// Coerce each filter value to its declared field kind. Values that fail to
/// coerce (and values for unknown fields) pass through unchanged: the store
/// is schemaless on read, so a type mismatch means "matches nothing", never
/// an error.
pub fn coerce_field_types(
    filters: &HashMap<String, Value>,
    schema: FieldSchema,
) -> HashMap<String, Value> {
    filters
        .iter()
        .map(|(field, value)| {
            let coerced = coerce_value(value, field_kind(schema, field)).unwrap_or_else(|| value.clone());
            (field.clone(), coerced)
        })
        .collect()
}

/// Attempt a single coercion. Returns `None` when the value does not fit the
/// kind. Successful coercions are canonical: coercing the result again yields
/// the same value.
pub fn coerce_value(value: &Value, kind: FieldKind) -> Option<Value> {
    match kind {
        FieldKind::Uuid => {
            let s = value.as_str()?;
            let uid = Uuid::parse_str(s).ok()?;
            Some(Value::String(uid.to_string()))
        }
        FieldKind::Instant => {
            let s = value.as_str()?;
            let dt: DateTime<Utc> = s.parse().ok()?;
            Some(serde_json::to_value(dt).ok()?)
        }
        FieldKind::Enum(variants) => {
            let s = value.as_str()?;
            variants
                .iter()
                .find(|v| **v == s)
                .map(|v| Value::String((*v).to_string()))
        }
        FieldKind::Int => match value {
            Value::Number(n) if n.is_i64() => Some(value.clone()),
            Value::String(s) => s.parse::<i64>().ok().map(Value::from),
            _ => None,
        },
        FieldKind::Bool => match value {
            Value::Bool(_) => Some(value.clone()),
            Value::String(s) => match s.as_str() {
                "true" | "True" => Some(Value::Bool(true)),
                "false" | "False" => Some(Value::Bool(false)),
                _ => None,
            },
            _ => None,
        },
        FieldKind::Str => value.as_str().map(|s| Value::String(s.to_string())),
    }
}

/// Kind-aware equality between a stored field value and a (coerced) filter
/// value. Falls back to plain `Value` equality for anything unrecognised.
pub fn values_equal(record: &Value, filter: &Value, kind: FieldKind) -> bool {
    match kind {
        FieldKind::Uuid => match (record.as_str(), filter.as_str()) {
            (Some(a), Some(b)) => match (Uuid::parse_str(a), Uuid::parse_str(b)) {
                (Ok(a), Ok(b)) => a == b,
                _ => a == b,
            },
            _ => record == filter,
        },
        FieldKind::Instant => match (parse_instant(record), parse_instant(filter)) {
            (Some(a), Some(b)) => a == b,
            _ => record == filter,
        },
        _ => record == filter,
    }
}

pub fn parse_instant(value: &Value) -> Option<DateTime<Utc>> {
    value.as_str()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCHEMA: FieldSchema = &[
        ("uid", FieldKind::Uuid),
        ("created_at", FieldKind::Instant),
        ("status", FieldKind::Enum(&["pending", "done"])),
        ("return_code", FieldKind::Int),
    ];

    #[test]
    fn coerces_valid_values() {
        let uid = Uuid::new_v4();
        let mut filters = HashMap::new();
        filters.insert("uid".into(), Value::String(uid.simple().to_string()));
        filters.insert(
            "created_at".into(),
            Value::String("2025-03-07T15:10:40.146495+00:00".into()),
        );
        filters.insert("status".into(), Value::String("pending".into()));

        let coerced = coerce_field_types(&filters, SCHEMA);
        assert_eq!(coerced["uid"], Value::String(uid.to_string()));
        assert_eq!(coerced["status"], Value::String("pending".into()));
        assert!(parse_instant(&coerced["created_at"]).is_some());
    }

    #[test]
    fn failed_coercions_pass_through() {
        let mut filters = HashMap::new();
        filters.insert("status".into(), Value::from(1234));
        filters.insert("created_at".into(), Value::String("invalid-date".into()));
        filters.insert("uid".into(), Value::String("not-a-uuid".into()));
        filters.insert("unknown_field".into(), Value::String("some value".into()));

        let coerced = coerce_field_types(&filters, SCHEMA);
        assert_eq!(coerced["status"], Value::from(1234));
        assert_eq!(coerced["created_at"], Value::String("invalid-date".into()));
        assert_eq!(coerced["uid"], Value::String("not-a-uuid".into()));
        assert_eq!(coerced["unknown_field"], Value::String("some value".into()));
    }

    #[test]
    fn coercion_is_idempotent() {
        let uid = Uuid::new_v4();
        let once = coerce_value(&Value::String(uid.simple().to_string()), FieldKind::Uuid).unwrap();
        let twice = coerce_value(&once, FieldKind::Uuid).unwrap();
        assert_eq!(once, twice);

        let ts = Value::String("2025-03-07T15:10:40+00:00".into());
        let once = coerce_value(&ts, FieldKind::Instant).unwrap();
        let twice = coerce_value(&once, FieldKind::Instant).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn uuid_equality_ignores_formatting() {
        let uid = Uuid::new_v4();
        let record = Value::String(uid.to_string());
        let filter = Value::String(uid.simple().to_string());
        assert!(values_equal(&record, &filter, FieldKind::Uuid));
    }
}
