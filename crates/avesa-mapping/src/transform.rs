//! The closed transform set applied to a resolved source value before it
//! lands in a canonical field. Unknown transforms fail mapping *load*, not
//! runtime — `Transform` is itself a closed enum, so that's enforced by
//! serde at deserialization time; this module only applies the five known
//! variants.

use crate::document::Transform;
use crate::error::{MappingError, Result};
use serde_json::Value;

pub fn apply(transform: Transform, canonical_field: &str, value: Value) -> Result<Value> {
    match transform {
        Transform::Identity => Ok(value),
        Transform::Lowercase => {
            let s = as_str(&value, canonical_field, "lowercase")?;
            Ok(Value::String(s.to_lowercase()))
        }
        Transform::IsoDatetime => {
            let s = as_str(&value, canonical_field, "iso_datetime")?;
            let parsed = chrono::DateTime::parse_from_rfc3339(s).map_err(|e| MappingError::TransformFailed {
                canonical_field: canonical_field.to_string(),
                transform: "iso_datetime".to_string(),
                detail: e.to_string(),
            })?;
            Ok(Value::String(parsed.to_rfc3339()))
        }
        Transform::HashSha256 => {
            use sha2::{Digest, Sha256};
            let s = as_str(&value, canonical_field, "hash_sha256")?;
            let mut hasher = Sha256::new();
            hasher.update(s.as_bytes());
            Ok(Value::String(hex::encode(hasher.finalize())))
        }
        Transform::BoolFromString => {
            let s = as_str(&value, canonical_field, "bool_from_string")?;
            let parsed = matches!(s.to_lowercase().as_str(), "true" | "1" | "yes");
            Ok(Value::Bool(parsed))
        }
    }
}

fn as_str<'a>(value: &'a Value, canonical_field: &str, transform: &str) -> Result<&'a str> {
    value.as_str().ok_or_else(|| MappingError::TransformFailed {
        canonical_field: canonical_field.to_string(),
        transform: transform.to_string(),
        detail: format!("expected a string, found {value}"),
    })
}
