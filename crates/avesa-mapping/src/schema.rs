//! JSON Schema validation for mapping documents, mirroring the teacher's
//! flight-plan/cargo-manifest validation: compile a fixed schema once,
//! validate the serialized document against it, and surface every failing
//! instance path in one error.

use crate::document::MappingDocument;
use crate::error::{MappingError, Result};
use jsonschema::Validator;
use serde_json::{json, Value};

pub fn validate_mapping_document(doc: &MappingDocument) -> Result<()> {
    let schema = mapping_schema();
    let compiled = Validator::new(&schema)
        .map_err(|e| MappingError::validation(format!("failed to compile schema: {e}")))?;

    let value = serde_json::to_value(doc)?;

    if let Err(errors) = compiled.validate(&value) {
        let messages: Vec<String> = errors.map(|e| format!("{}: {}", e.instance_path, e)).collect();
        return Err(MappingError::validation(messages.join("\n  - ")));
    }
    Ok(())
}

fn mapping_schema() -> Value {
    json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "type": "object",
        "required": ["canonical_table", "source_mappings", "scd_type", "natural_key"],
        "properties": {
            "canonical_table": { "type": "string", "minLength": 1 },
            "scd_type": { "enum": ["type1", "type2"] },
            "natural_key": {
                "type": "array",
                "items": { "type": "string" },
                "minItems": 1
            },
            "source_mappings": {
                "type": "object",
                "minProperties": 1,
                "additionalProperties": {
                    "type": "object",
                    "required": ["endpoint_path", "fields"],
                    "properties": {
                        "endpoint_path": { "type": "string", "minLength": 1 },
                        "fields": {
                            "type": "array",
                            "minItems": 1,
                            "items": {
                                "type": "object",
                                "required": ["canonical_field", "source_path", "required"],
                                "properties": {
                                    "canonical_field": { "type": "string", "minLength": 1 },
                                    "source_path": { "type": "string", "minLength": 1 },
                                    "required": { "type": "boolean" },
                                    "transform": {
                                        "enum": [
                                            "identity",
                                            "lowercase",
                                            "iso_datetime",
                                            "hash_sha256",
                                            "bool_from_string"
                                        ]
                                    }
                                }
                            }
                        }
                    }
                }
            }
        }
    })
}
