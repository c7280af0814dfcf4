//! The Mapping Registry (`spec` §4.3): loads, once per process, every
//! canonical-table mapping document and resolves `(service, endpoint)`
//! pairs to the document that targets them.

use crate::document::MappingDocument;
use crate::error::{MappingError, Result};
use crate::path;
use crate::schema::validate_mapping_document;
use crate::transform;
use serde_json::Value;
use std::collections::BTreeMap;

pub struct MappingRegistry {
    by_canonical_table: BTreeMap<String, MappingDocument>,
}

impl MappingRegistry {
    /// Load and validate every document, failing on the first invalid one
    /// — an unknown transform or malformed document must never surface
    /// mid-run.
    pub fn load(documents: Vec<MappingDocument>) -> Result<Self> {
        let mut by_canonical_table = BTreeMap::new();
        for doc in documents {
            validate_mapping_document(&doc)?;
            by_canonical_table.insert(doc.canonical_table.clone(), doc);
        }
        Ok(Self { by_canonical_table })
    }

    pub fn from_json_str(raw: &[&str]) -> Result<Self> {
        let documents = raw
            .iter()
            .map(|s| serde_json::from_str(s).map_err(MappingError::from))
            .collect::<Result<Vec<_>>>()?;
        Self::load(documents)
    }

    /// Locate the mapping document whose `source_mappings[service].endpoint_path`
    /// matches `endpoint`, if any.
    pub fn resolve(&self, service: &str, endpoint: &str) -> Option<&MappingDocument> {
        self.by_canonical_table.values().find(|doc| {
            doc.source_mappings
                .get(service)
                .map(|m| m.endpoint_path == endpoint)
                .unwrap_or(false)
        })
    }

    pub fn get(&self, canonical_table: &str) -> Option<&MappingDocument> {
        self.by_canonical_table.get(canonical_table)
    }

    pub fn canonical_tables(&self) -> impl Iterator<Item = &str> {
        self.by_canonical_table.keys().map(String::as_str)
    }

    /// Project one raw record into canonical fields per the document's
    /// mapping for `service`. A missing required field is a hard error
    /// (the caller routes the record to the dead-letter queue); a missing
    /// optional field is simply absent from the output map.
    pub fn project(
        &self,
        canonical_table: &str,
        service: &str,
        raw: &Value,
    ) -> Result<BTreeMap<String, Value>> {
        let doc = self
            .by_canonical_table
            .get(canonical_table)
            .ok_or_else(|| MappingError::UnknownCanonicalTable(canonical_table.to_string()))?;

        let source = doc.source_mappings.get(service).ok_or_else(|| {
            MappingError::UnknownCanonicalTable(format!("{canonical_table} has no mapping for service {service}"))
        })?;

        let mut out = BTreeMap::new();
        for field in &source.fields {
            match path::resolve(raw, &field.source_path) {
                Some(Value::Null) if field.required => {
                    return Err(MappingError::RequiredFieldMissing {
                        canonical_field: field.canonical_field.clone(),
                        source_path: field.source_path.clone(),
                    })
                }
                Some(value) => {
                    let value = match field.transform {
                        Some(t) => transform::apply(t, &field.canonical_field, value.clone())?,
                        None => value.clone(),
                    };
                    out.insert(field.canonical_field.clone(), value);
                }
                None if field.required => {
                    return Err(MappingError::RequiredFieldMissing {
                        canonical_field: field.canonical_field.clone(),
                        source_path: field.source_path.clone(),
                    })
                }
                None => {}
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{FieldMapping, ScdType, SourceMapping, Transform};
    use serde_json::json;

    fn companies_mapping() -> MappingDocument {
        let mut source_mappings = BTreeMap::new();
        source_mappings.insert(
            "connectwise".to_string(),
            SourceMapping {
                endpoint_path: "/company/companies".to_string(),
                fields: vec![
                    FieldMapping {
                        canonical_field: "name".to_string(),
                        source_path: "name".to_string(),
                        required: true,
                        transform: Some(Transform::Identity),
                    },
                    FieldMapping {
                        canonical_field: "owner_id".to_string(),
                        source_path: "owner.id".to_string(),
                        required: false,
                        transform: Some(Transform::Identity),
                    },
                ],
            },
        );
        MappingDocument {
            canonical_table: "companies".to_string(),
            source_mappings,
            scd_type: ScdType::Type2,
            natural_key: vec!["id".to_string()],
        }
    }

    #[test]
    fn resolve_finds_document_by_endpoint() {
        let registry = MappingRegistry::load(vec![companies_mapping()]).unwrap();
        let doc = registry.resolve("connectwise", "/company/companies").unwrap();
        assert_eq!(doc.canonical_table, "companies");
    }

    #[test]
    fn project_applies_mapping_and_skips_missing_optional_fields() {
        let registry = MappingRegistry::load(vec![companies_mapping()]).unwrap();
        let raw = json!({"name": "Acme"});
        let fields = registry.project("companies", "connectwise", &raw).unwrap();
        assert_eq!(fields.get("name"), Some(&json!("Acme")));
        assert!(!fields.contains_key("owner_id"));
    }

    #[test]
    fn project_fails_on_missing_required_field() {
        let registry = MappingRegistry::load(vec![companies_mapping()]).unwrap();
        let raw = json!({"owner": {"id": "1"}});
        let err = registry.project("companies", "connectwise", &raw).unwrap_err();
        assert!(matches!(err, MappingError::RequiredFieldMissing { .. }));
    }

    #[test]
    fn project_fails_when_required_field_resolves_to_null() {
        let registry = MappingRegistry::load(vec![companies_mapping()]).unwrap();
        let raw = json!({"name": null});
        let err = registry.project("companies", "connectwise", &raw).unwrap_err();
        assert!(matches!(err, MappingError::RequiredFieldMissing { .. }));
    }

    #[test]
    fn load_rejects_unknown_transform_at_load_time() {
        let raw = r#"{
            "canonical_table": "companies",
            "scd_type": "type2",
            "natural_key": ["id"],
            "source_mappings": {
                "connectwise": {
                    "endpoint_path": "/company/companies",
                    "fields": [{"canonical_field": "name", "source_path": "name", "required": true, "transform": "uppercase"}]
                }
            }
        }"#;
        let err = MappingRegistry::from_json_str(&[raw]).unwrap_err();
        assert!(matches!(err, MappingError::Json(_)));
    }
}
