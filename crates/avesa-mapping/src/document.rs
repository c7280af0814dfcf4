//! The mapping document shape from `spec` §4.3: one document per canonical
//! table, naming how each configured service's raw fields project onto the
//! canonical schema.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScdType {
    Type1,
    Type2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transform {
    Identity,
    Lowercase,
    IsoDatetime,
    HashSha256,
    BoolFromString,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldMapping {
    pub canonical_field: String,
    /// Dotted path into the raw record, with array indexing
    /// (`owner.id`, `tags.0`).
    pub source_path: String,
    pub required: bool,
    #[serde(default)]
    pub transform: Option<Transform>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceMapping {
    pub endpoint_path: String,
    pub fields: Vec<FieldMapping>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappingDocument {
    pub canonical_table: String,
    pub source_mappings: BTreeMap<String, SourceMapping>,
    pub scd_type: ScdType,
    pub natural_key: Vec<String>,
}
