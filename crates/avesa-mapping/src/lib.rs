//! The Mapping Registry: canonical-table mapping documents, loaded and
//! JSON-Schema-validated once per process, resolving raw records from any
//! configured service onto the canonical schema.
//!
//! # Example
//!
//! ```
//! use avesa_mapping::MappingRegistry;
//!
//! let doc = r#"{
//!     "canonical_table": "companies",
//!     "scd_type": "type2",
//!     "natural_key": ["id"],
//!     "source_mappings": {
//!         "connectwise": {
//!             "endpoint_path": "/company/companies",
//!             "fields": [{"canonical_field": "name", "source_path": "name", "required": true}]
//!         }
//!     }
//! }"#;
//! let registry = MappingRegistry::from_json_str(&[doc]).unwrap();
//! assert!(registry.resolve("connectwise", "/company/companies").is_some());
//! ```

pub mod document;
pub mod error;
pub mod path;
pub mod registry;
pub mod schema;
pub mod transform;

pub use document::{FieldMapping, MappingDocument, ScdType, SourceMapping, Transform};
pub use error::{MappingError, Result};
pub use registry::MappingRegistry;
