//! `source_path` resolution: a dotted path with array indexing
//! (`owner.id`, `tags.0`) against a raw record tree.

use serde_json::Value;

/// Resolve `path` against `root`. Returns `None` if any segment is absent
/// — missing-ness is distinct from "resolved to JSON null". The caller's
/// required-field check rejects both: `spec` §4.8 step 2a fails a record
/// whose required field "resolves to null", not only an absent one.
pub fn resolve<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = root;
    for segment in path.split('.') {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => {
                let index: usize = segment.parse().ok()?;
                items.get(index)?
            }
            _ => return None,
        };
    }
    Some(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn resolves_nested_object_path() {
        let record = json!({"owner": {"id": "42"}});
        assert_eq!(resolve(&record, "owner.id"), Some(&json!("42")));
    }

    #[test]
    fn resolves_array_index() {
        let record = json!({"tags": ["a", "b", "c"]});
        assert_eq!(resolve(&record, "tags.1"), Some(&json!("b")));
    }

    #[test]
    fn missing_segment_is_none() {
        let record = json!({"owner": {"id": "42"}});
        assert_eq!(resolve(&record, "owner.name"), None);
    }

    #[test]
    fn out_of_bounds_index_is_none() {
        let record = json!({"tags": ["a"]});
        assert_eq!(resolve(&record, "tags.5"), None);
    }

    #[test]
    fn top_level_path_resolves_directly() {
        let record = json!({"id": "42"});
        assert_eq!(resolve(&record, "id"), Some(&json!("42")));
    }
}
