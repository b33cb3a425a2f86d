//! Path addressing into untyped YAML documents
//!
//! Manifests are handled as a generic `serde_yaml::Value` tree so that any
//! structure we do not touch survives a load/serialize cycle unchanged. This
//! module provides the small addressing language used to reach into that tree.
//!
//! # Path syntax
//!
//! A path is a `/`-delimited list of segments starting with `/` (the empty
//! string addresses the document root). Each segment is resolved against the
//! node it is applied to:
//!
//! - on a mapping, the segment is a key
//! - on a sequence, the segment is either a zero-based index or a
//!   `key=value` predicate selecting the first element whose `key` field
//!   equals `value`
//!
//! `~1` and `~0` decode to `/` and `~` inside a segment.
//!
//! ```
//! use riic_common::document;
//!
//! let doc: serde_yaml::Value = serde_yaml::from_str(
//!     "instance_groups:\n- name: router\n  instances: 2\n",
//! ).unwrap();
//! let instances = document::get(&doc, "/instance_groups/name=router/instances").unwrap();
//! assert_eq!(instances.as_u64(), Some(2));
//! ```

use serde_yaml::Value;
use thiserror::Error;

use crate::Result;

/// Errors from resolving or writing a document path
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    /// The path string itself could not be parsed
    #[error("malformed path {path:?}: {reason}")]
    Malformed {
        /// The offending path
        path: String,
        /// What is wrong with it
        reason: String,
    },

    /// A segment did not match anything in the document
    #[error("path {path:?} not found: nothing matches {segment:?}")]
    NotFound {
        /// The full path being resolved
        path: String,
        /// The first segment that failed to match
        segment: String,
    },

    /// A segment was applied to a node that cannot contain children of that kind
    #[error("path {path:?}: cannot resolve {segment:?} inside a {found}")]
    WrongType {
        /// The full path being resolved
        path: String,
        /// The segment that could not be applied
        segment: String,
        /// Kind of node the segment was applied to
        found: &'static str,
    },
}

/// Look up the value at `path`.
pub fn get<'a>(doc: &'a Value, path: &str) -> Result<&'a Value> {
    let segments = parse(path)?;
    let mut node = doc;
    for segment in &segments {
        node = child(node, segment, path)?;
    }
    Ok(node)
}

/// Look up the value at `path` for in-place modification.
pub fn get_mut<'a>(doc: &'a mut Value, path: &str) -> Result<&'a mut Value> {
    let segments = parse(path)?;
    let mut node = doc;
    for segment in &segments {
        node = child_mut(node, segment, path)?;
    }
    Ok(node)
}

/// Write `value` at `path`, returning the value it replaced.
///
/// Every segment but the last must already exist. A missing final key on a
/// mapping is inserted and `Value::Null` is returned as the previous value;
/// on a sequence the final segment must address an existing element.
pub fn set(doc: &mut Value, path: &str, value: Value) -> Result<Value> {
    let mut segments = parse(path)?;
    let Some(last) = segments.pop() else {
        return Ok(std::mem::replace(doc, value));
    };

    let mut parent = doc;
    for segment in &segments {
        parent = child_mut(parent, segment, path)?;
    }

    match parent {
        Value::Mapping(map) => Ok(map
            .insert(Value::String(last), value)
            .unwrap_or(Value::Null)),
        Value::Sequence(seq) => {
            let idx = position(seq, &last, path)?;
            Ok(std::mem::replace(&mut seq[idx], value))
        }
        other => Err(wrong_type(path, &last, other)),
    }
}

/// Human readable name for the kind of a node, used in error messages.
pub fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Sequence(_) => "sequence",
        Value::Mapping(_) => "mapping",
        Value::Tagged(_) => "tagged value",
    }
}

fn parse(path: &str) -> Result<Vec<String>> {
    if path.is_empty() {
        return Ok(Vec::new());
    }
    let Some(rest) = path.strip_prefix('/') else {
        return Err(PathError::Malformed {
            path: path.to_string(),
            reason: "must start with '/'".to_string(),
        });
    };

    rest.split('/')
        .map(|raw| {
            if raw.is_empty() {
                return Err(PathError::Malformed {
                    path: path.to_string(),
                    reason: "empty segment".to_string(),
                });
            }
            Ok(raw.replace("~1", "/").replace("~0", "~"))
        })
        .collect()
}

fn child<'a>(node: &'a Value, segment: &str, path: &str) -> Result<&'a Value> {
    match node {
        Value::Mapping(map) => map.get(segment).ok_or_else(|| not_found(path, segment)),
        Value::Sequence(seq) => {
            let idx = position(seq, segment, path)?;
            Ok(&seq[idx])
        }
        other => Err(wrong_type(path, segment, other)),
    }
}

fn child_mut<'a>(node: &'a mut Value, segment: &str, path: &str) -> Result<&'a mut Value> {
    match node {
        Value::Mapping(map) => map
            .get_mut(segment)
            .ok_or_else(|| not_found(path, segment)),
        Value::Sequence(seq) => {
            let idx = position(seq, segment, path)?;
            Ok(&mut seq[idx])
        }
        other => Err(wrong_type(path, segment, other)),
    }
}

/// Resolve a sequence segment (index or `key=value` predicate) to an index.
fn position(seq: &[Value], segment: &str, path: &str) -> Result<usize> {
    if let Some((key, want)) = segment.split_once('=') {
        return seq
            .iter()
            .position(|element| field_matches(element, key, want))
            .ok_or_else(|| not_found(path, segment));
    }

    match segment.parse::<usize>() {
        Ok(idx) if idx < seq.len() => Ok(idx),
        Ok(_) => Err(not_found(path, segment)),
        Err(_) => Err(PathError::WrongType {
            path: path.to_string(),
            segment: segment.to_string(),
            found: "sequence",
        }),
    }
}

fn field_matches(element: &Value, key: &str, want: &str) -> bool {
    match element.get(key) {
        Some(Value::String(s)) => s == want,
        Some(Value::Number(n)) => n.to_string() == want,
        Some(Value::Bool(b)) => b.to_string() == want,
        _ => false,
    }
}

fn not_found(path: &str, segment: &str) -> PathError {
    PathError::NotFound {
        path: path.to_string(),
        segment: segment.to_string(),
    }
}

fn wrong_type(path: &str, segment: &str, found: &Value) -> PathError {
    PathError::WrongType {
        path: path.to_string(),
        segment: segment.to_string(),
        found: kind(found),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MANIFEST: &str = r#"
name: cf-1234
instance_groups:
- name: router
  instances: 2
  jobs:
  - name: gorouter
    properties:
      router:
        ca_certs: existing
- name: diego_cell
  jobs:
  - name: rep
    properties:
      containers:
        trusted_ca_certificates: [a, b]
tags:
  a~b: tilde
  c/d: slash
"#;

    fn doc() -> Value {
        serde_yaml::from_str(MANIFEST).unwrap()
    }

    // ==========================================================================
    // Story: Reading manifest structure
    // ==========================================================================

    #[test]
    fn empty_path_addresses_the_root() {
        let d = doc();
        assert_eq!(get(&d, "").unwrap(), &d);
    }

    #[test]
    fn predicates_select_sequence_elements_by_field() {
        let d = doc();
        let certs = get(
            &d,
            "/instance_groups/name=router/jobs/name=gorouter/properties/router/ca_certs",
        )
        .unwrap();
        assert_eq!(certs.as_str(), Some("existing"));
    }

    #[test]
    fn numeric_segments_index_into_sequences() {
        let d = doc();
        let name = get(&d, "/instance_groups/1/name").unwrap();
        assert_eq!(name.as_str(), Some("diego_cell"));
    }

    #[test]
    fn predicates_compare_non_string_scalars_textually() {
        let d = doc();
        let ig = get(&d, "/instance_groups/instances=2/name").unwrap();
        assert_eq!(ig.as_str(), Some("router"));
    }

    #[test]
    fn escaped_segments_decode_slash_and_tilde() {
        let d = doc();
        assert_eq!(get(&d, "/tags/a~0b").unwrap().as_str(), Some("tilde"));
        assert_eq!(get(&d, "/tags/c~1d").unwrap().as_str(), Some("slash"));
    }

    #[test]
    fn missing_keys_report_the_failing_segment() {
        let d = doc();
        let err = get(&d, "/instance_groups/name=credhub/jobs").unwrap_err();
        assert_eq!(
            err,
            PathError::NotFound {
                path: "/instance_groups/name=credhub/jobs".to_string(),
                segment: "name=credhub".to_string(),
            }
        );
    }

    #[test]
    fn out_of_range_indexes_are_not_found() {
        let d = doc();
        assert!(matches!(
            get(&d, "/instance_groups/7"),
            Err(PathError::NotFound { .. })
        ));
    }

    #[test]
    fn descending_into_a_scalar_is_a_type_error() {
        let d = doc();
        let err = get(&d, "/name/first").unwrap_err();
        assert!(matches!(err, PathError::WrongType { found: "string", .. }));
    }

    #[test]
    fn plain_keys_on_sequences_are_a_type_error() {
        let d = doc();
        let err = get(&d, "/instance_groups/router").unwrap_err();
        assert!(matches!(err, PathError::WrongType { found: "sequence", .. }));
    }

    #[test]
    fn relative_and_empty_segment_paths_are_malformed() {
        let d = doc();
        assert!(matches!(get(&d, "name"), Err(PathError::Malformed { .. })));
        assert!(matches!(
            get(&d, "/instance_groups//name"),
            Err(PathError::Malformed { .. })
        ));
    }

    // ==========================================================================
    // Story: Writing manifest structure
    // ==========================================================================

    #[test]
    fn set_returns_the_replaced_value() {
        let mut d = doc();
        let path = "/instance_groups/name=router/jobs/name=gorouter/properties/router/ca_certs";
        let previous = set(&mut d, path, Value::String("new".into())).unwrap();
        assert_eq!(previous.as_str(), Some("existing"));
        assert_eq!(get(&d, path).unwrap().as_str(), Some("new"));
    }

    #[test]
    fn set_inserts_a_missing_final_key() {
        let mut d = doc();
        let previous = set(&mut d, "/tags/fresh", Value::Bool(true)).unwrap();
        assert_eq!(previous, Value::Null);
        assert_eq!(get(&d, "/tags/fresh").unwrap(), &Value::Bool(true));
    }

    #[test]
    fn set_requires_intermediate_nodes_to_exist() {
        let mut d = doc();
        let err = set(&mut d, "/missing/child", Value::Null).unwrap_err();
        assert!(matches!(err, PathError::NotFound { .. }));
    }

    #[test]
    fn set_replaces_sequence_elements_selected_by_predicate() {
        let mut d = doc();
        let replacement: Value = serde_yaml::from_str("name: router\ninstances: 4").unwrap();
        set(&mut d, "/instance_groups/name=router", replacement).unwrap();
        let instances = get(&d, "/instance_groups/0/instances").unwrap();
        assert_eq!(instances.as_u64(), Some(4));
    }

    #[test]
    fn set_into_a_scalar_is_a_type_error() {
        let mut d = doc();
        let err = set(&mut d, "/name/child", Value::Null).unwrap_err();
        assert!(matches!(err, PathError::WrongType { .. }));
    }

    #[test]
    fn get_mut_allows_in_place_edits() {
        let mut d = doc();
        let path = "/instance_groups/name=diego_cell/jobs/name=rep/properties/containers/trusted_ca_certificates";
        if let Value::Sequence(seq) = get_mut(&mut d, path).unwrap() {
            seq.insert(0, Value::String("first".into()));
        }
        assert_eq!(get(&d, &format!("{path}/0")).unwrap().as_str(), Some("first"));
        assert_eq!(get(&d, &format!("{path}/2")).unwrap().as_str(), Some("b"));
    }

    #[test]
    fn untouched_structure_survives_serialization_in_order() {
        let mut d = doc();
        set(&mut d, "/name", Value::String("cf-5678".into())).unwrap();
        let out = serde_yaml::to_string(&d).unwrap();
        let name_pos = out.find("name: cf-5678").unwrap();
        let groups_pos = out.find("instance_groups:").unwrap();
        let tags_pos = out.find("tags:").unwrap();
        assert!(name_pos < groups_pos && groups_pos < tags_pos);
    }
}
