// 🔀 Merge Rules - Apply typed patches to a JSON object
//
// Rules:
// - scalars: last write wins, an absent (null) write never erases
// - lists of objects with `id`: one element per (id, scheme), later facts
//   merged in
// - other lists: set union, first-seen order kept
// - objects: recursive merge

use crate::fragment::Patch;
use serde_json::{Map, Value};

/// Apply one patch to `target`
pub fn apply_patch(target: &mut Map<String, Value>, patch: &Patch) {
    match patch {
        Patch::ScalarSet { path, value } => {
            if value.is_null() {
                return;
            }
            let (parent, leaf) = parent_of(target, path);
            parent.insert(leaf.to_string(), value.clone());
        }
        Patch::ListAppend { path, item } => {
            if item.is_null() {
                return;
            }
            let (parent, leaf) = parent_of(target, path);
            let list = ensure_array(parent.entry(leaf).or_insert(Value::Null));
            append_item(list, item.clone());
        }
        Patch::SetUnion { path, items } => {
            let (parent, leaf) = parent_of(target, path);
            let list = ensure_array(parent.entry(leaf).or_insert(Value::Null));
            for item in items {
                union_item(list, item.clone());
            }
        }
        Patch::DictMerge { path, object } => {
            if path.is_empty() {
                deep_merge(target, object);
                return;
            }
            let (parent, leaf) = parent_of(target, path);
            let slot = ensure_object(parent.entry(leaf).or_insert(Value::Null));
            deep_merge(slot, object);
        }
    }
}

/// Apply patches in order
pub fn apply_all(target: &mut Map<String, Value>, patches: &[Patch]) {
    for patch in patches {
        apply_patch(target, patch);
    }
}

/// Recursive merge of `source` into `target`
///
/// Objects recurse, arrays merge element-wise (by id, else union), nulls are
/// ignored, other scalars overwrite.
pub fn deep_merge(target: &mut Map<String, Value>, source: &Map<String, Value>) {
    for (key, value) in source {
        match value {
            Value::Null => {}
            Value::Object(inner) => {
                let slot = ensure_object(target.entry(key.as_str()).or_insert(Value::Null));
                deep_merge(slot, inner);
            }
            Value::Array(items) => {
                let list = ensure_array(target.entry(key.as_str()).or_insert(Value::Null));
                for item in items {
                    if item_id(item).is_some() {
                        append_item(list, item.clone());
                    } else {
                        union_item(list, item.clone());
                    }
                }
            }
            scalar => {
                target.insert(key.clone(), scalar.clone());
            }
        }
    }
}

/// Read a dotted path
pub fn get_path<'a>(map: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let first = segments.next()?;
    let mut current = map.get(first)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

// ============================================================================
// HELPERS
// ============================================================================

fn item_id(item: &Value) -> Option<&str> {
    item.as_object()?
        .get("id")?
        .as_str()
        .filter(|id| !id.is_empty())
}

/// Identity of a list element: its `id`, qualified by `scheme` when present
fn item_key(item: &Value) -> Option<(&str, Option<&str>)> {
    let id = item_id(item)?;
    let scheme = item.get("scheme").and_then(Value::as_str);
    Some((id, scheme))
}

fn append_item(list: &mut Vec<Value>, item: Value) {
    if let Some(key) = item_key(&item) {
        let existing = list
            .iter_mut()
            .find(|e| item_key(e) == Some(key))
            .and_then(Value::as_object_mut);
        if let Some(existing) = existing {
            if let Value::Object(incoming) = &item {
                deep_merge(existing, incoming);
            }
            return;
        }
    }
    list.push(item);
}

fn union_item(list: &mut Vec<Value>, item: Value) {
    if !item.is_null() && !list.contains(&item) {
        list.push(item);
    }
}

/// Walk (creating) every segment but the last; return the parent object and
/// the leaf key
fn parent_of<'m, 'p>(
    target: &'m mut Map<String, Value>,
    path: &'p str,
) -> (&'m mut Map<String, Value>, &'p str) {
    match path.split_once('.') {
        None => (target, path),
        Some((head, rest)) => {
            let child = ensure_object(target.entry(head).or_insert(Value::Null));
            parent_of(child, rest)
        }
    }
}

fn ensure_object(slot: &mut Value) -> &mut Map<String, Value> {
    match slot {
        Value::Object(map) => map,
        other => {
            *other = Value::Object(Map::new());
            ensure_object(other)
        }
    }
}

fn ensure_array(slot: &mut Value) -> &mut Vec<Value> {
    match slot {
        Value::Array(list) => list,
        other => {
            *other = Value::Array(Vec::new());
            ensure_array(other)
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn create_test_map(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("test value must be an object"),
        }
    }

    #[test]
    fn test_scalar_set_creates_intermediate_objects() {
        let mut map = Map::new();
        apply_patch(
            &mut map,
            &Patch::ScalarSet {
                path: "contractPeriod.startDate",
                value: json!("2020-01-01T00:00:00Z"),
            },
        );
        assert_eq!(
            Value::Object(map),
            json!({"contractPeriod": {"startDate": "2020-01-01T00:00:00Z"}})
        );
    }

    #[test]
    fn test_null_never_erases() {
        let mut map = create_test_map(json!({"name": "Ministry"}));
        apply_patch(
            &mut map,
            &Patch::ScalarSet {
                path: "name",
                value: Value::Null,
            },
        );
        assert_eq!(map["name"], "Ministry");
    }

    #[test]
    fn test_last_write_wins() {
        let mut map = create_test_map(json!({"name": "Old"}));
        apply_patch(
            &mut map,
            &Patch::ScalarSet {
                path: "name",
                value: json!("New"),
            },
        );
        assert_eq!(map["name"], "New");
    }

    #[test]
    fn test_union_has_no_duplicates() {
        let mut map = Map::new();
        let patch = Patch::SetUnion {
            path: "roles",
            items: vec![json!("buyer"), json!("buyer"), json!("reviewBody")],
        };
        apply_patch(&mut map, &patch);
        apply_patch(&mut map, &patch);
        assert_eq!(map["roles"], json!(["buyer", "reviewBody"]));
    }

    #[test]
    fn test_append_merges_same_id() {
        let mut map = Map::new();
        apply_patch(
            &mut map,
            &Patch::ListAppend {
                path: "beneficialOwners",
                item: json!({"id": "UBO-1", "name": "A"}),
            },
        );
        apply_patch(
            &mut map,
            &Patch::ListAppend {
                path: "beneficialOwners",
                item: json!({"id": "UBO-1", "nationalities": ["DE"]}),
            },
        );
        assert_eq!(
            map["beneficialOwners"],
            json!([{"id": "UBO-1", "name": "A", "nationalities": ["DE"]}])
        );
    }

    #[test]
    fn test_same_id_different_scheme_kept_apart() {
        let mut map = Map::new();
        for scheme in ["cpv", "cpvs", "cpv"] {
            apply_patch(
                &mut map,
                &Patch::ListAppend {
                    path: "additionalClassifications",
                    item: json!({"scheme": scheme, "id": "1"}),
                },
            );
        }
        assert_eq!(
            map["additionalClassifications"],
            json!([{"scheme": "cpv", "id": "1"}, {"scheme": "cpvs", "id": "1"}])
        );
    }

    #[test]
    fn test_deep_merge_keeps_classifications_by_scheme() {
        let mut map = create_test_map(json!({
            "details": {"classifications": [{"scheme": "COFOG", "id": "01"}]}
        }));
        deep_merge(
            &mut map,
            &create_test_map(json!({
                "details": {"classifications": [{"scheme": "TED_CA_TYPE", "id": "01"}]}
            })),
        );
        assert_eq!(map["details"]["classifications"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_append_without_id_pushes() {
        let mut map = Map::new();
        for _ in 0..2 {
            apply_patch(
                &mut map,
                &Patch::ListAppend {
                    path: "awardCriteria.criteria",
                    item: json!({"type": "price"}),
                },
            );
        }
        assert_eq!(map["awardCriteria"]["criteria"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_deep_merge_unions_nested_lists() {
        let mut map = create_test_map(json!({
            "details": {"classifications": [{"scheme": "COFOG", "id": "01"}]}
        }));
        apply_patch(
            &mut map,
            &Patch::DictMerge {
                path: "",
                object: create_test_map(json!({
                    "details": {
                        "classifications": [{"scheme": "COFOG", "id": "01"}, {"scheme": "TED_CA_TYPE", "id": "la"}],
                        "scale": "large"
                    },
                    "name": null
                })),
            },
        );
        assert_eq!(map["details"]["classifications"].as_array().unwrap().len(), 2);
        assert_eq!(map["details"]["scale"], "large");
        assert!(!map.contains_key("name"));
    }

    #[test]
    fn test_union_is_commutative_as_a_set() {
        let a = Patch::SetUnion {
            path: "roles",
            items: vec![json!("buyer"), json!("funder")],
        };
        let b = Patch::SetUnion {
            path: "roles",
            items: vec![json!("funder"), json!("reviewBody")],
        };

        let mut ab = Map::new();
        apply_all(&mut ab, &[a.clone(), b.clone()]);
        let mut ba = Map::new();
        apply_all(&mut ba, &[b, a]);

        let mut left: Vec<String> = ab["roles"].as_array().unwrap().iter().map(|v| v.to_string()).collect();
        let mut right: Vec<String> = ba["roles"].as_array().unwrap().iter().map(|v| v.to_string()).collect();
        left.sort();
        right.sort();
        assert_eq!(left, right);
        assert_eq!(left.len(), 3);
    }

    #[test]
    fn test_get_path() {
        let map = create_test_map(json!({"value": {"amount": 10.0}}));
        assert_eq!(get_path(&map, "value.amount"), Some(&json!(10.0)));
        assert_eq!(get_path(&map, "value.currency"), None);
    }
}
