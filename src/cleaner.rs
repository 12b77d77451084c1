// 🧹 Graph Cleaner - Final normalization of the assembled release
//
// Post-conditions:
// - no null, "", [] or {} anywhere
// - no `scheme` inside an object stored under an `identifier` key
// - every entity collection holds only records with a non-empty id and at
//   least one other field
// - parties sorted by id
//
// Deterministic; list order is kept everywhere except `parties`.

use crate::entities::EntityKind;
use serde_json::{Map, Value};

pub fn clean(release: Value) -> Value {
    let Some(mut release) = strip_empty(release) else {
        return Value::Object(Map::new());
    };
    strip_identifier_schemes(&mut release);

    if let Value::Object(map) = &mut release {
        for kind in EntityKind::ALL {
            if let Some(path) = kind.release_path() {
                if let Some(Value::Array(items)) = get_path_mut(map, path) {
                    prune_entities(items);
                }
            }
        }
    }

    // pruning may have emptied a collection
    let Some(mut release) = strip_empty(release) else {
        return Value::Object(Map::new());
    };
    if let Some(Value::Array(parties)) = release.get_mut("parties") {
        sort_by_id(parties);
    }
    release
}

/// Recursively drop null, empty string, empty list and empty object
pub fn strip_empty(value: Value) -> Option<Value> {
    match value {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::Array(items) => {
            let kept: Vec<Value> = items.into_iter().filter_map(strip_empty).collect();
            (!kept.is_empty()).then_some(Value::Array(kept))
        }
        Value::Object(map) => {
            let kept: Map<String, Value> = map
                .into_iter()
                .filter_map(|(key, value)| strip_empty(value).map(|v| (key, v)))
                .collect();
            (!kept.is_empty()).then_some(Value::Object(kept))
        }
        other => Some(other),
    }
}

fn strip_identifier_schemes(value: &mut Value) {
    match value {
        Value::Object(map) => {
            if let Some(Value::Object(identifier)) = map.get_mut("identifier") {
                identifier.remove("scheme");
            }
            for child in map.values_mut() {
                strip_identifier_schemes(child);
            }
        }
        Value::Array(items) => items.iter_mut().for_each(strip_identifier_schemes),
        _ => {}
    }
}

fn has_id(entity: &Value) -> bool {
    entity
        .get("id")
        .and_then(Value::as_str)
        .is_some_and(|id| !id.trim().is_empty())
}

/// Keep records with a usable id and some content besides it
fn prune_entities(items: &mut Vec<Value>) {
    items.retain(|entity| {
        let populated = entity.as_object().is_some_and(|object| object.len() > 1);
        has_id(entity) && populated
    });
}

fn sort_by_id(items: &mut [Value]) {
    items.sort_by(|a, b| {
        let a = a.get("id").and_then(Value::as_str).unwrap_or_default();
        let b = b.get("id").and_then(Value::as_str).unwrap_or_default();
        a.cmp(b)
    });
}

fn get_path_mut<'a>(map: &'a mut Map<String, Value>, path: &str) -> Option<&'a mut Value> {
    let mut segments = path.split('.');
    let first = segments.next()?;
    let mut current = map.get_mut(first)?;
    for segment in segments {
        current = current.as_object_mut()?.get_mut(segment)?;
    }
    Some(current)
}

// ============================================================================
// TESTS
// ============================================================================
