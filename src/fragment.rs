// 🧩 Fragments - Partial facts produced by field extractors
//
// A fragment names WHERE its facts go (`Target`) and HOW each one merges
// (`Patch`). Merge behaviour is declared per field, never inferred from the
// runtime shape of a value.

use crate::entities::EntityKind;
use serde_json::{Map, Value};

// ============================================================================
// PATCHES
// ============================================================================

/// One field-level update. `path` is dotted (`"contractPeriod.startDate"`);
/// intermediate objects are created on demand.
#[derive(Debug, Clone, PartialEq)]
pub enum Patch {
    /// Overwrite the field, unless `value` is null
    ScalarSet { path: &'static str, value: Value },

    /// Append to a list; an object whose `id` is already present is merged
    /// into that element instead
    ListAppend { path: &'static str, item: Value },

    /// Add each item not already present (set semantics)
    SetUnion { path: &'static str, items: Vec<Value> },

    /// Recursive object merge. An empty path merges into the target itself.
    DictMerge {
        path: &'static str,
        object: Map<String, Value>,
    },
}

impl Patch {
    pub fn path(&self) -> &'static str {
        match self {
            Patch::ScalarSet { path, .. }
            | Patch::ListAppend { path, .. }
            | Patch::SetUnion { path, .. }
            | Patch::DictMerge { path, .. } => *path,
        }
    }
}

// ============================================================================
// TARGETS
// ============================================================================

/// Owner of an amendment record
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AmendmentParent {
    Tender,
    Lot(String),
    Award(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Target {
    /// Top-level release fields (`id`, `ocid`, `tag`, `relatedProcesses`, ...)
    Release,

    /// Procedure-level `tender` fields
    Tender,

    /// A keyed entity in the registry
    Entity { kind: EntityKind, id: String },

    /// A party located by name; `fallback_id` is used when none exists yet
    PartyNamed { name: String, fallback_id: String },

    /// A new append-only amendment; its id is assigned on merge
    Amendment { parent: AmendmentParent },
}

// ============================================================================
// FRAGMENT
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct Fragment {
    pub target: Target,
    pub patches: Vec<Patch>,
}

impl Fragment {
    pub fn new(target: Target) -> Self {
        Fragment {
            target,
            patches: Vec::new(),
        }
    }

    pub fn release() -> Self {
        Fragment::new(Target::Release)
    }

    pub fn tender() -> Self {
        Fragment::new(Target::Tender)
    }

    pub fn entity(kind: EntityKind, id: impl Into<String>) -> Self {
        Fragment::new(Target::Entity {
            kind,
            id: id.into(),
        })
    }

    pub fn party(id: impl Into<String>) -> Self {
        Fragment::entity(EntityKind::Party, id)
    }

    pub fn party_named(name: impl Into<String>, fallback_id: impl Into<String>) -> Self {
        Fragment::new(Target::PartyNamed {
            name: name.into(),
            fallback_id: fallback_id.into(),
        })
    }

    pub fn amendment(parent: AmendmentParent) -> Self {
        Fragment::new(Target::Amendment { parent })
    }

    /// Builder: scalar overwrite
    pub fn set(mut self, path: &'static str, value: impl Into<Value>) -> Self {
        self.patches.push(Patch::ScalarSet {
            path,
            value: value.into(),
        });
        self
    }

    /// Builder: scalar overwrite, skipped when absent
    pub fn set_opt<V: Into<Value>>(self, path: &'static str, value: Option<V>) -> Self {
        match value {
            Some(v) => self.set(path, v),
            None => self,
        }
    }

    /// Builder: list append (merge-by-id for objects)
    pub fn append(mut self, path: &'static str, item: impl Into<Value>) -> Self {
        self.patches.push(Patch::ListAppend {
            path,
            item: item.into(),
        });
        self
    }

    /// Builder: set union
    pub fn union<I, V>(mut self, path: &'static str, items: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let items: Vec<Value> = items.into_iter().map(Into::into).collect();
        if !items.is_empty() {
            self.patches.push(Patch::SetUnion { path, items });
        }
        self
    }

    /// Builder: recursive object merge; non-object values are ignored
    pub fn merge(mut self, path: &'static str, object: Value) -> Self {
        if let Value::Object(object) = object {
            self.patches.push(Patch::DictMerge { path, object });
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.patches.is_empty()
    }
}

// ============================================================================
// TESTS
// ============================================================================
