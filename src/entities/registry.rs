// 🗂️ Entity Registry - One record per id, per entity kind
//
// "Identity persists, values accumulate": the first reference to an id
// creates the record, every later reference merges into it. Insertion order
// is first-seen order, which keeps the release deterministic.
//
// The registry lives for exactly one conversion. It is never shared, so it
// needs no locking.

use super::{Entity, EntityKind};
use crate::error::RegistryError;
use crate::fragment::{AmendmentParent, Patch};
use serde_json::{Map, Value};
use std::collections::HashMap;

// ============================================================================
// STORES
// ============================================================================

#[derive(Debug, Default)]
struct EntityStore {
    entities: Vec<Entity>,
    index: HashMap<String, usize>,
}

/// Append-only change record
#[derive(Debug, Clone, PartialEq)]
pub struct Amendment {
    /// Sequential id ("1", "2", ...) in order of creation
    pub id: String,
    pub parent: AmendmentParent,
    pub body: Map<String, Value>,
}

impl Amendment {
    pub fn to_value(&self) -> Value {
        let mut object = self.body.clone();
        object.insert("id".to_string(), Value::String(self.id.clone()));
        Value::Object(object)
    }
}

// ============================================================================
// ENTITY REGISTRY
// ============================================================================

#[derive(Debug, Default)]
pub struct EntityRegistry {
    stores: HashMap<EntityKind, EntityStore>,
    amendments: Vec<Amendment>,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Existing entity with this id, or a new one appended with only the id set
    pub fn get_or_create(&mut self, kind: EntityKind, id: &str) -> Result<&mut Entity, RegistryError> {
        let id = id.trim();
        if id.is_empty() {
            return Err(RegistryError::EmptyId { kind });
        }

        let store = self.stores.entry(kind).or_default();
        let position = match store.index.get(id) {
            Some(&position) => position,
            None => {
                store.entities.push(Entity::new(id));
                let position = store.entities.len() - 1;
                store.index.insert(id.to_string(), position);
                position
            }
        };
        Ok(&mut store.entities[position])
    }

    /// Get-or-create, then apply every patch in order
    pub fn merge(&mut self, kind: EntityKind, id: &str, patches: &[Patch]) -> Result<(), RegistryError> {
        let entity = self.get_or_create(kind, id)?;
        for patch in patches {
            entity.apply(patch);
        }
        Ok(())
    }

    pub fn get(&self, kind: EntityKind, id: &str) -> Option<&Entity> {
        let store = self.stores.get(&kind)?;
        let position = *store.index.get(id.trim())?;
        store.entities.get(position)
    }

    /// Linear scan; for lookups where the id is not known yet
    pub fn find<P>(&self, kind: EntityKind, predicate: P) -> Option<&Entity>
    where
        P: Fn(&Entity) -> bool,
    {
        self.entities(kind).iter().find(|entity| predicate(entity))
    }

    /// Entities of one kind, in first-seen order
    pub fn entities(&self, kind: EntityKind) -> &[Entity] {
        self.stores
            .get(&kind)
            .map(|store| store.entities.as_slice())
            .unwrap_or(&[])
    }

    pub fn len(&self, kind: EntityKind) -> usize {
        self.entities(kind).len()
    }

    /// Record an amendment and return its generated id
    pub fn append_amendment(&mut self, parent: AmendmentParent, body: Map<String, Value>) -> String {
        let id = (self.amendments.len() + 1).to_string();
        self.amendments.push(Amendment {
            id: id.clone(),
            parent,
            body,
        });
        id
    }

    pub fn amendments(&self) -> &[Amendment] {
        &self.amendments
    }
}

// ============================================================================
// TESTS
// ============================================================================
