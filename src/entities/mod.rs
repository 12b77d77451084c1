// Entity Models - Destination records keyed by a stable id
//
// Each entity has:
// - Stable identity (the id from the notice) that NEVER changes
// - A bag of release fields that grows as extractors contribute facts
// - A home in the EntityRegistry, which guarantees one record per id

pub mod registry;

pub use registry::{Amendment, EntityRegistry};

use crate::fragment::Patch;
use crate::merge;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

// ============================================================================
// ENTITY KIND
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityKind {
    Party,
    Lot,
    LotGroup,
    /// `Part`-scheme subdivision of a prior information notice (never emitted)
    Part,
    Award,
    Bid,
    Contract,
    Document,
}

impl EntityKind {
    pub const ALL: [EntityKind; 8] = [
        EntityKind::Party,
        EntityKind::Lot,
        EntityKind::LotGroup,
        EntityKind::Part,
        EntityKind::Award,
        EntityKind::Bid,
        EntityKind::Contract,
        EntityKind::Document,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            EntityKind::Party => "party",
            EntityKind::Lot => "lot",
            EntityKind::LotGroup => "lot group",
            EntityKind::Part => "part",
            EntityKind::Award => "award",
            EntityKind::Bid => "bid",
            EntityKind::Contract => "contract",
            EntityKind::Document => "document",
        }
    }

    /// Dotted location of this kind's collection in the release, if emitted
    pub fn release_path(&self) -> Option<&'static str> {
        match self {
            EntityKind::Party => Some("parties"),
            EntityKind::Lot => Some("tender.lots"),
            EntityKind::LotGroup => Some("tender.lotGroups"),
            EntityKind::Part => None,
            EntityKind::Award => Some("awards"),
            EntityKind::Bid => Some("bids.details"),
            EntityKind::Contract => Some("contracts"),
            EntityKind::Document => Some("tender.documents"),
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// ENTITY
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    /// Stable identity - never changes once registered
    pub id: String,

    /// Release fields accumulated so far (never contains `id`)
    pub fields: Map<String, Value>,
}

impl Entity {
    pub fn new(id: impl Into<String>) -> Self {
        Entity {
            id: id.into(),
            fields: Map::new(),
        }
    }

    /// Apply one patch; patches addressing `id` are ignored
    pub fn apply(&mut self, patch: &Patch) {
        if patch.path() == "id" {
            tracing::debug!(entity = %self.id, "Ignoring patch that addresses the entity id");
            return;
        }
        merge::apply_patch(&mut self.fields, patch);
    }

    pub fn get(&self, path: &str) -> Option<&Value> {
        merge::get_path(&self.fields, path)
    }

    pub fn get_str(&self, path: &str) -> Option<&str> {
        self.get(path).and_then(Value::as_str)
    }

    pub fn name(&self) -> Option<&str> {
        self.get_str("name")
    }

    /// Release JSON for this entity (`id` plus fields)
    pub fn to_value(&self) -> Value {
        let mut object = self.fields.clone();
        object.insert("id".to_string(), Value::String(self.id.clone()));
        Value::Object(object)
    }
}

// ============================================================================
// TESTS
// ============================================================================
