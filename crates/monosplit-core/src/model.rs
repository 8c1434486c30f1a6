//! Core data structures for the decomposition graph

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

/// Case-insensitive entity identifier.
///
/// Keeps the first-seen spelling for display; equality, hashing and ordering
/// use the lower-cased key so `Catalogue` and `catalogue` denote one node.
#[derive(Clone, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct EntityId {
    name: String,
    key: String,
}

impl EntityId {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let key = name.to_lowercase();
        EntityId { name, key }
    }

    /// The spelling this id was created with.
    pub fn as_str(&self) -> &str {
        &self.name
    }

    /// The folded comparison key.
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl PartialEq for EntityId {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for EntityId {}

impl Hash for EntityId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl PartialOrd for EntityId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for EntityId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key.cmp(&other.key)
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.name)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl From<String> for EntityId {
    fn from(name: String) -> Self {
        EntityId::new(name)
    }
}

impl From<&str> for EntityId {
    fn from(name: &str) -> Self {
        EntityId::new(name)
    }
}

impl From<EntityId> for String {
    fn from(id: EntityId) -> Self {
        id.name
    }
}

/// Discriminates what a graph node represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityKind {
    /// A request-handling unit.
    View,
    /// A persistent data entity.
    Model,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::View => f.write_str("View"),
            EntityKind::Model => f.write_str("Model"),
        }
    }
}

/// A discovered node together with the module that owns it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub kind: EntityKind,
    pub id: EntityId,
    pub owning_module: String,
}

/// How a relation touches its data entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AccessKind {
    Read,
    Write,
}

/// Union of access kinds observed for a relation. Empty means unattributed.
pub type AccessKinds = BTreeSet<AccessKind>;

/// Where a relation was observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Origin {
    /// Import/usage facts from source analysis.
    Static,
    /// Table usage from runtime query logs.
    Dynamic,
}

/// Identifies one RelationBuilder pass; the unit of the weight merge policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub struct BatchId(pub u64);

/// A weighted relation between two entities, directed at creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relation {
    pub from: EntityId,
    pub to: EntityId,
    /// Raw count before normalization, graph weight after.
    pub weight: f64,
    pub origin: Origin,
    pub access_kinds: AccessKinds,
    /// How many underlying facts were folded into this relation.
    pub occurrences: u64,
}

/// The unordered pair an undirected edge is keyed by; smaller id first.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EdgeKey(pub EntityId, pub EntityId);

impl EdgeKey {
    pub fn new(a: EntityId, b: EntityId) -> Self {
        if a <= b { EdgeKey(a, b) } else { EdgeKey(b, a) }
    }

    pub fn of(a: &EntityId, b: &EntityId) -> Self {
        EdgeKey::new(a.clone(), b.clone())
    }
}

impl fmt::Display for EdgeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}—{}", self.0, self.1)
    }
}
