//! Records produced by the external static/dynamic analyzers and route parser

use serde::{Deserialize, Serialize};

use crate::model::{AccessKind, EntityKind};

/// Classification the static analyzer attached to a declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeclaredKind {
    Model,
    View,
    Other,
}

impl DeclaredKind {
    /// The graph node kind, if this declaration becomes a node at all.
    pub fn entity_kind(self) -> Option<EntityKind> {
        match self {
            DeclaredKind::Model => Some(EntityKind::Model),
            DeclaredKind::View => Some(EntityKind::View),
            DeclaredKind::Other => None,
        }
    }
}

/// A class-like declaration found in a module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DefinedEntity {
    pub kind: DeclaredKind,
    pub name: String,
    /// Models this model links to (foreign keys and similar schema links).
    #[serde(default)]
    pub relations: Vec<String>,
}

/// A name imported into a module and how often it is referenced there.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportedName {
    pub name: String,
    #[serde(default)]
    pub usage_count: u64,
}

/// Static facts about one source module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleAnalysis {
    pub module_id: String,
    #[serde(default)]
    pub defined_entities: Vec<DefinedEntity>,
    #[serde(default)]
    pub imported_names: Vec<ImportedName>,
}

/// Statement type of the logged query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccessType {
    Read,
    Write,
    Unknown,
}

impl AccessType {
    pub fn access_kind(self) -> Option<AccessKind> {
        match self {
            AccessType::Read => Some(AccessKind::Read),
            AccessType::Write => Some(AccessKind::Write),
            AccessType::Unknown => None,
        }
    }
}

/// Table usage observed for one view in the runtime query log.
///
/// `table_id` is already resolved to a Model id by the collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageObservation {
    pub view_id: String,
    pub module_id: String,
    pub table_id: String,
    pub access_type: AccessType,
    pub occurrence_count: u64,
}

/// One row of the route table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteEntry {
    pub route_name: String,
    pub module_id: String,
    pub handler_id: String,
}

/// Everything the external collaborators hand to one analysis run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FactBundle {
    #[serde(default)]
    pub modules: Vec<ModuleAnalysis>,
    #[serde(default)]
    pub observations: Vec<UsageObservation>,
    #[serde(default)]
    pub routes: Vec<RouteEntry>,
}
