//! Entity registry keyed by case-insensitive id

use std::collections::{BTreeMap, HashMap};

use crate::error::GraphError;
use crate::facts::{ModuleAnalysis, RouteEntry, UsageObservation};
use crate::model::{Entity, EntityId, EntityKind};

/// Registry of discovered views and models.
///
/// The catalog is the only owner of entity identity: the graph and the
/// relation index refer to entities by [`EntityId`] and resolve kinds and
/// modules through here.
#[derive(Debug, Default)]
pub struct EntityCatalog {
    entities: BTreeMap<EntityId, Entity>,
    aliases: HashMap<EntityId, EntityId>,
    modules_seen: usize,
}

impl EntityCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an entity. Re-registering with the same kind is a no-op.
    pub fn register(
        &mut self,
        kind: EntityKind,
        id: impl Into<EntityId>,
        owning_module: impl Into<String>,
    ) -> Result<&Entity, GraphError> {
        let id = self.canonical(&id.into());
        if let Some(existing) = self.entities.get(&id) {
            if existing.kind != kind {
                return Err(GraphError::TypeConflict {
                    id,
                    existing: existing.kind,
                    requested: kind,
                });
            }
        } else {
            self.entities.insert(
                id.clone(),
                Entity {
                    kind,
                    id: id.clone(),
                    owning_module: owning_module.into(),
                },
            );
        }
        Ok(&self.entities[&id])
    }

    /// Register every Model and View declared by the analyzed modules.
    ///
    /// Conflicting redeclarations are logged and the first declaration wins.
    pub fn register_modules(&mut self, modules: &[ModuleAnalysis]) {
        for module in modules {
            self.modules_seen += 1;
            for declared in &module.defined_entities {
                let Some(kind) = declared.kind.entity_kind() else {
                    continue;
                };
                if let Err(e) = self.register(kind, declared.name.as_str(), module.module_id.as_str()) {
                    tracing::warn!("Skipping declaration in {}: {}", module.module_id, e);
                }
            }
        }
    }

    /// Views seen only in the query log are registered under the module the
    /// log attributes them to.
    pub fn register_observed_views(&mut self, observations: &[UsageObservation]) {
        for obs in observations {
            if let Err(e) = self.register(EntityKind::View, obs.view_id.as_str(), obs.module_id.as_str()) {
                tracing::warn!("Skipping observed view: {}", e);
            }
        }
    }

    /// Attribute route handlers to the module the route table names.
    ///
    /// Returns how many views were re-attributed.
    pub fn apply_routes(&mut self, routes: &[RouteEntry]) -> usize {
        let mut corrected = 0;
        for route in routes {
            let id = self.canonical(&EntityId::new(route.handler_id.as_str()));
            match self.entities.get(&id).map(|e| e.kind) {
                Some(EntityKind::View) => {
                    if self.attribute_module(&id, route.module_id.as_str()) {
                        corrected += 1;
                    }
                }
                Some(EntityKind::Model) => {
                    tracing::debug!("Route {} points at model {}, ignored", route.route_name, id);
                }
                None => {
                    tracing::debug!("Route {} handler {} not in catalog", route.route_name, id);
                }
            }
        }
        corrected
    }

    /// Correct the owning module of an entity. Returns whether it changed.
    pub fn attribute_module(&mut self, id: &EntityId, module: &str) -> bool {
        let id = self.canonical(id);
        match self.entities.get_mut(&id) {
            Some(entity) if entity.owning_module != module => {
                tracing::debug!("{} moved from {} to {}", id, entity.owning_module, module);
                entity.owning_module = module.to_string();
                true
            }
            _ => false,
        }
    }

    /// Record that `alias` names the same entity as `canonical` and drop the
    /// alias entry.
    pub fn alias(&mut self, alias: &EntityId, canonical: &EntityId) -> Result<(), GraphError> {
        let canonical = self.canonical(canonical);
        if *alias == canonical {
            return Ok(());
        }
        let Some(target) = self.entities.get(&canonical) else {
            return Err(GraphError::UnknownNode { id: canonical });
        };
        if let Some(existing) = self.entities.get(alias) {
            if existing.kind != target.kind {
                return Err(GraphError::TypeConflict {
                    id: alias.clone(),
                    existing: existing.kind,
                    requested: target.kind,
                });
            }
        }
        self.entities.remove(alias);
        self.aliases.insert(alias.clone(), canonical);
        Ok(())
    }

    /// Follow alias links to the id the catalog stores.
    pub fn canonical(&self, id: &EntityId) -> EntityId {
        let mut current = id;
        // alias targets are always canonical at insertion time, but a later
        // alias of the target makes this a chain
        while let Some(next) = self.aliases.get(current) {
            current = next;
        }
        current.clone()
    }

    pub fn get(&self, id: &EntityId) -> Option<&Entity> {
        self.entities.get(&self.canonical(id))
    }

    pub fn kind_of(&self, id: &EntityId) -> Option<EntityKind> {
        self.get(id).map(|e| e.kind)
    }

    pub fn module_of(&self, id: &EntityId) -> Option<&str> {
        self.get(id).map(|e| e.owning_module.as_str())
    }

    /// Entities in id order.
    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    pub fn of_kind(&self, kind: EntityKind) -> impl Iterator<Item = &Entity> + '_ {
        self.entities.values().filter(move |e| e.kind == kind)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Number of module analyses folded into the catalog.
    pub fn modules_seen(&self) -> usize {
        self.modules_seen
    }
}
