//! Fusion of static and dynamic facts into weighted relations

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::catalog::EntityCatalog;
use crate::error::IngestionError;
use crate::facts::{DeclaredKind, ModuleAnalysis, UsageObservation};
use crate::model::{AccessKinds, BatchId, EdgeKey, EntityId, EntityKind, Origin, Relation};

/// The relations contributed by one builder pass.
#[derive(Debug, Clone, PartialEq)]
pub struct RelationBatch {
    pub id: BatchId,
    pub origin: Origin,
    pub relations: Vec<Relation>,
}

impl RelationBatch {
    /// Highest raw weight in the batch, never below 1.
    pub fn peak(&self) -> f64 {
        self.relations
            .iter()
            .map(|r| r.weight)
            .fold(1.0, f64::max)
    }

    pub fn len(&self) -> usize {
        self.relations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.relations.is_empty()
    }
}

/// Provenance accumulated for one unordered entity pair.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RelationRecord {
    pub access_kinds: AccessKinds,
    pub origins: BTreeSet<Origin>,
    pub occurrences: u64,
}

/// Every relation the builder emitted, merged per unordered pair.
///
/// The graph only keeps weights; cut analysis resolves access kinds here.
#[derive(Debug, Clone, Default)]
pub struct RelationIndex {
    records: HashMap<EdgeKey, RelationRecord>,
}

impl RelationIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, relation: &Relation) {
        let entry = self
            .records
            .entry(EdgeKey::of(&relation.from, &relation.to))
            .or_default();
        entry.access_kinds.extend(relation.access_kinds.iter().copied());
        entry.origins.insert(relation.origin);
        entry.occurrences += relation.occurrences;
    }

    pub fn resolve(&self, a: &EntityId, b: &EntityId) -> Option<&RelationRecord> {
        self.records.get(&EdgeKey::of(a, b))
    }

    /// Move every record touching `alias` onto `canonical`.
    pub fn merge_alias(&mut self, alias: &EntityId, canonical: &EntityId) {
        let touched: Vec<EdgeKey> = self
            .records
            .keys()
            .filter(|k| k.0 == *alias || k.1 == *alias)
            .cloned()
            .collect();

        for key in touched {
            let Some(record) = self.records.remove(&key) else {
                continue;
            };
            let other = if key.0 == *alias { &key.1 } else { &key.0 };
            if other == canonical {
                continue;
            }
            let entry = self.records.entry(EdgeKey::of(canonical, other)).or_default();
            entry.access_kinds.extend(record.access_kinds);
            entry.origins.extend(record.origins);
            entry.occurrences += record.occurrences;
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Builds relation batches from external facts.
///
/// Each call produces a batch with a fresh [`BatchId`] and records its
/// relations in the builder's [`RelationIndex`].
#[derive(Debug, Default)]
pub struct RelationBuilder {
    next_batch: u64,
    index: RelationIndex,
    unresolved_tables: BTreeSet<String>,
}

impl RelationBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// View→Model relations from imports, plus Model→Model schema links.
    ///
    /// Every static relation weighs 1: a structural coupling exists or it
    /// doesn't. Usage counts are kept as occurrences.
    pub fn static_batch(
        &mut self,
        catalog: &EntityCatalog,
        modules: &[ModuleAnalysis],
    ) -> Result<RelationBatch, IngestionError> {
        let mut merged: BTreeMap<EdgeKey, Relation> = BTreeMap::new();

        for module in modules {
            if module.module_id.trim().is_empty() {
                return Err(IngestionError::invalid("module analysis", "empty moduleId"));
            }

            let views: Vec<EntityId> = module
                .defined_entities
                .iter()
                .filter(|d| d.kind == DeclaredKind::View)
                .map(|d| catalog.canonical(&EntityId::new(d.name.as_str())))
                .filter(|id| catalog.kind_of(id) == Some(EntityKind::View))
                .collect();

            if !views.is_empty() {
                for import in &module.imported_names {
                    let target = catalog.canonical(&EntityId::new(import.name.as_str()));
                    if catalog.kind_of(&target) != Some(EntityKind::Model) {
                        continue;
                    }
                    for view in &views {
                        merge_into(
                            &mut merged,
                            Relation {
                                from: view.clone(),
                                to: target.clone(),
                                weight: 1.0,
                                origin: Origin::Static,
                                access_kinds: AccessKinds::new(),
                                occurrences: import.usage_count,
                            },
                            |existing, _| existing,
                        );
                    }
                }
            }

            for declared in module.defined_entities.iter().filter(|d| d.kind == DeclaredKind::Model) {
                let from = catalog.canonical(&EntityId::new(declared.name.as_str()));
                if catalog.kind_of(&from) != Some(EntityKind::Model) {
                    continue;
                }
                for target in &declared.relations {
                    let to = catalog.canonical(&EntityId::new(target.as_str()));
                    if to == from {
                        continue;
                    }
                    if catalog.kind_of(&to) != Some(EntityKind::Model) {
                        tracing::debug!("{} links to unknown model {}", from, to);
                        continue;
                    }
                    merge_into(
                        &mut merged,
                        Relation {
                            from: from.clone(),
                            to,
                            weight: 1.0,
                            origin: Origin::Static,
                            access_kinds: AccessKinds::new(),
                            occurrences: 1,
                        },
                        |existing, _| existing,
                    );
                }
            }
        }

        Ok(self.finish(Origin::Static, merged))
    }

    /// View→Model relations from the query log, weighted by raw usage.
    ///
    /// Observations of one (view, table) pair are summed and their access
    /// kinds united. Tables that don't resolve to a catalogued model are
    /// skipped and remembered in [`unresolved_tables`](Self::unresolved_tables).
    pub fn dynamic_batch(
        &mut self,
        catalog: &EntityCatalog,
        observations: &[UsageObservation],
    ) -> Result<RelationBatch, IngestionError> {
        let mut merged: BTreeMap<EdgeKey, Relation> = BTreeMap::new();

        for obs in observations {
            if obs.view_id.trim().is_empty() {
                return Err(IngestionError::invalid("usage observation", "empty viewId"));
            }
            if obs.table_id.trim().is_empty() {
                return Err(IngestionError::invalid(
                    "usage observation",
                    format!("empty tableId for view {}", obs.view_id),
                ));
            }
            if obs.occurrence_count == 0 {
                continue;
            }

            let view = catalog.canonical(&EntityId::new(obs.view_id.as_str()));
            if catalog.kind_of(&view) != Some(EntityKind::View) {
                tracing::warn!("Observed handler {} is not a catalogued view, skipped", view);
                continue;
            }
            let table = catalog.canonical(&EntityId::new(obs.table_id.as_str()));
            if catalog.kind_of(&table) != Some(EntityKind::Model) {
                tracing::debug!("Table {} does not resolve to a model", obs.table_id);
                self.unresolved_tables.insert(obs.table_id.clone());
                continue;
            }

            let mut access_kinds = AccessKinds::new();
            access_kinds.extend(obs.access_type.access_kind());
            merge_into(
                &mut merged,
                Relation {
                    from: view,
                    to: table,
                    weight: obs.occurrence_count as f64,
                    origin: Origin::Dynamic,
                    access_kinds,
                    occurrences: 1,
                },
                |existing, incoming| existing + incoming,
            );
        }

        Ok(self.finish(Origin::Dynamic, merged))
    }

    fn finish(&mut self, origin: Origin, merged: BTreeMap<EdgeKey, Relation>) -> RelationBatch {
        self.next_batch += 1;
        let relations: Vec<Relation> = merged.into_values().collect();
        for relation in &relations {
            self.index.record(relation);
        }
        tracing::debug!("Batch {} ({:?}): {} relations", self.next_batch, origin, relations.len());
        RelationBatch {
            id: BatchId(self.next_batch),
            origin,
            relations,
        }
    }

    pub fn index(&self) -> &RelationIndex {
        &self.index
    }

    pub fn index_mut(&mut self) -> &mut RelationIndex {
        &mut self.index
    }

    /// Table ids seen in the log that matched no model.
    pub fn unresolved_tables(&self) -> &BTreeSet<String> {
        &self.unresolved_tables
    }
}

/// Fold `relation` into the batch map; `combine` decides the merged weight.
fn merge_into(
    merged: &mut BTreeMap<EdgeKey, Relation>,
    relation: Relation,
    combine: impl Fn(f64, f64) -> f64,
) {
    let key = EdgeKey::of(&relation.from, &relation.to);
    match merged.get_mut(&key) {
        Some(existing) => {
            existing.weight = combine(existing.weight, relation.weight);
            existing.access_kinds.extend(relation.access_kinds);
            existing.occurrences += relation.occurrences;
        }
        None => {
            merged.insert(key, relation);
        }
    }
}
