//! Weighted dependency graph using petgraph::StableUnGraph keyed by EntityId

use std::collections::{BTreeMap, BTreeSet, HashMap};

use petgraph::stable_graph::{EdgeIndex, NodeIndex, StableUnGraph};
use petgraph::visit::EdgeRef;

use crate::catalog::EntityCatalog;
use crate::error::GraphError;
use crate::model::{BatchId, EdgeKey, EntityId, EntityKind, Relation};
use crate::relations::RelationBatch;

/// Default amplification applied by [`normalize_weights`].
pub const DEFAULT_AMPLIFICATION: f64 = 4.0;

/// A node of the dependency graph.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphNode {
    pub id: EntityId,
    pub kind: EntityKind,
}

/// An undirected edge and the weight each batch contributed to it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GraphEdge {
    contributions: BTreeMap<BatchId, f64>,
}

impl GraphEdge {
    pub fn new(batch: BatchId, weight: f64) -> Self {
        GraphEdge {
            contributions: BTreeMap::from([(batch, weight)]),
        }
    }

    /// Sum over all contributing batches.
    pub fn weight(&self) -> f64 {
        self.contributions.values().sum()
    }

    /// Set the weight contributed by `batch`, replacing its earlier value.
    pub fn contribute(&mut self, batch: BatchId, weight: f64) {
        self.contributions.insert(batch, weight);
    }

    /// Fold another edge's contributions in, summing per batch.
    pub fn absorb(&mut self, other: GraphEdge) {
        for (batch, weight) in other.contributions {
            *self.contributions.entry(batch).or_insert(0.0) += weight;
        }
    }

    pub fn batches(&self) -> impl Iterator<Item = BatchId> + '_ {
        self.contributions.keys().copied()
    }
}

/// What [`DependencyGraph::ingest`] did with a batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IngestSummary {
    pub edges_written: usize,
    pub rejected: Vec<GraphError>,
}

/// Undirected graph between views and models.
///
/// Mutations take `&mut self`, so at most one structural edit is in flight.
/// Each one bumps [`generation`](Self::generation), which partition levels use
/// to detect that they were computed against an older graph.
pub struct DependencyGraph {
    inner: StableUnGraph<GraphNode, GraphEdge>,
    index: HashMap<EntityId, NodeIndex>,
    generation: u64,
}

impl std::fmt::Debug for DependencyGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DependencyGraph")
            .field("node_count", &self.inner.node_count())
            .field("edge_count", &self.inner.edge_count())
            .field("generation", &self.generation)
            .finish()
    }
}

impl DependencyGraph {
    pub fn new() -> Self {
        DependencyGraph {
            inner: StableUnGraph::default(),
            index: HashMap::new(),
            generation: 0,
        }
    }

    /// Declare a node. Idempotent for the same kind.
    pub fn add_node(&mut self, id: impl Into<EntityId>, kind: EntityKind) -> Result<(), GraphError> {
        let id = id.into();
        if let Some(&idx) = self.index.get(&id) {
            let existing = self.inner[idx].kind;
            if existing != kind {
                return Err(GraphError::TypeConflict {
                    id,
                    existing,
                    requested: kind,
                });
            }
            return Ok(());
        }
        let idx = self.inner.add_node(GraphNode { id: id.clone(), kind });
        self.index.insert(id, idx);
        self.generation += 1;
        Ok(())
    }

    /// Add or update the edge between `a` and `b`.
    ///
    /// Each batch owns its share of an edge's weight: writing again from the
    /// same batch replaces that share, other batches' shares are kept and
    /// summed.
    pub fn add_edge(
        &mut self,
        a: &EntityId,
        b: &EntityId,
        weight: f64,
        batch: BatchId,
    ) -> Result<(), GraphError> {
        if a == b {
            return Err(GraphError::SelfLoopRejected { id: a.clone() });
        }
        if !weight.is_finite() || weight < 0.0 {
            return Err(GraphError::InvalidWeight {
                a: a.clone(),
                b: b.clone(),
                weight,
            });
        }
        let ia = self.node_index(a)?;
        let ib = self.node_index(b)?;

        match self.inner.find_edge(ia, ib) {
            Some(e) => self.inner[e].contribute(batch, weight),
            None => {
                self.inner.add_edge(ia, ib, GraphEdge::new(batch, weight));
            }
        }
        self.generation += 1;
        Ok(())
    }

    /// Add every relation of a batch, declaring endpoints with their catalog
    /// kinds. Rejections are logged and reported, never fatal.
    pub fn ingest(&mut self, batch: &RelationBatch, catalog: &EntityCatalog) -> IngestSummary {
        let mut summary = IngestSummary::default();
        for relation in &batch.relations {
            match self.ingest_relation(relation, batch.id, catalog) {
                Ok(()) => summary.edges_written += 1,
                Err(e) => {
                    tracing::warn!("Rejected relation {} -> {}: {}", relation.from, relation.to, e);
                    summary.rejected.push(e);
                }
            }
        }
        tracing::debug!(
            "Ingested batch {:?}: {} edges, {} rejected",
            batch.id,
            summary.edges_written,
            summary.rejected.len()
        );
        summary
    }

    fn ingest_relation(
        &mut self,
        relation: &Relation,
        batch: BatchId,
        catalog: &EntityCatalog,
    ) -> Result<(), GraphError> {
        self.declare(&relation.from, catalog)?;
        self.declare(&relation.to, catalog)?;
        self.add_edge(&relation.from, &relation.to, relation.weight, batch)
    }

    fn declare(&mut self, id: &EntityId, catalog: &EntityCatalog) -> Result<(), GraphError> {
        let kind = catalog
            .kind_of(id)
            .ok_or_else(|| GraphError::UnknownNode { id: id.clone() })?;
        self.add_node(id.clone(), kind)
    }

    /// Remove a node and all its edges.
    pub fn remove_node(&mut self, id: &EntityId) -> Option<GraphNode> {
        let idx = self.index.remove(id)?;
        self.generation += 1;
        self.inner.remove_node(idx)
    }

    /// Remove the edge between two nodes, returning its weight.
    pub fn remove_edge(&mut self, a: &EntityId, b: &EntityId) -> Option<f64> {
        let e = self.edge_index(a, b)?;
        self.generation += 1;
        self.inner.remove_edge(e).map(|edge| edge.weight())
    }

    /// Drop every node without incident edges. Returns the removed ids.
    pub fn remove_isolated_nodes(&mut self) -> Vec<EntityId> {
        let mut isolated: Vec<EntityId> = self
            .inner
            .node_indices()
            .filter(|&idx| self.inner.edges(idx).next().is_none())
            .map(|idx| self.inner[idx].id.clone())
            .collect();
        isolated.sort();
        for id in &isolated {
            self.remove_node(id);
        }
        if !isolated.is_empty() {
            tracing::info!("Removed {} isolated nodes", isolated.len());
        }
        isolated
    }

    /// Fold `alias` into `canonical`: its edges move over (weights
    /// accumulate, would-be self-loops are dropped) and `alias` disappears.
    pub fn merge_alias(&mut self, alias: &EntityId, canonical: &EntityId) -> Result<(), GraphError> {
        if alias == canonical {
            return Ok(());
        }
        let alias_kind = self.kind_of(alias).ok_or_else(|| GraphError::UnknownNode { id: alias.clone() })?;
        let canonical_kind = self
            .kind_of(canonical)
            .ok_or_else(|| GraphError::UnknownNode { id: canonical.clone() })?;
        if alias_kind != canonical_kind {
            return Err(GraphError::TypeConflict {
                id: alias.clone(),
                existing: alias_kind,
                requested: canonical_kind,
            });
        }

        let alias_idx = self.node_index(alias)?;
        let moved: Vec<(EntityId, GraphEdge)> = self
            .inner
            .edges(alias_idx)
            .map(|e| {
                let other = if e.source() == alias_idx { e.target() } else { e.source() };
                (self.inner[other].id.clone(), e.weight().clone())
            })
            .collect();
        self.remove_node(alias);
        let target = self.node_index(canonical)?;
        for (neighbor, edge) in moved {
            if neighbor == *canonical {
                continue;
            }
            let other = self.node_index(&neighbor)?;
            match self.inner.find_edge(target, other) {
                Some(e) => self.inner[e].absorb(edge),
                None => {
                    self.inner.add_edge(target, other, edge);
                }
            }
        }
        self.generation += 1;
        Ok(())
    }

    /// Incident `(neighbor, weight)` pairs, ordered by neighbor id.
    pub fn edges_of(&self, id: &EntityId) -> Vec<(EntityId, f64)> {
        let Some(&idx) = self.index.get(id) else {
            return Vec::new();
        };
        let mut edges: Vec<(EntityId, f64)> = self
            .inner
            .edges(idx)
            .map(|e| {
                let other = if e.source() == idx { e.target() } else { e.source() };
                (self.inner[other].id.clone(), e.weight().weight())
            })
            .collect();
        edges.sort_by(|x, y| x.0.cmp(&y.0));
        edges
    }

    pub fn weight(&self, a: &EntityId, b: &EntityId) -> Option<f64> {
        self.edge_index(a, b).map(|e| self.inner[e].weight())
    }

    pub fn degree(&self, id: &EntityId) -> usize {
        self.index
            .get(id)
            .map_or(0, |&idx| self.inner.edges(idx).count())
    }

    pub fn contains(&self, id: &EntityId) -> bool {
        self.index.contains_key(id)
    }

    pub fn kind_of(&self, id: &EntityId) -> Option<EntityKind> {
        self.index.get(id).map(|&idx| self.inner[idx].kind)
    }

    pub fn node_count(&self) -> usize {
        self.inner.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.inner.edge_count()
    }

    /// Mutation counter; changes whenever a node or edge is added, removed
    /// or reweighted.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Nodes in id order.
    pub fn nodes(&self) -> Vec<&GraphNode> {
        let mut nodes: Vec<&GraphNode> = self.inner.node_indices().map(|idx| &self.inner[idx]).collect();
        nodes.sort_by(|a, b| a.id.cmp(&b.id));
        nodes
    }

    /// Edges as `(key, weight)` in key order.
    pub fn edges(&self) -> Vec<(EdgeKey, f64)> {
        let mut edges: Vec<(EdgeKey, f64)> = self
            .inner
            .edge_indices()
            .filter_map(|e| {
                let (a, b) = self.inner.edge_endpoints(e)?;
                let key = EdgeKey::of(&self.inner[a].id, &self.inner[b].id);
                Some((key, self.inner[e].weight()))
            })
            .collect();
        edges.sort_by(|a, b| a.0.cmp(&b.0));
        edges
    }

    /// A copy restricted to `ids`, keeping edges with both endpoints inside.
    pub fn induced_subgraph(&self, ids: &BTreeSet<EntityId>) -> DependencyGraph {
        let mut sub = DependencyGraph::new();
        for node in self.nodes().into_iter().filter(|n| ids.contains(&n.id)) {
            let idx = sub.inner.add_node(node.clone());
            sub.index.insert(node.id.clone(), idx);
        }
        for e in self.inner.edge_indices() {
            let Some((a, b)) = self.inner.edge_endpoints(e) else {
                continue;
            };
            let ia = sub.index.get(&self.inner[a].id).copied();
            let ib = sub.index.get(&self.inner[b].id).copied();
            if let (Some(ia), Some(ib)) = (ia, ib) {
                sub.inner.add_edge(ia, ib, self.inner[e].clone());
            }
        }
        sub
    }

    fn node_index(&self, id: &EntityId) -> Result<NodeIndex, GraphError> {
        self.index
            .get(id)
            .copied()
            .ok_or_else(|| GraphError::UnknownNode { id: id.clone() })
    }

    fn edge_index(&self, a: &EntityId, b: &EntityId) -> Option<EdgeIndex> {
        let ia = *self.index.get(a)?;
        let ib = *self.index.get(b)?;
        self.inner.find_edge(ia, ib)
    }
}

impl Default for DependencyGraph {
    fn default() -> Self {
        Self::new()
    }
}

/// `round((count / peak) * amplification) + 1`, rounding halves to even.
///
/// The `+ 1` keeps every observed relation visible to the partitioner.
pub fn normalized_weight(count: f64, peak: f64, amplification: f64) -> f64 {
    let peak = peak.max(1.0);
    ((count / peak) * amplification).round_ties_even() + 1.0
}

/// Rescale a batch's raw counts against its own peak.
pub fn normalize_weights(batch: &mut RelationBatch, amplification: f64) {
    let peak = batch.peak();
    for relation in &mut batch.relations {
        relation.weight = normalized_weight(relation.weight, peak, amplification);
    }
}
