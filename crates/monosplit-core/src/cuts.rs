//! Boundary-crossing analysis of a partition level

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::AnalysisError;
use crate::graph::DependencyGraph;
use crate::model::{AccessKinds, EntityId};
use crate::partition::PartitionLevel;
use crate::relations::RelationIndex;

/// Whether a crossing edge could be traced back to observed access kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Attribution {
    Attributed,
    /// No relation with access kinds explains this edge; it is still a real
    /// structural coupling.
    Unattributed,
}

/// An edge leaving a cut.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrossingDependency {
    pub internal_node: EntityId,
    pub external_node: EntityId,
    /// Cut holding the external node; `None` when it lies in no provided cut.
    pub external_cut: Option<usize>,
    pub weight: f64,
    pub access_kinds: AccessKinds,
    pub attribution: Attribution,
}

/// Edges of one cut, classified against the full graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CutAnalysis {
    pub cut_index: usize,
    pub intra_edges: usize,
    pub crossing: Vec<CrossingDependency>,
}

impl CutAnalysis {
    pub fn unattributed(&self) -> impl Iterator<Item = &CrossingDependency> {
        self.crossing
            .iter()
            .filter(|c| c.attribution == Attribution::Unattributed)
    }
}

pub struct CutAnalyzer<'a> {
    graph: &'a DependencyGraph,
    relations: &'a RelationIndex,
}

impl<'a> CutAnalyzer<'a> {
    pub fn new(graph: &'a DependencyGraph, relations: &'a RelationIndex) -> Self {
        CutAnalyzer { graph, relations }
    }

    /// Classify every edge incident to the level's cuts.
    ///
    /// Edges come from the full graph, so an edge to a node outside every
    /// cut (e.g. when `level` covers only an induced subgraph) is crossing.
    pub fn analyze(&self, level: &PartitionLevel) -> Result<Vec<CutAnalysis>, AnalysisError> {
        if level.generation != self.graph.generation() {
            return Err(AnalysisError::StalePartition {
                level_generation: level.generation,
                graph_generation: self.graph.generation(),
            });
        }

        let membership: HashMap<&EntityId, usize> = level
            .cuts
            .iter()
            .flat_map(|cut| cut.nodes.iter().map(move |id| (id, cut.index)))
            .collect();

        let analyses: Vec<CutAnalysis> = level
            .cuts
            .iter()
            .map(|cut| {
                let mut intra_edges = 0;
                let mut crossing = Vec::new();
                for node in &cut.nodes {
                    for (neighbor, weight) in self.graph.edges_of(node) {
                        let external_cut = membership.get(&neighbor).copied();
                        if external_cut == Some(cut.index) {
                            intra_edges += 1;
                            continue;
                        }
                        crossing.push(self.crossing(node, neighbor, external_cut, weight));
                    }
                }
                CutAnalysis {
                    cut_index: cut.index,
                    // each inner edge was seen from both endpoints
                    intra_edges: intra_edges / 2,
                    crossing,
                }
            })
            .collect();

        let total: usize = analyses.iter().map(|a| a.crossing.len()).sum();
        tracing::info!("Level {}: {} crossing dependencies across {} cuts", level.depth, total, analyses.len());
        Ok(analyses)
    }

    fn crossing(
        &self,
        node: &EntityId,
        neighbor: EntityId,
        external_cut: Option<usize>,
        weight: f64,
    ) -> CrossingDependency {
        let access_kinds = self
            .relations
            .resolve(node, &neighbor)
            .map(|r| r.access_kinds.clone())
            .unwrap_or_default();
        let attribution = if access_kinds.is_empty() {
            tracing::debug!("Crossing {} -> {} is unattributed", node, neighbor);
            Attribution::Unattributed
        } else {
            Attribution::Attributed
        };
        CrossingDependency {
            internal_node: node.clone(),
            external_node: neighbor,
            external_cut,
            weight,
            access_kinds,
            attribution,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AccessKind, BatchId, EntityKind, Origin, Relation};
    use crate::partition::Partitioner;
    use crate::test_utils::{chain_fixture, ids};

    fn read_relation(from: &str, to: &str) -> Relation {
        Relation {
            from: from.into(),
            to: to.into(),
            weight: 1.0,
            origin: Origin::Dynamic,
            access_kinds: AccessKinds::from([AccessKind::Read]),
            occurrences: 1,
        }
    }

    #[test]
    fn test_first_split_has_one_crossing_per_cut() {
        let graph = chain_fixture();
        let mut index = RelationIndex::new();
        index.record(&read_relation("ModelA", "ModelB"));
        let level = Partitioner::default().nth_level(&graph, 2).into_level();

        let analyses = CutAnalyzer::new(&graph, &index).analyze(&level).unwrap();

        assert_eq!(analyses.len(), 2);
        let left = &analyses[0].crossing;
        let right = &analyses[1].crossing;
        assert_eq!(left.len(), 1);
        assert_eq!(right.len(), 1);
        assert_eq!(left[0].internal_node, EntityId::new("ModelA"));
        assert_eq!(left[0].external_node, EntityId::new("ModelB"));
        assert_eq!(left[0].external_cut, Some(1));
        assert_eq!(left[0].weight, 1.0);
        assert_eq!(right[0].external_node, EntityId::new("ModelA"));
        assert_eq!(right[0].weight, 1.0);
        assert_eq!(left[0].attribution, Attribution::Attributed);
        assert_eq!(analyses[0].intra_edges, 1);
    }

    #[test]
    fn test_unresolved_crossing_is_kept_unattributed() {
        let graph = chain_fixture();
        let index = RelationIndex::new();
        let level = Partitioner::default().nth_level(&graph, 2).into_level();

        let analyses = CutAnalyzer::new(&graph, &index).analyze(&level).unwrap();

        assert_eq!(analyses[0].crossing.len(), 1);
        let only = &analyses[0].crossing[0];
        assert!(only.access_kinds.is_empty());
        assert_eq!(only.attribution, Attribution::Unattributed);
        assert_eq!(analyses[0].unattributed().count(), 1);
    }

    #[test]
    fn test_edges_to_nodes_outside_every_cut_cross() {
        let graph = chain_fixture();
        let index = RelationIndex::new();
        let run = Partitioner::default().levels_within(&graph, &ids(&["View1", "ModelA"]), 1);

        let analyses = CutAnalyzer::new(&graph, &index).analyze(&run.levels[0]).unwrap();

        assert_eq!(analyses.len(), 1);
        assert_eq!(analyses[0].crossing.len(), 1);
        assert_eq!(analyses[0].crossing[0].external_node, EntityId::new("ModelB"));
        assert_eq!(analyses[0].crossing[0].external_cut, None);
    }

    #[test]
    fn test_stale_level_is_rejected() {
        let mut graph = chain_fixture();
        let index = RelationIndex::new();
        let level = Partitioner::default().nth_level(&graph, 2).into_level();
        graph.add_node("Late", EntityKind::View).unwrap();
        graph
            .add_edge(&"Late".into(), &"ModelA".into(), 1.0, BatchId(9))
            .unwrap();

        let err = CutAnalyzer::new(&graph, &index).analyze(&level).unwrap_err();
        assert!(matches!(err, AnalysisError::StalePartition { .. }));
    }
}
