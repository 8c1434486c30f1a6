//! Attributed-graph exchange format

use serde::{Deserialize, Serialize};

use crate::error::GraphError;
use crate::graph::DependencyGraph;
use crate::model::{BatchId, EntityId, EntityKind};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportNode {
    pub id: EntityId,
    #[serde(rename = "type")]
    pub kind: EntityKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportEdge {
    pub source: EntityId,
    pub target: EntityId,
    pub weight: f64,
}

/// Nodes with a `type` attribute and edges with a `weight` attribute.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphExport {
    pub nodes: Vec<ExportNode>,
    pub edges: Vec<ExportEdge>,
}

impl DependencyGraph {
    pub fn export(&self) -> GraphExport {
        GraphExport {
            nodes: self
                .nodes()
                .into_iter()
                .map(|n| ExportNode { id: n.id.clone(), kind: n.kind })
                .collect(),
            edges: self
                .edges()
                .into_iter()
                .map(|(key, weight)| ExportEdge { source: key.0, target: key.1, weight })
                .collect(),
        }
    }

    /// Rebuild a graph from an export. All edges land in one batch, so a
    /// pair listed twice keeps its last weight.
    pub fn import(export: &GraphExport) -> Result<DependencyGraph, GraphError> {
        let mut graph = DependencyGraph::new();
        for node in &export.nodes {
            graph.add_node(node.id.clone(), node.kind)?;
        }
        let batch = BatchId(0);
        for edge in &export.edges {
            graph.add_edge(&edge.source, &edge.target, edge.weight, batch)?;
        }
        Ok(graph)
    }
}
