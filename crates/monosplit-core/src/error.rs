//! Error taxonomy for the decomposition engine

use thiserror::Error;

use crate::model::{EntityId, EntityKind};
use crate::pipeline::Stage;

/// Malformed or missing input facts. Fatal for the run.
#[derive(Error, Debug)]
pub enum IngestionError {
    #[error("missing artifact: {artifact}")]
    Missing { artifact: String },

    #[error("invalid artifact {artifact}: {reason}")]
    Invalid { artifact: String, reason: String },

    #[error("cannot parse {artifact}: {reason}")]
    Parse { artifact: String, reason: String },

    #[error("cannot read {artifact}: {source}")]
    Io {
        artifact: String,
        #[source]
        source: std::io::Error,
    },
}

impl IngestionError {
    pub fn invalid(artifact: impl Into<String>, reason: impl Into<String>) -> Self {
        IngestionError::Invalid {
            artifact: artifact.into(),
            reason: reason.into(),
        }
    }
}

/// A graph operation that would break a graph invariant. Rejected locally.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GraphError {
    #[error("node {id} already declared as {existing}, cannot redeclare as {requested}")]
    TypeConflict {
        id: EntityId,
        existing: EntityKind,
        requested: EntityKind,
    },

    #[error("self-loop on {id} rejected")]
    SelfLoopRejected { id: EntityId },

    #[error("unknown node {id}")]
    UnknownNode { id: EntityId },

    #[error("invalid weight {weight} for edge {a}—{b}")]
    InvalidWeight { a: EntityId, b: EntityId, weight: f64 },
}

/// Cut analysis over inconsistent inputs.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AnalysisError {
    #[error("partition computed at graph generation {level_generation}, graph is now at {graph_generation}")]
    StalePartition {
        level_generation: u64,
        graph_generation: u64,
    },
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Ingestion(#[from] IngestionError),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Analysis(#[from] AnalysisError),

    #[error("cannot run {requested:?} while the pipeline is at {current:?}")]
    OutOfOrder { requested: Stage, current: Stage },
}

pub type Result<T, E = PipelineError> = std::result::Result<T, E>;
