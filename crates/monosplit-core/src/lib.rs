//! Monosplit Core — dependency graph, Girvan–Newman partitioning and cut analysis

pub mod model;
pub mod facts;
pub mod error;
pub mod catalog;
pub mod relations;
pub mod graph;
pub mod export;
pub mod partition;
pub mod cuts;
pub mod report;
pub mod pipeline;

#[cfg(test)]
pub mod tests;

#[cfg(test)]
pub mod test_utils;

pub use model::{AccessKind, AccessKinds, BatchId, EdgeKey, Entity, EntityId, EntityKind, Origin, Relation};
pub use facts::{AccessType, DeclaredKind, DefinedEntity, FactBundle, ImportedName, ModuleAnalysis, RouteEntry, UsageObservation};
pub use error::{AnalysisError, GraphError, IngestionError, PipelineError, Result};
pub use catalog::EntityCatalog;
pub use relations::{RelationBatch, RelationBuilder, RelationIndex, RelationRecord};
pub use graph::{DependencyGraph, IngestSummary, DEFAULT_AMPLIFICATION, normalize_weights, normalized_weight};
pub use export::{ExportEdge, ExportNode, GraphExport};
pub use partition::{Cut, Levels, NthLevel, PartitionLevel, PartitionOptions, Partitioner};
pub use cuts::{Attribution, CrossingDependency, CutAnalysis, CutAnalyzer};
pub use report::{Instruction, Remediation, Report, ReportEntry, ReportSummary, ReportSynthesizer, guidance_for};
pub use pipeline::{Pipeline, PipelineConfig, RefineOp, Stage};
