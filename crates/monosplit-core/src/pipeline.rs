//! Linear analysis pipeline: Ingest → BuildGraph → Partition → AnalyzeCuts → SynthesizeReport

use serde::{Deserialize, Serialize};

use crate::catalog::EntityCatalog;
use crate::cuts::{CutAnalysis, CutAnalyzer};
use crate::error::{GraphError, IngestionError, PipelineError, Result};
use crate::facts::FactBundle;
use crate::graph::{normalize_weights, DependencyGraph, IngestSummary, DEFAULT_AMPLIFICATION};
use crate::model::EntityId;
use crate::partition::{Levels, NthLevel, PartitionOptions, Partitioner};
use crate::relations::{RelationBatch, RelationBuilder, RelationIndex};
use crate::report::{Report, ReportSynthesizer};

/// Where the pipeline currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
    Ingest,
    BuildGraph,
    Partition,
    AnalyzeCuts,
    SynthesizeReport,
    Done,
}

/// Tunables for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Multiplier applied to normalized dynamic usage.
    pub amplification: f64,
    /// Partition level analyzed for the report (1 = unsplit graph).
    pub level: usize,
    /// Upper bound on levels computed for exploration.
    pub max_levels: usize,
    /// Node count from which betweenness runs in parallel.
    pub parallel_threshold: usize,
    /// Drop degree-0 nodes right after the graph is built.
    pub prune_isolated: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            amplification: DEFAULT_AMPLIFICATION,
            level: 2,
            max_levels: 8,
            parallel_threshold: PartitionOptions::default().parallel_threshold,
            prune_isolated: false,
        }
    }
}

/// An interactive edit applied between partitioning rounds.
#[derive(Debug, Clone, PartialEq)]
pub enum RefineOp {
    RemoveNode(EntityId),
    PruneIsolated,
    MergeAlias { alias: EntityId, canonical: EntityId },
}

/// Owns every piece of state of one analysis run.
#[derive(Debug)]
pub struct Pipeline {
    config: PipelineConfig,
    stage: Stage,
    catalog: EntityCatalog,
    relations: RelationBuilder,
    graph: DependencyGraph,
    batches: Vec<RelationBatch>,
    partition: Option<NthLevel>,
    analyses: Option<Vec<CutAnalysis>>,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Pipeline {
            config,
            stage: Stage::Ingest,
            catalog: EntityCatalog::new(),
            relations: RelationBuilder::new(),
            graph: DependencyGraph::new(),
            batches: Vec::new(),
            partition: None,
            analyses: None,
        }
    }

    /// Run every stage over `bundle`.
    pub fn run(config: PipelineConfig, bundle: &FactBundle) -> Result<(Pipeline, Report)> {
        let mut pipeline = Pipeline::new(config);
        pipeline.ingest(bundle)?;
        pipeline.build_graph()?;
        pipeline.partition()?;
        pipeline.analyze_cuts()?;
        let report = pipeline.synthesize_report()?;
        Ok((pipeline, report))
    }

    fn enter(&self, requested: Stage) -> Result<()> {
        if self.stage != requested {
            return Err(PipelineError::OutOfOrder {
                requested,
                current: self.stage,
            });
        }
        Ok(())
    }

    /// Register entities and derive the static and dynamic relation batches.
    pub fn ingest(&mut self, bundle: &FactBundle) -> Result<()> {
        self.enter(Stage::Ingest)?;
        if bundle.modules.is_empty() && bundle.observations.is_empty() {
            return Err(IngestionError::Missing {
                artifact: "module analyses or usage observations".to_string(),
            }
            .into());
        }

        self.catalog.register_modules(&bundle.modules);
        self.catalog.register_observed_views(&bundle.observations);
        let attributed = self.catalog.apply_routes(&bundle.routes);

        let static_batch = self.relations.static_batch(&self.catalog, &bundle.modules)?;
        let mut dynamic_batch = self.relations.dynamic_batch(&self.catalog, &bundle.observations)?;
        normalize_weights(&mut dynamic_batch, self.config.amplification);

        tracing::info!(
            "Ingested {} entities ({} route attributions), {} static and {} dynamic relations",
            self.catalog.len(),
            attributed,
            static_batch.len(),
            dynamic_batch.len()
        );
        self.batches = vec![static_batch, dynamic_batch];
        self.stage = Stage::BuildGraph;
        Ok(())
    }

    /// Declare every catalogued entity and add the ingested batches.
    pub fn build_graph(&mut self) -> Result<IngestSummary> {
        self.enter(Stage::BuildGraph)?;
        let mut summary = IngestSummary::default();
        for entity in self.catalog.entities() {
            if let Err(e) = self.graph.add_node(entity.id.clone(), entity.kind) {
                tracing::warn!("{}", e);
                summary.rejected.push(e);
            }
        }
        for batch in &self.batches {
            let batch_summary = self.graph.ingest(batch, &self.catalog);
            summary.edges_written += batch_summary.edges_written;
            summary.rejected.extend(batch_summary.rejected);
        }
        if self.config.prune_isolated {
            self.graph.remove_isolated_nodes();
        }
        tracing::info!(
            "Graph built: {} nodes, {} edges",
            self.graph.node_count(),
            self.graph.edge_count()
        );
        self.stage = Stage::Partition;
        Ok(summary)
    }

    fn partitioner(&self) -> Partitioner {
        Partitioner::new(PartitionOptions {
            parallel_threshold: self.config.parallel_threshold,
        })
    }

    /// Compute the configured level. Exhaustion is reported, not an error.
    pub fn partition(&mut self) -> Result<&NthLevel> {
        self.enter(Stage::Partition)?;
        let outcome = self.partitioner().nth_level(&self.graph, self.config.level);
        if outcome.is_exhausted() {
            tracing::warn!(
                "Level {} not reachable, using level {}",
                self.config.level,
                outcome.level().depth
            );
        }
        self.analyses = None;
        self.stage = Stage::AnalyzeCuts;
        Ok(&*self.partition.insert(outcome))
    }

    /// Exploratory: the first `k` levels (capped by `max_levels`) of the
    /// current graph. Available once the graph is built.
    pub fn levels(&self, k: usize) -> Result<Levels> {
        if matches!(self.stage, Stage::Ingest | Stage::BuildGraph) {
            return Err(PipelineError::OutOfOrder {
                requested: Stage::Partition,
                current: self.stage,
            });
        }
        Ok(self.partitioner().levels(&self.graph, k.min(self.config.max_levels)))
    }

    pub fn analyze_cuts(&mut self) -> Result<&[CutAnalysis]> {
        self.enter(Stage::AnalyzeCuts)?;
        let Some(outcome) = &self.partition else {
            return Err(PipelineError::OutOfOrder {
                requested: Stage::AnalyzeCuts,
                current: Stage::Partition,
            });
        };
        let analyses = CutAnalyzer::new(&self.graph, self.relations.index()).analyze(outcome.level())?;
        self.stage = Stage::SynthesizeReport;
        Ok(self.analyses.insert(analyses).as_slice())
    }

    pub fn synthesize_report(&mut self) -> Result<Report> {
        self.enter(Stage::SynthesizeReport)?;
        let (Some(outcome), Some(analyses)) = (&self.partition, &self.analyses) else {
            return Err(PipelineError::OutOfOrder {
                requested: Stage::SynthesizeReport,
                current: Stage::AnalyzeCuts,
            });
        };
        let report = ReportSynthesizer::new(&self.catalog).synthesize(
            outcome.level(),
            analyses,
            self.relations.unresolved_tables(),
        );
        self.stage = Stage::Done;
        Ok(report)
    }

    /// Edit the graph in place. Discards computed cuts and rewinds to
    /// [`Stage::Partition`].
    pub fn refine(&mut self, op: RefineOp) -> Result<()> {
        if matches!(self.stage, Stage::Ingest | Stage::BuildGraph) {
            return Err(PipelineError::OutOfOrder {
                requested: Stage::Partition,
                current: self.stage,
            });
        }
        match &op {
            RefineOp::RemoveNode(id) => {
                if self.graph.remove_node(id).is_none() {
                    return Err(GraphError::UnknownNode { id: id.clone() }.into());
                }
            }
            RefineOp::PruneIsolated => {
                self.graph.remove_isolated_nodes();
            }
            RefineOp::MergeAlias { alias, canonical } => {
                self.graph.merge_alias(alias, canonical)?;
                if let Err(e) = self.catalog.alias(alias, canonical) {
                    tracing::warn!("Catalog kept {} separate: {}", alias, e);
                }
                self.relations.index_mut().merge_alias(alias, canonical);
            }
        }
        tracing::info!("Refined with {:?}; cuts invalidated", op);
        self.partition = None;
        self.analyses = None;
        self.stage = Stage::Partition;
        Ok(())
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn catalog(&self) -> &EntityCatalog {
        &self.catalog
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    pub fn relations(&self) -> &RelationIndex {
        self.relations.index()
    }

    /// The last computed partition, until the next refinement.
    pub fn current_partition(&self) -> Option<&NthLevel> {
        self.partition.as_ref()
    }

    pub fn cut_analyses(&self) -> Option<&[CutAnalysis]> {
        self.analyses.as_deref()
    }
}
