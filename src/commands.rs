//! CLI command implementations

use anyhow::{Context, bail};
use monosplit_core::{EntityId, Pipeline, PipelineConfig, RefineOp};
use serde::Serialize;
use std::path::Path;

pub fn config(explicit: Option<&Path>) -> anyhow::Result<PipelineConfig> {
    let cwd = std::env::current_dir().context("cannot determine working directory")?;
    monosplit_facts::resolve_config(explicit, &cwd).context("failed to load pipeline config")
}

/// Turn `--remove` and `--merge` flags into refinement steps.
pub fn refinements(remove: &[String], merge: &[String]) -> anyhow::Result<Vec<RefineOp>> {
    let mut ops: Vec<RefineOp> = remove
        .iter()
        .map(|id| RefineOp::RemoveNode(EntityId::new(id.as_str())))
        .collect();
    for pair in merge {
        let Some((alias, canonical)) = pair.split_once('=') else {
            bail!("--merge expects ALIAS=CANONICAL, got {:?}", pair);
        };
        if alias.trim().is_empty() || canonical.trim().is_empty() {
            bail!("--merge expects ALIAS=CANONICAL, got {:?}", pair);
        }
        ops.push(RefineOp::MergeAlias {
            alias: EntityId::new(alias.trim()),
            canonical: EntityId::new(canonical.trim()),
        });
    }
    Ok(ops)
}

/// Load the bundle and run the pipeline up to a built graph.
fn prepare(bundle: &Path, config: PipelineConfig) -> anyhow::Result<Pipeline> {
    let facts = monosplit_facts::load_bundle(bundle)
        .with_context(|| format!("failed to load fact bundle {}", bundle.display()))?;
    let mut pipeline = Pipeline::new(config);
    pipeline.ingest(&facts)?;
    let summary = pipeline.build_graph()?;
    if !summary.rejected.is_empty() {
        tracing::warn!("{} relations rejected while building the graph", summary.rejected.len());
    }
    Ok(pipeline)
}

pub fn analyze(
    bundle: &Path,
    config: PipelineConfig,
    refinements: Vec<RefineOp>,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    tracing::info!("Analyzing {} at level {}", bundle.display(), config.level);
    let mut pipeline = prepare(bundle, config)?;
    for op in refinements {
        // a bad refinement is reported and skipped, the run goes on
        if let Err(e) = pipeline.refine(op) {
            tracing::warn!("Refinement skipped: {}", e);
        }
    }
    pipeline.partition()?;
    pipeline.analyze_cuts()?;
    let report = pipeline.synthesize_report()?;
    write_json(&report, output)
}

pub fn levels(bundle: &Path, config: PipelineConfig) -> anyhow::Result<()> {
    let max = config.max_levels;
    let pipeline = prepare(bundle, config)?;
    let levels = pipeline.levels(max)?;
    if levels.exhausted {
        tracing::info!("Graph split completely after {} levels", levels.levels.len());
    }
    write_json(&levels, None)
}

pub fn export(bundle: &Path, config: PipelineConfig, output: Option<&Path>) -> anyhow::Result<()> {
    let pipeline = prepare(bundle, config)?;
    write_json(&pipeline.graph().export(), output)
}

fn write_json<T: Serialize>(value: &T, output: Option<&Path>) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    match output {
        Some(path) => {
            std::fs::write(path, json).with_context(|| format!("cannot write {}", path.display()))?;
            tracing::info!("Wrote {}", path.display());
        }
        None => println!("{}", json),
    }
    Ok(())
}
