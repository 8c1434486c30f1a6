//! Migration advice for crossing dependencies

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::EntityCatalog;
use crate::cuts::{Attribution, CrossingDependency, CutAnalysis};
use crate::model::{AccessKind, AccessKinds, EntityId, EntityKind};
use crate::partition::PartitionLevel;

/// A migration pattern that replaces an in-process dependency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Remediation {
    #[serde(rename = "API Composition")]
    ApiComposition,
    #[serde(rename = "Synchronous Remote Call")]
    SynchronousRemoteCall,
    #[serde(rename = "Asynchronous Remote Call")]
    AsynchronousRemoteCall,
    #[serde(rename = "Remote Call")]
    RemoteCall,
    #[serde(rename = "Saga")]
    Saga,
}

impl fmt::Display for Remediation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Remediation::ApiComposition => "API Composition",
            Remediation::SynchronousRemoteCall => "Synchronous Remote Call",
            Remediation::AsynchronousRemoteCall => "Asynchronous Remote Call",
            Remediation::RemoteCall => "Remote Call",
            Remediation::Saga => "Saga",
        };
        f.write_str(label)
    }
}

const READ_GUIDANCE: &[Remediation] = &[
    Remediation::ApiComposition,
    Remediation::SynchronousRemoteCall,
    Remediation::AsynchronousRemoteCall,
];

const WRITE_GUIDANCE: &[Remediation] = &[Remediation::RemoteCall, Remediation::Saga];

const READ_WRITE_GUIDANCE: &[Remediation] = &[
    Remediation::RemoteCall,
    Remediation::Saga,
    Remediation::ApiComposition,
    Remediation::SynchronousRemoteCall,
    Remediation::AsynchronousRemoteCall,
];

/// Ordered remediation options for an access pattern. Empty when unattributed.
pub fn guidance_for(access_kinds: &AccessKinds) -> &'static [Remediation] {
    let read = access_kinds.contains(&AccessKind::Read);
    let write = access_kinds.contains(&AccessKind::Write);
    match (read, write) {
        (true, false) => READ_GUIDANCE,
        (false, true) => WRITE_GUIDANCE,
        (true, true) => READ_WRITE_GUIDANCE,
        (false, false) => &[],
    }
}

/// What to do about one crossing dependency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Instruction {
    pub internal_node: EntityId,
    pub external_node: EntityId,
    pub external_cut: Option<usize>,
    pub weight: f64,
    pub access_kinds: AccessKinds,
    pub remediations: Vec<Remediation>,
    pub needs_manual_review: bool,
}

impl Instruction {
    pub fn for_crossing(crossing: &CrossingDependency) -> Self {
        Instruction {
            internal_node: crossing.internal_node.clone(),
            external_node: crossing.external_node.clone(),
            external_cut: crossing.external_cut,
            weight: crossing.weight,
            access_kinds: crossing.access_kinds.clone(),
            remediations: guidance_for(&crossing.access_kinds).to_vec(),
            needs_manual_review: crossing.attribution == Attribution::Unattributed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportEntry {
    pub cut_index: usize,
    pub nodes: Vec<EntityId>,
    pub implicated_modules: Vec<String>,
    pub instructions: Vec<Instruction>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSummary {
    pub modules_analyzed: usize,
    /// Views in the partitioned graph.
    pub views: usize,
    pub models: usize,
    pub cuts: usize,
    pub crossing_dependencies: usize,
    pub manual_review: usize,
    pub unresolved_tables: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub generated_at: DateTime<Utc>,
    pub depth: usize,
    pub summary: ReportSummary,
    pub entries: Vec<ReportEntry>,
}

pub struct ReportSynthesizer<'a> {
    catalog: &'a EntityCatalog,
}

impl<'a> ReportSynthesizer<'a> {
    pub fn new(catalog: &'a EntityCatalog) -> Self {
        ReportSynthesizer { catalog }
    }

    /// One entry per cut, in cut order.
    pub fn entries(&self, level: &PartitionLevel, analyses: &[CutAnalysis]) -> Vec<ReportEntry> {
        analyses
            .iter()
            .map(|analysis| {
                let nodes = level
                    .cuts
                    .get(analysis.cut_index)
                    .map(|cut| cut.nodes.iter().cloned().collect())
                    .unwrap_or_default();
                ReportEntry {
                    cut_index: analysis.cut_index,
                    nodes,
                    implicated_modules: self.implicated_modules(&analysis.crossing),
                    instructions: analysis.crossing.iter().map(Instruction::for_crossing).collect(),
                }
            })
            .collect()
    }

    /// Sorted, de-duplicated owning modules of both ends of every crossing.
    pub fn implicated_modules(&self, crossing: &[CrossingDependency]) -> Vec<String> {
        let mut modules = BTreeSet::new();
        for dependency in crossing {
            for id in [&dependency.internal_node, &dependency.external_node] {
                match self.catalog.module_of(id) {
                    Some(module) if !module.is_empty() => {
                        modules.insert(module.to_string());
                    }
                    _ => tracing::debug!("No owning module known for {}", id),
                }
            }
        }
        modules.into_iter().collect()
    }

    pub fn synthesize(
        &self,
        level: &PartitionLevel,
        analyses: &[CutAnalysis],
        unresolved_tables: &BTreeSet<String>,
    ) -> Report {
        let entries = self.entries(level, analyses);
        let instructions = entries.iter().flat_map(|e| e.instructions.iter());
        let (crossing_dependencies, manual_review) =
            instructions.fold((0, 0), |(all, review), i| (all + 1, review + usize::from(i.needs_manual_review)));

        // only nodes that were actually partitioned
        let count_of_kind = |kind: EntityKind| {
            level
                .cuts
                .iter()
                .flat_map(|cut| cut.nodes.iter())
                .filter(|id| self.catalog.kind_of(id) == Some(kind))
                .count()
        };
        let summary = ReportSummary {
            modules_analyzed: self.catalog.modules_seen(),
            views: count_of_kind(EntityKind::View),
            models: count_of_kind(EntityKind::Model),
            cuts: level.cuts.len(),
            crossing_dependencies,
            manual_review,
            unresolved_tables: unresolved_tables.iter().cloned().collect(),
        };
        tracing::info!(
            "Report: {} cuts, {} crossing dependencies, {} need manual review",
            summary.cuts,
            summary.crossing_dependencies,
            summary.manual_review
        );

        Report {
            generated_at: Utc::now(),
            depth: level.depth,
            summary,
            entries,
        }
    }
}
