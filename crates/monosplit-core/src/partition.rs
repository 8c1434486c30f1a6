//! Edge-betweenness community detection (Girvan–Newman)
//!
//! The partitioner works on a frozen snapshot of the dependency graph:
//! nodes are numbered in id order, so comparing node numbers compares ids and
//! tie-breaking by endpoint pair is a plain tuple comparison.
//!
//! Each round computes edge betweenness over the unweighted topology, removes
//! the single most central edge and recomputes connected components. A new
//! partition level is recorded whenever the component count grows. Rounds
//! are strictly sequential; only the per-source shortest-path accumulation
//! inside one round runs in parallel.

use std::collections::{BTreeSet, VecDeque};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::graph::DependencyGraph;
use crate::model::{EdgeKey, EntityId};

/// Relative tolerance under which two betweenness values count as equal.
const TIE_TOLERANCE: f64 = 1e-9;

/// One proposed service boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cut {
    pub index: usize,
    pub nodes: BTreeSet<EntityId>,
}

impl Cut {
    pub fn contains(&self, id: &EntityId) -> bool {
        self.nodes.contains(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// A set of disjoint cuts covering the partitioned graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartitionLevel {
    /// 1 for the unsplit graph, 2 for the first split, and so on.
    pub depth: usize,
    pub cuts: Vec<Cut>,
    /// Edges removed since the previous level.
    pub severed: Vec<EdgeKey>,
    /// Graph generation this level was computed from.
    pub generation: u64,
}

impl PartitionLevel {
    fn empty(generation: u64) -> Self {
        PartitionLevel {
            depth: 0,
            cuts: Vec::new(),
            severed: Vec::new(),
            generation,
        }
    }

    /// The cut holding `id`, if any.
    pub fn cut_of(&self, id: &EntityId) -> Option<usize> {
        self.cuts.iter().position(|c| c.contains(id))
    }
}

/// The first `k` levels of a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Levels {
    pub levels: Vec<PartitionLevel>,
    /// Fewer than the requested number of levels exist.
    pub exhausted: bool,
}

/// Outcome of asking for one specific level.
#[derive(Debug, Clone, PartialEq)]
pub enum NthLevel {
    Reached(PartitionLevel),
    /// The graph ran out of splits; `deepest` is the last level reached.
    Exhausted { deepest: PartitionLevel },
}

impl NthLevel {
    pub fn level(&self) -> &PartitionLevel {
        match self {
            NthLevel::Reached(level) => level,
            NthLevel::Exhausted { deepest } => deepest,
        }
    }

    pub fn into_level(self) -> PartitionLevel {
        match self {
            NthLevel::Reached(level) => level,
            NthLevel::Exhausted { deepest } => deepest,
        }
    }

    pub fn is_exhausted(&self) -> bool {
        matches!(self, NthLevel::Exhausted { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartitionOptions {
    /// Node count from which betweenness is accumulated on the rayon pool.
    pub parallel_threshold: usize,
}

impl Default for PartitionOptions {
    fn default() -> Self {
        PartitionOptions {
            parallel_threshold: 64,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Partitioner {
    options: PartitionOptions,
}

impl Partitioner {
    pub fn new(options: PartitionOptions) -> Self {
        Partitioner { options }
    }

    /// The first `k` recorded levels of the whole graph.
    pub fn levels(&self, graph: &DependencyGraph, k: usize) -> Levels {
        self.run(Snapshot::new(graph, None), graph.generation(), k)
    }

    /// The first `k` levels of the subgraph induced by `ids`.
    ///
    /// Levels are stamped with the full graph's generation, so they can be
    /// analyzed against it.
    pub fn levels_within(&self, graph: &DependencyGraph, ids: &BTreeSet<EntityId>, k: usize) -> Levels {
        self.run(Snapshot::new(graph, Some(ids)), graph.generation(), k)
    }

    /// The partition after the `n`-th increase in component count, counting
    /// the unsplit graph as level 1.
    pub fn nth_level(&self, graph: &DependencyGraph, n: usize) -> NthLevel {
        let Levels { mut levels, exhausted } = self.levels(graph, n.max(1));
        match levels.pop() {
            Some(level) if !exhausted => NthLevel::Reached(level),
            Some(deepest) => NthLevel::Exhausted { deepest },
            None => NthLevel::Exhausted {
                deepest: PartitionLevel::empty(graph.generation()),
            },
        }
    }

    /// Betweenness of every edge, in edge key order.
    pub fn edge_betweenness(&self, graph: &DependencyGraph) -> Vec<(EdgeKey, f64)> {
        let snapshot = Snapshot::new(graph, None);
        let scores = snapshot.betweenness(self.parallel_for(&snapshot));
        snapshot
            .edges
            .iter()
            .zip(scores)
            .map(|(&(u, v), score)| (snapshot.key(u, v), score))
            .collect()
    }

    fn parallel_for(&self, snapshot: &Snapshot) -> bool {
        snapshot.ids.len() >= self.options.parallel_threshold
    }

    fn run(&self, mut snapshot: Snapshot, generation: u64, k: usize) -> Levels {
        if k == 0 {
            return Levels { levels: Vec::new(), exhausted: false };
        }
        if snapshot.ids.is_empty() {
            return Levels { levels: Vec::new(), exhausted: true };
        }

        let parallel = self.parallel_for(&snapshot);
        let mut components = snapshot.components();
        let mut levels = vec![snapshot.level(1, &components, Vec::new(), generation)];
        let mut severed = Vec::new();

        while levels.len() < k && snapshot.alive_edges > 0 {
            let Some((u, v)) = snapshot.most_central_edge(parallel) else {
                break;
            };
            snapshot.remove_edge(u, v);
            let key = snapshot.key(u, v);
            tracing::debug!("Removed edge {}", key);
            severed.push(key);

            let next = snapshot.components();
            if next.len() > components.len() {
                let depth = levels.len() + 1;
                levels.push(snapshot.level(depth, &next, std::mem::take(&mut severed), generation));
                tracing::debug!("Level {}: {} cuts", depth, next.len());
            }
            components = next;
        }

        let exhausted = levels.len() < k;
        tracing::info!(
            "Partitioned {} nodes into {} levels{}",
            snapshot.ids.len(),
            levels.len(),
            if exhausted { " (exhausted)" } else { "" }
        );
        Levels { levels, exhausted }
    }
}

/// Frozen, index-based copy of the graph topology.
struct Snapshot {
    /// Node ids in ascending order.
    ids: Vec<EntityId>,
    /// Every edge as `(u, v)` with `u < v`, in ascending order.
    edges: Vec<(usize, usize)>,
    /// Live `(neighbor, edge)` pairs per node.
    adjacency: Vec<Vec<(usize, usize)>>,
    alive: Vec<bool>,
    alive_edges: usize,
}

impl Snapshot {
    fn new(graph: &DependencyGraph, only: Option<&BTreeSet<EntityId>>) -> Self {
        let ids: Vec<EntityId> = graph
            .nodes()
            .into_iter()
            .map(|n| n.id.clone())
            .filter(|id| only.map_or(true, |set| set.contains(id)))
            .collect();
        let position = |id: &EntityId| ids.binary_search(id).ok();

        let mut edges = Vec::new();
        for (key, _) in graph.edges() {
            if let (Some(u), Some(v)) = (position(&key.0), position(&key.1)) {
                edges.push((u.min(v), u.max(v)));
            }
        }
        edges.sort_unstable();

        let mut adjacency = vec![Vec::new(); ids.len()];
        for (e, &(u, v)) in edges.iter().enumerate() {
            adjacency[u].push((v, e));
            adjacency[v].push((u, e));
        }
        for neighbors in &mut adjacency {
            neighbors.sort_unstable();
        }

        let alive_edges = edges.len();
        Snapshot {
            alive: vec![true; edges.len()],
            ids,
            edges,
            adjacency,
            alive_edges,
        }
    }

    fn key(&self, u: usize, v: usize) -> EdgeKey {
        EdgeKey::of(&self.ids[u], &self.ids[v])
    }

    fn remove_edge(&mut self, u: usize, v: usize) {
        self.adjacency[u].retain(|&(n, _)| n != v);
        self.adjacency[v].retain(|&(n, _)| n != u);
        if let Ok(e) = self.edges.binary_search(&(u.min(v), u.max(v))) {
            if self.alive[e] {
                self.alive[e] = false;
                self.alive_edges -= 1;
            }
        }
    }

    /// Connected components, each sorted, ordered by smallest member.
    fn components(&self) -> Vec<Vec<usize>> {
        let n = self.ids.len();
        let mut seen = vec![false; n];
        let mut components = Vec::new();
        for start in 0..n {
            if seen[start] {
                continue;
            }
            seen[start] = true;
            let mut component = vec![start];
            let mut queue = VecDeque::from([start]);
            while let Some(node) = queue.pop_front() {
                for &(next, _) in &self.adjacency[node] {
                    if !seen[next] {
                        seen[next] = true;
                        component.push(next);
                        queue.push_back(next);
                    }
                }
            }
            component.sort_unstable();
            components.push(component);
        }
        components
    }

    fn level(&self, depth: usize, components: &[Vec<usize>], severed: Vec<EdgeKey>, generation: u64) -> PartitionLevel {
        PartitionLevel {
            depth,
            cuts: components
                .iter()
                .enumerate()
                .map(|(index, members)| Cut {
                    index,
                    nodes: members.iter().map(|&m| self.ids[m].clone()).collect(),
                })
                .collect(),
            severed,
            generation,
        }
    }

    /// The live edge with maximal betweenness; ties go to the smallest pair.
    fn most_central_edge(&self, parallel: bool) -> Option<(usize, usize)> {
        let scores = self.betweenness(parallel);
        let mut best: Option<(usize, f64)> = None;
        for (e, &score) in scores.iter().enumerate() {
            if !self.alive[e] {
                continue;
            }
            match best {
                Some((_, top)) if score <= top + TIE_TOLERANCE * top.abs().max(1.0) => {}
                _ => best = Some((e, score)),
            }
        }
        best.map(|(e, _)| self.edges[e])
    }

    /// Edge betweenness over live edges, each unordered pair counted once.
    fn betweenness(&self, parallel: bool) -> Vec<f64> {
        let m = self.edges.len();
        let n = self.ids.len();
        let mut scores = if parallel {
            (0..n)
                .into_par_iter()
                .fold(
                    || vec![0.0; m],
                    |mut acc, source| {
                        self.accumulate_from(source, &mut acc);
                        acc
                    },
                )
                .reduce(
                    || vec![0.0; m],
                    |mut a, b| {
                        a.iter_mut().zip(b).for_each(|(x, y)| *x += y);
                        a
                    },
                )
        } else {
            let mut acc = vec![0.0; m];
            for source in 0..n {
                self.accumulate_from(source, &mut acc);
            }
            acc
        };
        // every path was seen from both of its endpoints
        scores.iter_mut().for_each(|s| *s /= 2.0);
        scores
    }

    /// Brandes' single-source dependency accumulation onto edges.
    fn accumulate_from(&self, source: usize, acc: &mut [f64]) {
        let n = self.ids.len();
        let mut order = Vec::with_capacity(n);
        let mut preds: Vec<Vec<(usize, usize)>> = vec![Vec::new(); n];
        let mut sigma = vec![0.0_f64; n];
        let mut dist = vec![usize::MAX; n];
        sigma[source] = 1.0;
        dist[source] = 0;

        let mut queue = VecDeque::from([source]);
        while let Some(v) = queue.pop_front() {
            order.push(v);
            for &(w, e) in &self.adjacency[v] {
                if dist[w] == usize::MAX {
                    dist[w] = dist[v] + 1;
                    queue.push_back(w);
                }
                if dist[w] == dist[v] + 1 {
                    sigma[w] += sigma[v];
                    preds[w].push((v, e));
                }
            }
        }

        let mut delta = vec![0.0_f64; n];
        while let Some(w) = order.pop() {
            for &(v, e) in &preds[w] {
                let share = sigma[v] / sigma[w] * (1.0 + delta[w]);
                acc[e] += share;
                delta[v] += share;
            }
        }
    }
}
