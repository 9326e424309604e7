//! Evolution graph across snapshots and cluster families.
//!
//! Every community of every snapshot becomes a node `"{snapshot}_{index}"`.
//! Communities of consecutive snapshots are linked by the text volume that
//! the leaf mapping carries from one to the other.

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::unionfind::UnionFind;
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use tracing::{debug, info, warn};

use lexnet_core::error::{LexnetError, Result};
use lexnet_core::types::parent_key_prefix;

use crate::clustering::Clustering;
use crate::snapshot_index::SnapshotIndex;

/// Default pruning fraction for [`cluster_families`].
pub const FAMILY_THRESHOLD: f64 = 0.15;

/// Target of a leaf mapping entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LeafTarget {
    One(String),
    Many(Vec<String>),
}

impl LeafTarget {
    pub fn keys(&self) -> &[String] {
        match self {
            LeafTarget::One(key) => std::slice::from_ref(key),
            LeafTarget::Many(keys) => keys,
        }
    }
}

/// `"{prev_leaf}_{segment}" -> "{leaf}_{segment}"` between two snapshots.
pub type LeafMapping = BTreeMap<String, LeafTarget>;

/// A mapped pair that could not be turned into edge weight.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum MappingDiagnostic {
    MalformedKey { key: String },
    UnresolvedPrevious { leaf: String, tokens_n: Option<u64> },
    UnresolvedCurrent { leaf: String, tokens_n: Option<u64> },
    MissingSize { leaf: String },
    SegmentOutOfRange { leaf: String, segment: usize, segments: usize },
}

impl fmt::Display for MappingDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MappingDiagnostic::MalformedKey { key } => write!(f, "{key} has no segment index"),
            MappingDiagnostic::UnresolvedPrevious { leaf, tokens_n }
            | MappingDiagnostic::UnresolvedCurrent { leaf, tokens_n } => match tokens_n {
                Some(t) => write!(f, "{leaf} not found and has {t} tokens"),
                None => write!(f, "{leaf} not found"),
            },
            MappingDiagnostic::MissingSize { leaf } => write!(f, "{leaf} has no recorded size"),
            MappingDiagnostic::SegmentOutOfRange {
                leaf,
                segment,
                segments,
            } => write!(f, "{leaf} has {segments} segments, got index {segment}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvolutionNode {
    pub key: String,
    pub snapshot: String,
    pub chars_n: u64,
    pub tokens_n: u64,
    /// `"law,count,law,count…"`, most frequent first.
    pub law_names: String,
    /// Member keys, largest first, comma joined.
    pub nodes_contained: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Flow {
    pub tokens_n: u64,
    pub chars_n: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SerializedFlow {
    source: String,
    target: String,
    #[serde(flatten)]
    flow: Flow,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerializedEvolutionGraph {
    nodes: Vec<EvolutionNode>,
    edges: Vec<SerializedFlow>,
}

/// Directed graph of communities over time.
#[derive(Debug, Clone, Default)]
pub struct EvolutionGraph {
    graph: DiGraph<EvolutionNode, Flow>,
    index: HashMap<String, NodeIndex>,
}

impl EvolutionGraph {
    pub fn new() -> Self {
        Self::default()
    }

    fn add_node(&mut self, node: EvolutionNode) {
        let key = node.key.clone();
        let idx = self.graph.add_node(node);
        self.index.insert(key, idx);
    }

    fn add_flow(&mut self, source: &str, target: &str, flow: Flow) -> Result<()> {
        let s = *self
            .index
            .get(source)
            .ok_or_else(|| LexnetError::node_not_found(source))?;
        let t = *self
            .index
            .get(target)
            .ok_or_else(|| LexnetError::node_not_found(target))?;
        match self.graph.find_edge(s, t) {
            Some(e) => {
                let existing = &mut self.graph[e];
                existing.tokens_n += flow.tokens_n;
                existing.chars_n += flow.chars_n;
            }
            None => {
                self.graph.add_edge(s, t, flow);
            }
        }
        Ok(())
    }

    pub fn node(&self, key: &str) -> Option<&EvolutionNode> {
        self.index.get(key).map(|&i| &self.graph[i])
    }

    pub fn nodes(&self) -> impl Iterator<Item = &EvolutionNode> + '_ {
        self.graph.node_weights()
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn edges(&self) -> impl Iterator<Item = (&str, &str, &Flow)> + '_ {
        self.graph.edge_references().map(move |e| {
            (
                self.graph[e.source()].key.as_str(),
                self.graph[e.target()].key.as_str(),
                e.weight(),
            )
        })
    }

    pub fn flow(&self, source: &str, target: &str) -> Option<&Flow> {
        let s = *self.index.get(source)?;
        let t = *self.index.get(target)?;
        self.graph.find_edge(s, t).map(|e| &self.graph[e])
    }

    pub fn to_serialized(&self) -> SerializedEvolutionGraph {
        SerializedEvolutionGraph {
            nodes: self.graph.node_weights().cloned().collect(),
            edges: self
                .edges()
                .map(|(s, t, f)| SerializedFlow {
                    source: s.to_string(),
                    target: t.to_string(),
                    flow: *f,
                })
                .collect(),
        }
    }

    pub fn from_serialized(state: SerializedEvolutionGraph) -> Result<Self> {
        let mut graph = Self::new();
        for node in state.nodes {
            graph.add_node(node);
        }
        for edge in state.edges {
            graph.add_flow(&edge.source, &edge.target, edge.flow)?;
        }
        Ok(graph)
    }
}

struct PreviousSnapshot {
    snapshot: String,
    community_of: HashMap<String, usize>,
    tokens_n: BTreeMap<String, u64>,
}

/// Folds snapshots, oldest first, into an [`EvolutionGraph`].
#[derive(Default)]
pub struct EvolutionBuilder {
    graph: EvolutionGraph,
    previous: Option<PreviousSnapshot>,
    diagnostics: Vec<MappingDiagnostic>,
}

fn law_names(community: &[String], index: &SnapshotIndex) -> String {
    let mut counts: BTreeMap<&str, u64> = BTreeMap::new();
    for node in community {
        let n = index.seqitem_counts.get(node).copied().unwrap_or(0);
        if n > 0 {
            *counts.entry(parent_key_prefix(node)).or_insert(0) += n;
        }
    }
    let mut counts: Vec<(&str, u64)> = counts.into_iter().collect();
    counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    counts
        .iter()
        .map(|(law, n)| format!("{law},{n}"))
        .collect::<Vec<_>>()
        .join(",")
}

fn split_segment(key: &str) -> Option<(&str, usize)> {
    let (leaf, segment) = key.rsplit_once('_')?;
    Some((leaf, segment.parse().ok()?))
}

impl EvolutionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the communities of `snapshot` and link them to the previous
    /// snapshot through `mapping`.
    ///
    /// Snapshots must arrive in strictly increasing order and every
    /// snapshot but the first needs a mapping.
    pub fn add_snapshot(
        &mut self,
        snapshot: &str,
        clustering: &Clustering,
        index: &SnapshotIndex,
        mapping: Option<&LeafMapping>,
    ) -> Result<()> {
        if let Some(prev) = &self.previous {
            if snapshot <= prev.snapshot.as_str() {
                return Err(LexnetError::integrity(format!(
                    "snapshot {snapshot} does not follow {}",
                    prev.snapshot
                )));
            }
            if mapping.is_none() {
                return Err(LexnetError::missing(
                    "snapshot mappings",
                    vec![format!("{}_{snapshot}.json", prev.snapshot)],
                ));
            }
        }

        let tokens = |k: &str| index.tokens_n.get(k).copied().unwrap_or(0);
        let chars = |k: &str| index.chars_n.get(k).copied().unwrap_or(0);
        for (id, community) in clustering.communities.iter().enumerate() {
            if let Some(bad) = community.iter().find(|k| k.contains(',')) {
                return Err(LexnetError::integrity(format!(
                    "node key {bad:?} contains a comma"
                )));
            }
            let mut members: Vec<&str> = community.iter().map(String::as_str).collect();
            members.sort_by(|a, b| tokens(*b).cmp(&tokens(*a)));
            self.graph.add_node(EvolutionNode {
                key: format!("{snapshot}_{id}"),
                snapshot: snapshot.to_string(),
                chars_n: members.iter().map(|&k| chars(k)).sum(),
                tokens_n: members.iter().map(|&k| tokens(k)).sum(),
                law_names: law_names(community, index),
                nodes_contained: members.join(","),
            });
        }

        let mut community_of: HashMap<String, usize> = HashMap::new();
        for (id, community) in clustering.communities.iter().enumerate() {
            for node in community {
                for leaf in index.items_mapping.get(node).into_iter().flatten() {
                    community_of.insert(leaf.clone(), id);
                }
            }
        }

        if let (Some(prev), Some(mapping)) = (&self.previous, mapping) {
            let mut flows: BTreeMap<(usize, usize), Flow> = BTreeMap::new();
            for (prev_key, targets) in mapping {
                for key in targets.keys() {
                    match resolve_pair(prev, &community_of, index, prev_key, key) {
                        Ok((from, to, flow)) => {
                            let acc = flows.entry((from, to)).or_default();
                            acc.tokens_n += flow.tokens_n;
                            acc.chars_n += flow.chars_n;
                        }
                        Err(diagnostic) => {
                            warn!(snapshot, "{diagnostic}");
                            self.diagnostics.push(diagnostic);
                        }
                    }
                }
            }
            for ((from, to), flow) in &flows {
                let source = format!("{}_{from}", prev.snapshot);
                let target = format!("{snapshot}_{to}");
                self.graph.add_flow(&source, &target, *flow)?;
            }
            debug!(
                from = %prev.snapshot,
                to = snapshot,
                edges = flows.len(),
                "linked snapshots"
            );
        }

        self.previous = Some(PreviousSnapshot {
            snapshot: snapshot.to_string(),
            community_of,
            tokens_n: index.tokens_n.clone(),
        });
        Ok(())
    }

    /// The finished graph and every skipped mapping.
    pub fn finish(self) -> (EvolutionGraph, Vec<MappingDiagnostic>) {
        info!(
            nodes = self.graph.node_count(),
            edges = self.graph.edge_count(),
            skipped = self.diagnostics.len(),
            "evolution graph finished"
        );
        (self.graph, self.diagnostics)
    }
}

/// Community pair and flow of one mapped segment.
fn resolve_pair(
    prev: &PreviousSnapshot,
    community_of: &HashMap<String, usize>,
    index: &SnapshotIndex,
    prev_key: &str,
    key: &str,
) -> std::result::Result<(usize, usize, Flow), MappingDiagnostic> {
    let (prev_leaf, _) = split_segment(prev_key).ok_or_else(|| MappingDiagnostic::MalformedKey {
        key: prev_key.to_string(),
    })?;
    let (leaf, segment) =
        split_segment(key).ok_or_else(|| MappingDiagnostic::MalformedKey { key: key.to_string() })?;

    let from = *prev
        .community_of
        .get(prev_leaf)
        .ok_or_else(|| MappingDiagnostic::UnresolvedPrevious {
            leaf: prev_leaf.to_string(),
            tokens_n: prev.tokens_n.get(prev_leaf).copied(),
        })?;
    let to = *community_of
        .get(leaf)
        .ok_or_else(|| MappingDiagnostic::UnresolvedCurrent {
            leaf: leaf.to_string(),
            tokens_n: index.tokens_n.get(leaf).copied(),
        })?;

    let flow = match index.texts_tokens_n.get(leaf) {
        Some(segments) => {
            let tokens_n = *segments.get(segment).ok_or_else(|| {
                MappingDiagnostic::SegmentOutOfRange {
                    leaf: leaf.to_string(),
                    segment,
                    segments: segments.len(),
                }
            })?;
            let chars_n = index
                .texts_chars_n
                .get(leaf)
                .and_then(|c| c.get(segment))
                .copied()
                .unwrap_or(0);
            Flow { tokens_n, chars_n }
        }
        None => {
            if segment != 0 {
                return Err(MappingDiagnostic::SegmentOutOfRange {
                    leaf: leaf.to_string(),
                    segment,
                    segments: 1,
                });
            }
            let tokens_n = *index
                .tokens_n
                .get(leaf)
                .ok_or_else(|| MappingDiagnostic::MissingSize {
                    leaf: leaf.to_string(),
                })?;
            Flow {
                tokens_n,
                chars_n: index.chars_n.get(leaf).copied().unwrap_or(0),
            }
        }
    };
    Ok((from, to, flow))
}

/// Chains of communities that persist across snapshots.
///
/// An edge survives if its `tokens_n` reaches `threshold` times the
/// `tokens_n` of both endpoints. Families are the undirected components of
/// what remains, ordered by largest member then largest key, descending.
pub fn cluster_families(graph: &EvolutionGraph, threshold: f64) -> Vec<Vec<String>> {
    let inner = &graph.graph;
    let mut components = UnionFind::new(inner.node_count());
    for e in inner.edge_references() {
        let tokens = e.weight().tokens_n as f64;
        let source = inner[e.source()].tokens_n as f64;
        let target = inner[e.target()].tokens_n as f64;
        if tokens < source * threshold || tokens < target * threshold {
            continue;
        }
        components.union(e.source().index(), e.target().index());
    }

    let mut grouped: BTreeMap<usize, Vec<&EvolutionNode>> = BTreeMap::new();
    for idx in inner.node_indices() {
        grouped
            .entry(components.find(idx.index()))
            .or_default()
            .push(&inner[idx]);
    }

    let mut families: Vec<Vec<&EvolutionNode>> = grouped.into_values().collect();
    for family in families.iter_mut() {
        family.sort_by(|a, b| (b.tokens_n, &b.key).cmp(&(a.tokens_n, &a.key)));
    }
    let rank = |family: &[&EvolutionNode]| {
        let max_tokens = family.iter().map(|n| n.tokens_n).max().unwrap_or(0);
        let max_key = family.iter().map(|n| n.key.clone()).max().unwrap_or_default();
        (max_tokens, max_key)
    };
    families.sort_by_cached_key(|f| std::cmp::Reverse(rank(f.as_slice())));
    families
        .into_iter()
        .map(|f| f.into_iter().map(|n| n.key.clone()).collect())
        .collect()
}
