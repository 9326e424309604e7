//! Co-occurrence edges derived from a court decision citation network,
//! and the full preprocessing chain.
//!
//! Two statute provisions co-occur when one decision cites both. Every
//! decision contributes one count per unordered pair of distinct provisions
//! it cites. Provisions are matched through their citekeys; keys that do
//! not resolve to a node of the augmented graph are reported back so the
//! citekey tables can be curated.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use tracing::{debug, info, warn};

use lexnet_core::config::{CooccurrenceType, RunConfig};
use lexnet_core::error::{ConfigError, LexnetError, Result};
use lexnet_core::graph::DocGraph;
use lexnet_core::types::{Bipartite, EdgeData, EdgeType, SizeAttr};

use crate::quotient::quotient_decision_graph;
use crate::reduction::{quotient_graph_with_merge, ContractionRule, NodesMapping};
use crate::sequence::{sequence_graph, Decay};
use crate::storage;

/// `pp_co_occurrence` value that drops reference edges after augmentation.
pub const CO_OCCURRENCE_ONLY: f64 = -1.0;
/// `pp_co_occurrence` value that balances co-occurrence against reference mass.
pub const CO_OCCURRENCE_BALANCED: f64 = -2.0;

static CITEKEY_YEAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(.+)[\-–]\d{4}$").expect("citekey pattern is valid"));

/// Strip a version year from the law part of a citekey:
/// `"name-2019_12"` becomes `"name_12"`.
pub fn simplify_citekey(citekey: &str) -> String {
    let Some((law, nr)) = citekey.split_once('_') else {
        return citekey.to_string();
    };
    match CITEKEY_YEAR.captures(law).and_then(|c| c.get(1)) {
        Some(m) => format!("{}_{nr}", m.as_str()),
        None => citekey.to_string(),
    }
}

/// Two nodes claimed the same simplified citekey. The later one wins.
#[derive(Debug, Clone, PartialEq)]
pub struct CitekeyConflict {
    pub citekey: String,
    pub previous: String,
    pub current: String,
}

#[derive(Debug, Clone, Default)]
pub struct CooccurrenceReport {
    /// Unresolved citekeys with the number of decisions citing them,
    /// most frequent first.
    pub missing: Vec<(String, usize)>,
    pub conflicts: Vec<CitekeyConflict>,
    /// Distinct co-occurring node pairs.
    pub pairs: usize,
}

fn citekey_table(
    augmented: &DocGraph,
    original: &DocGraph,
    mapping: &NodesMapping,
    conflicts: &mut Vec<CitekeyConflict>,
) -> HashMap<String, String> {
    let mut table: HashMap<String, String> = augmented
        .nodes()
        .filter_map(|n| match n.citekey.as_deref() {
            Some(c) if !c.is_empty() => Some((c.to_string(), n.key.clone())),
            _ => None,
        })
        .collect();

    for (key, representative) in mapping {
        let Some(citekey) = original.node(key).and_then(|n| n.citekey.as_deref()) else {
            continue;
        };
        if !augmented.contains(representative) {
            continue;
        }
        let simplified = simplify_citekey(citekey);
        if let Some(previous) = table.get(&simplified) {
            if previous != representative {
                warn!(
                    citekey = %simplified,
                    previous = %previous,
                    current = %representative,
                    "citekey conflict"
                );
                conflicts.push(CitekeyConflict {
                    citekey: simplified.clone(),
                    previous: previous.clone(),
                    current: representative.clone(),
                });
            }
        }
        table.insert(simplified, representative.clone());
    }
    table
}

/// Add co-occurrence edges from `network` to `augmented`.
///
/// Each co-occurring pair gets a forward edge and a `backwards` twin, both
/// weighted `count × weight`.
pub fn add_co_occurrences(
    augmented: &mut DocGraph,
    original: &DocGraph,
    mapping: &NodesMapping,
    network: &DocGraph,
    weight: f64,
    kind: CooccurrenceType,
) -> Result<CooccurrenceReport> {
    let merge_decisions = matches!(kind, CooccurrenceType::Decision);
    let decisions = quotient_decision_graph(network, merge_decisions, false)?;

    let mut report = CooccurrenceReport::default();
    let table = citekey_table(augmented, original, mapping, &mut report.conflicts);

    let mut missing: BTreeMap<String, usize> = BTreeMap::new();
    let mut pairs: BTreeMap<(String, String), usize> = BTreeMap::new();
    for decision in decisions
        .nodes()
        .filter(|n| n.bipartite == Some(Bipartite::Decision))
    {
        let mut targets: BTreeSet<&str> = BTreeSet::new();
        let mut unresolved: BTreeSet<String> = BTreeSet::new();
        for (cited, edge) in decisions.out_edges(&decision.key) {
            if edge.edge_type != EdgeType::Reference {
                continue;
            }
            let simplified = simplify_citekey(cited);
            match table.get(&simplified) {
                Some(node) => {
                    targets.insert(node.as_str());
                }
                None => {
                    unresolved.insert(simplified);
                }
            }
        }
        for key in unresolved {
            *missing.entry(key).or_insert(0) += 1;
        }
        let targets: Vec<&str> = targets.into_iter().collect();
        for (i, a) in targets.iter().enumerate() {
            for b in &targets[i + 1..] {
                *pairs.entry((a.to_string(), b.to_string())).or_insert(0) += 1;
            }
        }
    }

    for ((a, b), count) in &pairs {
        augmented.add_edge(a, b, EdgeData::weighted(EdgeType::Cooccurrence, *count as f64 * weight))?;
    }
    for ((a, b), count) in &pairs {
        augmented.add_edge(
            b,
            a,
            EdgeData::weighted(EdgeType::Cooccurrence, *count as f64 * weight).reversed(),
        )?;
    }

    let mut missing: Vec<(String, usize)> = missing.into_iter().collect();
    missing.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    report.missing = missing;
    report.pairs = pairs.len();
    debug!(
        pairs = report.pairs,
        missing = report.missing.len(),
        conflicts = report.conflicts.len(),
        "added co-occurrence edges"
    );
    Ok(report)
}

fn total_weight(graph: &DocGraph, edge_type: EdgeType) -> f64 {
    graph
        .edges_of_type(edge_type)
        .map(|(_, _, e)| e.weight_or_unit())
        .sum()
}

/// Scale co-occurrence weights so both edge classes carry the same total
/// mass. Returns the factor, or `None` without co-occurrence mass.
pub fn rescale_co_occurrences(graph: &mut DocGraph) -> Option<f64> {
    let co = total_weight(graph, EdgeType::Cooccurrence);
    if co <= 0.0 {
        warn!(graph = graph.name(), "no co-occurrence mass to rescale");
        return None;
    }
    let factor = total_weight(graph, EdgeType::Reference) / co;
    graph.for_each_edge_mut(|e| {
        if e.edge_type == EdgeType::Cooccurrence {
            e.weight = Some(e.weight_or_unit() * factor);
        }
    });
    info!(factor, graph = graph.name(), "rescaled co-occurrence weights");
    Some(factor)
}

/// Remove every reference edge. Returns the number removed.
pub fn strip_reference_edges(graph: &mut DocGraph) -> usize {
    let before = graph.edge_count();
    graph.retain_edges(|_, _, e| e.edge_type != EdgeType::Reference);
    before - graph.edge_count()
}

/// Process-wide cache of decision networks keyed by path.
///
/// Entries are never invalidated.
#[derive(Debug, Default)]
pub struct DecisionNetworkCache {
    entries: RwLock<HashMap<PathBuf, Arc<DocGraph>>>,
}

impl DecisionNetworkCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_load(&self, path: &Path) -> Result<Arc<DocGraph>> {
        if let Ok(entries) = self.entries.read() {
            if let Some(graph) = entries.get(path) {
                return Ok(Arc::clone(graph));
            }
        }
        let graph = Arc::new(storage::read_graph(path)?);
        let mut entries = self
            .entries
            .write()
            .map_err(|_| LexnetError::integrity("decision network cache lock poisoned"))?;
        let entry = entries
            .entry(path.to_path_buf())
            .or_insert_with(|| Arc::clone(&graph));
        Ok(Arc::clone(entry))
    }

    pub fn len(&self) -> usize {
        match self.entries.read() {
            Ok(entries) => entries.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Output of [`preprocess`].
#[derive(Debug, Clone)]
pub struct Preprocessed {
    pub graph: DocGraph,
    pub mapping: NodesMapping,
    /// Present iff the co-occurrence stage ran.
    pub co_occurrence: Option<CooccurrenceReport>,
}

/// Reduce, add sequence edges and optionally co-occurrence edges.
pub fn preprocess(
    graph: &DocGraph,
    config: &RunConfig,
    decision_network: Option<&DocGraph>,
) -> Result<Preprocessed> {
    let rule = ContractionRule::from_merge(config.pp_merge, SizeAttr::CharsN);
    let (reduced, mapping) = quotient_graph_with_merge(graph, rule, false)?;
    let mut augmented = sequence_graph(&reduced, Decay::new(config.pp_decay), config.pp_ratio)?;

    let mut co_occurrence = None;
    if config.uses_co_occurrence() {
        let kind = config
            .pp_co_occurrence_type
            .ok_or_else(|| ConfigError::MissingField("pp_co_occurrence_type".into()))?;
        let network = decision_network.ok_or_else(|| {
            LexnetError::missing("decision network", vec![config.stem()])
        })?;
        let report = add_co_occurrences(
            &mut augmented,
            graph,
            &mapping,
            network,
            config.co_occurrence_weight(),
            kind,
        )?;
        if config.pp_co_occurrence == Some(CO_OCCURRENCE_BALANCED) {
            rescale_co_occurrences(&mut augmented);
        }
        co_occurrence = Some(report);
    }
    if config.pp_co_occurrence == Some(CO_OCCURRENCE_ONLY) {
        let removed = strip_reference_edges(&mut augmented);
        debug!(removed, "stripped reference edges");
    }

    Ok(Preprocessed {
        graph: augmented,
        mapping,
        co_occurrence,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use lexnet_core::types::{NodeData, NodeKind, SizeMetrics, ROOT_LEVEL};

    #[test]
    fn simplify_strips_year_versions() {
        assert_eq!(simplify_citekey("bgb-2019_12"), "bgb_12");
        assert_eq!(simplify_citekey("bgb–2002_3"), "bgb_3");
        assert_eq!(simplify_citekey("bgb_12"), "bgb_12");
        assert_eq!(simplify_citekey("stvo-19_1"), "stvo-19_1");
        assert_eq!(simplify_citekey("nokey"), "nokey");
    }

    /// Statute leaves A_1, A_2, B_1 with citekeys, one decision citing all
    /// three plus an unknown provision, another citing A_1 and B_1.
    fn fixture() -> (DocGraph, DocGraph) {
        let mut g = DocGraph::new("s");
        g.add_node(NodeData::new("root", ROOT_LEVEL, NodeKind::Other));
        for (key, citekey) in [("A", None), ("A_1", Some("a-2020_1")), ("A_2", Some("a_2")), ("B", None), ("B_1", Some("b_1"))] {
            let mut n = NodeData::new(key, 1, NodeKind::Seqitem).with_metrics(SizeMetrics::new(100, 20));
            n.citekey = citekey.map(str::to_string);
            g.add_node(n);
        }
        for (p, c) in [("root", "A"), ("A", "A_1"), ("A", "A_2"), ("root", "B"), ("B", "B_1")] {
            g.add_edge(p, c, EdgeData::containment()).unwrap();
        }
        g.add_edge("A_1", "B_1", EdgeData::reference()).unwrap();

        let mut c = DocGraph::new("dn");
        for d in ["D1", "D2"] {
            c.add_node(NodeData::new(d, 0, NodeKind::Document).with_bipartite(Bipartite::Decision));
        }
        for s in ["a_1", "a_2", "b_1", "x_9"] {
            c.add_node(NodeData::new(s, 0, NodeKind::Seqitem).with_bipartite(Bipartite::Statute));
        }
        for (d, s) in [("D1", "a_1"), ("D1", "a_2"), ("D1", "b_1"), ("D1", "x_9"), ("D2", "a_1"), ("D2", "b_1")] {
            c.add_edge(d, s, EdgeData::weighted(EdgeType::Reference, 1.0)).unwrap();
        }
        (g, c)
    }

    fn config(co: f64) -> RunConfig {
        let mut config = RunConfig::new("2020", 1.0, 1.0, 0);
        config.pp_co_occurrence = Some(co);
        config.pp_co_occurrence_type = Some(CooccurrenceType::Decision);
        config
    }

    #[test]
    fn counts_pairs_per_decision() {
        let (g, c) = fixture();
        let out = preprocess(&g, &config(2.0), Some(&c)).unwrap();
        let co: Vec<(&str, &str, f64, bool)> = out
            .graph
            .edges_of_type(EdgeType::Cooccurrence)
            .map(|(s, t, e)| (s, t, e.weight.unwrap(), e.backwards))
            .collect();
        assert_eq!(co.len(), 6);
        assert!(co.contains(&("A_1", "B_1", 4.0, false)));
        assert!(co.contains(&("B_1", "A_1", 4.0, true)));
        assert!(co.contains(&("A_1", "A_2", 2.0, false)));
        let report = out.co_occurrence.unwrap();
        assert_eq!(report.missing, vec![("x_9".to_string(), 1)]);
        assert_eq!(report.pairs, 3);
    }

    #[test]
    fn co_occurrence_only_drops_references() {
        let (g, c) = fixture();
        let out = preprocess(&g, &config(CO_OCCURRENCE_ONLY), Some(&c)).unwrap();
        assert_eq!(out.graph.edges_of_type(EdgeType::Reference).count(), 0);
        assert!(out.graph.edges_of_type(EdgeType::Cooccurrence).count() > 0);
        assert!(out
            .graph
            .edges_of_type(EdgeType::Cooccurrence)
            .all(|(_, _, e)| e.weight.unwrap() >= 1.0));
    }

    #[test]
    fn balanced_mode_matches_reference_mass() {
        let (g, c) = fixture();
        let out = preprocess(&g, &config(CO_OCCURRENCE_BALANCED), Some(&c)).unwrap();
        let refs = total_weight(&out.graph, EdgeType::Reference);
        let co = total_weight(&out.graph, EdgeType::Cooccurrence);
        assert!((refs - co).abs() < 1e-9);
    }

    #[test]
    fn conflicting_citekeys_are_reported() {
        let (mut g, c) = fixture();
        g.node_mut("A_2").unwrap().citekey = Some("a-1999_1".into());
        let mut augmented = g.clone();
        let mapping: NodesMapping = g.keys().map(|k| (k.to_string(), k.to_string())).collect();
        let report = add_co_occurrences(
            &mut augmented,
            &g,
            &mapping,
            &c,
            1.0,
            CooccurrenceType::Paragraph,
        )
        .unwrap();
        assert_eq!(report.conflicts.len(), 1);
        assert_eq!(report.conflicts[0].citekey, "a_1");
        assert_eq!(report.conflicts[0].current, "A_2");
    }

    #[test]
    fn co_occurrence_needs_a_network() {
        let (g, _) = fixture();
        let err = preprocess(&g, &config(1.0), None).unwrap_err();
        assert!(matches!(err, LexnetError::MissingPrecondition { .. }));
    }

    #[test]
    fn cache_counts_entries_after_a_poisoned_write() {
        let (_, c) = fixture();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dn.json");
        storage::write_graph(&path, &c).unwrap();

        let cache = Arc::new(DecisionNetworkCache::new());
        assert!(cache.is_empty());
        let first = cache.get_or_load(&path).unwrap();
        assert!(Arc::ptr_eq(&first, &cache.get_or_load(&path).unwrap()));

        let writer = Arc::clone(&cache);
        let _ = std::thread::spawn(move || {
            let _guard = writer.entries.write().unwrap();
            panic!("writer died");
        })
        .join();
        assert!(cache.entries.is_poisoned());
        assert_eq!(cache.len(), 1);
        assert!(!cache.is_empty());
    }
}
