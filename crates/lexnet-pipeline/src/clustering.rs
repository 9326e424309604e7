//! Clustering engine.
//!
//! A preprocessed graph is compiled into a [`WeightedNetwork`] for the
//! chosen method, clustered, and the resulting partition is completed so
//! that every graph node sits in exactly one community.

use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::debug;

use lexnet_core::config::{Method, RunConfig};
use lexnet_core::error::{ConfigError, LexnetError, Result};
use lexnet_core::graph::DocGraph;
use lexnet_core::infomap::{infomap, InfomapParams, DEFAULT_SEED};
use lexnet_core::louvain::{louvain_communities, LouvainParams};
use lexnet_core::tree::ClusterTree;
use lexnet_core::types::SizeMetrics;

/// Index-labelled form of a preprocessed graph.
#[derive(Debug, Clone)]
pub struct WeightedNetwork {
    /// Node keys in graph order.
    pub keys: Vec<String>,
    pub metrics: Vec<SizeMetrics>,
    pub links: Vec<(usize, usize, f64)>,
    pub directed: bool,
}

impl WeightedNetwork {
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn index(&self) -> HashMap<&str, usize> {
        self.keys
            .iter()
            .enumerate()
            .map(|(i, k)| (k.as_str(), i))
            .collect()
    }
}

/// Prepare `graph` for `method`.
///
/// Flow methods see every edge as a link. Louvain sees a simple undirected
/// graph with parallel weights summed per unordered pair.
pub fn compile_source_graph(graph: &DocGraph, method: Method) -> WeightedNetwork {
    let keys: Vec<String> = graph.keys().map(str::to_string).collect();
    let metrics: Vec<SizeMetrics> = graph.nodes().map(|n| n.metrics).collect();
    let position: HashMap<&str, usize> = graph.keys().enumerate().map(|(i, k)| (k, i)).collect();

    let edges = graph
        .edges()
        .map(|(s, t, e)| (position[s], position[t], e.weight_or_unit()));
    let links: Vec<(usize, usize, f64)> = match method {
        Method::Louvain => {
            let mut summed: BTreeMap<(usize, usize), f64> = BTreeMap::new();
            for (u, v, w) in edges {
                *summed.entry((u.min(v), u.max(v))).or_insert(0.0) += w;
            }
            summed.into_iter().map(|((u, v), w)| (u, v, w)).collect()
        }
        Method::Infomap | Method::InfomapDirected => edges.collect(),
    };

    WeightedNetwork {
        keys,
        metrics,
        links,
        directed: method == Method::InfomapDirected,
    }
}

/// Clustering-stage parameters of one run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClusterParams {
    pub method: Method,
    pub seed: Option<u64>,
    pub markov_time: Option<f64>,
    pub number_of_modules: Option<u32>,
}

impl ClusterParams {
    pub fn new(method: Method) -> Self {
        Self {
            method,
            seed: None,
            markov_time: None,
            number_of_modules: None,
        }
    }

    pub fn from_config(config: &RunConfig) -> Result<Self> {
        let method = config
            .method
            .ok_or_else(|| ConfigError::MissingField("method".into()))?;
        Ok(Self {
            method,
            seed: config.seed,
            markov_time: config.markov_time,
            number_of_modules: config.number_of_modules,
        })
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    fn to_json(self) -> serde_json::Value {
        match self.method {
            Method::Louvain => json!({
                "resolution": self.markov_time.unwrap_or(1.0),
                "seed": self.seed,
            }),
            Method::Infomap | Method::InfomapDirected => json!({
                "directed": self.method == Method::InfomapDirected,
                "markov_time": self.markov_time.unwrap_or(1.0),
                "seed": self.seed.unwrap_or(DEFAULT_SEED),
                "preferred_number_of_modules": self.number_of_modules,
            }),
        }
    }
}

/// A completed community partition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Clustering {
    pub communities: Vec<Vec<String>>,
    pub algorithm: String,
    #[serde(default)]
    pub params: serde_json::Value,
    #[serde(default)]
    pub overlap: bool,
    /// Share of graph nodes the algorithm itself assigned.
    #[serde(default)]
    pub coverage: f64,
    #[serde(skip)]
    pub tree: Option<ClusterTree>,
}

impl Clustering {
    pub fn len(&self) -> usize {
        self.communities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.communities.is_empty()
    }

    /// Node key -> community index.
    pub fn community_of(&self) -> HashMap<&str, usize> {
        self.communities
            .iter()
            .enumerate()
            .flat_map(|(i, c)| c.iter().map(move |k| (k.as_str(), i)))
            .collect()
    }
}

/// Append every node of `keys` missing from `communities` as a singleton,
/// in `keys` order.
///
/// Returns the share of nodes that were already covered.
pub fn complete_partition(communities: &mut Vec<Vec<String>>, keys: &[String]) -> Result<f64> {
    let known: HashSet<&str> = keys.iter().map(String::as_str).collect();
    let mut covered: HashSet<String> = HashSet::new();
    for member in communities.iter().flatten() {
        if !known.contains(member.as_str()) {
            return Err(LexnetError::integrity(format!(
                "community member {member} is not a graph node"
            )));
        }
        if !covered.insert(member.clone()) {
            return Err(LexnetError::integrity(format!(
                "{member} is assigned to more than one community"
            )));
        }
    }
    let coverage = if keys.is_empty() {
        1.0
    } else {
        covered.len() as f64 / keys.len() as f64
    };
    for key in keys {
        if !covered.contains(key) {
            communities.push(vec![key.clone()]);
        }
    }
    Ok(coverage)
}

fn keyed(network: &WeightedNetwork, groups: &[Vec<usize>]) -> Vec<Vec<String>> {
    groups
        .iter()
        .map(|g| g.iter().map(|&i| network.keys[i].clone()).collect())
        .collect()
}

/// Cluster `network` and complete the partition.
///
/// With `want_tree` the hierarchical cluster tree of the raw result is
/// attached.
pub fn cluster(network: &WeightedNetwork, params: &ClusterParams, want_tree: bool) -> Result<Clustering> {
    let (groups, paths): (Vec<Vec<usize>>, Vec<(usize, Vec<usize>)>) = match params.method {
        Method::Infomap | Method::InfomapDirected => {
            let result = infomap(
                network.len(),
                &network.links,
                &InfomapParams {
                    directed: network.directed,
                    markov_time: params.markov_time.unwrap_or(1.0),
                    seed: params.seed.unwrap_or(DEFAULT_SEED),
                    preferred_modules: params
                        .number_of_modules
                        .filter(|n| *n > 0)
                        .map(|n| n as usize),
                    ..InfomapParams::default()
                },
            );
            debug!(
                modules = result.modules.len(),
                codelength = result.codelength,
                "infomap finished"
            );
            let paths = result
                .modules
                .iter()
                .flatten()
                .map(|&i| (i, result.paths[i].clone()))
                .collect();
            (result.modules, paths)
        }
        Method::Louvain => {
            let result = louvain_communities(
                network.len(),
                &network.links,
                &LouvainParams {
                    resolution: params.markov_time.unwrap_or(1.0),
                    seed: params.seed.unwrap_or(0),
                    ..LouvainParams::default()
                },
            );
            debug!(
                communities = result.communities.len(),
                modularity = result.modularity,
                passes = result.passes,
                "louvain finished"
            );
            let mut top = vec![0; network.len()];
            for (c, members) in result.communities.iter().enumerate() {
                for &i in members {
                    top[i] = c;
                }
            }
            let finer = result.levels.len().saturating_sub(1);
            let paths = (0..network.len())
                .map(|i| {
                    let mut path = vec![top[i]];
                    path.extend(result.levels[..finer].iter().rev().map(|level| level[i]));
                    (i, path)
                })
                .collect();
            (result.communities, paths)
        }
    };

    let tree = if want_tree {
        let (leaves, paths): (Vec<(String, SizeMetrics)>, Vec<Vec<usize>>) = paths
            .into_iter()
            .map(|(i, path)| ((network.keys[i].clone(), network.metrics[i]), path))
            .unzip();
        Some(ClusterTree::from_paths(&leaves, &paths)?)
    } else {
        None
    };

    let mut communities = keyed(network, &groups);
    let coverage = complete_partition(&mut communities, &network.keys)?;
    Ok(Clustering {
        communities,
        algorithm: params.method.as_str().to_string(),
        params: params.to_json(),
        overlap: false,
        coverage,
        tree,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use lexnet_core::types::{EdgeData, EdgeType, NodeData, NodeKind};

    /// Two triangles joined by one weak edge, plus an isolated node.
    fn graph() -> DocGraph {
        let mut g = DocGraph::new("g");
        for k in ["a", "b", "c", "x", "y", "z", "lonely"] {
            g.add_node(NodeData::new(k, 1, NodeKind::Seqitem).with_metrics(SizeMetrics::new(10, 2)));
        }
        for (s, t) in [("a", "b"), ("b", "c"), ("c", "a"), ("x", "y"), ("y", "z"), ("z", "x")] {
            g.add_edge(s, t, EdgeData::weighted(EdgeType::Reference, 5.0)).unwrap();
            g.add_edge(t, s, EdgeData::weighted(EdgeType::Reference, 5.0).reversed()).unwrap();
        }
        g.add_edge("c", "x", EdgeData::weighted(EdgeType::Reference, 0.1)).unwrap();
        g
    }

    fn assert_total_coverage(clustering: &Clustering, g: &DocGraph) {
        let mut all: Vec<&str> = clustering.communities.iter().flatten().map(String::as_str).collect();
        all.sort_unstable();
        let mut keys: Vec<&str> = g.keys().collect();
        keys.sort_unstable();
        assert_eq!(all, keys);
    }

    #[test]
    fn louvain_sums_parallel_edges() {
        let net = compile_source_graph(&graph(), Method::Louvain);
        assert_eq!(net.links.len(), 7);
        assert!(net.links.iter().any(|&(_, _, w)| w == 10.0));
        assert!(!net.directed);
    }

    #[test]
    fn flow_keeps_multigraph() {
        let net = compile_source_graph(&graph(), Method::InfomapDirected);
        assert_eq!(net.links.len(), 13);
        assert!(net.directed);
    }

    #[test]
    fn every_method_covers_every_node() {
        let g = graph();
        for method in [Method::Infomap, Method::InfomapDirected, Method::Louvain] {
            let net = compile_source_graph(&g, method);
            let clustering = cluster(&net, &ClusterParams::new(method).with_seed(1), true).unwrap();
            assert_total_coverage(&clustering, &g);
            assert_eq!(clustering.communities.last().unwrap(), &vec!["lonely".to_string()]);
            assert!(clustering.tree.is_some());
            assert_eq!(clustering.algorithm, method.as_str());
        }
    }

    #[test]
    fn infomap_separates_triangles() {
        let g = graph();
        let net = compile_source_graph(&g, Method::Infomap);
        let clustering = cluster(&net, &ClusterParams::new(Method::Infomap), false).unwrap();
        let of = clustering.community_of();
        assert_eq!(of["a"], of["b"]);
        assert_eq!(of["x"], of["z"]);
        assert_ne!(of["a"], of["x"]);
        assert!(clustering.coverage < 1.0);
    }

    #[test]
    fn tree_sums_metrics_to_root() {
        let g = graph();
        let net = compile_source_graph(&g, Method::Infomap);
        let clustering = cluster(&net, &ClusterParams::new(Method::Infomap), true).unwrap();
        let tree = clustering.tree.unwrap();
        // lonely has no links and is not in the tree
        assert_eq!(tree.root().metrics.chars_n, 60);
        assert_eq!(tree.cluster_levels(), 1);
    }

    #[test]
    fn requested_module_count_keeps_finer_levels() {
        let g = graph();
        let net = compile_source_graph(&g, Method::Infomap);
        let params = ClusterParams {
            number_of_modules: Some(1),
            ..ClusterParams::new(Method::Infomap)
        };
        let clustering = cluster(&net, &params, true).unwrap();
        assert_eq!(clustering.len(), 2); // the linked six plus lonely
        let tree = clustering.tree.unwrap();
        assert_eq!(tree.cluster_levels(), 2);
        let mut triangles = tree.partition_at_depth(2);
        triangles.iter_mut().for_each(|t| t.sort());
        triangles.sort();
        assert_eq!(triangles, vec![vec!["a", "b", "c"], vec!["x", "y", "z"]]);

        let zero = ClusterParams {
            number_of_modules: Some(0),
            ..ClusterParams::new(Method::Infomap)
        };
        assert_eq!(cluster(&net, &zero, false).unwrap().len(), 3);
    }

    #[test]
    fn completion_rejects_duplicates_and_strangers() {
        let keys: Vec<String> = ["a", "b"].iter().map(|s| s.to_string()).collect();
        let mut dup = vec![vec!["a".to_string()], vec!["a".to_string()]];
        assert!(complete_partition(&mut dup, &keys).is_err());
        let mut stranger = vec![vec!["q".to_string()]];
        assert!(complete_partition(&mut stranger, &keys).is_err());
        let mut partial = vec![vec!["b".to_string()]];
        let coverage = complete_partition(&mut partial, &keys).unwrap();
        assert_eq!(coverage, 0.5);
        assert_eq!(partial, vec![vec!["b".to_string()], vec!["a".to_string()]]);
    }

    #[test]
    fn params_need_a_method() {
        let config = RunConfig::new("2020", 1.0, 1.0, 0);
        assert!(ClusterParams::from_config(&config).is_err());
    }

    #[test]
    fn clustering_json_shape() {
        let g = graph();
        let net = compile_source_graph(&g, Method::Louvain);
        let clustering = cluster(&net, &ClusterParams::new(Method::Louvain), false).unwrap();
        let value = serde_json::to_value(&clustering).unwrap();
        for field in ["communities", "algorithm", "params", "overlap", "coverage"] {
            assert!(value.get(field).is_some(), "{field}");
        }
        assert!(value.get("tree").is_none());
    }
}
