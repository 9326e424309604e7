//! Hierarchical cluster trees.
//!
//! A tree has a synthetic `root`, one internal node per cluster path prefix
//! and the clustered graph nodes as leaves. Internal keys spell their path,
//! e.g. `cluster_0_3` is the fourth sub-cluster of the first top cluster.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

use crate::error::{LexnetError, Result};
use crate::types::SizeMetrics;

pub const ROOT_KEY: &str = "root";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeNode {
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<usize>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<usize>,
    #[serde(flatten)]
    pub metrics: SizeMetrics,
    #[serde(default)]
    pub leaf: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "TreeNodes", into = "TreeNodes")]
pub struct ClusterTree {
    nodes: Vec<TreeNode>,
    /// Key to position in `nodes`, first occurrence wins.
    index: HashMap<String, usize>,
}

/// On-disk form; the key index is rebuilt on load.
#[derive(Serialize, Deserialize)]
struct TreeNodes {
    nodes: Vec<TreeNode>,
}

impl From<TreeNodes> for ClusterTree {
    fn from(serialized: TreeNodes) -> Self {
        Self::with_index(serialized.nodes)
    }
}

impl From<ClusterTree> for TreeNodes {
    fn from(tree: ClusterTree) -> Self {
        Self { nodes: tree.nodes }
    }
}

impl ClusterTree {
    /// Build a tree from one cluster path per leaf, coarsest level first.
    ///
    /// Metrics of internal nodes are the sums over their leaves.
    pub fn from_paths(leaves: &[(String, SizeMetrics)], paths: &[Vec<usize>]) -> Result<Self> {
        if leaves.len() != paths.len() {
            return Err(LexnetError::integrity(format!(
                "{} leaves but {} cluster paths",
                leaves.len(),
                paths.len()
            )));
        }

        let mut nodes = vec![TreeNode {
            key: ROOT_KEY.to_string(),
            parent: None,
            children: Vec::new(),
            metrics: SizeMetrics::default(),
            leaf: false,
        }];
        let mut clusters: HashMap<Vec<usize>, usize> = HashMap::new();
        let mut seen: HashSet<&str> = HashSet::new();

        for ((key, metrics), path) in leaves.iter().zip(paths) {
            if !seen.insert(key.as_str()) {
                return Err(LexnetError::integrity(format!(
                    "{key} appears twice in cluster tree"
                )));
            }
            let mut parent = 0;
            for depth in 1..=path.len() {
                let prefix = &path[..depth];
                parent = match clusters.get(prefix) {
                    Some(&idx) => idx,
                    None => {
                        let idx = nodes.len();
                        let label: Vec<String> = prefix.iter().map(|p| p.to_string()).collect();
                        nodes.push(TreeNode {
                            key: format!("cluster_{}", label.join("_")),
                            parent: Some(parent),
                            children: Vec::new(),
                            metrics: SizeMetrics::default(),
                            leaf: false,
                        });
                        nodes[parent].children.push(idx);
                        clusters.insert(prefix.to_vec(), idx);
                        idx
                    }
                };
            }
            let idx = nodes.len();
            nodes.push(TreeNode {
                key: key.clone(),
                parent: Some(parent),
                children: Vec::new(),
                metrics: *metrics,
                leaf: true,
            });
            nodes[parent].children.push(idx);
        }

        // Parents always precede their children
        for idx in (1..nodes.len()).rev() {
            if let Some(p) = nodes[idx].parent {
                let m = nodes[idx].metrics;
                nodes[p].metrics += m;
            }
        }
        Ok(Self::with_index(nodes))
    }

    fn with_index(nodes: Vec<TreeNode>) -> Self {
        let mut index = HashMap::with_capacity(nodes.len());
        for (idx, node) in nodes.iter().enumerate() {
            index.entry(node.key.clone()).or_insert(idx);
        }
        Self { nodes, index }
    }

    pub fn root(&self) -> &TreeNode {
        &self.nodes[0]
    }

    pub fn nodes(&self) -> &[TreeNode] {
        &self.nodes
    }

    pub fn node(&self, key: &str) -> Option<&TreeNode> {
        self.index.get(key).map(|&idx| &self.nodes[idx])
    }

    pub fn leaves(&self) -> impl Iterator<Item = &TreeNode> + '_ {
        self.nodes.iter().filter(|n| n.leaf)
    }

    pub fn depth(&self, mut idx: usize) -> usize {
        let mut depth = 0;
        while let Some(p) = self.nodes[idx].parent {
            depth += 1;
            idx = p;
        }
        depth
    }

    /// Deepest internal level below the root.
    pub fn cluster_levels(&self) -> usize {
        (0..self.nodes.len())
            .filter(|&i| !self.nodes[i].leaf && i != 0)
            .map(|i| self.depth(i))
            .max()
            .unwrap_or(0)
    }

    /// Leaves grouped by their ancestor at `depth` (root is depth 0).
    /// A leaf not deeper than `depth` forms its own group. Groups follow
    /// tree order.
    pub fn partition_at_depth(&self, depth: usize) -> Vec<Vec<String>> {
        // anchor -> (first leaf position, members)
        let mut groups: BTreeMap<usize, (usize, Vec<String>)> = BTreeMap::new();
        for (idx, node) in self.nodes.iter().enumerate() {
            if !node.leaf {
                continue;
            }
            let mut anchor = idx;
            let mut d = self.depth(idx);
            while d > depth {
                if let Some(p) = self.nodes[anchor].parent {
                    anchor = p;
                }
                d -= 1;
            }
            if anchor == 0 {
                anchor = idx;
            }
            groups
                .entry(anchor)
                .or_insert_with(|| (idx, Vec::new()))
                .1
                .push(node.key.clone());
        }
        let mut out: Vec<(usize, Vec<String>)> = groups.into_values().collect();
        out.sort_by_key(|(first, _)| *first);
        out.into_iter().map(|(_, members)| members).collect()
    }
}
