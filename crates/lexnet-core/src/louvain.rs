//! Louvain community detection.
//!
//! Greedy modularity optimization in two alternating phases:
//!
//! 1. **Local moving**: visit nodes in a seeded random order and move each
//!    one to the neighbouring community with the largest modularity gain
//! 2. **Aggregation**: collapse every community into a single node and
//!    repeat on the smaller graph
//!
//! Each aggregation pass is one level of the dendrogram. The modularity
//! uses a resolution parameter `γ`:
//! `Q = Σc [ in_c / m - γ (tot_c / 2m)² ]`.
//!
//! Reference: Blondel et al. (2008) "Fast unfolding of communities in large networks"

use rand::prelude::*;
use rand::rngs::StdRng;
use std::collections::BTreeMap;

/// Parameters of a Louvain run.
#[derive(Debug, Clone, Copy)]
pub struct LouvainParams {
    /// Resolution `γ`. Values above 1 favour smaller communities.
    pub resolution: f64,
    pub seed: u64,
    pub max_passes: usize,
}

impl Default for LouvainParams {
    fn default() -> Self {
        Self {
            resolution: 1.0,
            seed: 0,
            max_passes: 100,
        }
    }
}

/// Result of Louvain community detection.
#[derive(Debug, Clone)]
pub struct LouvainResult {
    /// Communities of the top level, as node indices. Communities are
    /// ordered by their smallest member, members ascending.
    pub communities: Vec<Vec<usize>>,
    /// `levels[l][i]` is the community of node `i` after pass `l`,
    /// finest level first.
    pub levels: Vec<Vec<usize>>,
    /// Modularity of the top level at the requested resolution.
    pub modularity: f64,
    /// Number of Louvain passes performed.
    pub passes: usize,
}

/// Graph representation optimized for Louvain.
struct LouvainGraph {
    /// Community assignment per node.
    community: Vec<usize>,
    /// Weighted degree (self-loops count twice).
    degree: Vec<f64>,
    /// Self-loop weight per node.
    self_loop: Vec<f64>,
    /// Adjacency list without self-loops: node -> [(neighbor, weight)].
    adj: Vec<Vec<(usize, f64)>>,
    /// Undirected edges, each stored once.
    edges: Vec<(usize, usize, f64)>,
    /// Total edge weight `m`.
    total_weight: f64,
}

impl LouvainGraph {
    fn from_edges(node_count: usize, edges: &[(usize, usize, f64)]) -> Self {
        let mut degree = vec![0.0; node_count];
        let mut self_loop = vec![0.0; node_count];
        let mut adj: Vec<Vec<(usize, f64)>> = vec![Vec::new(); node_count];
        let mut total_weight = 0.0;

        for &(from, to, weight) in edges {
            if from == to {
                self_loop[from] += weight;
                degree[from] += 2.0 * weight;
            } else {
                adj[from].push((to, weight));
                adj[to].push((from, weight));
                degree[from] += weight;
                degree[to] += weight;
            }
            total_weight += weight;
        }

        Self {
            community: (0..node_count).collect(),
            degree,
            self_loop,
            adj,
            edges: edges.to_vec(),
            total_weight,
        }
    }

    fn len(&self) -> usize {
        self.degree.len()
    }

    fn modularity(&self, resolution: f64) -> f64 {
        if self.total_weight == 0.0 {
            return 0.0;
        }
        let m = self.total_weight;
        let mut internal = vec![0.0; self.len()];
        let mut total = vec![0.0; self.len()];
        for i in 0..self.len() {
            total[self.community[i]] += self.degree[i];
        }
        for &(a, b, w) in &self.edges {
            if self.community[a] == self.community[b] {
                internal[self.community[a]] += w;
            }
        }
        internal
            .iter()
            .zip(&total)
            .map(|(inner, tot)| inner / m - resolution * (tot / (2.0 * m)).powi(2))
            .sum()
    }

    /// Phase 1. Returns true if any node changed community.
    fn local_moving(&mut self, resolution: f64, rng: &mut StdRng) -> bool {
        let n = self.len();
        if self.total_weight == 0.0 {
            return false;
        }
        let m2 = 2.0 * self.total_weight;
        let mut community_total = vec![0.0; n];
        for i in 0..n {
            community_total[self.community[i]] += self.degree[i];
        }

        let mut order: Vec<usize> = (0..n).collect();
        order.shuffle(rng);

        // Scratch buffers indexed by community
        let mut links_to = vec![0.0; n];
        let mut touched: Vec<usize> = Vec::new();

        let mut improved = false;
        let mut changed = true;
        while changed {
            changed = false;
            for &i in &order {
                let current = self.community[i];
                let ki = self.degree[i];

                for &(j, w) in &self.adj[i] {
                    let c = self.community[j];
                    if links_to[c] == 0.0 {
                        touched.push(c);
                    }
                    links_to[c] += w;
                }

                community_total[current] -= ki;
                let gain = |c: usize, k_in: f64| k_in - resolution * community_total[c] * ki / m2;

                let mut best = current;
                let mut best_gain = gain(current, links_to[current]);
                for &c in &touched {
                    let g = gain(c, links_to[c]);
                    if g > best_gain + 1e-12 {
                        best_gain = g;
                        best = c;
                    }
                }
                community_total[best] += ki;

                for &c in &touched {
                    links_to[c] = 0.0;
                }
                touched.clear();

                if best != current {
                    self.community[i] = best;
                    changed = true;
                    improved = true;
                }
            }
        }
        improved
    }

    /// Renumber communities by first appearance. Returns the mapping
    /// node -> dense community id and the community count.
    fn dense_communities(&self) -> (Vec<usize>, usize) {
        let mut renumber: BTreeMap<usize, usize> = BTreeMap::new();
        let mut dense = Vec::with_capacity(self.len());
        for &c in &self.community {
            let next = renumber.len();
            dense.push(*renumber.entry(c).or_insert(next));
        }
        (dense, renumber.len())
    }

    /// Phase 2. Collapse communities into super-nodes.
    fn aggregate(&self, dense: &[usize], count: usize) -> Self {
        let mut merged: BTreeMap<(usize, usize), f64> = BTreeMap::new();
        for &(a, b, w) in &self.edges {
            let (ca, cb) = (dense[a], dense[b]);
            let key = if ca <= cb { (ca, cb) } else { (cb, ca) };
            *merged.entry(key).or_insert(0.0) += w;
        }
        let edges: Vec<(usize, usize, f64)> =
            merged.into_iter().map(|((a, b), w)| (a, b, w)).collect();
        LouvainGraph::from_edges(count, &edges)
    }
}

/// Run Louvain community detection.
///
/// `edges` are undirected `(a, b, weight)` triples over node indices
/// `0..node_count`. Parallel edges are allowed and add up.
pub fn louvain_communities(
    node_count: usize,
    edges: &[(usize, usize, f64)],
    params: &LouvainParams,
) -> LouvainResult {
    if node_count == 0 {
        return LouvainResult {
            communities: Vec::new(),
            levels: Vec::new(),
            modularity: 0.0,
            passes: 0,
        };
    }

    let mut rng = StdRng::seed_from_u64(params.seed);
    let mut graph = LouvainGraph::from_edges(node_count, edges);
    let mut membership: Vec<usize> = (0..node_count).collect();
    let mut levels: Vec<Vec<usize>> = Vec::new();
    let mut passes = 0;

    while passes < params.max_passes {
        passes += 1;
        if !graph.local_moving(params.resolution, &mut rng) {
            break;
        }
        let (dense, count) = graph.dense_communities();
        for m in membership.iter_mut() {
            *m = dense[*m];
        }
        levels.push(membership.clone());
        if count == 1 {
            break;
        }
        graph = graph.aggregate(&dense, count);
    }

    let communities = group_by_label(&membership);
    let modularity = compute_modularity(node_count, edges, &membership, params.resolution);

    LouvainResult {
        communities,
        levels,
        modularity,
        passes,
    }
}

/// Group node indices by label, ordered by smallest member.
pub fn group_by_label(labels: &[usize]) -> Vec<Vec<usize>> {
    let mut groups: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (node, &label) in labels.iter().enumerate() {
        groups.entry(label).or_default().push(node);
    }
    let mut out: Vec<Vec<usize>> = groups.into_values().collect();
    out.sort_by_key(|g| g[0]);
    out
}

/// Modularity of a given partition at the given resolution.
///
/// `partition[i]` is the community label of node `i`. Labels need not be
/// dense.
pub fn compute_modularity(
    node_count: usize,
    edges: &[(usize, usize, f64)],
    partition: &[usize],
    resolution: f64,
) -> f64 {
    if node_count == 0 || edges.is_empty() {
        return 0.0;
    }
    let mut renumber: BTreeMap<usize, usize> = BTreeMap::new();
    let dense: Vec<usize> = partition
        .iter()
        .map(|&c| {
            let next = renumber.len();
            *renumber.entry(c).or_insert(next)
        })
        .collect();
    let mut graph = LouvainGraph::from_edges(node_count, edges);
    for (i, &c) in dense.iter().enumerate().take(node_count) {
        graph.community[i] = c;
    }
    graph.modularity(resolution)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(n: usize, edges: &[(usize, usize, f64)]) -> LouvainResult {
        louvain_communities(n, edges, &LouvainParams::default())
    }

    fn two_cliques() -> Vec<(usize, usize, f64)> {
        vec![
            (0, 1, 1.0),
            (0, 2, 1.0),
            (0, 3, 1.0),
            (1, 2, 1.0),
            (1, 3, 1.0),
            (2, 3, 1.0),
            (4, 5, 1.0),
            (4, 6, 1.0),
            (4, 7, 1.0),
            (5, 6, 1.0),
            (5, 7, 1.0),
            (6, 7, 1.0),
            (3, 4, 0.2),
        ]
    }

    #[test]
    fn empty_graph() {
        let result = run(0, &[]);
        assert!(result.communities.is_empty());
        assert_eq!(result.modularity, 0.0);
    }

    #[test]
    fn isolated_nodes_stay_singletons() {
        let result = run(2, &[]);
        assert_eq!(result.communities, vec![vec![0], vec![1]]);
        assert!(result.levels.is_empty());
    }

    #[test]
    fn two_connected_nodes_merge() {
        let result = run(2, &[(0, 1, 1.0)]);
        assert_eq!(result.communities, vec![vec![0, 1]]);
    }

    #[test]
    fn two_triangles_weakly_connected() {
        let edges = vec![
            (0, 1, 1.0),
            (1, 2, 1.0),
            (0, 2, 1.0),
            (3, 4, 1.0),
            (4, 5, 1.0),
            (3, 5, 1.0),
            (2, 3, 0.1),
        ];
        let result = run(6, &edges);
        assert_eq!(result.communities, vec![vec![0, 1, 2], vec![3, 4, 5]]);
        assert!(result.modularity > 0.0, "modularity = {}", result.modularity);
    }

    #[test]
    fn karate_club_style() {
        let result = run(8, &two_cliques());
        assert_eq!(result.communities.len(), 2, "found {:?}", result.communities);
        assert!(result.modularity > 0.3, "modularity {}", result.modularity);
        let top = result.levels.last().unwrap();
        assert_eq!(top.len(), 8);
    }

    #[test]
    fn same_seed_same_partition() {
        let params = LouvainParams {
            seed: 42,
            ..LouvainParams::default()
        };
        let a = louvain_communities(8, &two_cliques(), &params);
        let b = louvain_communities(8, &two_cliques(), &params);
        assert_eq!(a.communities, b.communities);
        assert_eq!(a.levels, b.levels);
    }

    #[test]
    fn high_resolution_splits_more() {
        let coarse = louvain_communities(8, &two_cliques(), &LouvainParams::default());
        let fine = louvain_communities(
            8,
            &two_cliques(),
            &LouvainParams {
                resolution: 5.0,
                ..LouvainParams::default()
            },
        );
        assert!(fine.communities.len() > coarse.communities.len());
    }

    #[test]
    fn modularity_calculation() {
        let edges = vec![(0, 1, 1.0), (2, 3, 1.0)];
        let q = compute_modularity(4, &edges, &[0, 0, 1, 1], 1.0);
        assert!((q - 0.5).abs() < 1e-9, "modularity = {q}, expected 0.5");
    }

    #[test]
    fn modularity_all_one_community() {
        let edges = vec![(0, 1, 1.0), (1, 2, 1.0), (0, 2, 1.0)];
        let q = compute_modularity(3, &edges, &[7, 7, 7], 1.0);
        assert!(q.abs() < 1e-9, "modularity = {q}, expected 0");
    }

    #[test]
    fn weighted_edges() {
        let edges = vec![(0, 1, 5.0), (2, 3, 5.0), (1, 2, 0.1)];
        let result = run(4, &edges);
        assert_eq!(result.communities, vec![vec![0, 1], vec![2, 3]]);
    }
}
