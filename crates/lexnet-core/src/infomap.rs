//! Flow-based community detection with the map equation.
//!
//! A random walker moves along the links of the network. A partition into
//! modules is scored by the average description length of one step of the
//! walk (Rosvall & Bergstrom 2008):
//!
//! ```text
//! L = plogp(Σ enter_i) - Σ plogp(enter_i) - Σ plogp(exit_i)
//!     - Σ_α plogp(p_α) + Σ plogp(exit_i + p_i)
//! ```
//!
//! The optimizer follows the Louvain scheme: seeded random local moving of
//! nodes between modules, then aggregation of modules into super-nodes,
//! repeated until no move shortens the code.
//!
//! Each top-level module is then searched for sub-modules on its own flow
//! network, recursively, as long as splitting shortens the module's code.
//! This yields a hierarchy of module paths per node.
//!
//! Flow models:
//! - undirected: visit rates proportional to node strength
//! - directed: PageRank with teleportation probability 0.15, teleportation
//!   steps unrecorded so only link flow is encoded
//!
//! `markov_time` scales all link flow. Larger values make exits more
//! expensive and yield fewer, larger modules.

use rand::prelude::*;
use rand::rngs::StdRng;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::debug;

/// Teleportation probability of the directed flow model.
pub const TELEPORTATION: f64 = 0.15;

/// Seed used when a run does not request one.
pub const DEFAULT_SEED: u64 = 123;

const MIN_IMPROVEMENT: f64 = 1e-10;
const MAX_SWEEPS: usize = 200;
/// Deepest module level below the root.
const MAX_TREE_DEPTH: usize = 10;

#[derive(Debug, Clone, Copy)]
pub struct InfomapParams {
    pub directed: bool,
    pub markov_time: f64,
    pub seed: u64,
    /// Merge modules until at most this many remain.
    pub preferred_modules: Option<usize>,
    /// Independent optimizer restarts, the shortest code wins.
    pub trials: usize,
}

impl Default for InfomapParams {
    fn default() -> Self {
        Self {
            directed: false,
            markov_time: 1.0,
            seed: DEFAULT_SEED,
            preferred_modules: None,
            trials: 1,
        }
    }
}

#[derive(Debug, Clone)]
pub struct InfomapResult {
    /// Top-level modules over the nodes that carry links, by descending
    /// flow. Members are ascending node indices.
    pub modules: Vec<Vec<usize>>,
    /// Module path per node, coarsest first. `paths[i][0]` indexes
    /// `modules`; deeper entries number the sub-modules found by splitting
    /// each module on its own. Empty for nodes without links.
    pub paths: Vec<Vec<usize>>,
    /// Two-level codelength of `modules` in bits.
    pub codelength: f64,
    /// Codelength with every node in a single module.
    pub one_level_codelength: f64,
    /// Stationary visit rate per node, zero for nodes without links.
    pub node_flow: Vec<f64>,
}

fn plogp(p: f64) -> f64 {
    if p > 0.0 {
        p * p.log2()
    } else {
        0.0
    }
}

/// Network annotated with visit rates and link flows.
#[derive(Debug, Clone)]
struct FlowGraph {
    flow: Vec<f64>,
    /// Outgoing link flow without self-links.
    out_links: Vec<Vec<(usize, f64)>>,
    in_links: Vec<Vec<(usize, f64)>>,
    out_total: Vec<f64>,
    in_total: Vec<f64>,
}

impl FlowGraph {
    fn from_link_flows(flow: Vec<f64>, links: &BTreeMap<(usize, usize), f64>) -> Self {
        let n = flow.len();
        let mut out_links = vec![Vec::new(); n];
        let mut in_links = vec![Vec::new(); n];
        let mut out_total = vec![0.0; n];
        let mut in_total = vec![0.0; n];
        for (&(u, v), &f) in links {
            if u == v || f <= 0.0 {
                continue;
            }
            out_links[u].push((v, f));
            in_links[v].push((u, f));
            out_total[u] += f;
            in_total[v] += f;
        }
        Self {
            flow,
            out_links,
            in_links,
            out_total,
            in_total,
        }
    }

    fn undirected(n: usize, links: &[(usize, usize, f64)], markov_time: f64) -> Self {
        let mut strength = vec![0.0; n];
        let mut total = 0.0;
        for &(u, v, w) in links {
            strength[u] += w;
            strength[v] += w;
            total += 2.0 * w;
        }
        let flow: Vec<f64> = if total > 0.0 {
            strength.iter().map(|s| s / total).collect()
        } else {
            vec![0.0; n]
        };
        let mut link_flow: BTreeMap<(usize, usize), f64> = BTreeMap::new();
        if total > 0.0 {
            for &(u, v, w) in links {
                let f = markov_time * w / total;
                *link_flow.entry((u, v)).or_insert(0.0) += f;
                *link_flow.entry((v, u)).or_insert(0.0) += f;
            }
        }
        Self::from_link_flows(flow, &link_flow)
    }

    fn directed(n: usize, links: &[(usize, usize, f64)], markov_time: f64) -> Self {
        let mut out_weight = vec![0.0; n];
        for &(u, _, w) in links {
            out_weight[u] += w;
        }

        let mut rank = vec![1.0 / n as f64; n];
        for _ in 0..200 {
            let dangling: f64 = (0..n)
                .filter(|&u| out_weight[u] == 0.0)
                .map(|u| rank[u])
                .sum();
            let base = (TELEPORTATION + (1.0 - TELEPORTATION) * dangling) / n as f64;
            let mut next = vec![base; n];
            for &(u, v, w) in links {
                if out_weight[u] > 0.0 {
                    next[v] += (1.0 - TELEPORTATION) * rank[u] * w / out_weight[u];
                }
            }
            let sum: f64 = next.iter().sum();
            next.iter_mut().for_each(|x| *x /= sum);
            let diff: f64 = next.iter().zip(&rank).map(|(a, b)| (a - b).abs()).sum();
            rank = next;
            if diff < 1e-15 {
                break;
            }
        }

        // Unrecorded teleportation: node flow is the link flow entering it.
        let mut link_flow: BTreeMap<(usize, usize), f64> = BTreeMap::new();
        for &(u, v, w) in links {
            if out_weight[u] > 0.0 {
                *link_flow.entry((u, v)).or_insert(0.0) += rank[u] * w / out_weight[u];
            }
        }
        let mut flow = vec![0.0; n];
        for (&(_, v), &f) in &link_flow {
            flow[v] += f;
        }
        let sum: f64 = flow.iter().sum();
        if sum > 0.0 {
            flow.iter_mut().for_each(|x| *x /= sum);
            link_flow
                .values_mut()
                .for_each(|f| *f = markov_time * *f / sum);
        }
        Self::from_link_flows(flow, &link_flow)
    }

    fn len(&self) -> usize {
        self.flow.len()
    }

    /// Collapse nodes into their modules.
    fn aggregate(&self, module_of: &[usize], count: usize) -> Self {
        let mut flow = vec![0.0; count];
        for (node, &m) in module_of.iter().enumerate() {
            flow[m] += self.flow[node];
        }
        let mut links: BTreeMap<(usize, usize), f64> = BTreeMap::new();
        for (u, out) in self.out_links.iter().enumerate() {
            for &(v, f) in out {
                let (mu, mv) = (module_of[u], module_of[v]);
                if mu != mv {
                    *links.entry((mu, mv)).or_insert(0.0) += f;
                }
            }
        }
        Self::from_link_flows(flow, &links)
    }
}

/// Running sums of the module-dependent map equation terms.
#[derive(Debug, Clone, Copy, Default)]
struct CodeTerms {
    sum_enter: f64,
    sum_plogp_enter: f64,
    sum_plogp_exit: f64,
    sum_plogp_exit_flow: f64,
}

impl CodeTerms {
    fn codelength(&self, node_entropy: f64) -> f64 {
        plogp(self.sum_enter) - self.sum_plogp_enter - self.sum_plogp_exit - node_entropy
            + self.sum_plogp_exit_flow
    }

    fn add(&mut self, m: ModuleStats, sign: f64) {
        self.sum_enter += sign * m.enter;
        self.sum_plogp_enter += sign * plogp(m.enter);
        self.sum_plogp_exit += sign * plogp(m.exit);
        self.sum_plogp_exit_flow += sign * plogp(m.exit + m.flow);
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct ModuleStats {
    flow: f64,
    exit: f64,
    enter: f64,
}

/// Module assignment of one aggregation level.
struct Partition<'a> {
    graph: &'a FlowGraph,
    module_of: Vec<usize>,
    stats: Vec<ModuleStats>,
    members: Vec<usize>,
    terms: CodeTerms,
}

impl<'a> Partition<'a> {
    fn singletons(graph: &'a FlowGraph) -> Self {
        let n = graph.len();
        let stats: Vec<ModuleStats> = (0..n)
            .map(|i| ModuleStats {
                flow: graph.flow[i],
                exit: graph.out_total[i],
                enter: graph.in_total[i],
            })
            .collect();
        let mut terms = CodeTerms::default();
        for s in &stats {
            terms.add(*s, 1.0);
        }
        Self {
            graph,
            module_of: (0..n).collect(),
            stats,
            members: vec![1; n],
            terms,
        }
    }

    /// Local moving until no move improves the code. Returns true if any
    /// node changed module.
    fn optimize(&mut self, rng: &mut StdRng) -> bool {
        let n = self.graph.len();
        let mut order: Vec<usize> = (0..n).collect();
        let mut out_to = vec![0.0; n];
        let mut in_from = vec![0.0; n];
        let mut touched: Vec<usize> = Vec::new();
        let mut seen = vec![false; n];
        let mut empty: Vec<usize> = Vec::new();

        let mut moved_any = false;
        for _ in 0..MAX_SWEEPS {
            order.shuffle(rng);
            let mut moved = 0usize;
            for &node in &order {
                let current = self.module_of[node];
                for &(v, f) in &self.graph.out_links[node] {
                    let m = self.module_of[v];
                    if !seen[m] {
                        seen[m] = true;
                        touched.push(m);
                    }
                    out_to[m] += f;
                }
                for &(u, f) in &self.graph.in_links[node] {
                    let m = self.module_of[u];
                    if !seen[m] {
                        seen[m] = true;
                        touched.push(m);
                    }
                    in_from[m] += f;
                }

                let node_stats = ModuleStats {
                    flow: self.graph.flow[node],
                    exit: self.graph.out_total[node],
                    enter: self.graph.in_total[node],
                };
                let old_current = self.stats[current];
                let current_without = ModuleStats {
                    flow: old_current.flow - node_stats.flow,
                    exit: old_current.exit - node_stats.exit + out_to[current] + in_from[current],
                    enter: old_current.enter - node_stats.enter + in_from[current] + out_to[current],
                };

                let mut best: Option<(usize, ModuleStats)> = None;
                let mut best_delta = -MIN_IMPROVEMENT;

                let mut candidates: Vec<usize> =
                    touched.iter().copied().filter(|&m| m != current).collect();
                if self.members[current] > 1 {
                    if let Some(&free) = empty.last() {
                        candidates.push(free);
                    }
                }

                for &target in &candidates {
                    let old_target = self.stats[target];
                    let target_with = ModuleStats {
                        flow: old_target.flow + node_stats.flow,
                        exit: old_target.exit + node_stats.exit - out_to[target] - in_from[target],
                        enter: old_target.enter + node_stats.enter - in_from[target] - out_to[target],
                    };
                    let mut terms = self.terms;
                    terms.add(old_current, -1.0);
                    terms.add(old_target, -1.0);
                    terms.add(current_without, 1.0);
                    terms.add(target_with, 1.0);
                    let delta = terms.codelength(0.0) - self.terms.codelength(0.0);
                    if delta < best_delta {
                        best_delta = delta;
                        best = Some((target, target_with));
                    }
                }

                if let Some((target, target_with)) = best {
                    let old_target = self.stats[target];
                    self.terms.add(old_current, -1.0);
                    self.terms.add(old_target, -1.0);
                    self.terms.add(current_without, 1.0);
                    self.terms.add(target_with, 1.0);
                    self.stats[current] = current_without;
                    self.stats[target] = target_with;
                    self.members[current] -= 1;
                    self.members[target] += 1;
                    self.module_of[node] = target;
                    if self.members[target] == 1 {
                        empty.pop();
                    }
                    if self.members[current] == 0 {
                        self.stats[current] = ModuleStats::default();
                        empty.push(current);
                    }
                    moved += 1;
                }

                for &m in &touched {
                    out_to[m] = 0.0;
                    in_from[m] = 0.0;
                    seen[m] = false;
                }
                touched.clear();
            }
            if moved == 0 {
                break;
            }
            moved_any = true;
        }
        moved_any
    }

    /// Dense module ids in order of first appearance.
    fn dense(&self) -> (Vec<usize>, usize) {
        let mut renumber: BTreeMap<usize, usize> = BTreeMap::new();
        let ids = self
            .module_of
            .iter()
            .map(|&m| {
                let next = renumber.len();
                *renumber.entry(m).or_insert(next)
            })
            .collect();
        (ids, renumber.len())
    }
}

/// Module-level statistics for a complete assignment.
fn module_stats(graph: &FlowGraph, module_of: &[usize], count: usize) -> Vec<ModuleStats> {
    let mut stats = vec![ModuleStats::default(); count];
    for (u, out) in graph.out_links.iter().enumerate() {
        stats[module_of[u]].flow += graph.flow[u];
        for &(v, f) in out {
            if module_of[u] != module_of[v] {
                stats[module_of[u]].exit += f;
                stats[module_of[v]].enter += f;
            }
        }
    }
    stats
}

fn codelength_of(graph: &FlowGraph, module_of: &[usize], count: usize, node_entropy: f64) -> f64 {
    let mut terms = CodeTerms::default();
    for s in module_stats(graph, module_of, count) {
        terms.add(s, 1.0);
    }
    terms.codelength(node_entropy)
}

/// One optimizer trial. Returns module ids per node and their count.
fn run_trial(graph: &FlowGraph, rng: &mut StdRng) -> (Vec<usize>, usize) {
    let mut assignment: Vec<usize> = (0..graph.len()).collect();
    let mut count = graph.len();
    let mut level = graph.clone();
    loop {
        let mut partition = Partition::singletons(&level);
        if !partition.optimize(rng) {
            break;
        }
        let (dense, modules) = partition.dense();
        for a in assignment.iter_mut() {
            *a = dense[*a];
        }
        let done = modules == count || modules == 1;
        count = modules;
        if done {
            break;
        }
        level = level.aggregate(&dense, modules);
    }
    (assignment, count)
}

/// Merge adjacent modules, cheapest first, until `target` remain or no
/// two modules share a link. Module ids in `assignment` are made dense
/// again afterwards.
fn merge_to_preferred(graph: &FlowGraph, assignment: &mut [usize], count: usize, target: usize) -> usize {
    let mut stats = module_stats(graph, assignment, count);
    let mut terms = CodeTerms::default();
    for s in &stats {
        terms.add(*s, 1.0);
    }

    // Flow between two modules in both directions, keyed (low, high)
    let mut between: BTreeMap<(usize, usize), f64> = BTreeMap::new();
    let mut neighbours: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); count];
    for (u, out) in graph.out_links.iter().enumerate() {
        for &(v, f) in out {
            let (a, b) = (assignment[u], assignment[v]);
            if a != b {
                *between.entry((a.min(b), a.max(b))).or_insert(0.0) += f;
                neighbours[a].insert(b);
                neighbours[b].insert(a);
            }
        }
    }

    let mut merged_into: Vec<usize> = (0..count).collect();
    let mut remaining = count;
    while remaining > target.max(1) {
        let base = terms.codelength(0.0);
        let mut best: Option<(f64, usize, usize, ModuleStats)> = None;
        for (&(x, y), &f) in &between {
            let (sx, sy) = (stats[x], stats[y]);
            let merged = ModuleStats {
                flow: sx.flow + sy.flow,
                exit: sx.exit + sy.exit - f,
                enter: sx.enter + sy.enter - f,
            };
            let mut t = terms;
            t.add(sx, -1.0);
            t.add(sy, -1.0);
            t.add(merged, 1.0);
            let delta = t.codelength(0.0) - base;
            // Strict comparison keeps the smallest pair on ties
            if best.map_or(true, |(d, ..)| delta < d) {
                best = Some((delta, x, y, merged));
            }
        }
        let Some((_, x, y, merged)) = best else {
            break;
        };

        terms.add(stats[x], -1.0);
        terms.add(stats[y], -1.0);
        terms.add(merged, 1.0);
        stats[x] = merged;
        stats[y] = ModuleStats::default();
        between.remove(&(x, y));
        neighbours[x].remove(&y);
        for n in std::mem::take(&mut neighbours[y]) {
            if n == x {
                continue;
            }
            if let Some(f) = between.remove(&(n.min(y), n.max(y))) {
                *between.entry((n.min(x), n.max(x))).or_insert(0.0) += f;
            }
            neighbours[n].remove(&y);
            neighbours[n].insert(x);
            neighbours[x].insert(n);
        }
        merged_into[y] = x;
        remaining -= 1;
    }

    let mut renumber: BTreeMap<usize, usize> = BTreeMap::new();
    for m in assignment.iter_mut() {
        let mut root = *m;
        while merged_into[root] != root {
            root = merged_into[root];
        }
        let next = renumber.len();
        *m = *renumber.entry(root).or_insert(next);
    }
    renumber.len()
}

/// Member lists (local indices) of `count` modules by descending flow,
/// ties broken by first member. Empty modules are dropped.
fn ordered_modules(flow: &[f64], assignment: &[usize], count: usize) -> Vec<Vec<usize>> {
    let mut module_flow = vec![0.0; count];
    let mut modules: Vec<Vec<usize>> = vec![Vec::new(); count];
    for (i, &m) in assignment.iter().enumerate() {
        modules[m].push(i);
        module_flow[m] += flow[i];
    }
    let mut order: Vec<usize> = (0..count).filter(|&m| !modules[m].is_empty()).collect();
    order.sort_by(|&a, &b| {
        module_flow[b]
            .total_cmp(&module_flow[a])
            .then(modules[a][0].cmp(&modules[b][0]))
    });
    order
        .into_iter()
        .map(|m| std::mem::take(&mut modules[m]))
        .collect()
}

/// Flow network restricted to `members`, with node and link flow
/// renormalized by the members' total visit rate. Flow leaving the
/// module is dropped.
fn subnetwork(graph: &FlowGraph, members: &[usize]) -> Option<FlowGraph> {
    let total: f64 = members.iter().map(|&g| graph.flow[g]).sum();
    if total <= 0.0 {
        return None;
    }
    let local: HashMap<usize, usize> = members.iter().enumerate().map(|(i, &g)| (g, i)).collect();
    let flow = members.iter().map(|&g| graph.flow[g] / total).collect();
    let mut links: BTreeMap<(usize, usize), f64> = BTreeMap::new();
    for (i, &g) in members.iter().enumerate() {
        for &(v, f) in &graph.out_links[g] {
            if let Some(&j) = local.get(&v) {
                *links.entry((i, j)).or_insert(0.0) += f / total;
            }
        }
    }
    Some(FlowGraph::from_link_flows(flow, &links))
}

/// Sub-modules of one module, or `None` when splitting it does not
/// shorten the module's own code.
fn split_module(graph: &FlowGraph, members: &[usize], rng: &mut StdRng) -> Option<Vec<Vec<usize>>> {
    if members.len() < 3 {
        return None;
    }
    let sub = subnetwork(graph, members)?;
    let node_entropy: f64 = sub.flow.iter().map(|&p| plogp(p)).sum();
    let (assignment, count) = run_trial(&sub, rng);
    if count < 2 || count == members.len() {
        return None;
    }
    let codelength = codelength_of(&sub, &assignment, count, node_entropy);
    if codelength >= -node_entropy - MIN_IMPROVEMENT {
        return None;
    }
    let groups = ordered_modules(&sub.flow, &assignment, count);
    Some(
        groups
            .into_iter()
            .map(|group| group.into_iter().map(|i| members[i]).collect())
            .collect(),
    )
}

/// Assign the path of every node below `prefix`, splitting recursively.
fn assign_paths(
    graph: &FlowGraph,
    members: &[usize],
    prefix: &mut Vec<usize>,
    rng: &mut StdRng,
    paths: &mut [Vec<usize>],
) {
    let split = if prefix.len() < MAX_TREE_DEPTH {
        split_module(graph, members, rng)
    } else {
        None
    };
    match split {
        Some(subs) => {
            for (i, sub) in subs.iter().enumerate() {
                prefix.push(i);
                assign_paths(graph, sub, prefix, rng, paths);
                prefix.pop();
            }
        }
        None => {
            for &m in members {
                paths[m] = prefix.clone();
            }
        }
    }
}

/// Run map equation clustering.
///
/// `links` are `(source, target, weight)` triples over `0..node_count`. In
/// the undirected model each link is traversable both ways. Nodes without
/// links are left out of the returned modules and get an empty path.
pub fn infomap(node_count: usize, links: &[(usize, usize, f64)], params: &InfomapParams) -> InfomapResult {
    let links: Vec<(usize, usize, f64)> = links
        .iter()
        .copied()
        .filter(|(_, _, w)| *w > 0.0)
        .collect();
    let mut has_link = vec![false; node_count];
    for &(u, v, _) in &links {
        has_link[u] = true;
        has_link[v] = true;
    }
    let linked: Vec<usize> = (0..node_count).filter(|&i| has_link[i]).collect();
    if linked.is_empty() {
        return InfomapResult {
            modules: Vec::new(),
            paths: vec![Vec::new(); node_count],
            codelength: 0.0,
            one_level_codelength: 0.0,
            node_flow: vec![0.0; node_count],
        };
    }

    // Compact index space over linked nodes
    let mut compact = vec![usize::MAX; node_count];
    for (i, &node) in linked.iter().enumerate() {
        compact[node] = i;
    }
    let compact_links: Vec<(usize, usize, f64)> = links
        .iter()
        .map(|&(u, v, w)| (compact[u], compact[v], w))
        .collect();
    let n = linked.len();
    let graph = if params.directed {
        FlowGraph::directed(n, &compact_links, params.markov_time)
    } else {
        FlowGraph::undirected(n, &compact_links, params.markov_time)
    };
    let node_entropy: f64 = graph.flow.iter().map(|&p| plogp(p)).sum();
    let one_level = -node_entropy;

    let mut rng = StdRng::seed_from_u64(params.seed);
    let mut best: Option<(Vec<usize>, usize, f64)> = None;
    for trial in 0..params.trials.max(1) {
        let (assignment, count) = run_trial(&graph, &mut rng);
        let codelength = codelength_of(&graph, &assignment, count, node_entropy);
        debug!(trial, modules = count, codelength, "infomap trial");
        if best.as_ref().map_or(true, |(_, _, l)| codelength < *l - MIN_IMPROVEMENT) {
            best = Some((assignment, count, codelength));
        }
    }
    let (mut assignment, mut count, mut codelength) =
        best.unwrap_or_else(|| (vec![0; n], 1, one_level));

    if one_level <= codelength + MIN_IMPROVEMENT {
        assignment = vec![0; n];
        count = 1;
        codelength = one_level;
    }

    if let Some(target) = params.preferred_modules {
        if count > target {
            count = merge_to_preferred(&graph, &mut assignment, count, target);
            codelength = codelength_of(&graph, &assignment, count, node_entropy);
        }
    }

    let top = ordered_modules(&graph.flow, &assignment, count);
    let mut compact_paths = vec![Vec::new(); n];
    for (m, members) in top.iter().enumerate() {
        assign_paths(&graph, members, &mut vec![m], &mut rng, &mut compact_paths);
    }
    let mut paths = vec![Vec::new(); node_count];
    for (i, path) in compact_paths.into_iter().enumerate() {
        paths[linked[i]] = path;
    }
    let modules: Vec<Vec<usize>> = top
        .into_iter()
        .map(|members| members.into_iter().map(|i| linked[i]).collect())
        .collect();

    let mut node_flow = vec![0.0; node_count];
    for (i, &node) in linked.iter().enumerate() {
        node_flow[node] = graph.flow[i];
    }

    InfomapResult {
        modules,
        paths,
        codelength,
        one_level_codelength: one_level,
        node_flow,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clique(nodes: &[usize], w: f64) -> Vec<(usize, usize, f64)> {
        let mut edges = Vec::new();
        for (i, &a) in nodes.iter().enumerate() {
            for &b in &nodes[i + 1..] {
                edges.push((a, b, w));
            }
        }
        edges
    }

    fn two_cliques() -> Vec<(usize, usize, f64)> {
        let mut edges = clique(&[0, 1, 2, 3], 1.0);
        edges.extend(clique(&[4, 5, 6, 7], 1.0));
        edges.push((3, 4, 0.2));
        edges
    }

    #[test]
    fn finds_two_cliques() {
        let result = infomap(8, &two_cliques(), &InfomapParams::default());
        let mut modules = result.modules.clone();
        modules.sort();
        assert_eq!(modules, vec![vec![0, 1, 2, 3], vec![4, 5, 6, 7]]);
        assert!(result.codelength < result.one_level_codelength);
    }

    #[test]
    fn single_clique_is_one_module() {
        let result = infomap(4, &clique(&[0, 1, 2, 3], 1.0), &InfomapParams::default());
        assert_eq!(result.modules, vec![vec![0, 1, 2, 3]]);
        assert!((result.codelength - 2.0).abs() < 1e-9);
    }

    #[test]
    fn nodes_without_links_are_left_out() {
        let mut edges = two_cliques();
        edges.push((8, 9, 0.0));
        let result = infomap(11, &edges, &InfomapParams::default());
        let covered: usize = result.modules.iter().map(Vec::len).sum();
        assert_eq!(covered, 8);
        assert_eq!(result.node_flow[10], 0.0);
    }

    #[test]
    fn preferred_module_count_merges() {
        let params = InfomapParams {
            preferred_modules: Some(1),
            ..InfomapParams::default()
        };
        let result = infomap(8, &two_cliques(), &params);
        assert_eq!(result.modules.len(), 1);
        assert_eq!(result.modules[0].len(), 8);
    }

    #[test]
    fn merged_modules_keep_their_structure_below() {
        let params = InfomapParams {
            preferred_modules: Some(1),
            ..InfomapParams::default()
        };
        let result = infomap(8, &two_cliques(), &params);
        assert_eq!(result.modules.len(), 1);
        assert!(result.paths.iter().all(|p| p.len() == 2 && p[0] == 0));
        assert!((1..4).all(|i| result.paths[i] == result.paths[0]));
        assert!((5..8).all(|i| result.paths[i] == result.paths[4]));
        assert_ne!(result.paths[0], result.paths[4]);
    }

    #[test]
    fn paths_start_at_the_top_module() {
        let mut edges = two_cliques();
        edges.push((8, 9, 0.0));
        let result = infomap(10, &edges, &InfomapParams::default());
        for (m, members) in result.modules.iter().enumerate() {
            for &i in members {
                assert_eq!(result.paths[i], vec![m]);
            }
        }
        assert!(result.paths[8].is_empty());
        assert!(result.paths[9].is_empty());
    }

    #[test]
    fn preferred_count_merges_the_closest_modules() {
        let mut edges = clique(&[0, 1, 2, 3], 1.0);
        edges.extend(clique(&[4, 5, 6, 7], 1.0));
        edges.extend(clique(&[8, 9, 10, 11], 1.0));
        edges.push((3, 4, 0.5));
        edges.push((7, 8, 0.05));
        let params = InfomapParams {
            preferred_modules: Some(2),
            ..InfomapParams::default()
        };
        let result = infomap(12, &edges, &params);
        let mut modules = result.modules.clone();
        modules.sort();
        assert_eq!(modules, vec![(0..8).collect::<Vec<_>>(), (8..12).collect()]);
    }

    #[test]
    fn merging_stops_without_shared_links() {
        let mut edges = clique(&[0, 1, 2], 1.0);
        edges.extend(clique(&[3, 4, 5], 1.0));
        let params = InfomapParams {
            preferred_modules: Some(1),
            ..InfomapParams::default()
        };
        let result = infomap(6, &edges, &params);
        assert_eq!(result.modules.len(), 2);
    }

    #[test]
    fn directed_cycles() {
        let mut edges = vec![
            (0, 1, 1.0),
            (1, 2, 1.0),
            (2, 0, 1.0),
            (3, 4, 1.0),
            (4, 5, 1.0),
            (5, 3, 1.0),
        ];
        edges.push((2, 3, 0.05));
        edges.push((5, 0, 0.05));
        let params = InfomapParams {
            directed: true,
            ..InfomapParams::default()
        };
        let result = infomap(6, &edges, &params);
        let mut modules = result.modules.clone();
        modules.sort();
        assert_eq!(modules, vec![vec![0, 1, 2], vec![3, 4, 5]]);
        let total: f64 = result.node_flow.iter().sum();
        assert!((total - 1.0).abs() < 1e-9);
    }

    #[test]
    fn same_seed_same_modules() {
        let params = InfomapParams {
            seed: 7,
            trials: 3,
            ..InfomapParams::default()
        };
        let a = infomap(8, &two_cliques(), &params);
        let b = infomap(8, &two_cliques(), &params);
        assert_eq!(a.modules, b.modules);
        assert_eq!(a.codelength, b.codelength);
    }

    #[test]
    fn markov_time_scales_link_flow() {
        let g1 = FlowGraph::undirected(2, &[(0, 1, 1.0)], 1.0);
        let g2 = FlowGraph::undirected(2, &[(0, 1, 1.0)], 2.0);
        assert!((g1.out_total[0] - 0.5).abs() < 1e-12);
        assert!((g2.out_total[0] - 1.0).abs() < 1e-12);
        assert_eq!(g1.flow, g2.flow);
    }
}
