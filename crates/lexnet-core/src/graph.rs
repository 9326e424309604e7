//! Hierarchical document graph backed by petgraph.
//!
//! `DocGraph` is a directed multigraph: two provisions may be linked by a
//! reference edge and a sequence edge at the same time. Nodes are addressed
//! by their string key through a `HashMap` index, edges keep insertion order.
//!
//! The containment edges alone form a tree. [`Hierarchy`] materializes that
//! tree as parent/children tables indexed by `NodeIndex::index()`, so
//! ancestor walks are plain loops instead of graph traversals.

use petgraph::graph::{DiGraph, EdgeIndex, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::error::{GraphError, LexnetError, Result};
use crate::types::{EdgeData, EdgeType, NodeData};

/// Directed multigraph of document units.
#[derive(Debug, Clone, Default)]
pub struct DocGraph {
    name: String,
    graph: DiGraph<NodeData, EdgeData>,
    index: HashMap<String, NodeIndex>,
}

impl DocGraph {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            graph: DiGraph::new(),
            index: HashMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Insert a node. A node with the same key has its data replaced.
    pub fn add_node(&mut self, data: NodeData) -> NodeIndex {
        if let Some(&idx) = self.index.get(&data.key) {
            self.graph[idx] = data;
            return idx;
        }
        let key = data.key.clone();
        let idx = self.graph.add_node(data);
        self.index.insert(key, idx);
        idx
    }

    /// Add a parallel edge between two existing nodes.
    pub fn add_edge(&mut self, source: &str, target: &str, data: EdgeData) -> Result<EdgeIndex> {
        let from = self.require(source)?;
        let to = self.require(target)?;
        Ok(self.graph.add_edge(from, to, data))
    }

    fn require(&self, key: &str) -> Result<NodeIndex> {
        self.index
            .get(key)
            .copied()
            .ok_or_else(|| LexnetError::node_not_found(key))
    }

    pub fn index_of(&self, key: &str) -> Option<NodeIndex> {
        self.index.get(key).copied()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    pub fn node(&self, key: &str) -> Option<&NodeData> {
        self.index.get(key).map(|idx| &self.graph[*idx])
    }

    pub fn node_mut(&mut self, key: &str) -> Option<&mut NodeData> {
        self.index
            .get(key)
            .copied()
            .map(|idx| &mut self.graph[idx])
    }

    pub fn node_at(&self, idx: NodeIndex) -> &NodeData {
        &self.graph[idx]
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Nodes in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = &NodeData> + '_ {
        self.graph.node_indices().map(move |idx| &self.graph[idx])
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> + '_ {
        self.nodes().map(|n| n.key.as_str())
    }

    /// All edges as `(source key, target key, data)` in insertion order.
    pub fn edges(&self) -> impl Iterator<Item = (&str, &str, &EdgeData)> + '_ {
        self.graph.edge_references().map(move |e| {
            (
                self.graph[e.source()].key.as_str(),
                self.graph[e.target()].key.as_str(),
                e.weight(),
            )
        })
    }

    pub fn edges_of_type(
        &self,
        edge_type: EdgeType,
    ) -> impl Iterator<Item = (&str, &str, &EdgeData)> + '_ {
        self.edges().filter(move |(_, _, e)| e.edge_type == edge_type)
    }

    /// Outgoing edges of a node.
    pub fn out_edges(&self, key: &str) -> Vec<(&str, &EdgeData)> {
        let Some(&idx) = self.index.get(key) else {
            return Vec::new();
        };
        let mut edges: Vec<(&str, &EdgeData)> = self
            .graph
            .edges_directed(idx, Direction::Outgoing)
            .map(|e| (self.graph[e.target()].key.as_str(), e.weight()))
            .collect();
        // petgraph yields adjacency in reverse insertion order
        edges.reverse();
        edges
    }

    /// Mutable access to every edge payload.
    pub fn for_each_edge_mut(&mut self, mut f: impl FnMut(&mut EdgeData)) {
        for idx in self.graph.edge_indices() {
            f(&mut self.graph[idx]);
        }
    }

    /// Drop every edge for which the predicate returns false.
    pub fn retain_edges(&mut self, mut keep: impl FnMut(&str, &str, &EdgeData) -> bool) {
        self.graph.retain_edges(|g, e| match g.edge_endpoints(e) {
            Some((a, b)) => keep(&g[a].key, &g[b].key, &g[e]),
            None => false,
        });
    }

    /// Subgraph induced by `keys`, keeping this graph's node order.
    pub fn induced_subgraph(&self, keys: &HashSet<&str>) -> DocGraph {
        let mut sub = DocGraph::new(self.name.clone());
        for node in self.nodes().filter(|n| keys.contains(n.key.as_str())) {
            sub.add_node(node.clone());
        }
        for e in self.graph.edge_references() {
            let (s, t) = (&self.graph[e.source()].key, &self.graph[e.target()].key);
            if keys.contains(s.as_str()) && keys.contains(t.as_str()) {
                let (a, b) = (sub.index[s], sub.index[t]);
                sub.graph.add_edge(a, b, e.weight().clone());
            }
        }
        sub
    }

    /// Containment tree view of this graph.
    pub fn hierarchy(&self) -> Result<Hierarchy> {
        Hierarchy::build(self)
    }

    pub fn to_serialized(&self) -> SerializedGraph {
        SerializedGraph {
            name: self.name.clone(),
            nodes: self.nodes().cloned().collect(),
            edges: self
                .edges()
                .map(|(s, t, data)| SerializedEdge {
                    source: s.to_string(),
                    target: t.to_string(),
                    data: data.clone(),
                })
                .collect(),
        }
    }

    pub fn from_serialized(state: SerializedGraph) -> Result<Self> {
        let mut graph = DocGraph::new(state.name);
        for node in state.nodes {
            graph.add_node(node);
        }
        for edge in state.edges {
            graph.add_edge(&edge.source, &edge.target, edge.data)?;
        }
        Ok(graph)
    }
}

/// JSON node-link form of a [`DocGraph`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerializedGraph {
    #[serde(default)]
    pub name: String,
    pub nodes: Vec<NodeData>,
    #[serde(default)]
    pub edges: Vec<SerializedEdge>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerializedEdge {
    pub source: String,
    pub target: String,
    #[serde(flatten)]
    pub data: EdgeData,
}

/// Parent/children arena over the containment edges of a [`DocGraph`].
///
/// Positions are `NodeIndex::index()` of the source graph, so the arena is
/// only valid for the graph it was built from.
#[derive(Debug, Clone)]
pub struct Hierarchy {
    keys: Vec<String>,
    lookup: HashMap<String, usize>,
    parent: Vec<Option<usize>>,
    children: Vec<Vec<usize>>,
    depth: Vec<usize>,
}

impl Hierarchy {
    fn build(g: &DocGraph) -> Result<Self> {
        let n = g.node_count();
        let keys: Vec<String> = g.keys().map(str::to_string).collect();
        let lookup = keys
            .iter()
            .enumerate()
            .map(|(i, k)| (k.clone(), i))
            .collect();
        let mut parent: Vec<Option<usize>> = vec![None; n];
        let mut children: Vec<Vec<usize>> = vec![Vec::new(); n];

        for e in g.graph.edge_references() {
            if e.weight().edge_type != EdgeType::Containment {
                continue;
            }
            let (p, c) = (e.source().index(), e.target().index());
            match parent[c] {
                Some(existing) if existing != p => {
                    return Err(GraphError::MultipleParents {
                        node: keys[c].clone(),
                        first: keys[existing].clone(),
                        second: keys[p].clone(),
                    }
                    .into());
                }
                Some(_) => {}
                None => {
                    parent[c] = Some(p);
                    children[p].push(c);
                }
            }
        }

        let mut depth = vec![0usize; n];
        for start in 0..n {
            let mut steps = 0usize;
            let mut cur = start;
            while let Some(p) = parent[cur] {
                steps += 1;
                if steps > n {
                    return Err(GraphError::CyclicHierarchy(keys[start].clone()).into());
                }
                cur = p;
            }
            depth[start] = steps;
        }

        Ok(Self {
            keys,
            lookup,
            parent,
            children,
            depth,
        })
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn position(&self, key: &str) -> Option<usize> {
        self.lookup.get(key).copied()
    }

    pub fn key(&self, pos: usize) -> &str {
        &self.keys[pos]
    }

    pub fn parent_of(&self, pos: usize) -> Option<usize> {
        self.parent[pos]
    }

    pub fn parent(&self, key: &str) -> Option<&str> {
        let pos = self.position(key)?;
        self.parent[pos].map(|p| self.keys[p].as_str())
    }

    pub fn children_of(&self, pos: usize) -> &[usize] {
        &self.children[pos]
    }

    pub fn depth_of(&self, pos: usize) -> usize {
        self.depth[pos]
    }

    /// Nodes without a containment parent.
    pub fn roots(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.len()).filter(move |&i| self.parent[i].is_none())
    }

    pub fn is_root(&self, pos: usize) -> bool {
        self.parent[pos].is_none()
    }

    pub fn is_leaf(&self, pos: usize) -> bool {
        self.children[pos].is_empty()
    }

    /// Keys of the nodes without containment children, in graph order.
    pub fn leaves(&self) -> Vec<&str> {
        (0..self.len())
            .filter(|&i| self.is_leaf(i))
            .map(|i| self.keys[i].as_str())
            .collect()
    }

    /// Strict ancestors from the parent upwards.
    pub fn ancestors(&self, pos: usize) -> Ancestors<'_> {
        Ancestors {
            parent: &self.parent,
            next: self.parent[pos],
        }
    }

    /// All strict descendants in depth-first preorder.
    pub fn descendants(&self, pos: usize) -> Vec<usize> {
        let mut out = Vec::new();
        let mut stack: Vec<usize> = self.children[pos].iter().rev().copied().collect();
        while let Some(cur) = stack.pop() {
            out.push(cur);
            stack.extend(self.children[cur].iter().rev().copied());
        }
        out
    }

    pub fn lowest_common_ancestor(&self, a: usize, b: usize) -> Option<usize> {
        let (mut a, mut b) = (a, b);
        while self.depth[a] > self.depth[b] {
            a = self.parent[a]?;
        }
        while self.depth[b] > self.depth[a] {
            b = self.parent[b]?;
        }
        while a != b {
            a = self.parent[a]?;
            b = self.parent[b]?;
        }
        Some(a)
    }

    /// Undirected path length between two nodes along containment edges.
    ///
    /// `None` when the nodes sit in different trees.
    pub fn distance(&self, a: usize, b: usize) -> Option<usize> {
        let lca = self.lowest_common_ancestor(a, b)?;
        Some(self.depth[a] + self.depth[b] - 2 * self.depth[lca])
    }
}

/// Iterator over strict ancestors. See [`Hierarchy::ancestors`].
pub struct Ancestors<'a> {
    parent: &'a [Option<usize>],
    next: Option<usize>,
}

impl Iterator for Ancestors<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        let cur = self.next?;
        self.next = self.parent[cur];
        Some(cur)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{NodeKind, ROOT_LEVEL};

    fn tree() -> DocGraph {
        // root -> A -> {A_1 -> {A_1_1, A_1_2}, A_2}
        let mut g = DocGraph::new("t");
        g.add_node(NodeData::new("root", ROOT_LEVEL, NodeKind::Other));
        g.add_node(NodeData::new("A", 0, NodeKind::Document));
        g.add_node(NodeData::new("A_1", 1, NodeKind::Item));
        g.add_node(NodeData::new("A_1_1", 2, NodeKind::Seqitem));
        g.add_node(NodeData::new("A_1_2", 2, NodeKind::Seqitem));
        g.add_node(NodeData::new("A_2", 1, NodeKind::Seqitem));
        for (p, c) in [("root", "A"), ("A", "A_1"), ("A_1", "A_1_1"), ("A_1", "A_1_2"), ("A", "A_2")] {
            g.add_edge(p, c, EdgeData::containment()).unwrap();
        }
        g.add_edge("A_1_1", "A_2", EdgeData::reference()).unwrap();
        g
    }

    #[test]
    fn add_node_replaces_existing_key() {
        let mut g = DocGraph::new("t");
        g.add_node(NodeData::new("x", 0, NodeKind::Item));
        g.add_node(NodeData::new("x", 3, NodeKind::Seqitem));
        assert_eq!(g.node_count(), 1);
        assert_eq!(g.node("x").unwrap().level, 3);
    }

    #[test]
    fn add_edge_to_unknown_node_fails() {
        let mut g = tree();
        let err = g.add_edge("A", "missing", EdgeData::reference()).unwrap_err();
        assert!(err.to_string().contains("missing"));
    }

    #[test]
    fn parallel_edges_are_kept() {
        let mut g = tree();
        g.add_edge("A_1_1", "A_2", EdgeData::reference()).unwrap();
        assert_eq!(g.edges_of_type(EdgeType::Reference).count(), 2);
    }

    #[test]
    fn hierarchy_leaves_and_distance() {
        let g = tree();
        let h = g.hierarchy().unwrap();
        assert_eq!(h.leaves(), vec!["A_1_1", "A_1_2", "A_2"]);
        let a11 = h.position("A_1_1").unwrap();
        let a12 = h.position("A_1_2").unwrap();
        let a2 = h.position("A_2").unwrap();
        assert_eq!(h.distance(a11, a12), Some(2));
        assert_eq!(h.distance(a11, a2), Some(3));
        assert_eq!(h.parent("A_1_1"), Some("A_1"));
        let ancestors: Vec<&str> = h.ancestors(a11).map(|p| h.key(p)).collect();
        assert_eq!(ancestors, vec!["A_1", "A", "root"]);
    }

    #[test]
    fn second_containment_parent_is_rejected() {
        let mut g = tree();
        g.add_edge("A_2", "A_1_2", EdgeData::containment()).unwrap();
        let err = g.hierarchy().unwrap_err();
        assert!(matches!(
            err,
            LexnetError::Graph(GraphError::MultipleParents { .. })
        ));
    }

    #[test]
    fn containment_cycle_is_rejected() {
        let mut g = DocGraph::new("c");
        g.add_node(NodeData::new("a", 0, NodeKind::Item));
        g.add_node(NodeData::new("b", 1, NodeKind::Item));
        g.add_edge("a", "b", EdgeData::containment()).unwrap();
        g.add_edge("b", "a", EdgeData::containment()).unwrap();
        assert!(matches!(
            g.hierarchy().unwrap_err(),
            LexnetError::Graph(GraphError::CyclicHierarchy(_))
        ));
    }

    #[test]
    fn serialized_roundtrip_keeps_edges() {
        let g = tree();
        let json = serde_json::to_string(&g.to_serialized()).unwrap();
        assert!(json.contains(r#""edge_type":"containment""#));
        let back = DocGraph::from_serialized(serde_json::from_str(&json).unwrap()).unwrap();
        assert_eq!(back.node_count(), g.node_count());
        assert_eq!(back.edge_count(), g.edge_count());
        assert_eq!(back.name(), "t");
    }

    #[test]
    fn retain_and_induce() {
        let mut g = tree();
        let keys: HashSet<&str> = ["A_1_1", "A_2"].into_iter().collect();
        let sub = g.induced_subgraph(&keys);
        assert_eq!(sub.node_count(), 2);
        assert_eq!(sub.edge_count(), 1);
        g.retain_edges(|_, _, e| e.edge_type != EdgeType::Reference);
        assert_eq!(g.edges_of_type(EdgeType::Reference).count(), 0);
        assert_eq!(g.edge_count(), 5);
    }
}
