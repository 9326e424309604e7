//! Graph reduction: contract small hierarchy branches into their ancestors.
//!
//! A node is *contracted* when it disappears from the reduced graph and is
//! represented by its closest uncontracted ancestor. Two rules decide that:
//!
//! - threshold: a node is contracted iff its parent's size metric does not
//!   exceed the threshold, so whole sibling groups vanish together
//! - structural: everything below a book or chapter heading is contracted
//!   into that heading
//!
//! The root and its direct children always survive.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use tracing::debug;

use lexnet_core::error::{LexnetError, Result};
use lexnet_core::graph::{DocGraph, Hierarchy};
use lexnet_core::types::{EdgeType, SizeAttr};

/// Node -> representative in the reduced graph.
pub type NodesMapping = BTreeMap<String, String>;

/// `pp_merge` value that selects structural contraction.
pub const STRUCTURAL_MERGE: i64 = -1;

static BOUNDARY_HEADING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:\w*\s*\bBuch\b|\[?CHAPTER|\[?Chapter|\[?Chap\.)")
        .expect("boundary heading pattern is valid")
});

/// Whether a heading opens a book or chapter.
pub fn is_boundary_heading(heading: &str) -> bool {
    BOUNDARY_HEADING.is_match(heading)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ContractionRule {
    Threshold { threshold: i64, attr: SizeAttr },
    Structural,
}

impl ContractionRule {
    pub fn from_merge(pp_merge: i64, attr: SizeAttr) -> Self {
        if pp_merge == STRUCTURAL_MERGE {
            ContractionRule::Structural
        } else {
            ContractionRule::Threshold {
                threshold: pp_merge,
                attr,
            }
        }
    }

    fn label(&self) -> (SizeAttr, i64) {
        match *self {
            ContractionRule::Threshold { threshold, attr } => (attr, threshold),
            ContractionRule::Structural => (SizeAttr::default(), STRUCTURAL_MERGE),
        }
    }
}

/// Decides contraction per hierarchy position.
struct Contraction<'a> {
    graph: &'a DocGraph,
    hierarchy: &'a Hierarchy,
    rule: ContractionRule,
}

impl Contraction<'_> {
    fn heading_is_boundary(&self, pos: usize) -> bool {
        self.graph
            .node(self.hierarchy.key(pos))
            .and_then(|n| n.heading.as_deref())
            .map_or(false, is_boundary_heading)
    }

    fn is_contracted(&self, pos: usize) -> bool {
        let Some(parent) = self.hierarchy.parent_of(pos) else {
            return false;
        };
        if self.hierarchy.is_root(parent) {
            return false;
        }
        match self.rule {
            ContractionRule::Structural => {
                if self.heading_is_boundary(pos) {
                    return false;
                }
                self.hierarchy
                    .ancestors(pos)
                    .filter(|&a| !self.hierarchy.is_root(a))
                    .any(|a| self.heading_is_boundary(a))
            }
            ContractionRule::Threshold { threshold, attr } => {
                let size = self
                    .graph
                    .node(self.hierarchy.key(parent))
                    .map_or(0, |n| n.metrics.get(attr));
                i128::from(size) <= i128::from(threshold)
            }
        }
    }
}

/// Representative of `node`: the node itself or its closest uncontracted
/// ancestor.
pub fn find_contraction_target(
    graph: &DocGraph,
    hierarchy: &Hierarchy,
    rule: ContractionRule,
    node: &str,
) -> Result<String> {
    let contraction = Contraction {
        graph,
        hierarchy,
        rule,
    };
    let mut pos = hierarchy
        .position(node)
        .ok_or_else(|| LexnetError::node_not_found(node))?;
    while contraction.is_contracted(pos) {
        pos = match hierarchy.parent_of(pos) {
            Some(p) => p,
            None => break,
        };
    }
    Ok(hierarchy.key(pos).to_string())
}

/// Contract `graph` under `rule`.
///
/// Reference, identity and authority edges are redirected to the
/// representatives of their endpoints. Containment edges survive iff their
/// target does. Returns the reduced graph and the mapping of every input
/// node to its representative.
pub fn quotient_graph_with_merge(
    graph: &DocGraph,
    rule: ContractionRule,
    self_loops: bool,
) -> Result<(DocGraph, NodesMapping)> {
    let hierarchy = graph.hierarchy()?;
    let contraction = Contraction {
        graph,
        hierarchy: &hierarchy,
        rule,
    };
    let contracted: Vec<bool> = (0..hierarchy.len())
        .map(|pos| contraction.is_contracted(pos))
        .collect();

    let (attr, threshold) = rule.label();
    let mut reduced = DocGraph::new(format!(
        "{}_merged_quotient_graph_{}_{}",
        graph.name(),
        attr,
        threshold
    ));
    let mut mapping = NodesMapping::new();

    for (pos, node) in graph.nodes().enumerate() {
        if contracted[pos] {
            let mut target = pos;
            while contracted[target] {
                match hierarchy.parent_of(target) {
                    Some(p) => target = p,
                    None => break,
                }
            }
            mapping.insert(node.key.clone(), hierarchy.key(target).to_string());
        } else {
            reduced.add_node(node.clone());
            mapping.insert(node.key.clone(), node.key.clone());
        }
    }

    for (source, target, data) in graph.edges() {
        match data.edge_type {
            EdgeType::Reference | EdgeType::Identity | EdgeType::Authority => {
                let s = &mapping[source];
                let t = &mapping[target];
                if self_loops || s != t {
                    reduced.add_edge(s, t, data.clone())?;
                }
            }
            EdgeType::Containment => {
                if reduced.contains(target) {
                    reduced.add_edge(source, target, data.clone())?;
                }
            }
            EdgeType::Sequence | EdgeType::Cooccurrence => {
                return Err(LexnetError::integrity(format!(
                    "unexpected {} edge {source} -> {target} in unreduced graph",
                    data.edge_type
                )));
            }
        }
    }

    debug!(
        name = reduced.name(),
        nodes_before = graph.node_count(),
        nodes_after = reduced.node_count(),
        "contracted graph"
    );
    Ok((reduced, mapping))
}
