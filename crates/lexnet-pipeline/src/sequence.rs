//! Sequence edges between textually adjacent leaves.

use std::collections::HashSet;
use tracing::{debug, warn};

use lexnet_core::error::Result;
use lexnet_core::graph::DocGraph;
use lexnet_core::types::{law_id, EdgeData, EdgeType};

/// Power-law decay of sequence weight over hierarchy distance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Decay {
    pub exponent: f64,
}

impl Decay {
    pub fn new(exponent: f64) -> Self {
        Self { exponent }
    }

    /// `(distance - 1)^(-k)`. Siblings (distance 2) always weigh 1.
    pub fn weight(&self, distance: usize) -> f64 {
        let steps = distance.saturating_sub(1).max(1) as f64;
        steps.powf(-self.exponent)
    }
}

/// Leaf graph of `graph` with sequence edges injected.
///
/// Every kept edge gets weight `weight / ratio` (unweighted edges count
/// as 1). With `ratio == 0` all weights become 1 and no sequence edges are
/// added.
pub fn sequence_graph(graph: &DocGraph, decay: Decay, ratio: f64) -> Result<DocGraph> {
    let hierarchy = graph.hierarchy()?;
    let leaves: HashSet<&str> = hierarchy.leaves().into_iter().collect();
    let mut seq = graph.induced_subgraph(&leaves);

    seq.for_each_edge_mut(|e| {
        e.weight = Some(if ratio == 0.0 {
            1.0
        } else {
            e.weight_or_unit() / ratio
        });
    });
    if ratio == 0.0 {
        return Ok(seq);
    }

    let mut ordered: Vec<&str> = leaves.iter().copied().collect();
    ordered.sort_unstable();

    let mut added = 0usize;
    for pair in ordered.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        if law_id(a) != law_id(b) {
            continue;
        }
        let (Some(pa), Some(pb)) = (hierarchy.position(a), hierarchy.position(b)) else {
            continue;
        };
        let Some(distance) = hierarchy.distance(pa, pb) else {
            warn!(a, b, "no hierarchy path between neighbouring leaves");
            continue;
        };
        let weight = decay.weight(distance);
        seq.add_edge(a, b, EdgeData::weighted(EdgeType::Sequence, weight))?;
        seq.add_edge(b, a, EdgeData::weighted(EdgeType::Sequence, weight).reversed())?;
        added += 1;
    }
    debug!(leaves = ordered.len(), pairs = added, "added sequence edges");
    Ok(seq)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lexnet_core::types::{NodeData, NodeKind, ROOT_LEVEL};

    fn graph() -> DocGraph {
        // root -> A -> {A_1 -> {A_1_1, A_1_2}, A_2}; root -> B -> B_1
        let mut g = DocGraph::new("g");
        g.add_node(NodeData::new("root", ROOT_LEVEL, NodeKind::Other));
        for (k, l) in [("A", 0), ("A_1", 1), ("A_1_1", 2), ("A_1_2", 2), ("A_2", 1), ("B", 0), ("B_1", 1)] {
            g.add_node(NodeData::new(k, l, NodeKind::Seqitem));
        }
        for (p, c) in [
            ("root", "A"),
            ("A", "A_1"),
            ("A_1", "A_1_1"),
            ("A_1", "A_1_2"),
            ("A", "A_2"),
            ("root", "B"),
            ("B", "B_1"),
        ] {
            g.add_edge(p, c, EdgeData::containment()).unwrap();
        }
        g.add_edge("A_1_1", "B_1", EdgeData::weighted(EdgeType::Reference, 2.0))
            .unwrap();
        g
    }

    #[test]
    fn decay_of_siblings_is_one() {
        let d = Decay::new(2.0);
        assert_eq!(d.weight(2), 1.0);
        assert_eq!(d.weight(3), 0.25);
    }

    #[test]
    fn sequence_edges_are_symmetric() {
        let seq = sequence_graph(&graph(), Decay::new(1.0), 1.0).unwrap();
        let edges: Vec<(&str, &str, &EdgeData)> = seq.edges_of_type(EdgeType::Sequence).collect();
        assert_eq!(edges.len(), 4);
        for (s, t, e) in &edges {
            let twin = edges
                .iter()
                .find(|(s2, t2, _)| s2 == t && t2 == s)
                .expect("reverse edge exists");
            assert_eq!(twin.2.weight, e.weight);
            assert_ne!(twin.2.backwards, e.backwards);
        }
        // A_1_2 and A_2 are 3 apart
        let far = edges
            .iter()
            .find(|(s, t, _)| *s == "A_1_2" && *t == "A_2")
            .unwrap();
        assert_eq!(far.2.weight, Some(0.5));
    }

    #[test]
    fn leaves_only_and_no_cross_law_pairs() {
        let seq = sequence_graph(&graph(), Decay::new(1.0), 1.0).unwrap();
        assert_eq!(seq.node_count(), 4);
        assert!(!seq.contains("A_1"));
        assert!(seq
            .edges_of_type(EdgeType::Sequence)
            .all(|(s, t, _)| law_id(s) == law_id(t)));
    }

    #[test]
    fn ratio_scales_existing_weights() {
        let seq = sequence_graph(&graph(), Decay::new(1.0), 4.0).unwrap();
        let (_, _, r) = seq.edges_of_type(EdgeType::Reference).next().unwrap();
        assert_eq!(r.weight, Some(0.5));
    }

    #[test]
    fn zero_ratio_means_no_sequence_edges() {
        let seq = sequence_graph(&graph(), Decay::new(1.0), 0.0).unwrap();
        assert_eq!(seq.edges_of_type(EdgeType::Sequence).count(), 0);
        assert!(seq.edges().all(|(_, _, e)| e.weight == Some(1.0)));
    }
}
