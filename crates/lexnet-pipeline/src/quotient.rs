//! Generic graph folding: group quotients, metric aggregation and decision
//! network quotients.

use std::collections::{BTreeMap, HashMap};

use lexnet_core::error::Result;
use lexnet_core::graph::DocGraph;
use lexnet_core::types::{law_id, Bipartite, EdgeData, EdgeType, NodeData, NodeKind};

/// Group name for nodes without a group value.
pub const UNGROUPED: &str = "-1";

/// Group -> member keys in graph order.
pub type Groups = BTreeMap<String, Vec<String>>;

/// Fold every group of nodes into a single node.
///
/// `group_of` assigns a group name per node; `None` goes to [`UNGROUPED`].
/// The first node at `root_level` is left out, as are edges leaving it.
/// Edges of the listed types between groups are kept, intra-group edges
/// only with `self_loops`. A group node takes the attributes of the member
/// whose heading equals the group name. Size metrics are summed per group.
pub fn quotient_graph<F>(
    graph: &DocGraph,
    label: &str,
    group_of: F,
    edge_types: &[EdgeType],
    self_loops: bool,
    root_level: Option<i32>,
) -> Result<(DocGraph, Groups)>
where
    F: Fn(&NodeData) -> Option<String>,
{
    let root = root_level.and_then(|level| graph.nodes().find(|n| n.level == level));
    let root_key = root.map(|n| n.key.clone());

    let assignment: HashMap<&str, String> = graph
        .nodes()
        .map(|n| {
            (
                n.key.as_str(),
                group_of(n).unwrap_or_else(|| UNGROUPED.to_string()),
            )
        })
        .collect();

    let mut groups = Groups::new();
    for node in graph.nodes() {
        if Some(&node.key) == root_key.as_ref() {
            continue;
        }
        groups
            .entry(assignment[node.key.as_str()].clone())
            .or_default()
            .push(node.key.clone());
    }

    let mut folded = DocGraph::new(format!("{}_quotient_graph_{label}", graph.name()));
    for (group, members) in &groups {
        let template = members
            .iter()
            .filter_map(|k| graph.node(k))
            .find(|n| n.heading.as_deref() == Some(group.as_str()));
        let data = match template {
            Some(n) => NodeData {
                key: group.clone(),
                ..n.clone()
            },
            None => NodeData::new(group.clone(), 0, NodeKind::Other),
        };
        folded.add_node(data);
    }

    for (source, target, data) in graph.edges() {
        if !edge_types.contains(&data.edge_type) {
            continue;
        }
        if Some(source) == root_key.as_deref() {
            continue;
        }
        let (gs, gt) = (&assignment[source], &assignment[target]);
        if !folded.contains(gt) || (!self_loops && gs == gt) {
            continue;
        }
        let edge = EdgeData {
            edge_type: data.edge_type,
            weight: data.weight,
            backwards: false,
        };
        folded.add_edge(gs, gt, edge)?;
    }

    aggregate_metrics(&mut folded, graph, &groups);
    Ok((folded, groups))
}

/// Set each group node's size metrics to the sum over its members.
pub fn aggregate_metrics(folded: &mut DocGraph, graph: &DocGraph, groups: &Groups) {
    for (group, members) in groups {
        let total = members
            .iter()
            .filter_map(|k| graph.node(k))
            .map(|n| n.metrics)
            .sum();
        if let Some(node) = folded.node_mut(group) {
            node.metrics = total;
        }
    }
}

fn ensure_node(graph: &mut DocGraph, key: &str) {
    if !graph.contains(key) {
        graph.add_node(NodeData::new(key, 0, NodeKind::Other));
    }
}

/// Quotient of a decision/statute citation network.
///
/// With `merge_decisions` every decision document becomes one node keyed by
/// its law id and references from its parts are attributed to it. With
/// `merge_statutes` statute nodes are folded by law id. Reference weights
/// are summed per converted pair.
pub fn quotient_decision_graph(
    network: &DocGraph,
    merge_decisions: bool,
    merge_statutes: bool,
) -> Result<DocGraph> {
    let mut folded = DocGraph::new(format!("{}_decisions", network.name()));

    if merge_decisions {
        for node in network
            .nodes()
            .filter(|n| n.kind == NodeKind::Document && n.bipartite != Some(Bipartite::Statute))
        {
            folded.add_node(NodeData {
                key: law_id(&node.key).to_string(),
                ..node.clone()
            });
        }
    } else {
        for node in network
            .nodes()
            .filter(|n| n.bipartite == Some(Bipartite::Decision))
        {
            folded.add_node(node.clone());
        }
        for (source, target, data) in network.edges_of_type(EdgeType::Containment) {
            if folded.contains(source) && folded.contains(target) {
                folded.add_edge(source, target, data.clone())?;
            }
        }
    }

    let statutes = network
        .nodes()
        .filter(|n| n.bipartite == Some(Bipartite::Statute));
    if merge_statutes {
        let mut merged: Vec<&str> = statutes.map(|n| law_id(&n.key)).collect();
        merged.sort_unstable();
        merged.dedup();
        for key in merged {
            folded.add_node(NodeData::new(key, 0, NodeKind::Document).with_bipartite(Bipartite::Statute));
        }
    } else {
        for node in statutes {
            folded.add_node(node.clone());
        }
    }

    let mut order: Vec<(String, String)> = Vec::new();
    let mut weights: HashMap<(String, String), f64> = HashMap::new();
    for (source, target, data) in network.edges_of_type(EdgeType::Reference) {
        let u = if merge_decisions { law_id(source) } else { source };
        let v = if merge_statutes { law_id(target) } else { target };
        let key = (u.to_string(), v.to_string());
        if !weights.contains_key(&key) {
            order.push(key.clone());
        }
        *weights.entry(key).or_insert(0.0) += data.weight_or_unit();
    }
    for key in order {
        let weight = weights[&key];
        ensure_node(&mut folded, &key.0);
        ensure_node(&mut folded, &key.1);
        folded.add_edge(&key.0, &key.1, EdgeData::weighted(EdgeType::Reference, weight))?;
    }
    Ok(folded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lexnet_core::types::{SizeMetrics, ROOT_LEVEL};

    fn corpus() -> DocGraph {
        let mut g = DocGraph::new("c");
        g.add_node(NodeData::new("root", ROOT_LEVEL, NodeKind::Other));
        g.add_node(
            NodeData::new("A", 0, NodeKind::Document)
                .with_heading("A")
                .with_metrics(SizeMetrics::new(30, 6)),
        );
        g.add_node(NodeData::new("A_1", 1, NodeKind::Seqitem).with_metrics(SizeMetrics::new(10, 2)));
        g.add_node(NodeData::new("B_1", 1, NodeKind::Seqitem).with_metrics(SizeMetrics::new(5, 1)));
        g.add_node(NodeData::new("Z", 1, NodeKind::Seqitem).with_metrics(SizeMetrics::new(1, 1)));
        g.add_edge("root", "A", EdgeData::containment()).unwrap();
        g.add_edge("A", "A_1", EdgeData::containment()).unwrap();
        g.add_edge("A_1", "B_1", EdgeData::weighted(EdgeType::Reference, 2.0)).unwrap();
        g.add_edge("A_1", "A", EdgeData::reference()).unwrap();
        g.add_edge("root", "B_1", EdgeData::reference()).unwrap();
        g
    }

    fn by_law(n: &NodeData) -> Option<String> {
        if n.key == "Z" {
            None
        } else {
            Some(law_id(&n.key).to_string())
        }
    }

    #[test]
    fn folds_groups_and_sums_metrics() {
        let (q, groups) =
            quotient_graph(&corpus(), "law", by_law, &[EdgeType::Reference], false, Some(ROOT_LEVEL))
                .unwrap();
        assert_eq!(q.name(), "c_quotient_graph_law");
        let keys: Vec<&str> = q.keys().collect();
        assert_eq!(keys, vec!["-1", "A", "B"]);
        assert_eq!(groups["A"], vec!["A".to_string(), "A_1".to_string()]);
        assert_eq!(q.node("A").unwrap().metrics.chars_n, 40);
        assert_eq!(q.node("A").unwrap().kind, NodeKind::Document);
        assert_eq!(q.node("-1").unwrap().metrics.tokens_n, 1);
        // A_1 -> A is intra-group, root edge is skipped
        let refs: Vec<(&str, &str, Option<f64>)> = q
            .edges()
            .map(|(s, t, e)| (s, t, e.weight))
            .collect();
        assert_eq!(refs, vec![("A", "B", Some(2.0))]);
    }

    #[test]
    fn self_loops_survive_on_request() {
        let (q, _) =
            quotient_graph(&corpus(), "law", by_law, &[EdgeType::Reference], true, Some(ROOT_LEVEL))
                .unwrap();
        assert_eq!(q.edge_count(), 2);
    }

    fn decisions() -> DocGraph {
        let mut c = DocGraph::new("dn");
        c.add_node(NodeData::new("D1", 0, NodeKind::Document).with_bipartite(Bipartite::Decision));
        c.add_node(NodeData::new("D1_1", 1, NodeKind::Seqitem).with_bipartite(Bipartite::Decision));
        c.add_node(NodeData::new("D1_2", 1, NodeKind::Seqitem).with_bipartite(Bipartite::Decision));
        c.add_node(NodeData::new("BGB_1", 0, NodeKind::Seqitem).with_bipartite(Bipartite::Statute));
        c.add_node(NodeData::new("BGB_2", 0, NodeKind::Seqitem).with_bipartite(Bipartite::Statute));
        c.add_edge("D1", "D1_1", EdgeData::containment()).unwrap();
        c.add_edge("D1", "D1_2", EdgeData::containment()).unwrap();
        c.add_edge("D1_1", "BGB_1", EdgeData::weighted(EdgeType::Reference, 1.0)).unwrap();
        c.add_edge("D1_2", "BGB_1", EdgeData::weighted(EdgeType::Reference, 2.0)).unwrap();
        c.add_edge("D1_2", "BGB_2", EdgeData::weighted(EdgeType::Reference, 1.0)).unwrap();
        c
    }

    #[test]
    fn decision_merge_sums_reference_weights() {
        let q = quotient_decision_graph(&decisions(), true, false).unwrap();
        assert!(q.contains("D1"));
        assert!(!q.contains("D1_1"));
        let out = q.out_edges("D1");
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].0, "BGB_1");
        assert_eq!(out[0].1.weight, Some(3.0));
    }

    #[test]
    fn paragraph_granularity_keeps_decision_parts() {
        let q = quotient_decision_graph(&decisions(), false, true).unwrap();
        assert!(q.contains("D1_1"));
        assert!(q.contains("BGB"));
        assert_eq!(q.edges_of_type(EdgeType::Containment).count(), 2);
        let out = q.out_edges("D1_2");
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].1.weight, Some(3.0));
    }
}
