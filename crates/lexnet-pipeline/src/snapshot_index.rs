//! Per-snapshot node identity table used by the evolution builder.
//!
//! The table relates every node of the reduced graph to the finest nodes of
//! the snapshot it absorbed, and carries the size figures needed to weigh
//! evolution edges.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::debug;

use lexnet_core::error::{LexnetError, Result};
use lexnet_core::types::NodeKind;

/// One row of `{snapshot}.nodes.csv`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRow {
    pub key: String,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    #[serde(default)]
    pub tokens_n: Option<u64>,
    #[serde(default)]
    pub chars_n: Option<u64>,
    /// Comma separated per-segment token counts.
    #[serde(default)]
    pub texts_tokens_n: Option<String>,
    #[serde(default)]
    pub texts_chars_n: Option<String>,
    #[serde(default)]
    pub document_type: Option<String>,
}

/// One row of `{snapshot}.edges.csv`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeRow {
    pub u: String,
    pub v: String,
    pub edge_type: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SnapshotIndex {
    /// Reduced node -> table nodes it absorbed, itself included.
    pub items_mapping: BTreeMap<String, Vec<String>>,
    pub tokens_n: BTreeMap<String, u64>,
    pub chars_n: BTreeMap<String, u64>,
    /// Reduced node -> number of seqitems it absorbed.
    pub seqitem_counts: BTreeMap<String, u64>,
    pub texts_tokens_n: BTreeMap<String, Vec<u64>>,
    pub texts_chars_n: BTreeMap<String, Vec<u64>>,
    pub document_type: BTreeMap<String, String>,
}

fn parse_segments(key: &str, raw: &str) -> Result<Vec<u64>> {
    raw.split(',')
        .map(|part| {
            part.trim().parse::<u64>().map_err(|_| {
                LexnetError::table(format!("{key}: segment size '{part}' is not a count"))
            })
        })
        .collect()
}

impl SnapshotIndex {
    /// Build the index of one snapshot against the node set of its reduced
    /// graph.
    pub fn build(nodes: &[NodeRow], edges: &[EdgeRow], reduced: &HashSet<&str>) -> Result<Self> {
        let parents: HashMap<&str, &str> = edges
            .iter()
            .filter(|e| e.edge_type == "containment")
            .map(|e| (e.v.as_str(), e.u.as_str()))
            .collect();

        let roll_up = |key: &str| -> Result<Option<String>> {
            let mut current = key;
            for _ in 0..=parents.len() {
                if reduced.contains(current) {
                    return Ok(Some(current.to_string()));
                }
                match parents.get(current) {
                    Some(parent) => current = parent,
                    None => return Ok(None),
                }
            }
            Err(LexnetError::integrity(format!(
                "containment cycle above {key}"
            )))
        };

        let mut index = SnapshotIndex {
            items_mapping: reduced.iter().map(|k| (k.to_string(), Vec::new())).collect(),
            ..Default::default()
        };

        for row in nodes {
            let Some(target) = roll_up(&row.key)? else {
                continue;
            };
            if row.kind == NodeKind::Seqitem {
                *index.seqitem_counts.entry(target.clone()).or_insert(0) += 1;
            }
            index
                .items_mapping
                .entry(target)
                .or_default()
                .push(row.key.clone());
        }

        for row in nodes {
            let key = &row.key;
            if let Some(t) = row.tokens_n {
                index.tokens_n.insert(key.clone(), t);
            }
            if let Some(c) = row.chars_n {
                index.chars_n.insert(key.clone(), c);
            }
            if let Some(raw) = row.texts_tokens_n.as_deref().filter(|s| !s.is_empty()) {
                index.texts_tokens_n.insert(key.clone(), parse_segments(key, raw)?);
            }
            if let Some(raw) = row.texts_chars_n.as_deref().filter(|s| !s.is_empty()) {
                index.texts_chars_n.insert(key.clone(), parse_segments(key, raw)?);
            }
            if let Some(doc) = row.document_type.as_deref().filter(|s| !s.is_empty()) {
                index.document_type.insert(key.clone(), doc.to_string());
            }
        }

        debug!(
            reduced = reduced.len(),
            rows = nodes.len(),
            "built snapshot index"
        );
        Ok(index)
    }

    /// File name of a persisted index.
    pub fn filename(snapshot: &str, pp_merge: i64) -> String {
        format!("{snapshot}_{pp_merge}.json")
    }
}
