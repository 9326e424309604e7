//! Shared types of the hierarchical document graph.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign};
use std::str::FromStr;

use crate::error::{ConfigError, LexnetError};

/// Level reserved for the synthetic root of a document hierarchy.
pub const ROOT_LEVEL: i32 = -1;

/// Granularity of a document unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    /// A whole statute, regulation or decision.
    Document,
    /// Structural unit between document and seqitem (book, chapter, part).
    Item,
    /// Paragraph-level unit, the finest reference-bearing unit in most graphs.
    Seqitem,
    /// Unit below a seqitem.
    Subseqitem,
    /// Anything the extraction stage emitted that is not listed above.
    #[serde(other)]
    Other,
}

impl Default for NodeKind {
    fn default() -> Self {
        NodeKind::Other
    }
}

/// Side of a decision/statute citation network a node belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Bipartite {
    Decision,
    Statute,
}

/// Type of an edge in a document graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeType {
    /// Structural parent -> child edge of the hierarchy tree.
    Containment,
    /// Cross-reference between provisions.
    Reference,
    /// Identity link between units.
    Identity,
    /// Textual adjacency between neighbouring leaves.
    Sequence,
    /// Provisions cited together by an external decision.
    Cooccurrence,
    /// Delegation of authority between provisions.
    Authority,
}

impl EdgeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeType::Containment => "containment",
            EdgeType::Reference => "reference",
            EdgeType::Identity => "identity",
            EdgeType::Sequence => "sequence",
            EdgeType::Cooccurrence => "cooccurrence",
            EdgeType::Authority => "authority",
        }
    }

    /// Edge types that carry a weight once the graph is augmented.
    pub fn is_weighted(&self) -> bool {
        matches!(
            self,
            EdgeType::Reference | EdgeType::Sequence | EdgeType::Cooccurrence
        )
    }
}

impl fmt::Display for EdgeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Text size metrics of a document unit.
///
/// Sums are taken over all text below the unit, so a parent's metrics
/// are at least as large as any child's.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizeMetrics {
    #[serde(default)]
    pub chars_n: u64,
    #[serde(default)]
    pub chars_nowhites: u64,
    #[serde(default)]
    pub tokens_n: u64,
    #[serde(default)]
    pub tokens_unique: u64,
}

impl SizeMetrics {
    pub fn new(chars_n: u64, tokens_n: u64) -> Self {
        Self {
            chars_n,
            tokens_n,
            ..Default::default()
        }
    }

    pub fn get(&self, attr: SizeAttr) -> u64 {
        match attr {
            SizeAttr::CharsN => self.chars_n,
            SizeAttr::CharsNowhites => self.chars_nowhites,
            SizeAttr::TokensN => self.tokens_n,
            SizeAttr::TokensUnique => self.tokens_unique,
        }
    }
}

impl Add for SizeMetrics {
    type Output = SizeMetrics;

    fn add(self, rhs: SizeMetrics) -> SizeMetrics {
        SizeMetrics {
            chars_n: self.chars_n + rhs.chars_n,
            chars_nowhites: self.chars_nowhites + rhs.chars_nowhites,
            tokens_n: self.tokens_n + rhs.tokens_n,
            tokens_unique: self.tokens_unique + rhs.tokens_unique,
        }
    }
}

impl AddAssign for SizeMetrics {
    fn add_assign(&mut self, rhs: SizeMetrics) {
        *self = *self + rhs;
    }
}

impl std::iter::Sum for SizeMetrics {
    fn sum<I: Iterator<Item = SizeMetrics>>(iter: I) -> Self {
        iter.fold(SizeMetrics::default(), |acc, m| acc + m)
    }
}

/// Selects one of the [`SizeMetrics`] fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SizeAttr {
    CharsN,
    CharsNowhites,
    TokensN,
    TokensUnique,
}

impl Default for SizeAttr {
    fn default() -> Self {
        SizeAttr::CharsN
    }
}

impl SizeAttr {
    pub fn as_str(&self) -> &'static str {
        match self {
            SizeAttr::CharsN => "chars_n",
            SizeAttr::CharsNowhites => "chars_nowhites",
            SizeAttr::TokensN => "tokens_n",
            SizeAttr::TokensUnique => "tokens_unique",
        }
    }
}

impl fmt::Display for SizeAttr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SizeAttr {
    type Err = LexnetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "chars_n" => Ok(SizeAttr::CharsN),
            "chars_nowhites" => Ok(SizeAttr::CharsNowhites),
            "tokens_n" => Ok(SizeAttr::TokensN),
            "tokens_unique" => Ok(SizeAttr::TokensUnique),
            other => Err(ConfigError::InvalidValue {
                field: "merge_attribute".into(),
                value: other.into(),
                reason: "expected chars_n, chars_nowhites, tokens_n or tokens_unique".into(),
            }
            .into()),
        }
    }
}

/// Data stored in a document graph node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeData {
    /// Unique id. Encodes lineage, e.g. `"BGB_1234_5"`.
    pub key: String,
    #[serde(default)]
    pub level: i32,
    #[serde(rename = "type", default)]
    pub kind: NodeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heading: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub citekey: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bipartite: Option<Bipartite>,
    #[serde(flatten)]
    pub metrics: SizeMetrics,
}

impl NodeData {
    pub fn new(key: impl Into<String>, level: i32, kind: NodeKind) -> Self {
        Self {
            key: key.into(),
            level,
            kind,
            heading: None,
            citekey: None,
            bipartite: None,
            metrics: SizeMetrics::default(),
        }
    }

    pub fn with_heading(mut self, heading: impl Into<String>) -> Self {
        self.heading = Some(heading.into());
        self
    }

    pub fn with_citekey(mut self, citekey: impl Into<String>) -> Self {
        self.citekey = Some(citekey.into());
        self
    }

    pub fn with_bipartite(mut self, bipartite: Bipartite) -> Self {
        self.bipartite = Some(bipartite);
        self
    }

    pub fn with_metrics(mut self, metrics: SizeMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    /// Law or document id: the key prefix before the first `_`.
    pub fn law_id(&self) -> &str {
        law_id(&self.key)
    }
}

/// Key prefix before the first `_`.
pub fn law_id(key: &str) -> &str {
    key.split('_').next().unwrap_or(key)
}

/// Key without its last `_`-separated segment (`"BGB_1_2"` -> `"BGB_1"`).
pub fn parent_key_prefix(key: &str) -> &str {
    key.rsplit_once('_').map(|(head, _)| head).unwrap_or("")
}

/// Data stored on a document graph edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeData {
    pub edge_type: EdgeType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
    /// Marks the reverse twin of an injected sequence or co-occurrence edge.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub backwards: bool,
}

impl EdgeData {
    pub fn new(edge_type: EdgeType) -> Self {
        Self {
            edge_type,
            weight: None,
            backwards: false,
        }
    }

    pub fn weighted(edge_type: EdgeType, weight: f64) -> Self {
        Self {
            edge_type,
            weight: Some(weight),
            backwards: false,
        }
    }

    pub fn containment() -> Self {
        Self::new(EdgeType::Containment)
    }

    pub fn reference() -> Self {
        Self::new(EdgeType::Reference)
    }

    pub fn reversed(mut self) -> Self {
        self.backwards = true;
        self
    }

    /// Weight with unweighted edges counting as 1.
    pub fn weight_or_unit(&self) -> f64 {
        self.weight.unwrap_or(1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_serializes_flat_metrics_and_type() {
        let node = NodeData::new("BGB_1", 2, NodeKind::Seqitem)
            .with_metrics(SizeMetrics::new(120, 20));
        let json = serde_json::to_value(&node).unwrap();
        assert_eq!(json["type"], "seqitem");
        assert_eq!(json["chars_n"], 120);
        assert!(json.get("heading").is_none());
    }

    #[test]
    fn unknown_node_type_is_tolerated() {
        let node: NodeData =
            serde_json::from_str(r#"{"key":"x","level":1,"type":"annex"}"#).unwrap();
        assert_eq!(node.kind, NodeKind::Other);
        assert_eq!(node.metrics, SizeMetrics::default());
    }

    #[test]
    fn key_helpers() {
        assert_eq!(law_id("BGB_12_3"), "BGB");
        assert_eq!(parent_key_prefix("BGB_12_3"), "BGB_12");
        assert_eq!(parent_key_prefix("root"), "");
    }

    #[test]
    fn metrics_sum() {
        let total: SizeMetrics = vec![SizeMetrics::new(1, 2), SizeMetrics::new(3, 4)]
            .into_iter()
            .sum();
        assert_eq!(total, SizeMetrics::new(4, 6));
        assert_eq!(total.get(SizeAttr::TokensN), 6);
    }
}
