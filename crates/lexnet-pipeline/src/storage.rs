//! Artifact layout and persistence.
//!
//! Graphs, partitions, indexes and evolution graphs are JSON files addressed
//! by their configuration filename. Tables and the missing-nodes report are
//! CSV.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use lexnet_core::config::RunConfig;
use lexnet_core::error::{LexnetError, Result};
use lexnet_core::graph::{DocGraph, SerializedGraph};
use lexnet_core::tree::ClusterTree;

use crate::clustering::Clustering;
use crate::evolution::{EvolutionGraph, LeafMapping, SerializedEvolutionGraph};
use crate::snapshot_index::{EdgeRow, NodeRow, SnapshotIndex};

/// Folders of every pipeline artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataLayout {
    pub crossreference_graphs: PathBuf,
    pub snapshot_tables: PathBuf,
    pub snapshot_mappings: PathBuf,
    pub preprocessed_graphs: PathBuf,
    pub cluster_results: PathBuf,
    pub evolution_mappings: PathBuf,
    pub evolution_graphs: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decision_network: Option<PathBuf>,
}

impl DataLayout {
    /// Default folder names below `root`.
    pub fn under(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self {
            crossreference_graphs: root.join("crossreference_graphs"),
            snapshot_tables: root.join("snapshot_tables"),
            snapshot_mappings: root.join("snapshot_mappings"),
            preprocessed_graphs: root.join("preprocessed_graphs"),
            cluster_results: root.join("cluster_results"),
            evolution_mappings: root.join("evolution_mappings"),
            evolution_graphs: root.join("evolution_graphs"),
            decision_network: None,
        }
    }

    /// Resolve relative folders against `base`.
    pub fn rebased(&self, base: &Path) -> Self {
        let join = |p: &PathBuf| if p.is_absolute() { p.clone() } else { base.join(p) };
        Self {
            crossreference_graphs: join(&self.crossreference_graphs),
            snapshot_tables: join(&self.snapshot_tables),
            snapshot_mappings: join(&self.snapshot_mappings),
            preprocessed_graphs: join(&self.preprocessed_graphs),
            cluster_results: join(&self.cluster_results),
            evolution_mappings: join(&self.evolution_mappings),
            evolution_graphs: join(&self.evolution_graphs),
            decision_network: self.decision_network.as_ref().map(join),
        }
    }

    pub fn raw_graph(&self, snapshot: &str) -> PathBuf {
        self.crossreference_graphs.join(format!("{snapshot}.json"))
    }

    pub fn preprocessed_graph(&self, config: &RunConfig) -> PathBuf {
        self.preprocessed_graphs
            .join(config.preprocessing_projection().filename(".json"))
    }

    pub fn missing_nodes_csv(&self, config: &RunConfig) -> PathBuf {
        let stem = config.preprocessing_projection().stem();
        self.preprocessed_graphs
            .join(format!("{stem}_missing_co_occurr_nodes.csv"))
    }

    pub fn clustering(&self, config: &RunConfig) -> PathBuf {
        self.cluster_results.join(config.filename(".json"))
    }

    pub fn cluster_tree(&self, config: &RunConfig) -> PathBuf {
        self.cluster_results.join(config.filename(".tree.json"))
    }

    pub fn node_table(&self, snapshot: &str) -> PathBuf {
        self.snapshot_tables.join(format!("{snapshot}.nodes.csv"))
    }

    pub fn edge_table(&self, snapshot: &str) -> PathBuf {
        self.snapshot_tables.join(format!("{snapshot}.edges.csv"))
    }

    pub fn snapshot_index(&self, snapshot: &str, pp_merge: i64) -> PathBuf {
        self.evolution_mappings
            .join(SnapshotIndex::filename(snapshot, pp_merge))
    }

    pub fn leaf_mapping(&self, previous: &str, current: &str) -> PathBuf {
        self.snapshot_mappings
            .join(format!("{previous}_{current}.json"))
    }

    pub fn evolution_graph(&self, config: &RunConfig) -> PathBuf {
        self.evolution_graphs
            .join(config.with_snapshot("all").filename(".json"))
    }

    pub fn families(&self, config: &RunConfig) -> PathBuf {
        self.evolution_graphs
            .join(config.with_snapshot("all").filename(".families.json"))
    }

    /// Create every output folder.
    pub fn ensure_output_dirs(&self) -> Result<()> {
        for dir in [
            &self.preprocessed_graphs,
            &self.cluster_results,
            &self.evolution_mappings,
            &self.evolution_graphs,
        ] {
            fs::create_dir_all(dir)?;
        }
        Ok(())
    }
}

/// File names in `dir` ending with `suffix`, sorted. A missing folder
/// lists as empty.
pub fn list_dir(dir: &Path, suffix: &str) -> Result<Vec<String>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut names = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if let Some(name) = entry.file_name().to_str() {
            if name.ends_with(suffix) && entry.path().is_file() {
                names.push(name.to_string());
            }
        }
    }
    names.sort();
    Ok(names)
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    ensure_parent(path)?;
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json)?;
    debug!(path = %path.display(), "wrote json");
    Ok(())
}

pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let json = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&json)?)
}

pub fn read_graph(path: &Path) -> Result<DocGraph> {
    let state: SerializedGraph = read_json(path)?;
    DocGraph::from_serialized(state)
}

pub fn write_graph(path: &Path, graph: &DocGraph) -> Result<()> {
    write_json(path, &graph.to_serialized())
}

pub fn read_clustering(path: &Path) -> Result<Clustering> {
    read_json(path)
}

pub fn write_clustering(path: &Path, clustering: &Clustering) -> Result<()> {
    write_json(path, clustering)
}

pub fn read_tree(path: &Path) -> Result<ClusterTree> {
    read_json(path)
}

pub fn write_tree(path: &Path, tree: &ClusterTree) -> Result<()> {
    write_json(path, tree)
}

pub fn read_leaf_mapping(path: &Path) -> Result<LeafMapping> {
    read_json(path)
}

pub fn read_snapshot_index(path: &Path) -> Result<SnapshotIndex> {
    read_json(path)
}

pub fn write_snapshot_index(path: &Path, index: &SnapshotIndex) -> Result<()> {
    write_json(path, index)
}

pub fn read_evolution_graph(path: &Path) -> Result<EvolutionGraph> {
    let state: SerializedEvolutionGraph = read_json(path)?;
    EvolutionGraph::from_serialized(state)
}

pub fn write_evolution_graph(path: &Path, graph: &EvolutionGraph) -> Result<()> {
    write_json(path, &graph.to_serialized())
}

pub fn write_families(path: &Path, families: &[Vec<String>]) -> Result<()> {
    write_json(path, families)
}

fn read_rows<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let mut reader = csv::Reader::from_path(path).map_err(LexnetError::table)?;
    reader
        .deserialize()
        .map(|row| row.map_err(LexnetError::table))
        .collect()
}

pub fn read_node_table(path: &Path) -> Result<Vec<NodeRow>> {
    read_rows(path)
}

pub fn read_edge_table(path: &Path) -> Result<Vec<EdgeRow>> {
    read_rows(path)
}

#[derive(Serialize)]
struct MissingRow<'a> {
    missing_node: &'a str,
    count: usize,
}

/// Write the unmatched citekey report, most frequent first.
pub fn write_missing_nodes(path: &Path, missing: &[(String, usize)]) -> Result<()> {
    ensure_parent(path)?;
    let mut writer = csv::Writer::from_path(path).map_err(LexnetError::table)?;
    if missing.is_empty() {
        writer
            .write_record(["missing_node", "count"])
            .map_err(LexnetError::table)?;
    }
    for (key, count) in missing {
        writer
            .serialize(MissingRow {
                missing_node: key,
                count: *count,
            })
            .map_err(LexnetError::table)?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lexnet_core::types::{EdgeData, NodeData, NodeKind};

    #[test]
    fn graph_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let mut g = DocGraph::new("g");
        g.add_node(NodeData::new("a", 0, NodeKind::Document));
        g.add_node(NodeData::new("a_1", 1, NodeKind::Seqitem));
        g.add_edge("a", "a_1", EdgeData::containment()).unwrap();
        let path = dir.path().join("nested").join("g.json");
        write_graph(&path, &g).unwrap();
        let back = read_graph(&path).unwrap();
        assert_eq!(back.node_count(), 2);
        assert_eq!(back.edge_count(), 1);
        assert_eq!(back.name(), "g");
    }

    #[test]
    fn missing_nodes_csv_has_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("m.csv");
        write_missing_nodes(&path, &[("x_1".into(), 3), ("y_2".into(), 1)]).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text, "missing_node,count\nx_1,3\ny_2,1\n");
        write_missing_nodes(&path, &[]).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "missing_node,count\n");
    }

    #[test]
    fn node_table_parses_optional_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.nodes.csv");
        fs::write(
            &path,
            "key,type,tokens_n,chars_n,texts_tokens_n,texts_chars_n,document_type\n\
             L,document,,,,,statute\n\
             L_1,seqitem,20,100,\"12,8\",\"60,40\",\n",
        )
        .unwrap();
        let rows = read_node_table(&path).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].tokens_n, None);
        assert_eq!(rows[0].document_type.as_deref(), Some("statute"));
        assert_eq!(rows[1].kind, NodeKind::Seqitem);
        assert_eq!(rows[1].texts_tokens_n.as_deref(), Some("12,8"));
    }

    #[test]
    fn layout_paths_follow_config_names() {
        let layout = DataLayout::under("/data");
        let mut config = RunConfig::new("2019", 1.0, 1.0, -1);
        config.seed = Some(3);
        assert_eq!(
            layout.preprocessed_graph(&config),
            PathBuf::from("/data/preprocessed_graphs/2019_1-0_1-0_-1.json")
        );
        assert_eq!(
            layout.clustering(&config),
            PathBuf::from("/data/cluster_results/2019_1-0_1-0_-1_s3.json")
        );
        assert_eq!(
            layout.families(&config),
            PathBuf::from("/data/evolution_graphs/all_1-0_1-0_-1_s3.families.json")
        );
    }

    #[test]
    fn list_dir_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.json", "a.json", "c.csv"] {
            fs::write(dir.path().join(name), "{}").unwrap();
        }
        assert_eq!(list_dir(dir.path(), ".json").unwrap(), vec!["a.json", "b.json"]);
        assert!(list_dir(&dir.path().join("none"), ".json").unwrap().is_empty());
    }
}
