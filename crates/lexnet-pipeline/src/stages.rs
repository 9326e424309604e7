//! Pipeline stages over the artifact layout.
//!
//! Each stage has a `prepare_*` function that expands the sweep into units
//! of work, checks that every input exists (reporting all missing files at
//! once) and drops units whose output exists unless `overwrite` is set, and
//! a `run_*` function that processes one unit.

use std::collections::{BTreeSet, HashSet};
use tracing::{info, warn};

use lexnet_core::config::{ConfigSpace, RunConfig};
use lexnet_core::error::{ConfigError, LexnetError, Result};

use crate::clustering::{cluster, compile_source_graph, ClusterParams, Clustering};
use crate::consensus::consensus_clustering;
use crate::cooccurrence::{preprocess, DecisionNetworkCache};
use crate::evolution::{cluster_families, EvolutionBuilder, MappingDiagnostic, FAMILY_THRESHOLD};
use crate::snapshot_index::SnapshotIndex;
use crate::storage::{self, list_dir, DataLayout};

fn keep_missing_outputs<T>(
    units: Vec<T>,
    overwrite: bool,
    output: impl Fn(&T) -> std::path::PathBuf,
) -> Vec<T> {
    if overwrite {
        return units;
    }
    units.into_iter().filter(|u| !output(u).exists()).collect()
}

/// Preprocessing units: distinct upstream configurations per snapshot.
pub fn prepare_preprocessing(
    layout: &DataLayout,
    space: &ConfigSpace,
    snapshots: &[String],
    overwrite: bool,
) -> Result<Vec<RunConfig>> {
    space.validate()?;
    let configs = space.preprocessing_configs(snapshots);

    let mut missing: Vec<String> = configs
        .iter()
        .map(|c| layout.raw_graph(&c.snapshot))
        .filter(|p| !p.exists())
        .map(|p| p.display().to_string())
        .collect();
    if configs.iter().any(RunConfig::uses_co_occurrence) {
        match &layout.decision_network {
            Some(path) if path.exists() => {}
            Some(path) => missing.push(path.display().to_string()),
            None => missing.push("paths.decision_network".to_string()),
        }
    }
    if !missing.is_empty() {
        return Err(LexnetError::missing("source graphs", missing));
    }

    Ok(keep_missing_outputs(configs, overwrite, |c| {
        layout.preprocessed_graph(c)
    }))
}

#[derive(Debug, Clone, PartialEq)]
pub struct PreprocessSummary {
    pub nodes: usize,
    pub edges: usize,
    /// Unmatched citekeys, if the co-occurrence stage ran.
    pub missing_citekeys: Option<usize>,
}

/// Reduce and augment the raw graph of one configuration.
pub fn run_preprocessing(
    layout: &DataLayout,
    config: &RunConfig,
    cache: &DecisionNetworkCache,
) -> Result<PreprocessSummary> {
    let raw = storage::read_graph(&layout.raw_graph(&config.snapshot))?;
    let network = if config.uses_co_occurrence() {
        let path = layout.decision_network.as_ref().ok_or_else(|| {
            LexnetError::missing("decision network", vec!["paths.decision_network".to_string()])
        })?;
        Some(cache.get_or_load(path)?)
    } else {
        None
    };

    let out = preprocess(&raw, config, network.as_deref())?;
    let missing_citekeys = match &out.co_occurrence {
        Some(report) => {
            storage::write_missing_nodes(&layout.missing_nodes_csv(config), &report.missing)?;
            Some(report.missing.len())
        }
        None => None,
    };
    storage::write_graph(&layout.preprocessed_graph(config), &out.graph)?;

    info!(
        config = %config.preprocessing_projection(),
        nodes = out.graph.node_count(),
        edges = out.graph.edge_count(),
        "preprocessed graph"
    );
    Ok(PreprocessSummary {
        nodes: out.graph.node_count(),
        edges: out.graph.edge_count(),
        missing_citekeys,
    })
}

/// Clustering units: the full product, every one with a method.
pub fn prepare_clustering(
    layout: &DataLayout,
    space: &ConfigSpace,
    snapshots: &[String],
    overwrite: bool,
) -> Result<Vec<RunConfig>> {
    space.validate()?;
    let configs = space.expand(snapshots);
    if configs.iter().any(|c| c.method.is_none()) {
        return Err(ConfigError::MissingField("methods".into()).into());
    }

    let missing: BTreeSet<String> = configs
        .iter()
        .map(|c| layout.preprocessed_graph(c))
        .filter(|p| !p.exists())
        .filter_map(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
        .collect();
    if !missing.is_empty() {
        return Err(LexnetError::missing("source preprocessed graphs", missing));
    }

    Ok(keep_missing_outputs(configs, overwrite, |c| layout.clustering(c)))
}

/// Cluster one configuration and persist the partition and its tree.
pub fn run_clustering(layout: &DataLayout, config: &RunConfig) -> Result<Clustering> {
    let params = ClusterParams::from_config(config)?;
    let graph = storage::read_graph(&layout.preprocessed_graph(config))?;
    let network = compile_source_graph(&graph, params.method);

    let clustering = if config.consensus > 0 {
        consensus_clustering(&network, &params, config.consensus)?
    } else {
        cluster(&network, &params, true)?
    };

    storage::write_clustering(&layout.clustering(config), &clustering)?;
    if let Some(tree) = &clustering.tree {
        storage::write_tree(&layout.cluster_tree(config), tree)?;
    }
    info!(
        config = %config,
        communities = clustering.len(),
        coverage = clustering.coverage,
        "clustered graph"
    );
    Ok(clustering)
}

/// Snapshot index units: `(snapshot, pp_merge)` for every snapshot with
/// tables. An empty `snapshots` selects all of them.
pub fn prepare_snapshot_indexes(
    layout: &DataLayout,
    pp_merges: &[i64],
    snapshots: &[String],
    overwrite: bool,
) -> Result<Vec<(String, i64)>> {
    let mut available: Vec<String> = list_dir(&layout.snapshot_tables, ".edges.csv")?
        .into_iter()
        .filter_map(|name| name.split('.').next().map(str::to_string))
        .collect();
    if !snapshots.is_empty() {
        available.retain(|s| snapshots.contains(s));
    }

    let mut units: Vec<(String, i64)> = pp_merges
        .iter()
        .flat_map(|&m| available.iter().map(move |s| (s.clone(), m)))
        .collect();
    units.sort();
    Ok(keep_missing_outputs(units, overwrite, |(s, m)| {
        layout.snapshot_index(s, *m)
    }))
}

/// The preprocessed graph without co-occurrence edges for `snapshot` and
/// `pp_merge`. With several candidates the first by name is taken.
fn reduced_graph_for(layout: &DataLayout, snapshot: &str, pp_merge: i64) -> Result<std::path::PathBuf> {
    let candidates: Vec<String> = list_dir(&layout.preprocessed_graphs, ".json")?
        .into_iter()
        .filter(|name| {
            RunConfig::from_filename(name).map_or(false, |c| {
                c.snapshot == snapshot
                    && c.pp_merge == pp_merge
                    && c.pp_co_occurrence.is_none()
                    && c.method.is_none()
            })
        })
        .collect();
    match candidates.as_slice() {
        [] => Err(LexnetError::missing(
            "preprocessed graphs",
            vec![format!("{snapshot}_*_*_{pp_merge}.json")],
        )),
        [only] => Ok(layout.preprocessed_graphs.join(only)),
        [first, ..] => {
            warn!(snapshot, pp_merge, taken = %first, "multiple preprocessed graphs match");
            Ok(layout.preprocessed_graphs.join(first))
        }
    }
}

/// Build and persist the snapshot index of one snapshot.
pub fn run_snapshot_index(layout: &DataLayout, snapshot: &str, pp_merge: i64) -> Result<SnapshotIndex> {
    let graph = storage::read_graph(&reduced_graph_for(layout, snapshot, pp_merge)?)?;
    let reduced: HashSet<&str> = graph.keys().collect();
    let nodes = storage::read_node_table(&layout.node_table(snapshot))?;
    let edges = storage::read_edge_table(&layout.edge_table(snapshot))?;
    let index = SnapshotIndex::build(&nodes, &edges, &reduced)?;
    storage::write_snapshot_index(&layout.snapshot_index(snapshot, pp_merge), &index)?;
    info!(snapshot, pp_merge, nodes = reduced.len(), "built snapshot index");
    Ok(index)
}

/// Snapshots with a partition for `config`, ascending.
///
/// Files are matched by their encoded identity, so parameters the filename
/// leaves out (zero markov time, a louvain module count) never hide them.
pub fn clustering_snapshots(layout: &DataLayout, config: &RunConfig) -> Result<Vec<String>> {
    let target = config.with_snapshot("").stem();
    let mut snapshots: Vec<String> = list_dir(&layout.cluster_results, ".json")?
        .into_iter()
        .filter(|name| !name.ends_with(".tree.json"))
        .filter_map(|name| RunConfig::from_filename(&name).ok())
        .filter(|c| c.with_snapshot("").stem() == target)
        .map(|c| c.snapshot)
        .collect();
    snapshots.sort();
    snapshots.dedup();
    Ok(snapshots)
}

/// Evolution units: snapshot-less configurations with their inputs present.
///
/// Configurations without any partition yet are skipped with a warning.
pub fn prepare_evolution(layout: &DataLayout, space: &ConfigSpace, overwrite: bool) -> Result<Vec<RunConfig>> {
    space.validate()?;
    let mut configs = Vec::new();
    let mut missing = BTreeSet::new();
    for config in space.expand_all() {
        let snapshots = clustering_snapshots(layout, &config)?;
        if snapshots.is_empty() {
            warn!(config = %config.with_snapshot("all"), "no clusterings, skipping");
            continue;
        }
        for pair in snapshots.windows(2) {
            let path = layout.leaf_mapping(&pair[0], &pair[1]);
            if !path.exists() {
                missing.insert(path.display().to_string());
            }
        }
        for snapshot in &snapshots {
            let path = layout.snapshot_index(snapshot, config.pp_merge);
            if !path.exists() {
                missing.insert(path.display().to_string());
            }
        }
        configs.push(config);
    }
    if !missing.is_empty() {
        return Err(LexnetError::missing("mappings", missing));
    }

    Ok(keep_missing_outputs(configs, overwrite, |c| {
        layout.evolution_graph(c)
    }))
}

#[derive(Debug, Clone)]
pub struct EvolutionSummary {
    pub snapshots: usize,
    pub nodes: usize,
    pub edges: usize,
    pub families: usize,
    pub diagnostics: Vec<MappingDiagnostic>,
}

/// Fold every snapshot of `config` into an evolution graph and persist it
/// together with its cluster families.
pub fn run_evolution(layout: &DataLayout, config: &RunConfig) -> Result<EvolutionSummary> {
    let snapshots = clustering_snapshots(layout, config)?;
    if snapshots.is_empty() {
        return Err(LexnetError::missing(
            "clusterings",
            [layout.clustering(&config.with_snapshot("*")).display().to_string()],
        ));
    }
    let mut builder = EvolutionBuilder::new();
    let mut previous: Option<&String> = None;
    for snapshot in &snapshots {
        let clustering = storage::read_clustering(&layout.clustering(&config.with_snapshot(snapshot)))?;
        let index = storage::read_snapshot_index(&layout.snapshot_index(snapshot, config.pp_merge))?;
        let mapping = match previous {
            Some(prev) => Some(storage::read_leaf_mapping(&layout.leaf_mapping(prev, snapshot))?),
            None => None,
        };
        builder.add_snapshot(snapshot, &clustering, &index, mapping.as_ref())?;
        previous = Some(snapshot);
    }

    let (graph, diagnostics) = builder.finish();
    storage::write_evolution_graph(&layout.evolution_graph(config), &graph)?;
    let families = cluster_families(&graph, FAMILY_THRESHOLD);
    storage::write_families(&layout.families(config), &families)?;

    info!(
        config = %config.with_snapshot("all"),
        snapshots = snapshots.len(),
        families = families.len(),
        "built evolution graph"
    );
    Ok(EvolutionSummary {
        snapshots: snapshots.len(),
        nodes: graph.node_count(),
        edges: graph.edge_count(),
        families: families.len(),
        diagnostics,
    })
}
