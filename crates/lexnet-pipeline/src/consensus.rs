//! Consensus clustering over repeated seeded runs.

use petgraph::unionfind::UnionFind;
use serde_json::json;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info};

use lexnet_core::error::{LexnetError, Result};

use crate::clustering::{cluster, ClusterParams, Clustering, WeightedNetwork};

/// Seed distance between consecutive runs.
pub const SEED_STRIDE: u64 = 10_000;

/// Minimum number of runs, out of `n_runs`, that must agree on a pair:
/// `ceil(0.95 * n_runs)`.
pub fn agreement_threshold(n_runs: u32) -> u32 {
    (95 * n_runs + 99) / 100
}

/// Merge the partitions of several runs over `keys`.
///
/// Two nodes are linked when they share a community in at least
/// `agreement_threshold(runs.len())` runs. The result is the connected
/// components of that graph, largest first, ties broken by smallest key.
pub fn consensus_partition(keys: &[String], runs: &[Vec<Vec<String>>]) -> Result<Vec<Vec<String>>> {
    let index: HashMap<&str, usize> = keys.iter().enumerate().map(|(i, k)| (k.as_str(), i)).collect();
    let mut together: HashMap<(usize, usize), u32> = HashMap::new();
    for communities in runs {
        for community in communities {
            let members = community
                .iter()
                .map(|k| {
                    index
                        .get(k.as_str())
                        .copied()
                        .ok_or_else(|| LexnetError::node_not_found(k.clone()))
                })
                .collect::<Result<Vec<usize>>>()?;
            for (i, &a) in members.iter().enumerate() {
                for &b in &members[i + 1..] {
                    *together.entry((a.min(b), a.max(b))).or_insert(0) += 1;
                }
            }
        }
    }

    let threshold = agreement_threshold(runs.len() as u32);
    let mut components = UnionFind::new(keys.len());
    for (&(a, b), &count) in &together {
        if count >= threshold {
            components.union(a, b);
        }
    }

    let mut grouped: BTreeMap<usize, Vec<String>> = BTreeMap::new();
    for (i, key) in keys.iter().enumerate() {
        grouped.entry(components.find(i)).or_default().push(key.clone());
    }
    let mut out: Vec<Vec<String>> = grouped.into_values().collect();
    for members in out.iter_mut() {
        members.sort();
    }
    out.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a[0].cmp(&b[0])));
    Ok(out)
}

/// Run `params.method` `n_runs` times with seeds `base + i * 10000` and
/// merge the runs with [`consensus_partition`].
pub fn consensus_clustering(
    network: &WeightedNetwork,
    params: &ClusterParams,
    n_runs: u32,
) -> Result<Clustering> {
    if n_runs == 0 {
        return Err(LexnetError::invalid_config(
            "consensus",
            "0",
            "needs at least one run",
        ));
    }
    let base = params.seed.unwrap_or(0);
    let mut runs = Vec::with_capacity(n_runs as usize);
    for i in 0..u64::from(n_runs) {
        let run = cluster(network, &params.with_seed(base + i * SEED_STRIDE), false)?;
        debug!(run = i, communities = run.len(), "consensus run finished");
        runs.push(run.communities);
    }

    let communities = consensus_partition(&network.keys, &runs)?;
    info!(
        runs = n_runs,
        communities = communities.len(),
        "consensus clustering finished"
    );
    Ok(Clustering {
        communities,
        algorithm: format!("{}-consensus", params.method),
        params: json!({
            "method": params.method.as_str(),
            "runs": n_runs,
            "base_seed": base,
            "seed_stride": SEED_STRIDE,
            "agreement_threshold": agreement_threshold(n_runs),
            "markov_time": params.markov_time,
            "preferred_number_of_modules": params.number_of_modules,
        }),
        overlap: false,
        coverage: 1.0,
        tree: None,
    })
}
