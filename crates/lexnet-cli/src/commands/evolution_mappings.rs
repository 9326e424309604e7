//! Build snapshot indexes for the evolution stage.

use anyhow::{Context, Result};
use colored::Colorize;
use std::fmt;

use lexnet_pipeline::stages;
use lexnet_pipeline::sweep::{filter_selected, run_sweep};

use crate::config::Config;

struct IndexUnit {
    snapshot: String,
    pp_merge: i64,
}

impl fmt::Display for IndexUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.snapshot, self.pp_merge)
    }
}

pub fn run() -> Result<()> {
    let config = Config::load()?;
    let layout = config.layout();
    layout.ensure_output_dirs()?;

    let units: Vec<IndexUnit> = stages::prepare_snapshot_indexes(
        &layout,
        &config.sweep.space.pp_merges,
        &config.sweep.snapshots,
        config.run.overwrite,
    )
    .context("Failed to prepare snapshot indexes")?
    .into_iter()
    .map(|(snapshot, pp_merge)| IndexUnit { snapshot, pp_merge })
    .collect();
    let units = filter_selected(units, &config.run.selected, IndexUnit::to_string);
    if units.is_empty() {
        super::nothing_to_do("evolution-mappings");
        return Ok(());
    }

    println!(
        "{} Indexing {} snapshots...",
        "→".blue(),
        units.len().to_string().cyan()
    );

    let pb = super::progress_bar(units.len(), "indexes")?;
    let report = run_sweep(&units, config.run.parallel, |unit| {
        let outcome = stages::run_snapshot_index(&layout, &unit.snapshot, unit.pp_merge);
        pb.inc(1);
        outcome
    });
    pb.finish_with_message("done");

    for (unit, index) in &report.succeeded {
        println!(
            "  {} {}: {} nodes, {} seqitems",
            "✓".green(),
            unit,
            index.items_mapping.len().to_string().cyan(),
            index.seqitem_counts.values().sum::<u64>().to_string().cyan()
        );
    }
    super::finish("evolution-mappings", &report)
}
