//! Cluster preprocessed graphs.

use anyhow::{Context, Result};
use colored::Colorize;

use lexnet_pipeline::stages;
use lexnet_pipeline::sweep::{filter_selected, run_sweep};

use crate::config::Config;

pub fn run() -> Result<()> {
    let config = Config::load()?;
    let layout = config.layout();
    let snapshots = config.snapshots(&layout)?;
    layout.ensure_output_dirs()?;

    let units = stages::prepare_clustering(&layout, &config.sweep.space, &snapshots, config.run.overwrite)
        .context("Failed to prepare clustering")?;
    let units = filter_selected(units, &config.run.selected, |c| c.stem());
    if units.is_empty() {
        super::nothing_to_do("cluster");
        return Ok(());
    }

    println!(
        "{} Clustering {} configurations...",
        "→".blue(),
        units.len().to_string().cyan()
    );

    let pb = super::progress_bar(units.len(), "partitions")?;
    let report = run_sweep(&units, config.run.parallel, |unit| {
        let outcome = stages::run_clustering(&layout, unit);
        pb.inc(1);
        outcome
    });
    pb.finish_with_message("done");

    for (unit, clustering) in &report.succeeded {
        println!(
            "  {} {}: {} communities ({}, coverage {:.2})",
            "✓".green(),
            unit,
            clustering.len().to_string().cyan(),
            clustering.algorithm,
            clustering.coverage
        );
    }
    super::finish("cluster", &report)
}
