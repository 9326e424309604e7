//! Link per-snapshot partitions into evolution graphs.

use anyhow::{Context, Result};
use colored::Colorize;

use lexnet_pipeline::stages;
use lexnet_pipeline::sweep::{filter_selected, run_sweep};

use crate::config::Config;

pub fn run() -> Result<()> {
    let config = Config::load()?;
    let layout = config.layout();
    layout.ensure_output_dirs()?;

    let units = stages::prepare_evolution(&layout, &config.sweep.space, config.run.overwrite)
        .context("Failed to prepare evolution graphs")?;
    let units = filter_selected(units, &config.run.selected, |c| c.with_snapshot("all").stem());
    if units.is_empty() {
        super::nothing_to_do("evolution");
        return Ok(());
    }

    println!(
        "{} Building {} evolution graphs...",
        "→".blue(),
        units.len().to_string().cyan()
    );

    let pb = super::progress_bar(units.len(), "graphs")?;
    let report = run_sweep(&units, config.run.parallel, |unit| {
        let outcome = stages::run_evolution(&layout, unit);
        pb.inc(1);
        outcome
    });
    pb.finish_with_message("done");

    for (unit, summary) in &report.succeeded {
        println!(
            "  {} all{}: {} snapshots, {} nodes, {} edges, {} families",
            "✓".green(),
            unit,
            summary.snapshots.to_string().cyan(),
            summary.nodes.to_string().cyan(),
            summary.edges.to_string().cyan(),
            summary.families.to_string().cyan()
        );
        if !summary.diagnostics.is_empty() {
            println!(
                "    {} {} mapping entries could not be resolved",
                "•".yellow(),
                summary.diagnostics.len()
            );
        }
    }
    super::finish("evolution", &report)
}
