//! Reduce raw graphs and augment them with sequence and co-occurrence edges.

use anyhow::{Context, Result};
use colored::Colorize;

use lexnet_pipeline::cooccurrence::DecisionNetworkCache;
use lexnet_pipeline::stages;
use lexnet_pipeline::sweep::{filter_selected, run_sweep};

use crate::config::Config;

pub fn run() -> Result<()> {
    let config = Config::load()?;
    let layout = config.layout();
    let snapshots = config.snapshots(&layout)?;
    layout.ensure_output_dirs()?;

    let units = stages::prepare_preprocessing(&layout, &config.sweep.space, &snapshots, config.run.overwrite)
        .context("Failed to prepare preprocessing")?;
    let units = filter_selected(units, &config.run.selected, |c| c.stem());
    if units.is_empty() {
        super::nothing_to_do("preprocess");
        return Ok(());
    }

    println!(
        "{} Preprocessing {} graphs...",
        "→".blue(),
        units.len().to_string().cyan()
    );

    let cache = DecisionNetworkCache::default();
    let pb = super::progress_bar(units.len(), "graphs")?;
    let report = run_sweep(&units, config.run.parallel, |unit| {
        let outcome = stages::run_preprocessing(&layout, unit, &cache);
        pb.inc(1);
        outcome
    });
    pb.finish_with_message("done");

    for (unit, summary) in &report.succeeded {
        let missing = match summary.missing_citekeys {
            Some(0) | None => String::new(),
            Some(n) => format!(", {} unmatched citekeys", n.to_string().yellow()),
        };
        println!(
            "  {} {}: {} nodes, {} edges{}",
            "✓".green(),
            unit,
            summary.nodes.to_string().cyan(),
            summary.edges.to_string().cyan(),
            missing
        );
    }
    super::finish("preprocess", &report)
}
