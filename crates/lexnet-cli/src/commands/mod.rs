//! CLI command implementations.

pub mod cluster;
pub mod decode;
pub mod evolution;
pub mod evolution_mappings;
pub mod init;
pub mod preprocess;

use anyhow::{bail, Result};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

use lexnet_pipeline::sweep::SweepReport;

/// Progress bar over `len` units.
pub(crate) fn progress_bar(len: usize, unit: &str) -> Result<ProgressBar> {
    let pb = ProgressBar::new(len as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(&format!("{{spinner:.green}} [{{bar:40.cyan/blue}}] {{pos}}/{{len}} {unit}"))?
            .progress_chars("#>-"),
    );
    Ok(pb)
}

/// Print failures and fail the command if any unit failed.
pub(crate) fn finish<T>(stage: &str, report: &SweepReport<T>) -> Result<()> {
    println!();
    if report.is_clean() {
        println!(
            "{} {} complete: {} units",
            "✓".green().bold(),
            stage,
            report.total().to_string().cyan()
        );
        return Ok(());
    }
    for failure in &report.failed {
        println!("  {} {}: {}", "✗".red(), failure.unit, failure.error);
    }
    bail!(
        "{stage}: {} of {} units failed",
        report.failed.len(),
        report.total()
    )
}

/// Note that a stage had nothing to do.
pub(crate) fn nothing_to_do(stage: &str) {
    println!(
        "{} {}: every output exists (set {} to recompute)",
        "•".yellow(),
        stage,
        "run.overwrite".cyan()
    );
}
