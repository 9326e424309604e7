//! Decode a configuration filename.

use anyhow::{Context, Result};
use colored::Colorize;

use lexnet_core::config::RunConfig;

fn show<T: ToString>(value: Option<T>) -> String {
    value.map_or_else(|| "-".dimmed().to_string(), |v| v.to_string().cyan().to_string())
}

pub fn run(filename: &str) -> Result<()> {
    let config = RunConfig::from_filename(filename)
        .with_context(|| format!("Failed to decode {filename}"))?;

    println!("{}", filename.white().bold());
    println!("  snapshot:           {}", config.snapshot.cyan());
    println!("  pp_ratio:           {}", config.pp_ratio.to_string().cyan());
    println!("  pp_decay:           {}", config.pp_decay.to_string().cyan());
    println!("  pp_merge:           {}", config.pp_merge.to_string().cyan());
    println!("  pp_co_occurrence:   {}", show(config.pp_co_occurrence));
    println!("  co_occurrence_type: {}", show(config.pp_co_occurrence_type.map(|t| t.as_str())));
    println!("  method:             {}", show(config.method.map(|m| m.as_str())));
    println!("  number_of_modules:  {}", show(config.number_of_modules));
    println!("  markov_time:        {}", show(config.markov_time));
    println!("  seed:               {}", show(config.seed));
    println!("  consensus:          {}", config.consensus.to_string().cyan());

    Ok(())
}
