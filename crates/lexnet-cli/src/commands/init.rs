//! Initialize a new LexNet project.

use anyhow::{Context, Result};
use colored::Colorize;
use std::path::PathBuf;

use crate::config::{Config, CONFIG_FILE};

pub fn run(path: Option<String>, print: bool) -> Result<()> {
    if print {
        print!("{}", Config::default_toml()?);
        return Ok(());
    }

    let base_path = match path {
        Some(p) => PathBuf::from(p),
        None => std::env::current_dir()?,
    };

    println!("{} Initializing LexNet project...", "→".blue());

    let config_path = base_path.join(CONFIG_FILE);
    if !config_path.exists() {
        std::fs::create_dir_all(&base_path)
            .with_context(|| format!("Failed to create {}", base_path.display()))?;
        Config::default().save(&config_path)?;
        println!("  {} Created {}", "✓".green(), config_path.display());
    } else {
        println!("  {} {} already exists", "•".yellow(), config_path.display());
    }

    let layout = Config::load_from(&config_path)?.layout();
    for dir in [&layout.crossreference_graphs, &layout.snapshot_tables, &layout.snapshot_mappings] {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
        println!("  {} Created {}", "✓".green(), dir.display());
    }
    layout.ensure_output_dirs()?;

    println!();
    println!("{} LexNet project initialized!", "✓".green().bold());
    println!();
    println!("Next steps:");
    println!("  {} place raw graphs in {}", "1.".blue(), layout.crossreference_graphs.display());
    println!("  {} lexnet preprocess", "2.".blue());
    println!("  {} lexnet cluster", "3.".blue());
    println!("  {} lexnet evolution-mappings && lexnet evolution", "4.".blue());

    Ok(())
}
