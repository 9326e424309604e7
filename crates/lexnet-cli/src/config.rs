//! Configuration management for the LexNet CLI.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use lexnet_core::config::ConfigSpace;
use lexnet_pipeline::storage::{list_dir, DataLayout};

pub const CONFIG_FILE: &str = "lexnet.toml";

/// LexNet project configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_paths")]
    pub paths: DataLayout,
    #[serde(default)]
    pub sweep: SweepConfig,
    #[serde(default)]
    pub run: RunOptions,

    /// Folder relative paths are resolved against.
    #[serde(skip)]
    root: PathBuf,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SweepConfig {
    /// Snapshots to process. Empty means every raw graph on disk.
    #[serde(default)]
    pub snapshots: Vec<String>,
    #[serde(flatten)]
    pub space: ConfigSpace,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunOptions {
    #[serde(default)]
    pub overwrite: bool,
    #[serde(default = "default_parallel")]
    pub parallel: bool,
    /// Substrings; only units whose name contains one of them run.
    #[serde(default)]
    pub selected: Vec<String>,
}

fn default_paths() -> DataLayout {
    DataLayout::under("data")
}
fn default_parallel() -> bool { true }

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            overwrite: false,
            parallel: default_parallel(),
            selected: Vec::new(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            paths: default_paths(),
            sweep: SweepConfig::default(),
            run: RunOptions::default(),
            root: PathBuf::new(),
        }
    }
}

impl Config {
    /// Load config from lexnet.toml in the current or parent directories.
    pub fn load() -> Result<Self> {
        match find_config_file() {
            Some(path) => Self::load_from(&path),
            None => {
                let mut config = Config::default();
                config.root = std::env::current_dir()?;
                Ok(config)
            }
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config: {}", path.display()))?;
        config.root = path.parent().map(Path::to_path_buf).unwrap_or_default();
        Ok(config)
    }

    /// Save config to the specified path.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = Self::to_toml(self)?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config: {}", path.display()))?;
        Ok(())
    }

    /// Generate default config as TOML string.
    pub fn default_toml() -> Result<String> {
        Self::to_toml(&Config::default())
    }

    fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize config")
    }

    /// Artifact folders with relative paths resolved.
    pub fn layout(&self) -> DataLayout {
        self.paths.rebased(&self.root)
    }

    /// Configured snapshots, or every raw graph in the layout.
    pub fn snapshots(&self, layout: &DataLayout) -> Result<Vec<String>> {
        if !self.sweep.snapshots.is_empty() {
            return Ok(self.sweep.snapshots.clone());
        }
        let names = list_dir(&layout.crossreference_graphs, ".json")?;
        Ok(names
            .into_iter()
            .filter_map(|n| n.strip_suffix(".json").map(str::to_string))
            .collect())
    }
}

/// Find lexnet.toml in current or parent directories.
fn find_config_file() -> Option<PathBuf> {
    let mut dir = std::env::current_dir().ok()?;
    loop {
        let config_path = dir.join(CONFIG_FILE);
        if config_path.exists() {
            return Some(config_path);
        }
        if !dir.pop() {
            break;
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use lexnet_core::config::Method;

    #[test]
    fn default_config_survives_toml() {
        let text = Config::default_toml().unwrap();
        let back: Config = toml::from_str(&text).unwrap();
        assert_eq!(back.sweep.space, ConfigSpace::default());
        assert_eq!(back.paths, default_paths());
        assert!(back.run.parallel);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(
            &path,
            "[sweep]\nsnapshots = [\"2019\"]\nmethods = [\"louvain\"]\npp_merges = [0, 50]\n\n\
             [run]\nselected = [\"2019\"]\n",
        )
        .unwrap();
        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.sweep.snapshots, vec!["2019"]);
        assert_eq!(config.sweep.space.methods, vec![Method::Louvain]);
        assert_eq!(config.sweep.space.pp_merges, vec![0, 50]);
        assert_eq!(config.sweep.space.pp_ratios, vec![1.0]);
        assert_eq!(
            config.layout().cluster_results,
            dir.path().join("data").join("cluster_results")
        );
    }

    #[test]
    fn snapshots_default_to_raw_graphs() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.root = dir.path().to_path_buf();
        let layout = config.layout();
        std::fs::create_dir_all(&layout.crossreference_graphs).unwrap();
        for name in ["2001.json", "2000.json", "notes.txt"] {
            std::fs::write(layout.crossreference_graphs.join(name), "{}").unwrap();
        }
        assert_eq!(config.snapshots(&layout).unwrap(), vec!["2000", "2001"]);
    }
}
