use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::batch::BatchOptions;

/// Global configuration loaded from `~/.config/tablerest/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TablerestConfig {
    /// Resource names the store accepts in addition to any seeded ones.
    #[serde(default)]
    pub resources: Vec<String>,
    /// Batch execution defaults (concurrency cap, debug tracing, atomic commit).
    #[serde(default)]
    pub batch: BatchOptions,
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("tablerest")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<TablerestConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = TablerestConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    load_from_path(&path)
}

/// Load configuration from an explicit file.
pub fn load_from_path(path: &Path) -> Result<TablerestConfig> {
    let data = fs::read_to_string(path)?;
    let cfg: TablerestConfig = toml::from_str(&data)?;
    Ok(cfg)
}
