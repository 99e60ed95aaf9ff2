//! `tablerest config` – show where the config lives and what it resolves to.

use anyhow::Result;
use std::path::Path;
use tablerest_core::config::TablerestConfig;

pub fn run_show_config(cfg: &TablerestConfig, path: &Path) -> Result<()> {
    println!("# {}", path.display());
    print!("{}", toml::to_string_pretty(cfg)?);
    Ok(())
}
