//! `tablerest batch` – run a batch file through the phase-synced executor.

use anyhow::{Context, Result};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tablerest_core::batch::{self, BatchOp, BatchOptions};
use tablerest_core::config::TablerestConfig;
use tablerest_core::settle::Settled;
use tablerest_core::store::MemoryStore;

#[derive(Debug, Clone)]
pub struct BatchArgs {
    pub file: PathBuf,
    pub concurrency: Option<usize>,
    pub debug: bool,
    pub no_atomic: bool,
    pub seed: Option<PathBuf>,
}

pub async fn run_batch_file(cfg: &TablerestConfig, args: &BatchArgs) -> Result<()> {
    let outcomes = execute(cfg, args).await?;
    println!("{}", serde_json::to_string_pretty(&outcomes)?);
    Ok(())
}

/// Run the batch and render rejection reasons as strings.
pub(crate) async fn execute(
    cfg: &TablerestConfig,
    args: &BatchArgs,
) -> Result<Vec<Settled<Value, String>>> {
    let ops = read_ops(&args.file)?;
    let store = MemoryStore::new(cfg.resources.iter().cloned());
    if let Some(seed_path) = &args.seed {
        for (resource, records) in read_seed(seed_path)? {
            store
                .seed(&resource, records)
                .await
                .with_context(|| format!("seed {}", resource))?;
        }
    }

    let options = effective_options(&cfg.batch, args);
    let outcomes = batch::run_batch(Arc::new(store), ops, options).await;
    Ok(outcomes
        .into_iter()
        .map(|o| o.map_reason(|reason| reason.to_string()))
        .collect())
}

/// Config-file defaults overridden by command-line flags.
pub(crate) fn effective_options(defaults: &BatchOptions, args: &BatchArgs) -> BatchOptions {
    BatchOptions {
        concurrency: args.concurrency.unwrap_or(defaults.concurrency).max(1),
        debug: defaults.debug || args.debug,
        atomic: defaults.atomic && !args.no_atomic,
    }
}

fn read_ops(path: &Path) -> Result<Vec<BatchOp>> {
    let data = std::fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    serde_json::from_str(&data).with_context(|| format!("parse {}", path.display()))
}

fn read_seed(path: &Path) -> Result<BTreeMap<String, Vec<Value>>> {
    let data = std::fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    serde_json::from_str(&data).with_context(|| format!("parse {}", path.display()))
}
