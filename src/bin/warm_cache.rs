//! Rebuild the dataset snapshots ahead of dashboard start-up.
//!
//! Usage: `warm_cache [--clear] [dataset...]`. With no datasets, all three
//! are warmed. The config file is taken from `TRUCKSTAT_CONFIG`.

use anyhow::{Context, Result};
use std::{env, time::Instant};
use tracing::{info, warn};
use truckstat::{logging, summary::KeyMetrics, CachedDatasets, Config, Dataset};

fn main() -> Result<()> {
    logging::init();

    let mut clear = false;
    let mut datasets = Vec::new();
    for arg in env::args().skip(1) {
        if arg == "--clear" {
            clear = true;
        } else {
            datasets.push(arg.parse::<Dataset>()?);
        }
    }
    if datasets.is_empty() {
        datasets.extend(Dataset::ALL);
    }

    let config = Config::from_env().context("loading config")?;
    info!(
        data_root = %config.data_root.display(),
        cache_dir = %config.cache_dir.display(),
        "startup"
    );
    let cached = CachedDatasets::new(config)?;

    if clear {
        cached.clear_cache()?;
    }

    for dataset in datasets {
        let start = Instant::now();
        let (table, failures) = cached.refresh(dataset)?;
        if !failures.is_empty() {
            warn!(dataset = %dataset, failed = failures.len(), "some source files were skipped");
        }

        match KeyMetrics::from_table(&table) {
            Some(m) => info!(
                dataset = %dataset,
                rows = table.len(),
                total = m.total,
                mean = m.mean,
                elapsed = ?start.elapsed(),
                "warmed"
            ),
            None => info!(dataset = %dataset, rows = table.len(), elapsed = ?start.elapsed(), "warmed (no accident rows)"),
        }
    }

    Ok(())
}
