// src/cache/mod.rs
use anyhow::Result;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::dataset::{Dataset, DatasetLoader, FileFailure};
use crate::record::AccidentTable;

pub mod memo;
pub mod snapshot;

pub use memo::Memo;
pub use snapshot::SnapshotCache;

/// Two-level cached access to the datasets:
///
/// 1. an in-process [`Memo`], only emptied by [`clear_cache`](Self::clear_cache);
/// 2. the on-disk [`SnapshotCache`], which expires by file age.
///
/// A miss on both reloads from the source files through the
/// [`DatasetLoader`]. Because the memo never expires, a long-lived process
/// keeps serving what it first saw until the cache is cleared.
pub struct CachedDatasets {
    loader: DatasetLoader,
    snapshots: SnapshotCache,
    memo: Mutex<Memo<Dataset, Arc<AccidentTable>>>,
}

impl CachedDatasets {
    pub fn new(config: Config) -> Result<Self> {
        let snapshots = SnapshotCache::new(&config.cache_dir, config.freshness_window())?;
        let memo_capacity = config.memo_capacity;
        Ok(Self::from_parts(
            DatasetLoader::new(config),
            snapshots,
            memo_capacity,
        ))
    }

    pub fn from_parts(loader: DatasetLoader, snapshots: SnapshotCache, memo_capacity: usize) -> Self {
        Self {
            loader,
            snapshots,
            memo: Mutex::new(Memo::new(memo_capacity)),
        }
    }

    pub fn loader(&self) -> &DatasetLoader {
        &self.loader
    }

    pub fn snapshots(&self) -> &SnapshotCache {
        &self.snapshots
    }

    /// Uncached load straight from the source files.
    pub fn load(&self, dataset: Dataset) -> AccidentTable {
        self.loader.load(dataset)
    }

    /// Memo, then fresh snapshot, then a reload from source (which also
    /// refreshes the snapshot when at least one file loaded). Snapshot I/O
    /// problems are logged and fall through to the next level.
    pub fn get_cached(&self, dataset: Dataset) -> Arc<AccidentTable> {
        if let Some(table) = self.memo().get(&dataset) {
            debug!(dataset = %dataset, "memo hit");
            return table;
        }

        let table = match self.snapshots.read(dataset) {
            Ok(Some(table)) => table,
            Ok(None) => self.reload(dataset),
            Err(e) => {
                warn!(dataset = %dataset, "unreadable snapshot, reloading: {:#}", e);
                self.reload(dataset)
            }
        };

        let table = Arc::new(table);
        self.memo().insert(dataset, Arc::clone(&table));
        table
    }

    /// Reload `dataset` from source whatever the cache holds, rewrite its
    /// snapshot when at least one file loaded, and memoize the result.
    /// Returns the table together with the files that were skipped.
    pub fn refresh(&self, dataset: Dataset) -> Result<(Arc<AccidentTable>, Vec<FileFailure>)> {
        let report = self.loader.load_with_report(dataset);
        if report.files_loaded > 0 {
            self.snapshots.write(dataset, &report.table)?;
        }
        let table = Arc::new(report.table);
        self.memo().insert(dataset, Arc::clone(&table));
        Ok((table, report.failures))
    }

    /// Drop every snapshot and empty the memo.
    pub fn clear_cache(&self) -> Result<()> {
        self.memo().clear();
        let removed = self.snapshots.clear()?;
        info!(removed, "cache cleared");
        Ok(())
    }

    fn reload(&self, dataset: Dataset) -> AccidentTable {
        let report = self.loader.load_with_report(dataset);
        if report.files_loaded > 0 {
            if let Err(e) = self.snapshots.write(dataset, &report.table) {
                warn!(dataset = %dataset, "failed to write snapshot: {:#}", e);
            }
        }
        report.table
    }

    fn memo(&self) -> MutexGuard<'_, Memo<Dataset, Arc<AccidentTable>>> {
        self.memo.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DatasetConfig, SourceRule};
    use crate::normalize::SourceShape;
    use crate::read::SourceFormat;
    use std::{fs, path::Path};
    use tempfile::tempdir;

    fn config(root: &Path) -> Config {
        let mut cfg = Config {
            data_root: root.join("data"),
            cache_dir: root.join("cache"),
            ..Config::default()
        };
        cfg.datasets.cargo = DatasetConfig {
            dir: "cargo".into(),
            sources: vec![SourceRule::new(SourceFormat::Csv, SourceShape::CargoWide)],
        };
        cfg
    }

    fn write_cargo(root: &Path, body: &str) {
        let dir = root.join("data").join("cargo");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("시도별_2019.csv"), body).unwrap();
    }

    #[test]
    fn first_access_loads_and_snapshots() {
        let tmp = tempdir().unwrap();
        write_cargo(tmp.path(), "시도,발생건수\n서울,10\n");
        let cached = CachedDatasets::new(config(tmp.path())).unwrap();

        let table = cached.get_cached(Dataset::Cargo);
        assert_eq!(table.len(), 1);
        assert_eq!(
            cached.snapshots().read(Dataset::Cargo).unwrap().as_ref(),
            Some(table.as_ref())
        );
    }

    #[test]
    fn memo_serves_stale_data_until_cleared() {
        let tmp = tempdir().unwrap();
        write_cargo(tmp.path(), "시도,발생건수\n서울,10\n");
        let cached = CachedDatasets::new(config(tmp.path())).unwrap();
        let first = cached.get_cached(Dataset::Cargo);

        // source changes and the snapshot disappears; memo still answers
        write_cargo(tmp.path(), "시도,발생건수\n서울,10\n부산,20\n");
        fs::remove_file(cached.snapshots().snapshot_path(Dataset::Cargo)).unwrap();
        let second = cached.get_cached(Dataset::Cargo);
        assert!(Arc::ptr_eq(&first, &second));

        cached.clear_cache().unwrap();
        assert_eq!(cached.get_cached(Dataset::Cargo).len(), 2);
    }

    #[test]
    fn fresh_snapshot_is_preferred_over_source() {
        let tmp = tempdir().unwrap();
        write_cargo(tmp.path(), "시도,발생건수\n서울,10\n");
        let cfg = config(tmp.path());
        {
            let cached = CachedDatasets::new(cfg.clone()).unwrap();
            cached.get_cached(Dataset::Cargo);
        }

        // a new process sees the snapshot, not the edited source
        write_cargo(tmp.path(), "시도,발생건수\n서울,10\n부산,20\n");
        let cached = CachedDatasets::new(cfg).unwrap();
        assert_eq!(cached.get_cached(Dataset::Cargo).len(), 1);
        assert_eq!(cached.load(Dataset::Cargo).len(), 2);
    }

    #[test]
    fn clear_cache_makes_every_read_miss() {
        let tmp = tempdir().unwrap();
        write_cargo(tmp.path(), "시도,발생건수\n서울,10\n");
        let cached = CachedDatasets::new(config(tmp.path())).unwrap();
        for d in Dataset::ALL {
            cached
                .snapshots()
                .write(d, &cached.get_cached(d))
                .unwrap();
        }

        cached.clear_cache().unwrap();
        for d in Dataset::ALL {
            assert_eq!(cached.snapshots().read(d).unwrap(), None);
        }
    }

    #[test]
    fn refresh_memoizes_without_a_second_load() {
        let tmp = tempdir().unwrap();
        write_cargo(tmp.path(), "시도,발생건수\n서울,10\n");
        let cached = CachedDatasets::new(config(tmp.path())).unwrap();

        let (cargo, failures) = cached.refresh(Dataset::Cargo).unwrap();
        assert!(failures.is_empty());
        assert!(cached.snapshots().read(Dataset::Cargo).unwrap().is_some());
        assert!(Arc::ptr_eq(&cargo, &cached.get_cached(Dataset::Cargo)));

        // nothing on disk for vehicle: no snapshot, but the empty result is
        // still served from the memo
        let (vehicle, _) = cached.refresh(Dataset::Vehicle).unwrap();
        assert!(vehicle.is_empty());
        assert_eq!(cached.snapshots().read(Dataset::Vehicle).unwrap(), None);
        assert!(Arc::ptr_eq(&vehicle, &cached.get_cached(Dataset::Vehicle)));
    }

    #[test]
    fn refresh_bypasses_the_memo() {
        let tmp = tempdir().unwrap();
        write_cargo(tmp.path(), "시도,발생건수\n서울,10\n");
        let cached = CachedDatasets::new(config(tmp.path())).unwrap();
        assert_eq!(cached.get_cached(Dataset::Cargo).len(), 1);

        write_cargo(tmp.path(), "시도,발생건수\n서울,10\n부산,20\n");
        let (table, _) = cached.refresh(Dataset::Cargo).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(cached.get_cached(Dataset::Cargo).len(), 2);
        assert_eq!(cached.snapshots().read(Dataset::Cargo).unwrap().unwrap().len(), 2);
    }

    #[test]
    fn empty_dataset_is_not_snapshotted() {
        let tmp = tempdir().unwrap();
        let cached = CachedDatasets::new(config(tmp.path())).unwrap();
        assert!(cached.get_cached(Dataset::Vehicle).is_empty());
        assert_eq!(cached.snapshots().read(Dataset::Vehicle).unwrap(), None);
    }
}
