use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use glob::{glob, Pattern};
use parquet::{
    arrow::{arrow_reader::ParquetRecordBatchReaderBuilder, ArrowWriter},
    basic::Compression,
    file::properties::WriterProperties,
};
use std::{
    fs::{self, File},
    io::{BufWriter, ErrorKind},
    path::{Path, PathBuf},
    process,
    sync::atomic::{AtomicU64, Ordering},
};
use tracing::{debug, info, warn};

use crate::dataset::Dataset;
use crate::record::{columnar, AccidentTable};

static TMP_SEQ: AtomicU64 = AtomicU64::new(0);

/// One Parquet snapshot per dataset in `cache_dir`, named
/// `<dataset>_data.parquet`. The file's mtime is the only freshness signal.
#[derive(Debug, Clone)]
pub struct SnapshotCache {
    cache_dir: PathBuf,
    freshness: Duration,
}

impl SnapshotCache {
    /// Open the cache at `cache_dir`, creating the directory if needed.
    pub fn new(cache_dir: impl Into<PathBuf>, freshness: Duration) -> Result<Self> {
        let cache_dir = cache_dir.into();
        fs::create_dir_all(&cache_dir)
            .with_context(|| format!("creating cache directory {:?}", &cache_dir))?;
        Ok(Self {
            cache_dir,
            freshness,
        })
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    pub fn freshness(&self) -> Duration {
        self.freshness
    }

    pub fn snapshot_path(&self, dataset: Dataset) -> PathBuf {
        self.cache_dir.join(format!("{}_data.parquet", dataset.name()))
    }

    /// `true` if `path` exists and was written less than the freshness
    /// window before `now`.
    pub fn is_fresh(&self, path: &Path, now: DateTime<Utc>) -> Result<bool> {
        let meta = match fs::metadata(path) {
            Ok(m) => m,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e).with_context(|| format!("stat {}", path.display())),
        };
        let modified: DateTime<Utc> = meta
            .modified()
            .with_context(|| format!("reading mtime of {}", path.display()))?
            .into();
        Ok(now.signed_duration_since(modified) < self.freshness)
    }

    /// The snapshot for `dataset` if it is fresh, `None` on a miss.
    pub fn read(&self, dataset: Dataset) -> Result<Option<AccidentTable>> {
        self.read_at(dataset, Utc::now())
    }

    /// [`read`](Self::read) judged against an explicit clock.
    pub fn read_at(&self, dataset: Dataset, now: DateTime<Utc>) -> Result<Option<AccidentTable>> {
        let path = self.snapshot_path(dataset);
        if !self.is_fresh(&path, now)? {
            debug!(dataset = %dataset, "snapshot missing or stale");
            return Ok(None);
        }

        let file =
            File::open(&path).with_context(|| format!("failed to open `{}`", path.display()))?;
        let mut reader = ParquetRecordBatchReaderBuilder::try_new(file)
            .with_context(|| format!("reading parquet metadata of `{}`", path.display()))?
            .with_batch_size(8192)
            .build()
            .with_context(|| format!("building batch reader for `{}`", path.display()))?;

        let mut table = AccidentTable::new();
        while let Some(batch) = reader
            .next()
            .transpose()
            .with_context(|| format!("error reading RecordBatch from `{}`", path.display()))?
        {
            table.extend(columnar::from_record_batch(&batch)?);
        }
        debug!(dataset = %dataset, rows = table.len(), "snapshot hit");
        Ok(Some(table))
    }

    /// Replace the snapshot for `dataset`. Written to a temp file and renamed
    /// so readers never see a partial snapshot.
    pub fn write(&self, dataset: Dataset, table: &AccidentTable) -> Result<()> {
        let final_path = self.snapshot_path(dataset);
        let tmp_path = self.tmp_path(dataset);

        let batch = columnar::to_record_batch(table)?;
        let props = WriterProperties::builder()
            .set_compression(Compression::SNAPPY)
            .build();

        let tmp_file = File::create(&tmp_path)
            .with_context(|| format!("could not create temporary file `{}`", tmp_path.display()))?;
        let mut writer = ArrowWriter::try_new(BufWriter::new(tmp_file), batch.schema(), Some(props))
            .context("creating ArrowWriter for snapshot")?;
        if batch.num_rows() > 0 {
            writer.write(&batch).context("writing snapshot batch")?;
        }
        writer.close().context("closing snapshot writer")?;

        fs::rename(&tmp_path, &final_path).with_context(|| {
            format!(
                "failed to rename `{}` to `{}`",
                tmp_path.display(),
                final_path.display()
            )
        })?;

        info!(dataset = %dataset, rows = table.len(), path = %final_path.display(), "wrote snapshot");
        Ok(())
    }

    /// Per-writer temp file: `.<dataset>_data.parquet.<pid>-<micros>-<seq>.tmp`.
    /// Concurrent writers never share one, so the last rename wins.
    fn tmp_path(&self, dataset: Dataset) -> PathBuf {
        let seq = TMP_SEQ.fetch_add(1, Ordering::Relaxed);
        self.cache_dir.join(format!(
            ".{}_data.parquet.{}-{}-{}.tmp",
            dataset.name(),
            process::id(),
            Utc::now().timestamp_micros(),
            seq
        ))
    }

    /// Delete every snapshot (and leftover temp file) in the cache directory.
    /// Returns the number of files removed.
    pub fn clear(&self) -> Result<usize> {
        let dir = Pattern::escape(&self.cache_dir.to_string_lossy());
        let mut removed = 0;
        for pattern in [
            format!("{}/*_data.parquet", dir),
            format!("{}/.*_data.parquet.*.tmp", dir),
        ] {
            for entry in glob(&pattern).context("invalid glob pattern for snapshot clear")? {
                let path = match entry {
                    Ok(p) => p,
                    Err(e) => {
                        warn!("cannot read glob entry: {:?}", e);
                        continue;
                    }
                };
                fs::remove_file(&path)
                    .with_context(|| format!("failed to delete `{}`", path.display()))?;
                removed += 1;
            }
        }
        info!(removed, dir = %self.cache_dir.display(), "cleared snapshots");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{AccidentRecord, RecordKind};
    use chrono::NaiveDate;
    use std::collections::BTreeMap;
    use tempfile::tempdir;

    fn sample() -> AccidentTable {
        let mut extra = BTreeMap::new();
        extra.insert("휴게소명".to_string(), "망향".to_string());
        AccidentTable::from_records(vec![
            AccidentRecord {
                date: NaiveDate::from_ymd_opt(2020, 1, 1),
                region: "서울".into(),
                accident_type: "추돌".into(),
                accident_count: 1234.0,
                fatal_count: Some(12.0),
                fatal_rate: Some(0.972447325769854),
                ..Default::default()
            },
            AccidentRecord {
                accident_type: "차대차".into(),
                vehicle_type: Some("화물차".into()),
                accident_count: 3.0,
                ..Default::default()
            },
            AccidentRecord {
                kind: RecordKind::RestArea,
                extra,
                ..Default::default()
            },
        ])
    }

    #[test]
    fn write_then_read_round_trips() {
        let tmp = tempdir().unwrap();
        let cache = SnapshotCache::new(tmp.path(), Duration::hours(24)).unwrap();
        let table = sample();

        cache.write(Dataset::Cargo, &table).unwrap();
        assert_eq!(cache.read(Dataset::Cargo).unwrap(), Some(table));
        assert_eq!(cache.read(Dataset::Vehicle).unwrap(), None);
    }

    #[test]
    fn empty_table_round_trips() {
        let tmp = tempdir().unwrap();
        let cache = SnapshotCache::new(tmp.path(), Duration::hours(24)).unwrap();
        cache.write(Dataset::Fatal, &AccidentTable::new()).unwrap();
        assert_eq!(cache.read(Dataset::Fatal).unwrap(), Some(AccidentTable::new()));
    }

    #[test]
    fn stale_snapshot_is_a_miss() {
        let tmp = tempdir().unwrap();
        let cache = SnapshotCache::new(tmp.path(), Duration::hours(24)).unwrap();
        cache.write(Dataset::Cargo, &sample()).unwrap();

        let now = Utc::now();
        assert!(cache
            .read_at(Dataset::Cargo, now + Duration::hours(23))
            .unwrap()
            .is_some());
        assert!(cache
            .read_at(Dataset::Cargo, now + Duration::hours(25))
            .unwrap()
            .is_none());
    }

    #[test]
    fn zero_window_never_serves() {
        let tmp = tempdir().unwrap();
        let cache = SnapshotCache::new(tmp.path(), Duration::zero()).unwrap();
        cache.write(Dataset::Cargo, &sample()).unwrap();
        assert_eq!(cache.read(Dataset::Cargo).unwrap(), None);
    }

    #[test]
    fn overwrite_replaces_previous_snapshot() {
        let tmp = tempdir().unwrap();
        let cache = SnapshotCache::new(tmp.path(), Duration::hours(24)).unwrap();
        cache.write(Dataset::Cargo, &sample()).unwrap();

        let smaller = AccidentTable::from_records(vec![AccidentRecord::default()]);
        cache.write(Dataset::Cargo, &smaller).unwrap();
        assert_eq!(cache.read(Dataset::Cargo).unwrap(), Some(smaller));
    }

    #[test]
    fn clear_removes_all_snapshots_only() {
        let tmp = tempdir().unwrap();
        let cache = SnapshotCache::new(tmp.path(), Duration::hours(24)).unwrap();
        for d in Dataset::ALL {
            cache.write(d, &sample()).unwrap();
        }
        fs::write(tmp.path().join("notes.txt"), "keep me").unwrap();

        assert_eq!(cache.clear().unwrap(), 3);
        for d in Dataset::ALL {
            assert_eq!(cache.read(d).unwrap(), None);
        }
        assert!(tmp.path().join("notes.txt").exists());
    }

    #[test]
    fn clear_removes_leftover_temp_files() {
        let tmp = tempdir().unwrap();
        let cache = SnapshotCache::new(tmp.path(), Duration::hours(24)).unwrap();
        let leftover = tmp.path().join(".fatal_data.parquet.4242-1700000000000000-0.tmp");
        fs::write(&leftover, b"partial").unwrap();

        assert_eq!(cache.clear().unwrap(), 1);
        assert!(!leftover.exists());
    }

    #[test]
    fn concurrent_writers_all_succeed() {
        let tmp = tempdir().unwrap();
        let cache = SnapshotCache::new(tmp.path(), Duration::hours(24)).unwrap();
        let table = AccidentTable::from_records(
            (0..5_000)
                .map(|i| AccidentRecord {
                    accident_count: i as f64,
                    ..Default::default()
                })
                .collect::<Vec<_>>(),
        );

        for _ in 0..5 {
            std::thread::scope(|s| {
                let handles: Vec<_> = (0..4)
                    .map(|_| s.spawn(|| cache.write(Dataset::Cargo, &table)))
                    .collect();
                for h in handles {
                    h.join().unwrap().unwrap();
                }
            });
            assert_eq!(cache.read(Dataset::Cargo).unwrap().as_ref(), Some(&table));
        }

        let leftovers: Vec<_> = fs::read_dir(tmp.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .filter(|n| n.to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty(), "{:?}", leftovers);
    }
}
