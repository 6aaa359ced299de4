// src/dataset/mod.rs
use glob::{glob_with, MatchOptions, Pattern};
use serde::{Deserialize, Serialize};
use std::{
    fmt,
    path::{Path, PathBuf},
    str::FromStr,
};
use tracing::{debug, error, info, warn};

use crate::config::{Config, SourceRule};
use crate::normalize::{self, vehicle, NormalizeError, SourceShape};
use crate::read::{self, ReadError};
use crate::record::{AccidentRecord, AccidentTable};

/// The three logical datasets the dashboard can show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dataset {
    Cargo,
    Vehicle,
    Fatal,
}

impl Dataset {
    pub const ALL: [Dataset; 3] = [Dataset::Cargo, Dataset::Vehicle, Dataset::Fatal];

    pub fn name(&self) -> &'static str {
        match self {
            Dataset::Cargo => "cargo",
            Dataset::Vehicle => "vehicle",
            Dataset::Fatal => "fatal",
        }
    }
}

impl fmt::Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown dataset `{0}` (expected cargo, vehicle or fatal)")]
pub struct UnknownDataset(pub String);

impl FromStr for Dataset {
    type Err = UnknownDataset;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cargo" => Ok(Dataset::Cargo),
            "vehicle" => Ok(Dataset::Vehicle),
            "fatal" => Ok(Dataset::Fatal),
            _ => Err(UnknownDataset(s.to_string())),
        }
    }
}

/// Why a single file was skipped.
#[derive(Debug, thiserror::Error)]
pub enum FileError {
    #[error(transparent)]
    Read(#[from] ReadError),
    #[error(transparent)]
    Normalize(#[from] NormalizeError),
}

#[derive(Debug)]
pub struct FileFailure {
    pub path: PathBuf,
    pub error: FileError,
}

/// Result of loading one dataset: the stacked table plus the files that
/// were skipped along the way.
#[derive(Debug, Default)]
pub struct LoadReport {
    pub table: AccidentTable,
    pub files_loaded: usize,
    pub failures: Vec<FileFailure>,
}

/// Reads every source file of a dataset and stacks the normalized rows.
#[derive(Debug, Clone)]
pub struct DatasetLoader {
    config: Config,
}

impl DatasetLoader {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Load `dataset` from its source directory. Never fails: unreadable
    /// files are logged and skipped, and a dataset with nothing usable is an
    /// empty table.
    pub fn load(&self, dataset: Dataset) -> AccidentTable {
        self.load_with_report(dataset).table
    }

    #[tracing::instrument(level = "info", skip(self), fields(dataset = %dataset))]
    pub fn load_with_report(&self, dataset: Dataset) -> LoadReport {
        let dir = self.config.dataset_dir(dataset);
        let mut report = LoadReport::default();

        if !dir.is_dir() {
            warn!(dir = %dir.display(), "dataset directory not found");
            return report;
        }

        for rule in &self.config.dataset(dataset).sources {
            let files = match list_files(&dir, rule) {
                Ok(files) => files,
                Err(e) => {
                    error!(dir = %dir.display(), format = %rule.format, "listing files failed: {}", e);
                    continue;
                }
            };
            debug!(format = %rule.format, shape = %rule.shape, count = files.len(), "matched files");

            for path in files {
                match load_file(&path, rule) {
                    Ok(records) => {
                        debug!(file = %path.display(), rows = records.len(), "normalized");
                        report.files_loaded += 1;
                        report.table.extend(records);
                    }
                    Err(error) => {
                        error!(file = %path.display(), "skipping file: {}", error);
                        report.failures.push(FileFailure { path, error });
                    }
                }
            }
        }

        if report.files_loaded == 0 {
            warn!("no {} files loaded", dataset);
        }
        info!(
            rows = report.table.len(),
            files = report.files_loaded,
            failed = report.failures.len(),
            "loaded {}",
            dataset
        );
        report
    }
}

/// Read + normalize one file under `rule`. The vehicle rule additionally
/// requires the wide-layout header; other vehicle exports are rejected
/// rather than passed through in a non-canonical shape.
pub fn load_file(path: &Path, rule: &SourceRule) -> Result<Vec<AccidentRecord>, FileError> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let raw = read::read_table(path, rule.format)?;
    if rule.shape == SourceShape::VehicleWide && !vehicle::is_wide_layout(&raw) {
        return Err(NormalizeError::UnrecognizedLayout {
            file: file_name,
            shape: rule.shape,
            token: vehicle::WIDE_LAYOUT_TOKEN,
        }
        .into());
    }

    Ok(normalize::normalize(rule.shape, &raw, &file_name)?)
}

/// Files in `dir` (not recursive) with the rule's extension, in name order.
/// Office lock files (`~$name.xlsx`) are ignored.
fn list_files(dir: &Path, rule: &SourceRule) -> Result<Vec<PathBuf>, glob::PatternError> {
    let pattern = format!(
        "{}/*.{}",
        Pattern::escape(&dir.to_string_lossy()),
        rule.format.extension()
    );
    let options = MatchOptions {
        case_sensitive: false,
        ..MatchOptions::new()
    };

    let mut files: Vec<PathBuf> = glob_with(&pattern, options)?
        .filter_map(|entry| match entry {
            Ok(p) => Some(p),
            Err(e) => {
                warn!("cannot read glob entry: {:?}", e);
                None
            }
        })
        .filter(|p| p.is_file())
        .filter(|p| {
            !p.file_name()
                .map(|n| n.to_string_lossy().starts_with("~$"))
                .unwrap_or(false)
        })
        .collect();
    files.sort();
    Ok(files)
}
