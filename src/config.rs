// src/config.rs
use serde::{Deserialize, Serialize};
use std::{
    env, fs,
    path::{Path, PathBuf},
};
use tracing::info;

use crate::dataset::Dataset;
use crate::normalize::SourceShape;
use crate::read::SourceFormat;

/// Environment variable naming a YAML config file.
pub const CONFIG_ENV: &str = "TRUCKSTAT_CONFIG";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("reading config {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("parsing config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Which files of a dataset directory to read, and how to normalize them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRule {
    pub format: SourceFormat,
    pub shape: SourceShape,
}

impl SourceRule {
    pub fn new(format: SourceFormat, shape: SourceShape) -> Self {
        Self { format, shape }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetConfig {
    /// Directory relative to `data_root` (absolute paths are kept as-is).
    pub dir: PathBuf,
    pub sources: Vec<SourceRule>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetsConfig {
    pub cargo: DatasetConfig,
    pub vehicle: DatasetConfig,
    pub fatal: DatasetConfig,
}

impl Default for DatasetsConfig {
    fn default() -> Self {
        Self {
            cargo: DatasetConfig {
                dir: PathBuf::from("화물차 사고 데이터 시각화"),
                sources: vec![SourceRule::new(SourceFormat::Xls, SourceShape::CargoWide)],
            },
            vehicle: DatasetConfig {
                dir: Path::new("차종별 교통사고").join("data"),
                sources: vec![SourceRule::new(
                    SourceFormat::Xlsx,
                    SourceShape::VehicleWide,
                )],
            },
            fatal: DatasetConfig {
                dir: PathBuf::from("사망사고 및 휴게소"),
                sources: vec![
                    SourceRule::new(SourceFormat::Xlsb, SourceShape::FatalRecords),
                    SourceRule::new(SourceFormat::Csv, SourceShape::RestArea),
                ],
            },
        }
    }
}

/// Runtime configuration. Every field has a default, so an empty YAML
/// document is a valid config.
///
/// ```yaml
/// data_root: /srv/accidents
/// cache_dir: .cache
/// freshness_hours: 24
/// memo_capacity: 32
/// datasets:
///   cargo:
///     dir: 화물차 사고 데이터 시각화
///     sources:
///       - { format: xls, shape: cargo_wide }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub data_root: PathBuf,
    pub cache_dir: PathBuf,
    pub freshness_hours: u32,
    pub memo_capacity: usize,
    pub datasets: DatasetsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_root: PathBuf::from("."),
            cache_dir: PathBuf::from(".cache"),
            freshness_hours: 24,
            memo_capacity: 32,
            datasets: DatasetsConfig::default(),
        }
    }
}

impl Config {
    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        // serde_yaml rejects an empty document; treat it as "all defaults"
        let cfg: Config = if text.trim().is_empty() {
            Config::default()
        } else {
            serde_yaml::from_str(text)?
        };
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let cfg = Self::from_yaml_str(&text)?;
        info!(path = %path.display(), "loaded config");
        Ok(cfg)
    }

    /// Load the file named by `TRUCKSTAT_CONFIG`, or fall back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        match env::var_os(CONFIG_ENV) {
            Some(path) => Self::load(PathBuf::from(path)),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.memo_capacity == 0 {
            return Err(ConfigError::Invalid("memo_capacity must be at least 1".into()));
        }
        for dataset in Dataset::ALL {
            if self.dataset(dataset).sources.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "dataset `{}` has no source rules",
                    dataset
                )));
            }
        }
        Ok(())
    }

    pub fn dataset(&self, dataset: Dataset) -> &DatasetConfig {
        match dataset {
            Dataset::Cargo => &self.datasets.cargo,
            Dataset::Vehicle => &self.datasets.vehicle,
            Dataset::Fatal => &self.datasets.fatal,
        }
    }

    pub fn dataset_dir(&self, dataset: Dataset) -> PathBuf {
        self.data_root.join(&self.dataset(dataset).dir)
    }

    pub fn freshness_window(&self) -> chrono::Duration {
        chrono::Duration::hours(i64::from(self.freshness_hours))
    }
}
