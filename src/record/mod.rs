// src/record/mod.rs
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, str::FromStr};

pub mod columnar;
pub mod table;

pub use table::AccidentTable;

/// Placeholder for a missing region.
pub const UNKNOWN_REGION: &str = "미상";
/// Placeholder for a missing accident category.
pub const UNKNOWN_ACCIDENT_TYPE: &str = "기타";

/// Canonical column names, shared by the normalizers and the snapshot schema.
pub mod columns {
    pub const DATE: &str = "date";
    pub const REGION: &str = "region";
    pub const ACCIDENT_TYPE: &str = "accident_type";
    pub const ACCIDENT_COUNT: &str = "accident_count";
    pub const FATAL_COUNT: &str = "fatal_count";
    pub const FATAL_RATE: &str = "fatal_rate";
    pub const VEHICLE_TYPE: &str = "vehicle_type";
    pub const ROAD_TYPE: &str = "road_type";
    pub const LAT: &str = "lat";
    pub const LON: &str = "lon";
    pub const KIND: &str = "kind";
    pub const EXTRA: &str = "extra";
}

/// What a row describes. Rest-area rows ride along in the fatal dataset
/// with their own columns kept in `extra`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    #[default]
    Accident,
    RestArea,
}

impl RecordKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Accident => "accident",
            RecordKind::RestArea => "rest_area",
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown record kind `{0}`")]
pub struct UnknownRecordKind(pub String);

impl FromStr for RecordKind {
    type Err = UnknownRecordKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "accident" => Ok(RecordKind::Accident),
            "rest_area" => Ok(RecordKind::RestArea),
            _ => Err(UnknownRecordKind(s.to_string())),
        }
    }
}

/// The one row shape every dataset is normalized into.
///
/// Every field is always present; a missing source value is the field's
/// sentinel (`None` date, `미상` region, `기타` type, `0` count).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccidentRecord {
    /// Attributed period; year-only sources use Jan 1. `None` = unknown.
    pub date: Option<NaiveDate>,
    pub region: String,
    pub accident_type: String,
    pub accident_count: f64,
    pub fatal_count: Option<f64>,
    /// Percentage, fatalities per 100 accidents.
    pub fatal_rate: Option<f64>,
    pub vehicle_type: Option<String>,
    pub road_type: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub kind: RecordKind,
    pub extra: BTreeMap<String, String>,
}

impl Default for AccidentRecord {
    fn default() -> Self {
        Self {
            date: None,
            region: UNKNOWN_REGION.to_string(),
            accident_type: UNKNOWN_ACCIDENT_TYPE.to_string(),
            accident_count: 0.0,
            fatal_count: None,
            fatal_rate: None,
            vehicle_type: None,
            road_type: None,
            lat: None,
            lon: None,
            kind: RecordKind::Accident,
            extra: BTreeMap::new(),
        }
    }
}

impl AccidentRecord {
    pub fn year(&self) -> Option<i32> {
        self.date.map(|d| d.year())
    }

    pub fn month(&self) -> Option<u32> {
        self.date.map(|d| d.month())
    }

    /// Fill `fatal_rate` from the counts when the source did not carry one.
    pub fn derive_fatal_rate(&mut self) {
        if self.fatal_rate.is_some() {
            return;
        }
        if let Some(fatal) = self.fatal_count {
            if self.accident_count > 0.0 {
                self.fatal_rate = Some(fatal * 100.0 / self.accident_count);
            }
        }
    }
}

/// Coerce an optional source number into a non-negative count (missing,
/// non-numeric and negative values become 0).
pub fn count_or_zero(value: Option<f64>) -> f64 {
    match value {
        Some(n) if n.is_finite() && n > 0.0 => n,
        _ => 0.0,
    }
}

/// Text field with a sentinel fallback.
pub fn text_or(value: Option<String>, sentinel: &str) -> String {
    value
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| sentinel.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_kind_parses_its_own_name() {
        for kind in [RecordKind::Accident, RecordKind::RestArea] {
            assert_eq!(kind.as_str().parse::<RecordKind>().unwrap(), kind);
        }
        let err = "parking".parse::<RecordKind>().unwrap_err();
        assert_eq!(err.to_string(), "unknown record kind `parking`");
    }

    #[test]
    fn default_record_is_all_sentinels() {
        let r = AccidentRecord::default();
        assert_eq!(r.date, None);
        assert_eq!(r.region, UNKNOWN_REGION);
        assert_eq!(r.accident_type, UNKNOWN_ACCIDENT_TYPE);
        assert_eq!(r.accident_count, 0.0);
        assert_eq!(r.kind, RecordKind::Accident);
    }

    #[test]
    fn fatal_rate_is_derived_only_when_missing() {
        let mut r = AccidentRecord {
            accident_count: 200.0,
            fatal_count: Some(5.0),
            ..Default::default()
        };
        r.derive_fatal_rate();
        assert_eq!(r.fatal_rate, Some(2.5));

        let mut sourced = AccidentRecord {
            accident_count: 200.0,
            fatal_count: Some(5.0),
            fatal_rate: Some(9.9),
            ..Default::default()
        };
        sourced.derive_fatal_rate();
        assert_eq!(sourced.fatal_rate, Some(9.9));

        let mut no_accidents = AccidentRecord {
            fatal_count: Some(1.0),
            ..Default::default()
        };
        no_accidents.derive_fatal_rate();
        assert_eq!(no_accidents.fatal_rate, None);
    }

    #[test]
    fn counts_never_go_negative() {
        assert_eq!(count_or_zero(Some(-3.0)), 0.0);
        assert_eq!(count_or_zero(Some(f64::NAN)), 0.0);
        assert_eq!(count_or_zero(None), 0.0);
        assert_eq!(count_or_zero(Some(4.0)), 4.0);
    }
}
