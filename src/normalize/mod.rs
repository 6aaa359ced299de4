// src/normalize/mod.rs
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fmt};

use crate::read::{cell_at, date_parser, RawTable, RawValue};
use crate::record::AccidentRecord;

pub mod cargo;
pub mod fatal;
pub mod rest_area;
pub mod vehicle;

/// The known source layouts. Each has its own normalization function and
/// the tag is always chosen by the caller, never sniffed from the columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceShape {
    /// One row per (region | category) with count columns; renamed in place.
    CargoWide,
    /// Vehicle-type rows with one column per accident type; unpivoted.
    VehicleWide,
    /// One row per fatal accident, with coordinates.
    FatalRecords,
    /// Rest-area listing stacked verbatim next to the fatal records.
    RestArea,
}

impl fmt::Display for SourceShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SourceShape::CargoWide => "cargo_wide",
            SourceShape::VehicleWide => "vehicle_wide",
            SourceShape::FatalRecords => "fatal_records",
            SourceShape::RestArea => "rest_area",
        };
        f.write_str(s)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum NormalizeError {
    #[error("{file}: not a {shape} layout (header `{token}` not found)")]
    UnrecognizedLayout {
        file: String,
        shape: SourceShape,
        token: &'static str,
    },

    #[error("{file}: {shape} layout needs at least {expected} columns, found {found}")]
    TooFewColumns {
        file: String,
        shape: SourceShape,
        expected: usize,
        found: usize,
    },
}

/// Normalize one raw table of the given shape. `file_name` is only used
/// for the year token and error messages.
pub fn normalize(
    shape: SourceShape,
    table: &RawTable,
    file_name: &str,
) -> Result<Vec<AccidentRecord>, NormalizeError> {
    match shape {
        SourceShape::CargoWide => Ok(cargo::normalize(table, file_name)),
        SourceShape::VehicleWide => vehicle::normalize(table, file_name),
        SourceShape::FatalRecords => Ok(fatal::normalize(table)),
        SourceShape::RestArea => Ok(rest_area::normalize(table)),
    }
}

/// Source column name → canonical column name.
pub(crate) type RenameTable = &'static [(&'static str, &'static str)];

/// Canonical column → source column index, resolved once per file.
/// When a file carries several aliases of one canonical column, the alias
/// listed first in the rename table wins.
pub(crate) struct ColumnMap(HashMap<&'static str, usize>);

impl ColumnMap {
    pub(crate) fn resolve(table: &RawTable, renames: RenameTable) -> Self {
        let mut map = HashMap::new();
        for (source, canonical) in renames {
            if let Some(idx) = table.column_index(source) {
                map.entry(*canonical).or_insert(idx);
            }
        }
        Self(map)
    }

    pub(crate) fn contains(&self, canonical: &str) -> bool {
        self.0.contains_key(canonical)
    }

    pub(crate) fn cell<'a>(&self, row: &'a [RawValue], canonical: &str) -> Option<&'a RawValue> {
        self.0.get(canonical).map(|&idx| cell_at(row, idx))
    }

    pub(crate) fn text(&self, row: &[RawValue], canonical: &str) -> Option<String> {
        self.cell(row, canonical).and_then(RawValue::as_text)
    }

    pub(crate) fn number(&self, row: &[RawValue], canonical: &str) -> Option<f64> {
        self.cell(row, canonical).and_then(RawValue::as_number)
    }
}

/// A year embedded in the file name wins; otherwise the row's year cell;
/// otherwise the date is unknown.
pub(crate) fn resolve_year_date(
    file_year: Option<i32>,
    row_year: Option<&RawValue>,
) -> Option<NaiveDate> {
    file_year
        .or_else(|| row_year.and_then(date_parser::parse_year))
        .and_then(date_parser::year_start)
}
