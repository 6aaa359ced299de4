use crate::read::{cell_at, utils::extract_year_from_filename, RawTable, RawValue};
use crate::record::{count_or_zero, AccidentRecord, UNKNOWN_ACCIDENT_TYPE, UNKNOWN_REGION};

use super::{resolve_year_date, NormalizeError, SourceShape};

/// Header cell that marks the wide per-vehicle-type export.
pub const WIDE_LAYOUT_TOKEN: &str = "가해운전자 차종별";

/// Metric label of the rows we keep (the export also repeats deaths and
/// injuries for every vehicle type).
const ACCIDENT_COUNT_METRIC: &str = "사고건수";

/// Vehicle categories kept from column 0.
const VEHICLE_TOKENS: &[&str] = &["화물차", "승용차", "버스", "이륜차", "기타"];

const YEAR_COLUMN: &str = "사고년도";

const CATEGORY_COL: usize = 0;
const METRIC_COL: usize = 1;

/// Does this table look like the wide vehicle export?
pub fn is_wide_layout(table: &RawTable) -> bool {
    table.has_column(WIDE_LAYOUT_TOKEN)
}

/// Wide-to-long reshape. Column 0 holds the vehicle category, column 1 the
/// metric label; every other column (bar the year) is an accident-type axis
/// value and becomes one record per kept row, column by column.
pub fn normalize(table: &RawTable, file_name: &str) -> Result<Vec<AccidentRecord>, NormalizeError> {
    if table.headers.len() <= METRIC_COL {
        return Err(NormalizeError::TooFewColumns {
            file: file_name.to_string(),
            shape: SourceShape::VehicleWide,
            expected: METRIC_COL + 1,
            found: table.headers.len(),
        });
    }

    let file_year = extract_year_from_filename(file_name);
    let year_col = table.column_index(YEAR_COLUMN);
    let value_cols: Vec<usize> = (METRIC_COL + 1..table.headers.len())
        .filter(|&i| Some(i) != year_col)
        .collect();

    let kept: Vec<(&[RawValue], String)> = table
        .rows
        .iter()
        .filter_map(|row| {
            let metric = cell_at(row, METRIC_COL).as_text()?;
            if metric.trim() != ACCIDENT_COUNT_METRIC {
                return None;
            }
            let category = cell_at(row, CATEGORY_COL).as_text()?;
            VEHICLE_TOKENS
                .iter()
                .any(|token| category.contains(token))
                .then(|| (row.as_slice(), category))
        })
        .collect();

    let mut records = Vec::with_capacity(kept.len() * value_cols.len());
    for &col in &value_cols {
        let accident_type = table.headers[col].trim();
        for (row, category) in &kept {
            records.push(AccidentRecord {
                date: resolve_year_date(file_year, year_col.map(|i| cell_at(row, i))),
                region: UNKNOWN_REGION.to_string(),
                accident_type: if accident_type.is_empty() {
                    UNKNOWN_ACCIDENT_TYPE.to_string()
                } else {
                    accident_type.to_string()
                },
                accident_count: count_or_zero(cell_at(row, col).as_number()),
                vehicle_type: Some(category.clone()),
                ..Default::default()
            });
        }
    }

    Ok(records)
}
