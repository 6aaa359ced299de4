use crate::read::{cell_at, utils::extract_year_from_filename, RawTable};
use crate::record::{
    columns, count_or_zero, text_or, AccidentRecord, UNKNOWN_ACCIDENT_TYPE, UNKNOWN_REGION,
};

use super::{resolve_year_date, ColumnMap, RenameTable};

/// Column names used across the yearly, regional and per-category cargo
/// truck exports. The category axis goes by a different name in every file.
const CARGO_RENAMES: RenameTable = &[
    ("발생건수", columns::ACCIDENT_COUNT),
    ("사망자수", columns::FATAL_COUNT),
    ("치사율(%)", columns::FATAL_RATE),
    ("시도", columns::REGION),
    ("지자체", columns::REGION),
    ("도로형태", columns::ACCIDENT_TYPE),
    ("사고유형", columns::ACCIDENT_TYPE),
    ("연령대", columns::ACCIDENT_TYPE),
    ("기상상태", columns::ACCIDENT_TYPE),
    ("위반유형", columns::ACCIDENT_TYPE),
];

const YEAR_COLUMN: &str = "연도";

/// Rename-in-place shape: one record per source row.
pub fn normalize(table: &RawTable, file_name: &str) -> Vec<AccidentRecord> {
    let map = ColumnMap::resolve(table, CARGO_RENAMES);
    let file_year = extract_year_from_filename(file_name);
    let year_col = table.column_index(YEAR_COLUMN);

    table
        .rows
        .iter()
        .map(|row| {
            let mut record = AccidentRecord {
                date: resolve_year_date(file_year, year_col.map(|i| cell_at(row, i))),
                region: text_or(map.text(row, columns::REGION), UNKNOWN_REGION),
                accident_type: text_or(
                    map.text(row, columns::ACCIDENT_TYPE),
                    UNKNOWN_ACCIDENT_TYPE,
                ),
                accident_count: count_or_zero(map.number(row, columns::ACCIDENT_COUNT)),
                fatal_count: map.number(row, columns::FATAL_COUNT).map(|n| n.max(0.0)),
                fatal_rate: map.number(row, columns::FATAL_RATE),
                ..Default::default()
            };
            record.derive_fatal_rate();
            record
        })
        .collect()
}
