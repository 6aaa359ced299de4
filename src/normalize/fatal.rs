use crate::read::{date_parser, RawTable};
use crate::record::{columns, text_or, AccidentRecord, UNKNOWN_ACCIDENT_TYPE, UNKNOWN_REGION};

use super::{resolve_year_date, ColumnMap, RenameTable};

const YEAR: &str = "year";
const DATETIME: &str = "datetime";

/// Column names of the fatal-accident register.
const FATAL_RENAMES: RenameTable = &[
    ("발생년", YEAR),
    ("발생년월일시", DATETIME),
    ("사망자수", columns::FATAL_COUNT),
    ("사고유형_대분류", columns::ACCIDENT_TYPE),
    ("도로형태", columns::ROAD_TYPE),
    ("발생지시도", columns::REGION),
    ("위도", columns::LAT),
    ("경도", columns::LON),
];

/// One record per register row. The date comes from the leading `YYYYMMDD`
/// of the compound date-time when that column exists, else from the year;
/// a malformed date-time yields the unknown date, not an error.
pub fn normalize(table: &RawTable) -> Vec<AccidentRecord> {
    let map = ColumnMap::resolve(table, FATAL_RENAMES);
    let has_datetime = map.contains(DATETIME);

    table
        .rows
        .iter()
        .map(|row| {
            let date = if has_datetime {
                map.cell(row, DATETIME)
                    .and_then(date_parser::parse_compact_date)
            } else {
                resolve_year_date(None, map.cell(row, YEAR))
            };

            AccidentRecord {
                date,
                region: text_or(map.text(row, columns::REGION), UNKNOWN_REGION),
                accident_type: text_or(
                    map.text(row, columns::ACCIDENT_TYPE),
                    UNKNOWN_ACCIDENT_TYPE,
                ),
                fatal_count: map.number(row, columns::FATAL_COUNT).map(|n| n.max(0.0)),
                road_type: map.text(row, columns::ROAD_TYPE),
                lat: map.number(row, columns::LAT),
                lon: map.number(row, columns::LON),
                ..Default::default()
            }
        })
        .collect()
}
