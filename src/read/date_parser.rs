use chrono::NaiveDate;

use super::raw_table::RawValue;

/// Jan 1 of `year`; the canonical date for year-granularity sources.
pub fn year_start(year: i32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, 1, 1)
}

/// Reads a year from a cell holding `2019`, `2019.0`, `"2019"` or `"2019년"`.
pub fn parse_year(value: &RawValue) -> Option<i32> {
    let text = value.as_text()?;
    let digits: String = text.chars().take_while(char::is_ascii_digit).collect();
    if digits.len() != 4 {
        return None;
    }
    digits.parse().ok()
}

/// Parses the leading `YYYYMMDD` of a compact date-time such as
/// `"2019010123"`. Anything that is not a valid calendar date gives `None`.
pub fn parse_compact_date(value: &RawValue) -> Option<NaiveDate> {
    let text = value.as_text()?;
    let head: String = text.chars().take(8).collect();
    if head.len() != 8 || !head.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    NaiveDate::parse_from_str(&head, "%Y%m%d").ok()
}
