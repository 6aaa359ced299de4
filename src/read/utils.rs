use once_cell::sync::Lazy;
use regex::Regex;

static YEAR_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"20[0-9]{2}").unwrap());

/// Trim whitespace + strip outer quotes and a leading BOM if present.
pub fn clean_str(raw: &str) -> String {
    let trimmed = raw.trim_start_matches('\u{feff}').trim();
    if trimmed.starts_with('"') && trimmed.ends_with('"') && trimmed.len() >= 2 {
        trimmed[1..trimmed.len() - 1].trim().to_string()
    } else {
        trimmed.to_string()
    }
}

/// Lenient numeric parse for spreadsheet text: `"1,234"`, `"12.5%"`, `" 7 "`.
/// Placeholders such as `"-"` parse as `None`.
pub fn parse_number(raw: &str) -> Option<f64> {
    let cleaned = clean_str(raw);
    let cleaned = cleaned.trim_end_matches('%').replace(',', "");
    cleaned.trim().parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Finds the first `20xx` token in a file name, e.g. `화물차_2019년.xls` → 2019.
pub fn extract_year_from_filename(filename: &str) -> Option<i32> {
    YEAR_TOKEN
        .find(filename)
        .and_then(|m| m.as_str().parse().ok())
}
