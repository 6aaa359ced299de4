use calamine::Data;

use super::utils::{clean_str, parse_number};

static EMPTY_CELL: RawValue = RawValue::Empty;

/// One untyped cell as it came out of a spreadsheet or CSV file.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Empty,
    Text(String),
    Number(f64),
}

impl RawValue {
    /// Builds a text cell, collapsing blank strings to `Empty`.
    pub fn text(raw: &str) -> Self {
        let cleaned = clean_str(raw);
        if cleaned.is_empty() {
            RawValue::Empty
        } else {
            RawValue::Text(cleaned)
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, RawValue::Empty)
    }

    /// String form of the cell. Whole numbers print without a fractional
    /// part, so a year stored as `2019.0` reads back as `"2019"`.
    pub fn as_text(&self) -> Option<String> {
        match self {
            RawValue::Empty => None,
            RawValue::Text(s) => Some(s.clone()),
            RawValue::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => {
                Some(format!("{:.0}", n))
            }
            RawValue::Number(n) => Some(n.to_string()),
        }
    }

    /// Numeric form of the cell; text is parsed leniently (thousands
    /// separators, trailing `%`).
    pub fn as_number(&self) -> Option<f64> {
        match self {
            RawValue::Empty => None,
            RawValue::Number(n) if n.is_finite() => Some(*n),
            RawValue::Number(_) => None,
            RawValue::Text(s) => parse_number(s),
        }
    }
}

impl From<&Data> for RawValue {
    fn from(cell: &Data) -> Self {
        match cell {
            Data::Empty | Data::Error(_) => RawValue::Empty,
            Data::String(s) => RawValue::text(s),
            Data::Float(f) => RawValue::Number(*f),
            Data::Int(i) => RawValue::Number(*i as f64),
            other => RawValue::text(&other.to_string()),
        }
    }
}

/// A file's contents before normalization: the header row plus every
/// non-blank data row. Rows may be shorter than `headers` (ragged CSV).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<RawValue>>,
}

impl RawTable {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<RawValue>>) -> Self {
        Self { headers, rows }
    }

    /// Builds a table from raw rows: the first non-blank row becomes the
    /// header, later blank rows are dropped.
    pub fn from_rows<I>(rows: I) -> Self
    where
        I: IntoIterator<Item = Vec<RawValue>>,
    {
        let mut rows = rows
            .into_iter()
            .filter(|row| row.iter().any(|cell| !cell.is_empty()));

        let headers = match rows.next() {
            Some(header_row) => header_row
                .iter()
                .enumerate()
                .map(|(i, cell)| match cell.as_text() {
                    Some(name) => name,
                    None => format!("unnamed_{}", i),
                })
                .collect(),
            None => return Self::default(),
        };

        Self {
            headers,
            rows: rows.collect(),
        }
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Cell `idx` of `row`, or `Empty` past the end of a short row.
pub fn cell_at(row: &[RawValue], idx: usize) -> &RawValue {
    row.get(idx).unwrap_or(&EMPTY_CELL)
}
