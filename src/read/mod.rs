// src/read/mod.rs
use calamine::{open_workbook, Reader, Sheets, Xls, Xlsb, Xlsx};
use csv::ReaderBuilder;
use serde::{Deserialize, Serialize};
use std::{
    fmt,
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};
use tracing::debug;

pub mod date_parser;
pub mod raw_table;
pub mod utils;

pub use raw_table::{cell_at, RawTable, RawValue};

/// Container formats a source file can come in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    /// Legacy BIFF workbook.
    Xls,
    /// Office Open XML workbook.
    Xlsx,
    /// Binary workbook.
    Xlsb,
    /// Comma-delimited text with a header record.
    Csv,
}

impl SourceFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            SourceFormat::Xls => "xls",
            SourceFormat::Xlsx => "xlsx",
            SourceFormat::Xlsb => "xlsb",
            SourceFormat::Csv => "csv",
        }
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "xls" => Some(SourceFormat::Xls),
            "xlsx" => Some(SourceFormat::Xlsx),
            "xlsb" => Some(SourceFormat::Xlsb),
            "csv" => Some(SourceFormat::Csv),
            _ => None,
        }
    }

    /// Guess the format from the file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }
}

impl fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Failure to turn one file into a `RawTable`. Always names the file.
#[derive(Debug, thiserror::Error)]
pub enum ReadError {
    #[error("{}: spreadsheet error: {source}", .path.display())]
    Spreadsheet {
        path: PathBuf,
        source: calamine::Error,
    },

    #[error("{}: workbook has no worksheets", .path.display())]
    NoWorksheet { path: PathBuf },

    #[error("{}: csv error: {source}", .path.display())]
    Csv { path: PathBuf, source: csv::Error },
}

impl ReadError {
    pub fn path(&self) -> &Path {
        match self {
            ReadError::Spreadsheet { path, .. }
            | ReadError::NoWorksheet { path }
            | ReadError::Csv { path, .. } => path,
        }
    }
}

/// Read `path` as `format` and return its header + rows. Spreadsheets are
/// read from their first worksheet.
#[tracing::instrument(level = "debug", skip(path), fields(path = %path.as_ref().display()))]
pub fn read_table<P: AsRef<Path>>(path: P, format: SourceFormat) -> Result<RawTable, ReadError> {
    let path = path.as_ref();
    let workbook: Result<Sheets<BufReader<File>>, calamine::Error> = match format {
        SourceFormat::Xls => open_workbook::<Xls<_>, _>(path)
            .map(Sheets::Xls)
            .map_err(Into::into),
        SourceFormat::Xlsx => open_workbook::<Xlsx<_>, _>(path)
            .map(Sheets::Xlsx)
            .map_err(Into::into),
        SourceFormat::Xlsb => open_workbook::<Xlsb<_>, _>(path)
            .map(Sheets::Xlsb)
            .map_err(Into::into),
        SourceFormat::Csv => return read_csv(path),
    };
    let spreadsheet_err = |source| ReadError::Spreadsheet {
        path: path.to_path_buf(),
        source,
    };

    let mut workbook = workbook.map_err(spreadsheet_err)?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| ReadError::NoWorksheet {
            path: path.to_path_buf(),
        })?
        .map_err(spreadsheet_err)?;

    let (height, width) = range.get_size();
    debug!(height, width, "read worksheet");

    Ok(RawTable::from_rows(
        range
            .rows()
            .map(|row| row.iter().map(RawValue::from).collect::<Vec<_>>()),
    ))
}

fn read_csv(path: &Path) -> Result<RawTable, ReadError> {
    let csv_err = |source| ReadError::Csv {
        path: path.to_path_buf(),
        source,
    };

    let mut rdr = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true) // rest-area exports carry ragged trailing columns
        .from_path(path)
        .map_err(csv_err)?;

    let mut rows = Vec::new();
    for record in rdr.records() {
        let record = record.map_err(csv_err)?;
        rows.push(record.iter().map(RawValue::text).collect::<Vec<_>>());
    }
    debug!(rows = rows.len(), "read csv");

    Ok(RawTable::from_rows(rows))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn reads_csv_with_bom_and_ragged_rows() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("휴게소.csv");
        fs::write(
            &path,
            "\u{feff}휴게소명,노선,위도\n\
             망향,경부선,36.8\n\
             \n\
             안성,경부선\n",
        )
        .unwrap();

        let table = read_table(&path, SourceFormat::Csv).unwrap();
        assert_eq!(table.headers, vec!["휴게소명", "노선", "위도"]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0][2], RawValue::Text("36.8".into()));
        assert!(cell_at(&table.rows[1], 2).is_empty());
    }

    #[test]
    fn reads_first_sheet_of_xlsx() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/vehicle_2021.xlsx");

        let table = read_table(&path, SourceFormat::Xlsx).unwrap();
        assert_eq!(table.headers, vec!["가해운전자 차종별", "통계", "차대사람", "차대차"]);
        assert_eq!(table.rows.len(), 3);
        assert_eq!(
            table.rows[0],
            vec![
                RawValue::Text("화물차".into()),
                RawValue::Text("사고건수".into()),
                RawValue::Number(5.0),
                RawValue::Number(3.0),
            ]
        );
        assert_eq!(table.rows[2][3].as_number(), Some(2.0));
    }

    #[test]
    fn corrupt_workbook_names_the_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken_2020.xls");
        fs::write(&path, b"this is not a workbook").unwrap();

        let err = read_table(&path, SourceFormat::Xls).unwrap_err();
        assert_eq!(err.path(), path.as_path());
        assert!(err.to_string().contains("broken_2020.xls"));
    }

    #[test]
    fn missing_csv_is_a_read_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("absent.csv");
        let err = read_table(&path, SourceFormat::Csv).unwrap_err();
        assert!(matches!(err, ReadError::Csv { .. }));
    }

    #[test]
    fn format_from_extension() {
        assert_eq!(
            SourceFormat::from_path(Path::new("a/사망사고정보.XLSB")),
            Some(SourceFormat::Xlsb)
        );
        assert_eq!(SourceFormat::from_path(Path::new("notes.txt")), None);
    }
}
