use chrono::NaiveDate;

use super::AccidentRecord;

/// An ordered collection of canonical records. An empty table is still
/// correctly shaped: its columnar form always uses the canonical schema.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AccidentTable {
    records: Vec<AccidentRecord>,
}

impl AccidentTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(records: Vec<AccidentRecord>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[AccidentRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<AccidentRecord> {
        self.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, AccidentRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn push(&mut self, record: AccidentRecord) {
        self.records.push(record);
    }

    /// Stack `records` under the existing rows.
    pub fn extend<I: IntoIterator<Item = AccidentRecord>>(&mut self, records: I) {
        self.records.extend(records);
    }

    /// Stack several tables in order.
    pub fn concat<I: IntoIterator<Item = AccidentTable>>(tables: I) -> Self {
        let mut out = Self::new();
        for t in tables {
            out.records.extend(t.records);
        }
        out
    }

    /// Rows whose date falls in `[start, end]` (either bound optional).
    /// Rows with an unknown date are kept only when no bound is given.
    pub fn filter_date_range(&self, start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        if start.is_none() && end.is_none() {
            return self.clone();
        }
        self.records
            .iter()
            .filter(|r| match r.date {
                Some(d) => start.map_or(true, |s| d >= s) && end.map_or(true, |e| d <= e),
                None => false,
            })
            .cloned()
            .collect()
    }
}

impl FromIterator<AccidentRecord> for AccidentTable {
    fn from_iter<I: IntoIterator<Item = AccidentRecord>>(iter: I) -> Self {
        Self {
            records: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for AccidentTable {
    type Item = AccidentRecord;
    type IntoIter = std::vec::IntoIter<AccidentRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}

impl<'a> IntoIterator for &'a AccidentTable {
    type Item = &'a AccidentRecord;
    type IntoIter = std::slice::Iter<'a, AccidentRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}
