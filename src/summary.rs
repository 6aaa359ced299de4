//! Aggregates the dashboard computes over a canonical table: the headline
//! metric cards and per-axis totals behind the time, region and type charts.

use std::collections::BTreeMap;

use crate::record::{AccidentRecord, AccidentTable, RecordKind};

/// Headline numbers over the `accident_count` of accident rows.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeyMetrics {
    pub rows: usize,
    pub total: f64,
    pub mean: f64,
    pub max: f64,
    pub min: f64,
}

impl KeyMetrics {
    /// `None` when the table has no accident rows.
    pub fn from_table(table: &AccidentTable) -> Option<Self> {
        let counts: Vec<f64> = accidents(table).map(|r| r.accident_count).collect();
        if counts.is_empty() {
            return None;
        }
        let total: f64 = counts.iter().sum();
        Some(Self {
            rows: counts.len(),
            total,
            mean: total / counts.len() as f64,
            max: counts.iter().copied().fold(f64::MIN, f64::max),
            min: counts.iter().copied().fold(f64::MAX, f64::min),
        })
    }
}

fn accidents(table: &AccidentTable) -> impl Iterator<Item = &AccidentRecord> {
    table.iter().filter(|r| r.kind == RecordKind::Accident)
}

fn totals_by<K: Ord>(
    table: &AccidentTable,
    key: impl Fn(&AccidentRecord) -> Option<K>,
) -> BTreeMap<K, f64> {
    let mut out = BTreeMap::new();
    for r in accidents(table) {
        if let Some(k) = key(r) {
            *out.entry(k).or_insert(0.0) += r.accident_count;
        }
    }
    out
}

/// Accident totals per year; rows with an unknown date are left out.
pub fn totals_by_year(table: &AccidentTable) -> BTreeMap<i32, f64> {
    totals_by(table, AccidentRecord::year)
}

pub fn totals_by_region(table: &AccidentTable) -> BTreeMap<String, f64> {
    totals_by(table, |r| Some(r.region.clone()))
}

pub fn totals_by_accident_type(table: &AccidentTable) -> BTreeMap<String, f64> {
    totals_by(table, |r| Some(r.accident_type.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn rec(year: Option<i32>, region: &str, ty: &str, count: f64) -> AccidentRecord {
        AccidentRecord {
            date: year.and_then(|y| NaiveDate::from_ymd_opt(y, 1, 1)),
            region: region.into(),
            accident_type: ty.into(),
            accident_count: count,
            ..Default::default()
        }
    }

    fn sample() -> AccidentTable {
        AccidentTable::from_records(vec![
            rec(Some(2019), "서울", "추돌", 10.0),
            rec(Some(2019), "부산", "측면", 30.0),
            rec(Some(2020), "서울", "추돌", 20.0),
            rec(None, "서울", "기타", 40.0),
            AccidentRecord {
                kind: RecordKind::RestArea,
                accident_count: 1000.0,
                ..Default::default()
            },
        ])
    }

    #[test]
    fn key_metrics_skip_rest_areas() {
        let m = KeyMetrics::from_table(&sample()).unwrap();
        assert_eq!(m.rows, 4);
        assert_eq!(m.total, 100.0);
        assert_eq!(m.mean, 25.0);
        assert_eq!(m.max, 40.0);
        assert_eq!(m.min, 10.0);

        assert_eq!(KeyMetrics::from_table(&AccidentTable::new()), None);
    }

    #[test]
    fn grouped_totals() {
        let table = sample();
        assert_eq!(
            totals_by_year(&table).into_iter().collect::<Vec<_>>(),
            vec![(2019, 40.0), (2020, 20.0)]
        );
        assert_eq!(totals_by_region(&table)["서울"], 70.0);
        assert_eq!(totals_by_accident_type(&table)["추돌"], 30.0);
        assert!(!totals_by_region(&table).contains_key("미상"));
    }
}
