use crate::read::RawTable;
use crate::record::{AccidentRecord, RecordKind};

/// Rest-area rows are stacked as-is: canonical fields stay at their
/// sentinels and every non-empty source cell goes into `extra`.
pub fn normalize(table: &RawTable) -> Vec<AccidentRecord> {
    table
        .rows
        .iter()
        .map(|row| AccidentRecord {
            kind: RecordKind::RestArea,
            extra: table
                .headers
                .iter()
                .zip(row.iter())
                .filter_map(|(header, cell)| Some((header.clone(), cell.as_text()?)))
                .collect(),
            ..Default::default()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::test_support::*;
    use crate::read::RawValue;

    #[test]
    fn keeps_source_columns_verbatim() {
        let tbl = table(
            &["휴게소명", "노선명", "위도"],
            vec![vec![t("망향"), RawValue::Empty, t("36.8")]],
        );
        let records = normalize(&tbl);
        let r = &records[0];

        assert_eq!(r.kind, RecordKind::RestArea);
        assert_eq!(r.extra.len(), 2);
        assert_eq!(r.extra["휴게소명"], "망향");
        assert_eq!(r.extra["위도"], "36.8");
        assert_eq!(r.lat, None);
    }
}
