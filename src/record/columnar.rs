// src/record/columnar.rs

use anyhow::{Context, Result};
use arrow::{
    array::{Array, ArrayRef, Date32Array, Float64Array, StringArray},
    datatypes::{DataType, Field, Schema},
    record_batch::RecordBatch,
};
use chrono::{Datelike, NaiveDate};
use std::{collections::BTreeMap, sync::Arc};

use super::{columns, AccidentRecord, AccidentTable, RecordKind};

/// Days between 0001-01-01 and the Unix epoch; Date32 counts from the epoch.
const EPOCH_DAYS_FROM_CE: i32 = 719_163;

/// Arrow schema of a canonical table:
///
/// | column         | type    | null |
/// |----------------|---------|------|
/// | date           | Date32  | yes  |
/// | region         | Utf8    | no   |
/// | accident_type  | Utf8    | no   |
/// | accident_count | Float64 | no   |
/// | fatal_count    | Float64 | yes  |
/// | fatal_rate     | Float64 | yes  |
/// | vehicle_type   | Utf8    | yes  |
/// | road_type      | Utf8    | yes  |
/// | lat, lon       | Float64 | yes  |
/// | kind           | Utf8    | no   |
/// | extra          | Utf8    | yes  | (JSON object)
pub fn canonical_schema() -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new(columns::DATE, DataType::Date32, true),
        Field::new(columns::REGION, DataType::Utf8, false),
        Field::new(columns::ACCIDENT_TYPE, DataType::Utf8, false),
        Field::new(columns::ACCIDENT_COUNT, DataType::Float64, false),
        Field::new(columns::FATAL_COUNT, DataType::Float64, true),
        Field::new(columns::FATAL_RATE, DataType::Float64, true),
        Field::new(columns::VEHICLE_TYPE, DataType::Utf8, true),
        Field::new(columns::ROAD_TYPE, DataType::Utf8, true),
        Field::new(columns::LAT, DataType::Float64, true),
        Field::new(columns::LON, DataType::Float64, true),
        Field::new(columns::KIND, DataType::Utf8, false),
        Field::new(columns::EXTRA, DataType::Utf8, true),
    ]))
}

fn date_to_days(d: NaiveDate) -> i32 {
    d.num_days_from_ce() - EPOCH_DAYS_FROM_CE
}

fn days_to_date(days: i32) -> Option<NaiveDate> {
    NaiveDate::from_num_days_from_ce_opt(days + EPOCH_DAYS_FROM_CE)
}

/// Build one `RecordBatch` holding every row of `table`.
pub fn to_record_batch(table: &AccidentTable) -> Result<RecordBatch> {
    let records = table.records();

    let extra: Vec<Option<String>> = records
        .iter()
        .map(|r| {
            if r.extra.is_empty() {
                Ok(None)
            } else {
                serde_json::to_string(&r.extra).map(Some)
            }
        })
        .collect::<Result<_, _>>()
        .context("serializing extra columns")?;

    let cols: Vec<ArrayRef> = vec![
        Arc::new(Date32Array::from(
            records
                .iter()
                .map(|r| r.date.map(date_to_days))
                .collect::<Vec<_>>(),
        )),
        Arc::new(StringArray::from_iter_values(
            records.iter().map(|r| r.region.as_str()),
        )),
        Arc::new(StringArray::from_iter_values(
            records.iter().map(|r| r.accident_type.as_str()),
        )),
        Arc::new(Float64Array::from_iter_values(
            records.iter().map(|r| r.accident_count),
        )),
        Arc::new(Float64Array::from(
            records.iter().map(|r| r.fatal_count).collect::<Vec<_>>(),
        )),
        Arc::new(Float64Array::from(
            records.iter().map(|r| r.fatal_rate).collect::<Vec<_>>(),
        )),
        Arc::new(StringArray::from(
            records
                .iter()
                .map(|r| r.vehicle_type.as_deref())
                .collect::<Vec<_>>(),
        )),
        Arc::new(StringArray::from(
            records
                .iter()
                .map(|r| r.road_type.as_deref())
                .collect::<Vec<_>>(),
        )),
        Arc::new(Float64Array::from(
            records.iter().map(|r| r.lat).collect::<Vec<_>>(),
        )),
        Arc::new(Float64Array::from(
            records.iter().map(|r| r.lon).collect::<Vec<_>>(),
        )),
        Arc::new(StringArray::from_iter_values(
            records.iter().map(|r| r.kind.as_str()),
        )),
        Arc::new(StringArray::from(extra)),
    ];

    RecordBatch::try_new(canonical_schema(), cols).context("building canonical record batch")
}

fn column<'a, T: Array + 'static>(batch: &'a RecordBatch, name: &str) -> Result<&'a T> {
    batch
        .column_by_name(name)
        .with_context(|| format!("snapshot is missing column `{}`", name))?
        .as_any()
        .downcast_ref::<T>()
        .with_context(|| format!("column `{}` has an unexpected type", name))
}

fn opt_f64(arr: &Float64Array, i: usize) -> Option<f64> {
    (!arr.is_null(i)).then(|| arr.value(i))
}

fn opt_string(arr: &StringArray, i: usize) -> Option<String> {
    (!arr.is_null(i)).then(|| arr.value(i).to_string())
}

/// Inverse of [`to_record_batch`].
pub fn from_record_batch(batch: &RecordBatch) -> Result<Vec<AccidentRecord>> {
    let date = column::<Date32Array>(batch, columns::DATE)?;
    let region = column::<StringArray>(batch, columns::REGION)?;
    let accident_type = column::<StringArray>(batch, columns::ACCIDENT_TYPE)?;
    let accident_count = column::<Float64Array>(batch, columns::ACCIDENT_COUNT)?;
    let fatal_count = column::<Float64Array>(batch, columns::FATAL_COUNT)?;
    let fatal_rate = column::<Float64Array>(batch, columns::FATAL_RATE)?;
    let vehicle_type = column::<StringArray>(batch, columns::VEHICLE_TYPE)?;
    let road_type = column::<StringArray>(batch, columns::ROAD_TYPE)?;
    let lat = column::<Float64Array>(batch, columns::LAT)?;
    let lon = column::<Float64Array>(batch, columns::LON)?;
    let kind = column::<StringArray>(batch, columns::KIND)?;
    let extra = column::<StringArray>(batch, columns::EXTRA)?;

    (0..batch.num_rows())
        .map(|i| {
            let kind: RecordKind = kind
                .value(i)
                .parse()
                .with_context(|| format!("reading kind at row {}", i))?;
            let extra: BTreeMap<String, String> = match opt_string(extra, i) {
                Some(json) => serde_json::from_str(&json)
                    .with_context(|| format!("parsing extra columns at row {}", i))?,
                None => BTreeMap::new(),
            };

            Ok(AccidentRecord {
                date: if date.is_null(i) {
                    None
                } else {
                    days_to_date(date.value(i))
                },
                region: region.value(i).to_string(),
                accident_type: accident_type.value(i).to_string(),
                accident_count: accident_count.value(i),
                fatal_count: opt_f64(fatal_count, i),
                fatal_rate: opt_f64(fatal_rate, i),
                vehicle_type: opt_string(vehicle_type, i),
                road_type: opt_string(road_type, i),
                lat: opt_f64(lat, i),
                lon: opt_f64(lon, i),
                kind,
                extra,
            })
        })
        .collect()
}
