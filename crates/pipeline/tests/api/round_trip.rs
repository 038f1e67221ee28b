use arrow::array::{Array, Float64Array, Int64Array};
use arrow::datatypes::{DataType, TimeUnit};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use pipeline::{
    assemble, read_batch, validation, ColumnType, ParquetWriter, RecordKind, TypedTable,
};
use serde_json::json;
use std::fs::{self, File};
use std::path::Path;
use time::macros::date;

use crate::helpers::{discard_logger, location, write_raw};

fn expected_type(column_type: ColumnType) -> DataType {
    column_type.arrow_type()
}

fn assert_final_types(table: &TypedTable, path: &Path) {
    let file = File::open(path).unwrap();
    let reader = ParquetRecordBatchReaderBuilder::try_new(file).unwrap();
    let schema = reader.schema().clone();

    let pair = table.kind().schemas();
    for field in pair.target().fields() {
        let stored = schema.field_with_name(&field.name).unwrap();
        assert_eq!(
            stored.data_type(),
            &expected_type(field.column_type),
            "column {}",
            field.name
        );
    }
    assert_eq!(
        schema.field_with_name("log_time").unwrap().data_type(),
        &DataType::Timestamp(TimeUnit::Microsecond, None)
    );
    assert_eq!(schema.fields().len(), pair.target().len() + 4);
}

#[test]
fn raw_file_survives_parquet_round_trip() {
    let tmp = tempfile::tempdir().unwrap();
    let raw = write_raw(tmp.path());
    let validated = tmp.path().join("validated");

    let batch = read_batch(&raw).unwrap();
    let (hourly, daily) = assemble(&batch).unwrap();

    let writer = ParquetWriter::new(discard_logger());
    let (hourly_path, daily_path) = writer
        .write(&hourly, &daily, &validated, date!(2026 - 01 - 01))
        .unwrap();

    assert_eq!(hourly_path, validated.join("hourly_data_2026-01-01.parquet"));
    assert_eq!(daily_path, validated.join("daily_data_2026-01-01.parquet"));
    assert_final_types(&hourly, &hourly_path);
    assert_final_types(&daily, &daily_path);

    let summary = writer.sanity_check(&daily_path).unwrap();
    assert_eq!(summary.rows, 4);
    assert_eq!(summary.columns, 19);

    // numeric values come back bit for bit
    let file = File::open(&hourly_path).unwrap();
    let mut reader = ParquetRecordBatchReaderBuilder::try_new(file)
        .unwrap()
        .build()
        .unwrap();
    let read = reader.next().unwrap().unwrap();
    let temperature = read
        .column_by_name("temperature_2m")
        .unwrap()
        .as_any()
        .downcast_ref::<Float64Array>()
        .unwrap();
    let values: Vec<f64> = (0..temperature.len()).map(|i| temperature.value(i)).collect();
    assert_eq!(values, vec![1.25, 0.5, 2.0, 1.25]);

    let probability = read
        .column_by_name("precipitation_probability")
        .unwrap()
        .as_any()
        .downcast_ref::<Int64Array>()
        .unwrap();
    assert_eq!(probability.value(3), 40);
}

#[test]
fn same_day_rerun_replaces_files() {
    let tmp = tempfile::tempdir().unwrap();
    let raw = write_raw(tmp.path());
    let validated = tmp.path().join("validated");
    let writer = ParquetWriter::new(discard_logger());

    let batch = read_batch(&raw).unwrap();
    let (hourly, daily) = assemble(&batch[..1]).unwrap();
    writer
        .write(&hourly, &daily, &validated, date!(2026 - 01 - 01))
        .unwrap();

    let (hourly, daily) = assemble(&batch).unwrap();
    let (_, daily_path) = writer
        .write(&hourly, &daily, &validated, date!(2026 - 01 - 01))
        .unwrap();

    assert_eq!(writer.sanity_check(&daily_path).unwrap().rows, 4);
    let leftovers: Vec<_> = fs::read_dir(&validated)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    assert_eq!(leftovers.len(), 2, "unexpected files: {:?}", leftovers);
}

#[test]
fn malformed_location_produces_no_output() {
    let tmp = tempfile::tempdir().unwrap();
    let raw = tmp.path().join("raw_2026-01-01.json");
    let mut broken = location("Vienna", 48.21, 16.37, 0.0);
    broken["hourly"]["time"] = json!(["2026-01-01T00:00", "yesterday"]);
    fs::write(
        &raw,
        json!([location("Sopron", 47.68, 16.58, 0.0), broken]).to_string(),
    )
    .unwrap();

    let batch = read_batch(&raw).unwrap();
    let err = assemble(&batch).unwrap_err();
    assert!(matches!(err, validation::Error::TypeCast { .. }));
    assert!(!tmp.path().join("validated").exists());
}

#[test]
fn record_kinds_map_to_table_names() {
    assert_eq!(RecordKind::Hourly.table_name(), "hourly_data");
    assert_eq!(RecordKind::Daily.table_name(), "daily_data");
}

#[test]
fn failed_daily_write_keeps_previous_hourly_file() {
    let tmp = tempfile::tempdir().unwrap();
    let raw = write_raw(tmp.path());
    let validated = tmp.path().join("validated");

    let hourly_target = validated.join("hourly_data_2026-01-01.parquet");
    fs::create_dir_all(&validated).unwrap();
    fs::write(&hourly_target, b"previous run").unwrap();
    // a non-empty directory where the daily file should go makes its rename fail
    fs::create_dir_all(validated.join("daily_data_2026-01-01.parquet/occupied")).unwrap();

    let batch = read_batch(&raw).unwrap();
    let (hourly, daily) = assemble(&batch).unwrap();
    let writer = ParquetWriter::new(discard_logger());
    assert!(writer
        .write(&hourly, &daily, &validated, date!(2026 - 01 - 01))
        .is_err());

    assert_eq!(fs::read(&hourly_target).unwrap(), b"previous run");
    let temp_files: Vec<_> = fs::read_dir(&validated)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .filter(|name| name.ends_with(".tmp"))
        .collect();
    assert!(temp_files.is_empty(), "temporary files left: {:?}", temp_files);
}
