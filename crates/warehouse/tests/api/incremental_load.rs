use std::fs;
use time::macros::date;
use warehouse::{Error, GeometryConfig, ManagedTable, Warehouse, LOADED_FILES_TABLE};

use crate::helpers::{geometry, write_day};

#[test]
fn second_load_without_new_files_is_a_no_op() {
    let tmp = tempfile::tempdir().unwrap();
    let validated = tmp.path().join("validated");
    write_day(&validated, date!(2026 - 01 - 01));

    let mut warehouse = Warehouse::open(tmp.path().join("dwh.duckdb"), geometry()).unwrap();
    warehouse.init_from_folder(&validated).unwrap();

    let first = warehouse.incremental_load(&validated).unwrap();
    assert_eq!(first.loaded.len(), 2);
    assert_eq!(first.rows_loaded(), 10);

    let second = warehouse.incremental_load(&validated).unwrap();
    assert!(second.loaded.is_empty());
    assert_eq!(second.already_loaded.len(), 2);

    assert_eq!(warehouse.row_count("daily_data").unwrap(), 4);
    assert_eq!(warehouse.row_count("hourly_data").unwrap(), 6);
    assert_eq!(warehouse.loaded_files().unwrap().len(), 2);
}

#[test]
fn each_file_is_loaded_exactly_once_across_runs() {
    let tmp = tempfile::tempdir().unwrap();
    let validated = tmp.path().join("validated");
    let db_path = tmp.path().join("warehouse/dwh.duckdb");
    write_day(&validated, date!(2026 - 01 - 01));

    {
        let mut warehouse = Warehouse::open(&db_path, geometry()).unwrap();
        warehouse.init_from_folder(&validated).unwrap();
        warehouse.incremental_load(&validated).unwrap();
    }

    write_day(&validated, date!(2026 - 01 - 02));
    write_day(&validated, date!(2026 - 01 - 03));

    // a fresh process reopens the same store
    let mut warehouse = Warehouse::open(&db_path, geometry()).unwrap();
    let report = warehouse.incremental_load(&validated).unwrap();
    let loaded: Vec<_> = report.loaded.iter().map(|f| f.file_name.as_str()).collect();
    assert_eq!(
        loaded,
        vec![
            "daily_data_2026-01-02.parquet",
            "daily_data_2026-01-03.parquet",
            "hourly_data_2026-01-02.parquet",
            "hourly_data_2026-01-03.parquet",
        ]
    );
    assert_eq!(report.already_loaded.len(), 2);

    for _ in 0..3 {
        warehouse.incremental_load(&validated).unwrap();
    }

    assert_eq!(warehouse.row_count("daily_data").unwrap(), 12);
    assert_eq!(warehouse.row_count("hourly_data").unwrap(), 18);

    let ledger = warehouse.loaded_files().unwrap();
    assert_eq!(ledger.len(), 6);
    assert!(ledger
        .iter()
        .filter(|r| r.table_name == "daily_data")
        .all(|r| r.file_name.starts_with("daily_data_")));
    assert!(ledger.iter().all(|r| !r.load_date.is_empty()));
}

#[test]
fn init_twice_keeps_the_schema() {
    let tmp = tempfile::tempdir().unwrap();
    let validated = tmp.path().join("validated");
    let db_path = tmp.path().join("dwh.duckdb");
    write_day(&validated, date!(2026 - 01 - 01));

    let mut warehouse = Warehouse::open(&db_path, geometry()).unwrap();
    let created = warehouse.init_from_folder(&validated).unwrap();
    assert_eq!(created, vec![ManagedTable::Daily, ManagedTable::Hourly]);
    warehouse.incremental_load(&validated).unwrap();
    let columns = warehouse.table_columns("daily_data").unwrap();
    drop(warehouse);

    let warehouse = Warehouse::open(&db_path, geometry()).unwrap();
    assert!(warehouse.init_from_folder(&validated).unwrap().is_empty());
    warehouse
        .init(&[(
            ManagedTable::Daily,
            validated.join("daily_data_2026-01-01.parquet"),
        )])
        .unwrap();

    assert_eq!(warehouse.table_columns("daily_data").unwrap(), columns);
    assert_eq!(warehouse.row_count("daily_data").unwrap(), 4);
}

#[test]
fn tables_use_final_column_types() {
    let tmp = tempfile::tempdir().unwrap();
    let validated = tmp.path().join("validated");
    write_day(&validated, date!(2026 - 01 - 01));

    let warehouse = Warehouse::open(tmp.path().join("dwh.duckdb"), geometry()).unwrap();
    warehouse.init_from_folder(&validated).unwrap();

    let daily = warehouse.table_columns("daily_data").unwrap();
    assert_eq!(daily.len(), 20);
    let type_of = |columns: &[(String, String)], name: &str| {
        columns
            .iter()
            .find(|(column, _)| column == name)
            .map(|(_, data_type)| data_type.clone())
            .unwrap()
    };
    assert_eq!(type_of(&daily, "time"), "DATE");
    assert_eq!(type_of(&daily, "sunrise"), "TIMESTAMP");
    assert_eq!(type_of(&daily, "precipitation_probability_max"), "BIGINT");
    assert_eq!(type_of(&daily, "city"), "VARCHAR");
    assert_eq!(type_of(&daily, "log_time"), "TIMESTAMP");
    assert_eq!(daily.last().unwrap().0, "geometry");
    assert_eq!(daily.last().unwrap().1, "STRUCT(x DOUBLE, y DOUBLE)");

    let hourly = warehouse.table_columns("hourly_data").unwrap();
    assert_eq!(hourly.len(), 13);
    assert_eq!(type_of(&hourly, "time"), "TIMESTAMP");
    assert_eq!(type_of(&hourly, "temperature_2m"), "DOUBLE");
}

#[test]
fn foreign_files_are_skipped() {
    let tmp = tempfile::tempdir().unwrap();
    let validated = tmp.path().join("validated");
    write_day(&validated, date!(2026 - 01 - 01));
    fs::copy(
        validated.join("daily_data_2026-01-01.parquet"),
        validated.join("notes.parquet"),
    )
    .unwrap();
    fs::write(validated.join("README.txt"), "not a parquet file").unwrap();

    let mut warehouse = Warehouse::open(tmp.path().join("dwh.duckdb"), geometry()).unwrap();
    warehouse.init_from_folder(&validated).unwrap();
    let report = warehouse.incremental_load(&validated).unwrap();

    assert_eq!(report.skipped, vec!["notes.parquet".to_string()]);
    assert_eq!(report.loaded.len(), 2);
    assert!(warehouse
        .loaded_files()
        .unwrap()
        .iter()
        .all(|r| r.file_name != "notes.parquet"));
    assert_eq!(warehouse.row_count("daily_data").unwrap(), 4);
}

#[test]
fn loading_before_init_fails() {
    let tmp = tempfile::tempdir().unwrap();
    let validated = tmp.path().join("validated");
    write_day(&validated, date!(2026 - 01 - 01));

    let mut warehouse = Warehouse::open(tmp.path().join("dwh.duckdb"), geometry()).unwrap();
    let err = warehouse.incremental_load(&validated).unwrap_err();
    assert!(matches!(err, Error::NotInitialized(ref table) if table == LOADED_FILES_TABLE));
    assert!(!warehouse.is_initialized("daily_data").unwrap());
}

#[test]
fn init_needs_a_sample_per_table() {
    let tmp = tempfile::tempdir().unwrap();
    let warehouse = Warehouse::open(tmp.path().join("dwh.duckdb"), geometry()).unwrap();
    let err = warehouse
        .init_from_folder(tmp.path().join("empty"))
        .unwrap_err();
    assert!(matches!(err, Error::MissingSample { .. }));
}

#[test]
#[ignore = "downloads the DuckDB spatial extension"]
fn default_geometry_is_a_spatial_point() {
    let tmp = tempfile::tempdir().unwrap();
    let validated = tmp.path().join("validated");
    write_day(&validated, date!(2026 - 01 - 01));

    let mut warehouse =
        Warehouse::open(tmp.path().join("dwh.duckdb"), GeometryConfig::default()).unwrap();
    warehouse.init_from_folder(&validated).unwrap();
    let report = warehouse.incremental_load(&validated).unwrap();
    assert_eq!(report.rows_loaded(), 10);

    let daily = warehouse.table_columns("daily_data").unwrap();
    assert_eq!(
        daily.last().unwrap(),
        &("geometry".to_string(), "GEOMETRY".to_string())
    );
    assert_eq!(warehouse.row_count("hourly_data").unwrap(), 6);
}
