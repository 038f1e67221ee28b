//! Incremental loading of validated parquet files into DuckDB.
//!
//! Every managed table mirrors the columns of its parquet files plus a derived
//! `geometry` column. The `_loaded_files` ledger records each ingested
//! `(table_name, file_name)` pair so a file contributes its rows exactly once,
//! however many times the loader runs over the same folder.

use arrow::datatypes::{DataType, SchemaRef};
use duckdb::{params, Connection};
use log::{debug, info, warn};
use meteo_core::{ensure_parent_dir, list_files_with_extension};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use std::{
    fmt,
    fs::File,
    path::{Path, PathBuf},
    str::FromStr,
};

pub const LOADED_FILES_TABLE: &str = "_loaded_files";
pub const GEOMETRY_COLUMN: &str = "geometry";

const LEDGER_DDL: &str = r#"
CREATE TABLE IF NOT EXISTS _loaded_files (
    table_name VARCHAR,
    file_name VARCHAR,
    load_date TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
    PRIMARY KEY (table_name, file_name)
);
"#;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Failed to query duckdb: {0}")]
    Query(#[from] duckdb::Error),
    #[error("Failed to read parquet file: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),
    #[error("Failed to access files: {0}")]
    Io(#[from] std::io::Error),
    #[error("Table {0} has not been initialized, run init first")]
    NotInitialized(String),
    #[error("No sample file for table {table} in {folder}")]
    MissingSample { table: String, folder: String },
    #[error("Sample file {file} has no column named {column}")]
    MissingColumn { file: String, column: String },
    #[error("Unknown geometry encoding '{0}', expected spatial or struct")]
    UnknownEncoding(String),
}

/// Warehouse tables fed from the validated folder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManagedTable {
    Daily,
    Hourly,
}

impl ManagedTable {
    pub const ALL: [ManagedTable; 2] = [ManagedTable::Daily, ManagedTable::Hourly];

    pub fn name(self) -> &'static str {
        match self {
            ManagedTable::Daily => "daily_data",
            ManagedTable::Hourly => "hourly_data",
        }
    }

    /// File name prefix routing a parquet file to this table
    pub fn file_prefix(self) -> &'static str {
        match self {
            ManagedTable::Daily => "daily_data_",
            ManagedTable::Hourly => "hourly_data_",
        }
    }

    pub fn for_file(file_name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|table| file_name.starts_with(table.file_prefix()))
    }
}

impl fmt::Display for ManagedTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How the geometry point is stored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GeometryEncoding {
    /// `GEOMETRY` built with `ST_Point`, needs the spatial extension
    #[default]
    Spatial,
    /// Plain `STRUCT(x DOUBLE, y DOUBLE)`
    Struct,
}

impl GeometryEncoding {
    pub fn column_type(self) -> &'static str {
        match self {
            GeometryEncoding::Spatial => "GEOMETRY",
            GeometryEncoding::Struct => "STRUCT(x DOUBLE, y DOUBLE)",
        }
    }
}

impl FromStr for GeometryEncoding {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_lowercase().as_str() {
            "spatial" => Ok(GeometryEncoding::Spatial),
            "struct" => Ok(GeometryEncoding::Struct),
            _ => Err(Error::UnknownEncoding(value.to_string())),
        }
    }
}

impl fmt::Display for GeometryEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GeometryEncoding::Spatial => f.write_str("spatial"),
            GeometryEncoding::Struct => f.write_str("struct"),
        }
    }
}

/// Source columns and encoding of the derived geometry column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeometryConfig {
    pub lon_col: String,
    pub lat_col: String,
    pub encoding: GeometryEncoding,
}

impl Default for GeometryConfig {
    fn default() -> Self {
        Self {
            lon_col: "longitude".to_string(),
            lat_col: "latitude".to_string(),
            encoding: GeometryEncoding::default(),
        }
    }
}

impl GeometryConfig {
    /// SQL expression computing the point from a row
    pub fn expression(&self) -> String {
        let lon = quote_ident(&self.lon_col);
        let lat = quote_ident(&self.lat_col);
        match self.encoding {
            GeometryEncoding::Spatial => format!("ST_Point({}, {})", lon, lat),
            GeometryEncoding::Struct => format!("struct_pack(x := {}, y := {})", lon, lat),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedFile {
    pub table: ManagedTable,
    pub file_name: String,
    pub rows: usize,
}

/// Outcome of one `incremental_load` call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub loaded: Vec<LoadedFile>,
    /// Files whose name matches no managed table
    pub skipped: Vec<String>,
    /// Files already present in the ledger
    pub already_loaded: Vec<String>,
}

impl LoadReport {
    pub fn rows_loaded(&self) -> usize {
        self.loaded.iter().map(|file| file.rows).sum()
    }
}

/// A row of the `_loaded_files` ledger
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedFileRecord {
    pub table_name: String,
    pub file_name: String,
    pub load_date: String,
}

pub struct Warehouse {
    conn: Connection,
    geometry: GeometryConfig,
}

impl Warehouse {
    /// Opens (or creates) the warehouse file at `path`
    pub fn open(path: impl AsRef<Path>, geometry: GeometryConfig) -> Result<Self, Error> {
        let path = path.as_ref();
        ensure_parent_dir(path)?;
        let conn = Connection::open(path)?;
        info!("opened warehouse at {}", path.display());
        Self::with_connection(conn, geometry)
    }

    pub fn open_in_memory(geometry: GeometryConfig) -> Result<Self, Error> {
        Self::with_connection(Connection::open_in_memory()?, geometry)
    }

    fn with_connection(conn: Connection, geometry: GeometryConfig) -> Result<Self, Error> {
        if geometry.encoding == GeometryEncoding::Spatial {
            conn.execute_batch("INSTALL spatial; LOAD spatial;")?;
        }
        Ok(Self { conn, geometry })
    }

    pub fn geometry(&self) -> &GeometryConfig {
        &self.geometry
    }

    pub fn is_initialized(&self, table: &str) -> Result<bool, Error> {
        let count: i64 = self.conn.query_row(
            "SELECT count(*) FROM information_schema.tables WHERE table_name = ?",
            params![table],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Creates each table from its sample file's schema, then the ledger.
    ///
    /// Tables that already exist are left untouched.
    pub fn init(&self, samples: &[(ManagedTable, PathBuf)]) -> Result<(), Error> {
        for (table, sample) in samples {
            self.create_table(*table, sample)?;
        }
        self.conn.execute_batch(LEDGER_DDL)?;
        Ok(())
    }

    /// Initializes every table not yet present, using the newest matching file
    /// in `folder` as its sample. Returns the tables that needed a sample.
    pub fn init_from_folder(&self, folder: impl AsRef<Path>) -> Result<Vec<ManagedTable>, Error> {
        let folder = folder.as_ref();
        let files = if folder.is_dir() {
            list_files_with_extension(folder, "parquet")?
        } else {
            vec![]
        };

        let mut samples = vec![];
        for table in ManagedTable::ALL {
            if self.is_initialized(table.name())? {
                debug!("{} already initialized", table);
                continue;
            }
            let newest = files
                .iter()
                .filter(|path| file_name(path).is_some_and(|n| n.starts_with(table.file_prefix())))
                .last();
            match newest {
                Some(path) => samples.push((table, path.clone())),
                None => {
                    return Err(Error::MissingSample {
                        table: table.name().to_string(),
                        folder: folder.display().to_string(),
                    })
                }
            }
        }

        self.init(&samples)?;
        Ok(samples.into_iter().map(|(table, _)| table).collect())
    }

    fn create_table(&self, table: ManagedTable, sample: &Path) -> Result<(), Error> {
        let schema = read_schema(sample)?;
        for column in [&self.geometry.lon_col, &self.geometry.lat_col] {
            if schema.field_with_name(column).is_err() {
                return Err(Error::MissingColumn {
                    file: sample.display().to_string(),
                    column: column.clone(),
                });
            }
        }

        let mut columns: Vec<String> = schema
            .fields()
            .iter()
            .map(|field| format!("{} {}", quote_ident(field.name()), sql_type(field.data_type())))
            .collect();
        columns.push(format!(
            "{} {}",
            quote_ident(GEOMETRY_COLUMN),
            self.geometry.encoding.column_type()
        ));

        let ddl = format!(
            "CREATE TABLE IF NOT EXISTS {} ({});",
            quote_ident(table.name()),
            columns.join(", ")
        );
        debug!("{}", ddl);
        self.conn.execute_batch(&ddl)?;
        info!("table {} ready (sample {})", table, sample.display());
        Ok(())
    }

    /// Loads every parquet file in `folder` not yet recorded in the ledger.
    ///
    /// Files are visited in file name order. Each file's rows and its ledger
    /// entry are written in one transaction.
    pub fn incremental_load(&mut self, folder: impl AsRef<Path>) -> Result<LoadReport, Error> {
        let folder = folder.as_ref();
        if !self.is_initialized(LOADED_FILES_TABLE)? {
            return Err(Error::NotInitialized(LOADED_FILES_TABLE.to_string()));
        }

        let mut report = LoadReport::default();
        for path in list_files_with_extension(folder, "parquet")? {
            let Some(name) = file_name(&path).map(str::to_string) else {
                continue;
            };
            let Some(table) = ManagedTable::for_file(&name) else {
                warn!("skipping {}: no table for this file name", name);
                report.skipped.push(name);
                continue;
            };
            if !self.is_initialized(table.name())? {
                return Err(Error::NotInitialized(table.name().to_string()));
            }
            if self.is_loaded(table, &name)? {
                debug!("{} already loaded into {}", name, table);
                report.already_loaded.push(name);
                continue;
            }

            let rows = self.load_file(table, &path, &name)?;
            info!("loaded {} rows from {} into {}", rows, name, table);
            report.loaded.push(LoadedFile {
                table,
                file_name: name,
                rows,
            });
        }

        info!(
            "incremental load done: {} files loaded, {} already loaded, {} skipped",
            report.loaded.len(),
            report.already_loaded.len(),
            report.skipped.len()
        );
        Ok(report)
    }

    fn is_loaded(&self, table: ManagedTable, file_name: &str) -> Result<bool, Error> {
        let count: i64 = self.conn.query_row(
            "SELECT count(*) FROM _loaded_files WHERE table_name = ? AND file_name = ?",
            params![table.name(), file_name],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn load_file(&mut self, table: ManagedTable, path: &Path, file_name: &str) -> Result<usize, Error> {
        let insert = format!(
            "INSERT INTO {} BY NAME SELECT *, {} AS {} FROM read_parquet({})",
            quote_ident(table.name()),
            self.geometry.expression(),
            quote_ident(GEOMETRY_COLUMN),
            quote_literal(&path.to_string_lossy())
        );
        debug!("{}", insert);

        let tx = self.conn.transaction()?;
        let rows = tx.execute(&insert, [])?;
        tx.execute(
            "INSERT INTO _loaded_files (table_name, file_name) VALUES (?, ?)",
            params![table.name(), file_name],
        )?;
        tx.commit()?;
        Ok(rows)
    }

    pub fn loaded_files(&self) -> Result<Vec<LoadedFileRecord>, Error> {
        if !self.is_initialized(LOADED_FILES_TABLE)? {
            return Err(Error::NotInitialized(LOADED_FILES_TABLE.to_string()));
        }
        let mut stmt = self.conn.prepare(
            "SELECT table_name, file_name, CAST(load_date AS VARCHAR) \
             FROM _loaded_files ORDER BY table_name, file_name",
        )?;
        let records = stmt.query_map([], |row| {
            Ok(LoadedFileRecord {
                table_name: row.get(0)?,
                file_name: row.get(1)?,
                load_date: row.get(2)?,
            })
        })?;
        Ok(records.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn row_count(&self, table: &str) -> Result<i64, Error> {
        if !self.is_initialized(table)? {
            return Err(Error::NotInitialized(table.to_string()));
        }
        let count = self.conn.query_row(
            &format!("SELECT count(*) FROM {}", quote_ident(table)),
            [],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// `(column_name, data_type)` pairs in table order
    pub fn table_columns(&self, table: &str) -> Result<Vec<(String, String)>, Error> {
        let mut stmt = self.conn.prepare(
            "SELECT column_name, data_type FROM information_schema.columns \
             WHERE table_name = ? ORDER BY ordinal_position",
        )?;
        let columns = stmt.query_map(params![table], |row| Ok((row.get(0)?, row.get(1)?)))?;
        Ok(columns.collect::<Result<Vec<_>, _>>()?)
    }
}

fn read_schema(path: &Path) -> Result<SchemaRef, Error> {
    let file = File::open(path)?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
    Ok(builder.schema().clone())
}

fn file_name(path: &Path) -> Option<&str> {
    path.file_name().and_then(|name| name.to_str())
}

/// DuckDB column type for an arrow field type
pub fn sql_type(data_type: &DataType) -> &'static str {
    match data_type {
        DataType::Int8
        | DataType::Int16
        | DataType::Int32
        | DataType::Int64
        | DataType::UInt8
        | DataType::UInt16
        | DataType::UInt32
        | DataType::UInt64 => "BIGINT",
        DataType::Float16 | DataType::Float32 | DataType::Float64 => "DOUBLE",
        DataType::Boolean => "BOOLEAN",
        DataType::Date32 | DataType::Date64 => "DATE",
        DataType::Timestamp(_, _) => "TIMESTAMP",
        _ => "VARCHAR",
    }
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}
