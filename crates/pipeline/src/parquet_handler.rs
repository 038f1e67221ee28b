use arrow::datatypes::SchemaRef;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::basic::{Compression, GzipLevel, ZstdLevel};
use parquet::file::properties::WriterProperties;
use slog::{error, info, Logger};
use std::fs::File;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use time::Date;

use crate::{RecordKind, TypedTable};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),
    #[error("Unsupported compression: {0}")]
    Compression(String),
}

/// What the read-back of a written file found
#[derive(Debug, Clone)]
pub struct FileSummary {
    pub path: PathBuf,
    pub rows: usize,
    pub columns: usize,
    pub schema: SchemaRef,
}

/// `hourly_data_2026-01-01.parquet`, `daily_data_2026-01-01.parquet`
pub fn output_file_name(kind: RecordKind, date: Date) -> String {
    format!("{}_{}.parquet", kind.table_name(), date)
}

/// A fully written temporary file waiting to replace its target.
/// Dropping it removes the temporary file.
struct Staged {
    file: NamedTempFile,
    target: PathBuf,
}

impl Staged {
    fn persist(self) -> Result<PathBuf, Error> {
        self.file
            .persist(&self.target)
            .map_err(|e| Error::Io(e.error))?;
        Ok(self.target)
    }
}

pub struct ParquetWriter {
    logger: Logger,
    compression: Compression,
}

impl ParquetWriter {
    pub fn new(logger: Logger) -> Self {
        Self {
            logger,
            compression: Compression::SNAPPY,
        }
    }

    pub fn with_compression(mut self, compression: &str) -> Result<Self, Error> {
        self.compression = match compression.to_lowercase().as_str() {
            "snappy" => Compression::SNAPPY,
            "gzip" => Compression::GZIP(GzipLevel::default()),
            "lz4" => Compression::LZ4,
            "zstd" => Compression::ZSTD(ZstdLevel::default()),
            "none" => Compression::UNCOMPRESSED,
            other => return Err(Error::Compression(other.to_string())),
        };
        Ok(self)
    }

    /// Write both tables as `<kind>_data_<date>.parquet` into `folder`, then read them back.
    ///
    /// Both tables are staged as temporary files in `folder` before either is
    /// renamed into place, so a failed write leaves the previous pair of the
    /// day untouched. A failed read-back is logged, the written files stay in
    /// place.
    pub fn write(
        &self,
        hourly: &TypedTable,
        daily: &TypedTable,
        folder: &Path,
        date: Date,
    ) -> Result<(PathBuf, PathBuf), Error> {
        meteo_core::create_dir_all(folder)?;

        let staged_hourly = self.stage(hourly, folder, date)?;
        let staged_daily = self.stage(daily, folder, date)?;

        let daily_path = staged_daily.persist()?;
        let hourly_path = staged_hourly.persist()?;
        for (table, path) in [(hourly, &hourly_path), (daily, &daily_path)] {
            info!(
                self.logger,
                "wrote {} {} rows to {}",
                table.num_rows(),
                table.kind(),
                path.display()
            );
        }

        for path in [&hourly_path, &daily_path] {
            if let Err(e) = self.sanity_check(path) {
                error!(self.logger, "sanity check of {} failed: {}", path.display(), e);
            }
        }

        Ok((hourly_path, daily_path))
    }

    /// Write one table on its own, through a temporary file renamed into place
    pub fn write_table(
        &self,
        table: &TypedTable,
        folder: &Path,
        date: Date,
    ) -> Result<PathBuf, Error> {
        let path = self.stage(table, folder, date)?.persist()?;
        info!(
            self.logger,
            "wrote {} {} rows to {}",
            table.num_rows(),
            table.kind(),
            path.display()
        );
        Ok(path)
    }

    fn stage(&self, table: &TypedTable, folder: &Path, date: Date) -> Result<Staged, Error> {
        let file_name = output_file_name(table.kind(), date);

        let mut file = tempfile::Builder::new()
            .prefix(&format!(".{}", file_name))
            .suffix(".tmp")
            .tempfile_in(folder)?;

        let props = WriterProperties::builder()
            .set_compression(self.compression)
            .build();
        let mut writer = ArrowWriter::try_new(file.as_file_mut(), table.batch().schema(), Some(props))?;
        writer.write(table.batch())?;
        writer.close()?;

        Ok(Staged {
            file,
            target: folder.join(file_name),
        })
    }

    /// Read a parquet file back completely and report its shape
    pub fn sanity_check(&self, path: &Path) -> Result<FileSummary, Error> {
        let file = File::open(path)?;
        let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
        let schema = builder.schema().clone();
        let reader = builder.build()?;

        let mut rows = 0;
        for batch in reader {
            rows += batch?.num_rows();
        }

        let summary = FileSummary {
            path: path.to_path_buf(),
            rows,
            columns: schema.fields().len(),
            schema,
        };
        info!(
            self.logger,
            "read back {}: {} rows, {} columns",
            path.display(),
            summary.rows,
            summary.columns
        );
        Ok(summary)
    }
}
