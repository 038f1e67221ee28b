use arrow::array::{ArrayRef, Float64Array, StringArray, TimestampMicrosecondArray};
use arrow::compute::concat_batches;
use arrow::datatypes::{DataType, Field, Schema as ArrowSchema, TimeUnit};
use arrow::record_batch::RecordBatch;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::{fs, path::Path, sync::Arc};
use time::OffsetDateTime;

use crate::validation::{cast, timestamp_micros, Error};
use crate::RecordKind;

/// One location's API response, with the injected `city`
#[derive(Debug, Clone, Deserialize)]
pub struct RawResponse {
    pub latitude: f64,
    pub longitude: f64,
    pub city: String,
    pub hourly: Map<String, Value>,
    pub daily: Map<String, Value>,
}

impl RawResponse {
    pub fn records(&self, kind: RecordKind) -> &Map<String, Value> {
        match kind {
            RecordKind::Hourly => &self.hourly,
            RecordKind::Daily => &self.daily,
        }
    }
}

/// Strictly typed table of one record kind: final schema columns followed by
/// `latitude`, `longitude`, `city` and `log_time`
#[derive(Debug, Clone)]
pub struct TypedTable {
    kind: RecordKind,
    batch: RecordBatch,
}

impl TypedTable {
    pub fn kind(&self) -> RecordKind {
        self.kind
    }

    pub fn batch(&self) -> &RecordBatch {
        &self.batch
    }

    pub fn num_rows(&self) -> usize {
        self.batch.num_rows()
    }

    pub fn num_columns(&self) -> usize {
        self.batch.num_columns()
    }

    pub fn column_names(&self) -> Vec<String> {
        self.batch
            .schema()
            .fields()
            .iter()
            .map(|field| field.name().clone())
            .collect()
    }

    pub fn column(&self, name: &str) -> Option<&ArrayRef> {
        self.batch.column_by_name(name)
    }
}

/// Read a raw batch file (`raw_<date>.json`)
pub fn read_batch(path: impl AsRef<Path>) -> Result<Vec<RawResponse>, Error> {
    let content = fs::read_to_string(path)?;
    parse_batch(&content)
}

pub fn parse_batch(content: &str) -> Result<Vec<RawResponse>, Error> {
    let values: Vec<Value> = serde_json::from_str(content)?;
    values
        .into_iter()
        .enumerate()
        .map(|(index, value)| {
            serde_json::from_value(value).map_err(|e| Error::SchemaMismatch {
                context: format!("location #{}", index),
                reason: e.to_string(),
            })
        })
        .collect()
}

/// Build the hourly and daily tables for a whole batch, stamped with the current time
pub fn assemble(batch: &[RawResponse]) -> Result<(TypedTable, TypedTable), Error> {
    assemble_at(batch, OffsetDateTime::now_utc())
}

/// Build the hourly and daily tables for a whole batch.
///
/// Locations are processed in order and their rows concatenated in that order.
/// The first location that fails validation fails the whole batch.
pub fn assemble_at(
    batch: &[RawResponse],
    log_time: OffsetDateTime,
) -> Result<(TypedTable, TypedTable), Error> {
    if batch.is_empty() {
        return Err(Error::EmptyBatch);
    }

    let log_time = timestamp_micros(log_time);
    let mut hourly = Vec::with_capacity(batch.len());
    let mut daily = Vec::with_capacity(batch.len());

    for (index, response) in batch.iter().enumerate() {
        for kind in RecordKind::ALL {
            let context = format!("{} data of location #{} ({})", kind, index, response.city);
            let typed = cast(response.records(kind), &kind.schemas())
                .and_then(|typed| with_metadata(typed, response, log_time))
                .map_err(|e| e.within(context))?;
            match kind {
                RecordKind::Hourly => hourly.push(typed),
                RecordKind::Daily => daily.push(typed),
            }
        }
    }

    Ok((
        concat(RecordKind::Hourly, hourly)?,
        concat(RecordKind::Daily, daily)?,
    ))
}

fn with_metadata(
    typed: RecordBatch,
    response: &RawResponse,
    log_time: i64,
) -> Result<RecordBatch, Error> {
    let rows = typed.num_rows();
    let schema = typed.schema();

    let mut fields: Vec<Field> = schema
        .fields()
        .iter()
        .map(|field| field.as_ref().clone())
        .collect();
    fields.extend([
        Field::new("latitude", DataType::Float64, false),
        Field::new("longitude", DataType::Float64, false),
        Field::new("city", DataType::Utf8, false),
        Field::new(
            "log_time",
            DataType::Timestamp(TimeUnit::Microsecond, None),
            false,
        ),
    ]);

    let mut columns = typed.columns().to_vec();
    columns.extend([
        Arc::new(Float64Array::from(vec![response.latitude; rows])) as ArrayRef,
        Arc::new(Float64Array::from(vec![response.longitude; rows])) as ArrayRef,
        Arc::new(StringArray::from(vec![response.city.as_str(); rows])) as ArrayRef,
        Arc::new(TimestampMicrosecondArray::from(vec![log_time; rows])) as ArrayRef,
    ]);

    Ok(RecordBatch::try_new(
        Arc::new(ArrowSchema::new(fields)),
        columns,
    )?)
}

fn concat(kind: RecordKind, tables: Vec<RecordBatch>) -> Result<TypedTable, Error> {
    let schema = match tables.first() {
        Some(first) => first.schema(),
        None => return Err(Error::EmptyBatch),
    };

    if let Some(index) = tables.iter().position(|t| t.schema() != schema) {
        return Err(Error::SchemaMismatch {
            context: format!("{} table", kind),
            reason: format!("columns of location #{} differ from location #0", index),
        });
    }

    let batch = concat_batches(&schema, &tables)?;
    Ok(TypedTable { kind, batch })
}
