use arrow::array::{
    new_null_array, ArrayRef, Date32Array, Float64Array, Int64Array, StringArray,
    TimestampMicrosecondArray,
};
use arrow::datatypes::{Field, Schema as ArrowSchema};
use arrow::record_batch::RecordBatch;
use serde_json::{Map, Value};
use std::sync::Arc;
use time::{macros::format_description, Date, OffsetDateTime, PrimitiveDateTime};

use crate::{ColumnType, SchemaPair};

/// Julian day number of 1970-01-01
const UNIX_EPOCH_JULIAN_DAY: i32 = 2_440_588;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Schema mismatch in {context}: {reason}")]
    SchemaMismatch { context: String, reason: String },
    #[error("Failed to cast {context} field '{field}' to {target}: {reason}")]
    TypeCast {
        context: String,
        field: String,
        target: ColumnType,
        reason: String,
    },
    #[error("Batch contains no locations")]
    EmptyBatch,
    #[error("Failed to read raw data: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to decode raw JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Failed to build table: {0}")]
    Arrow(#[from] arrow::error::ArrowError),
}

impl Error {
    fn mismatch(reason: impl Into<String>) -> Self {
        Error::SchemaMismatch {
            context: String::from("record"),
            reason: reason.into(),
        }
    }

    /// Replace the context of a schema or cast error, e.g. with the location it came from
    pub fn within(self, new_context: impl Into<String>) -> Self {
        match self {
            Error::SchemaMismatch { reason, .. } => Error::SchemaMismatch {
                context: new_context.into(),
                reason,
            },
            Error::TypeCast {
                field,
                target,
                reason,
                ..
            } => Error::TypeCast {
                context: new_context.into(),
                field,
                target,
                reason,
            },
            other => other,
        }
    }
}

/// Column read straight from the JSON arrays, before promotion
#[derive(Debug)]
enum RawColumn {
    Strings(Vec<Option<String>>),
    Ints(Vec<Option<i64>>),
    Floats(Vec<Option<f64>>),
}

impl RawColumn {
    fn len(&self) -> usize {
        match self {
            RawColumn::Strings(v) => v.len(),
            RawColumn::Ints(v) => v.len(),
            RawColumn::Floats(v) => v.len(),
        }
    }
}

/// Validate a columnar record against the raw schema, then promote it to the final schema.
///
/// Either every column validates and casts, or an error is returned; no partial
/// table is ever produced. Fields of the record that the raw schema does not
/// declare are ignored.
pub fn cast(record: &Map<String, Value>, schemas: &SchemaPair) -> Result<RecordBatch, Error> {
    let raw = read_raw(record, schemas)?;
    let num_rows = raw.first().map(|(_, column)| column.len()).unwrap_or(0);

    let mut fields = Vec::with_capacity(schemas.target().len());
    let mut columns: Vec<ArrayRef> = Vec::with_capacity(schemas.target().len());
    for target in schemas.target().fields() {
        let array = match raw.iter().position(|(name, _)| *name == target.name) {
            Some(idx) => promote(&target.name, &raw[idx].1, target.column_type)?,
            // derived column, filled later by whoever owns it
            None => new_null_array(&target.column_type.arrow_type(), num_rows),
        };
        fields.push(Field::new(
            target.name.as_str(),
            target.column_type.arrow_type(),
            true,
        ));
        columns.push(array);
    }

    Ok(RecordBatch::try_new(
        Arc::new(ArrowSchema::new(fields)),
        columns,
    )?)
}

fn read_raw<'a>(
    record: &Map<String, Value>,
    schemas: &'a SchemaPair,
) -> Result<Vec<(&'a str, RawColumn)>, Error> {
    let mut columns: Vec<(&str, RawColumn)> = Vec::with_capacity(schemas.raw().len());

    for field in schemas.raw().fields() {
        let values = match record.get(&field.name) {
            Some(Value::Array(values)) => values,
            Some(_) => {
                return Err(Error::mismatch(format!(
                    "field '{}' is not an array",
                    field.name
                )))
            }
            None => return Err(Error::mismatch(format!("missing field '{}'", field.name))),
        };
        let column = read_column(&field.name, values, field.column_type)?;

        if let Some((first_name, first)) = columns.first() {
            if first.len() != column.len() {
                return Err(Error::mismatch(format!(
                    "field '{}' has {} values but '{}' has {}",
                    field.name,
                    column.len(),
                    first_name,
                    first.len()
                )));
            }
        }
        columns.push((field.name.as_str(), column));
    }

    Ok(columns)
}

fn read_column(name: &str, values: &[Value], raw_type: ColumnType) -> Result<RawColumn, Error> {
    let wrong_type = |idx: usize, value: &Value| {
        Error::mismatch(format!(
            "element {} of '{}' should be {} but is {}",
            idx, name, raw_type, value
        ))
    };

    let column = match raw_type {
        ColumnType::Utf8 | ColumnType::Date | ColumnType::Timestamp => RawColumn::Strings(
            values
                .iter()
                .enumerate()
                .map(|(idx, value)| match value {
                    Value::Null => Ok(None),
                    Value::String(s) => Ok(Some(s.clone())),
                    other => Err(wrong_type(idx, other)),
                })
                .collect::<Result<_, _>>()?,
        ),
        ColumnType::Int64 => RawColumn::Ints(
            values
                .iter()
                .enumerate()
                .map(|(idx, value)| match value {
                    Value::Null => Ok(None),
                    Value::Number(n) => n.as_i64().map(Some).ok_or_else(|| wrong_type(idx, value)),
                    other => Err(wrong_type(idx, other)),
                })
                .collect::<Result<_, _>>()?,
        ),
        ColumnType::Float64 => RawColumn::Floats(
            values
                .iter()
                .enumerate()
                .map(|(idx, value)| match value {
                    Value::Null => Ok(None),
                    Value::Number(n) => n.as_f64().map(Some).ok_or_else(|| wrong_type(idx, value)),
                    other => Err(wrong_type(idx, other)),
                })
                .collect::<Result<_, _>>()?,
        ),
    };
    Ok(column)
}

fn promote(name: &str, column: &RawColumn, target: ColumnType) -> Result<ArrayRef, Error> {
    let cast_error = |reason: String| Error::TypeCast {
        context: String::from("record"),
        field: name.to_string(),
        target,
        reason,
    };

    let array: ArrayRef = match (column, target) {
        (RawColumn::Strings(values), ColumnType::Utf8) => Arc::new(StringArray::from(values.clone())),
        (RawColumn::Strings(values), ColumnType::Date) => Arc::new(Date32Array::from(
            values
                .iter()
                .map(|value| {
                    value
                        .as_deref()
                        .map(|v| parse_date(v).map_err(|e| cast_error(format!("'{}': {}", v, e))))
                        .transpose()
                })
                .collect::<Result<Vec<_>, _>>()?,
        )),
        (RawColumn::Strings(values), ColumnType::Timestamp) => {
            Arc::new(TimestampMicrosecondArray::from(
                values
                    .iter()
                    .map(|value| {
                        value
                            .as_deref()
                            .map(|v| {
                                parse_timestamp(v)
                                    .map_err(|e| cast_error(format!("'{}': {}", v, e)))
                            })
                            .transpose()
                    })
                    .collect::<Result<Vec<_>, _>>()?,
            ))
        }
        (RawColumn::Ints(values), ColumnType::Int64) => Arc::new(Int64Array::from(values.clone())),
        (RawColumn::Ints(values), ColumnType::Float64) => Arc::new(Float64Array::from(
            values
                .iter()
                .map(|value| value.map(|v| v as f64))
                .collect::<Vec<_>>(),
        )),
        (RawColumn::Floats(values), ColumnType::Float64) => {
            Arc::new(Float64Array::from(values.clone()))
        }
        (RawColumn::Ints(_), other) | (RawColumn::Floats(_), other) => {
            return Err(cast_error(format!("no numeric conversion to {}", other)))
        }
        (RawColumn::Strings(_), other) => {
            return Err(cast_error(format!("no string conversion to {}", other)))
        }
    };
    Ok(array)
}

/// Parse `YYYY-MM-DD` into days since the unix epoch
fn parse_date(value: &str) -> Result<i32, time::error::Parse> {
    let format = format_description!("[year]-[month]-[day]");
    let date = Date::parse(value, &format)?;
    Ok(date.to_julian_day() - UNIX_EPOCH_JULIAN_DAY)
}

/// Parse `YYYY-MM-DDTHH:MM` into microseconds since the unix epoch
fn parse_timestamp(value: &str) -> Result<i64, time::error::Parse> {
    let format = format_description!("[year]-[month]-[day]T[hour]:[minute]");
    let datetime = PrimitiveDateTime::parse(value, &format)?;
    Ok(timestamp_micros(datetime.assume_utc()))
}

pub fn timestamp_micros(at: OffsetDateTime) -> i64 {
    (at.unix_timestamp_nanos() / 1_000) as i64
}
