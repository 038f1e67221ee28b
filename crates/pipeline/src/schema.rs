//! Declared shapes of the two Open-Meteo record kinds.
//!
//! Each kind has a raw schema (types as they appear in the JSON arrays)
//! and a final schema (types stored in parquet and the warehouse).

use arrow::datatypes::{DataType, TimeUnit};
use std::fmt;

use crate::validation::Error;

/// Column type used by both raw and final schemas
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Utf8,
    Int64,
    Float64,
    /// Calendar date, `YYYY-MM-DD` in the raw data
    Date,
    /// Naive timestamp with microsecond resolution, `YYYY-MM-DDTHH:MM` in the raw data
    Timestamp,
}

impl ColumnType {
    pub fn arrow_type(self) -> DataType {
        match self {
            ColumnType::Utf8 => DataType::Utf8,
            ColumnType::Int64 => DataType::Int64,
            ColumnType::Float64 => DataType::Float64,
            ColumnType::Date => DataType::Date32,
            ColumnType::Timestamp => DataType::Timestamp(TimeUnit::Microsecond, None),
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColumnType::Utf8 => "utf8",
            ColumnType::Int64 => "int64",
            ColumnType::Float64 => "float64",
            ColumnType::Date => "date",
            ColumnType::Timestamp => "timestamp[us]",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaField {
    pub name: String,
    pub column_type: ColumnType,
}

/// Ordered list of named, typed fields
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    fields: Vec<SchemaField>,
}

impl Schema {
    pub fn new<S: Into<String>>(fields: impl IntoIterator<Item = (S, ColumnType)>) -> Self {
        Self {
            fields: fields
                .into_iter()
                .map(|(name, column_type)| SchemaField {
                    name: name.into(),
                    column_type,
                })
                .collect(),
        }
    }

    pub fn fields(&self) -> &[SchemaField] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<ColumnType> {
        self.fields
            .iter()
            .find(|field| field.name == name)
            .map(|field| field.column_type)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|field| field.name.as_str())
    }
}

/// Raw and final schema of one record kind.
///
/// Every raw field name must also be present in the final schema; fields that
/// only exist in the final schema are derived columns.
#[derive(Debug, Clone)]
pub struct SchemaPair {
    raw: Schema,
    target: Schema,
}

impl SchemaPair {
    pub fn new(raw: Schema, target: Schema) -> Result<Self, Error> {
        if let Some(missing) = raw.names().find(|name| target.get(name).is_none()) {
            return Err(Error::SchemaMismatch {
                context: String::from("schema pair"),
                reason: format!("raw field '{}' has no counterpart in the final schema", missing),
            });
        }
        Ok(Self { raw, target })
    }

    pub fn raw(&self) -> &Schema {
        &self.raw
    }

    pub fn target(&self) -> &Schema {
        &self.target
    }
}

/// The two record kinds contained in every API response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    Hourly,
    Daily,
}

impl RecordKind {
    pub const ALL: [RecordKind; 2] = [RecordKind::Hourly, RecordKind::Daily];

    /// Key of the nested object in the API response
    pub fn key(self) -> &'static str {
        match self {
            RecordKind::Hourly => "hourly",
            RecordKind::Daily => "daily",
        }
    }

    /// Output file prefix and warehouse table name
    pub fn table_name(self) -> &'static str {
        match self {
            RecordKind::Hourly => "hourly_data",
            RecordKind::Daily => "daily_data",
        }
    }

    pub fn schemas(self) -> SchemaPair {
        let (raw, target) = match self {
            RecordKind::Hourly => (HOURLY_FIELDS, HOURLY_FINAL_OVERRIDES),
            RecordKind::Daily => (DAILY_FIELDS, DAILY_FINAL_OVERRIDES),
        };
        let raw_schema = Schema::new(raw.iter().copied());
        let final_schema = Schema::new(raw.iter().map(|&(name, raw_type)| {
            let promoted = target
                .iter()
                .find(|(field, _)| *field == name)
                .map(|&(_, t)| t)
                .unwrap_or(raw_type);
            (name, promoted)
        }));
        SchemaPair {
            raw: raw_schema,
            target: final_schema,
        }
    }

    /// Comma separated API parameter list, i.e. every raw field except `time`
    pub fn api_parameters(self) -> String {
        let fields = match self {
            RecordKind::Hourly => HOURLY_FIELDS,
            RecordKind::Daily => DAILY_FIELDS,
        };
        fields
            .iter()
            .map(|(name, _)| *name)
            .filter(|name| *name != "time")
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

const HOURLY_FIELDS: &[(&str, ColumnType)] = &[
    ("time", ColumnType::Utf8),
    ("temperature_2m", ColumnType::Float64),
    ("precipitation", ColumnType::Float64),
    ("precipitation_probability", ColumnType::Int64),
    ("cloud_cover", ColumnType::Int64),
    ("weather_code", ColumnType::Int64),
    ("wind_speed_10m", ColumnType::Float64),
    ("wind_direction_10m", ColumnType::Int64),
];

const HOURLY_FINAL_OVERRIDES: &[(&str, ColumnType)] = &[("time", ColumnType::Timestamp)];

const DAILY_FIELDS: &[(&str, ColumnType)] = &[
    ("time", ColumnType::Utf8),
    ("temperature_2m_max", ColumnType::Float64),
    ("temperature_2m_min", ColumnType::Float64),
    ("sunrise", ColumnType::Utf8),
    ("sunset", ColumnType::Utf8),
    ("daylight_duration", ColumnType::Float64),
    ("sunshine_duration", ColumnType::Float64),
    ("uv_index_max", ColumnType::Float64),
    ("precipitation_sum", ColumnType::Float64),
    ("precipitation_hours", ColumnType::Float64),
    ("snowfall_sum", ColumnType::Float64),
    ("precipitation_probability_max", ColumnType::Int64),
    ("wind_speed_10m_max", ColumnType::Float64),
    ("wind_direction_10m_dominant", ColumnType::Int64),
    ("wind_gusts_10m_max", ColumnType::Float64),
];

const DAILY_FINAL_OVERRIDES: &[(&str, ColumnType)] = &[
    ("time", ColumnType::Date),
    ("sunrise", ColumnType::Timestamp),
    ("sunset", ColumnType::Timestamp),
];
