use pipeline::{assemble_at, parse_batch, ParquetWriter};
use serde_json::json;
use slog::{o, Discard, Logger};
use std::path::Path;
use time::{macros::datetime, Date};
use warehouse::{GeometryConfig, GeometryEncoding};

pub fn geometry() -> GeometryConfig {
    GeometryConfig {
        encoding: GeometryEncoding::Struct,
        ..GeometryConfig::default()
    }
}

fn raw_batch() -> String {
    let location = |city: &str, latitude: f64, longitude: f64| {
        json!({
            "latitude": latitude,
            "longitude": longitude,
            "city": city,
            "hourly": {
                "time": ["2026-01-01T00:00", "2026-01-01T01:00", "2026-01-01T02:00"],
                "temperature_2m": [1.2, 0.8, 0.1],
                "precipitation": [0.0, 0.0, 0.4],
                "precipitation_probability": [5, 10, 35],
                "cloud_cover": [90, 100, 100],
                "weather_code": [3, 3, 61],
                "wind_speed_10m": [11.0, 12.5, 13.1],
                "wind_direction_10m": [280, 285, 290]
            },
            "daily": {
                "time": ["2026-01-01", "2026-01-02"],
                "temperature_2m_max": [4.4, 6.1],
                "temperature_2m_min": [-0.7, 1.3],
                "sunrise": ["2026-01-01T07:33", "2026-01-02T07:33"],
                "sunset": ["2026-01-01T16:11", "2026-01-02T16:12"],
                "daylight_duration": [30972.48, 31038.96],
                "sunshine_duration": [0.0, 10800.0],
                "uv_index_max": [0.65, 1.2],
                "precipitation_sum": [1.2, 0.0],
                "precipitation_hours": [4.0, 0.0],
                "snowfall_sum": [0.0, 0.0],
                "precipitation_probability_max": [55, 3],
                "wind_speed_10m_max": [21.4, 12.0],
                "wind_direction_10m_dominant": [291, 180],
                "wind_gusts_10m_max": [45.0, 27.7]
            }
        })
    };
    json!([
        location("Sopron", 47.68, 16.58),
        location("Vienna", 48.21, 16.37)
    ])
    .to_string()
}

/// Writes one day's hourly (6 rows) and daily (4 rows) files into `folder`
pub fn write_day(folder: &Path, day: Date) {
    let batch = parse_batch(&raw_batch()).unwrap();
    let (hourly, daily) = assemble_at(&batch, datetime!(2026-01-01 6:00 UTC)).unwrap();
    ParquetWriter::new(Logger::root(Discard, o!()))
        .write(&hourly, &daily, folder, day)
        .unwrap();
}
