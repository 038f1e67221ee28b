use serde_json::{json, Value};
use slog::{o, Discard, Logger};
use std::fs;
use std::path::{Path, PathBuf};

pub fn discard_logger() -> Logger {
    Logger::root(Discard, o!())
}

pub fn location(city: &str, latitude: f64, longitude: f64, offset: f64) -> Value {
    json!({
        "latitude": latitude,
        "longitude": longitude,
        "generationtime_ms": 0.35,
        "utc_offset_seconds": 3600,
        "timezone": "Europe/Vienna",
        "elevation": 171.0,
        "city": city,
        "hourly": {
            "time": ["2026-01-01T00:00", "2026-01-01T01:00"],
            "temperature_2m": [1.25 + offset, 0.5 + offset],
            "precipitation": [0.0, 0.3],
            "precipitation_probability": [12, 40],
            "cloud_cover": [100, 100],
            "weather_code": [3, 61],
            "wind_speed_10m": [14.2, 15.9],
            "wind_direction_10m": [290, 300]
        },
        "daily": {
            "time": ["2026-01-01", "2026-01-02"],
            "temperature_2m_max": [4.4 + offset, 6.1],
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
}

pub fn write_raw(dir: &Path) -> PathBuf {
    let raw = dir.join("raw_2026-01-01.json");
    let batch = json!([
        location("Sopron", 47.68, 16.58, 0.0),
        location("Vienna", 48.21, 16.37, 0.75),
    ]);
    fs::write(&raw, serde_json::to_string_pretty(&batch).unwrap()).unwrap();
    raw
}
