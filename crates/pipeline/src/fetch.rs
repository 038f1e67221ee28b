use meteo_core::Location;
use reqwest::{Client, StatusCode};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use serde_json::Value;
use slog::{debug, info, Logger};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use time::Date;

use crate::RecordKind;

pub const FORECAST_BASE_URL: &str = "https://api.open-meteo.com";
pub const ARCHIVE_BASE_URL: &str = "https://archive-api.open-meteo.com";
pub const API_VERSION: &str = "v1";
pub const DEFAULT_FORECAST_DAYS: u8 = 16;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest_middleware::Error),
    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),
    #[error("API responded with {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("API reported an error: {0}")]
    Api(String),
    #[error("Unexpected response shape: {0}")]
    UnexpectedShape(String),
    #[error("Expected {expected} responses, one per location, got {actual}")]
    LocationCount { expected: usize, actual: usize },
    #[error("Start date {start} is after end date {end}")]
    DateRange { start: Date, end: Date },
    #[error("Failed to encode raw JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// The API endpoints the pipeline can pull from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    Forecast { forecast_days: u8 },
    Historical { start_date: Date, end_date: Date },
}

impl Endpoint {
    pub fn historical(start_date: Date, end_date: Date) -> Result<Self, Error> {
        if start_date > end_date {
            return Err(Error::DateRange {
                start: start_date,
                end: end_date,
            });
        }
        Ok(Endpoint::Historical {
            start_date,
            end_date,
        })
    }

    fn path(&self) -> &'static str {
        match self {
            Endpoint::Forecast { .. } => "forecast",
            Endpoint::Historical { .. } => "archive",
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            Endpoint::Forecast { .. } => FORECAST_BASE_URL,
            Endpoint::Historical { .. } => ARCHIVE_BASE_URL,
        }
    }
}

pub struct UrlBuilder {
    base_url: String,
    endpoint: Endpoint,
    daily_parameters: String,
    hourly_parameters: String,
}

impl UrlBuilder {
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            base_url: endpoint.default_base_url().to_string(),
            endpoint,
            daily_parameters: RecordKind::Daily.api_parameters(),
            hourly_parameters: RecordKind::Hourly.api_parameters(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn build_url(&self, locations: &[Location]) -> String {
        let (latitudes, longitudes) = coordinate_lists(locations);
        let window = match &self.endpoint {
            Endpoint::Forecast { forecast_days } => format!("forecast_days={}", forecast_days),
            Endpoint::Historical {
                start_date,
                end_date,
            } => format!("start_date={}&end_date={}", start_date, end_date),
        };
        format!(
            "{}/{}/{}?latitude={}&longitude={}&daily={}&hourly={}&{}&timezone=auto",
            self.base_url,
            API_VERSION,
            self.endpoint.path(),
            latitudes,
            longitudes,
            self.daily_parameters,
            self.hourly_parameters,
            window
        )
    }
}

fn coordinate_lists(locations: &[Location]) -> (String, String) {
    let latitudes: Vec<String> = locations.iter().map(|l| l.latitude.to_string()).collect();
    let longitudes: Vec<String> = locations.iter().map(|l| l.longitude.to_string()).collect();
    (latitudes.join(","), longitudes.join(","))
}

pub struct JsonFetcher {
    logger: Logger,
    client: ClientWithMiddleware,
}

impl JsonFetcher {
    pub fn new(logger: Logger, user_agent: &str) -> Result<Self, Error> {
        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(3);
        let client = ClientBuilder::new(Client::builder().user_agent(user_agent).build()?)
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();
        Ok(Self { logger, client })
    }

    /// GET `url` and return one JSON object per requested location
    pub async fn fetch(&self, url: &str) -> Result<Vec<Value>, Error> {
        debug!(self.logger, "requesting: {}", url);
        let response = self
            .client
            .get(url)
            .timeout(Duration::from_secs(30))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Status { status, body });
        }

        let body: Value = response.json().await?;
        let batch = normalize_batch(body)?;
        info!(self.logger, "received {} location responses", batch.len());
        Ok(batch)
    }
}

/// A single-location request comes back as a bare object; wrap it so every
/// batch is an array
pub fn normalize_batch(body: Value) -> Result<Vec<Value>, Error> {
    match body {
        Value::Array(items) => Ok(items),
        Value::Object(map) => {
            if map.get("error").and_then(Value::as_bool) == Some(true) {
                let reason = map
                    .get("reason")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown reason");
                return Err(Error::Api(reason.to_string()));
            }
            Ok(vec![Value::Object(map)])
        }
        other => Err(Error::UnexpectedShape(format!(
            "expected an array or object, got {}",
            other
        ))),
    }
}

/// Tag each response with the name of the location it was requested for
pub fn enrich(mut batch: Vec<Value>, locations: &[Location]) -> Result<Vec<Value>, Error> {
    if batch.len() != locations.len() {
        return Err(Error::LocationCount {
            expected: locations.len(),
            actual: batch.len(),
        });
    }
    for (index, (response, location)) in batch.iter_mut().zip(locations).enumerate() {
        let object = response.as_object_mut().ok_or_else(|| {
            Error::UnexpectedShape(format!("response #{} is not an object", index))
        })?;
        object.insert("city".to_string(), Value::String(location.name.clone()));
    }
    Ok(batch)
}

/// `raw_2026-02-21.json`
pub fn raw_file_name(date: Date) -> String {
    format!("raw_{}.json", date)
}

/// Store the batch as pretty printed JSON, replacing any file of the same day
pub fn save_raw(
    logger: &Logger,
    batch: &[Value],
    folder: &Path,
    date: Date,
) -> Result<PathBuf, Error> {
    meteo_core::create_dir_all(folder)?;
    let path = folder.join(raw_file_name(date));

    let mut tmp = tempfile::Builder::new()
        .prefix(".raw_")
        .suffix(".tmp")
        .tempfile_in(folder)?;
    serde_json::to_writer_pretty(tmp.as_file_mut(), batch)?;
    tmp.as_file_mut().flush()?;
    tmp.persist(&path).map_err(|e| Error::Io(e.error))?;

    info!(logger, "raw data saved to {}", path.display());
    Ok(path)
}
