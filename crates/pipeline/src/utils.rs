use clap::{Parser, Subcommand};
use meteo_core::{
    find_config_file, load_config, ConfigSource, DEFAULT_HISTORICAL_RAW_DIR, DEFAULT_LOCATIONS_FILE,
    DEFAULT_RAW_DIR, DEFAULT_VALIDATED_DIR,
};
use slog::{o, Drain, Level, Logger};
use std::env;
use time::{Date, OffsetDateTime};

use crate::DEFAULT_FORECAST_DAYS;

#[derive(Parser, Clone, Debug, serde::Deserialize, Default)]
#[command(
    author,
    version,
    about = "Meteo pipeline - fetches Open-Meteo forecasts and writes validated parquet files"
)]
pub struct Cli {
    /// Path to config file (TOML format)
    /// Searched in order: this flag, $METEO_PIPELINE_CONFIG, ./pipeline.toml,
    /// $XDG_CONFIG_HOME/meteo-dwh/pipeline.toml, /etc/meteo-dwh/pipeline.toml
    #[arg(short, long)]
    #[serde(skip)]
    pub config: Option<String>,

    /// Log level: trace, debug, info, warn, error
    #[arg(short, long, env = "METEO_PIPELINE_LEVEL")]
    pub level: Option<String>,

    /// TOML file holding the `[[locations]]` list
    #[arg(long, env = "METEO_PIPELINE_LOCATIONS")]
    pub locations_file: Option<String>,

    /// Directory raw API responses are stored in
    #[arg(long, env = "METEO_PIPELINE_RAW_DIR")]
    pub raw_dir: Option<String>,

    /// Directory raw historical responses are stored in
    #[arg(long, env = "METEO_PIPELINE_HISTORICAL_DIR")]
    pub historical_dir: Option<String>,

    /// Directory the validated parquet files are written to
    #[arg(long, env = "METEO_PIPELINE_VALIDATED_DIR")]
    pub validated_dir: Option<String>,

    /// Override the API base URL (defaults depend on the endpoint)
    #[arg(long, env = "METEO_PIPELINE_BASE_URL")]
    pub base_url: Option<String>,

    /// Number of forecast days to request
    #[arg(long, env = "METEO_PIPELINE_FORECAST_DAYS")]
    pub forecast_days: Option<u8>,

    /// HTTP User-Agent header for API requests
    #[arg(long, env = "METEO_PIPELINE_USER_AGENT")]
    pub user_agent: Option<String>,

    /// Parquet compression: snappy, gzip, lz4, zstd, none
    #[arg(long, env = "METEO_PIPELINE_COMPRESSION")]
    pub compression: Option<String>,

    #[command(subcommand)]
    #[serde(skip)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Clone, Debug)]
pub enum Command {
    /// Fetch the forecast for every configured location and store the raw JSON
    Fetch,
    /// Fetch archived weather between two dates (YYYY-MM-DD)
    FetchHistorical {
        #[arg(long)]
        start_date: String,
        #[arg(long)]
        end_date: String,
    },
    /// Validate a raw JSON batch and write today's hourly/daily parquet files
    Validate {
        /// Raw batch to validate, defaults to today's file in the raw directory
        #[arg(short, long)]
        input: Option<String>,
    },
    /// Fetch, then validate (default)
    Run,
}

impl Cli {
    pub fn locations_file(&self) -> String {
        self.locations_file
            .clone()
            .unwrap_or_else(|| DEFAULT_LOCATIONS_FILE.to_string())
    }

    pub fn raw_dir(&self) -> String {
        self.raw_dir
            .clone()
            .unwrap_or_else(|| DEFAULT_RAW_DIR.to_string())
    }

    pub fn historical_dir(&self) -> String {
        self.historical_dir
            .clone()
            .unwrap_or_else(|| DEFAULT_HISTORICAL_RAW_DIR.to_string())
    }

    pub fn validated_dir(&self) -> String {
        self.validated_dir
            .clone()
            .unwrap_or_else(|| DEFAULT_VALIDATED_DIR.to_string())
    }

    pub fn forecast_days(&self) -> u8 {
        self.forecast_days.unwrap_or(DEFAULT_FORECAST_DAYS)
    }

    pub fn user_agent(&self) -> String {
        self.user_agent
            .clone()
            .unwrap_or_else(|| format!("meteo-pipeline/{}", env!("CARGO_PKG_VERSION")))
    }

    pub fn compression(&self) -> String {
        self.compression
            .clone()
            .unwrap_or_else(|| "snappy".to_string())
    }

    pub fn command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Run)
    }
}

/// Load configuration from CLI args, config file, and environment, along
/// with where the file config came from
pub fn get_config_info() -> (Cli, ConfigSource) {
    merge_config(Cli::parse())
}

/// Merge parsed CLI args (env vars are handled by clap) over the config file
pub fn merge_config(cli_args: Cli) -> (Cli, ConfigSource) {
    let source = if let Some(ref path) = cli_args.config {
        ConfigSource::Explicit(path.into())
    } else {
        find_config_file("METEO_PIPELINE_CONFIG", "pipeline.toml")
    };

    let file_config: Cli = load_config(&source).unwrap_or_default();

    let cli = Cli {
        config: cli_args.config,
        level: cli_args.level.or(file_config.level),
        locations_file: cli_args.locations_file.or(file_config.locations_file),
        raw_dir: cli_args.raw_dir.or(file_config.raw_dir),
        historical_dir: cli_args.historical_dir.or(file_config.historical_dir),
        validated_dir: cli_args.validated_dir.or(file_config.validated_dir),
        base_url: cli_args.base_url.or(file_config.base_url),
        forecast_days: cli_args.forecast_days.or(file_config.forecast_days),
        user_agent: cli_args.user_agent.or(file_config.user_agent),
        compression: cli_args.compression.or(file_config.compression),
        command: cli_args.command,
    };
    (cli, source)
}

fn parse_level(level: &str) -> Level {
    match level.to_lowercase().as_str() {
        "trace" => Level::Trace,
        "debug" => Level::Debug,
        "warn" => Level::Warning,
        "error" => Level::Error,
        _ => Level::Info,
    }
}

pub fn setup_logger(cli: &Cli) -> Logger {
    let log_level = match cli.level.as_ref() {
        Some(level) => parse_level(level),
        None => parse_level(&env::var("RUST_LOG").unwrap_or_default()),
    };

    let decorator = slog_term::TermDecorator::new().build();
    let drain = slog_term::CompactFormat::new(decorator).build().fuse();
    let drain = slog_async::Async::new(drain).build().fuse();
    let drain = drain.filter_level(log_level).fuse();
    slog::Logger::root(drain, o!("version" => env!("CARGO_PKG_VERSION")))
}

/// Calendar date used to name the day's raw and parquet files
pub fn today() -> Date {
    OffsetDateTime::now_utc().date()
}
