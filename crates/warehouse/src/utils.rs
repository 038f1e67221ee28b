use clap::{Parser, Subcommand};
use fern::{
    colors::{Color, ColoredLevelConfig},
    Dispatch,
};
use log::LevelFilter;
use meteo_core::{
    find_config_file, load_config, ConfigSource, DEFAULT_VALIDATED_DIR, DEFAULT_WAREHOUSE_PATH,
};
use std::env;
use time::{format_description::well_known::Iso8601, OffsetDateTime};

use crate::{Error, GeometryConfig, GeometryEncoding};

#[derive(Parser, Clone, Debug, serde::Deserialize, Default)]
#[command(
    author,
    version,
    about = "Meteo warehouse - loads validated parquet files into DuckDB"
)]
pub struct Cli {
    /// Path to config file (TOML format)
    /// Searched in order: this flag, $METEO_WAREHOUSE_CONFIG, ./warehouse.toml,
    /// $XDG_CONFIG_HOME/meteo-dwh/warehouse.toml, /etc/meteo-dwh/warehouse.toml
    #[arg(short, long)]
    #[serde(skip)]
    pub config: Option<String>,

    /// Log level: trace, debug, info, warn, error
    #[arg(short, long, env = "METEO_WAREHOUSE_LEVEL")]
    pub level: Option<String>,

    /// DuckDB warehouse file
    #[arg(short, long, env = "METEO_WAREHOUSE_DB_PATH")]
    #[serde(alias = "db")]
    pub db_path: Option<String>,

    /// Directory containing the validated parquet files
    #[arg(short, long, env = "METEO_WAREHOUSE_VALIDATED_DIR")]
    pub validated_dir: Option<String>,

    /// Column holding the longitude of each row
    #[arg(long, env = "METEO_WAREHOUSE_LON_COL")]
    pub lon_col: Option<String>,

    /// Column holding the latitude of each row
    #[arg(long, env = "METEO_WAREHOUSE_LAT_COL")]
    pub lat_col: Option<String>,

    /// Geometry encoding: spatial (needs the DuckDB spatial extension) or struct
    #[arg(short, long, env = "METEO_WAREHOUSE_GEOMETRY")]
    pub geometry: Option<String>,

    #[command(subcommand)]
    #[serde(skip)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Clone, Debug)]
pub enum Command {
    /// Create the warehouse tables from the newest validated files
    Init,
    /// Load validated files not yet in the warehouse
    Load,
    /// Init, then load (default)
    Run,
}

impl Cli {
    pub fn db_path(&self) -> String {
        self.db_path
            .clone()
            .unwrap_or_else(|| DEFAULT_WAREHOUSE_PATH.to_string())
    }

    pub fn validated_dir(&self) -> String {
        self.validated_dir
            .clone()
            .unwrap_or_else(|| DEFAULT_VALIDATED_DIR.to_string())
    }

    pub fn geometry_config(&self) -> Result<GeometryConfig, Error> {
        let defaults = GeometryConfig::default();
        let encoding = match &self.geometry {
            Some(encoding) => encoding.parse::<GeometryEncoding>()?,
            None => defaults.encoding,
        };
        Ok(GeometryConfig {
            lon_col: self.lon_col.clone().unwrap_or(defaults.lon_col),
            lat_col: self.lat_col.clone().unwrap_or(defaults.lat_col),
            encoding,
        })
    }

    pub fn command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Run)
    }
}

/// Load configuration from CLI args, config file, and environment.
///
/// Also returns where the file config came from, so it can be logged once
/// the logger is set up.
pub fn get_config_info() -> (Cli, ConfigSource) {
    merge_config(Cli::parse())
}

/// Merge parsed CLI args (env vars are handled by clap) over the config file
pub fn merge_config(cli_args: Cli) -> (Cli, ConfigSource) {
    let source = if let Some(ref path) = cli_args.config {
        ConfigSource::Explicit(path.into())
    } else {
        find_config_file("METEO_WAREHOUSE_CONFIG", "warehouse.toml")
    };

    let file_config: Cli = load_config(&source).unwrap_or_default();

    let cli = Cli {
        config: cli_args.config,
        level: cli_args.level.or(file_config.level),
        db_path: cli_args.db_path.or(file_config.db_path),
        validated_dir: cli_args.validated_dir.or(file_config.validated_dir),
        lon_col: cli_args.lon_col.or(file_config.lon_col),
        lat_col: cli_args.lat_col.or(file_config.lat_col),
        geometry: cli_args.geometry.or(file_config.geometry),
        command: cli_args.command,
    };
    (cli, source)
}

pub fn get_log_level(cli: &Cli) -> LevelFilter {
    let level_str = cli
        .level
        .clone()
        .or_else(|| env::var("RUST_LOG").ok())
        .unwrap_or_else(|| "info".to_string());

    match level_str.to_lowercase().as_str() {
        "trace" => LevelFilter::Trace,
        "debug" => LevelFilter::Debug,
        "info" => LevelFilter::Info,
        "warn" => LevelFilter::Warn,
        "error" => LevelFilter::Error,
        _ => LevelFilter::Info,
    }
}

pub fn setup_logger() -> Dispatch {
    let colors = ColoredLevelConfig::new()
        .trace(Color::White)
        .debug(Color::Cyan)
        .info(Color::Blue)
        .warn(Color::Yellow)
        .error(Color::Magenta);

    fern::Dispatch::new()
        .format(move |out, message, record| {
            out.finish(format_args!(
                "[{} {}] {}: {}",
                OffsetDateTime::now_utc()
                    .format(&Iso8601::DEFAULT)
                    .unwrap_or_default(),
                colors.color(record.level()),
                record.target(),
                message
            ));
        })
        .chain(std::io::stdout())
}
