//! meteo-dwh core library
//!
//! Shared pieces used by the pipeline and warehouse binaries:
//! - Configuration discovery and loading (XDG-compliant)
//! - Location list loading and validation
//! - File system utilities

mod config;
pub mod fs;
pub mod locations;

pub use config::{find_config_file, load_config, ConfigSource};
pub use fs::{create_dir_all, ensure_parent_dir, list_files_with_extension};
pub use locations::{load_locations, ConfigError, Location, LocationsConfig};

/// Application name used for XDG paths
pub const APP_NAME: &str = "meteo-dwh";

/// Folder the fetch step writes `raw_<date>.json` into
pub const DEFAULT_RAW_DIR: &str = "data/raw";

/// Folder the historical fetch writes into
pub const DEFAULT_HISTORICAL_RAW_DIR: &str = "data/raw/historical";

/// Folder holding the validated parquet files
pub const DEFAULT_VALIDATED_DIR: &str = "data/validated";

/// DuckDB warehouse file
pub const DEFAULT_WAREHOUSE_PATH: &str = "data/warehouse/weather_dwh.duckdb";

/// Location list file
pub const DEFAULT_LOCATIONS_FILE: &str = "config.toml";
