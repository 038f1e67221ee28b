mod assemble;
pub mod fetch;
pub mod parquet_handler;
mod schema;
mod utils;
pub mod validation;

pub use assemble::*;
pub use fetch::{
    enrich, normalize_batch, raw_file_name, save_raw, Endpoint, JsonFetcher, UrlBuilder,
    DEFAULT_FORECAST_DAYS,
};
pub use parquet_handler::{output_file_name, FileSummary, ParquetWriter};
pub use schema::*;
pub use utils::*;
pub use validation::cast;
