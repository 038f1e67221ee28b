use anyhow::{anyhow, Context};
use meteo_core::load_locations;
use pipeline::{
    assemble, enrich, get_config_info, raw_file_name, read_batch, save_raw, setup_logger, today,
    Cli, Command, Endpoint, JsonFetcher, ParquetWriter, UrlBuilder,
};
use slog::{error, info, Logger};
use std::path::{Path, PathBuf};
use time::{macros::format_description, Date};

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let (cli, config_source) = get_config_info();
    let logger = setup_logger(&cli);

    info!(logger, "Meteo pipeline starting...");
    info!(logger, "  Config: {}", config_source);
    info!(logger, "  Locations: {}", cli.locations_file());
    info!(logger, "  Raw dir: {}", cli.raw_dir());
    info!(logger, "  Validated dir: {}", cli.validated_dir());

    let result = match cli.command() {
        Command::Fetch => fetch(&cli, &logger, forecast_endpoint(&cli), cli.raw_dir())
            .await
            .map(|_| ()),
        Command::FetchHistorical {
            start_date,
            end_date,
        } => match historical_endpoint(&start_date, &end_date) {
            Ok(endpoint) => fetch(&cli, &logger, endpoint, cli.historical_dir())
                .await
                .map(|_| ()),
            Err(e) => Err(e),
        },
        Command::Validate { input } => {
            let input = input
                .map(PathBuf::from)
                .unwrap_or_else(|| Path::new(&cli.raw_dir()).join(raw_file_name(today())));
            validate(&cli, &logger, &input)
        }
        Command::Run => match fetch(&cli, &logger, forecast_endpoint(&cli), cli.raw_dir()).await {
            Ok(raw_path) => validate(&cli, &logger, &raw_path),
            Err(e) => Err(e),
        },
    };

    if let Err(err) = &result {
        error!(logger, "pipeline failed: {:#}", err);
    }
    result
}

fn forecast_endpoint(cli: &Cli) -> Endpoint {
    Endpoint::Forecast {
        forecast_days: cli.forecast_days(),
    }
}

fn historical_endpoint(start_date: &str, end_date: &str) -> Result<Endpoint, anyhow::Error> {
    let format = format_description!("[year]-[month]-[day]");
    let start = Date::parse(start_date, &format)
        .map_err(|e| anyhow!("invalid start date '{}': {}", start_date, e))?;
    let end = Date::parse(end_date, &format)
        .map_err(|e| anyhow!("invalid end date '{}': {}", end_date, e))?;
    Ok(Endpoint::historical(start, end)?)
}

async fn fetch(
    cli: &Cli,
    logger: &Logger,
    endpoint: Endpoint,
    destination: String,
) -> Result<PathBuf, anyhow::Error> {
    let locations = load_locations(cli.locations_file())?;
    info!(logger, "fetching {} locations", locations.len());

    let mut url_builder = UrlBuilder::new(endpoint);
    if let Some(base_url) = &cli.base_url {
        url_builder = url_builder.with_base_url(base_url);
    }
    let url = url_builder.build_url(&locations);

    let fetcher = JsonFetcher::new(logger.clone(), &cli.user_agent())?;
    let batch = fetcher.fetch(&url).await?;
    let batch = enrich(batch, &locations)?;

    let path = save_raw(logger, &batch, Path::new(&destination), today())?;
    Ok(path)
}

fn validate(cli: &Cli, logger: &Logger, input: &Path) -> Result<(), anyhow::Error> {
    if !input.exists() {
        return Err(anyhow!("no raw input file at {}", input.display()));
    }
    info!(logger, "validating {}", input.display());

    let batch = read_batch(input).with_context(|| format!("reading {}", input.display()))?;
    let (hourly, daily) = assemble(&batch)?;
    info!(
        logger,
        "assembled {} hourly and {} daily rows from {} locations",
        hourly.num_rows(),
        daily.num_rows(),
        batch.len()
    );

    let writer = ParquetWriter::new(logger.clone()).with_compression(&cli.compression())?;
    let (hourly_path, daily_path) =
        writer.write(&hourly, &daily, Path::new(&cli.validated_dir()), today())?;
    info!(
        logger,
        "validated data written to {} and {}",
        hourly_path.display(),
        daily_path.display()
    );
    Ok(())
}
