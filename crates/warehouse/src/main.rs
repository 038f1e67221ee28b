use log::{error, info};
use warehouse::{get_config_info, get_log_level, setup_logger, Command, Warehouse};

fn main() -> anyhow::Result<()> {
    let (cli, config_source) = get_config_info();
    let log_level = get_log_level(&cli);

    setup_logger()
        .level(log_level)
        .level_for("duckdb", log_level)
        .level_for("warehouse", log_level)
        .level_for("meteo_core", log_level)
        .apply()?;

    let db_path = cli.db_path();
    let validated_dir = cli.validated_dir();
    let geometry = cli.geometry_config()?;

    info!("Meteo warehouse starting...");
    info!("  Config: {}", config_source);
    info!("  Warehouse: {}", db_path);
    info!("  Validated dir: {}", validated_dir);
    info!(
        "  Geometry: {} from ({}, {})",
        geometry.encoding, geometry.lon_col, geometry.lat_col
    );

    let mut warehouse = Warehouse::open(&db_path, geometry).map_err(|e| {
        error!("error opening warehouse: {}", e);
        e
    })?;

    let result = match cli.command() {
        Command::Init => init(&warehouse, &validated_dir),
        Command::Load => load(&mut warehouse, &validated_dir),
        Command::Run => {
            init(&warehouse, &validated_dir).and_then(|_| load(&mut warehouse, &validated_dir))
        }
    };

    if let Err(err) = &result {
        error!("warehouse run failed: {:#}", err);
    }
    result
}

fn init(warehouse: &Warehouse, validated_dir: &str) -> anyhow::Result<()> {
    let created = warehouse.init_from_folder(validated_dir)?;
    if created.is_empty() {
        info!("warehouse already initialized");
    } else {
        info!("initialized {} table(s)", created.len());
    }
    Ok(())
}

fn load(warehouse: &mut Warehouse, validated_dir: &str) -> anyhow::Result<()> {
    let report = warehouse.incremental_load(validated_dir)?;
    info!(
        "loaded {} rows from {} new file(s)",
        report.rows_loaded(),
        report.loaded.len()
    );
    for skipped in &report.skipped {
        info!("  skipped {}", skipped);
    }
    Ok(())
}
