//! CLMU single-point input preparation.
//!
//! - `forcing`: retrieve hourly reanalysis month by month and write the
//!   atmospheric forcing file
//! - `surfdata`: fill a one-cell surface data template with urban and soil
//!   parameters
//! - `clean`: remove the raw download cache and model case directories

mod cleanup;
mod config;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use clmu_common::{DateRange, GeoPoint, YearMonth};
use forcing::{
    build_forcing, create_fetcher, forcing_file_name, resolve_output, write_forcing, ForcingSource,
};
use surfdata::{prepare_surface_file, SurfacePaths, UrbanFractions};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use config::PipelineConfig;

#[derive(Parser, Debug)]
#[command(name = "clmu-prep")]
#[command(about = "Prepare forcing and surface data for single-point CLMU runs")]
struct Args {
    /// Pipeline configuration file (YAML)
    #[arg(long, env = "CLMU_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Log level
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Derive an atmospheric forcing file for a point
    Forcing {
        #[arg(long, allow_negative_numbers = true)]
        lat: f64,

        #[arg(long, allow_negative_numbers = true)]
        lon: f64,

        /// First month, YYYY-MM
        #[arg(long)]
        start: YearMonth,

        /// Last month (inclusive), YYYY-MM
        #[arg(long)]
        end: YearMonth,

        /// Reference height in metres (overrides the config)
        #[arg(long)]
        zbot: Option<f64>,

        /// Raw data source: cds or local (overrides the config)
        #[arg(long)]
        source: Option<String>,

        /// Output file (default: derived name in the output directory)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Rebuild even if the output file exists
        #[arg(long)]
        force: bool,
    },

    /// Build a single-point surface data file
    Surfdata {
        #[arg(long, allow_negative_numbers = true)]
        lat: f64,

        #[arg(long, allow_negative_numbers = true)]
        lon: f64,

        /// Urban morphology dataset
        #[arg(long)]
        urban: Option<PathBuf>,

        /// Soil texture dataset
        #[arg(long)]
        soil: Option<PathBuf>,

        /// One-cell surface data template
        #[arg(long)]
        template: Option<PathBuf>,

        /// Urban fractions (tall building district, high, medium density)
        #[arg(long, default_value = "0,0,100")]
        pct_urban: UrbanFractions,

        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Remove the raw cache and case directories
    Clean {
        /// Remove the raw download cache
        #[arg(long)]
        cache: bool,

        /// Case names separated by ';'
        #[arg(long)]
        cases: Option<String>,

        /// Directory holding the case directories (overrides the config)
        #[arg(long)]
        case_root: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment from .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Initialize tracing
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_thread_ids(true)
        .json()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    netcdf_io::silence_hdf5_errors();

    let config = PipelineConfig::load(args.config.as_deref())?;

    match args.command {
        Command::Forcing {
            lat,
            lon,
            start,
            end,
            zbot,
            source,
            output,
            force,
        } => {
            run_forcing(
                config,
                ForcingArgs {
                    lat,
                    lon,
                    start,
                    end,
                    zbot,
                    source,
                    output,
                    force,
                },
            )
            .await
        }
        Command::Surfdata {
            lat,
            lon,
            urban,
            soil,
            template,
            pct_urban,
            output,
        } => {
            let paths = SurfacePaths {
                template: template.unwrap_or_else(|| config.paths.template_path()),
                urban: urban.unwrap_or_else(|| config.paths.urban_path()),
                soil: soil.unwrap_or_else(|| config.paths.soil_path()),
                output: output.unwrap_or_else(|| config.paths.output_dir.join("surfdata.nc")),
            };
            let point = GeoPoint::new(lat, lon)?;
            let report = prepare_surface_file(&paths, &point, &pct_urban, &config.surfdata)
                .context("Surface data preparation failed")?;
            info!(
                output = %paths.output.display(),
                region_id = report.region_id,
                soil_lat = report.soil.point.lat,
                soil_lon = report.soil.point.lon,
                "Surface data ready"
            );
            Ok(())
        }
        Command::Clean {
            cache,
            cases,
            case_root,
        } => {
            let names = match cases {
                Some(list) => cleanup::parse_case_names(&list)?,
                None => Vec::new(),
            };
            let case_root = case_root.unwrap_or_else(|| config.paths.case_root.clone());
            let cache_dir = cache.then_some(config.paths.cache_dir.as_path());

            let report = cleanup::clean(cache_dir, &case_root, &names)?;
            info!(
                removed = report.removed.len(),
                missing = report.missing.len(),
                files = report.files,
                bytes = report.bytes,
                "Cleanup complete"
            );
            Ok(())
        }
    }
}

struct ForcingArgs {
    lat: f64,
    lon: f64,
    start: YearMonth,
    end: YearMonth,
    zbot: Option<f64>,
    source: Option<String>,
    output: Option<PathBuf>,
    force: bool,
}

async fn run_forcing(mut config: PipelineConfig, args: ForcingArgs) -> Result<()> {
    let point = GeoPoint::new(args.lat, args.lon)?;
    let range = DateRange::from_months(args.start, args.end)?;

    if let Some(zbot) = args.zbot {
        config.forcing.zbot = zbot;
    }
    let params = config.conversion_params()?;
    let source: ForcingSource = match args.source {
        Some(s) => s.parse()?,
        None => config.forcing.source,
    };

    let output = args.output.unwrap_or_else(|| {
        config.paths.output_dir.join(forcing_file_name(
            &point,
            params.zbot,
            &args.start,
            &args.end,
        ))
    });
    let Some(output) = resolve_output(output, config.forcing.reuse_existing && !args.force) else {
        return Ok(());
    };

    info!(
        point = %point,
        start = %range.start,
        end = %range.end,
        source = %source,
        zbot = params.zbot,
        "Building forcing"
    );

    let fetcher = create_fetcher(source, &config.source_settings())?;
    let record = build_forcing(fetcher.as_ref(), &point, &range, &params)
        .await
        .context("Forcing derivation failed")?;
    write_forcing(&record, &output, fetcher.name())?;

    info!(output = %output.display(), steps = record.len(), "Forcing ready");
    Ok(())
}
