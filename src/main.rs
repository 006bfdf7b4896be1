use anyhow::Result;
use clap::{Parser, ValueEnum};
use skyfix_app::{ConsoleRenderer, Mode, ResolutionOrchestrator, ResolutionOutcome};
use skyfix_core::{Config, Language};
use skyfix_weather::{build_client, FixedSensor, IpSensor, LocationSensor, UnsupportedSensor};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

/// SkyFix - where am I, and what is the weather there?
///
/// Without arguments the position is detected and the default city is shown
/// if that fails.
///
/// Examples:
///   skyfix
///   skyfix Berlin --lang de
///   skyfix --lat 40.7 --lon -74.0
///   skyfix --sensor none --manual
#[derive(Parser)]
#[command(name = "skyfix", version, about, long_about = None)]
struct Cli {
    /// City to look up instead of detecting the position
    #[arg(index = 1)]
    city_positional: Option<String>,

    /// City to look up. Example: --city "New York"
    #[arg(long)]
    city: Option<String>,

    /// Display language (en or de). Defaults to the config, then LANG.
    #[arg(long)]
    lang: Option<String>,

    /// Latitude of a known position (-90 to 90)
    #[arg(long, allow_hyphen_values = true, requires = "lon")]
    lat: Option<f64>,

    /// Longitude of a known position (-180 to 180)
    #[arg(long, allow_hyphen_values = true, requires = "lat")]
    lon: Option<f64>,

    /// Accuracy radius in meters reported for --lat/--lon
    #[arg(long, default_value_t = 10.0)]
    accuracy: f64,

    /// Position source when no coordinates are given
    #[arg(long, value_enum, default_value_t = SensorKind::Ip)]
    sensor: SensorKind,

    /// Report location failures instead of falling back to the default city
    #[arg(long)]
    manual: bool,

    /// Config file path. Defaults to <config dir>/skyfix/config.toml
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum SensorKind {
    /// Coarse position from the public IP address
    Ip,
    /// No sensor; location requests report "not supported"
    #[value(name = "none")]
    Disabled,
}

fn sensor_for(cli: &Cli, config: &Config) -> Result<Arc<dyn LocationSensor>> {
    if let (Some(lat), Some(lon)) = (cli.lat, cli.lon) {
        if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
            anyhow::bail!("Coordinates out of range: {lat}, {lon}");
        }
        return Ok(Arc::new(FixedSensor::new(lat, lon, cli.accuracy)));
    }

    let sensor: Arc<dyn LocationSensor> = match cli.sensor {
        SensorKind::Ip => Arc::new(IpSensor::new(
            build_client(&config.network)?,
            &config.providers.ip_lookup,
        )),
        SensorKind::Disabled => Arc::new(UnsupportedSensor),
    };
    Ok(sensor)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    skyfix_core::init()?;

    let (mut config, _validation) = match &cli.config {
        Some(path) => Config::load_validated_from(path)?,
        None => Config::load_validated()?,
    };
    if let Some(lang) = &cli.lang {
        config.language = Some(Language::from_code(lang));
    }

    let sensor = sensor_for(&cli, &config)?;
    let orchestrator = ResolutionOrchestrator::from_config(&config, sensor, Arc::new(ConsoleRenderer))?;
    tracing::info!(language = %orchestrator.language(), "SkyFix started");

    let outcome = match cli.city.as_deref().or(cli.city_positional.as_deref()) {
        Some(city) => orchestrator.search_city(city).await,
        None => {
            let mode = if cli.manual { Mode::Manual } else { Mode::Automatic };
            orchestrator.locate(mode).await
        }
    };

    Ok(match outcome {
        ResolutionOutcome::Success(_) | ResolutionOutcome::FellBackToDefault { fallback: Ok(_), .. } => {
            ExitCode::SUCCESS
        }
        ResolutionOutcome::FellBackToDefault { fallback: Err(_), .. } | ResolutionOutcome::Failed(_) => {
            ExitCode::FAILURE
        }
    })
}
