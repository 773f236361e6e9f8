//! Print a short-range forecast from Open-Meteo.

use artwork_annotator::forecast::{self, ForecastConfig, TemperatureUnit};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "forecast", about = "Print a short-range weather forecast")]
struct Cli {
    /// Place name shown in the heading
    #[arg(long, default_value = "Baltimore, MD")]
    location: String,

    #[arg(long, default_value_t = 39.2904, allow_negative_numbers = true)]
    latitude: f64,

    #[arg(long, default_value_t = -76.6122, allow_negative_numbers = true)]
    longitude: f64,

    /// fahrenheit or celsius
    #[arg(long, default_value = "fahrenheit")]
    unit: TemperatureUnit,

    #[arg(long, default_value = "America/New_York")]
    timezone: String,

    #[arg(long, default_value_t = 3)]
    days: u8,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "artwork_annotator=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = ForecastConfig {
        location: cli.location,
        latitude: cli.latitude,
        longitude: cli.longitude,
        unit: cli.unit,
        timezone: cli.timezone,
        days: cli.days,
        ..Default::default()
    };

    let client = reqwest::Client::new();
    let result = forecast::fetch_forecast(&client, &config).await?;
    print!("{}", forecast::render_forecast(&config.location, &result, config.unit));
    Ok(())
}
