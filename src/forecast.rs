//! Short-range forecast from the Open-Meteo public API (no key needed).

use chrono::NaiveDate;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

const RULE_WIDTH: usize = 45;

/// Temperature unit requested from the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TemperatureUnit {
    #[default]
    Fahrenheit,
    Celsius,
}

impl TemperatureUnit {
    pub fn query_value(self) -> &'static str {
        match self {
            Self::Fahrenheit => "fahrenheit",
            Self::Celsius => "celsius",
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Self::Fahrenheit => "°F",
            Self::Celsius => "°C",
        }
    }
}

impl std::str::FromStr for TemperatureUnit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "f" | "fahrenheit" => Ok(Self::Fahrenheit),
            "c" | "celsius" => Ok(Self::Celsius),
            other => Err(format!("unknown temperature unit '{}'", other)),
        }
    }
}

/// Where and how to ask for a forecast.
#[derive(Debug, Clone)]
pub struct ForecastConfig {
    pub endpoint: String,
    /// Human-readable place name for the heading
    pub location: String,
    pub latitude: f64,
    pub longitude: f64,
    pub unit: TemperatureUnit,
    /// IANA timezone for day boundaries
    pub timezone: String,
    pub days: u8,
    pub timeout: Duration,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.open-meteo.com".to_string(),
            location: "Baltimore, MD".to_string(),
            latitude: 39.2904,
            longitude: -76.6122,
            unit: TemperatureUnit::Fahrenheit,
            timezone: "America/New_York".to_string(),
            days: 3,
            timeout: Duration::from_secs(30),
        }
    }
}

/// One day of forecast. Fields the API left null are `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct DailyForecast {
    pub date: NaiveDate,
    pub weather_code: Option<u16>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub precipitation_chance: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Forecast {
    pub days: Vec<DailyForecast>,
}

#[derive(Deserialize)]
struct ForecastResponse {
    daily: Daily,
}

#[derive(Deserialize)]
struct Daily {
    time: Vec<String>,
    #[serde(default)]
    temperature_2m_max: Vec<Option<f64>>,
    #[serde(default)]
    temperature_2m_min: Vec<Option<f64>>,
    #[serde(default)]
    precipitation_probability_max: Vec<Option<f64>>,
    #[serde(default)]
    weathercode: Vec<Option<u16>>,
}

impl Forecast {
    /// Decode an Open-Meteo `daily` response body.
    pub fn from_json(body: &str) -> Result<Self, ForecastError> {
        let resp: ForecastResponse =
            serde_json::from_str(body).map_err(|e| ForecastError::InvalidResponse(e.to_string()))?;
        let daily = resp.daily;

        let days = daily
            .time
            .iter()
            .enumerate()
            .map(|(i, day)| {
                let date = NaiveDate::parse_from_str(day, "%Y-%m-%d").map_err(|e| {
                    ForecastError::InvalidResponse(format!("bad date '{}': {}", day, e))
                })?;
                Ok(DailyForecast {
                    date,
                    weather_code: daily.weathercode.get(i).copied().flatten(),
                    high: daily.temperature_2m_max.get(i).copied().flatten(),
                    low: daily.temperature_2m_min.get(i).copied().flatten(),
                    precipitation_chance: daily
                        .precipitation_probability_max
                        .get(i)
                        .copied()
                        .flatten(),
                })
            })
            .collect::<Result<Vec<_>, ForecastError>>()?;

        Ok(Self { days })
    }
}

/// Fetch the daily forecast with a single GET. No retries.
pub async fn fetch_forecast(client: &Client, config: &ForecastConfig) -> Result<Forecast, ForecastError> {
    let url = format!("{}/v1/forecast", config.endpoint.trim_end_matches('/'));
    let days = config.days.to_string();
    let query = [
        ("latitude", config.latitude.to_string()),
        ("longitude", config.longitude.to_string()),
        (
            "daily",
            "temperature_2m_max,temperature_2m_min,precipitation_probability_max,weathercode"
                .to_string(),
        ),
        ("temperature_unit", config.unit.query_value().to_string()),
        ("timezone", config.timezone.clone()),
        ("forecast_days", days),
    ];

    tracing::debug!("GET {}", url);
    let resp = client
        .get(&url)
        .query(&query)
        .timeout(config.timeout)
        .send()
        .await
        .map_err(|e| ForecastError::Connection(url.clone(), e.to_string()))?;

    if !resp.status().is_success() {
        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();
        return Err(ForecastError::Http { status, body });
    }

    let body = resp
        .text()
        .await
        .map_err(|e| ForecastError::InvalidResponse(e.to_string()))?;
    Forecast::from_json(&body)
}

/// Text for a WMO weather interpretation code.
pub fn weather_description(code: u16) -> &'static str {
    match code {
        0 => "Clear sky ☀️",
        1 => "Mainly clear 🌤️",
        2 => "Partly cloudy ⛅",
        3 => "Overcast ☁️",
        45 => "Fog 🌫️",
        48 => "Depositing rime fog 🌫️",
        51 => "Light drizzle 🌧️",
        53 => "Moderate drizzle 🌧️",
        55 => "Dense drizzle 🌧️",
        56 => "Light freezing drizzle 🌧️❄️",
        57 => "Dense freezing drizzle 🌧️❄️",
        61 => "Slight rain 🌧️",
        63 => "Moderate rain 🌧️",
        65 => "Heavy rain 🌧️",
        66 => "Light freezing rain 🌧️❄️",
        67 => "Heavy freezing rain 🌧️❄️",
        71 => "Slight snow 🌨️",
        73 => "Moderate snow 🌨️",
        75 => "Heavy snow 🌨️",
        77 => "Snow grains 🌨️",
        80 => "Slight rain showers 🌦️",
        81 => "Moderate rain showers 🌦️",
        82 => "Violent rain showers ⛈️",
        85 => "Slight snow showers 🌨️",
        86 => "Heavy snow showers 🌨️",
        95 => "Thunderstorm ⛈️",
        96 => "Thunderstorm with slight hail ⛈️",
        99 => "Thunderstorm with heavy hail ⛈️",
        _ => "Unknown",
    }
}

/// Format a forecast the way the `forecast` binary prints it.
pub fn render_forecast(location: &str, forecast: &Forecast, unit: TemperatureUnit) -> String {
    let rule = "-".repeat(RULE_WIDTH);
    let heading = format!("{}-Day Weather Forecast for {}", forecast.days.len(), location);

    let mut out = format!("\n🌡️  {}\n\n{}\n", heading, rule);
    for day in &forecast.days {
        let condition = day.weather_code.map(weather_description).unwrap_or("Unknown");
        out.push_str(&format!("{}\n", day.date.format("%A, %b %d")));
        out.push_str(&format!("  {}\n", condition));
        out.push_str(&format!(
            "  High: {}{sym}  |  Low: {}{sym}\n",
            show(day.high),
            show(day.low),
            sym = unit.symbol()
        ));
        out.push_str(&format!(
            "  Chance of precipitation: {}%\n",
            show(day.precipitation_chance)
        ));
        out.push_str(&rule);
        out.push('\n');
    }
    out
}

fn show(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "n/a".to_string())
}

/// Errors from the forecast API.
#[derive(Debug, thiserror::Error)]
pub enum ForecastError {
    #[error("Cannot connect to {0}: {1}")]
    Connection(String, String),

    #[error("Forecast API returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Invalid forecast response: {0}")]
    InvalidResponse(String),
}
