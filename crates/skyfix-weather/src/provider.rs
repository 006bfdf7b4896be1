//! Open-Meteo forecast client.
//! Free, no API key required.

use chrono::{NaiveDate, NaiveDateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use tracing::instrument;

use crate::http::{endpoint, get_json};
use crate::types::{
    Coordinates, CurrentWeather, DayForecast, ProviderId, SunTimes, WeatherCondition, WeatherData,
    WeatherError, WeatherUnits, UPCOMING_DAYS,
};

const FORECAST_PATH: &str = "/v1/forecast";
const CURRENT_FIELDS: &str =
    "temperature_2m,relative_humidity_2m,apparent_temperature,weather_code,wind_speed_10m,is_day";
const DAILY_FIELDS: &str = "weather_code,temperature_2m_max,temperature_2m_min,sunrise,sunset";

const DATE_FORMAT: &str = "%Y-%m-%d";
const DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M";

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    current: Option<RawCurrent>,
    #[serde(default)]
    current_units: RawCurrentUnits,
    daily: Option<RawDaily>,
    #[serde(default)]
    daily_units: RawDailyUnits,
}

#[derive(Debug, Deserialize)]
struct RawCurrent {
    time: Option<String>,
    temperature_2m: Option<f64>,
    relative_humidity_2m: Option<f64>,
    apparent_temperature: Option<f64>,
    weather_code: Option<i32>,
    wind_speed_10m: Option<f64>,
    is_day: Option<u8>,
}

#[derive(Debug, Default, Deserialize)]
struct RawCurrentUnits {
    temperature_2m: Option<String>,
    relative_humidity_2m: Option<String>,
    apparent_temperature: Option<String>,
    wind_speed_10m: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawDaily {
    time: Vec<String>,
    weather_code: Vec<Option<i32>>,
    temperature_2m_max: Vec<Option<f64>>,
    temperature_2m_min: Vec<Option<f64>>,
    sunrise: Vec<Option<String>>,
    sunset: Vec<Option<String>>,
}

#[derive(Debug, Default, Deserialize)]
struct RawDailyUnits {
    temperature_2m_max: Option<String>,
    temperature_2m_min: Option<String>,
}

fn unit_or(raw: Option<String>, fallback: &str) -> String {
    raw.filter(|u| !u.is_empty()).unwrap_or_else(|| fallback.to_string())
}

fn parse_datetime(raw: Option<&str>) -> Option<NaiveDateTime> {
    raw.and_then(|s| NaiveDateTime::parse_from_str(s, DATETIME_FORMAT).ok())
}

fn sun_at(column: &[Option<String>], i: usize) -> Option<NaiveDateTime> {
    parse_datetime(column.get(i).and_then(|s| s.as_deref()))
}

impl RawCurrent {
    fn into_current(self) -> Result<CurrentWeather, WeatherError> {
        let missing = |field: &str| WeatherError::Parse(format!("missing current.{field}"));
        let weather_code = self.weather_code.ok_or_else(|| missing("weather_code"))?;

        Ok(CurrentWeather {
            time: parse_datetime(self.time.as_deref()),
            temperature: self.temperature_2m.ok_or_else(|| missing("temperature_2m"))?,
            feels_like: self
                .apparent_temperature
                .ok_or_else(|| missing("apparent_temperature"))?,
            humidity: self
                .relative_humidity_2m
                .ok_or_else(|| missing("relative_humidity_2m"))?,
            wind_speed: self.wind_speed_10m.ok_or_else(|| missing("wind_speed_10m"))?,
            weather_code,
            condition: WeatherCondition::from_wmo_code(weather_code),
            is_day: self.is_day.map(|flag| flag != 0),
        })
    }
}

impl RawDaily {
    /// Split off today's sun times by position, then zip the remaining
    /// column arrays into days. Later days missing any required value are
    /// skipped.
    fn split_today(self) -> (SunTimes, Vec<DayForecast>) {
        let RawDaily {
            time,
            weather_code,
            temperature_2m_max,
            temperature_2m_min,
            sunrise,
            sunset,
        } = self;

        let today = SunTimes {
            sunrise: sun_at(&sunrise, 0),
            sunset: sun_at(&sunset, 0),
        };
        let upcoming = time
            .iter()
            .enumerate()
            .skip(1)
            .filter_map(|(i, date)| {
                let date = NaiveDate::parse_from_str(date, DATE_FORMAT).ok()?;
                let code = weather_code.get(i).copied().flatten()?;
                let high = temperature_2m_max.get(i).copied().flatten()?;
                let low = temperature_2m_min.get(i).copied().flatten()?;
                Some(DayForecast {
                    date,
                    high,
                    low,
                    weather_code: code,
                    condition: WeatherCondition::from_wmo_code(code),
                    sunrise: sun_at(&sunrise, i),
                    sunset: sun_at(&sunset, i),
                })
            })
            .collect();
        (today, upcoming)
    }
}

/// Weather client for current conditions plus a short daily forecast
#[derive(Debug, Clone)]
pub struct WeatherProvider {
    client: Client,
    base_url: String,
}

impl WeatherProvider {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    /// Fetch current conditions and today plus the next days at `coords`.
    ///
    /// # Errors
    /// `Provider` on transport, status, or decoding failure; `Parse` when the
    /// body lacks the current block.
    #[instrument(skip(self), level = "info")]
    pub async fn fetch(&self, coords: Coordinates) -> Result<WeatherData, WeatherError> {
        let url = endpoint(&self.base_url, FORECAST_PATH);
        let query = [
            ("latitude", coords.latitude.to_string()),
            ("longitude", coords.longitude.to_string()),
            ("current", CURRENT_FIELDS.to_string()),
            ("daily", DAILY_FIELDS.to_string()),
            ("timezone", "auto".to_string()),
            ("forecast_days", (UPCOMING_DAYS + 1).to_string()),
        ];

        let body: ForecastResponse =
            get_json(&self.client, ProviderId::OpenMeteoForecast, &url, &query).await?;
        let data = Self::into_weather_data(body, coords)?;

        tracing::info!(
            temperature = data.current.temperature,
            days = data.upcoming.len(),
            "Fetched weather"
        );
        Ok(data)
    }

    fn into_weather_data(body: ForecastResponse, coords: Coordinates) -> Result<WeatherData, WeatherError> {
        let current = body
            .current
            .ok_or_else(|| WeatherError::Parse("response has no current block".into()))?
            .into_current()?;
        let (today, upcoming) = body.daily.map(RawDaily::split_today).unwrap_or_default();

        let temperature = unit_or(body.current_units.temperature_2m, "°C");
        let units = WeatherUnits {
            feels_like: unit_or(body.current_units.apparent_temperature, &temperature),
            humidity: unit_or(body.current_units.relative_humidity_2m, "%"),
            wind_speed: unit_or(body.current_units.wind_speed_10m, "km/h"),
            high: unit_or(body.daily_units.temperature_2m_max, &temperature),
            low: unit_or(body.daily_units.temperature_2m_min, &temperature),
            temperature,
        };

        Ok(WeatherData {
            current,
            today,
            upcoming,
            units,
            coordinates: coords,
            fetched_at: Utc::now(),
        })
    }
}
