use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use skyfix_core::NetworkError;
use std::fmt;

/// A latitude/longitude pair in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.4}, {:.4}", self.latitude, self.longitude)
    }
}

/// One fix reported by a location sensor.
///
/// Samples are never mutated; a better fix replaces the held one.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionSample {
    pub latitude: f64,
    pub longitude: f64,
    /// Confidence radius in meters; smaller is more precise
    pub accuracy_meters: f64,
    pub timestamp: DateTime<Utc>,
}

impl PositionSample {
    pub fn new(latitude: f64, longitude: f64, accuracy_meters: f64) -> Self {
        Self {
            latitude,
            longitude,
            accuracy_meters,
            timestamp: Utc::now(),
        }
    }

    pub fn coordinates(&self) -> Coordinates {
        Coordinates::new(self.latitude, self.longitude)
    }

    /// Strictly smaller accuracy radius
    pub fn is_more_accurate_than(&self, other: &PositionSample) -> bool {
        self.accuracy_meters < other.accuracy_meters
    }
}

/// Human-readable place. Unknown fields are empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceName {
    pub name: String,
    pub region: String,
    pub country: String,
}

impl PlaceName {
    pub fn new(name: impl Into<String>, region: impl Into<String>, country: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            region: region.into(),
            country: country.into(),
        }
    }

    /// A place is usable only when it has a name
    pub fn is_usable(&self) -> bool {
        !self.name.trim().is_empty()
    }

    /// Non-empty parts joined with ", ", or `None` when nothing is known
    pub fn display_line(&self) -> Option<String> {
        let parts: Vec<&str> = [&self.name, &self.region, &self.country]
            .into_iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join(", "))
        }
    }
}

/// First candidate that is present and non-empty, or the empty string
pub(crate) fn first_non_empty<'a>(candidates: impl IntoIterator<Item = Option<&'a str>>) -> String {
    candidates
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|s| !s.is_empty())
        .unwrap_or_default()
        .to_string()
}

/// A city found by forward geocoding
#[derive(Debug, Clone, PartialEq)]
pub struct GeocodedCity {
    pub coordinates: Coordinates,
    pub place: PlaceName,
}

/// External services the clients talk to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderId {
    OpenMeteoForecast,
    OpenMeteoGeocoding,
    OpenMeteoReverse,
    Nominatim,
    BigDataCloud,
    IpInfo,
}

impl ProviderId {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::OpenMeteoForecast => "open-meteo-forecast",
            Self::OpenMeteoGeocoding => "open-meteo-geocoding",
            Self::OpenMeteoReverse => "open-meteo-reverse",
            Self::Nominatim => "nominatim",
            Self::BigDataCloud => "bigdatacloud",
            Self::IpInfo => "ipinfo",
        }
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Weather condition categories mapped from WMO codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WeatherCondition {
    #[default]
    Clear,
    PartlyCloudy,
    Cloudy,
    Fog,
    Drizzle,
    Rain,
    HeavyRain,
    Snow,
    Sleet,
    Thunderstorm,
}

impl WeatherCondition {
    /// Convert WMO weather code to WeatherCondition
    /// See: https://open-meteo.com/en/docs#weathervariables
    pub fn from_wmo_code(code: i32) -> Self {
        match code {
            0 => Self::Clear,
            1..=2 => Self::PartlyCloudy,
            3 => Self::Cloudy,
            45 | 48 => Self::Fog,
            51 | 53 | 55 => Self::Drizzle,
            56 | 57 => Self::Sleet, // Freezing drizzle
            61 | 63 | 80 => Self::Rain,
            65 | 81 | 82 => Self::HeavyRain,
            66 | 67 => Self::Sleet, // Freezing rain
            71 | 73 | 75 | 77 | 85 | 86 => Self::Snow,
            95 | 96 | 99 => Self::Thunderstorm,
            _ => Self::Clear,
        }
    }

    /// Terminal glyph for the condition; clear skies at night show a moon
    pub fn symbol(&self, is_day: bool) -> &'static str {
        match self {
            Self::Clear if is_day => "☀",
            Self::Clear => "☾",
            Self::PartlyCloudy => "⛅",
            Self::Cloudy => "☁",
            Self::Fog => "🌫",
            Self::Drizzle | Self::Rain | Self::HeavyRain => "🌧",
            Self::Snow | Self::Sleet => "🌨",
            Self::Thunderstorm => "⛈",
        }
    }
}

/// Unit labels as reported by the forecast service
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeatherUnits {
    pub temperature: String,
    pub feels_like: String,
    pub humidity: String,
    pub wind_speed: String,
    pub high: String,
    pub low: String,
}

/// Current weather conditions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentWeather {
    /// Local time at the location
    pub time: Option<NaiveDateTime>,
    pub temperature: f64,
    pub feels_like: f64,
    pub humidity: f64,
    pub wind_speed: f64,
    pub weather_code: i32,
    pub condition: WeatherCondition,
    pub is_day: Option<bool>,
}

/// Daily forecast entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayForecast {
    pub date: NaiveDate,
    pub high: f64,
    pub low: f64,
    pub weather_code: i32,
    pub condition: WeatherCondition,
    pub sunrise: Option<NaiveDateTime>,
    pub sunset: Option<NaiveDateTime>,
}

/// Sunrise and sunset of one day
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SunTimes {
    pub sunrise: Option<NaiveDateTime>,
    pub sunset: Option<NaiveDateTime>,
}

/// Number of forecast days shown after today
pub const UPCOMING_DAYS: usize = 5;

/// Complete weather data bundle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherData {
    pub current: CurrentWeather,
    /// Today's sun times, kept even when today's forecast row is incomplete
    pub today: SunTimes,
    /// Complete daily entries after today
    pub upcoming: Vec<DayForecast>,
    pub units: WeatherUnits,
    pub coordinates: Coordinates,
    pub fetched_at: DateTime<Utc>,
}

impl WeatherData {
    /// The days after today, at most [`UPCOMING_DAYS`]
    pub fn upcoming_days(&self) -> impl Iterator<Item = &DayForecast> {
        self.upcoming.iter().take(UPCOMING_DAYS)
    }

    /// Day or night at the location. Uses the service flag, then today's
    /// sunrise/sunset, and assumes day when neither is known.
    pub fn is_day(&self) -> bool {
        if let Some(is_day) = self.current.is_day {
            return is_day;
        }
        match (self.current.time, self.today.sunrise, self.today.sunset) {
            (Some(now), Some(sunrise), Some(sunset)) => now >= sunrise && now < sunset,
            _ => true,
        }
    }
}

/// Location sampler errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LocationError {
    #[error("No location sensor available")]
    Unsupported,
    #[error("Location permission denied")]
    PermissionDenied,
    #[error("Location unavailable: {0}")]
    Unavailable(String),
    #[error("Location request timed out")]
    Timeout,
}

/// A provider answered with a non-2xx status, malformed body, or not at all
#[derive(Debug, thiserror::Error)]
#[error("{provider}: {source}")]
pub struct ProviderError {
    pub provider: ProviderId,
    #[source]
    pub source: NetworkError,
}

impl ProviderError {
    pub fn new(provider: ProviderId, source: NetworkError) -> Self {
        Self { provider, source }
    }

    pub fn malformed(provider: ProviderId, message: impl Into<String>) -> Self {
        Self::new(provider, NetworkError::InvalidResponse(message.into()))
    }
}

/// Forward geocoding errors
#[derive(Debug, thiserror::Error)]
pub enum GeocodeError {
    #[error("No city matches '{0}'")]
    NotFound(String),
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

/// Weather provider errors
#[derive(Debug, thiserror::Error)]
pub enum WeatherError {
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error("Parse error: {0}")]
    Parse(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wmo_code_clear() {
        assert_eq!(WeatherCondition::from_wmo_code(0), WeatherCondition::Clear);
    }

    #[test]
    fn test_wmo_code_partly_cloudy() {
        assert_eq!(WeatherCondition::from_wmo_code(1), WeatherCondition::PartlyCloudy);
        assert_eq!(WeatherCondition::from_wmo_code(2), WeatherCondition::PartlyCloudy);
    }

    #[test]
    fn test_wmo_code_rain() {
        assert_eq!(WeatherCondition::from_wmo_code(61), WeatherCondition::Rain);
        assert_eq!(WeatherCondition::from_wmo_code(80), WeatherCondition::Rain);
        assert_eq!(WeatherCondition::from_wmo_code(82), WeatherCondition::HeavyRain);
    }

    #[test]
    fn test_wmo_code_sleet() {
        assert_eq!(WeatherCondition::from_wmo_code(56), WeatherCondition::Sleet);
        assert_eq!(WeatherCondition::from_wmo_code(67), WeatherCondition::Sleet);
    }

    #[test]
    fn test_wmo_code_unknown_defaults_to_clear() {
        assert_eq!(WeatherCondition::from_wmo_code(999), WeatherCondition::Clear);
        assert_eq!(WeatherCondition::from_wmo_code(-1), WeatherCondition::Clear);
    }

    #[test]
    fn test_condition_symbol_day_night() {
        assert_eq!(WeatherCondition::Clear.symbol(true), "☀");
        assert_eq!(WeatherCondition::Clear.symbol(false), "☾");
        assert_eq!(WeatherCondition::Rain.symbol(false), "🌧");
    }

    #[test]
    fn test_place_display_line() {
        let place = PlaceName::new("New York", "NY", "US");
        assert_eq!(place.display_line().as_deref(), Some("New York, NY, US"));

        let partial = PlaceName::new("", "Bavaria", "Germany");
        assert!(!partial.is_usable());
        assert_eq!(partial.display_line().as_deref(), Some("Bavaria, Germany"));

        assert_eq!(PlaceName::default().display_line(), None);
    }

    #[test]
    fn test_whitespace_name_is_not_usable() {
        assert!(!PlaceName::new("   ", "", "").is_usable());
    }

    #[test]
    fn test_first_non_empty() {
        assert_eq!(first_non_empty([None, Some(""), Some("Town"), Some("Village")]), "Town");
        assert_eq!(first_non_empty([None, Some("  ")]), "");
    }

    #[test]
    fn test_sample_accuracy_comparison() {
        let coarse = PositionSample::new(1.0, 2.0, 3000.0);
        let fine = PositionSample::new(1.0, 2.0, 800.0);
        assert!(fine.is_more_accurate_than(&coarse));
        assert!(!coarse.is_more_accurate_than(&fine));
        assert!(!fine.is_more_accurate_than(&fine));
    }
}
