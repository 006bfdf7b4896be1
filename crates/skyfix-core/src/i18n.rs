//! Localized UI strings.
//!
//! Lookups fall back to English and then to the key itself. Templates use
//! `{name}` placeholders; unknown variables render as the empty string.

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

/// Supported UI languages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    De,
}

impl Language {
    /// Map a locale tag such as `de-AT` or `de_DE.UTF-8` to a supported language.
    /// Anything that is not German is treated as English.
    pub fn from_code(code: &str) -> Self {
        if code.trim().to_lowercase().starts_with("de") {
            Self::De
        } else {
            Self::En
        }
    }

    /// Detect the language from the process locale (`LC_ALL`, then `LANG`).
    pub fn from_env() -> Self {
        std::env::var("LC_ALL")
            .ok()
            .filter(|v| !v.is_empty())
            .or_else(|| std::env::var("LANG").ok())
            .map(|v| Self::from_code(&v))
            .unwrap_or_default()
    }

    /// Two-letter code sent to providers
    pub fn code(self) -> &'static str {
        match self {
            Self::En => "en",
            Self::De => "de",
        }
    }

    pub fn is_english(self) -> bool {
        self == Self::En
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Keys into the text table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKey {
    FeelsLike,
    Humidity,
    Wind,
    NextDays,
    LoadingWeather,
    LoadingLocation,
    UpdatedFor,
    EmptyCity,
    CityNotFound,
    CityLoadError,
    WeatherLoadError,
    GeoNotSupported,
    GeoDenied,
    GeoDeniedAuto,
    GeoUnavailable,
    GeoUnavailableAuto,
    YourLocation,
    UnknownWeather,
    GenericError,
}

impl MessageKey {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::FeelsLike => "feelsLike",
            Self::Humidity => "humidity",
            Self::Wind => "wind",
            Self::NextDays => "nextDays",
            Self::LoadingWeather => "loadingWeather",
            Self::LoadingLocation => "loadingLocation",
            Self::UpdatedFor => "updatedFor",
            Self::EmptyCity => "emptyCity",
            Self::CityNotFound => "cityNotFound",
            Self::CityLoadError => "cityLoadError",
            Self::WeatherLoadError => "weatherLoadError",
            Self::GeoNotSupported => "geoNotSupported",
            Self::GeoDenied => "geoDenied",
            Self::GeoDeniedAuto => "geoDeniedAuto",
            Self::GeoUnavailable => "geoUnavailable",
            Self::GeoUnavailableAuto => "geoUnavailableAuto",
            Self::YourLocation => "yourLocation",
            Self::UnknownWeather => "unknownWeather",
            Self::GenericError => "genericError",
        }
    }
}

const EN_TEXTS: &[(MessageKey, &str)] = &[
    (MessageKey::FeelsLike, "Feels like"),
    (MessageKey::Humidity, "Humidity"),
    (MessageKey::Wind, "Wind"),
    (MessageKey::NextDays, "Next 5 days"),
    (MessageKey::LoadingWeather, "Loading weather..."),
    (MessageKey::LoadingLocation, "Detecting your location..."),
    (MessageKey::UpdatedFor, "Updated for {city}."),
    (MessageKey::EmptyCity, "Please enter a city name."),
    (MessageKey::CityNotFound, "City not found. Try another search."),
    (MessageKey::CityLoadError, "Could not load city details."),
    (MessageKey::WeatherLoadError, "Could not load weather data."),
    (MessageKey::GeoNotSupported, "Geolocation is not supported on this device."),
    (MessageKey::GeoDenied, "Location access denied. Enter a city manually."),
    (MessageKey::GeoDeniedAuto, "Location access denied. Showing {city} instead."),
    (MessageKey::GeoUnavailable, "Could not get your location. Try again."),
    (MessageKey::GeoUnavailableAuto, "Could not detect location. Showing {city} instead."),
    (MessageKey::YourLocation, "Your location"),
    (MessageKey::UnknownWeather, "Unknown"),
    (MessageKey::GenericError, "Something went wrong. Please retry."),
];

const DE_TEXTS: &[(MessageKey, &str)] = &[
    (MessageKey::FeelsLike, "Gefühlt"),
    (MessageKey::Humidity, "Luftfeuchte"),
    (MessageKey::Wind, "Wind"),
    (MessageKey::NextDays, "Nächste 5 Tage"),
    (MessageKey::LoadingWeather, "Wetter wird geladen..."),
    (MessageKey::LoadingLocation, "Standort wird ermittelt..."),
    (MessageKey::UpdatedFor, "Aktualisiert für {city}."),
    (MessageKey::EmptyCity, "Bitte einen Stadtnamen eingeben."),
    (MessageKey::CityNotFound, "Stadt nicht gefunden. Bitte erneut versuchen."),
    (MessageKey::CityLoadError, "Stadtdaten konnten nicht geladen werden."),
    (MessageKey::WeatherLoadError, "Wetterdaten konnten nicht geladen werden."),
    (MessageKey::GeoNotSupported, "Geolokalisierung wird auf diesem Gerät nicht unterstützt."),
    (MessageKey::GeoDenied, "Standortzugriff verweigert. Bitte Stadt manuell eingeben."),
    (MessageKey::GeoDeniedAuto, "Standortzugriff verweigert. Zeige stattdessen {city}."),
    (MessageKey::GeoUnavailable, "Standort konnte nicht ermittelt werden. Bitte erneut versuchen."),
    (MessageKey::GeoUnavailableAuto, "Standort konnte nicht ermittelt werden. Zeige stattdessen {city}."),
    (MessageKey::YourLocation, "Dein Standort"),
    (MessageKey::UnknownWeather, "Unbekannt"),
    (MessageKey::GenericError, "Etwas ist schiefgelaufen. Bitte erneut versuchen."),
];

// WMO weather interpretation codes, see https://open-meteo.com/en/docs#weathervariables
const EN_WEATHER: &[(i32, &str)] = &[
    (0, "Clear sky"),
    (1, "Mainly clear"),
    (2, "Partly cloudy"),
    (3, "Overcast"),
    (45, "Fog"),
    (48, "Rime fog"),
    (51, "Light drizzle"),
    (53, "Drizzle"),
    (55, "Heavy drizzle"),
    (61, "Light rain"),
    (63, "Rain"),
    (65, "Heavy rain"),
    (71, "Light snow"),
    (73, "Snow"),
    (75, "Heavy snow"),
    (77, "Snow grains"),
    (80, "Light rain showers"),
    (81, "Rain showers"),
    (82, "Violent rain showers"),
    (85, "Light snow showers"),
    (86, "Snow showers"),
    (95, "Thunderstorm"),
    (96, "Thunderstorm with hail"),
    (99, "Heavy thunderstorm with hail"),
];

const DE_WEATHER: &[(i32, &str)] = &[
    (0, "Klarer Himmel"),
    (1, "Überwiegend klar"),
    (2, "Teilweise bewölkt"),
    (3, "Bedeckt"),
    (45, "Nebel"),
    (48, "Reifnebel"),
    (51, "Leichter Niesel"),
    (53, "Nieselregen"),
    (55, "Starker Nieselregen"),
    (61, "Leichter Regen"),
    (63, "Regen"),
    (65, "Starker Regen"),
    (71, "Leichter Schnee"),
    (73, "Schnee"),
    (75, "Starker Schneefall"),
    (77, "Schneekörner"),
    (80, "Leichte Regenschauer"),
    (81, "Regenschauer"),
    (82, "Heftige Regenschauer"),
    (85, "Leichte Schneeschauer"),
    (86, "Schneeschauer"),
    (95, "Gewitter"),
    (96, "Gewitter mit Hagel"),
    (99, "Schweres Gewitter mit Hagel"),
];

static PLACEHOLDER: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"\{(\w+)\}").ok());

fn text_table(language: Language) -> &'static [(MessageKey, &'static str)] {
    match language {
        Language::En => EN_TEXTS,
        Language::De => DE_TEXTS,
    }
}

fn weather_table(language: Language) -> &'static [(i32, &'static str)] {
    match language {
        Language::En => EN_WEATHER,
        Language::De => DE_WEATHER,
    }
}

fn lookup<K: PartialEq + Copy>(table: &'static [(K, &'static str)], key: K) -> Option<&'static str> {
    table.iter().find(|(k, _)| *k == key).map(|(_, v)| *v)
}

/// Replace `{var}` placeholders with values from `vars`.
pub fn interpolate(template: &str, vars: &[(&str, &str)]) -> String {
    let Some(re) = PLACEHOLDER.as_ref() else {
        return template.to_string();
    };
    re.replace_all(template, |caps: &Captures| {
        let name = &caps[1];
        vars.iter()
            .find(|(k, _)| *k == name)
            .map(|(_, v)| (*v).to_string())
            .unwrap_or_default()
    })
    .into_owned()
}

/// Text lookup bound to one language
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Texts {
    language: Language,
}

impl Texts {
    pub fn new(language: Language) -> Self {
        Self { language }
    }

    pub fn language(&self) -> Language {
        self.language
    }

    /// Template for `key` without substitution
    pub fn get(&self, key: MessageKey) -> &'static str {
        lookup(text_table(self.language), key)
            .or_else(|| lookup(EN_TEXTS, key))
            .unwrap_or(key.as_str())
    }

    pub fn t(&self, key: MessageKey) -> String {
        self.t_with(key, &[])
    }

    pub fn t_with(&self, key: MessageKey, vars: &[(&str, &str)]) -> String {
        interpolate(self.get(key), vars)
    }

    /// Localized label for a WMO weather code
    pub fn weather_label(&self, code: i32) -> String {
        lookup(weather_table(self.language), code)
            .or_else(|| lookup(EN_WEATHER, code))
            .map(str::to_string)
            .unwrap_or_else(|| self.t(MessageKey::UnknownWeather))
    }
}
