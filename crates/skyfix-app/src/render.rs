//! View composition and the render seam.
//!
//! The orchestrator never formats text itself: it composes a [`WeatherView`]
//! or a [`StatusLine`] from domain data and hands it to a [`Renderer`].

use chrono::{Locale, NaiveDate, TimeZone, Utc};
use skyfix_core::{Language, MessageKey, Texts};
use skyfix_weather::{DayForecast, PlaceName, WeatherData};

/// Status bar message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusLine {
    pub key: MessageKey,
    pub text: String,
    pub is_error: bool,
}

impl StatusLine {
    pub fn info(texts: &Texts, key: MessageKey, vars: &[(&str, &str)]) -> Self {
        Self {
            key,
            text: texts.t_with(key, vars),
            is_error: false,
        }
    }

    pub fn error(texts: &Texts, key: MessageKey, vars: &[(&str, &str)]) -> Self {
        Self {
            is_error: true,
            ..Self::info(texts, key, vars)
        }
    }
}

/// Current conditions panel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentView {
    pub symbol: &'static str,
    pub summary: String,
    pub temperature: String,
    pub feels_like: String,
    pub humidity: String,
    pub wind: String,
}

/// One forecast card
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayView {
    pub label: String,
    pub symbol: &'static str,
    pub summary: String,
    pub temperatures: String,
}

/// Section headings in the display language
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Headings {
    pub feels_like: String,
    pub humidity: String,
    pub wind: String,
    pub next_days: String,
}

/// Everything needed to draw a resolved place
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeatherView {
    pub place_line: String,
    pub is_day: bool,
    pub current: CurrentView,
    pub days: Vec<DayView>,
    pub headings: Headings,
}

fn one_decimal(value: f64) -> String {
    format!("{value:.1}")
}

/// Short weekday, month and day number in the language's order
pub fn format_day(date: NaiveDate, language: Language) -> String {
    let (pattern, locale) = match language {
        Language::En => ("%a, %b %-d", Locale::en_US),
        Language::De => ("%a, %-d. %b", Locale::de_DE),
    };
    // Noon keeps the calendar day stable
    match date.and_hms_opt(12, 0, 0) {
        Some(noon) => Utc
            .from_utc_datetime(&noon)
            .format_localized(pattern, locale)
            .to_string(),
        None => date.to_string(),
    }
}

/// Place parts joined by ", ", or the "your location" label
pub fn place_line(place: &PlaceName, texts: &Texts) -> String {
    place
        .display_line()
        .unwrap_or_else(|| texts.t(MessageKey::YourLocation))
}

impl WeatherView {
    pub fn compose(place: &PlaceName, weather: &WeatherData, texts: &Texts) -> Self {
        let is_day = weather.is_day();
        let units = &weather.units;
        let current = &weather.current;

        let days = weather
            .upcoming_days()
            .map(|day| compose_day(day, weather, texts))
            .collect();

        Self {
            place_line: place_line(place, texts),
            is_day,
            current: CurrentView {
                symbol: current.condition.symbol(is_day),
                summary: texts.weather_label(current.weather_code),
                temperature: format!("{}{}", one_decimal(current.temperature), units.temperature),
                feels_like: format!("{}{}", one_decimal(current.feels_like), units.feels_like),
                humidity: format!("{}{}", current.humidity, units.humidity),
                wind: format!("{} {}", one_decimal(current.wind_speed), units.wind_speed),
            },
            days,
            headings: Headings {
                feels_like: texts.t(MessageKey::FeelsLike),
                humidity: texts.t(MessageKey::Humidity),
                wind: texts.t(MessageKey::Wind),
                next_days: texts.t(MessageKey::NextDays),
            },
        }
    }
}

fn compose_day(day: &DayForecast, weather: &WeatherData, texts: &Texts) -> DayView {
    DayView {
        label: format_day(day.date, texts.language()),
        symbol: day.condition.symbol(true),
        summary: texts.weather_label(day.weather_code),
        temperatures: format!(
            "{}{} / {}{}",
            one_decimal(day.high),
            weather.units.high,
            one_decimal(day.low),
            weather.units.low
        ),
    }
}

/// Display surface driven by the orchestrator
pub trait Renderer: Send + Sync {
    fn show_weather(&self, view: &WeatherView);

    fn show_status(&self, status: &StatusLine);

    /// Hide the weather panels while a new result loads
    fn clear(&self);
}

/// Plain terminal output
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleRenderer;

impl Renderer for ConsoleRenderer {
    fn show_weather(&self, view: &WeatherView) {
        let current = &view.current;
        println!();
        println!("{}", view.place_line);
        println!("  {} {}  {}", current.symbol, current.temperature, current.summary);
        println!(
            "  {} {} | {} {} | {} {}",
            view.headings.feels_like,
            current.feels_like,
            view.headings.humidity,
            current.humidity,
            view.headings.wind,
            current.wind
        );
        if !view.days.is_empty() {
            println!();
            println!("{}", view.headings.next_days);
            for day in &view.days {
                println!("  {:<14} {} {:<24} {}", day.label, day.symbol, day.summary, day.temperatures);
            }
        }
    }

    fn show_status(&self, status: &StatusLine) {
        if status.is_error {
            eprintln!("! {}", status.text);
        } else {
            eprintln!("{}", status.text);
        }
    }

    fn clear(&self) {
        // Nothing to hide on a scrolling terminal
    }
}
