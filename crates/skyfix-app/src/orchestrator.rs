//! Resolution pipeline: position, then place name and weather, then render.
//!
//! Every run returns exactly one [`ResolutionOutcome`]. Runs are numbered;
//! only the newest run may touch the renderer or the displayed result, so a
//! slow run overtaken by a newer one finishes silently.

use parking_lot::Mutex;
use skyfix_core::{Config, Language, MessageKey, NetworkError, Texts};
use skyfix_weather::{
    build_client, ForwardGeocodeClient, GeocodeError, LocationError, LocationSensor, PlaceName, PositionSampler,
    ReverseGeocodeResolver, WeatherData, WeatherError, WeatherProvider,
};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::instrument;

use crate::render::{Renderer, StatusLine, WeatherView};

/// What started a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Start-up; failures fall back to the default city
    Automatic,
    /// Explicit user request; failures are surfaced
    Manual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunState {
    #[default]
    Idle,
    AcquiringPosition,
    ResolvingPlaceAndWeather,
    Rendered,
    FallbackToDefault,
    Failed,
}

/// Why a run did not produce the requested result
#[derive(Debug, thiserror::Error)]
pub enum FailureReason {
    #[error(transparent)]
    Location(#[from] LocationError),
    #[error(transparent)]
    Weather(#[from] WeatherError),
    #[error(transparent)]
    Geocode(#[from] GeocodeError),
    #[error("empty city name")]
    EmptyQuery,
}

/// A named place with its weather
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    pub place: PlaceName,
    pub weather: WeatherData,
}

#[derive(Debug)]
pub enum ResolutionOutcome {
    Success(Resolved),
    /// The requested lookup failed and the default city was loaded instead.
    /// `fallback` carries the default city's own result.
    FellBackToDefault {
        city: String,
        reason: FailureReason,
        fallback: Result<Resolved, FailureReason>,
    },
    Failed(FailureReason),
}

impl ResolutionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

/// Drives one pipeline run at a time against a renderer
pub struct ResolutionOrchestrator {
    sampler: PositionSampler,
    reverse: ReverseGeocodeResolver,
    forward: ForwardGeocodeClient,
    weather: WeatherProvider,
    renderer: Arc<dyn Renderer>,
    default_city: String,
    language: Mutex<Language>,
    generation: AtomicU64,
    state: Mutex<RunState>,
    displayed: Mutex<Option<Resolved>>,
}

impl fmt::Debug for ResolutionOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolutionOrchestrator")
            .field("default_city", &self.default_city)
            .field("language", &*self.language.lock())
            .field("generation", &self.generation.load(Ordering::SeqCst))
            .field("state", &*self.state.lock())
            .finish_non_exhaustive()
    }
}

impl ResolutionOrchestrator {
    /// Wire every service from `config`, sharing one HTTP client
    pub fn from_config(
        config: &Config,
        sensor: Arc<dyn LocationSensor>,
        renderer: Arc<dyn Renderer>,
    ) -> Result<Self, NetworkError> {
        let client = build_client(&config.network)?;
        let urls = &config.providers;

        Ok(Self {
            sampler: PositionSampler::new(sensor, &config.sampler),
            reverse: ReverseGeocodeResolver::with_default_providers(client.clone(), urls),
            forward: ForwardGeocodeClient::new(client.clone(), &urls.geocoding),
            weather: WeatherProvider::new(client, &urls.forecast),
            renderer,
            default_city: config.default_city.clone(),
            language: Mutex::new(config.language()),
            generation: AtomicU64::new(0),
            state: Mutex::new(RunState::Idle),
            displayed: Mutex::new(None),
        })
    }

    pub fn language(&self) -> Language {
        *self.language.lock()
    }

    pub fn state(&self) -> RunState {
        *self.state.lock()
    }

    /// The result currently on screen
    pub fn displayed(&self) -> Option<Resolved> {
        self.displayed.lock().clone()
    }

    fn texts(&self) -> Texts {
        Texts::new(self.language())
    }

    /// Start a new run, superseding any run in flight
    fn begin(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn is_current(&self, run: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == run
    }

    fn transition(&self, run: u64, next: RunState) {
        if self.is_current(run) {
            let mut state = self.state.lock();
            tracing::info!(run, from = ?*state, to = ?next, "Run state");
            *state = next;
        }
    }

    fn status(&self, run: u64, key: MessageKey, vars: &[(&str, &str)]) {
        if self.is_current(run) {
            self.renderer.show_status(&StatusLine::info(&self.texts(), key, vars));
        }
    }

    fn error_status(&self, run: u64, key: MessageKey, vars: &[(&str, &str)]) {
        if self.is_current(run) {
            self.renderer.show_status(&StatusLine::error(&self.texts(), key, vars));
        }
    }

    fn clear(&self, run: u64) {
        if self.is_current(run) {
            self.renderer.clear();
        }
    }

    fn draw(&self, resolved: &Resolved) {
        let texts = self.texts();
        self.renderer
            .show_weather(&WeatherView::compose(&resolved.place, &resolved.weather, &texts));
        let city = if resolved.place.is_usable() {
            resolved.place.name.clone()
        } else {
            texts.t(MessageKey::YourLocation)
        };
        self.renderer
            .show_status(&StatusLine::info(&texts, MessageKey::UpdatedFor, &[("city", &city)]));
    }

    /// Render and remember `resolved` if `run` is still the newest
    fn render_and_store(&self, run: u64, resolved: &Resolved) {
        if !self.is_current(run) {
            tracing::debug!(run, "Superseded run finished, not rendering");
            return;
        }
        self.draw(resolved);
        *self.displayed.lock() = Some(resolved.clone());
        self.transition(run, RunState::Rendered);
    }

    /// Locate the device and show its weather
    #[instrument(skip(self), level = "info")]
    pub async fn locate(&self, mode: Mode) -> ResolutionOutcome {
        let run = self.begin();
        self.transition(run, RunState::AcquiringPosition);
        if !self.sampler.is_supported() {
            return self.location_failed(run, mode, LocationError::Unsupported).await;
        }
        self.status(run, MessageKey::LoadingLocation, &[]);
        self.clear(run);

        let sample = match self.sampler.acquire().await {
            Ok(sample) => sample,
            Err(error) => return self.location_failed(run, mode, error).await,
        };

        self.transition(run, RunState::ResolvingPlaceAndWeather);
        let coords = sample.coordinates();
        let language = self.language();
        let (place, weather) = tokio::join!(
            self.reverse.resolve(coords, language),
            self.weather.fetch(coords)
        );

        match weather {
            Ok(weather) => {
                let resolved = Resolved { place, weather };
                self.render_and_store(run, &resolved);
                ResolutionOutcome::Success(resolved)
            }
            Err(error) => {
                tracing::warn!(%error, "Weather lookup failed for position");
                match mode {
                    Mode::Automatic => {
                        self.fall_back(run, MessageKey::GeoUnavailableAuto, error.into())
                            .await
                    }
                    Mode::Manual => {
                        self.error_status(run, MessageKey::WeatherLoadError, &[]);
                        self.transition(run, RunState::Failed);
                        ResolutionOutcome::Failed(error.into())
                    }
                }
            }
        }
    }

    async fn location_failed(&self, run: u64, mode: Mode, error: LocationError) -> ResolutionOutcome {
        tracing::warn!(%error, ?mode, "Position unavailable");
        let (auto_key, manual_key) = match error {
            LocationError::Unsupported => (MessageKey::GeoNotSupported, MessageKey::GeoNotSupported),
            LocationError::PermissionDenied => (MessageKey::GeoDeniedAuto, MessageKey::GeoDenied),
            LocationError::Unavailable(_) | LocationError::Timeout => {
                (MessageKey::GeoUnavailableAuto, MessageKey::GeoUnavailable)
            }
        };

        match mode {
            Mode::Automatic => self.fall_back(run, auto_key, error.into()).await,
            Mode::Manual => {
                self.error_status(run, manual_key, &[]);
                self.transition(run, RunState::Failed);
                ResolutionOutcome::Failed(error.into())
            }
        }
    }

    /// Surface `key` and load the default city within the same run
    async fn fall_back(&self, run: u64, key: MessageKey, reason: FailureReason) -> ResolutionOutcome {
        let city = self.default_city.clone();
        tracing::warn!(%city, %reason, "Falling back to default city");
        self.transition(run, RunState::FallbackToDefault);
        self.error_status(run, key, &[("city", &city)]);

        let fallback = self.load_city(run, &city).await;
        ResolutionOutcome::FellBackToDefault { city, reason, fallback }
    }

    /// Look up a city by name and show its weather
    #[instrument(skip(self), level = "info")]
    pub async fn search_city(&self, query: &str) -> ResolutionOutcome {
        let run = self.begin();
        match self.load_city(run, query).await {
            Ok(resolved) => ResolutionOutcome::Success(resolved),
            Err(reason) => ResolutionOutcome::Failed(reason),
        }
    }

    async fn load_city(&self, run: u64, query: &str) -> Result<Resolved, FailureReason> {
        let query = query.trim();
        if query.is_empty() {
            self.error_status(run, MessageKey::EmptyCity, &[]);
            self.transition(run, RunState::Failed);
            return Err(FailureReason::EmptyQuery);
        }

        self.status(run, MessageKey::LoadingWeather, &[]);
        self.clear(run);
        self.transition(run, RunState::ResolvingPlaceAndWeather);

        let result = self.lookup_city(query).await;
        match &result {
            Ok(resolved) => self.render_and_store(run, resolved),
            Err(reason) => {
                let key = match reason {
                    FailureReason::Geocode(GeocodeError::NotFound(_)) => MessageKey::CityNotFound,
                    FailureReason::Geocode(GeocodeError::Provider(_)) => MessageKey::CityLoadError,
                    FailureReason::Weather(_) => MessageKey::WeatherLoadError,
                    FailureReason::Location(_) | FailureReason::EmptyQuery => MessageKey::GenericError,
                };
                tracing::warn!(%reason, city = query, "City lookup failed");
                self.error_status(run, key, &[]);
                self.transition(run, RunState::Failed);
            }
        }
        result
    }

    async fn lookup_city(&self, query: &str) -> Result<Resolved, FailureReason> {
        let city = self.forward.search(query, self.language()).await?;
        let weather = self.weather.fetch(city.coordinates).await?;
        Ok(Resolved {
            place: city.place,
            weather,
        })
    }

    /// Switch the display language, redrawing the shown result from memory.
    /// Returns whether anything changed.
    pub fn set_language(&self, language: Language) -> bool {
        {
            let mut current = self.language.lock();
            if *current == language {
                return false;
            }
            *current = language;
        }
        tracing::info!(%language, "Display language changed");

        if let Some(resolved) = self.displayed() {
            self.draw(&resolved);
        }
        true
    }
}
