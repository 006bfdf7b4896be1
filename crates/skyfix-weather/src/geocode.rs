//! Forward geocoding: city name to coordinates.
//! Uses the Open-Meteo geocoding API - free, no API key required.

use reqwest::Client;
use serde::Deserialize;
use skyfix_core::Language;
use tracing::instrument;

use crate::http::{endpoint, get_json};
use crate::types::{first_non_empty, Coordinates, GeocodeError, GeocodedCity, PlaceName, ProviderError, ProviderId};

const SEARCH_PATH: &str = "/v1/search";

/// Result entry shared by the Open-Meteo search and reverse endpoints
#[derive(Debug, Default, Deserialize)]
pub(crate) struct OpenMeteoPlace {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub name: Option<String>,
    pub city: Option<String>,
    pub admin1: Option<String>,
    pub admin2: Option<String>,
    pub admin3: Option<String>,
    pub country: Option<String>,
    pub country_code: Option<String>,
}

impl OpenMeteoPlace {
    /// Whether the entry carries a place identifier
    pub fn has_name(&self) -> bool {
        [self.name.as_deref(), self.city.as_deref()]
            .into_iter()
            .flatten()
            .any(|s| !s.trim().is_empty())
    }

    pub fn to_place_name(&self) -> PlaceName {
        PlaceName {
            name: first_non_empty([self.name.as_deref(), self.city.as_deref()]),
            region: first_non_empty([
                self.admin1.as_deref(),
                self.admin2.as_deref(),
                self.admin3.as_deref(),
            ]),
            country: first_non_empty([self.country.as_deref(), self.country_code.as_deref()]),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct OpenMeteoResults {
    #[serde(default)]
    pub results: Option<Vec<OpenMeteoPlace>>,
}

impl OpenMeteoResults {
    pub fn into_places(self) -> Vec<OpenMeteoPlace> {
        self.results.unwrap_or_default()
    }
}

/// Single-provider city search
#[derive(Debug, Clone)]
pub struct ForwardGeocodeClient {
    client: Client,
    base_url: String,
}

impl ForwardGeocodeClient {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    /// Resolve a free-text city name to its best match.
    ///
    /// # Errors
    /// `NotFound` when the service has no match, `Provider` on any transport,
    /// status, or decoding failure.
    #[instrument(skip(self), level = "info")]
    pub async fn search(&self, name: &str, language: Language) -> Result<GeocodedCity, GeocodeError> {
        let url = endpoint(&self.base_url, SEARCH_PATH);
        let query = [
            ("name", name.to_string()),
            ("count", "1".to_string()),
            ("language", language.code().to_string()),
            ("format", "json".to_string()),
        ];

        let body: OpenMeteoResults =
            get_json(&self.client, ProviderId::OpenMeteoGeocoding, &url, &query).await?;

        let first = body
            .into_places()
            .into_iter()
            .next()
            .ok_or_else(|| GeocodeError::NotFound(name.to_string()))?;

        let (Some(latitude), Some(longitude)) = (first.latitude, first.longitude) else {
            return Err(ProviderError::malformed(
                ProviderId::OpenMeteoGeocoding,
                "result without coordinates",
            )
            .into());
        };

        let city = GeocodedCity {
            coordinates: Coordinates::new(latitude, longitude),
            place: first.to_place_name(),
        };
        tracing::info!(place = %city.place.name, coords = %city.coordinates, "Geocoded city");
        Ok(city)
    }
}
