//! Reverse geocoding: coordinates to a human-readable place name.
//!
//! No free provider has reliable global coverage, so [`ReverseGeocodeResolver`]
//! walks a fixed cascade of providers. Each provider gets the requested
//! language first and English second (only when the request was not already
//! English). The first attempt yielding a named place wins; provider failures
//! count as misses and never escape the cascade.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use skyfix_core::{Language, ProviderUrls};
use std::sync::Arc;
use tracing::instrument;

use crate::geocode::OpenMeteoResults;
use crate::http::{endpoint, get_json};
use crate::types::{first_non_empty, Coordinates, PlaceName, ProviderError, ProviderId};

/// One reverse geocoding service
#[async_trait]
pub trait ReverseProvider: Send + Sync {
    fn id(&self) -> ProviderId;

    /// Look up the place at `coords`. An empty [`PlaceName`] means the
    /// provider answered without a usable candidate.
    async fn reverse(&self, coords: Coordinates, language: Language) -> Result<PlaceName, ProviderError>;
}

/// Outcome of one cascade step
#[derive(Debug)]
pub struct ProviderAttempt {
    pub provider: ProviderId,
    pub language: Language,
    pub result: Result<PlaceName, ProviderError>,
}

impl ProviderAttempt {
    pub fn is_usable(&self) -> bool {
        matches!(&self.result, Ok(place) if place.is_usable())
    }
}

/// Final place plus every attempt made to find it
#[derive(Debug)]
pub struct ReverseResolution {
    pub place: PlaceName,
    pub attempts: Vec<ProviderAttempt>,
}

/// Cascading multi-provider reverse geocoder
#[derive(Clone)]
pub struct ReverseGeocodeResolver {
    providers: Vec<Arc<dyn ReverseProvider>>,
}

impl std::fmt::Debug for ReverseGeocodeResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.providers.iter().map(|p| p.id()))
            .finish()
    }
}

impl ReverseGeocodeResolver {
    /// Providers are tried in the given order
    pub fn new(providers: Vec<Arc<dyn ReverseProvider>>) -> Self {
        Self { providers }
    }

    /// Open-Meteo, then Nominatim, then BigDataCloud
    pub fn with_default_providers(client: Client, urls: &ProviderUrls) -> Self {
        Self::new(vec![
            Arc::new(OpenMeteoReverse::new(client.clone(), &urls.geocoding)),
            Arc::new(NominatimReverse::new(client.clone(), &urls.nominatim)),
            Arc::new(BigDataCloudReverse::new(client, &urls.bigdatacloud)),
        ])
    }

    /// Lazy (provider, language) sequence for a request in `language`
    fn steps(&self, language: Language) -> impl Iterator<Item = (&dyn ReverseProvider, Language)> + '_ {
        let fallback = (!language.is_english()).then_some(Language::En);
        self.providers.iter().flat_map(move |provider| {
            std::iter::once(language)
                .chain(fallback)
                .map(move |lang| (provider.as_ref(), lang))
        })
    }

    /// Resolve to a place name; empty when every step misses
    pub async fn resolve(&self, coords: Coordinates, language: Language) -> PlaceName {
        self.resolve_with_attempts(coords, language).await.place
    }

    #[instrument(skip(self), level = "info")]
    pub async fn resolve_with_attempts(&self, coords: Coordinates, language: Language) -> ReverseResolution {
        let mut attempts = Vec::new();

        for (provider, lang) in self.steps(language) {
            let result = provider.reverse(coords, lang).await;
            match &result {
                Ok(place) if place.is_usable() => {
                    tracing::info!(provider = %provider.id(), language = %lang, place = %place.name, "Reverse geocoded");
                    let place = place.clone();
                    attempts.push(ProviderAttempt {
                        provider: provider.id(),
                        language: lang,
                        result,
                    });
                    return ReverseResolution { place, attempts };
                }
                Ok(_) => {
                    tracing::debug!(provider = %provider.id(), language = %lang, "No usable candidate");
                }
                Err(e) => {
                    tracing::debug!(
                        provider = %provider.id(),
                        language = %lang,
                        transient = e.source.is_transient(),
                        error = %e,
                        "Reverse geocode attempt failed"
                    );
                }
            }
            attempts.push(ProviderAttempt {
                provider: provider.id(),
                language: lang,
                result,
            });
        }

        tracing::info!(attempts = attempts.len(), "No provider named this location");
        ReverseResolution {
            place: PlaceName::default(),
            attempts,
        }
    }
}

/// Open-Meteo reverse geocoding
#[derive(Debug, Clone)]
pub struct OpenMeteoReverse {
    client: Client,
    base_url: String,
}

impl OpenMeteoReverse {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl ReverseProvider for OpenMeteoReverse {
    fn id(&self) -> ProviderId {
        ProviderId::OpenMeteoReverse
    }

    async fn reverse(&self, coords: Coordinates, language: Language) -> Result<PlaceName, ProviderError> {
        let url = endpoint(&self.base_url, "/v1/reverse");
        let query = [
            ("latitude", coords.latitude.to_string()),
            ("longitude", coords.longitude.to_string()),
            ("count", "5".to_string()),
            ("language", language.code().to_string()),
            ("format", "json".to_string()),
        ];

        let body: OpenMeteoResults = get_json(&self.client, self.id(), &url, &query).await?;
        Ok(body
            .into_places()
            .iter()
            .find(|candidate| candidate.has_name())
            .map(|candidate| candidate.to_place_name())
            .unwrap_or_default())
    }
}

#[derive(Debug, Default, Deserialize)]
struct NominatimResponse {
    name: Option<String>,
    #[serde(default)]
    address: NominatimAddress,
}

#[derive(Debug, Default, Deserialize)]
struct NominatimAddress {
    city: Option<String>,
    town: Option<String>,
    village: Option<String>,
    municipality: Option<String>,
    county: Option<String>,
    state: Option<String>,
    region: Option<String>,
    country: Option<String>,
}

impl NominatimResponse {
    fn to_place_name(&self) -> PlaceName {
        let a = &self.address;
        PlaceName {
            // Prefer city > town > village > municipality > county
            name: first_non_empty([
                a.city.as_deref(),
                a.town.as_deref(),
                a.village.as_deref(),
                a.municipality.as_deref(),
                a.county.as_deref(),
                self.name.as_deref(),
            ]),
            region: first_non_empty([a.state.as_deref(), a.region.as_deref()]),
            country: first_non_empty([a.country.as_deref()]),
        }
    }
}

/// Nominatim (OpenStreetMap) reverse geocoding
#[derive(Debug, Clone)]
pub struct NominatimReverse {
    client: Client,
    base_url: String,
}

impl NominatimReverse {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl ReverseProvider for NominatimReverse {
    fn id(&self) -> ProviderId {
        ProviderId::Nominatim
    }

    async fn reverse(&self, coords: Coordinates, language: Language) -> Result<PlaceName, ProviderError> {
        let url = endpoint(&self.base_url, "/reverse");
        let query = [
            ("lat", coords.latitude.to_string()),
            ("lon", coords.longitude.to_string()),
            ("format", "jsonv2".to_string()),
            ("addressdetails", "1".to_string()),
            ("zoom", "10".to_string()),
            ("accept-language", language.code().to_string()),
        ];

        let body: NominatimResponse = get_json(&self.client, self.id(), &url, &query).await?;
        Ok(body.to_place_name())
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BigDataCloudResponse {
    city: Option<String>,
    locality: Option<String>,
    principal_subdivision: Option<String>,
    country_name: Option<String>,
    country_code: Option<String>,
    #[serde(default)]
    locality_info: LocalityInfo,
}

#[derive(Debug, Default, Deserialize)]
struct LocalityInfo {
    #[serde(default)]
    administrative: Vec<AdministrativeArea>,
}

#[derive(Debug, Default, Deserialize)]
struct AdministrativeArea {
    name: Option<String>,
}

impl BigDataCloudResponse {
    fn to_place_name(&self) -> PlaceName {
        // administrative[2] is usually the municipality level
        let municipality = self
            .locality_info
            .administrative
            .get(2)
            .and_then(|area| area.name.as_deref());
        PlaceName {
            name: first_non_empty([self.city.as_deref(), self.locality.as_deref(), municipality]),
            region: first_non_empty([self.principal_subdivision.as_deref()]),
            country: first_non_empty([self.country_name.as_deref(), self.country_code.as_deref()]),
        }
    }
}

/// BigDataCloud client-side reverse geocoding
#[derive(Debug, Clone)]
pub struct BigDataCloudReverse {
    client: Client,
    base_url: String,
}

impl BigDataCloudReverse {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl ReverseProvider for BigDataCloudReverse {
    fn id(&self) -> ProviderId {
        ProviderId::BigDataCloud
    }

    async fn reverse(&self, coords: Coordinates, language: Language) -> Result<PlaceName, ProviderError> {
        let url = endpoint(&self.base_url, "/data/reverse-geocode-client");
        let query = [
            ("latitude", coords.latitude.to_string()),
            ("longitude", coords.longitude.to_string()),
            ("localityLanguage", language.code().to_string()),
        ];

        let body: BigDataCloudResponse = get_json(&self.client, self.id(), &url, &query).await?;
        Ok(body.to_place_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::build_client;
    use parking_lot::Mutex;
    use skyfix_core::{NetworkConfig, NetworkError};
    use std::collections::HashMap;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Scripted provider; languages without an answer return an empty place
    struct FakeProvider {
        id: ProviderId,
        answers: HashMap<Language, PlaceName>,
        failing: bool,
        calls: Arc<Mutex<Vec<(ProviderId, Language)>>>,
    }

    impl FakeProvider {
        fn new(id: ProviderId, calls: &Arc<Mutex<Vec<(ProviderId, Language)>>>) -> Self {
            Self {
                id,
                answers: HashMap::new(),
                failing: false,
                calls: calls.clone(),
            }
        }

        fn answers(mut self, language: Language, place: PlaceName) -> Self {
            self.answers.insert(language, place);
            self
        }

        fn failing(mut self) -> Self {
            self.failing = true;
            self
        }
    }

    #[async_trait]
    impl ReverseProvider for FakeProvider {
        fn id(&self) -> ProviderId {
            self.id
        }

        async fn reverse(&self, _coords: Coordinates, language: Language) -> Result<PlaceName, ProviderError> {
            self.calls.lock().push((self.id, language));
            if self.failing {
                return Err(ProviderError::new(self.id, NetworkError::Timeout));
            }
            Ok(self.answers.get(&language).cloned().unwrap_or_default())
        }
    }

    fn coords() -> Coordinates {
        Coordinates::new(48.137, 11.575)
    }

    fn resolver(providers: Vec<FakeProvider>) -> ReverseGeocodeResolver {
        ReverseGeocodeResolver::new(
            providers
                .into_iter()
                .map(|p| Arc::new(p) as Arc<dyn ReverseProvider>)
                .collect(),
        )
    }

    #[tokio::test]
    async fn test_short_circuits_on_english_retry_of_first_provider() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let resolver = resolver(vec![
            FakeProvider::new(ProviderId::OpenMeteoReverse, &calls)
                .answers(Language::En, PlaceName::new("Munich", "Bavaria", "Germany")),
            FakeProvider::new(ProviderId::Nominatim, &calls),
            FakeProvider::new(ProviderId::BigDataCloud, &calls),
        ]);

        let resolution = resolver.resolve_with_attempts(coords(), Language::De).await;

        assert_eq!(resolution.place.name, "Munich");
        assert_eq!(
            *calls.lock(),
            vec![
                (ProviderId::OpenMeteoReverse, Language::De),
                (ProviderId::OpenMeteoReverse, Language::En),
            ]
        );
        assert_eq!(resolution.attempts.len(), 2);
        assert!(resolution.attempts[1].is_usable());
    }

    #[tokio::test]
    async fn test_full_cascade_order_for_non_english() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let resolver = resolver(vec![
            FakeProvider::new(ProviderId::OpenMeteoReverse, &calls),
            FakeProvider::new(ProviderId::Nominatim, &calls),
            FakeProvider::new(ProviderId::BigDataCloud, &calls),
        ]);

        let place = resolver.resolve(coords(), Language::De).await;

        assert_eq!(place, PlaceName::default());
        assert_eq!(
            *calls.lock(),
            vec![
                (ProviderId::OpenMeteoReverse, Language::De),
                (ProviderId::OpenMeteoReverse, Language::En),
                (ProviderId::Nominatim, Language::De),
                (ProviderId::Nominatim, Language::En),
                (ProviderId::BigDataCloud, Language::De),
                (ProviderId::BigDataCloud, Language::En),
            ]
        );
    }

    #[tokio::test]
    async fn test_english_request_skips_english_retry() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let resolver = resolver(vec![
            FakeProvider::new(ProviderId::OpenMeteoReverse, &calls),
            FakeProvider::new(ProviderId::Nominatim, &calls),
            FakeProvider::new(ProviderId::BigDataCloud, &calls)
                .answers(Language::En, PlaceName::new("Springfield", "", "")),
        ]);

        let place = resolver.resolve(coords(), Language::En).await;

        assert_eq!(place.name, "Springfield");
        assert_eq!(calls.lock().len(), 3);
    }

    #[tokio::test]
    async fn test_provider_errors_never_escape() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let resolver = resolver(vec![
            FakeProvider::new(ProviderId::OpenMeteoReverse, &calls).failing(),
            FakeProvider::new(ProviderId::Nominatim, &calls).failing(),
            FakeProvider::new(ProviderId::BigDataCloud, &calls).failing(),
        ]);

        let resolution = resolver.resolve_with_attempts(coords(), Language::De).await;

        assert_eq!(resolution.place, PlaceName::default());
        assert_eq!(resolution.attempts.len(), 6);
        assert!(resolution.attempts.iter().all(|a| a.result.is_err()));
    }

    #[tokio::test]
    async fn test_error_falls_through_to_next_provider() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let resolver = resolver(vec![
            FakeProvider::new(ProviderId::OpenMeteoReverse, &calls).failing(),
            FakeProvider::new(ProviderId::Nominatim, &calls)
                .answers(Language::De, PlaceName::new("München", "Bayern", "Deutschland")),
            FakeProvider::new(ProviderId::BigDataCloud, &calls),
        ]);

        let place = resolver.resolve(coords(), Language::De).await;

        assert_eq!(place, PlaceName::new("München", "Bayern", "Deutschland"));
        assert!(!calls.lock().iter().any(|(id, _)| *id == ProviderId::BigDataCloud));
    }

    #[tokio::test]
    async fn test_region_only_answer_is_not_usable() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let resolver = resolver(vec![
            FakeProvider::new(ProviderId::OpenMeteoReverse, &calls)
                .answers(Language::En, PlaceName::new("", "Bavaria", "Germany")),
            FakeProvider::new(ProviderId::Nominatim, &calls)
                .answers(Language::En, PlaceName::new("Freising", "Bavaria", "Germany")),
        ]);

        let place = resolver.resolve(coords(), Language::En).await;

        assert_eq!(place.name, "Freising");
    }

    #[test]
    fn test_nominatim_field_priority() {
        let body: NominatimResponse = serde_json::from_value(serde_json::json!({
            "name": "Marienplatz",
            "address": {
                "town": "",
                "village": "Garching",
                "county": "Landkreis München",
                "region": "Oberbayern",
                "country": "Deutschland"
            }
        }))
        .unwrap();
        assert_eq!(
            body.to_place_name(),
            PlaceName::new("Garching", "Oberbayern", "Deutschland")
        );
    }

    #[test]
    fn test_nominatim_error_body_is_empty_place() {
        let body: NominatimResponse =
            serde_json::from_value(serde_json::json!({"error": "Unable to geocode"})).unwrap();
        assert!(!body.to_place_name().is_usable());
    }

    #[test]
    fn test_bigdatacloud_field_priority() {
        let body: BigDataCloudResponse = serde_json::from_value(serde_json::json!({
            "city": "",
            "locality": "",
            "principalSubdivision": "California",
            "countryCode": "US",
            "localityInfo": {
                "administrative": [
                    {"name": "United States"},
                    {"name": "California"},
                    {"name": "Santa Clara County"}
                ]
            }
        }))
        .unwrap();
        assert_eq!(
            body.to_place_name(),
            PlaceName::new("Santa Clara County", "California", "US")
        );
    }

    #[tokio::test]
    async fn test_http_cascade_stops_at_first_provider() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1/reverse"))
            .and(query_param("language", "en"))
            .and(query_param("count", "5"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "results": [
                    {"name": "", "admin1": "NY"},
                    {"name": "New York", "admin1": "NY", "country": "US"}
                ]
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        Mock::given(method("GET"))
            .and(path("/reverse"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&mock_server)
            .await;

        Mock::given(method("GET"))
            .and(path("/data/reverse-geocode-client"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&mock_server)
            .await;

        let client = build_client(&NetworkConfig::default()).unwrap();
        let resolver =
            ReverseGeocodeResolver::with_default_providers(client, &ProviderUrls::all(&mock_server.uri()));

        let place = resolver.resolve(Coordinates::new(40.7, -74.0), Language::En).await;

        assert_eq!(place.display_line().as_deref(), Some("New York, NY, US"));
    }

    #[tokio::test]
    async fn test_http_cascade_survives_outages() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1/reverse"))
            .respond_with(ResponseTemplate::new(502))
            .expect(2)
            .mount(&mock_server)
            .await;

        Mock::given(method("GET"))
            .and(path("/reverse"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .expect(2)
            .mount(&mock_server)
            .await;

        Mock::given(method("GET"))
            .and(path("/data/reverse-geocode-client"))
            .and(query_param("localityLanguage", "en"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "locality": "Wien",
                "principalSubdivision": "Wien",
                "countryName": "Österreich"
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        Mock::given(method("GET"))
            .and(path("/data/reverse-geocode-client"))
            .and(query_param("localityLanguage", "de"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = build_client(&NetworkConfig::default()).unwrap();
        let resolver =
            ReverseGeocodeResolver::with_default_providers(client, &ProviderUrls::all(&mock_server.uri()));

        let resolution = resolver
            .resolve_with_attempts(Coordinates::new(48.2, 16.37), Language::De)
            .await;

        assert_eq!(resolution.place.name, "Wien");
        assert_eq!(resolution.attempts.len(), 6);
        assert_eq!(resolution.attempts[5].provider, ProviderId::BigDataCloud);
    }
}
