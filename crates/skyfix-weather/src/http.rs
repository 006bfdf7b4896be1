//! Shared HTTP plumbing for the provider clients.

use reqwest::header::ACCEPT;
use reqwest::Client;
use serde::de::DeserializeOwned;
use skyfix_core::{NetworkConfig, NetworkError, ReqwestErrorExt};

use crate::types::{ProviderError, ProviderId};

/// Build the client shared by every provider
pub fn build_client(network: &NetworkConfig) -> Result<Client, NetworkError> {
    Client::builder()
        .timeout(network.request_timeout())
        .user_agent(network.user_agent.as_str())
        .build()
        .map_err(|e| NetworkError::ClientBuild(e.to_string()))
}

/// GET `url` with `query` and decode a JSON body.
///
/// Non-2xx statuses and undecodable bodies become [`ProviderError`]s tagged
/// with `provider`.
pub(crate) async fn get_json<T: DeserializeOwned>(
    client: &Client,
    provider: ProviderId,
    url: &str,
    query: &[(&str, String)],
) -> Result<T, ProviderError> {
    let response = client
        .get(url)
        .query(query)
        .header(ACCEPT, "application/json")
        .send()
        .await
        .map_err(|e| ProviderError::new(provider, e.into_network_error()))?;

    let status = response.status();
    if !status.is_success() {
        let text = response.text().await.unwrap_or_default();
        tracing::debug!(%provider, status = status.as_u16(), "Provider returned error status");
        return Err(ProviderError::new(
            provider,
            NetworkError::ServerError {
                status: status.as_u16(),
                message: text,
            },
        ));
    }

    response
        .json()
        .await
        .map_err(|e| ProviderError::malformed(provider, e.to_string()))
}

/// Join a configured base URL and an endpoint path
pub(crate) fn endpoint(base_url: &str, path: &str) -> String {
    format!("{}{}", base_url.trim_end_matches('/'), path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[derive(Debug, serde::Deserialize)]
    struct Echo {
        value: i32,
    }

    fn client() -> Client {
        build_client(&NetworkConfig::default()).unwrap()
    }

    #[test]
    fn test_endpoint_trims_trailing_slash() {
        assert_eq!(endpoint("http://host/", "/v1/search"), "http://host/v1/search");
        assert_eq!(endpoint("http://host", "/v1/search"), "http://host/v1/search");
    }

    #[tokio::test]
    async fn test_get_json_sends_query_and_accept_header() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/echo"))
            .and(query_param("q", "x y"))
            .and(header("Accept", "application/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"value": 7})))
            .expect(1)
            .mount(&mock_server)
            .await;

        let url = endpoint(&mock_server.uri(), "/echo");
        let echo: Echo = get_json(&client(), ProviderId::Nominatim, &url, &[("q", "x y".to_string())])
            .await
            .unwrap();
        assert_eq!(echo.value, 7);
    }

    #[tokio::test]
    async fn test_get_json_maps_status() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/echo"))
            .respond_with(ResponseTemplate::new(503).set_body_string("busy"))
            .mount(&mock_server)
            .await;

        let url = endpoint(&mock_server.uri(), "/echo");
        let err = get_json::<Echo>(&client(), ProviderId::BigDataCloud, &url, &[])
            .await
            .unwrap_err();
        assert_eq!(err.provider, ProviderId::BigDataCloud);
        assert!(matches!(err.source, NetworkError::ServerError { status: 503, .. }));
    }

    #[tokio::test]
    async fn test_get_json_maps_malformed_body() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/echo"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&mock_server)
            .await;

        let url = endpoint(&mock_server.uri(), "/echo");
        let err = get_json::<Echo>(&client(), ProviderId::OpenMeteoReverse, &url, &[])
            .await
            .unwrap_err();
        assert!(matches!(err.source, NetworkError::InvalidResponse(_)));
    }
}
