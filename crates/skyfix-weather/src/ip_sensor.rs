//! Coarse network location from the public IP address.
//! Uses ipinfo.io - free, no API key required.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::http::{endpoint, get_json};
use crate::location::{position_watch, LocationSensor, PositionOptions, PositionWatch, SensorError};
use crate::types::{PositionSample, ProviderId};

/// IP geolocation is city-level at best
pub const IP_ACCURACY_METERS: f64 = 5000.0;

#[derive(Debug, Deserialize)]
struct IpInfoResponse {
    loc: Option<String>,
}

/// Location sensor backed by an IP geolocation service
#[derive(Debug, Clone)]
pub struct IpSensor {
    client: Client,
    base_url: String,
}

impl IpSensor {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    async fn lookup(&self) -> Result<PositionSample, SensorError> {
        let url = endpoint(&self.base_url, "/json");
        let info: IpInfoResponse = get_json(&self.client, ProviderId::IpInfo, &url, &[])
            .await
            .map_err(|e| SensorError::PositionUnavailable(e.to_string()))?;

        let (latitude, longitude) = info
            .loc
            .as_deref()
            .and_then(parse_loc)
            .ok_or_else(|| SensorError::PositionUnavailable("invalid location format".into()))?;

        Ok(PositionSample::new(latitude, longitude, IP_ACCURACY_METERS))
    }
}

/// Parse ipinfo's `"lat,lon"` field
fn parse_loc(loc: &str) -> Option<(f64, f64)> {
    let (lat, lon) = loc.split_once(',')?;
    let lat: f64 = lat.trim().parse().ok()?;
    let lon: f64 = lon.trim().parse().ok()?;
    ((-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lon)).then_some((lat, lon))
}

#[async_trait]
impl LocationSensor for IpSensor {
    fn watch(&self, _options: PositionOptions) -> Result<PositionWatch, SensorError> {
        let (sink, watch) = position_watch(1);
        let sensor = self.clone();
        tokio::spawn(async move {
            let event = tokio::select! {
                () = sink.cancelled() => return,
                event = sensor.lookup() => event,
            };
            sink.send(event).await;
        });
        Ok(watch)
    }

    async fn current_position(&self, _options: PositionOptions) -> Result<PositionSample, SensorError> {
        self.lookup().await
    }
}
