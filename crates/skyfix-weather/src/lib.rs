//! Location, place naming and weather for SkyFix
//!
//! Acquires a position fix through a pluggable sensor, names it through a
//! cascade of reverse geocoding services, and fetches Open-Meteo forecasts.

pub mod geocode;
pub mod http;
pub mod ip_sensor;
pub mod location;
pub mod provider;
pub mod reverse;
pub mod types;

pub use geocode::ForwardGeocodeClient;
pub use http::build_client;
pub use ip_sensor::IpSensor;
pub use location::{
    position_watch, FixedSensor, LocationSensor, PositionOptions, PositionSampler, PositionWatch, SensorError,
    SensorEvent, UnsupportedSensor, WatchSink,
};
pub use provider::WeatherProvider;
pub use reverse::{
    BigDataCloudReverse, NominatimReverse, OpenMeteoReverse, ProviderAttempt, ReverseGeocodeResolver,
    ReverseProvider, ReverseResolution,
};
pub use types::*;
