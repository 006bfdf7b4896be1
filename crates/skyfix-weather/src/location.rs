//! Position acquisition.
//!
//! [`PositionSampler`] subscribes to a [`LocationSensor`] and races two exits:
//! the first fix within the accuracy threshold, and a deadline after which the
//! best fix seen so far is taken. If the deadline passes with no fix at all, a
//! single one-shot request decides the outcome. Every exit cancels the
//! subscription and drops the deadline timer before the result is returned.

use async_trait::async_trait;
use skyfix_core::SamplerConfig;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

use crate::types::{LocationError, PositionSample};

/// Request options passed to the sensor for every reading
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionOptions {
    pub high_accuracy: bool,
    /// Oldest cached reading the sensor may return
    pub maximum_age: Duration,
    /// Longest the sensor may wait for a single reading
    pub timeout: Duration,
}

impl PositionOptions {
    /// High accuracy, never cached
    pub fn fresh(timeout: Duration) -> Self {
        Self {
            high_accuracy: true,
            maximum_age: Duration::ZERO,
            timeout,
        }
    }
}

/// Errors reported by the sensor itself
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SensorError {
    #[error("permission denied")]
    PermissionDenied,
    #[error("position unavailable: {0}")]
    PositionUnavailable(String),
    #[error("sensor timed out")]
    Timeout,
}

impl From<SensorError> for LocationError {
    fn from(e: SensorError) -> Self {
        match e {
            SensorError::PermissionDenied => LocationError::PermissionDenied,
            SensorError::PositionUnavailable(reason) => LocationError::Unavailable(reason),
            SensorError::Timeout => LocationError::Timeout,
        }
    }
}

pub type SensorEvent = Result<PositionSample, SensorError>;

/// Consumer end of a sensor subscription.
///
/// Cancelling or dropping the watch ends the subscription; the sensor sees it
/// through its [`WatchSink`].
#[derive(Debug)]
pub struct PositionWatch {
    events: mpsc::Receiver<SensorEvent>,
    token: CancellationToken,
}

/// Producer end of a sensor subscription, held by the sensor implementation
#[derive(Debug, Clone)]
pub struct WatchSink {
    events: mpsc::Sender<SensorEvent>,
    token: CancellationToken,
}

/// Create a connected sink/watch pair buffering up to `capacity` events
pub fn position_watch(capacity: usize) -> (WatchSink, PositionWatch) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let token = CancellationToken::new();
    (
        WatchSink {
            events: tx,
            token: token.clone(),
        },
        PositionWatch { events: rx, token },
    )
}

impl PositionWatch {
    /// Next update or error; `None` once the sensor stops producing
    pub async fn next(&mut self) -> Option<SensorEvent> {
        self.events.recv().await
    }

    pub fn cancel(&mut self) {
        self.token.cancel();
        self.events.close();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl Drop for PositionWatch {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

impl WatchSink {
    /// Deliver an event. Returns `false` once the subscription is cancelled.
    pub async fn send(&self, event: SensorEvent) -> bool {
        if self.token.is_cancelled() {
            return false;
        }
        tokio::select! {
            () = self.token.cancelled() => false,
            sent = self.events.send(event) => sent.is_ok(),
        }
    }

    /// Non-blocking delivery for sensors that have a reading at hand
    pub fn try_send(&self, event: SensorEvent) -> bool {
        !self.token.is_cancelled() && self.events.try_send(event).is_ok()
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves when the consumer cancels or drops the watch
    pub async fn cancelled(&self) {
        self.token.cancelled().await;
    }
}

/// A source of position fixes
#[async_trait]
pub trait LocationSensor: Send + Sync {
    /// Whether this device has location capability at all
    fn is_supported(&self) -> bool {
        true
    }

    /// Open a continuous subscription
    fn watch(&self, options: PositionOptions) -> Result<PositionWatch, SensorError>;

    /// Request a single reading
    async fn current_position(&self, options: PositionOptions) -> Result<PositionSample, SensorError>;
}

/// Sensor for devices without location capability
#[derive(Debug, Clone, Copy, Default)]
pub struct UnsupportedSensor;

#[async_trait]
impl LocationSensor for UnsupportedSensor {
    fn is_supported(&self) -> bool {
        false
    }

    fn watch(&self, _options: PositionOptions) -> Result<PositionWatch, SensorError> {
        Err(SensorError::PositionUnavailable("no location sensor".into()))
    }

    async fn current_position(&self, _options: PositionOptions) -> Result<PositionSample, SensorError> {
        Err(SensorError::PositionUnavailable("no location sensor".into()))
    }
}

/// Sensor that always reports the same fix (manual coordinates)
#[derive(Debug, Clone, Copy)]
pub struct FixedSensor {
    latitude: f64,
    longitude: f64,
    accuracy_meters: f64,
}

impl FixedSensor {
    pub fn new(latitude: f64, longitude: f64, accuracy_meters: f64) -> Self {
        Self {
            latitude,
            longitude,
            accuracy_meters,
        }
    }

    fn reading(&self) -> PositionSample {
        PositionSample::new(self.latitude, self.longitude, self.accuracy_meters)
    }
}

#[async_trait]
impl LocationSensor for FixedSensor {
    fn watch(&self, _options: PositionOptions) -> Result<PositionWatch, SensorError> {
        let (sink, watch) = position_watch(1);
        sink.try_send(Ok(self.reading()));
        Ok(watch)
    }

    async fn current_position(&self, _options: PositionOptions) -> Result<PositionSample, SensorError> {
        Ok(self.reading())
    }
}

/// How a sampling race ended
#[derive(Debug)]
enum Settlement {
    Accept(PositionSample),
    Reject(SensorError),
    OneShot,
}

/// Adaptive position sampler trading accuracy against latency
#[derive(Clone)]
pub struct PositionSampler {
    sensor: Arc<dyn LocationSensor>,
    deadline: Duration,
    accuracy_threshold: f64,
    options: PositionOptions,
}

impl std::fmt::Debug for PositionSampler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PositionSampler")
            .field("deadline", &self.deadline)
            .field("accuracy_threshold", &self.accuracy_threshold)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl PositionSampler {
    pub fn new(sensor: Arc<dyn LocationSensor>, config: &SamplerConfig) -> Self {
        Self {
            sensor,
            deadline: config.deadline(),
            accuracy_threshold: config.accuracy_threshold_meters,
            options: PositionOptions::fresh(config.update_timeout()),
        }
    }

    /// Whether the sensor has location capability at all
    pub fn is_supported(&self) -> bool {
        self.sensor.is_supported()
    }

    /// Acquire the best available fix.
    ///
    /// # Errors
    /// `Unsupported` without a sensor, `PermissionDenied` when access is
    /// declined, `Unavailable`/`Timeout` when no fix of any quality arrives.
    #[instrument(skip(self), level = "info")]
    pub async fn acquire(&self) -> Result<PositionSample, LocationError> {
        if !self.sensor.is_supported() {
            tracing::info!("No location sensor on this device");
            return Err(LocationError::Unsupported);
        }

        let mut watch = self.sensor.watch(self.options)?;
        let settlement = self.race(&mut watch).await;
        watch.cancel();

        match settlement {
            Settlement::Accept(sample) => {
                tracing::info!(
                    accuracy_m = sample.accuracy_meters,
                    "Accepted position fix"
                );
                Ok(sample)
            }
            Settlement::Reject(error) => {
                tracing::info!(%error, "Sensor failed before any fix");
                Err(error.into())
            }
            Settlement::OneShot => {
                tracing::info!("No fix before deadline, requesting a single reading");
                self.one_shot().await
            }
        }
    }

    /// Consume updates until the threshold, an error, or the deadline settles
    /// the race. The deadline timer lives only for the duration of this call.
    async fn race(&self, watch: &mut PositionWatch) -> Settlement {
        let deadline = tokio::time::sleep(self.deadline);
        tokio::pin!(deadline);

        let mut best: Option<PositionSample> = None;
        let mut stream_open = true;

        loop {
            tokio::select! {
                biased;
                event = watch.next(), if stream_open => match event {
                    Some(Ok(sample)) => {
                        tracing::debug!(accuracy_m = sample.accuracy_meters, "Position update");
                        if best.is_none_or(|held| sample.is_more_accurate_than(&held)) {
                            best = Some(sample);
                        }
                        if sample.accuracy_meters <= self.accuracy_threshold {
                            return Settlement::Accept(sample);
                        }
                    }
                    Some(Err(error)) => {
                        return match best {
                            Some(held) => {
                                tracing::debug!(%error, "Sensor error after a fix, keeping best");
                                Settlement::Accept(held)
                            }
                            None => Settlement::Reject(error),
                        };
                    }
                    None => {
                        tracing::debug!("Sensor stream ended, waiting for deadline");
                        stream_open = false;
                    }
                },
                () = &mut deadline => {
                    return match best {
                        Some(held) => Settlement::Accept(held),
                        None => Settlement::OneShot,
                    };
                }
            }
        }
    }

    async fn one_shot(&self) -> Result<PositionSample, LocationError> {
        match tokio::time::timeout(self.options.timeout, self.sensor.current_position(self.options)).await {
            Ok(result) => result.map_err(LocationError::from),
            Err(_) => Err(LocationError::Timeout),
        }
    }
}
