use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinHandle;

use crate::error::RideError;
use crate::model::RideId;
use crate::spatial::GeoPoint;
use crate::store::RideStore;
use crate::telemetry::EngineTelemetry;

use super::{ReverseGeocoder, UNKNOWN_CITY};

/// Lookups resolved at once unless configured otherwise.
pub const DEFAULT_MAX_IN_FLIGHT: usize = 4;

/// A city lookup for the location a ride reported.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeocodeJob {
    pub ride_id: RideId,
    pub point: GeoPoint,
}

/// Producer side of the geocoding side-channel. Enqueueing never blocks.
#[derive(Clone)]
pub struct GeocodeQueue {
    sender: Option<mpsc::Sender<GeocodeJob>>,
    telemetry: Arc<EngineTelemetry>,
}

impl GeocodeQueue {
    /// A queue that drops every job; used when geocoding is turned off.
    pub fn disabled(telemetry: Arc<EngineTelemetry>) -> Self {
        Self {
            sender: None,
            telemetry,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.sender.is_some()
    }

    /// Hand a job to the worker. Returns false if it was dropped.
    pub fn enqueue(&self, job: GeocodeJob) -> bool {
        let Some(sender) = &self.sender else {
            return false;
        };
        match sender.try_send(job) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(job)) => {
                self.telemetry.record_geocode_dropped();
                tracing::warn!(ride = %job.ride_id, "geocode queue full, city lookup dropped");
                false
            }
            Err(mpsc::error::TrySendError::Closed(job)) => {
                self.telemetry.record_geocode_dropped();
                tracing::warn!(ride = %job.ride_id, "geocode worker stopped, city lookup dropped");
                false
            }
        }
    }
}

/// Create a bounded job channel. The receiver goes to [`GeocodeWorker::spawn`].
pub fn geocode_channel(
    capacity: usize,
    telemetry: Arc<EngineTelemetry>,
) -> (GeocodeQueue, mpsc::Receiver<GeocodeJob>) {
    let (sender, receiver) = mpsc::channel(capacity.max(1));
    (
        GeocodeQueue {
            sender: Some(sender),
            telemetry,
        },
        receiver,
    )
}

/// Consumer side: resolves jobs and writes cities back to the store.
///
/// Up to `max_in_flight` lookups run at once, so one lookup stuck until its
/// timeout does not hold up the jobs queued behind it.
pub struct GeocodeWorker {
    geocoder: Arc<dyn ReverseGeocoder>,
    store: Arc<dyn RideStore>,
    telemetry: Arc<EngineTelemetry>,
    timeout: Duration,
    max_in_flight: usize,
}

impl GeocodeWorker {
    pub fn new(
        geocoder: Arc<dyn ReverseGeocoder>,
        store: Arc<dyn RideStore>,
        telemetry: Arc<EngineTelemetry>,
        timeout: Duration,
    ) -> Self {
        Self {
            geocoder,
            store,
            telemetry,
            timeout,
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
        }
    }

    pub fn with_max_in_flight(mut self, max_in_flight: usize) -> Self {
        self.max_in_flight = max_in_flight.max(1);
        self
    }

    /// Run the worker on the current tokio runtime until every queue handle is dropped.
    pub fn spawn(self, receiver: mpsc::Receiver<GeocodeJob>) -> JoinHandle<()> {
        tokio::spawn(self.run(receiver))
    }

    async fn run(self, mut receiver: mpsc::Receiver<GeocodeJob>) {
        let slots = u32::try_from(self.max_in_flight).unwrap_or(u32::MAX);
        let permits = Arc::new(Semaphore::new(slots as usize));
        let worker = Arc::new(self);

        while let Some(job) = receiver.recv().await {
            let Ok(permit) = Arc::clone(&permits).acquire_owned().await else {
                break;
            };
            let worker = Arc::clone(&worker);
            tokio::spawn(async move {
                worker.process(job).await;
                drop(permit);
            });
        }

        // Let lookups already running finish before reporting the stop.
        let _ = permits.acquire_many(slots).await;
        tracing::debug!("geocode worker stopped");
    }

    /// Resolve one job and record the city. Never fails; every problem
    /// degrades to [`UNKNOWN_CITY`] or a skipped write.
    pub async fn process(&self, job: GeocodeJob) {
        let city = self
            .resolve(job.point)
            .await
            .unwrap_or_else(|| UNKNOWN_CITY.to_string());

        match self.store.record_city(job.ride_id, job.point, &city) {
            Ok(true) => tracing::debug!(ride = %job.ride_id, %city, "city recorded"),
            Ok(false) => tracing::debug!(ride = %job.ride_id, "ride moved on, stale city discarded"),
            Err(RideError::NotFound(_)) => {
                tracing::debug!(ride = %job.ride_id, "ride vanished before city was recorded")
            }
            Err(err) => tracing::warn!(ride = %job.ride_id, error = %err, "failed to record city"),
        }
    }

    async fn resolve(&self, point: GeoPoint) -> Option<String> {
        let geocoder = Arc::clone(&self.geocoder);
        let lookup = tokio::task::spawn_blocking(move || geocoder.reverse_geocode(point));

        match tokio::time::timeout(self.timeout, lookup).await {
            Ok(Ok(Ok(city))) => {
                self.telemetry.record_geocode_resolved();
                city
            }
            Ok(Ok(Err(err))) => {
                self.telemetry.record_geocode_failed();
                tracing::warn!(error = %err, "reverse geocoding failed");
                None
            }
            Ok(Err(join_err)) => {
                self.telemetry.record_geocode_failed();
                tracing::warn!(error = %join_err, "reverse geocoding task aborted");
                None
            }
            Err(_) => {
                self.telemetry.record_geocode_failed();
                tracing::warn!(timeout_ms = self.timeout.as_millis() as u64, "reverse geocoding timed out");
                None
            }
        }
    }
}
