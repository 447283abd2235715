//! Device position stream abstraction.
//!
//! A [`LocationSource`] hands out [`LocationSubscription`]s. Dropping a
//! subscription unsubscribes it, so a race that ends on any path releases its
//! position watch without explicit cleanup.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use time::OffsetDateTime;
use tokio::sync::broadcast;
use tracing::warn;

use crate::models::Coordinate;

/// Matches the watch timeout used by browsers for high-accuracy fixes.
pub const DEFAULT_FIX_TIMEOUT: Duration = Duration::from_secs(5);

const CHANNEL_CAPACITY: usize = 64;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GeolocationError {
    #[error("Location permission denied")]
    PermissionDenied,
    #[error("Timed out waiting for a position fix")]
    Timeout,
    #[error("Position unavailable: {0}")]
    Unavailable(String),
}

/// One reading from the device.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionFix {
    pub coordinate: Coordinate,
    /// Ground speed in m/s as reported by the device, if any.
    pub speed_mps: Option<f64>,
    /// Horizontal accuracy radius in meters.
    pub accuracy_m: Option<f64>,
    pub timestamp: OffsetDateTime,
}

impl PositionFix {
    pub fn new(coordinate: Coordinate, timestamp: OffsetDateTime) -> Self {
        Self {
            coordinate,
            speed_mps: None,
            accuracy_m: None,
            timestamp,
        }
    }

    pub fn with_speed(mut self, speed_mps: f64) -> Self {
        self.speed_mps = Some(speed_mps);
        self
    }

    /// Reported speed in km/h; missing, negative or non-finite readings count as 0.
    pub fn speed_kmh(&self) -> f64 {
        match self.speed_mps {
            Some(s) if s.is_finite() && s > 0.0 => s * 3.6,
            _ => 0.0,
        }
    }
}

pub type PositionUpdate = Result<PositionFix, GeolocationError>;

#[async_trait]
pub trait LocationSource: Send + Sync {
    /// Starts a continuous watch. The watch ends when the subscription is dropped.
    fn subscribe(&self) -> LocationSubscription;

    /// One-shot query for the current position.
    async fn current_position(&self) -> Result<PositionFix, GeolocationError>;
}

/// Receiving half of a position watch.
pub struct LocationSubscription {
    rx: broadcast::Receiver<PositionUpdate>,
    active: Arc<AtomicUsize>,
}

impl LocationSubscription {
    /// Waits for the next update. `None` once the source is gone.
    pub async fn recv(&mut self) -> Option<PositionUpdate> {
        loop {
            match self.rx.recv().await {
                Ok(update) => return Some(update),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("Position watch lagged, skipped {skipped} updates");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

impl Drop for LocationSubscription {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}

/// A location source fed by pushing updates into it.
///
/// Device bridges and simulators publish through [`ChannelLocationSource::publish`];
/// every live subscription receives every update.
#[derive(Clone)]
pub struct ChannelLocationSource {
    tx: broadcast::Sender<PositionUpdate>,
    last_fix: Arc<Mutex<Option<PositionFix>>>,
    active: Arc<AtomicUsize>,
    fix_timeout: Duration,
}

impl ChannelLocationSource {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            tx,
            last_fix: Arc::new(Mutex::new(None)),
            active: Arc::new(AtomicUsize::new(0)),
            fix_timeout: DEFAULT_FIX_TIMEOUT,
        }
    }

    pub fn with_fix_timeout(mut self, timeout: Duration) -> Self {
        self.fix_timeout = timeout;
        self
    }

    /// Delivers an update to all subscribers. Returns how many received it.
    pub fn publish(&self, update: PositionUpdate) -> usize {
        if let Ok(fix) = &update
            && let Ok(mut last) = self.last_fix.lock()
        {
            *last = Some(fix.clone());
        }
        self.tx.send(update).unwrap_or(0)
    }

    /// Number of watches currently open.
    pub fn active_subscriptions(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    fn last_fix(&self) -> Option<PositionFix> {
        self.last_fix.lock().ok().and_then(|last| last.clone())
    }
}

impl Default for ChannelLocationSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LocationSource for ChannelLocationSource {
    fn subscribe(&self) -> LocationSubscription {
        self.active.fetch_add(1, Ordering::SeqCst);
        LocationSubscription {
            rx: self.tx.subscribe(),
            active: self.active.clone(),
        }
    }

    async fn current_position(&self) -> Result<PositionFix, GeolocationError> {
        if let Some(fix) = self.last_fix() {
            return Ok(fix);
        }

        let mut subscription = self.subscribe();
        match tokio::time::timeout(self.fix_timeout, subscription.recv()).await {
            Ok(Some(update)) => update,
            Ok(None) => Err(GeolocationError::Unavailable("location source closed".to_string())),
            Err(_) => Err(GeolocationError::Timeout),
        }
    }
}
