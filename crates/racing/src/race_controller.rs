//! Async driver for a live race.
//!
//! A spawned task owns the [`RaceSession`] and is its only writer. It selects
//! over user commands, the position watch and a refresh tick, and publishes a
//! [`RaceSnapshot`] after every step. The position watch and the tick live on
//! the task's stack, so they are released whichever way the task ends.
//!
//! Completions are written from a separate task and the outcome comes back
//! over a channel, so a slow backend never holds up position handling.

use std::sync::Arc;
use std::time::Duration;

use time::OffsetDateTime;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::backend::BackendClient;
use crate::config::RaceSettings;
use crate::errors::RaceError;
use crate::geolocation::{GeolocationError, LocationSource, LocationSubscription};
use crate::models::{Coordinate, RaceTarget};
use crate::race::{RaceEvent, RaceResult, RaceSession, RaceStatus, format_race_clock};

const COMMAND_BUFFER: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RaceCommand {
    Start,
    TogglePause,
    Stop,
    Shutdown,
}

/// Result of recording a finished race.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistOutcome {
    Saved,
    Failed(String),
}

/// Everything the race screen shows, as of the last controller step.
#[derive(Debug, Clone, PartialEq)]
pub struct RaceSnapshot {
    pub status: RaceStatus,
    pub elapsed: time::Duration,
    /// `elapsed` formatted for the live clock.
    pub clock: String,
    pub position: Option<Coordinate>,
    pub distance_to_start_km: Option<f64>,
    pub distance_to_finish_km: Option<f64>,
    pub current_speed_kmh: f64,
    pub max_speed_kmh: f64,
    pub progress_percent: f64,
    /// No position fix has been received yet.
    pub waiting_for_gps: bool,
    /// Last geolocation failure, cleared by the next good fix.
    pub gps_error: Option<GeolocationError>,
    pub result: Option<RaceResult>,
    pub persist: Option<PersistOutcome>,
}

/// Wall-clock time anchored at spawn and advanced by the monotonic clock.
struct RaceClock {
    wall: OffsetDateTime,
    origin: Instant,
}

impl RaceClock {
    fn start() -> Self {
        Self {
            wall: OffsetDateTime::now_utc(),
            origin: Instant::now(),
        }
    }

    fn now(&self) -> OffsetDateTime {
        self.wall + self.origin.elapsed()
    }
}

pub struct RaceController {
    session: RaceSession,
    user_id: Uuid,
    source: Arc<dyn LocationSource>,
    backend: Arc<dyn BackendClient>,
    tick: Duration,
}

impl RaceController {
    pub fn new(
        target: RaceTarget,
        user_id: Uuid,
        source: Arc<dyn LocationSource>,
        backend: Arc<dyn BackendClient>,
    ) -> Self {
        Self {
            session: RaceSession::new(target),
            user_id,
            source,
            backend,
            tick: RaceSettings::default().tick,
        }
    }

    /// Applies the refresh tick and the start/finish radius.
    pub fn with_settings(mut self, settings: RaceSettings) -> Self {
        self.tick = settings.tick;
        self.session = self.session.with_proximity_km(settings.proximity_km);
        self
    }

    /// Subscribes to the location source and starts the race task.
    pub fn spawn(self) -> RaceHandle {
        let clock = RaceClock::start();
        let subscription = self.source.subscribe();
        let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
        let (snapshot_tx, snapshot_rx) = watch::channel(RaceWorker::initial_snapshot(&self.session));
        let (persisted_tx, persisted_rx) = mpsc::channel(COMMAND_BUFFER);

        let worker = RaceWorker {
            session: self.session,
            user_id: self.user_id,
            backend: self.backend,
            clock,
            gps_error: None,
            persist: None,
            persisted: persisted_tx,
            snapshots: snapshot_tx,
        };

        info!(
            "Race controller started for route {} ({})",
            worker.session.target().id,
            worker.session.target().name
        );
        let task = tokio::spawn(worker.run(subscription, command_rx, persisted_rx, self.tick));

        RaceHandle {
            commands: command_tx,
            snapshots: snapshot_rx,
            task,
        }
    }
}

/// Caller side of a running race. Dropping it ends the race task.
pub struct RaceHandle {
    commands: mpsc::Sender<RaceCommand>,
    snapshots: watch::Receiver<RaceSnapshot>,
    task: JoinHandle<RaceSession>,
}

impl RaceHandle {
    pub async fn send(&self, command: RaceCommand) -> Result<(), RaceError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| RaceError::ControllerClosed)
    }

    pub async fn start(&self) -> Result<(), RaceError> {
        self.send(RaceCommand::Start).await
    }

    pub async fn toggle_pause(&self) -> Result<(), RaceError> {
        self.send(RaceCommand::TogglePause).await
    }

    pub async fn stop(&self) -> Result<(), RaceError> {
        self.send(RaceCommand::Stop).await
    }

    pub fn snapshot(&self) -> RaceSnapshot {
        self.snapshots.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<RaceSnapshot> {
        self.snapshots.clone()
    }

    /// Stops the task and hands back the final session.
    pub async fn shutdown(self) -> Result<RaceSession, RaceError> {
        // The task may already be gone if the position stream ended.
        let _ = self.commands.send(RaceCommand::Shutdown).await;
        self.task.await.map_err(|e| {
            error!("Race task failed: {e}");
            RaceError::ControllerClosed
        })
    }
}

struct RaceWorker {
    session: RaceSession,
    user_id: Uuid,
    backend: Arc<dyn BackendClient>,
    clock: RaceClock,
    gps_error: Option<GeolocationError>,
    persist: Option<PersistOutcome>,
    /// Write outcomes, keyed by the start time of the race they belong to.
    persisted: mpsc::Sender<(OffsetDateTime, PersistOutcome)>,
    snapshots: watch::Sender<RaceSnapshot>,
}

impl RaceWorker {
    fn initial_snapshot(session: &RaceSession) -> RaceSnapshot {
        RaceSnapshot {
            status: session.status(),
            elapsed: time::Duration::ZERO,
            clock: format_race_clock(time::Duration::ZERO),
            position: None,
            distance_to_start_km: None,
            distance_to_finish_km: None,
            current_speed_kmh: 0.0,
            max_speed_kmh: 0.0,
            progress_percent: 0.0,
            waiting_for_gps: true,
            gps_error: None,
            result: None,
            persist: None,
        }
    }

    async fn run(
        mut self,
        mut subscription: LocationSubscription,
        mut commands: mpsc::Receiver<RaceCommand>,
        mut persisted: mpsc::Receiver<(OffsetDateTime, PersistOutcome)>,
        tick: Duration,
    ) -> RaceSession {
        let mut ticker = tokio::time::interval(tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            let ticking = self.session.status() == RaceStatus::Active;

            tokio::select! {
                command = commands.recv() => match command {
                    Some(RaceCommand::Shutdown) | None => break,
                    Some(command) => self.handle_command(command),
                },
                update = subscription.recv() => match update {
                    Some(Ok(fix)) => {
                        self.gps_error = None;
                        let now = self.clock.now();
                        if let Some(event) = self.session.update_position(&fix, now) {
                            self.handle_event(event);
                        }
                    }
                    Some(Err(e)) => {
                        warn!("Geolocation error: {e}");
                        self.gps_error = Some(e);
                    }
                    None => {
                        warn!("Position stream ended");
                        break;
                    }
                },
                Some((started_at, outcome)) = persisted.recv() => {
                    let current = self.session.result().map(|r| r.started_at);
                    if current == Some(started_at) {
                        self.persist = Some(outcome);
                    } else {
                        debug!("Dropping save outcome for an earlier attempt");
                    }
                }
                _ = ticker.tick(), if ticking => {}
            }

            self.publish();
        }

        self.publish();
        info!(
            "Race controller stopped for route {} in state {}",
            self.session.target().id,
            self.session.status()
        );
        self.session
    }

    fn handle_command(&mut self, command: RaceCommand) {
        let now = self.clock.now();
        let outcome = match command {
            RaceCommand::Start => self.session.start(now),
            RaceCommand::TogglePause => self.session.toggle_pause(now),
            RaceCommand::Stop => self.session.stop(),
            RaceCommand::Shutdown => return,
        };

        match outcome {
            Ok(event) => self.handle_event(event),
            Err(e) => warn!("Ignoring {command:?}: {e}"),
        }
    }

    fn handle_event(&mut self, event: RaceEvent) {
        match event {
            RaceEvent::Started { trigger, .. } => {
                self.persist = None;
                info!("Race started ({trigger:?})");
            }
            RaceEvent::Paused { .. } => debug!("Race paused"),
            RaceEvent::Resumed { .. } => debug!("Race resumed"),
            RaceEvent::Cancelled => info!("Race cancelled"),
            RaceEvent::Finished(result) => {
                info!(
                    "Race finished in {}s, max speed {:.1} km/h",
                    result.elapsed_seconds(),
                    result.max_speed_kmh
                );
                self.persist_result(&result);
            }
        }
    }

    /// Records the completion. A failure is reported but the race stays finished.
    fn persist_result(&self, result: &RaceResult) {
        let completion = result.completion(self.user_id);
        let started_at = result.started_at;
        let backend = self.backend.clone();
        let persisted = self.persisted.clone();

        tokio::spawn(async move {
            let outcome = match backend.insert_completion(&completion).await {
                Ok(()) => PersistOutcome::Saved,
                Err(e) => {
                    error!("Failed to save race completion: {e}");
                    PersistOutcome::Failed(e.to_string())
                }
            };
            // The controller may have shut down while the write was in flight.
            let _ = persisted.send((started_at, outcome)).await;
        });
    }

    fn publish(&self) {
        let session = &self.session;
        let elapsed = session.elapsed(self.clock.now());
        let snapshot = RaceSnapshot {
            status: session.status(),
            elapsed,
            clock: format_race_clock(elapsed),
            position: session.position(),
            distance_to_start_km: session.distance_to_start_km(),
            distance_to_finish_km: session.distance_to_finish_km(),
            current_speed_kmh: session.current_speed_kmh(),
            max_speed_kmh: session.max_speed_kmh(),
            progress_percent: session.progress_percent(),
            waiting_for_gps: session.position().is_none(),
            gps_error: self.gps_error.clone(),
            result: session.result().cloned(),
            persist: self.persist.clone(),
        };
        // Nobody listening is fine; the task keeps running until told to stop.
        self.snapshots.send_replace(snapshot);
    }
}
