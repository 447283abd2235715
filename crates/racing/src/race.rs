//! Race timing state machine.
//!
//! `Idle → Active ⇄ Paused → Finished`, with `Active | Paused → Cancelled` on
//! a manual stop. Position updates drive the automatic transitions: coming
//! within [`PROXIMITY_THRESHOLD_KM`] of the start begins the race, coming
//! within it of the finish ends it. All timestamps are supplied by the caller,
//! which keeps the machine deterministic and independent of any timer.

use std::fmt;

use serde::Serialize;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::errors::RaceError;
use crate::geodesy::distance_km;
use crate::geolocation::PositionFix;
use crate::models::{Coordinate, RaceTarget, RouteCompletion};

/// 50 meters.
pub const PROXIMITY_THRESHOLD_KM: f64 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RaceStatus {
    Idle,
    Active,
    Paused,
    Finished,
    Cancelled,
}

impl RaceStatus {
    pub fn is_racing(&self) -> bool {
        matches!(self, Self::Active | Self::Paused)
    }
}

impl fmt::Display for RaceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Active => "active",
            Self::Paused => "paused",
            Self::Finished => "finished",
            Self::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// What triggered a race start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartTrigger {
    Manual,
    Proximity,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RaceEvent {
    Started {
        at: OffsetDateTime,
        trigger: StartTrigger,
    },
    Paused {
        at: OffsetDateTime,
    },
    Resumed {
        at: OffsetDateTime,
    },
    Finished(RaceResult),
    Cancelled,
}

/// Outcome of a finished race.
#[derive(Debug, Clone, PartialEq)]
pub struct RaceResult {
    pub route_id: Uuid,
    pub started_at: OffsetDateTime,
    pub finished_at: OffsetDateTime,
    /// Time spent racing, paused intervals excluded.
    pub elapsed: Duration,
    /// km/h; absent when the route has no known distance.
    pub average_speed_kmh: Option<f64>,
    pub max_speed_kmh: f64,
}

impl RaceResult {
    pub fn elapsed_seconds(&self) -> i64 {
        self.elapsed.as_seconds_f64().round() as i64
    }

    /// The row recorded in the backend for this result.
    pub fn completion(&self, user_id: Uuid) -> RouteCompletion {
        RouteCompletion {
            user_id,
            route_id: self.route_id,
            completion_time: self.elapsed_seconds(),
            average_speed: self.average_speed_kmh,
            max_speed: self.max_speed_kmh,
            completion_date: self.finished_at,
        }
    }
}

/// Live state of a single race attempt against a target route.
#[derive(Debug, Clone)]
pub struct RaceSession {
    target: RaceTarget,
    proximity_km: f64,
    status: RaceStatus,
    started_at: Option<OffsetDateTime>,
    paused_at: Option<OffsetDateTime>,
    paused_total: Duration,
    position: Option<Coordinate>,
    distance_to_start_km: Option<f64>,
    distance_to_finish_km: Option<f64>,
    current_speed_kmh: f64,
    max_speed_kmh: f64,
    progress_percent: f64,
    result: Option<RaceResult>,
}

impl RaceSession {
    pub fn new(target: RaceTarget) -> Self {
        Self {
            target,
            proximity_km: PROXIMITY_THRESHOLD_KM,
            status: RaceStatus::Idle,
            started_at: None,
            paused_at: None,
            paused_total: Duration::ZERO,
            position: None,
            distance_to_start_km: None,
            distance_to_finish_km: None,
            current_speed_kmh: 0.0,
            max_speed_kmh: 0.0,
            progress_percent: 0.0,
            result: None,
        }
    }

    pub fn with_proximity_km(mut self, proximity_km: f64) -> Self {
        self.proximity_km = proximity_km;
        self
    }

    pub fn target(&self) -> &RaceTarget {
        &self.target
    }

    pub fn status(&self) -> RaceStatus {
        self.status
    }

    pub fn started_at(&self) -> Option<OffsetDateTime> {
        self.started_at
    }

    pub fn position(&self) -> Option<Coordinate> {
        self.position
    }

    pub fn distance_to_start_km(&self) -> Option<f64> {
        self.distance_to_start_km
    }

    pub fn distance_to_finish_km(&self) -> Option<f64> {
        self.distance_to_finish_km
    }

    pub fn current_speed_kmh(&self) -> f64 {
        self.current_speed_kmh
    }

    pub fn max_speed_kmh(&self) -> f64 {
        self.max_speed_kmh
    }

    pub fn progress_percent(&self) -> f64 {
        self.progress_percent
    }

    pub fn result(&self) -> Option<&RaceResult> {
        self.result.as_ref()
    }

    /// Racing time at `now`, excluding paused intervals.
    pub fn elapsed(&self, now: OffsetDateTime) -> Duration {
        match (self.status, self.started_at) {
            (RaceStatus::Active, Some(start)) => (now - start - self.paused_total).max(Duration::ZERO),
            (RaceStatus::Paused, Some(start)) => {
                let paused_at = self.paused_at.unwrap_or(now);
                (paused_at - start - self.paused_total).max(Duration::ZERO)
            }
            (RaceStatus::Finished, _) => self
                .result
                .as_ref()
                .map_or(Duration::ZERO, |r| r.elapsed),
            _ => Duration::ZERO,
        }
    }

    /// Begins a race by hand. A finished or cancelled session can be raced again.
    pub fn start(&mut self, now: OffsetDateTime) -> Result<RaceEvent, RaceError> {
        if self.status.is_racing() {
            return Err(RaceError::InvalidTransition {
                action: "start",
                status: self.status,
            });
        }
        Ok(self.begin(now, StartTrigger::Manual))
    }

    /// Pauses an active race or resumes a paused one.
    pub fn toggle_pause(&mut self, now: OffsetDateTime) -> Result<RaceEvent, RaceError> {
        match self.status {
            RaceStatus::Active => {
                self.status = RaceStatus::Paused;
                self.paused_at = Some(now);
                Ok(RaceEvent::Paused { at: now })
            }
            RaceStatus::Paused => {
                if let Some(paused_at) = self.paused_at.take() {
                    self.paused_total += (now - paused_at).max(Duration::ZERO);
                }
                self.status = RaceStatus::Active;
                Ok(RaceEvent::Resumed { at: now })
            }
            status => Err(RaceError::InvalidTransition {
                action: "pause",
                status,
            }),
        }
    }

    /// Abandons the race. Timing state is discarded and nothing is recorded.
    pub fn stop(&mut self) -> Result<RaceEvent, RaceError> {
        if !self.status.is_racing() {
            return Err(RaceError::InvalidTransition {
                action: "stop",
                status: self.status,
            });
        }
        self.status = RaceStatus::Cancelled;
        self.started_at = None;
        self.paused_at = None;
        self.paused_total = Duration::ZERO;
        self.progress_percent = 0.0;
        Ok(RaceEvent::Cancelled)
    }

    /// Applies a position reading and fires at most one proximity transition.
    pub fn update_position(&mut self, fix: &PositionFix, now: OffsetDateTime) -> Option<RaceEvent> {
        let position = fix.coordinate;
        let to_start = distance_km(position, self.target.start());
        let to_finish = distance_km(position, self.target.end());

        self.position = Some(position);
        self.distance_to_start_km = Some(to_start);
        self.distance_to_finish_km = Some(to_finish);

        self.current_speed_kmh = fix.speed_kmh();
        if self.current_speed_kmh > self.max_speed_kmh {
            self.max_speed_kmh = self.current_speed_kmh;
        }

        self.progress_percent = self.progress_for(to_finish);

        match self.status {
            RaceStatus::Idle if to_start < self.proximity_km => {
                Some(self.begin(now, StartTrigger::Proximity))
            }
            RaceStatus::Active if to_finish < self.proximity_km => Some(self.finish(now)),
            _ => None,
        }
    }

    /// Straight-line approximation: how much of the route length is no longer
    /// between the racer and the finish.
    fn progress_for(&self, to_finish_km: f64) -> f64 {
        match self.target.total_distance_km() {
            Some(total) => ((total - to_finish_km) / total * 100.0).clamp(0.0, 100.0),
            None => 0.0,
        }
    }

    fn begin(&mut self, now: OffsetDateTime, trigger: StartTrigger) -> RaceEvent {
        self.status = RaceStatus::Active;
        self.started_at = Some(now);
        self.paused_at = None;
        self.paused_total = Duration::ZERO;
        self.max_speed_kmh = 0.0;
        self.progress_percent = 0.0;
        self.result = None;
        RaceEvent::Started { at: now, trigger }
    }

    fn finish(&mut self, now: OffsetDateTime) -> RaceEvent {
        let started_at = self.started_at.unwrap_or(now);
        let elapsed = self.elapsed(now);
        let elapsed_minutes = elapsed.as_seconds_f64() / 60.0;
        let average_speed_kmh = self
            .target
            .total_distance_km()
            .filter(|_| elapsed_minutes > 0.0)
            .map(|total| total / elapsed_minutes * 60.0);

        let result = RaceResult {
            route_id: self.target.id,
            started_at,
            finished_at: now,
            elapsed,
            average_speed_kmh,
            max_speed_kmh: self.max_speed_kmh,
        };

        self.status = RaceStatus::Finished;
        self.result = Some(result.clone());
        RaceEvent::Finished(result)
    }
}

/// Live clock display, `m:ss.cc`.
pub fn format_race_clock(elapsed: Duration) -> String {
    let millis = elapsed.whole_milliseconds().max(0);
    let minutes = millis / 60_000;
    let seconds = (millis % 60_000) / 1000;
    let centis = (millis % 1000) / 10;
    format!("{minutes}:{seconds:02}.{centis:02}")
}

/// Finish time display, `m:ss`.
pub fn format_finish_time(elapsed: Duration) -> String {
    let millis = elapsed.whole_milliseconds().max(0);
    format!("{}:{:02}", millis / 60_000, (millis % 60_000) / 1000)
}
