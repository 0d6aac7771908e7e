//! [`Poller`] – fixed-interval polling of the status source.
//!
//! Each cycle reads one snapshot and, if the read succeeded, feeds it to the
//! shared [`StageController`].  A failed read skips the tick entirely, so the
//! controller state is left untouched for that cycle.
//!
//! Source availability is tracked edge-triggered: the event log gets one
//! `WARNING` when the source goes away and one `INFO` when it comes back,
//! not one entry per failed cycle.
//!
//! The controller sits behind a single [`Mutex`] shared with the operator
//! console; the lock is held only for the duration of one synchronous call
//! and never across an `.await`.
//!
//! A cycle does blocking work (a SQLite read, a journal file append), so
//! [`Poller::run`] executes each cycle on tokio's blocking pool and keeps the
//! async workers free for the interval timer.

use chrono::{DateTime, Utc};
use clearance_kernel::{EventLog, StageController, StatusSource, TickOutcome};
use clearance_types::{ClearanceError, LogEvent, Severity};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, info_span, warn};

/// Default polling cadence.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Controller handle shared by the poll loop and the operator console.
pub type SharedController = Arc<Mutex<StageController>>;

/// Wrap `controller` for sharing.
pub fn share(controller: StageController) -> SharedController {
    Arc::new(Mutex::new(controller))
}

/// Lock the shared controller, recovering the state if a holder panicked.
pub fn lock(controller: &SharedController) -> MutexGuard<'_, StageController> {
    controller.lock().unwrap_or_else(PoisonError::into_inner)
}

// ─────────────────────────────────────────────────────────────────────────────
// Poller
// ─────────────────────────────────────────────────────────────────────────────

/// Drives a [`StageController`] from a [`StatusSource`] at a fixed interval.
pub struct Poller<S> {
    source: S,
    controller: SharedController,
    log: Arc<dyn EventLog>,
    interval: Duration,
    source_available: bool,
}

impl<S: StatusSource> Poller<S> {
    /// Build a poller.
    ///
    /// # Errors
    ///
    /// Returns [`ClearanceError::InvalidConfig`] for a zero `interval`.
    pub fn new(
        source: S,
        controller: SharedController,
        log: Arc<dyn EventLog>,
        interval: Duration,
    ) -> Result<Self, ClearanceError> {
        if interval.is_zero() {
            return Err(ClearanceError::InvalidConfig {
                field: "refresh_interval".to_string(),
                reason: "must be positive".to_string(),
            });
        }
        Ok(Self {
            source,
            controller,
            log,
            interval,
            source_available: true,
        })
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Run one poll cycle stamped with the current wall-clock time.
    pub fn poll_once(&mut self) -> Option<TickOutcome> {
        self.poll_at(Utc::now())
    }

    /// Run one poll cycle stamped with `now`.
    ///
    /// Returns `None` when the source was unavailable and the tick skipped.
    pub fn poll_at(&mut self, now: DateTime<Utc>) -> Option<TickOutcome> {
        let _cycle = info_span!("poll_cycle", at = %now).entered();
        match self.source.read() {
            Ok(snapshot) => {
                if !self.source_available {
                    self.source_available = true;
                    self.log.record(LogEvent::new(
                        Severity::Info,
                        "Status source available again",
                        now,
                    ));
                }
                let outcome = lock(&self.controller).tick(&snapshot, now);
                debug!(?outcome, "tick");
                Some(outcome)
            }
            Err(e) => {
                warn!(error = %e, "status snapshot unavailable; skipping tick");
                if self.source_available {
                    self.source_available = false;
                    self.log
                        .record(LogEvent::new(Severity::Warning, e.to_string(), now));
                }
                None
            }
        }
    }

    /// Poll until `shutdown` is set.
    ///
    /// Stops early if a cycle panics; the controller keeps its last state.
    pub async fn run(self, shutdown: Arc<AtomicBool>)
    where
        S: 'static,
    {
        info!(interval_ms = self.interval.as_millis() as u64, "poll loop started");
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut poller = self;
        loop {
            ticker.tick().await;
            if shutdown.load(Ordering::SeqCst) {
                break;
            }
            let cycle = tokio::task::spawn_blocking(move || {
                let mut poller = poller;
                poller.poll_once();
                poller
            });
            poller = match cycle.await {
                Ok(poller) => poller,
                Err(e) => {
                    error!(error = %e, "poll cycle failed; stopping poll loop");
                    return;
                }
            };
        }
        info!("poll loop stopped");
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
