//! [`StageController`] – the PPE clearance state machine.
//!
//! The controller walks a person through three equipment stages:
//!
//! ```text
//! Idle ──person──▶ Stage1 ──helmet+goggles──▶ Stage2 ──gloves+boots──▶ Stage3 ──suit+mask──▶ Complete
//!   ▲                                                                                           │
//!   └──────────────── person absent > person_timeout / completion_timeout / reset ──────────────┘
//! ```
//!
//! Call [`StageController::tick`] once per polled [`StatusSnapshot`].  The
//! operator may force progress with [`StageController::manual_advance`] or
//! abandon the run with [`StageController::reset`].  Every observable change
//! is reported to the [`EventLog`] handed over at construction.
//!
//! The controller is not synchronised; callers that share it across threads
//! wrap it in a single `Mutex`.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use chrono::Utc;
//! use clearance_kernel::{RecentLog, StageController, TimeoutPolicy};
//! use clearance_types::{Stage, StatusSnapshot};
//!
//! let log = Arc::new(RecentLog::default());
//! let mut controller = StageController::new(TimeoutPolicy::default(), log.clone());
//!
//! let now = Utc::now();
//! controller.tick(&StatusSnapshot::new(true, now), now);
//! assert_eq!(controller.stage(), Stage::Stage1);
//! assert_eq!(log.len(), 1);
//! ```

use chrono::{DateTime, Utc};
use clearance_types::{EquipmentItem, LogEvent, Severity, Stage, StatusSnapshot};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::event_log::EventLog;
use crate::stage_rules::{StageVerdict, describe_items, evaluate};
use crate::timeouts::{TimeoutPolicy, elapsed_exceeds};

// ────────────────────────────────────────────────────────────────────────────
// State
// ────────────────────────────────────────────────────────────────────────────

/// Mutable checklist state.  Only [`StageController`] changes it.
///
/// `stage_started_at` is set exactly when the stage is not `Idle`;
/// `completed_at` is set exactly when the stage is `Complete`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StageState {
    current_stage: Stage,
    stage_started_at: Option<DateTime<Utc>>,
    last_person_seen_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
}

impl StageState {
    pub fn current_stage(&self) -> Stage {
        self.current_stage
    }

    /// When the current run entered stage 1.
    pub fn stage_started_at(&self) -> Option<DateTime<Utc>> {
        self.stage_started_at
    }

    pub fn last_person_seen_at(&self) -> Option<DateTime<Utc>> {
        self.last_person_seen_at
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    /// Time spent in the current run, or `None` while idle.
    pub fn run_duration(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.stage_started_at
            .map(|start| (now - start).to_std().unwrap_or(Duration::ZERO))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tick outcome
// ────────────────────────────────────────────────────────────────────────────

/// Why the controller reset itself during a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetReason {
    /// Nobody was seen for longer than the person timeout.
    PersonAbsent,
    /// A granted clearance was shown for longer than the completion timeout.
    CompletionTimeout,
}

impl fmt::Display for ResetReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResetReason::PersonAbsent => write!(f, "person absent timeout"),
            ResetReason::CompletionTimeout => write!(f, "completion timeout"),
        }
    }
}

/// What a single [`StageController::tick`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// A timeout fired; the checklist is back at `Idle`.
    Reset(ResetReason),
    /// A person appeared while idle; the run started at stage 1.
    Started,
    /// The current stage was cleared.
    Advanced { from: Stage, to: Stage },
    /// The current stage is blocked by the listed items.
    Blocked { stage: Stage, missing: Vec<EquipmentItem> },
    /// Nothing changed.
    Unchanged,
}

// ────────────────────────────────────────────────────────────────────────────
// StageController
// ────────────────────────────────────────────────────────────────────────────

/// Drives [`StageState`] from polled snapshots.
pub struct StageController {
    state: StageState,
    policy: TimeoutPolicy,
    log: Arc<dyn EventLog>,
}

impl StageController {
    /// Create an idle controller reporting into `log`.
    pub fn new(policy: TimeoutPolicy, log: Arc<dyn EventLog>) -> Self {
        Self {
            state: StageState::default(),
            policy,
            log,
        }
    }

    pub fn state(&self) -> &StageState {
        &self.state
    }

    pub fn stage(&self) -> Stage {
        self.state.current_stage
    }

    pub fn policy(&self) -> TimeoutPolicy {
        self.policy
    }

    /// Consume one snapshot taken at `now`.
    ///
    /// `now` is expected to be non-decreasing across calls; a timestamp older
    /// than the recorded ones never triggers a reset.
    pub fn tick(&mut self, snapshot: &StatusSnapshot, now: DateTime<Utc>) -> TickOutcome {
        if snapshot.person_present {
            self.state.last_person_seen_at = Some(now);
        }

        if let Some(seen) = self.state.last_person_seen_at
            && elapsed_exceeds(seen, now, self.policy.person_timeout())
        {
            self.reset(&ResetReason::PersonAbsent.to_string(), now);
            return TickOutcome::Reset(ResetReason::PersonAbsent);
        }

        if let Some(done) = self.state.completed_at
            && elapsed_exceeds(done, now, self.policy.completion_timeout())
        {
            self.reset(&ResetReason::CompletionTimeout.to_string(), now);
            return TickOutcome::Reset(ResetReason::CompletionTimeout);
        }

        let stage = self.state.current_stage;
        match stage {
            Stage::Idle => {
                if !snapshot.person_present {
                    return TickOutcome::Unchanged;
                }
                self.state.current_stage = Stage::Stage1;
                self.state.stage_started_at = Some(now);
                debug!(stage = %Stage::Stage1, "person detected");
                self.emit(Severity::Info, "Person detected, entered stage 1", now);
                TickOutcome::Started
            }
            Stage::Complete => TickOutcome::Unchanged,
            Stage::Stage1 | Stage::Stage2 | Stage::Stage3 => {
                let Some(definition) = stage.definition() else {
                    return TickOutcome::Unchanged;
                };
                let number = definition.stage.number().unwrap_or_default();
                match evaluate(definition, snapshot) {
                    StageVerdict::Passed => {
                        let Some(to) = self.step_forward(now) else {
                            return TickOutcome::Unchanged;
                        };
                        self.emit(
                            Severity::Success,
                            &format!(
                                "Stage {number} passed - {}",
                                describe_items(&definition.items)
                            ),
                            now,
                        );
                        if to == Stage::Complete {
                            self.emit(
                                Severity::Success,
                                "All PPE checks complete, clearance granted",
                                now,
                            );
                        }
                        TickOutcome::Advanced { from: stage, to }
                    }
                    StageVerdict::Failed { missing } => {
                        self.emit(
                            Severity::Error,
                            &format!(
                                "Stage {number} failed - check {}",
                                describe_items(&missing)
                            ),
                            now,
                        );
                        TickOutcome::Blocked { stage, missing }
                    }
                }
            }
        }
    }

    /// Return to `Idle` and forget every timer.  Logs `reason` at INFO.
    pub fn reset(&mut self, reason: &str, now: DateTime<Utc>) {
        debug!(from = %self.state.current_stage, reason, "resetting checklist");
        self.state = StageState::default();
        self.emit(Severity::Info, &format!("System reset: {reason}"), now);
    }

    /// Pass the current checking stage without looking at the readings.
    ///
    /// Returns `false`, without logging, when idle or already complete.
    pub fn manual_advance(&mut self, now: DateTime<Utc>) -> bool {
        let from = self.state.current_stage;
        let Some(number) = from.number() else {
            return false;
        };
        let Some(to) = self.step_forward(now) else {
            return false;
        };
        if to == Stage::Complete {
            self.emit(
                Severity::Success,
                "Manual completion: all PPE checks passed by operator",
                now,
            );
        } else {
            self.emit(
                Severity::Info,
                &format!("Manual stage advance: stage {number} passed by operator"),
                now,
            );
        }
        true
    }

    /// Move exactly one edge forward, stamping `completed_at` on completion.
    fn step_forward(&mut self, now: DateTime<Utc>) -> Option<Stage> {
        let from = self.state.current_stage;
        let to = from.next()?;
        self.state.current_stage = to;
        if to == Stage::Complete {
            self.state.completed_at = Some(now);
        }
        debug!(from = %from, to = %to, "stage advanced");
        Some(to)
    }

    fn emit(&self, severity: Severity, message: &str, now: DateTime<Utc>) {
        self.log.record(LogEvent::new(severity, message, now));
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_log::RecentLog;
    use chrono::TimeDelta;
    use clearance_types::{EquipmentReading, EquipmentReadings, STAGE_DEFINITIONS};

    fn controller() -> (StageController, Arc<RecentLog>) {
        let log = Arc::new(RecentLog::new(256));
        let policy = TimeoutPolicy::from_secs(30, 30).unwrap();
        (StageController::new(policy, log.clone()), log)
    }

    fn present(now: DateTime<Utc>) -> StatusSnapshot {
        StatusSnapshot::new(true, now)
    }

    fn absent(now: DateTime<Utc>) -> StatusSnapshot {
        StatusSnapshot::new(false, now)
    }

    fn all_pass(now: DateTime<Utc>) -> StatusSnapshot {
        StatusSnapshot {
            person_present: true,
            equipment: EquipmentReadings::uniform(EquipmentReading::Pass),
            observed_at: now,
        }
    }

    fn severities(log: &RecentLog) -> Vec<Severity> {
        log.entries().iter().map(|e| e.severity).collect()
    }

    fn secs(n: i64) -> TimeDelta {
        TimeDelta::seconds(n)
    }

    /// Drive a fresh controller from `Idle` into `stage`.
    fn at_stage(stage: Stage, t0: DateTime<Utc>) -> (StageController, Arc<RecentLog>) {
        let (mut ctrl, log) = controller();
        ctrl.tick(&present(t0), t0);
        while ctrl.stage() < stage {
            assert!(ctrl.manual_advance(t0));
        }
        (ctrl, log)
    }

    // ── initial state ────────────────────────────────────────────────────────

    #[test]
    fn starts_idle_with_no_timers() {
        let (ctrl, log) = controller();
        assert_eq!(ctrl.stage(), Stage::Idle);
        assert_eq!(ctrl.state(), &StageState::default());
        assert!(log.is_empty());
    }

    #[test]
    fn idle_without_person_stays_idle() {
        let (mut ctrl, log) = controller();
        let t0 = Utc::now();
        assert_eq!(ctrl.tick(&absent(t0), t0), TickOutcome::Unchanged);
        assert_eq!(ctrl.stage(), Stage::Idle);
        assert!(log.is_empty());
    }

    #[test]
    fn person_enters_stage_one() {
        let (mut ctrl, log) = controller();
        let t0 = Utc::now();
        assert_eq!(ctrl.tick(&present(t0), t0), TickOutcome::Started);
        assert_eq!(ctrl.stage(), Stage::Stage1);
        assert_eq!(ctrl.state().stage_started_at(), Some(t0));
        assert_eq!(ctrl.state().last_person_seen_at(), Some(t0));

        let entries = log.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].severity, Severity::Info);
        assert!(entries[0].message.contains("entered stage 1"));
    }

    #[test]
    fn entering_stage_one_does_not_evaluate_readings_same_tick() {
        let (mut ctrl, _log) = controller();
        let t0 = Utc::now();
        ctrl.tick(&all_pass(t0), t0);
        assert_eq!(ctrl.stage(), Stage::Stage1);
    }

    // ── stage evaluation ─────────────────────────────────────────────────────

    #[test]
    fn passing_pair_advances_exactly_one_stage_without_error() {
        for def in &STAGE_DEFINITIONS {
            let t0 = Utc::now();
            let (mut ctrl, log) = at_stage(def.stage, t0);
            let before = log.len();

            let snap = all_pass(t0 + secs(1));
            let outcome = ctrl.tick(&snap, t0 + secs(1));

            let expected = def.stage.next().unwrap();
            assert_eq!(
                outcome,
                TickOutcome::Advanced {
                    from: def.stage,
                    to: expected
                }
            );
            assert_eq!(ctrl.stage(), expected);
            let new_entries = &log.entries()[before..];
            assert!(new_entries.iter().all(|e| e.severity == Severity::Success));
        }
    }

    #[test]
    fn failing_item_blocks_with_single_error() {
        for def in &STAGE_DEFINITIONS {
            let t0 = Utc::now();
            let (mut ctrl, log) = at_stage(def.stage, t0);
            let before = log.len();

            let snap = present(t0 + secs(1)).with(def.items[0], EquipmentReading::Pass);
            let outcome = ctrl.tick(&snap, t0 + secs(1));

            assert_eq!(
                outcome,
                TickOutcome::Blocked {
                    stage: def.stage,
                    missing: vec![def.items[1]]
                }
            );
            assert_eq!(ctrl.stage(), def.stage);
            let new_entries = &log.entries()[before..];
            assert_eq!(new_entries.len(), 1);
            assert_eq!(new_entries[0].severity, Severity::Error);
            assert!(new_entries[0].message.contains(def.items[1].label()));
        }
    }

    #[test]
    fn completing_stage_three_logs_two_successes_and_stamps_completion() {
        let t0 = Utc::now();
        let (mut ctrl, log) = at_stage(Stage::Stage3, t0);
        let before = log.len();

        let t1 = t0 + secs(2);
        ctrl.tick(&all_pass(t1), t1);

        assert_eq!(ctrl.stage(), Stage::Complete);
        assert_eq!(ctrl.state().completed_at(), Some(t1));
        let new_entries = &log.entries()[before..];
        assert_eq!(new_entries.len(), 2);
        assert!(new_entries[0].message.contains("Stage 3 passed"));
        assert!(new_entries[1].message.contains("clearance granted"));
    }

    #[test]
    fn complete_ignores_readings() {
        let t0 = Utc::now();
        let (mut ctrl, log) = at_stage(Stage::Complete, t0);
        let before = log.len();
        assert_eq!(ctrl.tick(&present(t0 + secs(1)), t0 + secs(1)), TickOutcome::Unchanged);
        assert_eq!(ctrl.stage(), Stage::Complete);
        assert_eq!(log.len(), before);
    }

    // ── timeouts ─────────────────────────────────────────────────────────────

    #[test]
    fn person_absence_resets_from_every_stage() {
        for stage in [Stage::Stage1, Stage::Stage2, Stage::Stage3, Stage::Complete] {
            let t0 = Utc::now();
            let (mut ctrl, log) = at_stage(stage, t0);
            let t1 = t0 + secs(31);
            assert_eq!(
                ctrl.tick(&absent(t1), t1),
                TickOutcome::Reset(ResetReason::PersonAbsent)
            );
            assert_eq!(ctrl.state(), &StageState::default());
            let last = log.entries().pop().unwrap();
            assert_eq!(last.severity, Severity::Info);
            assert!(last.message.contains("person absent timeout"));
        }
    }

    #[test]
    fn person_absence_at_exact_limit_does_not_reset() {
        let t0 = Utc::now();
        let (mut ctrl, _log) = at_stage(Stage::Stage2, t0);
        let t1 = t0 + secs(30);
        ctrl.tick(&absent(t1), t1);
        assert_eq!(ctrl.stage(), Stage::Stage2);
    }

    #[test]
    fn person_seen_again_keeps_run_alive() {
        let t0 = Utc::now();
        let (mut ctrl, _log) = at_stage(Stage::Stage2, t0);
        ctrl.tick(&present(t0 + secs(25)), t0 + secs(25));
        let t2 = t0 + secs(50);
        ctrl.tick(&absent(t2), t2);
        assert_eq!(ctrl.stage(), Stage::Stage2);
    }

    #[test]
    fn completion_timeout_resets_while_person_stays() {
        let t0 = Utc::now();
        let (mut ctrl, log) = at_stage(Stage::Complete, t0);
        let t1 = t0 + secs(31);
        assert_eq!(
            ctrl.tick(&present(t1), t1),
            TickOutcome::Reset(ResetReason::CompletionTimeout)
        );
        assert_eq!(ctrl.stage(), Stage::Idle);
        assert!(log.entries().pop().unwrap().message.contains("completion timeout"));
    }

    #[test]
    fn reset_tick_does_no_further_processing() {
        let t0 = Utc::now();
        let (mut ctrl, _log) = at_stage(Stage::Complete, t0);
        let t1 = t0 + secs(31);
        ctrl.tick(&present(t1), t1);
        // The same tick must not re-enter stage 1.
        assert_eq!(ctrl.stage(), Stage::Idle);
        assert_eq!(ctrl.state().last_person_seen_at(), None);
    }

    #[test]
    fn backwards_clock_never_resets() {
        let t0 = Utc::now();
        let (mut ctrl, _log) = at_stage(Stage::Complete, t0);
        let earlier = t0 - secs(3600);
        assert_eq!(ctrl.tick(&absent(earlier), earlier), TickOutcome::Unchanged);
        assert_eq!(ctrl.stage(), Stage::Complete);
    }

    // ── reset ────────────────────────────────────────────────────────────────

    #[test]
    fn reset_clears_everything_and_logs_reason() {
        let t0 = Utc::now();
        let (mut ctrl, log) = at_stage(Stage::Complete, t0);
        ctrl.reset("manual reset", t0);
        assert_eq!(ctrl.state(), &StageState::default());
        let last = log.entries().pop().unwrap();
        assert_eq!(last.severity, Severity::Info);
        assert!(last.message.contains("manual reset"));
    }

    #[test]
    fn reset_is_idempotent_apart_from_logging() {
        let (mut ctrl, log) = controller();
        let t0 = Utc::now();
        ctrl.reset("first", t0);
        let state_after_first = ctrl.state().clone();
        ctrl.reset("second", t0);
        assert_eq!(ctrl.state(), &state_after_first);
        assert_eq!(severities(&log), vec![Severity::Info, Severity::Info]);
    }

    #[test]
    fn reset_then_person_restarts_run() {
        let t0 = Utc::now();
        let (mut ctrl, _log) = at_stage(Stage::Stage3, t0);
        ctrl.reset("manual reset", t0);
        let t1 = t0 + secs(1);
        assert_eq!(ctrl.tick(&present(t1), t1), TickOutcome::Started);
        assert_eq!(ctrl.stage(), Stage::Stage1);
        assert_eq!(ctrl.state().stage_started_at(), Some(t1));
    }

    // ── manual advance ───────────────────────────────────────────────────────

    #[test]
    fn manual_advance_from_idle_does_nothing() {
        let (mut ctrl, log) = controller();
        let t0 = Utc::now();
        for _ in 0..3 {
            assert!(!ctrl.manual_advance(t0));
        }
        assert_eq!(ctrl.stage(), Stage::Idle);
        assert!(log.is_empty());
    }

    #[test]
    fn manual_advance_three_times_completes() {
        let (mut ctrl, log) = controller();
        let t0 = Utc::now();
        ctrl.tick(&present(t0), t0);
        let t1 = t0 + secs(5);
        for _ in 0..3 {
            assert!(ctrl.manual_advance(t1));
        }
        assert_eq!(ctrl.stage(), Stage::Complete);
        assert_eq!(ctrl.state().completed_at(), Some(t1));
        assert_eq!(
            severities(&log),
            vec![Severity::Info, Severity::Info, Severity::Info, Severity::Success]
        );
        assert!(log.entries().pop().unwrap().message.contains("Manual completion"));
    }

    #[test]
    fn manual_advance_from_complete_does_nothing() {
        let t0 = Utc::now();
        let (mut ctrl, log) = at_stage(Stage::Complete, t0);
        let before = log.len();
        assert!(!ctrl.manual_advance(t0));
        assert_eq!(log.len(), before);
    }

    #[test]
    fn stage_started_at_tracks_non_idle_stages() {
        let t0 = Utc::now();
        let (mut ctrl, _log) = controller();
        assert!(ctrl.state().stage_started_at().is_none());
        ctrl.tick(&present(t0), t0);
        while ctrl.manual_advance(t0) {
            assert!(ctrl.state().stage_started_at().is_some());
            assert_eq!(
                ctrl.state().completed_at().is_some(),
                ctrl.stage() == Stage::Complete
            );
        }
    }

    #[test]
    fn run_duration_measures_from_stage_one() {
        let t0 = Utc::now();
        let (ctrl, _log) = at_stage(Stage::Stage2, t0);
        assert_eq!(ctrl.state().run_duration(t0 + secs(12)), Some(Duration::from_secs(12)));
    }

    // ── end-to-end scenario ──────────────────────────────────────────────────

    #[test]
    fn walkthrough_with_failure_and_absence_reset() {
        let (mut ctrl, log) = controller();
        let t0 = Utc::now();

        ctrl.tick(&present(t0), t0);
        assert_eq!(ctrl.stage(), Stage::Stage1);

        let t1 = t0 + secs(5);
        let head_ok = present(t1)
            .with(EquipmentItem::Helmet, EquipmentReading::Pass)
            .with(EquipmentItem::Goggles, EquipmentReading::Pass);
        ctrl.tick(&head_ok, t1);
        assert_eq!(ctrl.stage(), Stage::Stage2);

        let errors_before = severities(&log).iter().filter(|s| **s == Severity::Error).count();
        let t2 = t0 + secs(10);
        let gloves_missing = present(t2)
            .with(EquipmentItem::Gloves, EquipmentReading::Fail)
            .with(EquipmentItem::Boots, EquipmentReading::Pass);
        ctrl.tick(&gloves_missing, t2);
        assert_eq!(ctrl.stage(), Stage::Stage2);
        let errors_after = severities(&log).iter().filter(|s| **s == Severity::Error).count();
        assert_eq!(errors_after - errors_before, 1);

        let t3 = t2 + secs(31);
        ctrl.tick(&absent(t3), t3);
        assert_eq!(ctrl.stage(), Stage::Idle);
    }
}
