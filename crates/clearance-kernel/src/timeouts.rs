//! [`TimeoutPolicy`] – the two domain timers that reset the checklist.
//!
//! * `person_timeout` – how long nobody may be seen before the checklist is
//!   abandoned.
//! * `completion_timeout` – how long a granted clearance stays on display
//!   before the gate re-arms for the next person.
//!
//! Both are compared against wall-clock deltas, strictly: an elapsed time
//! equal to the limit has not timed out yet.  A negative delta (the clock
//! went backwards) never counts as a timeout.

use chrono::{DateTime, Utc};
use clearance_types::ClearanceError;
use std::time::Duration;
use tracing::debug;

/// Default person-absence limit.
pub const DEFAULT_PERSON_TIMEOUT: Duration = Duration::from_secs(30);
/// Default completion display limit.
pub const DEFAULT_COMPLETION_TIMEOUT: Duration = Duration::from_secs(30);

/// Validated timeout configuration.  Construct with [`TimeoutPolicy::new`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutPolicy {
    person_timeout: Duration,
    completion_timeout: Duration,
}

impl TimeoutPolicy {
    /// Validate and build a policy.
    ///
    /// # Errors
    ///
    /// Returns [`ClearanceError::InvalidConfig`] when either timeout is zero.
    pub fn new(person_timeout: Duration, completion_timeout: Duration) -> Result<Self, ClearanceError> {
        if person_timeout.is_zero() {
            return Err(ClearanceError::InvalidConfig {
                field: "person_timeout".to_string(),
                reason: "must be positive".to_string(),
            });
        }
        if completion_timeout.is_zero() {
            return Err(ClearanceError::InvalidConfig {
                field: "completion_timeout".to_string(),
                reason: "must be positive".to_string(),
            });
        }
        Ok(Self {
            person_timeout,
            completion_timeout,
        })
    }

    /// Build a policy from whole seconds, as stored in configuration files.
    pub fn from_secs(person_timeout_secs: u64, completion_timeout_secs: u64) -> Result<Self, ClearanceError> {
        Self::new(
            Duration::from_secs(person_timeout_secs),
            Duration::from_secs(completion_timeout_secs),
        )
    }

    pub fn person_timeout(&self) -> Duration {
        self.person_timeout
    }

    pub fn completion_timeout(&self) -> Duration {
        self.completion_timeout
    }
}

impl Default for TimeoutPolicy {
    fn default() -> Self {
        Self {
            person_timeout: DEFAULT_PERSON_TIMEOUT,
            completion_timeout: DEFAULT_COMPLETION_TIMEOUT,
        }
    }
}

/// `true` when strictly more than `limit` has passed between `since` and `now`.
pub fn elapsed_exceeds(since: DateTime<Utc>, now: DateTime<Utc>, limit: Duration) -> bool {
    match (now - since).to_std() {
        Ok(elapsed) => elapsed > limit,
        Err(_) => {
            debug!(%since, %now, "clock moved backwards; ignoring timeout check");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    #[test]
    fn zero_person_timeout_is_rejected() {
        let err = TimeoutPolicy::from_secs(0, 30).unwrap_err();
        assert!(matches!(err, ClearanceError::InvalidConfig { ref field, .. } if field == "person_timeout"));
    }

    #[test]
    fn zero_completion_timeout_is_rejected() {
        let err = TimeoutPolicy::from_secs(30, 0).unwrap_err();
        assert!(matches!(err, ClearanceError::InvalidConfig { ref field, .. } if field == "completion_timeout"));
    }

    #[test]
    fn default_policy_uses_thirty_seconds() {
        let policy = TimeoutPolicy::default();
        assert_eq!(policy.person_timeout(), Duration::from_secs(30));
        assert_eq!(policy.completion_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn elapsed_is_strictly_greater() {
        let start = Utc::now();
        let limit = Duration::from_secs(30);
        assert!(!elapsed_exceeds(start, start + TimeDelta::seconds(30), limit));
        assert!(elapsed_exceeds(start, start + TimeDelta::milliseconds(30_001), limit));
    }

    #[test]
    fn negative_elapsed_never_exceeds() {
        let start = Utc::now();
        assert!(!elapsed_exceeds(start, start - TimeDelta::hours(1), Duration::from_secs(1)));
    }
}
