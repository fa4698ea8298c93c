//! Submission throttle
//!
//! A system may record at most one submission per interval. The clock is
//! always passed in so the decision is reproducible.

use chrono::{DateTime, Duration, Utc};
use sea_orm::{ConnectionTrait, DbErr};
use thiserror::Error;

use crate::repositories::submission::latest_for_system;

/// Rejection of a report that arrived before the interval elapsed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Submission too early: last submission at {last_submitted_at}, next accepted at {retry_at}")]
pub struct EarlySubmissionError {
    pub last_submitted_at: DateTime<Utc>,
    pub retry_at: DateTime<Utc>,
}

impl EarlySubmissionError {
    /// Whole seconds until `retry_at`, rounded up, at least 1.
    pub fn retry_after_seconds(&self, now: DateTime<Utc>) -> u64 {
        let remaining = self.retry_at - now;
        let seconds = remaining.num_seconds()
            + i64::from(remaining.subsec_nanos() > 0);
        u64::try_from(seconds.max(1)).unwrap_or(1)
    }
}

#[derive(Debug, Error)]
pub enum ThrottleError {
    #[error(transparent)]
    Early(#[from] EarlySubmissionError),
    #[error("failed to look up last submission: {0}")]
    Storage(#[from] DbErr),
}

/// Per-system minimum interval between accepted submissions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmissionThrottle {
    min_interval: Duration,
}

impl SubmissionThrottle {
    pub fn new(min_interval: Duration) -> Self {
        Self { min_interval }
    }

    /// Throttle that accepts every submission
    pub fn disabled() -> Self {
        Self::new(Duration::zero())
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Decide whether a system whose last accepted submission was at
    /// `last_submitted_at` may submit at `now`.
    pub fn check(
        &self,
        last_submitted_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<(), EarlySubmissionError> {
        let Some(last) = last_submitted_at else {
            return Ok(());
        };
        if self.min_interval <= Duration::zero() {
            return Ok(());
        }

        if now - last < self.min_interval {
            return Err(EarlySubmissionError {
                last_submitted_at: last,
                retry_at: last + self.min_interval,
            });
        }
        Ok(())
    }

    /// Look up the system's latest submission through `conn` and apply
    /// [`SubmissionThrottle::check`].
    pub async fn check_system<C: ConnectionTrait>(
        &self,
        conn: &C,
        system_id: i32,
        now: DateTime<Utc>,
    ) -> Result<(), ThrottleError> {
        let last = latest_for_system(conn, system_id)
            .await?
            .map(|submission| submission.submitted_at.with_timezone(&Utc));
        self.check(last, now)?;
        Ok(())
    }
}

impl Default for SubmissionThrottle {
    fn default() -> Self {
        Self::new(Duration::days(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn first_submission_is_always_accepted() {
        let throttle = SubmissionThrottle::default();
        assert!(throttle.check(None, t0()).is_ok());
    }

    #[test]
    fn rejects_within_interval_and_accepts_after() {
        let throttle = SubmissionThrottle::new(Duration::days(1));

        let err = throttle
            .check(Some(t0()), t0() + Duration::seconds(1))
            .unwrap_err();
        assert_eq!(err.last_submitted_at, t0());
        assert_eq!(err.retry_at, t0() + Duration::days(1));

        assert!(throttle.check(Some(t0()), t0() + Duration::days(2)).is_ok());
    }

    #[test]
    fn exact_interval_boundary_is_accepted() {
        let throttle = SubmissionThrottle::new(Duration::days(1));
        assert!(throttle.check(Some(t0()), t0() + Duration::days(1)).is_ok());
    }

    #[test]
    fn zero_interval_disables_throttle() {
        let throttle = SubmissionThrottle::disabled();
        assert!(throttle.check(Some(t0()), t0()).is_ok());
    }

    #[test]
    fn retry_after_rounds_up() {
        let err = EarlySubmissionError {
            last_submitted_at: t0(),
            retry_at: t0() + Duration::days(1),
        };
        let now = t0() + Duration::seconds(1);
        assert_eq!(err.retry_after_seconds(now), 86_399);
        assert_eq!(
            err.retry_after_seconds(now + Duration::milliseconds(500)),
            86_399
        );
        assert_eq!(err.retry_after_seconds(t0() + Duration::days(3)), 1);
    }
}
