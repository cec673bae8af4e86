use std::{future::Future, time::Duration};

use chrono::{DateTime, Utc};
use tokio::time::Instant;

use crate::core::error::VerifyError;

pub fn now_utc() -> DateTime<Utc> {
    if let Ok(value) = std::env::var("FV_FIXED_TIME") {
        if let Ok(dt) = DateTime::parse_from_rfc3339(&value) {
            return dt.with_timezone(&Utc);
        }
    }
    Utc::now()
}

/// Wall-clock budget for one `verify` call, shared by every sub-call.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    at: Option<Instant>,
}

impl Deadline {
    pub fn after(budget: Duration) -> Self {
        Self {
            at: Some(Instant::now() + budget),
        }
    }

    pub fn none() -> Self {
        Self { at: None }
    }

    pub fn remaining(&self) -> Option<Duration> {
        self.at
            .map(|at| at.saturating_duration_since(Instant::now()))
    }

    pub fn expired(&self) -> bool {
        matches!(self.remaining(), Some(d) if d.is_zero())
    }

    /// Clamp a sub-call timeout to what is left of the budget.
    pub fn bound(&self, timeout: Duration) -> Duration {
        match self.remaining() {
            Some(left) => timeout.min(left),
            None => timeout,
        }
    }
}

/// Run `fut` under `timeout`, cut short by whatever is left of `deadline`.
pub async fn within<F, T>(deadline: Deadline, timeout: Duration, fut: F) -> Result<T, VerifyError>
where
    F: Future<Output = Result<T, VerifyError>>,
{
    if deadline.expired() {
        return Err(VerifyError::Timeout);
    }
    tokio::time::timeout(deadline.bound(timeout), fut).await?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bound_never_exceeds_remaining_budget() {
        let deadline = Deadline::after(Duration::from_millis(50));
        assert!(deadline.bound(Duration::from_secs(5)) <= Duration::from_millis(50));
        assert_eq!(
            Deadline::none().bound(Duration::from_secs(5)),
            Duration::from_secs(5)
        );
    }

    #[test]
    fn zero_budget_is_expired() {
        let deadline = Deadline::after(Duration::ZERO);
        assert!(deadline.expired());
        assert!(!Deadline::none().expired());
    }

    #[tokio::test]
    async fn within_times_out_on_expired_budget() {
        let res: Result<(), VerifyError> =
            within(Deadline::after(Duration::ZERO), Duration::from_secs(1), async { Ok(()) }).await;
        assert!(matches!(res, Err(VerifyError::Timeout)));

        let slow = within(Deadline::none(), Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<_, VerifyError>(1)
        })
        .await;
        assert!(matches!(slow, Err(VerifyError::Timeout)));
    }
}
