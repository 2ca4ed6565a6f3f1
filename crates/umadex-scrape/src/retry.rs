//! Bounded retry around navigate + extract.
//!
//! A transient fault (see [`ScrapeError::is_transient`]) throws the whole
//! browser session away: the controller sleeps a linearly growing delay,
//! asks the session to restart from its baseline and tries again. Anything
//! else propagates at once. When the attempts run out the item is reported
//! as [`Outcome::Skipped`] and the caller moves on.

use crate::error::{Result, ScrapeError};
use async_trait::async_trait;
use std::time::Duration;

/// Retry budget and backoff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Extra attempts after the first one.
    pub max_retries: u32,
    pub base_delay: Duration,
    /// Added to the delay for every attempt already made.
    pub step: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(600),
            step: Duration::from_millis(400),
        }
    }
}

impl RetryPolicy {
    /// Delay before recovering from failed attempt number `attempt` (0-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        self.base_delay + self.step * attempt
    }
}

/// A session that can be torn down and rebuilt from scratch.
#[async_trait]
pub trait Session: Send {
    /// Discard the current browser entirely, launch a fresh one and bring
    /// it back to the baseline state.
    async fn restart(&mut self) -> Result<()>;
}

/// One unit of retried work.
#[async_trait]
pub trait Job<S: Send + ?Sized>: Send {
    type Output: Send;

    async fn navigate(&mut self, session: &mut S) -> Result<()>;
    async fn extract(&mut self, session: &mut S) -> Result<Self::Output>;
}

/// Result of a retried job.
#[derive(Debug)]
pub enum Outcome<T> {
    Done(T),
    /// Every attempt failed transiently.
    Skipped { attempts: u32, last_error: ScrapeError },
}

impl<T> Outcome<T> {
    pub fn is_done(&self) -> bool {
        matches!(self, Outcome::Done(_))
    }
}

#[derive(Debug, Clone, Default)]
pub struct RetryController {
    policy: RetryPolicy,
}

impl RetryController {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run `job` with up to `max_retries + 1` attempts. A restart that
    /// fails transiently uses up an attempt.
    pub async fn run<S, J>(&self, session: &mut S, job: &mut J) -> Result<Outcome<J::Output>>
    where
        S: Session,
        J: Job<S>,
    {
        let max = self.policy.max_retries;
        let mut attempt: u32 = 0;

        loop {
            let mut last = match Self::attempt(session, job).await {
                Ok(out) => return Ok(Outcome::Done(out)),
                Err(e) if e.is_transient() => e,
                Err(e) => return Err(e),
            };

            loop {
                tracing::warn!(attempt, kind = last.kind(), "transient fault: {last}");
                if attempt >= max {
                    return Ok(Outcome::Skipped {
                        attempts: attempt + 1,
                        last_error: last,
                    });
                }
                tokio::time::sleep(self.policy.delay(attempt)).await;
                attempt += 1;

                match session.restart().await {
                    Ok(()) => break,
                    Err(e) if e.is_transient() => last = e,
                    Err(e) => return Err(e),
                }
            }
        }
    }

    async fn attempt<S, J>(session: &mut S, job: &mut J) -> Result<J::Output>
    where
        S: Session,
        J: Job<S>,
    {
        job.navigate(session).await?;
        job.extract(session).await
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Counts restarts; can be told to fail the first few.
    #[derive(Default)]
    pub(crate) struct MockSession {
        pub restarts: u32,
        pub failing_restarts: u32,
    }

    #[async_trait]
    impl Session for MockSession {
        async fn restart(&mut self) -> Result<()> {
            self.restarts += 1;
            if self.restarts <= self.failing_restarts {
                return Err(ScrapeError::Driver("chrome not reachable".into()));
            }
            Ok(())
        }
    }

    /// Fails with the given error for the first `fail_times` attempts.
    pub(crate) struct FlakyJob {
        pub calls: u32,
        pub fail_times: u32,
        pub error: fn() -> ScrapeError,
    }

    #[async_trait]
    impl Job<MockSession> for FlakyJob {
        type Output = u32;

        async fn navigate(&mut self, _session: &mut MockSession) -> Result<()> {
            self.calls += 1;
            if self.calls <= self.fail_times {
                return Err((self.error)());
            }
            Ok(())
        }

        async fn extract(&mut self, _session: &mut MockSession) -> Result<u32> {
            Ok(self.calls)
        }
    }

    fn fast() -> RetryController {
        RetryController::new(RetryPolicy {
            max_retries: 3,
            base_delay: Duration::from_millis(1),
            step: Duration::from_millis(1),
        })
    }

    fn stale() -> ScrapeError {
        ScrapeError::StaleElement("element detached".into())
    }

    #[test]
    fn test_default_backoff() {
        let p = RetryPolicy::default();
        assert_eq!(p.delay(0), Duration::from_millis(600));
        assert_eq!(p.delay(2), Duration::from_millis(1400));
    }

    #[tokio::test]
    async fn test_recovers_after_transient_faults() {
        let mut session = MockSession::default();
        let mut job = FlakyJob {
            calls: 0,
            fail_times: 2,
            error: stale,
        };
        let out = fast().run(&mut session, &mut job).await.unwrap();
        assert!(matches!(out, Outcome::Done(3)));
        assert_eq!(session.restarts, 2);
    }

    #[tokio::test]
    async fn test_exhaustion_skips() {
        let mut session = MockSession::default();
        let mut job = FlakyJob {
            calls: 0,
            fail_times: u32::MAX,
            error: || ScrapeError::NavigationTimeout("no body".into()),
        };
        let out = fast().run(&mut session, &mut job).await.unwrap();
        match out {
            Outcome::Skipped { attempts, last_error } => {
                assert_eq!(attempts, 4);
                assert_eq!(last_error.kind(), "navigation-timeout");
            }
            Outcome::Done(_) => panic!("expected skip"),
        }
        assert_eq!(job.calls, 4);
        assert_eq!(session.restarts, 3);
    }

    #[tokio::test]
    async fn test_fatal_fault_propagates() {
        let mut session = MockSession::default();
        let mut job = FlakyJob {
            calls: 0,
            fail_times: 1,
            error: || ScrapeError::Script("bad payload".into()),
        };
        let err = fast().run(&mut session, &mut job).await.unwrap_err();
        assert_eq!(err.kind(), "script");
        assert_eq!(session.restarts, 0);
    }

    #[tokio::test]
    async fn test_failed_restart_consumes_an_attempt() {
        let mut session = MockSession {
            restarts: 0,
            failing_restarts: 2,
        };
        let mut job = FlakyJob {
            calls: 0,
            fail_times: 1,
            error: stale,
        };
        let out = fast().run(&mut session, &mut job).await.unwrap();
        // attempt 0 fails, restarts 1 and 2 fail, restart 3 succeeds.
        assert!(matches!(out, Outcome::Done(2)));
        assert_eq!(session.restarts, 3);
        assert_eq!(job.calls, 2);
    }

    #[tokio::test]
    async fn test_failed_restarts_can_exhaust_budget() {
        let mut session = MockSession {
            restarts: 0,
            failing_restarts: u32::MAX,
        };
        let mut job = FlakyJob {
            calls: 0,
            fail_times: 1,
            error: stale,
        };
        let out = fast().run(&mut session, &mut job).await.unwrap();
        assert!(matches!(out, Outcome::Skipped { attempts: 4, .. }));
        assert_eq!(job.calls, 1);
    }
}
