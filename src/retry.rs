//! Retry protocol shared by every forge request.
//!
//! A [`RetrySchedule`] is an ordered list of backoff delays. [`RetryState`]
//! walks it one fault at a time: transient faults consume the next delay,
//! fatal faults and an exhausted schedule end the request.

use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::time::Duration;

use tokio::time::sleep;
use tracing::warn;

use crate::forge::ForgeError;
use crate::input::InputError;

/// Delays used when none are configured: 30s, 30s, 5m, 5m, 50m, 50m.
pub const DEFAULT_RETRY_SECS: [u64; 6] = [30, 30, 300, 300, 3000, 3000];

/// Ordered backoff delays. An empty schedule fails on the first transient fault.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrySchedule {
    delays: Vec<Duration>,
}

impl Default for RetrySchedule {
    fn default() -> Self {
        Self::from_secs(&DEFAULT_RETRY_SECS)
    }
}

impl RetrySchedule {
    pub fn new(delays: Vec<Duration>) -> Self {
        Self { delays }
    }

    pub fn from_secs(secs: &[u64]) -> Self {
        Self::new(secs.iter().copied().map(Duration::from_secs).collect())
    }

    /// No retries at all.
    pub fn none() -> Self {
        Self::new(Vec::new())
    }

    pub fn delays(&self) -> &[Duration] {
        &self.delays
    }

    pub fn len(&self) -> usize {
        self.delays.len()
    }

    pub fn is_empty(&self) -> bool {
        self.delays.is_empty()
    }
}

impl FromStr for RetrySchedule {
    type Err = InputError;

    /// Parses comma-separated whole seconds, e.g. `30,30,300`. Blank input yields an empty schedule.
    fn from_str(input: &str) -> Result<Self, Self::Err> {
        if input.trim().is_empty() {
            return Ok(Self::none());
        }

        let secs = input
            .split(',')
            .map(|part| {
                part.trim()
                    .parse::<u64>()
                    .map_err(|_| InputError::RetrySchedule(input.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self::from_secs(&secs))
    }
}

impl fmt::Display for RetrySchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let secs: Vec<String> = self
            .delays
            .iter()
            .map(|d| d.as_secs().to_string())
            .collect();
        write!(f, "{}", secs.join(","))
    }
}

/// What to do after a failed attempt.
#[derive(Debug)]
pub enum RetryStep {
    /// Sleep for the given duration and attempt the same request again.
    Wait(Duration),
    /// Give up and surface the fault.
    Fail(ForgeError),
}

/// Position within a [`RetrySchedule`] for one logical request.
#[derive(Debug)]
pub struct RetryState<'a> {
    schedule: &'a RetrySchedule,
    next: usize,
}

impl<'a> RetryState<'a> {
    pub fn new(schedule: &'a RetrySchedule) -> Self {
        Self { schedule, next: 0 }
    }

    /// Number of delays consumed so far.
    pub fn consumed(&self) -> usize {
        self.next
    }

    /// Classify a fault and advance the schedule.
    ///
    /// Fatal faults fail without consuming a delay. For rate limits carrying a
    /// suggested resume time, the wait is the larger of the two.
    pub fn on_fault(&mut self, err: ForgeError) -> RetryStep {
        if !err.is_transient() {
            return RetryStep::Fail(err);
        }

        let Some(&delay) = self.schedule.delays().get(self.next) else {
            return RetryStep::Fail(err);
        };
        self.next += 1;

        let wait = match err.resume_after() {
            Some(resume) => resume.max(delay),
            None => delay,
        };
        RetryStep::Wait(wait)
    }
}

/// Runs `attempt` until it succeeds, a fatal fault occurs, or the schedule runs out.
///
/// `what` names the request in log lines.
pub async fn with_retries<T, F, Fut>(
    schedule: &RetrySchedule,
    what: &str,
    mut attempt: F,
) -> Result<T, ForgeError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ForgeError>>,
{
    let mut state = RetryState::new(schedule);

    loop {
        let err = match attempt().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        let reason = err.to_string();
        match state.on_fault(err) {
            RetryStep::Wait(wait) => {
                log_retry(what, state.consumed(), schedule.len(), &reason, wait);
                sleep(wait).await;
            }
            RetryStep::Fail(err) => return Err(err),
        }
    }
}

fn log_retry(what: &str, attempt: usize, max: usize, reason: &str, wait: Duration) {
    warn!(
        request = what,
        attempt,
        max,
        wait_secs = wait.as_secs_f64(),
        "{reason}; retrying"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn transient() -> ForgeError {
        ForgeError::Server {
            status: 502,
            message: "bad gateway".into(),
        }
    }

    #[test]
    fn parse_schedule() {
        let schedule: RetrySchedule = "30, 30,300".parse().unwrap();
        assert_eq!(schedule, RetrySchedule::from_secs(&[30, 30, 300]));
        assert_eq!(schedule.to_string(), "30,30,300");
    }

    #[test]
    fn parse_blank_schedule_is_empty() {
        let schedule: RetrySchedule = "".parse().unwrap();
        assert!(schedule.is_empty());
    }

    #[test]
    fn parse_rejects_non_integers() {
        assert!("30,abc".parse::<RetrySchedule>().is_err());
        assert!("30,-1".parse::<RetrySchedule>().is_err());
        assert!("1.5".parse::<RetrySchedule>().is_err());
    }

    #[test]
    fn default_schedule() {
        assert_eq!(
            RetrySchedule::default(),
            RetrySchedule::from_secs(&[30, 30, 300, 300, 3000, 3000])
        );
    }

    #[test]
    fn delays_consumed_in_order_then_fail() {
        let schedule = RetrySchedule::from_secs(&[1, 5, 9]);
        let mut state = RetryState::new(&schedule);

        let mut waits = Vec::new();
        loop {
            match state.on_fault(transient()) {
                RetryStep::Wait(wait) => waits.push(wait.as_secs()),
                RetryStep::Fail(err) => {
                    assert!(matches!(err, ForgeError::Server { .. }));
                    break;
                }
            }
        }

        assert_eq!(waits, vec![1, 5, 9]);
        assert_eq!(state.consumed(), 3);
    }

    #[test]
    fn fatal_fault_does_not_consume_schedule() {
        let schedule = RetrySchedule::from_secs(&[1, 2]);
        let mut state = RetryState::new(&schedule);

        let step = state.on_fault(ForgeError::Unauthorized {
            status: 401,
            message: "bad credentials".into(),
        });
        assert!(matches!(step, RetryStep::Fail(ForgeError::Unauthorized { .. })));
        assert_eq!(state.consumed(), 0);
    }

    #[test]
    fn empty_schedule_fails_immediately() {
        let schedule = RetrySchedule::none();
        let mut state = RetryState::new(&schedule);
        assert!(matches!(state.on_fault(ForgeError::Timeout), RetryStep::Fail(_)));
    }

    #[test]
    fn rate_limit_waits_for_larger_of_hint_and_schedule() {
        let schedule = RetrySchedule::from_secs(&[10, 10]);
        let mut state = RetryState::new(&schedule);

        let longer = ForgeError::RateLimited {
            resume_after: Some(Duration::from_secs(60)),
        };
        assert!(matches!(state.on_fault(longer), RetryStep::Wait(w) if w == Duration::from_secs(60)));

        let shorter = ForgeError::RateLimited {
            resume_after: Some(Duration::from_secs(3)),
        };
        assert!(matches!(state.on_fault(shorter), RetryStep::Wait(w) if w == Duration::from_secs(10)));
    }

    #[tokio::test(start_paused = true)]
    async fn persistent_fault_sleeps_full_schedule_then_fails() {
        let schedule = RetrySchedule::from_secs(&[2, 4, 8]);
        let attempts = AtomicUsize::new(0);
        let started = tokio::time::Instant::now();

        let result: Result<(), _> = with_retries(&schedule, "test", || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err(transient()) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 4);
        assert_eq!(started.elapsed(), Duration::from_secs(14));
    }

    #[tokio::test(start_paused = true)]
    async fn fault_that_clears_sleeps_only_until_success() {
        let schedule = RetrySchedule::from_secs(&[2, 4, 8]);
        let attempts = AtomicUsize::new(0);
        let started = tokio::time::Instant::now();

        let result = with_retries(&schedule, "test", || {
            let n = attempts.fetch_add(1, Ordering::SeqCst);
            async move { if n < 2 { Err(transient()) } else { Ok(n) } }
        })
        .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
        assert_eq!(started.elapsed(), Duration::from_secs(6));
    }

    #[tokio::test(start_paused = true)]
    async fn fatal_fault_returns_without_sleeping() {
        let schedule = RetrySchedule::from_secs(&[5]);
        let started = tokio::time::Instant::now();

        let result: Result<(), _> = with_retries(&schedule, "test", || async {
            Err(ForgeError::NotFound("issue 7".into()))
        })
        .await;

        assert!(matches!(result, Err(ForgeError::NotFound(_))));
        assert_eq!(started.elapsed(), Duration::ZERO);
    }
}
