//! Eventual consistency helpers for timing-dependent tests.
//!
//! Monitoring pipelines observe the cluster asynchronously: a deployed
//! container takes a scrape cycle or two to show up as a series, and a
//! crash-loop alert only fires once its rule has seen enough restarts.
//! This module provides fixed-interval polling against a hard ceiling,
//! absorbing transient query errors along the way.

use std::future::Future;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::time::sleep;

/// Fixed poll cadence with a hard ceiling.
#[derive(Debug, Clone, Copy)]
pub struct PollBudget {
    /// Delay between probe attempts.
    pub interval: Duration,
    /// Maximum total time to keep probing.
    pub timeout: Duration,
}

impl PollBudget {
    pub const fn new(interval: Duration, timeout: Duration) -> Self {
        Self { interval, timeout }
    }
}

impl Default for PollBudget {
    /// Scenario default: probe every 5 seconds for up to 20 minutes.
    fn default() -> Self {
        Self::new(Duration::from_secs(5), Duration::from_secs(20 * 60))
    }
}

/// What the poll loop saw on its final attempt, kept so a timeout can
/// report more than "it never happened".
#[derive(Debug, Clone)]
pub enum Observation {
    /// The probe decoded a value that failed the predicate.
    Value(String),
    /// The probe itself failed.
    Error(String),
}

impl std::fmt::Display for Observation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Observation::Value(value) => write!(f, "last value: {value}"),
            Observation::Error(message) => write!(f, "last error: {message}"),
        }
    }
}

#[derive(Debug, Error)]
pub enum PollError {
    #[error("Condition not met within {waited:?} after {attempts} attempts ({last})")]
    TimedOut {
        waited: Duration,
        attempts: u32,
        last: Observation,
    },
}

/// Repeatedly run `probe` until `predicate` accepts its output, returning
/// the accepted value.
///
/// Probe errors are treated as transient (the service may still be coming
/// up, the proxy may drop a request) and only surface in the final
/// [`PollError::TimedOut`] as the last observation. Sleeps `budget.interval`
/// between attempts, capped at the remaining time so the last probe lands
/// on the deadline rather than past it.
///
/// # Example
///
/// ```no_run
/// use monitoring_tests::eventual::{poll_until, PollBudget};
///
/// # async fn demo() {
/// let rows = poll_until(
///     PollBudget::default(),
///     || async { Ok::<Vec<u32>, std::convert::Infallible>(vec![1]) },
///     |rows| !rows.is_empty(),
/// )
/// .await
/// .expect("Rows should appear within the budget");
/// # let _ = rows;
/// # }
/// ```
pub async fn poll_until<T, E, F, Fut, P>(
    budget: PollBudget,
    mut probe: F,
    predicate: P,
) -> Result<T, PollError>
where
    T: std::fmt::Debug,
    E: std::fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&T) -> bool,
{
    let start = Instant::now();
    let mut attempts = 0u32;

    loop {
        attempts += 1;
        let last = match probe().await {
            Ok(value) if predicate(&value) => return Ok(value),
            Ok(value) => Observation::Value(format!("{value:?}")),
            Err(err) => Observation::Error(err.to_string()),
        };

        let elapsed = start.elapsed();
        if elapsed >= budget.timeout {
            return Err(PollError::TimedOut {
                waited: elapsed,
                attempts,
                last,
            });
        }

        // Cap the sleep at the remaining time
        let remaining = budget.timeout.saturating_sub(elapsed);
        sleep(budget.interval.min(remaining)).await;
    }
}

/// Boolean convenience over [`poll_until`] for readiness-style checks.
pub async fn wait_until<F, Fut>(budget: PollBudget, mut condition: F) -> Result<(), PollError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    poll_until(
        budget,
        move || {
            let checked = condition();
            async move { Ok::<bool, std::convert::Infallible>(checked.await) }
        },
        |ready| *ready,
    )
    .await
    .map(|_| ())
}
