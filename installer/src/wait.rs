//! Readiness polling
//!
//! Bounded polling with a fixed backoff profile. Each poll reports one of
//! four outcomes, so the loop can tell "not there yet" apart from transient
//! query failures and from errors that make further polling pointless.

use crate::error::Error;
use cluster_client::ClusterClientTrait;
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// Bounded backoff profile for readiness polls
#[derive(Debug, Clone)]
pub struct Backoff {
    /// Maximum number of polls before giving up
    pub steps: u32,
    /// Base delay between polls
    pub interval: Duration,
    /// Multiplier applied to the delay after each poll
    pub factor: f64,
    /// Multiplicative jitter, each delay is scaled by [1, 1+jitter)
    pub jitter: f64,
}

impl Default for Backoff {
    /// Workload readiness profile: 60 polls, 5 seconds apart.
    fn default() -> Self {
        Self {
            steps: 60,
            interval: Duration::from_secs(5),
            factor: 1.0,
            jitter: 0.1,
        }
    }
}

impl Backoff {
    /// Delay before the poll following `attempt` (0-indexed), jittered.
    pub fn delay(&self, attempt: u32) -> Duration {
        let base = self.interval.mul_f64(self.factor.powi(attempt.try_into().unwrap_or(i32::MAX)));
        if self.jitter <= 0.0 {
            return base;
        }
        let spread: f64 = rand::thread_rng().gen_range(0.0..self.jitter);
        base.mul_f64(1.0 + spread)
    }

    /// Total undithered time the profile covers.
    pub fn total_duration(&self) -> Duration {
        (0..self.steps)
            .map(|i| {
                self.interval
                    .mul_f64(self.factor.powi(i.try_into().unwrap_or(i32::MAX)))
            })
            .sum()
    }
}

/// Result of a single readiness poll
#[derive(Debug)]
pub enum PollOutcome {
    /// The condition holds, stop polling
    Ready,
    /// The condition does not hold yet, poll again
    NotReady,
    /// The poll itself failed in a way worth retrying
    Transient(Error),
    /// The poll failed in a way that makes retrying pointless
    Fatal(Error),
}

/// Polls until ready, out of attempts, or fatally failed.
///
/// Transient errors are swallowed and retried; the most recent one is
/// reported if the wait times out without ever seeing the condition hold.
pub async fn wait_for<F, Fut>(backoff: &Backoff, what: &str, mut poll: F) -> Result<(), Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = PollOutcome>,
{
    let mut last_error: Option<Error> = None;
    for attempt in 0..backoff.steps {
        match poll().await {
            PollOutcome::Ready => return Ok(()),
            PollOutcome::NotReady => {}
            PollOutcome::Transient(err) => {
                debug!(what, attempt, error = %err, "readiness poll failed, retrying");
                last_error = Some(err);
            }
            PollOutcome::Fatal(err) => return Err(err),
        }
        if attempt + 1 < backoff.steps {
            tokio::time::sleep(backoff.delay(attempt)).await;
        }
    }
    Err(Error::Timeout {
        what: what.to_string(),
        last_error: last_error
            .map(|err| err.to_string())
            .unwrap_or_else(|| "not ready".to_string()),
    })
}

/// Waits until the deployment's ready replicas match its desired replicas.
pub async fn wait_for_deployment(
    cluster: &dyn ClusterClientTrait,
    namespace: &str,
    name: &str,
) -> Result<(), Error> {
    let what = format!("deployment {namespace}/{name}");
    wait_for(&Backoff::default(), &what, move || async move {
        match cluster.deployment_ready(namespace, name).await {
            Ok(true) => PollOutcome::Ready,
            Ok(false) => PollOutcome::NotReady,
            Err(err) => PollOutcome::Transient(err.into()),
        }
    })
    .await
}

/// Waits until the statefulset's ready replicas match its desired replicas.
pub async fn wait_for_statefulset(
    cluster: &dyn ClusterClientTrait,
    namespace: &str,
    name: &str,
) -> Result<(), Error> {
    let what = format!("statefulset {namespace}/{name}");
    wait_for(&Backoff::default(), &what, move || async move {
        match cluster.statefulset_ready(namespace, name).await {
            Ok(true) => PollOutcome::Ready,
            Ok(false) => PollOutcome::NotReady,
            Err(err) => PollOutcome::Transient(err.into()),
        }
    })
    .await
}
