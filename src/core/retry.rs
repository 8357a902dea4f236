//! Retry logic with exponential backoff
//!
//! This module drives an async action until a success predicate passes or the
//! attempt budget runs out. Every attempt is preceded by a wait taken from a
//! [`Backoff`] schedule, including the first one.

use crate::core::error::{PublishError, Result};
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Base delay of the default backoff schedule
pub const DEFAULT_BACKOFF_BASE: Duration = Duration::from_secs(5);

/// Default attempt budget for the polling phase
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Schedule of waits consulted before each attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backoff {
    /// `base * 2^n` for attempt index `n`, without bound
    Exponential { base: Duration },
    /// Explicit finite list of waits
    Fixed(Vec<Duration>),
}

impl Default for Backoff {
    fn default() -> Self {
        Self::Exponential {
            base: DEFAULT_BACKOFF_BASE,
        }
    }
}

impl Backoff {
    /// Wait before the attempt with the given 0-based index
    ///
    /// Returns `None` once a finite schedule is exhausted. The exponential
    /// schedule saturates at [`Duration::MAX`] and never returns `None`.
    pub fn delay(&self, attempt: u32) -> Option<Duration> {
        match self {
            Self::Exponential { base } => Some(
                2u32.checked_pow(attempt)
                    .and_then(|factor| base.checked_mul(factor))
                    .unwrap_or(Duration::MAX),
            ),
            Self::Fixed(delays) => delays.get(attempt as usize).copied(),
        }
    }

    /// Lazy sequence of waits, starting from the first one on every call
    ///
    /// # Examples
    ///
    /// ```
    /// use repo_publisher::core::Backoff;
    /// use std::time::Duration;
    ///
    /// let backoff = Backoff::default();
    /// let first: Vec<_> = backoff.intervals().take(3).collect();
    /// assert_eq!(
    ///     first,
    ///     vec![Duration::from_secs(5), Duration::from_secs(10), Duration::from_secs(20)]
    /// );
    /// ```
    pub fn intervals(&self) -> impl Iterator<Item = Duration> + '_ {
        (0u32..).map_while(move |attempt| self.delay(attempt))
    }
}

/// Policy for a retried operation
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff: Backoff,
    description: String,
}

impl RetryPolicy {
    /// Create a policy; `max_attempts` must be at least 1
    ///
    /// # Examples
    ///
    /// ```
    /// use repo_publisher::core::{Backoff, RetryPolicy};
    ///
    /// let policy = RetryPolicy::new(5, Backoff::default(), "wait for processing").unwrap();
    /// assert_eq!(policy.max_attempts(), 5);
    /// assert!(RetryPolicy::new(0, Backoff::default(), "never").is_err());
    /// ```
    pub fn new(max_attempts: u32, backoff: Backoff, description: impl Into<String>) -> Result<Self> {
        if max_attempts == 0 {
            return Err(PublishError::InvalidConfiguration {
                field: "max_attempts".to_string(),
                message: "must be at least 1".to_string(),
            });
        }

        Ok(Self {
            max_attempts,
            backoff,
            description: description.into(),
        })
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn backoff(&self) -> &Backoff {
        &self.backoff
    }

    pub fn description(&self) -> &str {
        &self.description
    }
}

/// Value produced by the successful attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryOutcome<T> {
    pub value: T,
    /// Number of times the action was invoked, the successful one included
    pub attempts: u32,
}

/// Run `action` until `is_success` accepts its result
///
/// Each attempt first sleeps for the policy's next backoff interval, then
/// invokes the action once. A result rejected by the predicate and an error
/// returned by the action both count as a failed attempt. Once the number of
/// failed attempts reaches [`RetryPolicy::max_attempts`] the call fails with
/// [`PublishError::RetryExhausted`], carrying the last observed result.
///
/// # Examples
///
/// ```no_run
/// use repo_publisher::core::{retry_until, Backoff, RetryPolicy};
///
/// # #[tokio::main]
/// # async fn main() -> repo_publisher::core::Result<()> {
/// let policy = RetryPolicy::new(5, Backoff::default(), "wait for ready")?;
/// let outcome = retry_until(
///     &policy,
///     || async { Ok("ready".to_string()) },
///     |status: &String| status == "ready",
/// )
/// .await?;
/// assert_eq!(outcome.attempts, 1);
/// # Ok(())
/// # }
/// ```
pub async fn retry_until<F, Fut, T, P>(
    policy: &RetryPolicy,
    mut action: F,
    mut is_success: P,
) -> Result<RetryOutcome<T>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
    P: FnMut(&T) -> bool,
    T: Display,
{
    let mut failures: u32 = 0;
    let mut attempt: u32 = 0;

    loop {
        let delay = policy
            .backoff
            .delay(attempt)
            .ok_or_else(|| PublishError::RetryTimerExhausted {
                description: policy.description.clone(),
                attempts: attempt,
            })?;

        debug!(
            description = %policy.description,
            attempt = attempt + 1,
            delay_ms = delay.as_millis() as u64,
            "waiting before attempt"
        );
        sleep(delay).await;
        attempt += 1;

        let last_result = match action().await {
            Ok(value) if is_success(&value) => {
                return Ok(RetryOutcome {
                    value,
                    attempts: attempt,
                });
            }
            Ok(value) => value.to_string(),
            Err(error) => error.to_string(),
        };

        failures += 1;
        warn!(
            description = %policy.description,
            attempt,
            max_attempts = policy.max_attempts,
            result = %last_result,
            "attempt did not succeed"
        );

        if failures >= policy.max_attempts {
            return Err(PublishError::RetryExhausted {
                description: policy.description.clone(),
                attempts: failures,
                last_result,
            });
        }
    }
}
