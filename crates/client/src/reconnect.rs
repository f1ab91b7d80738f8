//! Bounded fixed-delay reconnection policy for the notification channel.
//!
//! After a failed attempt or a dropped connection the channel asks its
//! [`ReconnectBudget`] for another attempt and, if granted, waits the
//! fixed delay via [`wait_before_retry`]. Once the budget is spent the
//! channel stays disconnected for the rest of the session.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// Default number of reconnection attempts.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Default delay between attempts.
pub const DEFAULT_DELAY: Duration = Duration::from_secs(3);

/// Tunable parameters for the retry policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectConfig {
    /// Attempts allowed after the initial one before giving up.
    pub max_attempts: u32,
    /// Delay before every reconnection attempt.
    pub delay: Duration,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            delay: DEFAULT_DELAY,
        }
    }
}

/// Counts reconnection attempts against [`ReconnectConfig::max_attempts`].
///
/// The budget is replenished after every successful connection.
#[derive(Debug)]
pub struct ReconnectBudget {
    max_attempts: u32,
    used: u32,
}

impl ReconnectBudget {
    pub fn new(config: &ReconnectConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            used: 0,
        }
    }

    /// Claim the next attempt, returning its 1-based number, or `None`
    /// when the budget is exhausted.
    pub fn next_attempt(&mut self) -> Option<u32> {
        if self.used >= self.max_attempts {
            return None;
        }
        self.used += 1;
        Some(self.used)
    }

    pub fn reset(&mut self) {
        self.used = 0;
    }
}

/// Sleep for `delay` unless `cancel` fires first.
///
/// Returns `false` when cancelled.
pub async fn wait_before_retry(delay: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(delay) => true,
    }
}
