use std::time::Duration;

/// Trait for defining reconnection strategies
///
/// `attempt` is the number of consecutive failed connection attempts so far
/// (0 right after a healthy session dropped). Returning `None` ends the
/// session: the client moves to the fatal state and stops reconnecting.
pub trait ReconnectionStrategy: Send + Sync {
    /// Get the delay before the next connection attempt
    fn next_delay(&self, attempt: usize) -> Option<Duration>;

    /// Check if we should continue reconnecting
    fn should_reconnect(&self, attempt: usize) -> bool;
}

/// Exponential backoff reconnection strategy
///
/// Delays between attempts grow exponentially:
/// initial_delay * 2^attempt, capped at max_delay
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    initial_delay: Duration,
    max_delay: Duration,
    max_attempts: Option<usize>,
}

impl ExponentialBackoff {
    /// Create a new exponential backoff strategy
    ///
    /// # Arguments
    /// * `initial_delay` - The delay before the first reconnect
    /// * `max_delay` - The maximum delay between reconnects
    /// * `max_attempts` - Consecutive failures tolerated (None = unlimited)
    pub fn new(initial_delay: Duration, max_delay: Duration, max_attempts: Option<usize>) -> Self {
        Self {
            initial_delay,
            max_delay,
            max_attempts,
        }
    }
}

impl ReconnectionStrategy for ExponentialBackoff {
    fn next_delay(&self, attempt: usize) -> Option<Duration> {
        if !self.should_reconnect(attempt) {
            return None;
        }

        let factor = 2u64.saturating_pow(attempt as u32);
        let delay = (self.initial_delay.as_millis() as u64).saturating_mul(factor);
        Some(Duration::from_millis(
            delay.min(self.max_delay.as_millis() as u64),
        ))
    }

    fn should_reconnect(&self, attempt: usize) -> bool {
        self.max_attempts.map_or(true, |max| attempt < max)
    }
}

/// Fixed delay reconnection strategy
#[derive(Debug, Clone)]
pub struct FixedDelay {
    delay: Duration,
    max_attempts: Option<usize>,
}

impl FixedDelay {
    pub fn new(delay: Duration, max_attempts: Option<usize>) -> Self {
        Self { delay, max_attempts }
    }
}

impl ReconnectionStrategy for FixedDelay {
    fn next_delay(&self, attempt: usize) -> Option<Duration> {
        if !self.should_reconnect(attempt) {
            return None;
        }
        Some(self.delay)
    }

    fn should_reconnect(&self, attempt: usize) -> bool {
        self.max_attempts.map_or(true, |max| attempt < max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_and_caps() {
        let strategy =
            ExponentialBackoff::new(Duration::from_millis(500), Duration::from_secs(2), None);
        let delays: Vec<u128> = (0..5)
            .map(|i| strategy.next_delay(i).unwrap().as_millis())
            .collect();
        assert_eq!(delays, vec![500, 1000, 2000, 2000, 2000]);
    }

    #[test]
    fn test_backoff_stops_at_cap() {
        let strategy =
            ExponentialBackoff::new(Duration::from_secs(1), Duration::from_secs(30), Some(3));
        assert!(strategy.next_delay(2).is_some());
        assert!(strategy.next_delay(3).is_none());
    }

    #[test]
    fn test_backoff_large_attempt_does_not_overflow() {
        let strategy =
            ExponentialBackoff::new(Duration::from_secs(1), Duration::from_secs(30), None);
        assert_eq!(strategy.next_delay(200), Some(Duration::from_secs(30)));
    }
}
