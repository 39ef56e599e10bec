//! The retry delay law shared by the Retry Executor (C2).
//!
//! Kept as its own module, in the teacher's style, even though the formula
//! collapsed to a single law: `min(max_delay, initial_delay * multiplier^(k-1))`.

use crate::model::RetryConfig;
use std::time::Duration;

/// Delay before the `attempt`-th retry (1-indexed: `attempt=1` is the delay
/// before the second call to `op`).
pub fn delay_for_attempt(config: &RetryConfig, attempt: usize) -> Duration {
    let exponent = attempt.saturating_sub(1) as i32;
    let factor = config.multiplier().powi(exponent);

    let millis = config.initial_delay.as_secs_f64() * 1000.0 * factor;
    let delay = if millis.is_finite() && millis >= 0.0 {
        Duration::from_millis(millis.min(u64::MAX as f64) as u64)
    } else {
        config.max_delay
    };

    delay.min(config.max_delay)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn delay_follows_exponential_law() {
        let config = RetryConfig::new(5, Duration::from_millis(100), Duration::from_secs(10), 2.0);
        assert_eq!(delay_for_attempt(&config, 1), Duration::from_millis(100));
        assert_eq!(delay_for_attempt(&config, 2), Duration::from_millis(200));
        assert_eq!(delay_for_attempt(&config, 3), Duration::from_millis(400));
        assert_eq!(delay_for_attempt(&config, 4), Duration::from_millis(800));
    }

    #[test]
    fn delay_respects_arbitrary_multiplier() {
        let config = RetryConfig::new(5, Duration::from_millis(100), Duration::from_secs(10), 1.5);
        assert_eq!(delay_for_attempt(&config, 1), Duration::from_millis(100));
        assert_eq!(delay_for_attempt(&config, 2), Duration::from_millis(150));
        assert_eq!(delay_for_attempt(&config, 3), Duration::from_millis(225));
    }

    #[test]
    fn delay_is_capped_at_max_delay() {
        let config = RetryConfig::new(10, Duration::from_millis(100), Duration::from_secs(1), 2.0);
        assert_eq!(delay_for_attempt(&config, 10), Duration::from_secs(1));
    }
}
