//! Delay calculation.

use std::time::Duration;

use crate::config::{RETRY_BASE_DELAY_MS, RETRY_JITTER_MS, RETRY_MAX_ATTEMPTS, RETRY_MAX_DELAY_MS};
use crate::utils::duration_to_ms;

/// How the deterministic part of the delay grows with the attempt number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackoffStrategy {
    /// `base * 2^(attempt-1)`
    Exponential,
    /// `base * attempt`
    Linear,
    /// `base`
    Fixed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackoffConfig {
    /// Retries allowed after the first attempt.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Jitter is drawn uniformly from `[0, jitter_range)`.
    pub jitter_range: Duration,
    pub strategy: BackoffStrategy,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            max_attempts: RETRY_MAX_ATTEMPTS,
            base_delay: Duration::from_millis(RETRY_BASE_DELAY_MS),
            max_delay: Duration::from_millis(RETRY_MAX_DELAY_MS),
            jitter_range: Duration::from_millis(RETRY_JITTER_MS),
            strategy: BackoffStrategy::Exponential,
        }
    }
}

/// The pieces of one computed delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelayCalculation {
    /// Strategy result after the `max_delay` cap.
    pub base_delay: Duration,
    pub jitter: Duration,
    /// `base_delay + jitter`. May exceed `max_delay` by up to `jitter_range`.
    pub total_delay: Duration,
}

impl BackoffConfig {
    /// Computes the delay before retry number `attempt` (1-based; 0 is
    /// treated as 1).
    ///
    /// Jitter is added after the cap, so the effective maximum is
    /// `max_delay + jitter_range`.
    pub fn calculate_delay(&self, attempt: u32) -> DelayCalculation {
        let attempt = attempt.max(1);
        let base_ms = duration_to_ms(self.base_delay);
        let computed_ms = match self.strategy {
            BackoffStrategy::Exponential => {
                let factor = 2u64.checked_pow(attempt - 1).unwrap_or(u64::MAX);
                base_ms.saturating_mul(factor)
            }
            BackoffStrategy::Linear => base_ms.saturating_mul(u64::from(attempt)),
            BackoffStrategy::Fixed => base_ms,
        };
        let base_delay = Duration::from_millis(computed_ms.min(duration_to_ms(self.max_delay)));

        let jitter = if self.jitter_range.is_zero() {
            Duration::ZERO
        } else {
            self.jitter_range.mul_f64(rand::random::<f64>())
        };

        DelayCalculation {
            base_delay,
            jitter,
            total_delay: base_delay + jitter,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(strategy: BackoffStrategy) -> BackoffConfig {
        BackoffConfig {
            max_attempts: 10,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(32_000),
            jitter_range: Duration::from_millis(1000),
            strategy,
        }
    }

    #[test]
    fn test_exponential_doubles_then_caps() {
        let cfg = config(BackoffStrategy::Exponential);
        let bases: Vec<u128> = (1..=10)
            .map(|n| cfg.calculate_delay(n).base_delay.as_millis())
            .collect();
        assert_eq!(
            bases,
            vec![1000, 2000, 4000, 8000, 16000, 32000, 32000, 32000, 32000, 32000]
        );
    }

    #[test]
    fn test_total_delay_never_below_base() {
        let cfg = config(BackoffStrategy::Exponential);
        for n in 1..=10 {
            let d = cfg.calculate_delay(n);
            assert!(d.total_delay >= d.base_delay);
            assert!(d.jitter < Duration::from_millis(1000));
        }
    }

    #[test]
    fn test_jitter_is_added_after_the_cap() {
        let cfg = config(BackoffStrategy::Exponential);
        let d = cfg.calculate_delay(10);
        assert_eq!(d.base_delay, cfg.max_delay);
        assert!(d.total_delay >= cfg.max_delay);
        assert!(d.total_delay < cfg.max_delay + cfg.jitter_range);
    }

    #[test]
    fn test_linear_and_fixed() {
        let linear = config(BackoffStrategy::Linear);
        assert_eq!(linear.calculate_delay(3).base_delay, Duration::from_millis(3000));
        let fixed = config(BackoffStrategy::Fixed);
        assert_eq!(fixed.calculate_delay(7).base_delay, Duration::from_millis(1000));
    }

    #[test]
    fn test_huge_attempt_numbers_saturate() {
        let cfg = config(BackoffStrategy::Exponential);
        assert_eq!(cfg.calculate_delay(500).base_delay, cfg.max_delay);
        assert_eq!(cfg.calculate_delay(0).base_delay, Duration::from_millis(1000));
    }

    #[test]
    fn test_zero_jitter_is_deterministic() {
        let cfg = BackoffConfig {
            jitter_range: Duration::ZERO,
            ..config(BackoffStrategy::Exponential)
        };
        let d = cfg.calculate_delay(2);
        assert_eq!(d.jitter, Duration::ZERO);
        assert_eq!(d.total_delay, Duration::from_millis(2000));
    }
}
