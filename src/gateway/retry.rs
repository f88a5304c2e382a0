//! 重试策略：有界指数退避

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// 重试配置；max_attempts 含首次尝试
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 500,
            max_delay_ms: 8_000,
        }
    }
}

impl RetryPolicy {
    /// 第 n 次重试前的等待：min(base × 2^(n−1), max)，n 从 1 开始，单调不减
    pub fn delay_before_retry(&self, n: u32) -> Duration {
        let exp = n.saturating_sub(1).min(32);
        let delay = self
            .base_delay_ms
            .saturating_mul(1u64 << exp)
            .min(self.max_delay_ms);
        Duration::from_millis(delay)
    }

    /// 至少允许一次尝试
    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.delay_before_retry(1), Duration::from_millis(500));
        assert_eq!(policy.delay_before_retry(2), Duration::from_millis(1000));
    }

    #[test]
    fn test_delay_is_capped_and_monotonic() {
        let policy = RetryPolicy {
            max_attempts: 10,
            base_delay_ms: 300,
            max_delay_ms: 2_000,
        };
        let delays: Vec<Duration> = (1..=40).map(|n| policy.delay_before_retry(n)).collect();
        assert!(delays.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(*delays.last().unwrap(), Duration::from_millis(2_000));
    }

    #[test]
    fn test_zero_attempts_means_one() {
        let policy = RetryPolicy {
            max_attempts: 0,
            ..Default::default()
        };
        assert_eq!(policy.attempts(), 1);
    }
}
