//! Retry Policy - 子任务重试决策
//!
//! 纯函数：根据已尝试次数与错误类型决定是否重试以及等待多久。
//! 只有暂时性错误会重试，退避时间按指数增长并设上限。

use std::time::Duration;

use crate::domain::task::SubTaskErrorKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    RetryAfter(Duration),
    GiveUp,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// 首次尝试之后最多重试次数
    pub max_retries: u32,
    /// 第一次重试前的等待时间
    pub base_delay: Duration,
    /// 每次重试的退避倍数
    pub factor: u32,
    /// 退避上限
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_secs(2),
            factor: 2,
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// 包含首次尝试在内的最大尝试次数
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// `attempts_made` 为已完成的尝试次数（含刚刚失败的那一次）
    pub fn decide(&self, attempts_made: u32, kind: SubTaskErrorKind) -> RetryDecision {
        if kind != SubTaskErrorKind::Transient || attempts_made == 0 {
            return RetryDecision::GiveUp;
        }
        if attempts_made > self.max_retries {
            return RetryDecision::GiveUp;
        }
        RetryDecision::RetryAfter(self.backoff_delay(attempts_made))
    }

    /// 第 n 次重试前的等待时间：base × factor^(n-1)，不超过 max_delay
    pub fn backoff_delay(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1);
        let multiplier = self.factor.max(1).checked_pow(exponent).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(multiplier)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_retries_up_to_limit() {
        let policy = RetryPolicy::default();

        assert_eq!(
            policy.decide(1, SubTaskErrorKind::Transient),
            RetryDecision::RetryAfter(Duration::from_secs(2))
        );
        assert_eq!(
            policy.decide(2, SubTaskErrorKind::Transient),
            RetryDecision::RetryAfter(Duration::from_secs(4))
        );
        assert_eq!(
            policy.decide(3, SubTaskErrorKind::Transient),
            RetryDecision::GiveUp
        );
        assert_eq!(policy.max_attempts(), 3);
    }

    #[test]
    fn test_non_transient_never_retried() {
        let policy = RetryPolicy::default();
        for kind in [
            SubTaskErrorKind::Permanent,
            SubTaskErrorKind::Timeout,
            SubTaskErrorKind::Cancelled,
            SubTaskErrorKind::Internal,
        ] {
            assert_eq!(policy.decide(1, kind), RetryDecision::GiveUp);
        }
    }

    #[test]
    fn test_backoff_is_capped() {
        let policy = RetryPolicy {
            max_retries: 10,
            ..Default::default()
        };

        assert_eq!(policy.backoff_delay(4), Duration::from_secs(16));
        assert_eq!(policy.backoff_delay(5), Duration::from_secs(30));
        assert_eq!(policy.backoff_delay(40), Duration::from_secs(30));
    }
}
