// ==========================================
// 游戏目录站 - 批次重试策略
// ==========================================
// 规则: 指数退避（底数 2）
// 第 n 次尝试失败后等待 min(base · 2^(n-1), max)
// max_attempts 为含首次在内的最大尝试次数
// ==========================================

use crate::config::ImportConfig;
use crate::repository::StoreError;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &ImportConfig) -> Self {
        Self {
            max_attempts: config.max_retries.max(1),
            base_delay: Duration::from_millis(config.base_backoff_ms),
            max_delay: Duration::from_millis(config.max_backoff_ms),
        }
    }

    /// 第 failed_attempt 次尝试失败后的等待时长（failed_attempt 从 1 开始）
    pub fn delay_after(&self, failed_attempt: u32) -> Duration {
        let exponent = failed_attempt.saturating_sub(1).min(31);
        self.base_delay
            .checked_mul(1u32 << exponent)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// 是否还能再尝试一次
    pub fn should_retry(&self, attempts_made: u32, error: &StoreError) -> bool {
        error.is_transient() && attempts_made < self.max_attempts
    }
}
