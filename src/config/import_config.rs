// ==========================================
// 游戏目录站 - 导入配置
// ==========================================
// 职责: 调用方传入的导入参数 + 取值范围校验
// 序列化: camelCase（与上传接口字段一致）
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// 配置错误类型
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("配置值超出范围 ({field}): {value} 不在 [{min}, {max}] 内")]
    OutOfRange {
        field: &'static str,
        value: u64,
        min: u64,
        max: u64,
    },

    #[error("配置值格式错误 (key: {key}, value: {value}): {message}")]
    InvalidValue {
        key: String,
        value: String,
        message: String,
    },
}

// ==========================================
// LogLevel - 日志级别
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            other => Err(ConfigError::InvalidValue {
                key: "logLevel".to_string(),
                value: other.to_string(),
                message: "期望 trace/debug/info/warn/error".to_string(),
            }),
        }
    }
}

// ==========================================
// 取值范围
// ==========================================
pub const BATCH_SIZE_RANGE: (usize, usize) = (1, 50);
pub const MAX_RETRIES_RANGE: (u32, u32) = (1, 5);
pub const WORKER_COUNT_RANGE: (usize, usize) = (1, 8);
/// 单次运行时长上限 1 天
pub const RUN_TIMEOUT_SECS_RANGE: (u64, u64) = (1, 86_400);
/// 退避上限不超过 1 分钟
pub const MAX_BACKOFF_MS_LIMIT: u64 = 60_000;

/// 上传文件默认大小上限（10 MiB）
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

// ==========================================
// ImportConfig - 导入配置
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ImportConfig {
    /// 每批记录数 [1, 50]
    pub batch_size: usize,
    /// 每批最大尝试次数 [1, 5]（含首次）
    pub max_retries: u32,
    pub enable_progress_log: bool,
    pub log_level: LogLevel,
    /// 批次写入并发数 [1, 8]，实际值再受存储安全并发数约束
    pub worker_count: usize,
    pub base_backoff_ms: u64,
    pub max_backoff_ms: u64,
    /// 整次运行的最长时间（秒）
    pub run_timeout_secs: u64,
    pub max_upload_bytes: u64,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            batch_size: 25,
            max_retries: 3,
            enable_progress_log: true,
            log_level: LogLevel::Info,
            worker_count: 4,
            base_backoff_ms: 200,
            max_backoff_ms: 5_000,
            run_timeout_secs: 300,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

impl ImportConfig {
    /// 校验所有取值范围
    pub fn validate(&self) -> Result<(), ConfigError> {
        let (min, max) = BATCH_SIZE_RANGE;
        check_range("batchSize", self.batch_size as u64, min as u64, max as u64)?;
        let (min, max) = MAX_RETRIES_RANGE;
        check_range("maxRetries", self.max_retries as u64, min as u64, max as u64)?;
        let (min, max) = WORKER_COUNT_RANGE;
        check_range("workerCount", self.worker_count as u64, min as u64, max as u64)?;
        check_range(
            "maxBackoffMs",
            self.max_backoff_ms,
            self.base_backoff_ms,
            MAX_BACKOFF_MS_LIMIT,
        )?;
        let (min, max) = RUN_TIMEOUT_SECS_RANGE;
        check_range("runTimeoutSecs", self.run_timeout_secs, min, max)?;
        check_range("maxUploadBytes", self.max_upload_bytes, 1, u64::MAX)?;
        Ok(())
    }

    pub fn run_timeout(&self) -> Duration {
        Duration::from_secs(self.run_timeout_secs)
    }

    /// 实际并发数：不超过存储的安全并发写入数
    pub fn effective_workers(&self, store_limit: usize) -> usize {
        self.worker_count.min(store_limit).max(1)
    }
}

fn check_range(field: &'static str, value: u64, min: u64, max: u64) -> Result<(), ConfigError> {
    if value < min || value > max {
        Err(ConfigError::OutOfRange {
            field,
            value,
            min,
            max,
        })
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(ImportConfig::default().validate().is_ok());
    }

    #[test]
    fn test_batch_size_bounds() {
        let config = ImportConfig {
            batch_size: 0,
            ..ImportConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::OutOfRange { field: "batchSize", .. })
        ));

        let config = ImportConfig {
            batch_size: 51,
            ..ImportConfig::default()
        };
        assert!(config.validate().is_err());

        let config = ImportConfig {
            batch_size: 50,
            ..ImportConfig::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_max_retries_bounds() {
        for (value, ok) in [(0, false), (1, true), (5, true), (6, false)] {
            let config = ImportConfig {
                max_retries: value,
                ..ImportConfig::default()
            };
            assert_eq!(config.validate().is_ok(), ok, "max_retries={}", value);
        }
    }

    #[test]
    fn test_run_timeout_bounds() {
        for (value, ok) in [(0, false), (1, true), (86_400, true), (86_401, false)] {
            let config = ImportConfig {
                run_timeout_secs: value,
                ..ImportConfig::default()
            };
            assert_eq!(config.validate().is_ok(), ok, "run_timeout_secs={}", value);
        }
    }

    #[test]
    fn test_extreme_json_values_rejected() {
        let config: ImportConfig =
            serde_json::from_str(r#"{"runTimeoutSecs": 18446744073709551615}"#).unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::OutOfRange { field: "runTimeoutSecs", .. })
        ));

        let config: ImportConfig =
            serde_json::from_str(r#"{"maxBackoffMs": 18446744073709551615}"#).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_deserialize_camel_case_with_defaults() {
        let config: ImportConfig = serde_json::from_str(
            r#"{"batchSize": 5, "maxRetries": 2, "enableProgressLog": false, "logLevel": "debug"}"#,
        )
        .unwrap();

        assert_eq!(config.batch_size, 5);
        assert_eq!(config.max_retries, 2);
        assert!(!config.enable_progress_log);
        assert_eq!(config.log_level, LogLevel::Debug);
        assert_eq!(config.worker_count, 4);
    }

    #[test]
    fn test_effective_workers_capped_by_store() {
        let config = ImportConfig::default();
        assert_eq!(config.effective_workers(2), 2);
        assert_eq!(config.effective_workers(16), 4);
        assert_eq!(config.effective_workers(0), 1);
    }

    #[test]
    fn test_log_level_from_str() {
        assert_eq!("WARNING".parse::<LogLevel>().unwrap(), LogLevel::Warn);
        assert!("verbose".parse::<LogLevel>().is_err());
    }
}
