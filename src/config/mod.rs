// ==========================================
// 游戏目录站 - 配置层
// ==========================================
// 职责: 导入配置定义、范围校验、config_kv 覆写
// 存储: config_kv 表
// ==========================================

pub mod config_manager;
pub mod import_config;

// 重导出核心配置类型
pub use config_manager::{apply_overrides, config_keys, ConfigManager};
pub use import_config::{
    ConfigError, ImportConfig, LogLevel, BATCH_SIZE_RANGE, DEFAULT_MAX_UPLOAD_BYTES,
    MAX_BACKOFF_MS_LIMIT, MAX_RETRIES_RANGE, RUN_TIMEOUT_SECS_RANGE, WORKER_COUNT_RANGE,
};
