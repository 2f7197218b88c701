// ==========================================
// 游戏目录站 - 配置管理器
// ==========================================
// 职责: 从 config_kv 表加载导入配置覆写
// 存储: config_kv 表 (key-value + scope)
// 优先级: 默认值 < config_kv(global) < 调用方传入
// ==========================================

use crate::config::import_config::{ConfigError, ImportConfig, LogLevel};
use crate::db::open_sqlite_connection;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::error::Error;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

// ==========================================
// 配置键
// ==========================================
pub mod config_keys {
    pub const BATCH_SIZE: &str = "import.batch_size";
    pub const MAX_RETRIES: &str = "import.max_retries";
    pub const ENABLE_PROGRESS_LOG: &str = "import.enable_progress_log";
    pub const LOG_LEVEL: &str = "import.log_level";
    pub const WORKER_COUNT: &str = "import.worker_count";
    pub const BASE_BACKOFF_MS: &str = "import.base_backoff_ms";
    pub const MAX_BACKOFF_MS: &str = "import.max_backoff_ms";
    pub const RUN_TIMEOUT_SECS: &str = "import.run_timeout_secs";
    pub const MAX_UPLOAD_BYTES: &str = "import.max_upload_bytes";
}

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> Result<Self, Box<dyn Error>> {
        let conn = open_sqlite_connection(db_path)?;
        crate::db::init_catalog_schema(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 读取 global scope 的配置值
    pub fn get_global_config_value(&self, key: &str) -> Result<Option<String>, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let value = conn
            .query_row(
                "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    /// 写入 global scope 的配置值（UPSERT）
    pub fn set_global_config_value(&self, key: &str, value: &str) -> Result<(), Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value) VALUES ('global', ?1, ?2)
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2, updated_at = datetime('now')",
            params![key, value],
        )?;
        Ok(())
    }

    /// 读取所有 import.* 配置
    fn import_overrides(&self) -> Result<HashMap<String, String>, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let mut stmt = conn.prepare(
            "SELECT key, value FROM config_kv WHERE scope_id = 'global' AND key LIKE 'import.%'",
        )?;
        let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?;

        let mut overrides = HashMap::new();
        for row in rows {
            let (key, value) = row?;
            overrides.insert(key, value);
        }
        Ok(overrides)
    }

    /// 加载导入配置（默认值 + config_kv 覆写），并校验范围
    pub fn load_import_config(&self) -> Result<ImportConfig, Box<dyn Error>> {
        let overrides = self.import_overrides()?;
        let config = apply_overrides(ImportConfig::default(), &overrides)?;
        config.validate()?;
        Ok(config)
    }
}

/// 把 key-value 覆写应用到配置上（未知键忽略）
pub fn apply_overrides(
    mut config: ImportConfig,
    overrides: &HashMap<String, String>,
) -> Result<ImportConfig, ConfigError> {
    for (key, value) in overrides {
        match key.as_str() {
            config_keys::BATCH_SIZE => config.batch_size = parse_value(key, value)?,
            config_keys::MAX_RETRIES => config.max_retries = parse_value(key, value)?,
            config_keys::ENABLE_PROGRESS_LOG => {
                config.enable_progress_log = parse_bool(key, value)?
            }
            config_keys::LOG_LEVEL => config.log_level = LogLevel::from_str(value)?,
            config_keys::WORKER_COUNT => config.worker_count = parse_value(key, value)?,
            config_keys::BASE_BACKOFF_MS => config.base_backoff_ms = parse_value(key, value)?,
            config_keys::MAX_BACKOFF_MS => config.max_backoff_ms = parse_value(key, value)?,
            config_keys::RUN_TIMEOUT_SECS => config.run_timeout_secs = parse_value(key, value)?,
            config_keys::MAX_UPLOAD_BYTES => config.max_upload_bytes = parse_value(key, value)?,
            _ => {
                tracing::debug!(config_key = %key, "忽略未知导入配置键");
            }
        }
    }
    Ok(config)
}

fn parse_value<T: FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse::<T>().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
        message: "无法解析为数字".to_string(),
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
            message: "无法解析为布尔值".to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_overrides() {
        let mut overrides = HashMap::new();
        overrides.insert(config_keys::BATCH_SIZE.to_string(), "10".to_string());
        overrides.insert(config_keys::ENABLE_PROGRESS_LOG.to_string(), "off".to_string());
        overrides.insert(config_keys::LOG_LEVEL.to_string(), "debug".to_string());
        overrides.insert("import.unknown".to_string(), "x".to_string());

        let config = apply_overrides(ImportConfig::default(), &overrides).unwrap();
        assert_eq!(config.batch_size, 10);
        assert!(!config.enable_progress_log);
        assert_eq!(config.log_level, LogLevel::Debug);
    }

    #[test]
    fn test_apply_overrides_invalid_number() {
        let mut overrides = HashMap::new();
        overrides.insert(config_keys::MAX_RETRIES.to_string(), "three".to_string());

        let result = apply_overrides(ImportConfig::default(), &overrides);
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }
}
