// ==========================================
// 游戏目录站 - 表格导入命令行入口
// ==========================================
// 用法:
//   catalog-import <file> [db_path]
//
// 配置优先级: 默认值 < config_kv 表 < 环境变量
//   IMPORT_BATCH_SIZE / IMPORT_MAX_RETRIES / IMPORT_LOG_LEVEL
//   IMPORT_WORKER_COUNT / IMPORT_RUN_TIMEOUT_SECS
// 日志格式: IMPORT_LOG_FORMAT=json 输出 JSON，否则为文本
//
// 退出码: 0 成功 / 1 部分失败或运行错误 / 2 文件无法解析
// ==========================================

use game_catalog_ingest::config::{apply_overrides, config_keys, ConfigManager, ImportConfig};
use game_catalog_ingest::db::get_default_db_path;
use game_catalog_ingest::importer::{CatalogImporter, CatalogImporterImpl, SourceFile};
use game_catalog_ingest::logging;
use game_catalog_ingest::repository::{SqliteCatalogStore, DEFAULT_POOL_SIZE};
use std::collections::HashMap;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

const ENV_OVERRIDES: [(&str, &str); 5] = [
    ("IMPORT_BATCH_SIZE", config_keys::BATCH_SIZE),
    ("IMPORT_MAX_RETRIES", config_keys::MAX_RETRIES),
    ("IMPORT_LOG_LEVEL", config_keys::LOG_LEVEL),
    ("IMPORT_WORKER_COUNT", config_keys::WORKER_COUNT),
    ("IMPORT_RUN_TIMEOUT_SECS", config_keys::RUN_TIMEOUT_SECS),
];

const LOG_FORMAT_ENV: &str = "IMPORT_LOG_FORMAT";

fn main() -> ExitCode {
    let mut args = std::env::args().skip(1);
    let Some(file_path) = args.next() else {
        eprintln!("用法: catalog-import <file> [db_path]");
        return ExitCode::from(1);
    };
    let db_path = args.next().unwrap_or_else(get_default_db_path);

    let config = match load_config(&db_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("导入配置无效: {}", e);
            return ExitCode::from(1);
        }
    };

    if std::env::var(LOG_FORMAT_ENV).is_ok_and(|v| v.eq_ignore_ascii_case("json")) {
        logging::init_json(config.log_level);
    } else {
        logging::init_with_level(config.log_level);
    }
    tracing::info!("==================================================");
    tracing::info!("{} v{}", game_catalog_ingest::APP_NAME, game_catalog_ingest::VERSION);
    tracing::info!("使用数据库: {}", db_path);
    tracing::info!("==================================================");

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("无法启动异步运行时: {}", e);
            return ExitCode::from(1);
        }
    };

    runtime.block_on(run(&file_path, &db_path, config))
}

/// 默认值 → config_kv → 环境变量，最后统一校验
fn load_config(db_path: &str) -> Result<ImportConfig, Box<dyn std::error::Error>> {
    let manager = ConfigManager::new(db_path)?;
    let config = manager.load_import_config()?;

    let env_overrides: HashMap<String, String> = ENV_OVERRIDES
        .iter()
        .filter_map(|(var, key)| std::env::var(var).ok().map(|v| (key.to_string(), v)))
        .collect();

    let config = apply_overrides(config, &env_overrides)?;
    config.validate()?;
    Ok(config)
}

async fn run(file_path: &str, db_path: &str, config: ImportConfig) -> ExitCode {
    // 复制到临时文件，导入结束后删除副本而不是用户的原文件
    let source = match SourceFile::copy_from(Path::new(file_path), config.max_upload_bytes) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("无法读取源文件: {}", e);
            return ExitCode::from(if e.is_parse_error() { 2 } else { 1 });
        }
    };

    let store = match SqliteCatalogStore::new(db_path, DEFAULT_POOL_SIZE) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            eprintln!("无法打开目录数据库: {}", e);
            return ExitCode::from(1);
        }
    };

    let importer = match CatalogImporterImpl::new(store, config) {
        Ok(importer) => importer,
        Err(e) => {
            eprintln!("导入器初始化失败: {}", e);
            return ExitCode::from(1);
        }
    };

    match importer.import(source).await {
        Ok(report) => {
            match serde_json::to_string_pretty(&report) {
                Ok(json) => println!("{}", json),
                Err(e) => eprintln!("报告序列化失败: {}", e),
            }
            if report.success {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(1)
            }
        }
        Err(e) => {
            eprintln!("导入中止: {}", e);
            ExitCode::from(if e.is_parse_error() { 2 } else { 1 })
        }
    }
}
