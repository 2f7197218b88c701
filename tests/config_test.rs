// ==========================================
// ConfigManager 集成测试
// ==========================================
// 测试目标: config_kv 覆写 → ImportConfig 加载与校验
// ==========================================

mod test_helpers;

use game_catalog_ingest::config::{config_keys, ConfigManager, ImportConfig, LogLevel};
use test_helpers::create_test_db;

#[test]
fn test_load_defaults_from_empty_table() {
    let (_temp_file, db_path) = create_test_db().expect("Failed to create test db");
    let manager = ConfigManager::new(&db_path).expect("Failed to create ConfigManager");

    let config = manager.load_import_config().unwrap();
    assert_eq!(config, ImportConfig::default());
}

#[test]
fn test_overrides_round_trip() {
    let (_temp_file, db_path) = create_test_db().expect("Failed to create test db");
    let manager = ConfigManager::new(&db_path).expect("Failed to create ConfigManager");

    manager
        .set_global_config_value(config_keys::BATCH_SIZE, "10")
        .unwrap();
    manager
        .set_global_config_value(config_keys::LOG_LEVEL, "debug")
        .unwrap();
    // 重复写入覆盖旧值
    manager
        .set_global_config_value(config_keys::MAX_RETRIES, "2")
        .unwrap();
    manager
        .set_global_config_value(config_keys::MAX_RETRIES, "4")
        .unwrap();

    assert_eq!(
        manager
            .get_global_config_value(config_keys::BATCH_SIZE)
            .unwrap()
            .as_deref(),
        Some("10")
    );

    let config = manager.load_import_config().unwrap();
    assert_eq!(config.batch_size, 10);
    assert_eq!(config.max_retries, 4);
    assert_eq!(config.log_level, LogLevel::Debug);
}

#[test]
fn test_out_of_range_override_is_rejected() {
    let (_temp_file, db_path) = create_test_db().expect("Failed to create test db");
    let manager = ConfigManager::new(&db_path).expect("Failed to create ConfigManager");

    manager
        .set_global_config_value(config_keys::BATCH_SIZE, "500")
        .unwrap();

    assert!(manager.load_import_config().is_err());
}

#[test]
fn test_missing_key_is_none() {
    let (_temp_file, db_path) = create_test_db().expect("Failed to create test db");
    let manager = ConfigManager::new(&db_path).expect("Failed to create ConfigManager");

    assert!(manager
        .get_global_config_value("import.unknown")
        .unwrap()
        .is_none());
}
