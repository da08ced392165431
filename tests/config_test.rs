// ==========================================
// ConfigManager 集成测试
// ==========================================
// 测试目标: 验证配置读取功能的正确性
// ==========================================


use test_helpers::create_test_db;
use weg_abrechnung::config::{config_keys, ConfigManager, SettlementConfig, SettlementConfigReader};

#[test]
fn test_config_manager_creation() {
    let (_temp_file, db_path) = create_test_db().expect("Failed to create test db");

    let config_manager = ConfigManager::new(&db_path);
    assert!(
        config_manager.is_ok(),
        "ConfigManager should be created successfully"
    );
}

#[test]
fn test_defaults_on_fresh_database() {
    let (_temp_file, db_path) = create_test_db().expect("Failed to create test db");
    let config_manager = ConfigManager::new(&db_path).expect("Failed to create ConfigManager");

    let config = config_manager.load_settlement_config().unwrap();
    assert_eq!(config, SettlementConfig::default());
    assert_eq!(config.money_decimals, 2);
    assert!(config.is_within_legal_range(70.0));
    assert!(!config.is_within_legal_range(80.0));
}

#[test]
fn test_values_persist_across_managers() {
    let (_temp_file, db_path) = create_test_db().expect("Failed to create test db");

    {
        let writer = ConfigManager::new(&db_path).expect("Failed to create ConfigManager");
        writer
            .set_global_config_value(config_keys::DEFAULT_CONSUMPTION_SHARE_PERCENT, "60")
            .unwrap();
        writer
            .set_global_config_value(config_keys::WARMWATER_REFERENCE_TEMP_C, "12.5")
            .unwrap();
        // 覆盖写入
        writer
            .set_global_config_value(config_keys::DEFAULT_CONSUMPTION_SHARE_PERCENT, "55")
            .unwrap();
    }

    let reader = ConfigManager::new(&db_path).expect("Failed to create ConfigManager");
    assert_eq!(reader.get_default_consumption_share_percent().unwrap(), 55.0);
    assert_eq!(reader.get_warmwater_reference_temp_c().unwrap(), 12.5);
    assert_eq!(
        reader
            .get_global_config_value(config_keys::WARMWATER_REFERENCE_TEMP_C)
            .unwrap()
            .as_deref(),
        Some("12.5")
    );
}

#[test]
fn test_invalid_values_fall_back_to_defaults() {
    let (_temp_file, db_path) = create_test_db().expect("Failed to create test db");
    let config_manager = ConfigManager::new(&db_path).expect("Failed to create ConfigManager");

    config_manager
        .set_global_config_value(config_keys::MONEY_DECIMALS, "zwei")
        .unwrap();
    config_manager
        .set_global_config_value(config_keys::LEGAL_CONSUMPTION_SHARE_MIN, "80")
        .unwrap();
    config_manager
        .set_global_config_value(config_keys::LEGAL_CONSUMPTION_SHARE_MAX, "60")
        .unwrap();

    assert_eq!(config_manager.get_money_decimals().unwrap(), 2);
    assert_eq!(
        config_manager.get_legal_consumption_share_range().unwrap(),
        (50.0, 70.0)
    );
}

#[test]
fn test_config_snapshot_lists_raw_values() {
    let (_temp_file, db_path) = create_test_db().expect("Failed to create test db");
    let config_manager = ConfigManager::new(&db_path).expect("Failed to create ConfigManager");
    config_manager
        .set_global_config_value(config_keys::WARMWATER_CONSUMPTION_SHARE_PERCENT, "50")
        .unwrap();

    let snapshot = config_manager.get_config_snapshot().unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&snapshot).unwrap();
    assert_eq!(parsed[config_keys::WARMWATER_CONSUMPTION_SHARE_PERCENT], "50");
}
