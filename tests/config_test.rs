// ==========================================
// ConfigManager 集成测试
// ==========================================
// 测试目标: 验证配置默认值、覆写与容错
// ==========================================


use cost_intelligence::config::config_manager::{
    KEY_LABOUR_RATE_FLAT, KEY_ONLINE_TTL_HOURS, KEY_OVERHEAD_PERCENT, KEY_SERPAPI_KEY,
    KEY_TARGET_MARGIN_PERCENT,
};
use cost_intelligence::config::ConfigManager;
use test_helpers::{create_test_db, insert_test_config, shared_connection};

#[test]
fn test_defaults_without_any_rows() {
    let (_tmp, db_path) = create_test_db().unwrap();
    let conn = shared_connection(&db_path).unwrap();
    let config = ConfigManager::from_connection(conn);

    assert_eq!(config.target_margin_percent().unwrap(), 25.0);
    assert_eq!(config.labour_rate_flat().unwrap(), 15.0);
    assert_eq!(config.overhead_percent().unwrap(), 10.0);
    assert_eq!(config.online_ttl_hours().unwrap(), 24);

    let credentials = config.lookup_credentials().unwrap();
    assert!(credentials.metalprices_api_key.is_none());
    assert!(credentials.serpapi_key.is_none());
    assert!(credentials.serper_api_key.is_none());
}

#[test]
fn test_overrides_take_effect() {
    let (_tmp, db_path) = create_test_db().unwrap();
    let conn = shared_connection(&db_path).unwrap();

    insert_test_config(&conn, KEY_TARGET_MARGIN_PERCENT, "30");
    insert_test_config(&conn, KEY_LABOUR_RATE_FLAT, "20.5");
    insert_test_config(&conn, KEY_OVERHEAD_PERCENT, "12");
    insert_test_config(&conn, KEY_ONLINE_TTL_HOURS, "48");
    insert_test_config(&conn, KEY_SERPAPI_KEY, "sk-test");

    let config = ConfigManager::from_connection(conn);
    assert_eq!(config.target_margin_percent().unwrap(), 30.0);
    assert_eq!(config.labour_rate_flat().unwrap(), 20.5);
    assert_eq!(config.overhead_percent().unwrap(), 12.0);
    assert_eq!(config.online_ttl_hours().unwrap(), 48);
    assert_eq!(
        config.lookup_credentials().unwrap().serpapi_key.as_deref(),
        Some("sk-test")
    );
}

#[test]
fn test_unparseable_value_falls_back_to_default() {
    let (_tmp, db_path) = create_test_db().unwrap();
    let conn = shared_connection(&db_path).unwrap();

    insert_test_config(&conn, KEY_TARGET_MARGIN_PERCENT, "not-a-number");

    let config = ConfigManager::from_connection(conn);
    assert_eq!(config.target_margin_percent().unwrap(), 25.0);
}

#[test]
fn test_blank_credential_treated_as_missing() {
    let (_tmp, db_path) = create_test_db().unwrap();
    let conn = shared_connection(&db_path).unwrap();

    insert_test_config(&conn, KEY_SERPAPI_KEY, "   ");

    let config = ConfigManager::from_connection(conn);
    assert!(config.lookup_credentials().unwrap().serpapi_key.is_none());
}

#[test]
fn test_upsert_overwrites_existing_value() {
    let (_tmp, db_path) = create_test_db().unwrap();
    let conn = shared_connection(&db_path).unwrap();
    let config = ConfigManager::from_connection(conn);

    config.set_config_value(KEY_ONLINE_TTL_HOURS, "12").unwrap();
    config.set_config_value(KEY_ONLINE_TTL_HOURS, "72").unwrap();
    assert_eq!(config.online_ttl_hours().unwrap(), 72);

    let snapshot = config.get_config_snapshot().unwrap();
    assert!(snapshot.contains("lookup/online_ttl_hours"));
    assert!(snapshot.contains("72"));
}
