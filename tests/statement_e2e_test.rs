// ==========================================
// 结算单端到端测试
// ==========================================
// 测试目标: SQLite 持久化下的 计算 → 草稿 → 覆写 → 定稿 全流程
// ==========================================


use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use test_helpers::{create_test_db, open_test_connection, seed_heating, seed_operating_property, PROPERTY_ID, YEAR};
use weg_abrechnung::api::{ApiError, StatementApi};
use weg_abrechnung::config::{config_keys, ConfigManager, SettlementConfig};
use weg_abrechnung::domain::{CostType, StatementStatus};
use weg_abrechnung::logging;

fn amount_of(rows: &[weg_abrechnung::StatementRow], unit_id: &str, cost_type: CostType) -> Decimal {
    rows.iter()
        .find(|r| r.unit_id == unit_id && r.cost_type == cost_type)
        .map(|r| r.amount_gross)
        .expect("row not found")
}

// ==========================================
// 测试用例
// ==========================================

#[test]
fn test_full_statement_lifecycle() {
    logging::init_test();

    // 步骤 1: 准备数据库与数据
    let (_temp_file, db_path) = create_test_db().expect("Failed to create test db");
    let conn = open_test_connection(&db_path).expect("Failed to open db");
    seed_operating_property(conn.clone()).expect("Failed to seed property");
    seed_heating(conn.clone(), "kwh").expect("Failed to seed heating");
    drop(conn);

    let api = StatementApi::open(&db_path).expect("Failed to open api");

    // 步骤 2: 首次重算，生成草稿
    let response = api.recompute_statement(PROPERTY_ID, YEAR).unwrap();
    assert_eq!(response.run.status, StatementStatus::Draft);
    assert!(response.run.config_snapshot_json.is_some());

    let result = &response.result;
    assert_eq!(result.totals.total_costs, dec!(1200.00));
    assert_eq!(result.totals.unit_count, 3);
    assert!(!result.has_failures());

    let heating_sum: Decimal = result
        .rows
        .iter()
        .filter(|r| r.cost_type.is_heating())
        .map(|r| r.amount_gross)
        .sum();
    assert_eq!(heating_sum, dec!(100.00));
    assert_eq!(amount_of(&result.rows, "U1", CostType::HeatingBase), dec!(9.60));
    assert_eq!(amount_of(&result.rows, "U1", CostType::HeatingConsumption), dec!(28.00));
    assert_eq!(amount_of(&result.rows, "U1", CostType::WarmWaterBase), dec!(2.40));
    assert_eq!(amount_of(&result.rows, "U1", CostType::WarmWaterConsumption), dec!(4.66));

    // U1: 400.00 + 33.34 + 44.66 = 478.00，预付 500.00
    assert_eq!(result.summary[0].unit_id, "U1");
    assert_eq!(result.summary[0].total_costs, dec!(478.00));
    assert_eq!(result.summary[0].balance, dec!(-22.00));

    // 步骤 3: 读取持久化结果
    let run_id = response.run.run_id.clone();
    let stored = api.get_statement(&run_id).unwrap();
    assert_eq!(stored.rows.len(), result.rows.len());
    assert_eq!(stored.totals.total_costs, dec!(1200.00));
    assert_eq!(stored.totals.total_balance, result.totals.total_balance);
    assert_eq!(
        amount_of(&stored.rows, "U2", CostType::WarmWaterConsumption),
        dec!(4.67)
    );

    // 步骤 4: 人工覆写后重算，批次不变
    assert!(api
        .set_override(&run_id, "C1", "U3", Some(dec!(100.00)))
        .unwrap());
    let second = api.recompute_statement(PROPERTY_ID, YEAR).unwrap();
    assert_eq!(second.run.run_id, run_id);

    let c1: Vec<(String, Decimal, bool)> = second
        .result
        .rows_for_category("C1")
        .iter()
        .map(|r| (r.unit_id.clone(), r.amount_gross, r.overridden))
        .collect();
    assert_eq!(
        c1,
        vec![
            ("U1".to_string(), dec!(450.00), false),
            ("U2".to_string(), dec!(450.00), false),
            ("U3".to_string(), dec!(100.00), true),
        ]
    );
    assert_eq!(second.result.totals.total_costs, dec!(1200.00));

    // 步骤 5: 定稿后只读
    let finalized = api.finalize_statement(&run_id).unwrap();
    assert_eq!(finalized.status, StatementStatus::Finalized);
    assert!(finalized.finalized_at.is_some());

    assert!(matches!(
        api.recompute_statement(PROPERTY_ID, YEAR),
        Err(ApiError::StatementFinalized(_))
    ));
    assert!(matches!(
        api.set_override(&run_id, "C1", "U1", None),
        Err(ApiError::StatementFinalized(_))
    ));

    // 定稿结果保持不变
    let after = api.get_statement(&run_id).unwrap();
    assert_eq!(after.rows.len(), stored.rows.len());
    assert_eq!(
        after
            .rows
            .iter()
            .find(|r| r.unit_id == "U3" && r.category_id.as_deref() == Some("C1"))
            .map(|r| r.amount_gross),
        Some(dec!(100.00))
    );
}

#[test]
fn test_statement_survives_reopen() {
    let (_temp_file, db_path) = create_test_db().expect("Failed to create test db");
    let conn = open_test_connection(&db_path).expect("Failed to open db");
    seed_operating_property(conn).expect("Failed to seed property");

    let run_id = {
        let api = StatementApi::open(&db_path).expect("Failed to open api");
        api.recompute_statement(PROPERTY_ID, YEAR).unwrap().run.run_id
    };

    let api = StatementApi::open(&db_path).expect("Failed to reopen api");
    let stored = api.get_statement(&run_id).unwrap();
    assert_eq!(stored.run.property_id, PROPERTY_ID);
    assert_eq!(stored.totals.total_costs, dec!(1100.00));
    assert_eq!(stored.totals.category_count, 2);
    assert_eq!(stored.summary.len(), 3);
}

#[test]
fn test_missing_fuel_factor_reported_but_statement_built() {
    let (_temp_file, db_path) = create_test_db().expect("Failed to create test db");
    let conn = open_test_connection(&db_path).expect("Failed to open db");
    seed_operating_property(conn.clone()).expect("Failed to seed property");
    seed_heating(conn, "Pellets_Sack").expect("Failed to seed heating");

    let api = StatementApi::open(&db_path).expect("Failed to open api");
    let result = api.build_statement(PROPERTY_ID, YEAR).unwrap();

    assert!(result.has_failures());
    assert!(result.heating.is_none());
    assert!(result.warnings.iter().any(|w| w.code() == "missing_factor"));
    assert_eq!(result.rows_for_category("C1").len(), 3);
    assert!(result.rows.iter().all(|r| !r.cost_type.is_heating()));
}

#[test]
fn test_warmwater_share_from_config_table() {
    let (_temp_file, db_path) = create_test_db().expect("Failed to create test db");
    let conn = open_test_connection(&db_path).expect("Failed to open db");
    seed_operating_property(conn.clone()).expect("Failed to seed property");
    seed_heating(conn.clone(), "kwh").expect("Failed to seed heating");

    let config = ConfigManager::from_connection(conn).expect("Failed to create ConfigManager");
    config
        .set_global_config_value(config_keys::WARMWATER_CONSUMPTION_SHARE_PERCENT, "50")
        .expect("Failed to write config");
    drop(config);

    let api = StatementApi::open(&db_path).expect("Failed to open api");
    let response = api.recompute_statement(PROPERTY_ID, YEAR).unwrap();

    // 热水费用 20.00 按 50/50 拆分
    let heating = response.result.heating.as_ref().expect("heating missing");
    assert_eq!(heating.totals.cost_ww_consumption, dec!(10.00));
    assert_eq!(heating.totals.cost_ww_base, dec!(10.00));
    assert_eq!(
        amount_of(&response.result.rows, "U3", CostType::WarmWaterBase),
        dec!(2.00)
    );

    let snapshot = response
        .run
        .config_snapshot_json
        .as_deref()
        .expect("snapshot missing");
    let restored = SettlementConfig::from_snapshot_json(snapshot).unwrap();
    assert_eq!(restored.warmwater_consumption_share_percent, 50.0);
}

#[test]
fn test_change_distribution_key_persists() {
    let (_temp_file, db_path) = create_test_db().expect("Failed to create test db");
    let conn = open_test_connection(&db_path).expect("Failed to open db");
    seed_operating_property(conn).expect("Failed to seed property");

    let api = StatementApi::open(&db_path).expect("Failed to open api");
    api.change_distribution_key("C1", "unit_count").unwrap();

    let result = api.build_statement(PROPERTY_ID, YEAR).unwrap();
    let c1: Vec<Decimal> = result
        .rows_for_category("C1")
        .iter()
        .map(|r| r.amount_gross)
        .collect();
    assert_eq!(c1, vec![dec!(333.34), dec!(333.33), dec!(333.33)]);
}
