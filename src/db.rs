// ==========================================
// WEG 运营费用结算 - SQLite 连接初始化
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为（外键、busy_timeout）
// - 提供幂等的建表脚本，供持久化适配器与测试共用
// ==========================================

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// 建表脚本（全部 IF NOT EXISTS，可重复执行）
///
/// 金额统一以 TEXT 存储，避免浮点误差
const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS config_kv (
    scope_id TEXT NOT NULL DEFAULT 'global',
    key TEXT NOT NULL,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (scope_id, key)
);

CREATE TABLE IF NOT EXISTS property (
    property_id TEXT PRIMARY KEY,
    name TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS unit (
    unit_id TEXT PRIMARY KEY,
    property_id TEXT NOT NULL REFERENCES property(property_id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    area_m2 REAL NOT NULL DEFAULT 0,
    ownership_share REAL NOT NULL DEFAULT 0,
    person_count REAL NOT NULL DEFAULT 0
);
CREATE INDEX IF NOT EXISTS idx_unit_property ON unit(property_id);

CREATE TABLE IF NOT EXISTS cost_category (
    category_id TEXT PRIMARY KEY,
    property_id TEXT NOT NULL REFERENCES property(property_id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    kind TEXT NOT NULL CHECK(kind IN ('OPERATING', 'HEATING')),
    distribution_key TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_cost_category_property ON cost_category(property_id);

CREATE TABLE IF NOT EXISTS voucher (
    voucher_id TEXT PRIMARY KEY,
    property_id TEXT NOT NULL REFERENCES property(property_id) ON DELETE CASCADE,
    category_id TEXT NOT NULL REFERENCES cost_category(category_id) ON DELETE CASCADE,
    year INTEGER NOT NULL,
    gross_amount TEXT NOT NULL,
    include_in_statement INTEGER NOT NULL DEFAULT 1,
    description TEXT
);
CREATE INDEX IF NOT EXISTS idx_voucher_category_year ON voucher(category_id, year);

CREATE TABLE IF NOT EXISTS meter (
    meter_id TEXT PRIMARY KEY,
    property_id TEXT NOT NULL REFERENCES property(property_id) ON DELETE CASCADE,
    unit_id TEXT REFERENCES unit(unit_id) ON DELETE SET NULL,
    meter_type TEXT NOT NULL,
    label TEXT
);

CREATE TABLE IF NOT EXISTS meter_reading (
    reading_id INTEGER PRIMARY KEY AUTOINCREMENT,
    meter_id TEXT NOT NULL REFERENCES meter(meter_id) ON DELETE CASCADE,
    period_start TEXT NOT NULL,
    period_end TEXT NOT NULL,
    consumption REAL NOT NULL DEFAULT 0
);
CREATE INDEX IF NOT EXISTS idx_meter_reading_meter ON meter_reading(meter_id);

CREATE TABLE IF NOT EXISTS heating_settings (
    property_id TEXT PRIMARY KEY REFERENCES property(property_id) ON DELETE CASCADE,
    system_type TEXT NOT NULL,
    consumption_share_percent REAL NOT NULL DEFAULT 70,
    supply_temp_c REAL NOT NULL DEFAULT 60,
    hotwater_unit_mode TEXT NOT NULL DEFAULT 'MWH'
);

CREATE TABLE IF NOT EXISTS fuel_factor (
    kind TEXT PRIMARY KEY,
    calorific_value REAL NOT NULL,
    state_number REAL NOT NULL
);

CREATE TABLE IF NOT EXISTS heating_purchase (
    property_id TEXT NOT NULL REFERENCES property(property_id) ON DELETE CASCADE,
    year INTEGER NOT NULL,
    fuel_input_type TEXT NOT NULL,
    input_amount REAL NOT NULL,
    unit_price TEXT NOT NULL,
    gross_cost TEXT,
    warmwater_meter_id TEXT REFERENCES meter(meter_id) ON DELETE SET NULL,
    period_start TEXT NOT NULL,
    period_end TEXT NOT NULL,
    PRIMARY KEY (property_id, year)
);

CREATE TABLE IF NOT EXISTS advance_payment (
    unit_id TEXT NOT NULL REFERENCES unit(unit_id) ON DELETE CASCADE,
    year INTEGER NOT NULL,
    amount TEXT NOT NULL,
    PRIMARY KEY (unit_id, year)
);

CREATE TABLE IF NOT EXISTS statement_run (
    run_id TEXT PRIMARY KEY,
    property_id TEXT NOT NULL REFERENCES property(property_id) ON DELETE CASCADE,
    year INTEGER NOT NULL,
    status TEXT NOT NULL CHECK(status IN ('DRAFT', 'FINALIZED')),
    config_snapshot_json TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    finalized_at TEXT,
    UNIQUE(property_id, year)
);

CREATE TABLE IF NOT EXISTS distribution_override (
    run_id TEXT NOT NULL REFERENCES statement_run(run_id) ON DELETE CASCADE,
    category_id TEXT NOT NULL REFERENCES cost_category(category_id) ON DELETE CASCADE,
    unit_id TEXT NOT NULL REFERENCES unit(unit_id) ON DELETE CASCADE,
    manual_amount_gross TEXT NOT NULL,
    PRIMARY KEY (run_id, category_id, unit_id)
);

CREATE TABLE IF NOT EXISTS statement_row (
    run_id TEXT NOT NULL REFERENCES statement_run(run_id) ON DELETE CASCADE,
    seq_no INTEGER NOT NULL,
    unit_id TEXT NOT NULL,
    category_id TEXT,
    cost_type TEXT NOT NULL,
    label TEXT NOT NULL,
    distribution_key TEXT,
    basis_value REAL NOT NULL DEFAULT 0,
    share_percent REAL NOT NULL DEFAULT 0,
    amount_gross TEXT NOT NULL,
    overridden INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (run_id, seq_no)
);

CREATE TABLE IF NOT EXISTS statement_summary (
    run_id TEXT NOT NULL REFERENCES statement_run(run_id) ON DELETE CASCADE,
    unit_id TEXT NOT NULL,
    total_costs TEXT NOT NULL,
    advance_payments TEXT NOT NULL,
    balance TEXT NOT NULL,
    PRIMARY KEY (run_id, unit_id)
);
"#;

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要“每个连接”单独开启
/// - busy_timeout 需要“每个连接”单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 打开共享连接（供多个仓储共用同一连接与事务）
pub fn open_shared_connection(db_path: &str) -> rusqlite::Result<Arc<Mutex<Connection>>> {
    let conn = open_sqlite_connection(db_path)?;
    ensure_schema(&conn)?;
    Ok(Arc::new(Mutex::new(conn)))
}

/// 打开内存数据库（已建表），用于试算与测试
pub fn open_in_memory_shared() -> rusqlite::Result<Arc<Mutex<Connection>>> {
    let conn = Connection::open_in_memory()?;
    configure_sqlite_connection(&conn)?;
    ensure_schema(&conn)?;
    Ok(Arc::new(Mutex::new(conn)))
}

/// 建表（幂等），并记录 schema_version
pub fn ensure_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;
    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [CURRENT_SCHEMA_VERSION],
    )?;
    Ok(())
}

/// 读取 schema_version（若表不存在则返回 None）
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> = conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        configure_sqlite_connection(&conn).unwrap();

        assert_eq!(read_schema_version(&conn).unwrap(), None);

        ensure_schema(&conn).unwrap();
        ensure_schema(&conn).unwrap();

        assert_eq!(read_schema_version(&conn).unwrap(), Some(CURRENT_SCHEMA_VERSION));
    }
}
