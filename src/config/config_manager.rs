// ==========================================
// WEG 运营费用结算 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (key-value + scope)
// ==========================================

use crate::config::settlement_config_trait::SettlementConfigReader;
use crate::db::open_sqlite_connection;
use rusqlite::{params, Connection};
use std::collections::HashMap;
use std::error::Error;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

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
        crate::db::ensure_schema(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：为保证连接行为一致，会对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Result<Self, Box<dyn Error>> {
        {
            let conn_guard = conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
            crate::db::configure_sqlite_connection(&conn_guard)?;
        }

        Ok(Self { conn })
    }

    /// 从 config_kv 表读取配置值（scope_id='global'）
    fn get_config_value(&self, key: &str) -> Result<Option<String>, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let result = conn.query_row(
            "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
            params![key],
            |row| row.get::<_, String>(0),
        );

        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(Box::new(e)),
        }
    }

    /// 读取 global scope 的配置值（公开方法，供其他模块复用）
    pub fn get_global_config_value(&self, key: &str) -> Result<Option<String>, Box<dyn Error>> {
        self.get_config_value(key)
    }

    /// 写入 global scope 的配置值（存在则覆盖）
    pub fn set_global_config_value(&self, key: &str, value: &str) -> Result<(), Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
        conn.execute(
            r#"
            INSERT INTO config_kv (scope_id, key, value, updated_at)
            VALUES ('global', ?1, ?2, datetime('now'))
            ON CONFLICT(scope_id, key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
            params![key, value],
        )?;
        Ok(())
    }

    /// 读取并解析配置值；缺失或格式错误时返回默认值
    fn get_parsed_or_default<T>(&self, key: &str, default: T) -> Result<T, Box<dyn Error>>
    where
        T: FromStr + Copy + std::fmt::Display,
    {
        let Some(raw) = self.get_config_value(key)? else {
            return Ok(default);
        };
        match raw.trim().parse::<T>() {
            Ok(value) => Ok(value),
            Err(_) => {
                tracing::warn!(
                    config_key = key,
                    raw_value = %raw,
                    default_value = %default,
                    "配置格式错误，使用默认值"
                );
                Ok(default)
            }
        }
    }

    /// 获取所有配置的快照（JSON格式）
    ///
    /// # 用途
    /// - 排查历史结算时对照当时的原始配置
    pub fn get_config_snapshot(&self) -> Result<String, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let mut stmt = conn.prepare(
            "SELECT key, value FROM config_kv WHERE scope_id = 'global' ORDER BY key",
        )?;

        let mut config_map: HashMap<String, String> = HashMap::new();
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        for row in rows {
            let (key, value) = row?;
            config_map.insert(key, value);
        }

        Ok(serde_json::to_string(&config_map)?)
    }
}

// ==========================================
// SettlementConfigReader Trait 实现
// ==========================================
impl SettlementConfigReader for ConfigManager {
    fn get_money_decimals(&self) -> Result<u32, Box<dyn Error>> {
        self.get_parsed_or_default(config_keys::MONEY_DECIMALS, 2u32)
    }

    fn get_default_consumption_share_percent(&self) -> Result<f64, Box<dyn Error>> {
        self.get_parsed_or_default(config_keys::DEFAULT_CONSUMPTION_SHARE_PERCENT, 70.0)
    }

    fn get_warmwater_consumption_share_percent(&self) -> Result<f64, Box<dyn Error>> {
        self.get_parsed_or_default(config_keys::WARMWATER_CONSUMPTION_SHARE_PERCENT, 70.0)
    }

    fn get_legal_consumption_share_range(&self) -> Result<(f64, f64), Box<dyn Error>> {
        let min = self.get_parsed_or_default(config_keys::LEGAL_CONSUMPTION_SHARE_MIN, 50.0)?;
        let max = self.get_parsed_or_default(config_keys::LEGAL_CONSUMPTION_SHARE_MAX, 70.0)?;
        if min > max {
            tracing::warn!(min, max, "法定区间上下限颠倒，使用默认区间");
            return Ok((50.0, 70.0));
        }
        Ok((min, max))
    }

    fn get_warmwater_reference_temp_c(&self) -> Result<f64, Box<dyn Error>> {
        self.get_parsed_or_default(config_keys::WARMWATER_REFERENCE_TEMP_C, 10.0)
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 金额
    pub const MONEY_DECIMALS: &str = "money_decimals";

    // 供暖费用拆分
    pub const DEFAULT_CONSUMPTION_SHARE_PERCENT: &str = "default_consumption_share_percent";
    pub const WARMWATER_CONSUMPTION_SHARE_PERCENT: &str = "warmwater_consumption_share_percent";

    // 法定区间 (Heizkostenverordnung)
    pub const LEGAL_CONSUMPTION_SHARE_MIN: &str = "legal_consumption_share_min";
    pub const LEGAL_CONSUMPTION_SHARE_MAX: &str = "legal_consumption_share_max";

    // 热水能耗估算
    pub const WARMWATER_REFERENCE_TEMP_C: &str = "warmwater_reference_temp_c";
}
