// ==========================================
// WEG 运营费用结算 - 结算配置快照
// ==========================================
// 职责: 一次计算所用配置的物化值
// 存储: 以 JSON 形式写入 statement_run.config_snapshot_json
// ==========================================

use crate::config::settlement_config_trait::SettlementConfigReader;
use serde::{Deserialize, Serialize};
use std::error::Error;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettlementConfig {
    pub money_decimals: u32,
    pub default_consumption_share_percent: f64,
    pub warmwater_consumption_share_percent: f64,
    pub legal_consumption_share_min: f64,
    pub legal_consumption_share_max: f64,
    pub warmwater_reference_temp_c: f64,
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self {
            money_decimals: 2,
            default_consumption_share_percent: 70.0,
            warmwater_consumption_share_percent: 70.0,
            legal_consumption_share_min: 50.0,
            legal_consumption_share_max: 70.0,
            warmwater_reference_temp_c: 10.0,
        }
    }
}

impl SettlementConfig {
    /// 序列化为快照 JSON
    pub fn to_snapshot_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// 从快照 JSON 恢复
    pub fn from_snapshot_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    /// 计量费比例是否落在法定区间内
    pub fn is_within_legal_range(&self, share_percent: f64) -> bool {
        share_percent >= self.legal_consumption_share_min
            && share_percent <= self.legal_consumption_share_max
    }
}

// 固定配置直接作为读取器使用（测试、试算）
impl SettlementConfigReader for SettlementConfig {
    fn get_money_decimals(&self) -> Result<u32, Box<dyn Error>> {
        Ok(self.money_decimals)
    }

    fn get_default_consumption_share_percent(&self) -> Result<f64, Box<dyn Error>> {
        Ok(self.default_consumption_share_percent)
    }

    fn get_warmwater_consumption_share_percent(&self) -> Result<f64, Box<dyn Error>> {
        Ok(self.warmwater_consumption_share_percent)
    }

    fn get_legal_consumption_share_range(&self) -> Result<(f64, f64), Box<dyn Error>> {
        Ok((self.legal_consumption_share_min, self.legal_consumption_share_max))
    }

    fn get_warmwater_reference_temp_c(&self) -> Result<f64, Box<dyn Error>> {
        Ok(self.warmwater_reference_temp_c)
    }

    fn load_settlement_config(&self) -> Result<SettlementConfig, Box<dyn Error>> {
        Ok(self.clone())
    }
}
