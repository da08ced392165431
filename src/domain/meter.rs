// ==========================================
// WEG 运营费用结算 - 表计领域模型
// ==========================================

use crate::domain::types::MeterType;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ==========================================
// Meter - 表计
// ==========================================
// unit_id 为空表示楼栋总表
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Meter {
    pub meter_id: String,
    pub property_id: String,
    pub unit_id: Option<String>,
    pub meter_type: MeterType,
    pub label: Option<String>,
}

// ==========================================
// MeterReading - 表计读数
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeterReading {
    pub meter_id: String,
    pub unit_id: Option<String>, // 冗余自 meter，便于直接归属
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub consumption: f64,
}

impl MeterReading {
    /// 读数区间是否与结算年度有交集
    pub fn overlaps_year(&self, year: i32) -> bool {
        let (Some(year_start), Some(year_end)) = (
            NaiveDate::from_ymd_opt(year, 1, 1),
            NaiveDate::from_ymd_opt(year, 12, 31),
        ) else {
            return false;
        };
        self.period_start <= year_end && self.period_end >= year_start
    }
}
