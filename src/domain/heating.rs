// ==========================================
// WEG 运营费用结算 - 供暖领域模型
// ==========================================
// 包含: 供暖设置 / 燃料换算系数 / 燃料采购记录
// ==========================================

use crate::domain::types::{HeatingSystemType, HotwaterUnitMode};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// 直接以 kWh 计量的燃料类型（恒等换算）
pub const FUEL_KIND_KWH: &str = "kwh";

// ==========================================
// HeatingSettings - 供暖设置（每物业一份）
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeatingSettings {
    pub property_id: String,
    pub system_type: HeatingSystemType,
    pub consumption_share_percent: f64, // 采暖计量费比例 (0-100)，使用前钳制
    pub supply_temp_c: f64,             // 热水供水温度 (°C)
    pub hotwater_unit_mode: HotwaterUnitMode,
}

impl HeatingSettings {
    /// 物业未配置供暖设置时使用的默认值
    pub fn default_for(property_id: &str, consumption_share_percent: f64) -> Self {
        Self {
            property_id: property_id.to_string(),
            system_type: HeatingSystemType::HeatingOnly,
            consumption_share_percent,
            supply_temp_c: 60.0,
            hotwater_unit_mode: HotwaterUnitMode::Mwh,
        }
    }
}

// ==========================================
// FuelFactor - 燃料换算系数
// ==========================================
// kWh = amount * calorific_value * state_number
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuelFactor {
    pub kind: String,         // 燃料类型 (如 "m3_H")
    pub calorific_value: f64, // 热值
    pub state_number: f64,    // 状态数 (Zustandszahl)
}

impl FuelFactor {
    pub fn new(kind: &str, calorific_value: f64, state_number: f64) -> Self {
        Self {
            kind: kind.to_string(),
            calorific_value,
            state_number,
        }
    }

    /// 每单位燃料对应的 kWh
    pub fn kwh_per_unit(&self) -> f64 {
        self.calorific_value * self.state_number
    }
}

// ==========================================
// HeatingPurchase - 燃料采购记录（每份结算一条）
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeatingPurchase {
    pub property_id: String,
    pub year: i32,
    pub fuel_input_type: String,          // 燃料类型，对应 FuelFactor.kind
    pub input_amount: f64,                // 燃料数量
    pub unit_price: Decimal,              // 单价
    pub gross_cost: Option<Decimal>,      // 含税总价（缺省时 = 数量 × 单价）
    pub warmwater_meter_id: Option<String>, // 指定的热水表
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
}

impl HeatingPurchase {
    /// 是否为 kWh 直接计量
    pub fn is_kwh_input(&self) -> bool {
        self.fuel_input_type.trim().eq_ignore_ascii_case(FUEL_KIND_KWH)
    }
}
