// ==========================================
// WEG 运营费用结算 - 物业与单元领域模型
// ==========================================
// 红线: 单元为只读参考数据，计算核心不得修改
// ==========================================

use serde::{Deserialize, Serialize};

// ==========================================
// Property - 物业 (WEG)
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Property {
    pub property_id: String, // 物业ID
    pub name: String,        // 物业名称
}

// ==========================================
// Unit - 单元
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Unit {
    pub unit_id: String,      // 单元ID
    pub property_id: String,  // 所属物业
    pub name: String,         // 单元名称 (如 "WE 01")
    pub area_m2: f64,         // 居住面积 (m²)
    pub ownership_share: f64, // 共有份额 MEA (‰)
    pub person_count: f64,    // 人数 (可为年均小数)
}

impl Unit {
    /// 构造单元（测试与种子数据常用）
    pub fn new(unit_id: &str, property_id: &str, area_m2: f64, ownership_share: f64, person_count: f64) -> Self {
        Self {
            unit_id: unit_id.to_string(),
            property_id: property_id.to_string(),
            name: unit_id.to_string(),
            area_m2,
            ownership_share,
            person_count,
        }
    }
}
