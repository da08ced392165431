// ==========================================
// WEG 运营费用结算 - 费用领域模型
// ==========================================
// 包含: 费用类别 / 凭证 / 人工分摊覆写 / 预付款
// ==========================================

use crate::domain::types::{CategoryKind, DistributionKey};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// ==========================================
// CostCategory - 费用类别
// ==========================================
// 分摊键只能通过显式的变更操作修改
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostCategory {
    pub category_id: String,               // 类别ID
    pub property_id: String,               // 所属物业
    pub name: String,                      // 类别名称 (如 "Grundsteuer")
    pub kind: CategoryKind,                // 普通 / 供暖
    pub distribution_key: DistributionKey, // 分摊键
    pub raw_distribution_key: Option<String>, // 无法识别时保留的原始键值
}

impl CostCategory {
    pub fn is_heating(&self) -> bool {
        self.kind == CategoryKind::Heating
    }
}

// ==========================================
// Voucher - 凭证
// ==========================================
// 红线: include_in_statement = false 的凭证保留但永不计入
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Voucher {
    pub voucher_id: String,         // 凭证ID
    pub property_id: String,        // 所属物业
    pub category_id: String,        // 费用类别
    pub year: i32,                  // 结算年度
    pub gross_amount: Decimal,      // 含税金额
    pub include_in_statement: bool, // 是否计入结算
    pub description: Option<String>,
}

// ==========================================
// DistributionOverride - 人工分摊覆写
// ==========================================
// 覆写后该单元在该类别的金额固定，剩余金额在其余单元间自动分摊
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributionOverride {
    pub run_id: String,               // 结算批次ID
    pub category_id: String,          // 费用类别
    pub unit_id: String,              // 单元
    pub manual_amount_gross: Decimal, // 固定金额
}

// ==========================================
// AdvancePayment - 预付款
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvancePayment {
    pub unit_id: String,
    pub year: i32,
    pub amount: Decimal,
}
