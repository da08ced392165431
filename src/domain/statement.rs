// ==========================================
// WEG 运营费用结算 - 结算单领域模型
// ==========================================
// 红线: 结算批次定稿后不可再重算
// ==========================================

use crate::domain::types::{CostType, DistributionKey, StatementStatus};
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// ==========================================
// StatementRun - 结算批次
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatementRun {
    pub run_id: String,
    pub property_id: String,
    pub year: i32,
    pub status: StatementStatus,
    pub config_snapshot_json: Option<String>, // 计算时的配置快照
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    pub finalized_at: Option<NaiveDateTime>,
}

impl StatementRun {
    pub fn is_draft(&self) -> bool {
        self.status == StatementStatus::Draft
    }

    pub fn is_finalized(&self) -> bool {
        self.status == StatementStatus::Finalized
    }
}

// ==========================================
// StatementRow - 结算明细行（每单元每费用项一行）
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatementRow {
    pub unit_id: String,
    pub category_id: Option<String>, // 供暖四项无类别
    pub cost_type: CostType,
    pub label: String,
    pub distribution_key: Option<DistributionKey>,
    pub basis_value: f64,
    pub share_percent: f64,
    pub amount_gross: Decimal,
    pub overridden: bool,
}

// ==========================================
// StatementSummary - 单元汇总
// ==========================================
// balance > 0: 需补缴; balance < 0: 退款
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatementSummary {
    pub unit_id: String,
    pub total_costs: Decimal,
    pub advance_payments: Decimal,
    pub balance: Decimal,
}

// ==========================================
// StatementTotals - 结算合计
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatementTotals {
    pub total_costs: Decimal,
    pub total_advance_payments: Decimal,
    pub total_balance: Decimal,
    pub unit_count: usize,
    pub category_count: usize,
}
