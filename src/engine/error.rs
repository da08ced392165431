// ==========================================
// WEG 运营费用结算 - 引擎错误与降级告警
// ==========================================
// 工具: thiserror 派生宏
// ==========================================
// 原则:
// - 只有缺少燃料系数、批次已定稿两类情况向用户报错
// - 其余数据问题一律降级为 ComputationWarning，结算照常产出
// ==========================================

use crate::repository::error::RepositoryError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// 引擎错误类型
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("缺少燃料换算系数: {fuel_kind}")]
    MissingFactor { fuel_kind: String },

    #[error("结算批次已定稿，禁止重算: {run_id}")]
    StatementAlreadyFinalized { run_id: String },

    #[error("物业不存在: {0}")]
    PropertyNotFound(String),

    #[error("结算批次不存在: {0}")]
    RunNotFound(String),

    #[error("配置读取失败: {0}")]
    Config(String),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

pub type EngineResult<T> = Result<T, EngineError>;

// ==========================================
// ComputationWarning - 计算降级告警
// ==========================================
// 随结算结果一起返回，code() 为稳定标识
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum ComputationWarning {
    /// 分摊键无法识别，按"单独指定"处理（基数全为 0）
    BasisUnavailable {
        category_id: String,
        raw_key: String,
    },
    /// 覆写金额合计超过类别总额，自动分摊部分归零
    OverrideTotalExceedsCategory {
        category_id: String,
        override_sum: Decimal,
        category_total: Decimal,
    },
    /// 类别总额为负（仅有贷记凭证），自动分摊部分按 0 处理
    NegativeCategoryTotal {
        category_id: String,
        category_total: Decimal,
    },
    /// 基数合计为 0，改为平均分摊
    EqualSplitFallback { scope: String, unit_count: usize },
    /// 缺少燃料系数，供暖费用未计算
    MissingFactor { fuel_kind: String },
    /// 存在供暖类别但无燃料采购记录，按类别分摊键处理
    HeatingPurchaseMissing { property_id: String, year: i32 },
    /// 计量费比例超出 [0, 100]，已钳制
    ConsumptionShareClamped { configured: f64, applied: f64 },
    /// 计量费比例不在法定区间内
    ConsumptionShareOutsideLegalRange { share: f64, min: f64, max: f64 },
    /// 覆写指向不存在的单元，已忽略
    OrphanOverride { category_id: String, unit_id: String },
}

impl ComputationWarning {
    /// 稳定的告警标识
    pub fn code(&self) -> &'static str {
        match self {
            ComputationWarning::BasisUnavailable { .. } => "basis_unavailable",
            ComputationWarning::OverrideTotalExceedsCategory { .. } => {
                "override_total_exceeds_category"
            }
            ComputationWarning::NegativeCategoryTotal { .. } => "negative_category_total",
            ComputationWarning::EqualSplitFallback { .. } => "equal_split_fallback",
            ComputationWarning::MissingFactor { .. } => "missing_factor",
            ComputationWarning::HeatingPurchaseMissing { .. } => "heating_purchase_missing",
            ComputationWarning::ConsumptionShareClamped { .. } => "consumption_share_clamped",
            ComputationWarning::ConsumptionShareOutsideLegalRange { .. } => {
                "consumption_share_outside_legal_range"
            }
            ComputationWarning::OrphanOverride { .. } => "orphan_override",
        }
    }

    /// 是否属于需要用户处理的失败（该部分结果缺失）
    pub fn is_failure(&self) -> bool {
        matches!(self, ComputationWarning::MissingFactor { .. })
    }
}

impl fmt::Display for ComputationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComputationWarning::BasisUnavailable { category_id, raw_key } => {
                write!(f, "类别 {} 的分摊键 '{}' 无法识别，按单独指定处理", category_id, raw_key)
            }
            ComputationWarning::OverrideTotalExceedsCategory {
                category_id,
                override_sum,
                category_total,
            } => write!(
                f,
                "类别 {} 覆写合计 {} 超过类别总额 {}",
                category_id, override_sum, category_total
            ),
            ComputationWarning::NegativeCategoryTotal {
                category_id,
                category_total,
            } => write!(
                f,
                "类别 {} 总额为负 ({})，自动分摊部分按 0 处理",
                category_id, category_total
            ),
            ComputationWarning::EqualSplitFallback { scope, unit_count } => {
                write!(f, "{} 基数合计为 0，平均分摊到 {} 个单元", scope, unit_count)
            }
            ComputationWarning::MissingFactor { fuel_kind } => {
                write!(f, "缺少燃料 {} 的换算系数，供暖费用未计算", fuel_kind)
            }
            ComputationWarning::HeatingPurchaseMissing { property_id, year } => write!(
                f,
                "物业 {} 年度 {} 无燃料采购记录，供暖类别按分摊键处理",
                property_id, year
            ),
            ComputationWarning::ConsumptionShareClamped { configured, applied } => {
                write!(f, "计量费比例 {} 超出范围，已钳制为 {}", configured, applied)
            }
            ComputationWarning::ConsumptionShareOutsideLegalRange { share, min, max } => {
                write!(f, "计量费比例 {} 不在法定区间 [{}, {}] 内", share, min, max)
            }
            ComputationWarning::OrphanOverride { category_id, unit_id } => {
                write!(f, "类别 {} 的覆写指向未知单元 {}，已忽略", category_id, unit_id)
            }
        }
    }
}
