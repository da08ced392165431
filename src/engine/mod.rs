// ==========================================
// WEG 运营费用结算 - 引擎层
// ==========================================
// 职责: 实现分摊与供暖计算规则,不拼 SQL
// 红线: Engine 只依赖仓储 trait；数据问题降级为告警，不中断结算
// ==========================================

pub mod aggregator;
pub mod basis;
pub mod distribution;
pub mod error;
pub mod heating;
pub mod orchestrator;
pub mod repositories;
pub mod rounding;

// 重导出核心引擎
pub use aggregator::CategoryAggregator;
pub use basis::{BasisCalculator, BasisResult, BasisRow, BasisSnapshot};
pub use distribution::{DistributionEngine, DistributionResult, DistributionRow};
pub use error::{ComputationWarning, EngineError, EngineResult};
pub use heating::{
    HeatingCostEngine, HeatingResult, HeatingTotals, HeatingUnitCost, HeatingUnitInput,
};
pub use orchestrator::{StatementOrchestrator, StatementResult};
pub use repositories::SettlementRepositories;
pub use rounding::round_money;
