// ==========================================
// WEG 运营费用结算 - 核心库
// ==========================================
// 技术栈: Rust + SQLite
// 系统定位: 年度运营费用结算 (Betriebskostenabrechnung) 计算核心
// 范围: 基数计算、类别汇总、费用分摊、供暖费用、结算编排
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 计算规则
pub mod engine;

// 配置层 - 结算参数
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一/建表）
pub mod db;

// 日志系统
pub mod logging;

// API 层 - 业务接口
pub mod api;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{
    CategoryKind, CostType, DistributionKey, HeatingSystemType, HotwaterUnitMode, MeterType,
    StatementStatus,
};

// 领域实体
pub use domain::{
    AdvancePayment, CostCategory, DistributionOverride, FuelFactor, HeatingPurchase,
    HeatingSettings, Meter, MeterReading, Property, StatementRow, StatementRun, StatementSummary,
    StatementTotals, Unit, Voucher,
};

// 引擎
pub use engine::{
    BasisCalculator, CategoryAggregator, ComputationWarning, DistributionEngine, EngineError,
    HeatingCostEngine, SettlementRepositories, StatementOrchestrator, StatementResult,
};

// 配置
pub use config::{ConfigManager, SettlementConfig, SettlementConfigReader};

// API
pub use api::{ApiError, StatementApi};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "WEG Betriebskostenabrechnung";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
        assert!(!APP_NAME.is_empty());
    }
}
