// ==========================================
// WEG 运营费用结算 - 领域模型层
// ==========================================
// 职责: 定义领域实体、封闭枚举
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod cost;
pub mod heating;
pub mod meter;
pub mod property;
pub mod statement;
pub mod types;

// 重导出核心类型
pub use cost::{AdvancePayment, CostCategory, DistributionOverride, Voucher};
pub use heating::{FuelFactor, HeatingPurchase, HeatingSettings, FUEL_KIND_KWH};
pub use meter::{Meter, MeterReading};
pub use property::{Property, Unit};
pub use statement::{StatementRow, StatementRun, StatementSummary, StatementTotals};
pub use types::{
    CategoryKind, CostType, DistributionKey, HeatingSystemType, HotwaterUnitMode, MeterType,
    StatementStatus,
};
