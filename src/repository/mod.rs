// ==========================================
// WEG 运营费用结算 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// ==========================================
// 职责: 提供数据访问接口,屏蔽数据库细节
// 约束: 所有查询使用参数化,防止 SQL 注入
// ==========================================

pub mod advance_payment_repo;
pub mod category_repo;
pub mod error;
pub mod heating_repo;
pub mod memory_store;
pub mod meter_repo;
pub mod override_repo;
pub mod ports;
pub mod sql_utils;
pub mod statement_repo;
pub mod unit_repo;
pub mod voucher_repo;

// 重导出核心仓储
pub use advance_payment_repo::AdvancePaymentRepositoryImpl;
pub use category_repo::CategoryRepositoryImpl;
pub use error::{RepositoryError, RepositoryResult};
pub use heating_repo::HeatingRepositoryImpl;
pub use memory_store::InMemorySettlementStore;
pub use meter_repo::MeterRepositoryImpl;
pub use override_repo::OverrideRepositoryImpl;
pub use ports::{
    AdvancePaymentRepository, CategoryRepository, HeatingRepository, MeterRepository,
    OverrideRepository, StatementRepository, UnitRepository, VoucherRepository,
};
pub use statement_repo::StatementRepositoryImpl;
pub use unit_repo::UnitRepositoryImpl;
pub use voucher_repo::VoucherRepositoryImpl;
