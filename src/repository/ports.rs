// ==========================================
// WEG 运营费用结算 - 仓储接口 (Ports)
// ==========================================
// 职责: 定义计算核心所需的数据访问接口（不包含实现）
// 红线: Repository 不含业务规则，只做数据读写
// 实现者: *RepositoryImpl（rusqlite）/ InMemorySettlementStore（单元测试）
// ==========================================

use crate::domain::{
    AdvancePayment, CostCategory, DistributionKey, DistributionOverride, FuelFactor,
    HeatingPurchase, HeatingSettings, Meter, MeterReading, Property, StatementRow, StatementRun,
    StatementStatus, StatementSummary, Unit, Voucher,
};
use crate::repository::error::RepositoryResult;

// ==========================================
// UnitRepository - 物业与单元
// ==========================================
pub trait UnitRepository: Send + Sync {
    /// 查询物业
    fn find_property(&self, property_id: &str) -> RepositoryResult<Option<Property>>;

    /// 查询物业下的全部单元（按 unit_id 排序）
    fn list_units(&self, property_id: &str) -> RepositoryResult<Vec<Unit>>;
}

// ==========================================
// CategoryRepository - 费用类别
// ==========================================
pub trait CategoryRepository: Send + Sync {
    /// 查询物业下的全部费用类别（按 category_id 排序）
    fn list_categories(&self, property_id: &str) -> RepositoryResult<Vec<CostCategory>>;

    fn find_category(&self, category_id: &str) -> RepositoryResult<Option<CostCategory>>;

    /// 显式变更分摊键
    fn update_distribution_key(
        &self,
        category_id: &str,
        key: DistributionKey,
    ) -> RepositoryResult<()>;
}

// ==========================================
// VoucherRepository - 凭证
// ==========================================
pub trait VoucherRepository: Send + Sync {
    /// 查询某类别某年度的全部凭证（含未计入结算的凭证）
    fn list_vouchers(
        &self,
        property_id: &str,
        category_id: &str,
        year: i32,
    ) -> RepositoryResult<Vec<Voucher>>;
}

// ==========================================
// MeterRepository - 表计与读数
// ==========================================
pub trait MeterRepository: Send + Sync {
    fn list_meters(&self, property_id: &str) -> RepositoryResult<Vec<Meter>>;

    /// 查询与结算年度有交集的读数
    fn list_readings_for_year(
        &self,
        property_id: &str,
        year: i32,
    ) -> RepositoryResult<Vec<MeterReading>>;
}

// ==========================================
// HeatingRepository - 供暖设置 / 燃料系数 / 采购
// ==========================================
pub trait HeatingRepository: Send + Sync {
    fn find_settings(&self, property_id: &str) -> RepositoryResult<Option<HeatingSettings>>;

    fn list_fuel_factors(&self) -> RepositoryResult<Vec<FuelFactor>>;

    fn find_purchase(&self, property_id: &str, year: i32)
        -> RepositoryResult<Option<HeatingPurchase>>;
}

// ==========================================
// OverrideRepository - 人工分摊覆写
// ==========================================
pub trait OverrideRepository: Send + Sync {
    fn list_overrides(&self, run_id: &str) -> RepositoryResult<Vec<DistributionOverride>>;

    /// 新增或覆盖（幂等）
    fn upsert_override(&self, item: &DistributionOverride) -> RepositoryResult<()>;

    /// 删除覆写，返回是否存在
    fn delete_override(&self, run_id: &str, category_id: &str, unit_id: &str)
        -> RepositoryResult<bool>;
}

// ==========================================
// AdvancePaymentRepository - 预付款
// ==========================================
pub trait AdvancePaymentRepository: Send + Sync {
    fn list_advance_payments(
        &self,
        property_id: &str,
        year: i32,
    ) -> RepositoryResult<Vec<AdvancePayment>>;
}

// ==========================================
// StatementRepository - 结算批次与结果
// ==========================================
pub trait StatementRepository: Send + Sync {
    fn find_run(&self, run_id: &str) -> RepositoryResult<Option<StatementRun>>;

    fn find_run_by_property_year(
        &self,
        property_id: &str,
        year: i32,
    ) -> RepositoryResult<Option<StatementRun>>;

    fn create_run(&self, run: &StatementRun) -> RepositoryResult<()>;

    /// 整体替换结算结果（先删后插，必须在同一事务内完成）
    fn replace_statement(
        &self,
        run_id: &str,
        rows: &[StatementRow],
        summary: &[StatementSummary],
        config_snapshot_json: Option<&str>,
    ) -> RepositoryResult<()>;

    /// 更新批次状态（不触碰结果行）
    fn update_status(&self, run_id: &str, status: StatementStatus) -> RepositoryResult<()>;

    fn list_rows(&self, run_id: &str) -> RepositoryResult<Vec<StatementRow>>;

    fn list_summary(&self, run_id: &str) -> RepositoryResult<Vec<StatementSummary>>;
}
