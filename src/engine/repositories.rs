// ==========================================
// WEG 运营费用结算 - 引擎层仓储聚合
// ==========================================
// 职责: 聚合结算引擎所需的所有 Repository
// 目标: 引擎只依赖 trait，SQLite 与内存实现可互换
// ==========================================

use std::sync::{Arc, Mutex};

use rusqlite::Connection;

use crate::repository::{
    AdvancePaymentRepository, AdvancePaymentRepositoryImpl, CategoryRepository,
    CategoryRepositoryImpl, HeatingRepository, HeatingRepositoryImpl, InMemorySettlementStore,
    MeterRepository, MeterRepositoryImpl, OverrideRepository, OverrideRepositoryImpl,
    StatementRepository, StatementRepositoryImpl, UnitRepository, UnitRepositoryImpl,
    VoucherRepository, VoucherRepositoryImpl,
};

/// 结算引擎仓储集合
///
/// # 包含的仓储
/// - `unit_repo`: 物业与单元
/// - `category_repo`: 费用类别
/// - `voucher_repo`: 凭证
/// - `meter_repo`: 表计与读数
/// - `heating_repo`: 供暖设置、燃料系数、采购
/// - `override_repo`: 人工覆写
/// - `advance_payment_repo`: 预付款
/// - `statement_repo`: 结算批次与结果
#[derive(Clone)]
pub struct SettlementRepositories {
    pub unit_repo: Arc<dyn UnitRepository>,
    pub category_repo: Arc<dyn CategoryRepository>,
    pub voucher_repo: Arc<dyn VoucherRepository>,
    pub meter_repo: Arc<dyn MeterRepository>,
    pub heating_repo: Arc<dyn HeatingRepository>,
    pub override_repo: Arc<dyn OverrideRepository>,
    pub advance_payment_repo: Arc<dyn AdvancePaymentRepository>,
    pub statement_repo: Arc<dyn StatementRepository>,
}

impl SettlementRepositories {
    /// 基于同一个 SQLite 连接创建全部仓储
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self {
            unit_repo: Arc::new(UnitRepositoryImpl::new(conn.clone())),
            category_repo: Arc::new(CategoryRepositoryImpl::new(conn.clone())),
            voucher_repo: Arc::new(VoucherRepositoryImpl::new(conn.clone())),
            meter_repo: Arc::new(MeterRepositoryImpl::new(conn.clone())),
            heating_repo: Arc::new(HeatingRepositoryImpl::new(conn.clone())),
            override_repo: Arc::new(OverrideRepositoryImpl::new(conn.clone())),
            advance_payment_repo: Arc::new(AdvancePaymentRepositoryImpl::new(conn.clone())),
            statement_repo: Arc::new(StatementRepositoryImpl::new(conn)),
        }
    }

    /// 全部仓储指向同一个内存存储
    pub fn in_memory(store: Arc<InMemorySettlementStore>) -> Self {
        Self {
            unit_repo: store.clone(),
            category_repo: store.clone(),
            voucher_repo: store.clone(),
            meter_repo: store.clone(),
            heating_repo: store.clone(),
            override_repo: store.clone(),
            advance_payment_repo: store.clone(),
            statement_repo: store,
        }
    }
}
