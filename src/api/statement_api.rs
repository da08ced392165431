// ==========================================
// WEG 运营费用结算 - 结算单 API
// ==========================================
// 职责: 结算计算、草稿重算、定稿、人工覆写、分摊键变更
// 红线: 定稿批次只读；所有输入在进入引擎前校验
// ==========================================

use std::collections::BTreeSet;
use std::sync::Arc;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::api::error::{ApiError, ApiResult};
use crate::config::{ConfigManager, SettlementConfigReader};
use crate::domain::{
    CostCategory, DistributionKey, DistributionOverride, StatementRow, StatementRun,
    StatementSummary, StatementTotals,
};
use crate::engine::{SettlementRepositories, StatementOrchestrator, StatementResult};

/// 可结算年度范围
const MIN_YEAR: i32 = 1990;
const MAX_YEAR: i32 = 2100;

// ==========================================
// 响应 DTO
// ==========================================

/// 重算响应
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecomputeResponse {
    pub run: StatementRun,
    pub result: StatementResult,
}

/// 已持久化的结算单
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredStatement {
    pub run: StatementRun,
    pub rows: Vec<StatementRow>,
    pub summary: Vec<StatementSummary>,
    pub totals: StatementTotals,
}

// ==========================================
// StatementApi - 结算单 API
// ==========================================
pub struct StatementApi<C>
where
    C: SettlementConfigReader,
{
    orchestrator: StatementOrchestrator<C>,
    repos: SettlementRepositories,
}

impl StatementApi<ConfigManager> {
    /// 打开 SQLite 数据库并装配全部依赖
    pub fn open(db_path: &str) -> ApiResult<Self> {
        let conn = crate::db::open_shared_connection(db_path)
            .map_err(|e| ApiError::DatabaseError(e.to_string()))?;
        let config = ConfigManager::from_connection(conn.clone())
            .map_err(|e| ApiError::InternalError(e.to_string()))?;
        let repos = SettlementRepositories::from_connection(conn);
        Ok(Self::new(Arc::new(config), repos))
    }
}

impl<C> StatementApi<C>
where
    C: SettlementConfigReader,
{
    pub fn new(config: Arc<C>, repos: SettlementRepositories) -> Self {
        Self {
            orchestrator: StatementOrchestrator::new(config, repos.clone()),
            repos,
        }
    }

    /// 计算结算单（不持久化）
    pub fn build_statement(&self, property_id: &str, year: i32) -> ApiResult<StatementResult> {
        validate_property_year(property_id, year)?;
        Ok(self.orchestrator.build_statement(property_id, year)?)
    }

    /// 重算并保存为草稿
    pub fn recompute_statement(&self, property_id: &str, year: i32) -> ApiResult<RecomputeResponse> {
        validate_property_year(property_id, year)?;
        let (run, result) = self.orchestrator.recompute_statement(property_id, year)?;
        Ok(RecomputeResponse { run, result })
    }

    /// 定稿
    pub fn finalize_statement(&self, run_id: &str) -> ApiResult<StatementRun> {
        validate_not_empty("run_id", run_id)?;
        Ok(self.orchestrator.finalize_statement(run_id)?)
    }

    /// 读取已保存的结算单
    pub fn get_statement(&self, run_id: &str) -> ApiResult<StoredStatement> {
        validate_not_empty("run_id", run_id)?;
        let run = self.require_run(run_id)?;
        let rows = self.repos.statement_repo.list_rows(run_id)?;
        let summary = self.repos.statement_repo.list_summary(run_id)?;

        let category_count = rows
            .iter()
            .filter_map(|r| r.category_id.as_deref())
            .collect::<BTreeSet<_>>()
            .len();
        let totals = StatementTotals {
            total_costs: summary.iter().map(|s| s.total_costs).sum(),
            total_advance_payments: summary.iter().map(|s| s.advance_payments).sum(),
            total_balance: summary.iter().map(|s| s.balance).sum(),
            unit_count: summary.len(),
            category_count,
        };

        Ok(StoredStatement {
            run,
            rows,
            summary,
            totals,
        })
    }

    /// 设置或删除人工覆写
    ///
    /// # 参数
    /// - amount: Some(金额) 设置；None 删除（恢复自动分摊）
    ///
    /// # 返回
    /// - Ok(true): 覆写已写入或已删除
    /// - Ok(false): 删除时覆写本不存在
    pub fn set_override(
        &self,
        run_id: &str,
        category_id: &str,
        unit_id: &str,
        amount: Option<Decimal>,
    ) -> ApiResult<bool> {
        validate_not_empty("run_id", run_id)?;
        validate_not_empty("category_id", category_id)?;
        validate_not_empty("unit_id", unit_id)?;

        let run = self.require_run(run_id)?;
        if run.is_finalized() {
            return Err(ApiError::StatementFinalized(run_id.to_string()));
        }

        let category = self.require_category(category_id)?;
        if category.property_id != run.property_id {
            return Err(ApiError::InvalidInput(format!(
                "类别{}不属于物业{}",
                category_id, run.property_id
            )));
        }
        let units = self.repos.unit_repo.list_units(&run.property_id)?;
        if !units.iter().any(|u| u.unit_id == unit_id) {
            return Err(ApiError::InvalidInput(format!(
                "单元{}不属于物业{}",
                unit_id, run.property_id
            )));
        }

        match amount {
            Some(value) => {
                if value < Decimal::ZERO {
                    return Err(ApiError::InvalidInput(format!(
                        "覆写金额不能为负: {}",
                        value
                    )));
                }
                self.repos.override_repo.upsert_override(&DistributionOverride {
                    run_id: run_id.to_string(),
                    category_id: category_id.to_string(),
                    unit_id: unit_id.to_string(),
                    manual_amount_gross: value,
                })?;
                info!(run_id, category_id, unit_id, amount = %value, "覆写已设置");
                Ok(true)
            }
            None => {
                let removed = self
                    .repos
                    .override_repo
                    .delete_override(run_id, category_id, unit_id)?;
                info!(run_id, category_id, unit_id, removed, "覆写已删除");
                Ok(removed)
            }
        }
    }

    /// 变更类别分摊键
    ///
    /// 接受德文标签（如 "Wohnfläche"）或 snake_case 标识（如 "living_area"）。
    pub fn change_distribution_key(&self, category_id: &str, key: &str) -> ApiResult<CostCategory> {
        validate_not_empty("category_id", category_id)?;
        let parsed = DistributionKey::parse(key)
            .ok_or_else(|| ApiError::InvalidInput(format!("未知的分摊键: {}", key)))?;

        let before = self.require_category(category_id)?;
        self.repos
            .category_repo
            .update_distribution_key(category_id, parsed)?;
        info!(
            category_id,
            from = %before.distribution_key,
            to = %parsed,
            "分摊键已变更"
        );
        self.require_category(category_id)
    }

    fn require_run(&self, run_id: &str) -> ApiResult<StatementRun> {
        self.repos
            .statement_repo
            .find_run(run_id)?
            .ok_or_else(|| ApiError::NotFound(format!("结算批次(id={})不存在", run_id)))
    }

    fn require_category(&self, category_id: &str) -> ApiResult<CostCategory> {
        self.repos
            .category_repo
            .find_category(category_id)?
            .ok_or_else(|| ApiError::NotFound(format!("费用类别(id={})不存在", category_id)))
    }
}

fn validate_not_empty(field: &str, value: &str) -> ApiResult<()> {
    if value.trim().is_empty() {
        return Err(ApiError::InvalidInput(format!("{}不能为空", field)));
    }
    Ok(())
}

fn validate_property_year(property_id: &str, year: i32) -> ApiResult<()> {
    validate_not_empty("property_id", property_id)?;
    if !(MIN_YEAR..=MAX_YEAR).contains(&year) {
        return Err(ApiError::InvalidInput(format!(
            "结算年度超出范围 [{}, {}]: {}",
            MIN_YEAR, MAX_YEAR, year
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SettlementConfig;
    use crate::domain::{CategoryKind, Unit, Voucher};
    use crate::repository::InMemorySettlementStore;
    use rust_decimal_macros::dec;

    fn api() -> StatementApi<SettlementConfig> {
        let store = Arc::new(InMemorySettlementStore::new());
        store.add_property("P1", "Am Markt 3");
        store.add_property("P2", "Bahnhofstraße 9");
        store.add_unit(Unit::new("U1", "P1", 70.0, 500.0, 2.0));
        store.add_unit(Unit::new("U2", "P1", 30.0, 500.0, 1.0));
        store.add_category(CostCategory {
            category_id: "C1".to_string(),
            property_id: "P1".to_string(),
            name: "Müllabfuhr".to_string(),
            kind: CategoryKind::Operating,
            distribution_key: DistributionKey::PersonCount,
            raw_distribution_key: None,
        });
        store.add_category(CostCategory {
            category_id: "C9".to_string(),
            property_id: "P2".to_string(),
            name: "Aufzug".to_string(),
            kind: CategoryKind::Operating,
            distribution_key: DistributionKey::UnitCount,
            raw_distribution_key: None,
        });
        store.add_voucher(Voucher {
            voucher_id: "V1".to_string(),
            property_id: "P1".to_string(),
            category_id: "C1".to_string(),
            year: 2024,
            gross_amount: dec!(300.00),
            include_in_statement: true,
            description: None,
        });
        StatementApi::new(
            Arc::new(SettlementConfig::default()),
            SettlementRepositories::in_memory(store),
        )
    }

    #[test]
    fn test_invalid_inputs_rejected() {
        let api = api();
        assert!(matches!(api.build_statement("", 2024), Err(ApiError::InvalidInput(_))));
        assert!(matches!(api.build_statement("P1", 1800), Err(ApiError::InvalidInput(_))));
        assert!(matches!(api.build_statement("P404", 2024), Err(ApiError::NotFound(_))));
        assert!(matches!(
            api.change_distribution_key("C1", "nach Gefühl"),
            Err(ApiError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_override_roundtrip_via_api() {
        let api = api();
        let run_id = api.recompute_statement("P1", 2024).unwrap().run.run_id;

        assert!(matches!(
            api.set_override(&run_id, "C1", "U1", Some(dec!(-1))),
            Err(ApiError::InvalidInput(_))
        ));
        assert!(matches!(
            api.set_override(&run_id, "C9", "U1", Some(dec!(10))),
            Err(ApiError::InvalidInput(_))
        ));
        assert!(matches!(
            api.set_override(&run_id, "C1", "U7", Some(dec!(10))),
            Err(ApiError::InvalidInput(_))
        ));

        assert!(api.set_override(&run_id, "C1", "U2", Some(dec!(50.00))).unwrap());
        let with_override = api.recompute_statement("P1", 2024).unwrap().result;
        let amounts: Vec<Decimal> = with_override.rows.iter().map(|r| r.amount_gross).collect();
        assert_eq!(amounts, vec![dec!(250.00), dec!(50.00)]);

        assert!(api.set_override(&run_id, "C1", "U2", None).unwrap());
        assert!(!api.set_override(&run_id, "C1", "U2", None).unwrap());
        let restored = api.recompute_statement("P1", 2024).unwrap().result;
        let amounts: Vec<Decimal> = restored.rows.iter().map(|r| r.amount_gross).collect();
        assert_eq!(amounts, vec![dec!(200.00), dec!(100.00)]);
    }

    #[test]
    fn test_finalized_statement_is_read_only() {
        let api = api();
        let run_id = api.recompute_statement("P1", 2024).unwrap().run.run_id;
        api.finalize_statement(&run_id).unwrap();

        assert!(matches!(
            api.recompute_statement("P1", 2024),
            Err(ApiError::StatementFinalized(_))
        ));
        assert!(matches!(
            api.set_override(&run_id, "C1", "U1", Some(dec!(10))),
            Err(ApiError::StatementFinalized(_))
        ));

        let stored = api.get_statement(&run_id).unwrap();
        assert!(stored.run.is_finalized());
        assert_eq!(stored.totals.total_costs, dec!(300.00));
        assert_eq!(stored.totals.category_count, 1);
    }

    #[test]
    fn test_change_distribution_key_accepts_german_label() {
        let api = api();
        let updated = api.change_distribution_key("C1", "Wohnfläche").unwrap();
        assert_eq!(updated.distribution_key, DistributionKey::LivingArea);

        let result = api.build_statement("P1", 2024).unwrap();
        let amounts: Vec<Decimal> = result.rows.iter().map(|r| r.amount_gross).collect();
        assert_eq!(amounts, vec![dec!(210.00), dec!(90.00)]);
    }
}
