// ==========================================
// WEG 运营费用结算 - 结算编排器
// ==========================================
// 用途: 协调基数、汇总、分摊、供暖四个引擎，产出结算单
// ==========================================
// 主流程:
// 1. 物化输入（单元、表计、读数、类别、采购、覆写、预付款）
// 2. 普通类别: 基数 → 汇总 → 分摊，每单元一行
// 3. 供暖: 供暖类别凭证并入燃料费用，调用一次供暖引擎，每单元四行，并按分项对账
//    缺少燃料系数时供暖类别退回按自身分摊键分摊
// 4. 按单元汇总费用，扣除预付款得出余额
// 5. 重算时整体替换草稿批次；定稿批次拒绝重算
// ==========================================

use crate::config::{SettlementConfig, SettlementConfigReader};
use crate::domain::{
    CostCategory, CostType, DistributionKey, HeatingPurchase, HeatingSettings, MeterType,
    StatementRow, StatementRun, StatementStatus, StatementSummary, StatementTotals,
};
use crate::engine::aggregator::CategoryAggregator;
use crate::engine::basis::{BasisCalculator, BasisSnapshot};
use crate::engine::distribution::DistributionEngine;
use crate::engine::error::{ComputationWarning, EngineError, EngineResult};
use crate::engine::heating::{HeatingCostEngine, HeatingResult, HeatingUnitCost, HeatingUnitInput};
use crate::engine::repositories::SettlementRepositories;
use crate::engine::rounding::{reconcile_at, round_money};
use crate::repository::RepositoryError;
use chrono::Local;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

// ==========================================
// StatementResult - 结算结果
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatementResult {
    pub property_id: String,
    pub year: i32,
    pub rows: Vec<StatementRow>, // 类别行（按类别、单元排序）在前，供暖行在后
    pub summary: Vec<StatementSummary>,
    pub totals: StatementTotals,
    pub heating: Option<HeatingResult>,
    pub warnings: Vec<ComputationWarning>,
    pub config: SettlementConfig,
}

impl StatementResult {
    /// 是否存在需要用户处理的失败
    pub fn has_failures(&self) -> bool {
        self.warnings.iter().any(ComputationWarning::is_failure)
    }

    /// 某类别的明细行
    pub fn rows_for_category(&self, category_id: &str) -> Vec<&StatementRow> {
        self.rows
            .iter()
            .filter(|r| r.category_id.as_deref() == Some(category_id))
            .collect()
    }
}

// ==========================================
// StatementOrchestrator - 结算编排器
// ==========================================
pub struct StatementOrchestrator<C>
where
    C: SettlementConfigReader,
{
    config: Arc<C>,
    repos: SettlementRepositories,
}

impl<C> StatementOrchestrator<C>
where
    C: SettlementConfigReader,
{
    /// 创建新的编排器实例
    ///
    /// # 参数
    /// - config: 配置读取器
    /// - repos: 仓储集合
    pub fn new(config: Arc<C>, repos: SettlementRepositories) -> Self {
        Self { config, repos }
    }

    pub fn repositories(&self) -> &SettlementRepositories {
        &self.repos
    }

    fn load_config(&self) -> EngineResult<SettlementConfig> {
        self.config
            .load_settlement_config()
            .map_err(|e| EngineError::Config(e.to_string()))
    }

    /// 计算结算单（不持久化）
    pub fn build_statement(&self, property_id: &str, year: i32) -> EngineResult<StatementResult> {
        let config = self.load_config()?;
        info!(property_id, year, "开始计算结算单");

        // ==========================================
        // 步骤1: 物化输入
        // ==========================================
        let calculator = BasisCalculator::new(
            self.repos.unit_repo.clone(),
            self.repos.meter_repo.clone(),
        );
        let snapshot = calculator.load_snapshot(property_id, year)?;

        let mut categories = self.repos.category_repo.list_categories(property_id)?;
        categories.sort_by(|a, b| a.category_id.cmp(&b.category_id));

        let purchase = self.repos.heating_repo.find_purchase(property_id, year)?;
        let overrides = self.load_overrides(property_id, year)?;

        debug!(
            unit_count = snapshot.units.len(),
            category_count = categories.len(),
            has_purchase = purchase.is_some(),
            "输入物化完成"
        );

        let mut rows: Vec<StatementRow> = Vec::new();
        let mut warnings: Vec<ComputationWarning> = Vec::new();

        if purchase.is_none() && categories.iter().any(CostCategory::is_heating) {
            warn!(property_id, year, "存在供暖类别但无燃料采购记录，按分摊键处理");
            warnings.push(ComputationWarning::HeatingPurchaseMissing {
                property_id: property_id.to_string(),
                year,
            });
        }

        let aggregator = CategoryAggregator::new(self.repos.voucher_repo.clone());

        // ==========================================
        // 步骤2: 供暖费用（供暖类别凭证并入）
        // ==========================================
        let mut heating_rows: Vec<StatementRow> = Vec::new();
        let heating = match &purchase {
            Some(purchase) => {
                let mut heating_category_cost = Decimal::ZERO;
                for category in categories.iter().filter(|c| c.is_heating()) {
                    heating_category_cost +=
                        aggregator.sum_category(property_id, &category.category_id, year)?;
                }
                self.compute_heating_rows(
                    purchase,
                    heating_category_cost,
                    &snapshot,
                    &config,
                    &mut heating_rows,
                    &mut warnings,
                )?
            }
            None => None,
        };

        // ==========================================
        // 步骤3: 普通类别分摊
        // ==========================================
        let distribution = DistributionEngine::new(config.money_decimals);
        let no_overrides = HashMap::new();

        for category in &categories {
            if category.is_heating() && heating.is_some() {
                debug!(category_id = %category.category_id, "供暖类别已并入供暖费用");
                continue;
            }

            let (basis, basis_warning) = BasisCalculator::basis_for_category(&snapshot, category);
            warnings.extend(basis_warning);

            let total = aggregator.sum_category(property_id, &category.category_id, year)?;
            let category_overrides = overrides
                .get(&category.category_id)
                .unwrap_or(&no_overrides);
            let result = distribution.distribute(total, &basis.rows, category_overrides);

            if result.negative_total {
                warnings.push(ComputationWarning::NegativeCategoryTotal {
                    category_id: category.category_id.clone(),
                    category_total: total,
                });
            }
            if result.override_overflow {
                warnings.push(ComputationWarning::OverrideTotalExceedsCategory {
                    category_id: category.category_id.clone(),
                    override_sum: result.override_sum,
                    category_total: total,
                });
            }
            if result.equal_split_applied && !total.is_zero() {
                warn!(
                    category_id = %category.category_id,
                    unit_count = result.rows.len(),
                    "基数合计为 0，平均分摊"
                );
                warnings.push(ComputationWarning::EqualSplitFallback {
                    scope: category.category_id.clone(),
                    unit_count: result.rows.len(),
                });
            }
            for unit_id in &result.orphan_override_units {
                warn!(category_id = %category.category_id, unit_id = %unit_id, "覆写指向未知单元，已忽略");
                warnings.push(ComputationWarning::OrphanOverride {
                    category_id: category.category_id.clone(),
                    unit_id: unit_id.clone(),
                });
            }

            rows.extend(result.rows.into_iter().map(|r| StatementRow {
                unit_id: r.unit_id,
                category_id: Some(category.category_id.clone()),
                cost_type: CostType::Operating,
                label: category.name.clone(),
                distribution_key: Some(category.distribution_key),
                basis_value: r.basis_value,
                share_percent: r.share_percent,
                amount_gross: r.amount_gross,
                overridden: r.overridden,
            }));
        }

        rows.extend(heating_rows);

        // ==========================================
        // 步骤4: 单元汇总与预付款
        // ==========================================
        let advance_payments = self
            .repos
            .advance_payment_repo
            .list_advance_payments(property_id, year)?;

        let mut summary: Vec<StatementSummary> = snapshot
            .units
            .iter()
            .map(|unit| {
                let total_costs: Decimal = rows
                    .iter()
                    .filter(|r| r.unit_id == unit.unit_id)
                    .map(|r| r.amount_gross)
                    .sum();
                let advance: Decimal = advance_payments
                    .iter()
                    .filter(|a| a.unit_id == unit.unit_id && a.year == year)
                    .map(|a| a.amount)
                    .sum();
                let total_costs = round_money(total_costs, config.money_decimals);
                let advance = round_money(advance, config.money_decimals);
                StatementSummary {
                    unit_id: unit.unit_id.clone(),
                    total_costs,
                    advance_payments: advance,
                    balance: total_costs - advance,
                }
            })
            .collect();
        summary.sort_by(|a, b| a.unit_id.cmp(&b.unit_id));

        let totals = StatementTotals {
            total_costs: summary.iter().map(|s| s.total_costs).sum(),
            total_advance_payments: summary.iter().map(|s| s.advance_payments).sum(),
            total_balance: summary.iter().map(|s| s.balance).sum(),
            unit_count: summary.len(),
            category_count: categories.len(),
        };

        info!(
            property_id,
            year,
            row_count = rows.len(),
            total_costs = %totals.total_costs,
            warning_count = warnings.len(),
            "结算单计算完成"
        );

        Ok(StatementResult {
            property_id: property_id.to_string(),
            year,
            rows,
            summary,
            totals,
            heating,
            warnings,
            config,
        })
    }

    /// 重算并持久化为草稿批次
    ///
    /// 首次调用创建批次；之后整体替换同一草稿批次的结果。
    ///
    /// # 错误
    /// - EngineError::StatementAlreadyFinalized: 批次已定稿
    pub fn recompute_statement(
        &self,
        property_id: &str,
        year: i32,
    ) -> EngineResult<(StatementRun, StatementResult)> {
        let existing = self
            .repos
            .statement_repo
            .find_run_by_property_year(property_id, year)?;
        if let Some(run) = &existing {
            if run.is_finalized() {
                warn!(run_id = %run.run_id, "批次已定稿，拒绝重算");
                return Err(EngineError::StatementAlreadyFinalized {
                    run_id: run.run_id.clone(),
                });
            }
        }

        let result = self.build_statement(property_id, year)?;

        let run_id = match existing {
            Some(run) => run.run_id,
            None => {
                let now = Local::now().naive_local();
                let run = StatementRun {
                    run_id: Uuid::new_v4().to_string(),
                    property_id: property_id.to_string(),
                    year,
                    status: StatementStatus::Draft,
                    config_snapshot_json: None,
                    created_at: now,
                    updated_at: now,
                    finalized_at: None,
                };
                self.repos.statement_repo.create_run(&run)?;
                info!(run_id = %run.run_id, property_id, year, "创建结算批次");
                run.run_id
            }
        };

        let snapshot_json = result
            .config
            .to_snapshot_json()
            .map_err(|e| EngineError::Config(e.to_string()))?;

        self.repos
            .statement_repo
            .replace_statement(&run_id, &result.rows, &result.summary, Some(&snapshot_json))
            .map_err(|e| match e {
                RepositoryError::InvalidStateTransition { .. } => {
                    EngineError::StatementAlreadyFinalized {
                        run_id: run_id.clone(),
                    }
                }
                other => EngineError::from(other),
            })?;

        let run = self
            .repos
            .statement_repo
            .find_run(&run_id)?
            .ok_or_else(|| EngineError::RunNotFound(run_id.clone()))?;

        info!(
            run_id = %run.run_id,
            row_count = result.rows.len(),
            "结算批次已更新"
        );
        Ok((run, result))
    }

    /// 定稿（终态，不触碰结果行）
    pub fn finalize_statement(&self, run_id: &str) -> EngineResult<StatementRun> {
        let run = self
            .repos
            .statement_repo
            .find_run(run_id)?
            .ok_or_else(|| EngineError::RunNotFound(run_id.to_string()))?;
        if run.is_finalized() {
            return Err(EngineError::StatementAlreadyFinalized {
                run_id: run_id.to_string(),
            });
        }

        self.repos
            .statement_repo
            .update_status(run_id, StatementStatus::Finalized)?;
        info!(run_id, "结算批次已定稿");

        self.repos
            .statement_repo
            .find_run(run_id)?
            .ok_or_else(|| EngineError::RunNotFound(run_id.to_string()))
    }

    /// 读取 (物业, 年度) 已有批次的覆写，按 category_id -> unit_id 分组
    fn load_overrides(
        &self,
        property_id: &str,
        year: i32,
    ) -> EngineResult<HashMap<String, HashMap<String, Decimal>>> {
        let mut grouped: HashMap<String, HashMap<String, Decimal>> = HashMap::new();
        let Some(run) = self
            .repos
            .statement_repo
            .find_run_by_property_year(property_id, year)?
        else {
            return Ok(grouped);
        };
        for item in self.repos.override_repo.list_overrides(&run.run_id)? {
            grouped
                .entry(item.category_id)
                .or_default()
                .insert(item.unit_id, item.manual_amount_gross);
        }
        Ok(grouped)
    }

    /// 调用供暖引擎并生成供暖行
    ///
    /// additional_cost 为供暖类别的凭证合计，与燃料费用一起拆分。
    /// 缺少燃料系数时只记录告警，其余类别照常产出。
    fn compute_heating_rows(
        &self,
        purchase: &HeatingPurchase,
        additional_cost: Decimal,
        snapshot: &BasisSnapshot,
        config: &SettlementConfig,
        rows: &mut Vec<StatementRow>,
        warnings: &mut Vec<ComputationWarning>,
    ) -> EngineResult<Option<HeatingResult>> {
        let settings = self
            .repos
            .heating_repo
            .find_settings(&purchase.property_id)?
            .unwrap_or_else(|| {
                HeatingSettings::default_for(
                    &purchase.property_id,
                    config.default_consumption_share_percent,
                )
            });
        let factors = self.repos.heating_repo.list_fuel_factors()?;
        let warmwater_reading = purchase
            .warmwater_meter_id
            .as_deref()
            .map(|meter_id| snapshot.meter_consumption(meter_id));

        let unit_inputs: Vec<HeatingUnitInput> = snapshot
            .units
            .iter()
            .map(|u| HeatingUnitInput {
                unit_id: u.unit_id.clone(),
                area_m2: u.area_m2,
                heat_consumption: snapshot.unit_consumption(&u.unit_id, &[MeterType::HeatHeating]),
                warmwater_consumption: snapshot
                    .unit_consumption(&u.unit_id, &[MeterType::HeatWarmWater]),
            })
            .collect();

        let engine = HeatingCostEngine::new(config.clone());
        let mut result = match engine.compute_heating_with_additional_cost(
            purchase,
            additional_cost,
            &settings,
            &factors,
            warmwater_reading,
            &unit_inputs,
        ) {
            Ok(result) => result,
            Err(EngineError::MissingFactor { fuel_kind }) => {
                warn!(fuel_kind = %fuel_kind, "缺少燃料系数，供暖费用未计算，供暖类别按分摊键处理");
                warnings.push(ComputationWarning::MissingFactor { fuel_kind });
                return Ok(None);
            }
            Err(e) => return Err(e),
        };
        warnings.extend(result.warnings.iter().cloned());

        Self::reconcile_heating(&mut result, config.money_decimals);

        for unit in &result.per_unit {
            let components = [
                (
                    CostType::HeatingBase,
                    DistributionKey::LivingArea,
                    unit.area_m2,
                    unit.area_share_percent,
                    unit.heating_base,
                ),
                (
                    CostType::HeatingConsumption,
                    DistributionKey::HeatingEnergy,
                    unit.heat_consumption,
                    unit.heat_share_percent,
                    unit.heating_consumption,
                ),
                (
                    CostType::WarmWaterBase,
                    DistributionKey::LivingArea,
                    unit.area_m2,
                    unit.area_share_percent,
                    unit.warmwater_base,
                ),
                (
                    CostType::WarmWaterConsumption,
                    DistributionKey::WarmWaterEnergy,
                    unit.warmwater_consumption,
                    unit.warmwater_share_percent,
                    unit.warmwater_consumption_cost,
                ),
            ];
            rows.extend(components.into_iter().map(
                |(cost_type, key, basis_value, share_percent, amount)| StatementRow {
                    unit_id: unit.unit_id.clone(),
                    category_id: None,
                    cost_type,
                    label: cost_type.label().to_string(),
                    distribution_key: Some(key),
                    basis_value,
                    share_percent,
                    amount_gross: amount,
                    overridden: false,
                },
            ));
        }

        Ok(Some(result))
    }

    /// 供暖四个分项各自对账
    ///
    /// 分项总额由 round(total_cost) 逐级相减得出，四项合计恰为 round(total_cost)。
    fn reconcile_heating(result: &mut HeatingResult, decimals: u32) {
        let t = &result.totals;
        let total = round_money(t.total_cost, decimals);
        let ww_total = round_money(t.cost_ww, decimals);
        let heat_only = total - ww_total;
        let consumption = round_money(t.cost_consumption, decimals);
        let base = heat_only - consumption;
        let ww_consumption = round_money(t.cost_ww_consumption, decimals);
        let ww_base = ww_total - ww_consumption;

        reconcile_component(&mut result.per_unit, base, decimals, |u| &mut u.heating_base);
        reconcile_component(&mut result.per_unit, consumption, decimals, |u| {
            &mut u.heating_consumption
        });
        reconcile_component(&mut result.per_unit, ww_base, decimals, |u| &mut u.warmwater_base);
        reconcile_component(&mut result.per_unit, ww_consumption, decimals, |u| {
            &mut u.warmwater_consumption_cost
        });
    }
}

fn reconcile_component<F>(
    units: &mut [HeatingUnitCost],
    component_total: Decimal,
    decimals: u32,
    field: F,
) where
    F: Fn(&mut HeatingUnitCost) -> &mut Decimal,
{
    let mut amounts: Vec<Decimal> = units.iter_mut().map(|u| *field(u)).collect();
    let diff = reconcile_at(&mut amounts, component_total, decimals, 0);
    if diff.is_zero() {
        return;
    }
    if let (Some(unit), Some(adjusted)) = (units.first_mut(), amounts.first()) {
        *field(unit) = *adjusted;
        debug!(unit_id = %unit.unit_id, diff = %diff, "供暖分项舍入差额已调整");
    }
}
