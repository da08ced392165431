// ==========================================
// WEG 运营费用结算 - 供暖费用引擎
// ==========================================
// 职责: 燃料折算 kWh、扣除热水能耗、拆分基础费/计量费并分摊到单元
// 输入: 燃料采购 + 供暖类别凭证合计 + 供暖设置 + 燃料系数 + 热水表读数 + 单元面积/用量
// 输出: HeatingResult { totals, per_unit, warnings }
// ==========================================
// 步骤:
// 1. total_kwh = 燃料数量 × 每单位 kWh（kwh 燃料为 1）
// 2. 联供系统且指定热水表时扣除 ww_kwh
// 3. 燃料费用加上供暖类别凭证合计，按能耗比例拆成热水 / 纯采暖两部分
// 4. 纯采暖按计量费比例拆成基础费（按面积）与计量费（按热表）
// 5. 热水按热水计量比例拆成基础费（按面积）与计量费（按热水用量）
// 说明: 只做单元级舍入，跨单元对账由编排器负责
// ==========================================

use crate::config::SettlementConfig;
use crate::domain::{FuelFactor, HeatingPurchase, HeatingSettings, HotwaterUnitMode};
use crate::engine::error::{ComputationWarning, EngineError, EngineResult};
use crate::engine::rounding::{decimal_from_f64, round_money};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// 水的比热近似值 kWh/(m³·K)，用于按体积估算热水能耗
const WARMWATER_KWH_PER_M3_K: f64 = 2.5;

// ==========================================
// HeatingUnitInput - 单元输入
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeatingUnitInput {
    pub unit_id: String,
    pub area_m2: f64,
    pub heat_consumption: f64,      // 采暖热表用量
    pub warmwater_consumption: f64, // 热水热表用量
}

// ==========================================
// HeatingTotals - 物业级汇总
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeatingTotals {
    pub fuel_kind: String,
    pub kwh_per_unit: f64,
    pub total_kwh: f64,
    pub ww_kwh: f64,
    pub useful_kwh: f64,
    pub fuel_cost: Decimal,       // 燃料采购费用
    pub additional_cost: Decimal, // 供暖类别凭证合计（维护、抄表等）
    pub total_cost: Decimal,
    pub cost_ww: Decimal,
    pub cost_heat_only: Decimal,
    pub cost_consumption: Decimal,
    pub cost_base: Decimal,
    pub cost_ww_consumption: Decimal,
    pub cost_ww_base: Decimal,
    pub consumption_share_percent: f64,           // 实际使用（钳制后）
    pub warmwater_consumption_share_percent: f64, // 实际使用（钳制后）
}

// ==========================================
// HeatingUnitCost - 单元供暖费用
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeatingUnitCost {
    pub unit_id: String,
    pub area_m2: f64,
    pub heat_consumption: f64,
    pub warmwater_consumption: f64,
    pub area_share_percent: f64,
    pub heat_share_percent: f64,
    pub warmwater_share_percent: f64,
    pub heating_base: Decimal,
    pub heating_consumption: Decimal,
    pub warmwater_base: Decimal,
    pub warmwater_consumption_cost: Decimal,
}

impl HeatingUnitCost {
    pub fn total(&self) -> Decimal {
        self.heating_base + self.heating_consumption + self.warmwater_base
            + self.warmwater_consumption_cost
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeatingResult {
    pub totals: HeatingTotals,
    pub per_unit: Vec<HeatingUnitCost>, // 按 unit_id 排序
    pub warnings: Vec<ComputationWarning>,
}

// 单个费用项按权重分摊后的结果
struct Allocation {
    amounts: Vec<Decimal>,
    share_percents: Vec<f64>,
    equal_split: bool,
}

// ==========================================
// HeatingCostEngine - 供暖费用引擎
// ==========================================
pub struct HeatingCostEngine {
    config: SettlementConfig,
}

impl HeatingCostEngine {
    pub fn new(config: SettlementConfig) -> Self {
        Self { config }
    }

    /// 计算供暖费用
    ///
    /// # 参数
    /// - purchase: 燃料采购记录
    /// - settings: 物业供暖设置
    /// - factors: 燃料系数（仅按传入记录查找）
    /// - warmwater_meter_reading: 指定热水表的年度读数合计
    /// - units: 单元面积与用量
    ///
    /// # 错误
    /// - EngineError::MissingFactor: 非 kWh 燃料找不到换算系数
    pub fn compute_heating(
        &self,
        purchase: &HeatingPurchase,
        settings: &HeatingSettings,
        factors: &[FuelFactor],
        warmwater_meter_reading: Option<f64>,
        units: &[HeatingUnitInput],
    ) -> EngineResult<HeatingResult> {
        self.compute_heating_with_additional_cost(
            purchase,
            Decimal::ZERO,
            settings,
            factors,
            warmwater_meter_reading,
            units,
        )
    }

    /// 计算供暖费用，燃料费用之外另计供暖类别的凭证合计
    ///
    /// additional_cost 与燃料费用合并后按同一能耗比例和计量费比例拆分。
    pub fn compute_heating_with_additional_cost(
        &self,
        purchase: &HeatingPurchase,
        additional_cost: Decimal,
        settings: &HeatingSettings,
        factors: &[FuelFactor],
        warmwater_meter_reading: Option<f64>,
        units: &[HeatingUnitInput],
    ) -> EngineResult<HeatingResult> {
        let decimals = self.config.money_decimals;
        let mut warnings = Vec::new();

        // ===== 步骤1: 燃料折算 =====
        let kwh_per_unit = Self::resolve_kwh_per_unit(purchase, factors)?;
        let input_amount = if purchase.input_amount.is_finite() && purchase.input_amount > 0.0 {
            purchase.input_amount
        } else {
            0.0
        };
        let total_kwh = input_amount * kwh_per_unit;

        // ===== 步骤2: 热水能耗 =====
        let ww_kwh = if settings.system_type.includes_hot_water()
            && purchase.warmwater_meter_id.is_some()
        {
            let raw = warmwater_meter_reading.unwrap_or(0.0);
            self.warmwater_energy_kwh(settings, raw).min(total_kwh)
        } else {
            0.0
        };
        let useful_kwh = (total_kwh - ww_kwh).max(0.0);

        // ===== 步骤3: 费用拆分 =====
        let fuel_cost = purchase
            .gross_cost
            .unwrap_or_else(|| decimal_from_f64(input_amount) * purchase.unit_price);
        let total_cost = fuel_cost + additional_cost;
        let frac_ww = if total_kwh > 0.0 { ww_kwh / total_kwh } else { 0.0 };
        let cost_ww = total_cost * decimal_from_f64(frac_ww);
        let cost_heat_only = total_cost - cost_ww;

        // ===== 步骤4: 计量费比例 =====
        let consumption_share = self.applied_consumption_share(
            settings.consumption_share_percent,
            &mut warnings,
        );
        let warmwater_share = clamp_percent(self.config.warmwater_consumption_share_percent);

        let cost_consumption = cost_heat_only * percent(consumption_share);
        let cost_base = cost_heat_only - cost_consumption;
        let cost_ww_consumption = cost_ww * percent(warmwater_share);
        let cost_ww_base = cost_ww - cost_ww_consumption;

        // ===== 步骤5: 单元分摊 =====
        let mut sorted: Vec<&HeatingUnitInput> = units.iter().collect();
        sorted.sort_by(|a, b| a.unit_id.cmp(&b.unit_id));

        let areas: Vec<f64> = sorted.iter().map(|u| non_negative(u.area_m2)).collect();
        let heat: Vec<f64> = sorted.iter().map(|u| non_negative(u.heat_consumption)).collect();
        let ww: Vec<f64> = sorted
            .iter()
            .map(|u| non_negative(u.warmwater_consumption))
            .collect();

        let base_alloc = allocate(cost_base, &areas, decimals);
        let consumption_alloc = allocate(cost_consumption, &heat, decimals);
        let ww_base_alloc = allocate(cost_ww_base, &areas, decimals);
        let ww_consumption_alloc = allocate(cost_ww_consumption, &ww, decimals);

        for (scope, alloc, cost) in [
            ("Heizung Grundkosten", &base_alloc, cost_base),
            ("Heizung Verbrauchskosten", &consumption_alloc, cost_consumption),
            ("Warmwasser Grundkosten", &ww_base_alloc, cost_ww_base),
            ("Warmwasser Verbrauchskosten", &ww_consumption_alloc, cost_ww_consumption),
        ] {
            if alloc.equal_split && !cost.is_zero() {
                warn!(scope, unit_count = sorted.len(), "基数合计为 0，平均分摊");
                warnings.push(ComputationWarning::EqualSplitFallback {
                    scope: scope.to_string(),
                    unit_count: sorted.len(),
                });
            }
        }

        let per_unit = sorted
            .iter()
            .enumerate()
            .map(|(i, u)| HeatingUnitCost {
                unit_id: u.unit_id.clone(),
                area_m2: areas[i],
                heat_consumption: heat[i],
                warmwater_consumption: ww[i],
                area_share_percent: base_alloc.share_percents[i],
                heat_share_percent: consumption_alloc.share_percents[i],
                warmwater_share_percent: ww_consumption_alloc.share_percents[i],
                heating_base: base_alloc.amounts[i],
                heating_consumption: consumption_alloc.amounts[i],
                warmwater_base: ww_base_alloc.amounts[i],
                warmwater_consumption_cost: ww_consumption_alloc.amounts[i],
            })
            .collect::<Vec<_>>();

        let totals = HeatingTotals {
            fuel_kind: purchase.fuel_input_type.clone(),
            kwh_per_unit,
            total_kwh,
            ww_kwh,
            useful_kwh,
            fuel_cost: round_money(fuel_cost, decimals),
            additional_cost: round_money(additional_cost, decimals),
            total_cost: round_money(total_cost, decimals),
            cost_ww: round_money(cost_ww, decimals),
            cost_heat_only: round_money(cost_heat_only, decimals),
            cost_consumption: round_money(cost_consumption, decimals),
            cost_base: round_money(cost_base, decimals),
            cost_ww_consumption: round_money(cost_ww_consumption, decimals),
            cost_ww_base: round_money(cost_ww_base, decimals),
            consumption_share_percent: consumption_share,
            warmwater_consumption_share_percent: warmwater_share,
        };

        info!(
            property_id = %purchase.property_id,
            year = purchase.year,
            total_kwh,
            ww_kwh,
            total_cost = %totals.total_cost,
            unit_count = per_unit.len(),
            "供暖费用计算完成"
        );

        Ok(HeatingResult {
            totals,
            per_unit,
            warnings,
        })
    }

    /// 每单位燃料对应的 kWh
    ///
    /// kwh 燃料恒为 1；其余只查传入系数，找不到即为 MissingFactor。
    pub fn resolve_kwh_per_unit(
        purchase: &HeatingPurchase,
        factors: &[FuelFactor],
    ) -> EngineResult<f64> {
        if purchase.is_kwh_input() {
            return Ok(1.0);
        }
        let kind = purchase.fuel_input_type.trim();
        factors
            .iter()
            .find(|f| f.kind.eq_ignore_ascii_case(kind))
            .map(FuelFactor::kwh_per_unit)
            .ok_or_else(|| {
                warn!(fuel_kind = kind, "缺少燃料换算系数");
                EngineError::MissingFactor {
                    fuel_kind: kind.to_string(),
                }
            })
    }

    /// 热水表读数折算为 kWh
    pub fn warmwater_energy_kwh(&self, settings: &HeatingSettings, reading: f64) -> f64 {
        let reading = non_negative(reading);
        let kwh = match settings.hotwater_unit_mode {
            HotwaterUnitMode::Mwh => reading * 1000.0,
            HotwaterUnitMode::Kwh => reading,
            HotwaterUnitMode::VolumeM3 => {
                let delta_t = settings.supply_temp_c - self.config.warmwater_reference_temp_c;
                WARMWATER_KWH_PER_M3_K * reading * delta_t
            }
        };
        non_negative(kwh)
    }

    fn applied_consumption_share(
        &self,
        configured: f64,
        warnings: &mut Vec<ComputationWarning>,
    ) -> f64 {
        let configured = if configured.is_finite() {
            configured
        } else {
            self.config.default_consumption_share_percent
        };
        let applied = clamp_percent(configured);
        if applied != configured {
            warn!(configured, applied, "计量费比例超出范围，已钳制");
            warnings.push(ComputationWarning::ConsumptionShareClamped { configured, applied });
        }
        if !self.config.is_within_legal_range(applied) {
            warn!(
                share = applied,
                min = self.config.legal_consumption_share_min,
                max = self.config.legal_consumption_share_max,
                "计量费比例不在法定区间内"
            );
            warnings.push(ComputationWarning::ConsumptionShareOutsideLegalRange {
                share: applied,
                min: self.config.legal_consumption_share_min,
                max: self.config.legal_consumption_share_max,
            });
        }
        debug!(applied, "计量费比例");
        applied
    }
}

/// 按权重分摊单项费用（单元级舍入，不对账）
fn allocate(cost: Decimal, weights: &[f64], decimals: u32) -> Allocation {
    let count = weights.len();
    let total_weight: Decimal = weights.iter().map(|w| decimal_from_f64(*w)).sum();
    let total_weight_f64: f64 = weights.iter().sum();

    if count == 0 {
        return Allocation {
            amounts: Vec::new(),
            share_percents: Vec::new(),
            equal_split: false,
        };
    }

    if total_weight <= Decimal::ZERO || total_weight_f64 <= 0.0 {
        let each = cost
            .checked_div(Decimal::from(count as i64))
            .unwrap_or(Decimal::ZERO);
        return Allocation {
            amounts: vec![round_money(each, decimals); count],
            share_percents: vec![100.0 / count as f64; count],
            equal_split: true,
        };
    }

    let amounts = weights
        .iter()
        .map(|w| {
            let raw = (cost * decimal_from_f64(*w))
                .checked_div(total_weight)
                .unwrap_or(Decimal::ZERO);
            round_money(raw, decimals)
        })
        .collect();
    let share_percents = weights
        .iter()
        .map(|w| w / total_weight_f64 * 100.0)
        .collect();

    Allocation {
        amounts,
        share_percents,
        equal_split: false,
    }
}

fn clamp_percent(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 100.0)
    } else {
        0.0
    }
}

fn percent(value: f64) -> Decimal {
    decimal_from_f64(value) / Decimal::ONE_HUNDRED
}

fn non_negative(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::HeatingSystemType;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn purchase(kind: &str, amount: f64, price: Decimal, ww_meter: Option<&str>) -> HeatingPurchase {
        HeatingPurchase {
            property_id: "P1".to_string(),
            year: 2024,
            fuel_input_type: kind.to_string(),
            input_amount: amount,
            unit_price: price,
            gross_cost: None,
            warmwater_meter_id: ww_meter.map(str::to_string),
            period_start: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            period_end: NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
        }
    }

    fn combined_settings(share: f64) -> HeatingSettings {
        HeatingSettings {
            system_type: HeatingSystemType::CombinedHeatingHotWater,
            ..HeatingSettings::default_for("P1", share)
        }
    }

    fn units() -> Vec<HeatingUnitInput> {
        vec![
            HeatingUnitInput {
                unit_id: "U1".to_string(),
                area_m2: 60.0,
                heat_consumption: 3.0,
                warmwater_consumption: 1.0,
            },
            HeatingUnitInput {
                unit_id: "U2".to_string(),
                area_m2: 40.0,
                heat_consumption: 1.0,
                warmwater_consumption: 1.0,
            },
        ]
    }

    #[test]
    fn test_fuel_conversion_m3_gas() {
        let p = purchase("m3_H", 100.0, dec!(1.00), None);
        let factors = vec![FuelFactor::new("m3_H", 10.7, 0.96)];
        let kwh = HeatingCostEngine::resolve_kwh_per_unit(&p, &factors).unwrap() * p.input_amount;
        assert!((kwh - 1027.2).abs() < 1e-9);
    }

    #[test]
    fn test_factor_lookup_ignores_case() {
        let p = purchase("Liter_Oil", 10.0, dec!(1.00), None);
        let factors = vec![
            FuelFactor::new("m3_H", 10.7, 0.96),
            FuelFactor::new("liter_oil", 9.8, 1.0),
        ];
        let per_unit = HeatingCostEngine::resolve_kwh_per_unit(&p, &factors).unwrap();
        assert!((per_unit - 9.8).abs() < 1e-12);
    }

    #[test]
    fn test_common_fuel_without_factor_row_is_error() {
        // m3_H 也必须由调用方提供系数
        let p = purchase("m3_H", 100.0, dec!(1.00), None);
        let result = HeatingCostEngine::resolve_kwh_per_unit(&p, &[]);
        assert!(matches!(
            result,
            Err(EngineError::MissingFactor { fuel_kind }) if fuel_kind == "m3_H"
        ));
        assert_eq!(
            HeatingCostEngine::resolve_kwh_per_unit(&purchase("kwh", 1.0, dec!(1.00), None), &[])
                .unwrap(),
            1.0
        );
    }

    #[test]
    fn test_missing_factor_is_error() {
        let engine = HeatingCostEngine::new(SettlementConfig::default());
        let p = purchase("fernwaerme_gj", 10.0, dec!(30.00), None);
        let result = engine.compute_heating(&p, &combined_settings(70.0), &[], None, &units());
        assert!(matches!(
            result,
            Err(EngineError::MissingFactor { fuel_kind }) if fuel_kind == "fernwaerme_gj"
        ));
    }

    #[test]
    fn test_cost_split_scenario() {
        let engine = HeatingCostEngine::new(SettlementConfig::default());
        let p = purchase("kwh", 1000.0, dec!(0.10), Some("WW-HAUS"));
        let result = engine
            .compute_heating(&p, &combined_settings(70.0), &[], Some(0.2), &units())
            .unwrap();
        let t = &result.totals;

        assert!((t.total_kwh - 1000.0).abs() < 1e-9);
        assert!((t.ww_kwh - 200.0).abs() < 1e-9);
        assert!((t.total_kwh - (t.ww_kwh + t.useful_kwh)).abs() < 1e-9);
        assert_eq!(t.total_cost, dec!(100.00));
        assert_eq!(t.cost_ww, dec!(20.00));
        assert_eq!(t.cost_heat_only, dec!(80.00));
        assert_eq!(t.cost_consumption, dec!(56.00));
        assert_eq!(t.cost_base, dec!(24.00));
        assert_eq!(t.cost_ww_consumption, dec!(14.00));
        assert_eq!(t.cost_ww_base, dec!(6.00));
    }

    #[test]
    fn test_additional_cost_joins_fuel_cost() {
        let engine = HeatingCostEngine::new(SettlementConfig::default());
        let p = purchase("kwh", 1000.0, dec!(0.10), Some("WW-HAUS"));
        let result = engine
            .compute_heating_with_additional_cost(
                &p,
                dec!(250.00),
                &combined_settings(70.0),
                &[],
                Some(0.2),
                &units(),
            )
            .unwrap();
        let t = &result.totals;
        assert_eq!(t.fuel_cost, dec!(100.00));
        assert_eq!(t.additional_cost, dec!(250.00));
        assert_eq!(t.total_cost, dec!(350.00));
        assert_eq!(t.cost_ww, dec!(70.00));
        assert_eq!(t.cost_consumption, dec!(196.00));
        assert_eq!(t.cost_base, dec!(84.00));
    }

    #[test]
    fn test_per_unit_allocation() {
        let engine = HeatingCostEngine::new(SettlementConfig::default());
        let p = purchase("kwh", 1000.0, dec!(0.10), Some("WW-HAUS"));
        let result = engine
            .compute_heating(&p, &combined_settings(70.0), &[], Some(0.2), &units())
            .unwrap();

        let u1 = &result.per_unit[0];
        let u2 = &result.per_unit[1];
        // 基础费按面积 60:40，计量费按热表 3:1，热水计量按 1:1
        assert_eq!(u1.heating_base, dec!(14.40));
        assert_eq!(u2.heating_base, dec!(9.60));
        assert_eq!(u1.heating_consumption, dec!(42.00));
        assert_eq!(u2.heating_consumption, dec!(14.00));
        assert_eq!(u1.warmwater_base, dec!(3.60));
        assert_eq!(u2.warmwater_base, dec!(2.40));
        assert_eq!(u1.warmwater_consumption_cost, dec!(7.00));
        assert_eq!(u2.warmwater_consumption_cost, dec!(7.00));
        assert_eq!(u1.total() + u2.total(), dec!(100.00));
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_heating_only_ignores_warmwater_meter() {
        let engine = HeatingCostEngine::new(SettlementConfig::default());
        let p = purchase("kwh", 1000.0, dec!(0.10), Some("WW-HAUS"));
        let settings = HeatingSettings::default_for("P1", 70.0);
        let result = engine
            .compute_heating(&p, &settings, &[], Some(0.2), &units())
            .unwrap();
        assert_eq!(result.totals.ww_kwh, 0.0);
        assert_eq!(result.totals.cost_ww, dec!(0.00));
        assert_eq!(result.totals.cost_heat_only, dec!(100.00));
    }

    #[test]
    fn test_gross_cost_takes_precedence() {
        let engine = HeatingCostEngine::new(SettlementConfig::default());
        let mut p = purchase("kwh", 1000.0, dec!(0.10), None);
        p.gross_cost = Some(dec!(119.00));
        let result = engine
            .compute_heating(&p, &combined_settings(70.0), &[], None, &units())
            .unwrap();
        assert_eq!(result.totals.total_cost, dec!(119.00));
    }

    #[test]
    fn test_share_clamped_and_legal_range_warning() {
        let engine = HeatingCostEngine::new(SettlementConfig::default());
        let p = purchase("kwh", 1000.0, dec!(0.10), None);
        let result = engine
            .compute_heating(&p, &combined_settings(130.0), &[], None, &units())
            .unwrap();
        assert_eq!(result.totals.consumption_share_percent, 100.0);
        assert_eq!(result.totals.cost_base, dec!(0.00));
        let codes: Vec<&str> = result.warnings.iter().map(|w| w.code()).collect();
        assert!(codes.contains(&"consumption_share_clamped"));
        assert!(codes.contains(&"consumption_share_outside_legal_range"));
    }

    #[test]
    fn test_zero_consumption_falls_back_to_equal_split() {
        let engine = HeatingCostEngine::new(SettlementConfig::default());
        let p = purchase("kwh", 1000.0, dec!(0.10), None);
        let mut inputs = units();
        for u in inputs.iter_mut() {
            u.heat_consumption = 0.0;
        }
        let result = engine
            .compute_heating(&p, &combined_settings(50.0), &[], None, &inputs)
            .unwrap();
        assert_eq!(result.per_unit[0].heating_consumption, dec!(25.00));
        assert_eq!(result.per_unit[1].heating_consumption, dec!(25.00));
        assert!(result
            .warnings
            .iter()
            .any(|w| w.code() == "equal_split_fallback"));
    }

    #[test]
    fn test_volume_mode_estimates_energy() {
        let engine = HeatingCostEngine::new(SettlementConfig::default());
        let settings = HeatingSettings {
            hotwater_unit_mode: HotwaterUnitMode::VolumeM3,
            supply_temp_c: 60.0,
            ..combined_settings(70.0)
        };
        // 2.5 × 10 m³ × (60 - 10) K = 1250 kWh
        assert!((engine.warmwater_energy_kwh(&settings, 10.0) - 1250.0).abs() < 1e-9);

        let p = purchase("kwh", 1000.0, dec!(0.10), Some("WW-HAUS"));
        let result = engine
            .compute_heating(&p, &settings, &[], Some(10.0), &units())
            .unwrap();
        // 热水能耗不超过总能耗
        assert_eq!(result.totals.ww_kwh, 1000.0);
        assert_eq!(result.totals.useful_kwh, 0.0);
    }
}
