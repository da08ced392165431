// ==========================================
// WEG 运营费用结算 - 分摊引擎
// ==========================================
// 职责: 按基数把类别总额分摊到各单元，支持人工覆写
// 输入: 类别总额 + 单元基数 + 单元覆写金额
// 输出: 每单元 { 基数, 百分比, 金额 }
// ==========================================
// 算法:
// 1. autoTotal = max(0, 总额 - 覆写合计)
// 2. 非覆写单元按基数占比分摊 autoTotal；基数合计为 0 时平均分摊
// 3. 逐行舍入，差额整体加到按 unit_id 排序后的第一个非覆写行
// ==========================================

use crate::engine::basis::BasisRow;
use crate::engine::rounding::{decimal_from_f64, decimal_to_f64, reconcile_at, round_money};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, warn};

// ==========================================
// DistributionRow - 单元分摊结果
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributionRow {
    pub unit_id: String,
    pub basis_value: f64,
    pub share_percent: f64,
    pub amount_gross: Decimal,
    pub overridden: bool,
}

// ==========================================
// DistributionResult - 分摊结果与降级信息
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributionResult {
    pub rows: Vec<DistributionRow>, // 按 unit_id 排序
    pub override_sum: Decimal,
    pub override_overflow: bool,          // 存在覆写且覆写合计 > 总额
    pub negative_total: bool,             // 类别总额为负，自动分摊部分按 0 处理
    pub equal_split_applied: bool,        // 基数合计为 0，已平均分摊
    pub orphan_override_units: Vec<String>, // 指向未知单元的覆写
}

impl DistributionResult {
    pub fn total_amount(&self) -> Decimal {
        self.rows.iter().map(|r| r.amount_gross).sum()
    }
}

// ==========================================
// DistributionEngine - 分摊引擎
// ==========================================
pub struct DistributionEngine {
    money_decimals: u32,
}

impl Default for DistributionEngine {
    fn default() -> Self {
        Self::new(2)
    }
}

impl DistributionEngine {
    pub fn new(money_decimals: u32) -> Self {
        Self { money_decimals }
    }

    /// 分摊类别总额
    ///
    /// # 参数
    /// - category_total: 类别总额
    /// - basis_rows: 单元基数
    /// - overrides: unit_id -> 人工固定金额
    pub fn distribute(
        &self,
        category_total: Decimal,
        basis_rows: &[BasisRow],
        overrides: &HashMap<String, Decimal>,
    ) -> DistributionResult {
        let mut basis: Vec<&BasisRow> = basis_rows.iter().collect();
        basis.sort_by(|a, b| a.unit_id.cmp(&b.unit_id));

        let mut orphan_override_units: Vec<String> = overrides
            .keys()
            .filter(|unit_id| !basis.iter().any(|b| &b.unit_id == *unit_id))
            .cloned()
            .collect();
        orphan_override_units.sort();

        let override_sum: Decimal = basis
            .iter()
            .filter_map(|b| overrides.get(&b.unit_id))
            .copied()
            .sum();
        let override_overflow = override_sum > Decimal::ZERO && override_sum > category_total;
        let negative_total = category_total < Decimal::ZERO;
        let auto_total = (category_total - override_sum).max(Decimal::ZERO);

        // 非覆写单元的基数合计（以 Decimal 判断，避免极小浮点值导致除零）
        let auto_units: Vec<&&BasisRow> = basis
            .iter()
            .filter(|b| !overrides.contains_key(&b.unit_id))
            .collect();
        let auto_count = auto_units.len();
        let total_basis_f64: f64 = auto_units.iter().map(|b| non_negative(b.value)).sum();
        let total_basis: Decimal = auto_units
            .iter()
            .map(|b| decimal_from_f64(non_negative(b.value)))
            .sum();
        let equal_split_applied = auto_count > 0 && total_basis <= Decimal::ZERO;

        if negative_total {
            warn!(
                category_total = %category_total,
                "类别总额为负，自动分摊部分按 0 处理"
            );
        }
        if override_overflow {
            warn!(
                override_sum = %override_sum,
                category_total = %category_total,
                "覆写合计超过类别总额，自动分摊部分归零"
            );
        }

        let mut rows: Vec<DistributionRow> = basis
            .iter()
            .map(|b| {
                let basis_value = non_negative(b.value);
                if let Some(manual) = overrides.get(&b.unit_id) {
                    let share_percent = if category_total > Decimal::ZERO {
                        decimal_to_f64(*manual / category_total * Decimal::ONE_HUNDRED)
                    } else {
                        0.0
                    };
                    return DistributionRow {
                        unit_id: b.unit_id.clone(),
                        basis_value,
                        share_percent,
                        amount_gross: *manual,
                        overridden: true,
                    };
                }

                let (amount, share_percent) = if total_basis > Decimal::ZERO {
                    let amount = (auto_total * decimal_from_f64(basis_value))
                        .checked_div(total_basis)
                        .unwrap_or(Decimal::ZERO);
                    let share = if total_basis_f64 > 0.0 {
                        basis_value / total_basis_f64
                    } else {
                        0.0
                    };
                    (amount, share * 100.0)
                } else {
                    let count = Decimal::from(auto_count as i64);
                    let amount = auto_total.checked_div(count).unwrap_or(Decimal::ZERO);
                    (amount, 100.0 / auto_count as f64)
                };

                DistributionRow {
                    unit_id: b.unit_id.clone(),
                    basis_value,
                    share_percent,
                    amount_gross: amount,
                    overridden: false,
                }
            })
            .collect();

        for row in rows.iter_mut() {
            row.amount_gross = round_money(row.amount_gross, self.money_decimals);
        }

        // 覆写合计超额或总额为负时总额无法守恒，不做对账（否则会出现负金额）
        if !override_overflow && !negative_total {
            self.reconcile(&mut rows, category_total);
        }

        debug!(
            category_total = %category_total,
            unit_count = rows.len(),
            override_count = overrides.len(),
            equal_split_applied,
            "分摊完成"
        );

        DistributionResult {
            rows,
            override_sum,
            override_overflow,
            negative_total,
            equal_split_applied,
            orphan_override_units,
        }
    }

    /// 舍入差额加到第一个非覆写行（全部覆写时加到第一行）
    fn reconcile(&self, rows: &mut [DistributionRow], category_total: Decimal) {
        let adjust_index = rows.iter().position(|r| !r.overridden).unwrap_or(0);
        let mut amounts: Vec<Decimal> = rows.iter().map(|r| r.amount_gross).collect();
        let diff = reconcile_at(&mut amounts, category_total, self.money_decimals, adjust_index);
        if diff.is_zero() {
            return;
        }
        match amounts.get(adjust_index) {
            Some(adjusted) if *adjusted >= Decimal::ZERO => {
                rows[adjust_index].amount_gross = *adjusted;
                debug!(
                    unit_id = %rows[adjust_index].unit_id,
                    diff = %diff,
                    "舍入差额已调整"
                );
            }
            _ => {
                warn!(diff = %diff, "舍入差额会导致负金额，跳过对账");
            }
        }
    }
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
    use rust_decimal_macros::dec;

    fn basis(values: &[(&str, f64)]) -> Vec<BasisRow> {
        values
            .iter()
            .map(|(id, v)| BasisRow {
                unit_id: id.to_string(),
                value: *v,
            })
            .collect()
    }

    fn amounts(result: &DistributionResult) -> Vec<Decimal> {
        result.rows.iter().map(|r| r.amount_gross).collect()
    }

    #[test]
    fn test_area_distribution_scenario() {
        let engine = DistributionEngine::default();
        let result = engine.distribute(
            dec!(1000.00),
            &basis(&[("U1", 100.0), ("U2", 100.0), ("U3", 50.0)]),
            &HashMap::new(),
        );
        assert_eq!(amounts(&result), vec![dec!(400.00), dec!(400.00), dec!(200.00)]);
        for (row, expected) in result.rows.iter().zip([40.0, 40.0, 20.0]) {
            assert!((row.share_percent - expected).abs() < 1e-9);
        }
        assert_eq!(result.total_amount(), dec!(1000.00));
        assert!(!result.equal_split_applied);
    }

    #[test]
    fn test_override_scenario() {
        let engine = DistributionEngine::default();
        let mut overrides = HashMap::new();
        overrides.insert("U1".to_string(), dec!(350.00));
        let result = engine.distribute(
            dec!(1000.00),
            &basis(&[("U1", 100.0), ("U2", 100.0), ("U3", 50.0)]),
            &overrides,
        );
        assert_eq!(amounts(&result), vec![dec!(350.00), dec!(433.33), dec!(216.67)]);
        assert!(result.rows[0].overridden);
        assert_eq!(result.rows[0].share_percent, 35.0);
        assert_eq!(result.total_amount(), dec!(1000.00));
    }

    #[test]
    fn test_equal_split_when_all_basis_zero() {
        let engine = DistributionEngine::default();
        let result = engine.distribute(
            dec!(100.00),
            &basis(&[("U3", 0.0), ("U1", 0.0), ("U2", 0.0)]),
            &HashMap::new(),
        );
        assert!(result.equal_split_applied);
        // 差额落在排序后的第一行 U1
        assert_eq!(result.rows[0].unit_id, "U1");
        assert_eq!(amounts(&result), vec![dec!(33.34), dec!(33.33), dec!(33.33)]);
        assert!((result.rows[1].share_percent - 100.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_conservation_with_awkward_basis() {
        let engine = DistributionEngine::default();
        let rows = basis(&[("U1", 7.0), ("U2", 11.0), ("U3", 13.0), ("U4", 17.0)]);
        for total in [dec!(999.99), dec!(0.05), dec!(1234.567), dec!(10)] {
            let result = engine.distribute(total, &rows, &HashMap::new());
            assert_eq!(result.total_amount(), round_money(total, 2));
            assert!(result.rows.iter().all(|r| r.amount_gross >= Decimal::ZERO));
        }
    }

    #[test]
    fn test_override_exceeding_total_clamps_auto_part() {
        let engine = DistributionEngine::default();
        let mut overrides = HashMap::new();
        overrides.insert("U2".to_string(), dec!(1200.00));
        let result = engine.distribute(
            dec!(1000.00),
            &basis(&[("U1", 100.0), ("U2", 100.0), ("U3", 50.0)]),
            &overrides,
        );
        assert!(result.override_overflow);
        assert_eq!(amounts(&result), vec![dec!(0), dec!(1200.00), dec!(0)]);
    }

    #[test]
    fn test_negative_total_without_overrides_is_not_overflow() {
        let engine = DistributionEngine::default();
        let result = engine.distribute(
            dec!(-80.00),
            &basis(&[("U1", 100.0), ("U2", 60.0)]),
            &HashMap::new(),
        );
        assert!(!result.override_overflow);
        assert!(result.negative_total);
        assert_eq!(result.override_sum, Decimal::ZERO);
        assert_eq!(amounts(&result), vec![dec!(0), dec!(0)]);
    }

    #[test]
    fn test_negative_total_with_override_still_flags_overflow() {
        let engine = DistributionEngine::default();
        let mut overrides = HashMap::new();
        overrides.insert("U1".to_string(), dec!(20.00));
        let result = engine.distribute(
            dec!(-80.00),
            &basis(&[("U1", 100.0), ("U2", 60.0)]),
            &overrides,
        );
        assert!(result.override_overflow);
        assert!(result.negative_total);
        assert_eq!(amounts(&result), vec![dec!(20.00), dec!(0)]);
    }

    #[test]
    fn test_override_idempotent_and_removable() {
        let engine = DistributionEngine::default();
        let rows = basis(&[("U1", 100.0), ("U2", 100.0), ("U3", 50.0)]);
        let baseline = engine.distribute(dec!(1000.00), &rows, &HashMap::new());

        let mut overrides = HashMap::new();
        overrides.insert("U3".to_string(), dec!(120.00));
        let first = engine.distribute(dec!(1000.00), &rows, &overrides);
        overrides.insert("U3".to_string(), dec!(120.00));
        let second = engine.distribute(dec!(1000.00), &rows, &overrides);
        assert_eq!(first, second);

        overrides.remove("U3");
        let restored = engine.distribute(dec!(1000.00), &rows, &overrides);
        assert_eq!(restored, baseline);
    }

    #[test]
    fn test_orphan_override_ignored() {
        let engine = DistributionEngine::default();
        let mut overrides = HashMap::new();
        overrides.insert("U9".to_string(), dec!(50.00));
        let result = engine.distribute(dec!(90.00), &basis(&[("U1", 1.0), ("U2", 2.0)]), &overrides);
        assert_eq!(result.orphan_override_units, vec!["U9".to_string()]);
        assert_eq!(amounts(&result), vec![dec!(30.00), dec!(60.00)]);
        assert_eq!(result.override_sum, Decimal::ZERO);
    }

    #[test]
    fn test_all_units_overridden_puts_remainder_on_first() {
        let engine = DistributionEngine::default();
        let mut overrides = HashMap::new();
        overrides.insert("U1".to_string(), dec!(40.00));
        overrides.insert("U2".to_string(), dec!(50.00));
        let result = engine.distribute(dec!(100.00), &basis(&[("U1", 1.0), ("U2", 1.0)]), &overrides);
        assert_eq!(amounts(&result), vec![dec!(50.00), dec!(50.00)]);
        assert_eq!(result.total_amount(), dec!(100.00));
    }

    #[test]
    fn test_empty_basis_yields_no_rows() {
        let engine = DistributionEngine::default();
        let result = engine.distribute(dec!(100.00), &[], &HashMap::new());
        assert!(result.rows.is_empty());
        assert!(!result.equal_split_applied);
    }
}
