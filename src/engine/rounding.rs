// ==========================================
// WEG 运营费用结算 - 金额舍入与对账
// ==========================================
// 规则:
// - 金额一律四舍五入（0.5 远离零）到配置精度
// - 舍入差额整体加到一行上，保证合计与总额分毫不差
// ==========================================

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, RoundingStrategy};

/// 金额舍入
pub fn round_money(value: Decimal, decimals: u32) -> Decimal {
    value.round_dp_with_strategy(decimals, RoundingStrategy::MidpointAwayFromZero)
}

/// 计算舍入差额: round(target) - Σ amounts
pub fn rounding_difference(target: Decimal, amounts: &[Decimal], decimals: u32) -> Decimal {
    let sum: Decimal = amounts.iter().copied().sum();
    round_money(target, decimals) - sum
}

/// 把舍入差额加到 adjust_index 指向的行，返回实际调整量
///
/// 调用方负责先按 unit_id 排好序，保证被调整的行可复现。
pub fn reconcile_at(
    amounts: &mut [Decimal],
    target: Decimal,
    decimals: u32,
    adjust_index: usize,
) -> Decimal {
    let diff = rounding_difference(target, amounts, decimals);
    if diff.is_zero() {
        return Decimal::ZERO;
    }
    match amounts.get_mut(adjust_index) {
        Some(amount) => {
            *amount += diff;
            diff
        }
        None => Decimal::ZERO,
    }
}

/// f64 数量转 Decimal（非有限值按 0 处理）
pub fn decimal_from_f64(value: f64) -> Decimal {
    if !value.is_finite() {
        return Decimal::ZERO;
    }
    Decimal::from_f64(value).unwrap_or(Decimal::ZERO)
}

/// Decimal 转 f64（仅用于展示性的百分比）
pub fn decimal_to_f64(value: Decimal) -> f64 {
    value.to_f64().unwrap_or(0.0)
}
