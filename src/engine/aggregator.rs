// ==========================================
// WEG 运营费用结算 - 类别金额汇总
// ==========================================
// 职责: 汇总某类别某年度计入结算的凭证含税金额
// 说明: 未计入结算的凭证保留在库中，但永不参与汇总
// ==========================================

use crate::domain::Voucher;
use crate::engine::error::EngineResult;
use crate::repository::VoucherRepository;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::debug;

pub struct CategoryAggregator {
    voucher_repo: Arc<dyn VoucherRepository>,
}

impl CategoryAggregator {
    pub fn new(voucher_repo: Arc<dyn VoucherRepository>) -> Self {
        Self { voucher_repo }
    }

    /// 类别年度总额
    pub fn sum_category(
        &self,
        property_id: &str,
        category_id: &str,
        year: i32,
    ) -> EngineResult<Decimal> {
        let vouchers = self
            .voucher_repo
            .list_vouchers(property_id, category_id, year)?;
        let total = Self::sum_vouchers(&vouchers, category_id, year);

        debug!(
            property_id,
            category_id,
            year,
            voucher_count = vouchers.len(),
            total = %total,
            "类别汇总完成"
        );
        Ok(total)
    }

    /// 纯函数汇总（只计 include_in_statement 且类别、年度匹配的凭证）
    pub fn sum_vouchers(vouchers: &[Voucher], category_id: &str, year: i32) -> Decimal {
        vouchers
            .iter()
            .filter(|v| v.include_in_statement && v.category_id == category_id && v.year == year)
            .map(|v| v.gross_amount)
            .sum()
    }
}
