// ==========================================
// WEG 运营费用结算 - 内存仓储
// ==========================================
// 职责: 以纯内存方式实现全部仓储接口
// 用途: 引擎单元测试、无持久化的试算
// ==========================================

use crate::domain::{
    AdvancePayment, CostCategory, DistributionKey, DistributionOverride, FuelFactor,
    HeatingPurchase, HeatingSettings, Meter, MeterReading, Property, StatementRow, StatementRun,
    StatementStatus, StatementSummary, Unit, Voucher,
};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::ports::{
    AdvancePaymentRepository, CategoryRepository, HeatingRepository, MeterRepository,
    OverrideRepository, StatementRepository, UnitRepository, VoucherRepository,
};
use chrono::Local;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

#[derive(Default)]
struct StoreData {
    properties: Vec<Property>,
    units: Vec<Unit>,
    categories: Vec<CostCategory>,
    vouchers: Vec<Voucher>,
    meters: Vec<Meter>,
    readings: Vec<MeterReading>,
    heating_settings: HashMap<String, HeatingSettings>,
    fuel_factors: Vec<FuelFactor>,
    purchases: Vec<HeatingPurchase>,
    advance_payments: Vec<AdvancePayment>,
    overrides: Vec<DistributionOverride>,
    runs: Vec<StatementRun>,
    rows: HashMap<String, Vec<StatementRow>>,
    summaries: HashMap<String, Vec<StatementSummary>>,
}

/// 内存仓储（实现全部仓储 trait）
#[derive(Default)]
pub struct InMemorySettlementStore {
    data: Mutex<StoreData>,
}

impl InMemorySettlementStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> RepositoryResult<MutexGuard<'_, StoreData>> {
        self.data
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn lock_for_seed(&self) -> MutexGuard<'_, StoreData> {
        // 种子写入只在单线程构建阶段发生，锁中毒时沿用内部数据
        self.data.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // ===== 种子数据写入 =====

    pub fn add_property(&self, property_id: &str, name: &str) {
        self.lock_for_seed().properties.push(Property {
            property_id: property_id.to_string(),
            name: name.to_string(),
        });
    }

    pub fn add_unit(&self, unit: Unit) {
        self.lock_for_seed().units.push(unit);
    }

    pub fn add_category(&self, category: CostCategory) {
        self.lock_for_seed().categories.push(category);
    }

    pub fn add_voucher(&self, voucher: Voucher) {
        self.lock_for_seed().vouchers.push(voucher);
    }

    pub fn add_meter(&self, meter: Meter) {
        self.lock_for_seed().meters.push(meter);
    }

    pub fn add_reading(&self, reading: MeterReading) {
        self.lock_for_seed().readings.push(reading);
    }

    pub fn set_heating_settings(&self, settings: HeatingSettings) {
        self.lock_for_seed()
            .heating_settings
            .insert(settings.property_id.clone(), settings);
    }

    pub fn add_fuel_factor(&self, factor: FuelFactor) {
        self.lock_for_seed().fuel_factors.push(factor);
    }

    pub fn set_purchase(&self, purchase: HeatingPurchase) {
        let mut data = self.lock_for_seed();
        data.purchases
            .retain(|p| !(p.property_id == purchase.property_id && p.year == purchase.year));
        data.purchases.push(purchase);
    }

    pub fn add_advance_payment(&self, payment: AdvancePayment) {
        self.lock_for_seed().advance_payments.push(payment);
    }
}

impl UnitRepository for InMemorySettlementStore {
    fn find_property(&self, property_id: &str) -> RepositoryResult<Option<Property>> {
        let data = self.lock()?;
        Ok(data
            .properties
            .iter()
            .find(|p| p.property_id == property_id)
            .cloned())
    }

    fn list_units(&self, property_id: &str) -> RepositoryResult<Vec<Unit>> {
        let data = self.lock()?;
        let mut units: Vec<Unit> = data
            .units
            .iter()
            .filter(|u| u.property_id == property_id)
            .cloned()
            .collect();
        units.sort_by(|a, b| a.unit_id.cmp(&b.unit_id));
        Ok(units)
    }
}

impl CategoryRepository for InMemorySettlementStore {
    fn list_categories(&self, property_id: &str) -> RepositoryResult<Vec<CostCategory>> {
        let data = self.lock()?;
        let mut categories: Vec<CostCategory> = data
            .categories
            .iter()
            .filter(|c| c.property_id == property_id)
            .cloned()
            .collect();
        categories.sort_by(|a, b| a.category_id.cmp(&b.category_id));
        Ok(categories)
    }

    fn find_category(&self, category_id: &str) -> RepositoryResult<Option<CostCategory>> {
        let data = self.lock()?;
        Ok(data
            .categories
            .iter()
            .find(|c| c.category_id == category_id)
            .cloned())
    }

    fn update_distribution_key(
        &self,
        category_id: &str,
        key: DistributionKey,
    ) -> RepositoryResult<()> {
        let mut data = self.lock()?;
        let category = data
            .categories
            .iter_mut()
            .find(|c| c.category_id == category_id)
            .ok_or_else(|| RepositoryError::NotFound {
                entity: "CostCategory".to_string(),
                id: category_id.to_string(),
            })?;
        category.distribution_key = key;
        category.raw_distribution_key = None;
        Ok(())
    }
}

impl VoucherRepository for InMemorySettlementStore {
    fn list_vouchers(
        &self,
        property_id: &str,
        category_id: &str,
        year: i32,
    ) -> RepositoryResult<Vec<Voucher>> {
        let data = self.lock()?;
        Ok(data
            .vouchers
            .iter()
            .filter(|v| v.property_id == property_id && v.category_id == category_id && v.year == year)
            .cloned()
            .collect())
    }
}

impl MeterRepository for InMemorySettlementStore {
    fn list_meters(&self, property_id: &str) -> RepositoryResult<Vec<Meter>> {
        let data = self.lock()?;
        Ok(data
            .meters
            .iter()
            .filter(|m| m.property_id == property_id)
            .cloned()
            .collect())
    }

    fn list_readings_for_year(
        &self,
        property_id: &str,
        year: i32,
    ) -> RepositoryResult<Vec<MeterReading>> {
        let data = self.lock()?;
        let readings = data
            .readings
            .iter()
            .filter(|r| r.overlaps_year(year))
            .filter_map(|r| {
                // 读数归属以表计为准
                let meter = data
                    .meters
                    .iter()
                    .find(|m| m.meter_id == r.meter_id && m.property_id == property_id)?;
                let mut reading = r.clone();
                reading.unit_id = meter.unit_id.clone();
                Some(reading)
            })
            .collect();
        Ok(readings)
    }
}

impl HeatingRepository for InMemorySettlementStore {
    fn find_settings(&self, property_id: &str) -> RepositoryResult<Option<HeatingSettings>> {
        let data = self.lock()?;
        Ok(data.heating_settings.get(property_id).cloned())
    }

    fn list_fuel_factors(&self) -> RepositoryResult<Vec<FuelFactor>> {
        let data = self.lock()?;
        Ok(data.fuel_factors.clone())
    }

    fn find_purchase(
        &self,
        property_id: &str,
        year: i32,
    ) -> RepositoryResult<Option<HeatingPurchase>> {
        let data = self.lock()?;
        Ok(data
            .purchases
            .iter()
            .find(|p| p.property_id == property_id && p.year == year)
            .cloned())
    }
}

impl OverrideRepository for InMemorySettlementStore {
    fn list_overrides(&self, run_id: &str) -> RepositoryResult<Vec<DistributionOverride>> {
        let data = self.lock()?;
        Ok(data
            .overrides
            .iter()
            .filter(|o| o.run_id == run_id)
            .cloned()
            .collect())
    }

    fn upsert_override(&self, item: &DistributionOverride) -> RepositoryResult<()> {
        let mut data = self.lock()?;
        data.overrides.retain(|o| {
            !(o.run_id == item.run_id && o.category_id == item.category_id && o.unit_id == item.unit_id)
        });
        data.overrides.push(item.clone());
        Ok(())
    }

    fn delete_override(
        &self,
        run_id: &str,
        category_id: &str,
        unit_id: &str,
    ) -> RepositoryResult<bool> {
        let mut data = self.lock()?;
        let before = data.overrides.len();
        data.overrides.retain(|o| {
            !(o.run_id == run_id && o.category_id == category_id && o.unit_id == unit_id)
        });
        Ok(data.overrides.len() != before)
    }
}

impl AdvancePaymentRepository for InMemorySettlementStore {
    fn list_advance_payments(
        &self,
        property_id: &str,
        year: i32,
    ) -> RepositoryResult<Vec<AdvancePayment>> {
        let data = self.lock()?;
        Ok(data
            .advance_payments
            .iter()
            .filter(|a| {
                a.year == year
                    && data
                        .units
                        .iter()
                        .any(|u| u.unit_id == a.unit_id && u.property_id == property_id)
            })
            .cloned()
            .collect())
    }
}

impl StatementRepository for InMemorySettlementStore {
    fn find_run(&self, run_id: &str) -> RepositoryResult<Option<StatementRun>> {
        let data = self.lock()?;
        Ok(data.runs.iter().find(|r| r.run_id == run_id).cloned())
    }

    fn find_run_by_property_year(
        &self,
        property_id: &str,
        year: i32,
    ) -> RepositoryResult<Option<StatementRun>> {
        let data = self.lock()?;
        Ok(data
            .runs
            .iter()
            .find(|r| r.property_id == property_id && r.year == year)
            .cloned())
    }

    fn create_run(&self, run: &StatementRun) -> RepositoryResult<()> {
        let mut data = self.lock()?;
        if data
            .runs
            .iter()
            .any(|r| r.run_id == run.run_id || (r.property_id == run.property_id && r.year == run.year))
        {
            return Err(RepositoryError::UniqueConstraintViolation(format!(
                "statement_run({}, {})",
                run.property_id, run.year
            )));
        }
        data.runs.push(run.clone());
        Ok(())
    }

    fn replace_statement(
        &self,
        run_id: &str,
        rows: &[StatementRow],
        summary: &[StatementSummary],
        config_snapshot_json: Option<&str>,
    ) -> RepositoryResult<()> {
        let mut data = self.lock()?;
        let run = data
            .runs
            .iter_mut()
            .find(|r| r.run_id == run_id)
            .ok_or_else(|| RepositoryError::NotFound {
                entity: "StatementRun".to_string(),
                id: run_id.to_string(),
            })?;
        if run.is_finalized() {
            return Err(RepositoryError::InvalidStateTransition {
                from: StatementStatus::Finalized.to_string(),
                to: StatementStatus::Draft.to_string(),
            });
        }
        if let Some(snapshot) = config_snapshot_json {
            run.config_snapshot_json = Some(snapshot.to_string());
        }
        run.updated_at = Local::now().naive_local();

        data.rows.insert(run_id.to_string(), rows.to_vec());
        data.summaries.insert(run_id.to_string(), summary.to_vec());
        Ok(())
    }

    fn update_status(&self, run_id: &str, status: StatementStatus) -> RepositoryResult<()> {
        let mut data = self.lock()?;
        let run = data
            .runs
            .iter_mut()
            .find(|r| r.run_id == run_id)
            .ok_or_else(|| RepositoryError::NotFound {
                entity: "StatementRun".to_string(),
                id: run_id.to_string(),
            })?;
        let now = Local::now().naive_local();
        run.status = status;
        run.updated_at = now;
        run.finalized_at = match status {
            StatementStatus::Finalized => Some(now),
            StatementStatus::Draft => None,
        };
        Ok(())
    }

    fn list_rows(&self, run_id: &str) -> RepositoryResult<Vec<StatementRow>> {
        let data = self.lock()?;
        Ok(data.rows.get(run_id).cloned().unwrap_or_default())
    }

    fn list_summary(&self, run_id: &str) -> RepositoryResult<Vec<StatementSummary>> {
        let data = self.lock()?;
        Ok(data.summaries.get(run_id).cloned().unwrap_or_default())
    }
}
