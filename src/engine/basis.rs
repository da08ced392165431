// ==========================================
// WEG 运营费用结算 - 分摊基数计算
// ==========================================
// 职责: 按分摊键为每个单元给出基数（面积/份额/人数/用量/户数）
// 红线: 基数永不为负；缺读数记 0，不报错
// ==========================================
// 输入: 单元、表计、读数快照（全部在计算前物化）
// 输出: BasisResult { label, unit, rows }
// ==========================================

use crate::domain::{
    CostCategory, DistributionKey, Meter, MeterReading, MeterType, Unit,
};
use crate::engine::error::{ComputationWarning, EngineError, EngineResult};
use crate::repository::{MeterRepository, UnitRepository};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

// ==========================================
// BasisRow / BasisResult
// ==========================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BasisRow {
    pub unit_id: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BasisResult {
    pub key: DistributionKey,
    pub label: String,
    pub unit: String,
    pub rows: Vec<BasisRow>, // 按 unit_id 排序
}

impl BasisResult {
    /// 全部单元基数之和
    pub fn total(&self) -> f64 {
        self.rows.iter().map(|r| r.value).sum()
    }
}

// ==========================================
// BasisSnapshot - 基数计算所需的物化数据
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct BasisSnapshot {
    pub year: i32,
    pub units: Vec<Unit>,
    pub meters: Vec<Meter>,
    pub readings: Vec<MeterReading>,
}

impl BasisSnapshot {
    /// 某单元某类表计在年度内的用量合计
    ///
    /// 负读数按 0 计；公共表（unit_id 为空）不计入任何单元。
    pub fn unit_consumption(&self, unit_id: &str, meter_types: &[MeterType]) -> f64 {
        let meter_types_by_id: HashMap<&str, MeterType> = self
            .meters
            .iter()
            .map(|m| (m.meter_id.as_str(), m.meter_type))
            .collect();

        self.readings
            .iter()
            .filter(|r| r.unit_id.as_deref() == Some(unit_id))
            .filter(|r| r.overlaps_year(self.year))
            .filter(|r| {
                meter_types_by_id
                    .get(r.meter_id.as_str())
                    .map(|t| meter_types.contains(t))
                    .unwrap_or(false)
            })
            .map(|r| {
                if r.consumption < 0.0 || !r.consumption.is_finite() {
                    warn!(
                        meter_id = %r.meter_id,
                        consumption = r.consumption,
                        "读数为负或非法，按 0 计"
                    );
                    0.0
                } else {
                    r.consumption
                }
            })
            .sum()
    }

    /// 指定表计（不限单元）在年度内的用量合计
    pub fn meter_consumption(&self, meter_id: &str) -> f64 {
        self.readings
            .iter()
            .filter(|r| r.meter_id == meter_id && r.overlaps_year(self.year))
            .map(|r| r.consumption.max(0.0))
            .filter(|v| v.is_finite())
            .sum()
    }
}

// ==========================================
// BasisCalculator - 分摊基数计算器
// ==========================================
pub struct BasisCalculator {
    unit_repo: Arc<dyn UnitRepository>,
    meter_repo: Arc<dyn MeterRepository>,
}

impl BasisCalculator {
    pub fn new(unit_repo: Arc<dyn UnitRepository>, meter_repo: Arc<dyn MeterRepository>) -> Self {
        Self {
            unit_repo,
            meter_repo,
        }
    }

    /// 读取物业数据并计算基数
    pub fn compute_basis(
        &self,
        property_id: &str,
        year: i32,
        key: DistributionKey,
    ) -> EngineResult<BasisResult> {
        let snapshot = self.load_snapshot(property_id, year)?;
        Ok(Self::basis_from_snapshot(&snapshot, key))
    }

    /// 物化基数计算所需的数据
    pub fn load_snapshot(&self, property_id: &str, year: i32) -> EngineResult<BasisSnapshot> {
        if self.unit_repo.find_property(property_id)?.is_none() {
            return Err(EngineError::PropertyNotFound(property_id.to_string()));
        }
        Ok(BasisSnapshot {
            year,
            units: self.unit_repo.list_units(property_id)?,
            meters: self.meter_repo.list_meters(property_id)?,
            readings: self.meter_repo.list_readings_for_year(property_id, year)?,
        })
    }

    /// 按分摊键计算（纯函数）
    pub fn basis_from_snapshot(snapshot: &BasisSnapshot, key: DistributionKey) -> BasisResult {
        let mut units: Vec<&Unit> = snapshot.units.iter().collect();
        units.sort_by(|a, b| a.unit_id.cmp(&b.unit_id));

        let rows = units
            .into_iter()
            .map(|unit| {
                let value = match key {
                    DistributionKey::OwnershipShare => unit.ownership_share,
                    DistributionKey::LivingArea => unit.area_m2,
                    DistributionKey::PersonCount => unit.person_count,
                    DistributionKey::UnitCount | DistributionKey::PerFlat => 1.0,
                    DistributionKey::ColdWater => {
                        snapshot.unit_consumption(&unit.unit_id, &[MeterType::ColdWater])
                    }
                    DistributionKey::TotalWater => snapshot.unit_consumption(
                        &unit.unit_id,
                        &[MeterType::ColdWater, MeterType::WarmWater],
                    ),
                    DistributionKey::HeatingEnergy => {
                        snapshot.unit_consumption(&unit.unit_id, &[MeterType::HeatHeating])
                    }
                    DistributionKey::WarmWaterEnergy => {
                        snapshot.unit_consumption(&unit.unit_id, &[MeterType::HeatWarmWater])
                    }
                    DistributionKey::Individual => 0.0,
                };
                BasisRow {
                    unit_id: unit.unit_id.clone(),
                    value: sanitize(value),
                }
            })
            .collect::<Vec<_>>();

        debug!(
            key = %key,
            unit_count = rows.len(),
            "基数计算完成"
        );

        BasisResult {
            key,
            label: key.label().to_string(),
            unit: key.unit().to_string(),
            rows,
        }
    }

    /// 按类别计算基数；分摊键无法识别时附带 basis_unavailable
    pub fn basis_for_category(
        snapshot: &BasisSnapshot,
        category: &CostCategory,
    ) -> (BasisResult, Option<ComputationWarning>) {
        let basis = Self::basis_from_snapshot(snapshot, category.distribution_key);
        let warning = category.raw_distribution_key.as_ref().map(|raw| {
            warn!(
                category_id = %category.category_id,
                raw_key = %raw,
                "分摊键无法识别，按单独指定处理"
            );
            ComputationWarning::BasisUnavailable {
                category_id: category.category_id.clone(),
                raw_key: raw.clone(),
            }
        });
        (basis, warning)
    }
}

fn sanitize(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::CategoryKind;
    use crate::repository::InMemorySettlementStore;
    use chrono::NaiveDate;

    fn meter(id: &str, unit_id: Option<&str>, meter_type: MeterType) -> Meter {
        Meter {
            meter_id: id.to_string(),
            property_id: "P1".to_string(),
            unit_id: unit_id.map(str::to_string),
            meter_type,
            label: None,
        }
    }

    fn reading(meter_id: &str, unit_id: Option<&str>, year: i32, consumption: f64) -> MeterReading {
        MeterReading {
            meter_id: meter_id.to_string(),
            unit_id: unit_id.map(str::to_string),
            period_start: NaiveDate::from_ymd_opt(year, 1, 1).unwrap(),
            period_end: NaiveDate::from_ymd_opt(year, 12, 31).unwrap(),
            consumption,
        }
    }

    fn snapshot() -> BasisSnapshot {
        BasisSnapshot {
            year: 2024,
            units: vec![
                Unit::new("U2", "P1", 50.0, 300.0, 1.0),
                Unit::new("U1", "P1", 100.0, 700.0, 2.5),
            ],
            meters: vec![
                meter("KW1", Some("U1"), MeterType::ColdWater),
                meter("WW1", Some("U1"), MeterType::WarmWater),
                meter("KW2", Some("U2"), MeterType::ColdWater),
                meter("WMZ1", Some("U1"), MeterType::HeatHeating),
                meter("HAUS", None, MeterType::ColdWater),
            ],
            readings: vec![
                reading("KW1", Some("U1"), 2024, 30.0),
                reading("WW1", Some("U1"), 2024, 12.0),
                reading("KW2", Some("U2"), 2024, 20.0),
                reading("KW2", Some("U2"), 2023, 99.0),
                reading("WMZ1", Some("U1"), 2024, 4.2),
                reading("HAUS", None, 2024, 500.0),
            ],
        }
    }

    fn values(result: &BasisResult) -> Vec<(String, f64)> {
        result
            .rows
            .iter()
            .map(|r| (r.unit_id.clone(), r.value))
            .collect()
    }

    #[test]
    fn test_static_keys_sorted_by_unit() {
        let snap = snapshot();
        let area = BasisCalculator::basis_from_snapshot(&snap, DistributionKey::LivingArea);
        assert_eq!(area.label, "Wohnfläche");
        assert_eq!(area.unit, "m²");
        assert_eq!(
            values(&area),
            vec![("U1".to_string(), 100.0), ("U2".to_string(), 50.0)]
        );

        let persons = BasisCalculator::basis_from_snapshot(&snap, DistributionKey::PersonCount);
        assert_eq!(persons.total(), 3.5);

        let flats = BasisCalculator::basis_from_snapshot(&snap, DistributionKey::PerFlat);
        assert_eq!(flats.total(), 2.0);

        let individual = BasisCalculator::basis_from_snapshot(&snap, DistributionKey::Individual);
        assert_eq!(individual.total(), 0.0);
    }

    #[test]
    fn test_water_keys_use_in_year_readings_only() {
        let snap = snapshot();
        let cold = BasisCalculator::basis_from_snapshot(&snap, DistributionKey::ColdWater);
        assert_eq!(
            values(&cold),
            vec![("U1".to_string(), 30.0), ("U2".to_string(), 20.0)]
        );

        let total = BasisCalculator::basis_from_snapshot(&snap, DistributionKey::TotalWater);
        assert_eq!(
            values(&total),
            vec![("U1".to_string(), 42.0), ("U2".to_string(), 20.0)]
        );
    }

    #[test]
    fn test_missing_meter_data_yields_zero() {
        let snap = snapshot();
        let heat = BasisCalculator::basis_from_snapshot(&snap, DistributionKey::HeatingEnergy);
        assert_eq!(
            values(&heat),
            vec![("U1".to_string(), 4.2), ("U2".to_string(), 0.0)]
        );
        let ww = BasisCalculator::basis_from_snapshot(&snap, DistributionKey::WarmWaterEnergy);
        assert_eq!(ww.total(), 0.0);
    }

    #[test]
    fn test_negative_reading_clamped() {
        let mut snap = snapshot();
        snap.readings.push(reading("KW2", Some("U2"), 2024, -50.0));
        let cold = BasisCalculator::basis_from_snapshot(&snap, DistributionKey::ColdWater);
        assert!(cold.rows.iter().all(|r| r.value >= 0.0));
        assert_eq!(cold.rows[1].value, 20.0);
    }

    #[test]
    fn test_unknown_category_key_warns() {
        let snap = snapshot();
        let category = CostCategory {
            category_id: "C9".to_string(),
            property_id: "P1".to_string(),
            name: "Sonstiges".to_string(),
            kind: CategoryKind::Operating,
            distribution_key: DistributionKey::Individual,
            raw_distribution_key: Some("nach Laune".to_string()),
        };
        let (basis, warning) = BasisCalculator::basis_for_category(&snap, &category);
        assert_eq!(basis.total(), 0.0);
        assert_eq!(warning.map(|w| w.code()), Some("basis_unavailable"));
    }

    #[test]
    fn test_compute_basis_reads_repositories() {
        let store = Arc::new(InMemorySettlementStore::new());
        store.add_property("P1", "Musterstraße 1");
        store.add_unit(Unit::new("U1", "P1", 80.0, 500.0, 2.0));
        store.add_unit(Unit::new("U2", "P1", 40.0, 500.0, 1.0));

        let calculator = BasisCalculator::new(store.clone(), store.clone());
        let result = calculator
            .compute_basis("P1", 2024, DistributionKey::OwnershipShare)
            .unwrap();
        assert_eq!(result.total(), 1000.0);

        let missing = calculator.compute_basis("P404", 2024, DistributionKey::LivingArea);
        assert!(matches!(missing, Err(EngineError::PropertyNotFound(_))));
    }
}
