// ==========================================
// WEG 运营费用结算 - 供暖数据仓储
// ==========================================
// 包含: heating_settings / fuel_factor / heating_purchase
// ==========================================

use crate::domain::heating::{FuelFactor, HeatingPurchase, HeatingSettings};
use crate::domain::types::{HeatingSystemType, HotwaterUnitMode};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::ports::HeatingRepository;
use crate::repository::sql_utils::{get_decimal, get_optional_decimal};
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult};
use std::sync::{Arc, Mutex};

pub struct HeatingRepositoryImpl {
    conn: Arc<Mutex<Connection>>,
}

impl HeatingRepositoryImpl {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    pub fn upsert_settings(&self, settings: &HeatingSettings) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT OR REPLACE INTO heating_settings (
                property_id, system_type, consumption_share_percent,
                supply_temp_c, hotwater_unit_mode
            ) VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                settings.property_id,
                settings.system_type.to_db_str(),
                settings.consumption_share_percent,
                settings.supply_temp_c,
                settings.hotwater_unit_mode.to_db_str(),
            ],
        )?;
        Ok(())
    }

    pub fn upsert_fuel_factor(&self, factor: &FuelFactor) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT OR REPLACE INTO fuel_factor (kind, calorific_value, state_number) VALUES (?1, ?2, ?3)",
            params![factor.kind, factor.calorific_value, factor.state_number],
        )?;
        Ok(())
    }

    pub fn upsert_purchase(&self, purchase: &HeatingPurchase) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT OR REPLACE INTO heating_purchase (
                property_id, year, fuel_input_type, input_amount, unit_price,
                gross_cost, warmwater_meter_id, period_start, period_end
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
            params![
                purchase.property_id,
                purchase.year,
                purchase.fuel_input_type,
                purchase.input_amount,
                purchase.unit_price.to_string(),
                purchase.gross_cost.map(|c| c.to_string()),
                purchase.warmwater_meter_id,
                purchase.period_start,
                purchase.period_end,
            ],
        )?;
        Ok(())
    }
}

impl HeatingRepository for HeatingRepositoryImpl {
    fn find_settings(&self, property_id: &str) -> RepositoryResult<Option<HeatingSettings>> {
        let conn = self.get_conn()?;
        let settings = conn
            .query_row(
                r#"
                SELECT property_id, system_type, consumption_share_percent,
                       supply_temp_c, hotwater_unit_mode
                FROM heating_settings
                WHERE property_id = ?1
                "#,
                params![property_id],
                |row| {
                    Ok(HeatingSettings {
                        property_id: row.get(0)?,
                        system_type: HeatingSystemType::from_str(&row.get::<_, String>(1)?),
                        consumption_share_percent: row.get(2)?,
                        supply_temp_c: row.get(3)?,
                        hotwater_unit_mode: HotwaterUnitMode::from_str(&row.get::<_, String>(4)?),
                    })
                },
            )
            .optional()?;
        Ok(settings)
    }

    fn list_fuel_factors(&self) -> RepositoryResult<Vec<FuelFactor>> {
        let conn = self.get_conn()?;
        let mut stmt =
            conn.prepare("SELECT kind, calorific_value, state_number FROM fuel_factor ORDER BY kind")?;
        let factors = stmt
            .query_map([], |row| {
                Ok(FuelFactor {
                    kind: row.get(0)?,
                    calorific_value: row.get(1)?,
                    state_number: row.get(2)?,
                })
            })?
            .collect::<SqliteResult<Vec<FuelFactor>>>()?;
        Ok(factors)
    }

    fn find_purchase(
        &self,
        property_id: &str,
        year: i32,
    ) -> RepositoryResult<Option<HeatingPurchase>> {
        let conn = self.get_conn()?;
        let purchase = conn
            .query_row(
                r#"
                SELECT property_id, year, fuel_input_type, input_amount, unit_price,
                       gross_cost, warmwater_meter_id, period_start, period_end
                FROM heating_purchase
                WHERE property_id = ?1 AND year = ?2
                "#,
                params![property_id, year],
                |row| {
                    Ok(HeatingPurchase {
                        property_id: row.get(0)?,
                        year: row.get(1)?,
                        fuel_input_type: row.get(2)?,
                        input_amount: row.get(3)?,
                        unit_price: get_decimal(row, 4)?,
                        gross_cost: get_optional_decimal(row, 5)?,
                        warmwater_meter_id: row.get(6)?,
                        period_start: row.get(7)?,
                        period_end: row.get(8)?,
                    })
                },
            )
            .optional()?;
        Ok(purchase)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_in_memory_shared;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    #[test]
    fn test_purchase_round_trip_keeps_missing_gross_cost() {
        let conn = open_in_memory_shared().unwrap();
        conn.lock()
            .unwrap()
            .execute("INSERT INTO property (property_id, name) VALUES ('P1', 'Haus')", [])
            .unwrap();
        let repo = HeatingRepositoryImpl::new(conn);

        repo.upsert_purchase(&HeatingPurchase {
            property_id: "P1".to_string(),
            year: 2024,
            fuel_input_type: "kwh".to_string(),
            input_amount: 1000.0,
            unit_price: dec!(0.10),
            gross_cost: None,
            warmwater_meter_id: None,
            period_start: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            period_end: NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
        })
        .unwrap();

        let loaded = repo.find_purchase("P1", 2024).unwrap().unwrap();
        assert_eq!(loaded.unit_price, dec!(0.10));
        assert!(loaded.gross_cost.is_none());
        assert_eq!(loaded.period_start, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert_eq!(loaded.period_end, NaiveDate::from_ymd_opt(2024, 12, 31).unwrap());
        assert!(loaded.is_kwh_input());
        assert!(repo.find_purchase("P1", 2023).unwrap().is_none());
    }
}
