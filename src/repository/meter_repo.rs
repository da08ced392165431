// ==========================================
// WEG 运营费用结算 - 表计仓储
// ==========================================

use crate::domain::meter::{Meter, MeterReading};
use crate::domain::types::MeterType;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::ports::MeterRepository;
use rusqlite::{params, Connection, Result as SqliteResult};
use std::sync::{Arc, Mutex};

pub struct MeterRepositoryImpl {
    conn: Arc<Mutex<Connection>>,
}

impl MeterRepositoryImpl {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    pub fn upsert_meter(&self, meter: &Meter) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT OR REPLACE INTO meter (meter_id, property_id, unit_id, meter_type, label)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                meter.meter_id,
                meter.property_id,
                meter.unit_id,
                meter.meter_type.to_db_str(),
                meter.label,
            ],
        )?;
        Ok(())
    }

    /// 批量插入读数（读数归属以 meter 表为准）
    pub fn insert_readings(&self, readings: &[MeterReading]) -> RepositoryResult<usize> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        let mut count = 0;
        for r in readings {
            count += tx.execute(
                r#"
                INSERT INTO meter_reading (meter_id, period_start, period_end, consumption)
                VALUES (?1, ?2, ?3, ?4)
                "#,
                params![
                    r.meter_id,
                    r.period_start,
                    r.period_end,
                    r.consumption,
                ],
            )?;
        }

        tx.commit()?;
        Ok(count)
    }
}

impl MeterRepository for MeterRepositoryImpl {
    fn list_meters(&self, property_id: &str) -> RepositoryResult<Vec<Meter>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT meter_id, property_id, unit_id, meter_type, label
            FROM meter
            WHERE property_id = ?1
            ORDER BY meter_id
            "#,
        )?;

        let rows = stmt
            .query_map(params![property_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<String>>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, Option<String>>(4)?,
                ))
            })?
            .collect::<SqliteResult<Vec<_>>>()?;

        let mut meters = Vec::with_capacity(rows.len());
        for (meter_id, property_id, unit_id, meter_type, label) in rows {
            // 未知表计类型视为数据质量问题，跳过而不是失败
            let Some(meter_type) = MeterType::from_str(&meter_type) else {
                tracing::warn!(meter_id = %meter_id, raw_type = %meter_type, "未知表计类型，已忽略");
                continue;
            };
            meters.push(Meter {
                meter_id,
                property_id,
                unit_id,
                meter_type,
                label,
            });
        }
        Ok(meters)
    }

    fn list_readings_for_year(
        &self,
        property_id: &str,
        year: i32,
    ) -> RepositoryResult<Vec<MeterReading>> {
        let conn = self.get_conn()?;
        let year_start = format!("{:04}-01-01", year);
        let year_end = format!("{:04}-12-31", year);

        let mut stmt = conn.prepare(
            r#"
            SELECT r.meter_id, m.unit_id, r.period_start, r.period_end, r.consumption
            FROM meter_reading r
            JOIN meter m ON m.meter_id = r.meter_id
            WHERE m.property_id = ?1
              AND r.period_start <= ?3
              AND r.period_end >= ?2
            ORDER BY r.meter_id, r.period_start
            "#,
        )?;

        let readings = stmt
            .query_map(params![property_id, year_start, year_end], |row| {
                Ok(MeterReading {
                    meter_id: row.get(0)?,
                    unit_id: row.get(1)?,
                    period_start: row.get(2)?,
                    period_end: row.get(3)?,
                    consumption: row.get(4)?,
                })
            })?
            .collect::<SqliteResult<Vec<MeterReading>>>()?;
        Ok(readings)
    }
}
