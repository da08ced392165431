// ==========================================
// WEG 运营费用结算 - 人工分摊覆写仓储
// ==========================================
// 红线: upsert 幂等；删除即恢复自动分摊
// ==========================================

use crate::domain::cost::DistributionOverride;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::ports::OverrideRepository;
use crate::repository::sql_utils::get_decimal;
use rusqlite::{params, Connection, Result as SqliteResult};
use std::sync::{Arc, Mutex};

pub struct OverrideRepositoryImpl {
    conn: Arc<Mutex<Connection>>,
}

impl OverrideRepositoryImpl {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }
}

impl OverrideRepository for OverrideRepositoryImpl {
    fn list_overrides(&self, run_id: &str) -> RepositoryResult<Vec<DistributionOverride>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT run_id, category_id, unit_id, manual_amount_gross
            FROM distribution_override
            WHERE run_id = ?1
            ORDER BY category_id, unit_id
            "#,
        )?;

        let items = stmt
            .query_map(params![run_id], |row| {
                Ok(DistributionOverride {
                    run_id: row.get(0)?,
                    category_id: row.get(1)?,
                    unit_id: row.get(2)?,
                    manual_amount_gross: get_decimal(row, 3)?,
                })
            })?
            .collect::<SqliteResult<Vec<DistributionOverride>>>()?;
        Ok(items)
    }

    fn upsert_override(&self, item: &DistributionOverride) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO distribution_override (run_id, category_id, unit_id, manual_amount_gross)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(run_id, category_id, unit_id)
            DO UPDATE SET manual_amount_gross = excluded.manual_amount_gross
            "#,
            params![
                item.run_id,
                item.category_id,
                item.unit_id,
                item.manual_amount_gross.to_string(),
            ],
        )?;
        Ok(())
    }

    fn delete_override(
        &self,
        run_id: &str,
        category_id: &str,
        unit_id: &str,
    ) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            "DELETE FROM distribution_override WHERE run_id = ?1 AND category_id = ?2 AND unit_id = ?3",
            params![run_id, category_id, unit_id],
        )?;
        Ok(affected > 0)
    }
}
