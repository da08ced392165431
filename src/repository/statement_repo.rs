// ==========================================
// WEG 运营费用结算 - 结算批次仓储
// ==========================================
// 红线:
// - 重算 = 整体替换（先删后插），必须在同一事务内完成
// - 状态更新不触碰结果行
// ==========================================

use crate::domain::statement::{StatementRow, StatementRun, StatementSummary};
use crate::domain::types::{CostType, DistributionKey, StatementStatus};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::ports::StatementRepository;
use crate::repository::sql_utils::get_decimal;
use chrono::Local;
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult};
use std::sync::{Arc, Mutex};

pub struct StatementRepositoryImpl {
    conn: Arc<Mutex<Connection>>,
}

impl StatementRepositoryImpl {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn map_run(row: &rusqlite::Row) -> rusqlite::Result<StatementRun> {
        Ok(StatementRun {
            run_id: row.get(0)?,
            property_id: row.get(1)?,
            year: row.get(2)?,
            status: StatementStatus::from_str(&row.get::<_, String>(3)?),
            config_snapshot_json: row.get(4)?,
            created_at: row.get(5)?,
            updated_at: row.get(6)?,
            finalized_at: row.get(7)?,
        })
    }
}

const RUN_COLUMNS: &str = "run_id, property_id, year, status, config_snapshot_json, created_at, updated_at, finalized_at";

impl StatementRepository for StatementRepositoryImpl {
    fn find_run(&self, run_id: &str) -> RepositoryResult<Option<StatementRun>> {
        let conn = self.get_conn()?;
        let sql = format!("SELECT {} FROM statement_run WHERE run_id = ?1", RUN_COLUMNS);
        let run = conn
            .query_row(&sql, params![run_id], Self::map_run)
            .optional()?;
        Ok(run)
    }

    fn find_run_by_property_year(
        &self,
        property_id: &str,
        year: i32,
    ) -> RepositoryResult<Option<StatementRun>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM statement_run WHERE property_id = ?1 AND year = ?2",
            RUN_COLUMNS
        );
        let run = conn
            .query_row(&sql, params![property_id, year], Self::map_run)
            .optional()?;
        Ok(run)
    }

    fn create_run(&self, run: &StatementRun) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO statement_run (
                run_id, property_id, year, status, config_snapshot_json,
                created_at, updated_at, finalized_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                run.run_id,
                run.property_id,
                run.year,
                run.status.to_db_str(),
                run.config_snapshot_json,
                run.created_at,
                run.updated_at,
                run.finalized_at,
            ],
        )?;
        Ok(())
    }

    fn replace_statement(
        &self,
        run_id: &str,
        rows: &[StatementRow],
        summary: &[StatementSummary],
        config_snapshot_json: Option<&str>,
    ) -> RepositoryResult<()> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        // 事务内再次确认状态，避免并发定稿后被覆盖
        let status: Option<String> = tx
            .query_row(
                "SELECT status FROM statement_run WHERE run_id = ?1",
                params![run_id],
                |row| row.get(0),
            )
            .optional()?;
        match status.as_deref().map(StatementStatus::from_str) {
            None => {
                return Err(RepositoryError::NotFound {
                    entity: "StatementRun".to_string(),
                    id: run_id.to_string(),
                })
            }
            Some(StatementStatus::Finalized) => {
                return Err(RepositoryError::InvalidStateTransition {
                    from: StatementStatus::Finalized.to_string(),
                    to: StatementStatus::Draft.to_string(),
                })
            }
            Some(StatementStatus::Draft) => {}
        }

        tx.execute("DELETE FROM statement_row WHERE run_id = ?1", params![run_id])?;
        tx.execute("DELETE FROM statement_summary WHERE run_id = ?1", params![run_id])?;

        for (seq_no, row) in rows.iter().enumerate() {
            tx.execute(
                r#"
                INSERT INTO statement_row (
                    run_id, seq_no, unit_id, category_id, cost_type, label,
                    distribution_key, basis_value, share_percent, amount_gross, overridden
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                "#,
                params![
                    run_id,
                    seq_no as i64,
                    row.unit_id,
                    row.category_id,
                    row.cost_type.to_db_str(),
                    row.label,
                    row.distribution_key.map(|k| k.to_db_str()),
                    row.basis_value,
                    row.share_percent,
                    row.amount_gross.to_string(),
                    if row.overridden { 1 } else { 0 },
                ],
            )?;
        }

        for s in summary {
            tx.execute(
                r#"
                INSERT INTO statement_summary (
                    run_id, unit_id, total_costs, advance_payments, balance
                ) VALUES (?1, ?2, ?3, ?4, ?5)
                "#,
                params![
                    run_id,
                    s.unit_id,
                    s.total_costs.to_string(),
                    s.advance_payments.to_string(),
                    s.balance.to_string(),
                ],
            )?;
        }

        tx.execute(
            r#"
            UPDATE statement_run
            SET config_snapshot_json = COALESCE(?2, config_snapshot_json),
                updated_at = ?3
            WHERE run_id = ?1
            "#,
            params![
                run_id,
                config_snapshot_json,
                Local::now().naive_local(),
            ],
        )?;

        tx.commit()?;
        Ok(())
    }

    fn update_status(&self, run_id: &str, status: StatementStatus) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let now = Local::now().naive_local();
        let finalized_at = match status {
            StatementStatus::Finalized => Some(now),
            StatementStatus::Draft => None,
        };

        let affected = conn.execute(
            r#"
            UPDATE statement_run
            SET status = ?2, updated_at = ?3, finalized_at = ?4
            WHERE run_id = ?1
            "#,
            params![run_id, status.to_db_str(), now, finalized_at],
        )?;

        if affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: "StatementRun".to_string(),
                id: run_id.to_string(),
            });
        }
        Ok(())
    }

    fn list_rows(&self, run_id: &str) -> RepositoryResult<Vec<StatementRow>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT unit_id, category_id, cost_type, label, distribution_key,
                   basis_value, share_percent, amount_gross, overridden
            FROM statement_row
            WHERE run_id = ?1
            ORDER BY seq_no
            "#,
        )?;

        let rows = stmt
            .query_map(params![run_id], |row| {
                let key: Option<String> = row.get(4)?;
                Ok(StatementRow {
                    unit_id: row.get(0)?,
                    category_id: row.get(1)?,
                    cost_type: CostType::from_str(&row.get::<_, String>(2)?),
                    label: row.get(3)?,
                    distribution_key: key.as_deref().and_then(DistributionKey::parse),
                    basis_value: row.get(5)?,
                    share_percent: row.get(6)?,
                    amount_gross: get_decimal(row, 7)?,
                    overridden: row.get::<_, i64>(8)? != 0,
                })
            })?
            .collect::<SqliteResult<Vec<StatementRow>>>()?;
        Ok(rows)
    }

    fn list_summary(&self, run_id: &str) -> RepositoryResult<Vec<StatementSummary>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT unit_id, total_costs, advance_payments, balance
            FROM statement_summary
            WHERE run_id = ?1
            ORDER BY unit_id
            "#,
        )?;

        let summary = stmt
            .query_map(params![run_id], |row| {
                Ok(StatementSummary {
                    unit_id: row.get(0)?,
                    total_costs: get_decimal(row, 1)?,
                    advance_payments: get_decimal(row, 2)?,
                    balance: get_decimal(row, 3)?,
                })
            })?
            .collect::<SqliteResult<Vec<StatementSummary>>>()?;
        Ok(summary)
    }
}
