// ==========================================
// WEG 运营费用结算 - 预付款仓储
// ==========================================

use crate::domain::cost::AdvancePayment;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::ports::AdvancePaymentRepository;
use crate::repository::sql_utils::get_decimal;
use rusqlite::{params, Connection, Result as SqliteResult};
use std::sync::{Arc, Mutex};

pub struct AdvancePaymentRepositoryImpl {
    conn: Arc<Mutex<Connection>>,
}

impl AdvancePaymentRepositoryImpl {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    pub fn upsert(&self, payment: &AdvancePayment) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT OR REPLACE INTO advance_payment (unit_id, year, amount) VALUES (?1, ?2, ?3)",
            params![payment.unit_id, payment.year, payment.amount.to_string()],
        )?;
        Ok(())
    }
}

impl AdvancePaymentRepository for AdvancePaymentRepositoryImpl {
    fn list_advance_payments(
        &self,
        property_id: &str,
        year: i32,
    ) -> RepositoryResult<Vec<AdvancePayment>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT a.unit_id, a.year, a.amount
            FROM advance_payment a
            JOIN unit u ON u.unit_id = a.unit_id
            WHERE u.property_id = ?1 AND a.year = ?2
            ORDER BY a.unit_id
            "#,
        )?;

        let payments = stmt
            .query_map(params![property_id, year], |row| {
                Ok(AdvancePayment {
                    unit_id: row.get(0)?,
                    year: row.get(1)?,
                    amount: get_decimal(row, 2)?,
                })
            })?
            .collect::<SqliteResult<Vec<AdvancePayment>>>()?;
        Ok(payments)
    }
}
