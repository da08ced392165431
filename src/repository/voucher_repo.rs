// ==========================================
// WEG 运营费用结算 - 凭证仓储
// ==========================================
// 红线: 返回全部凭证（含未计入结算的），过滤由汇总器负责
// ==========================================

use crate::domain::cost::Voucher;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::ports::VoucherRepository;
use crate::repository::sql_utils::get_decimal;
use rusqlite::{params, Connection, Result as SqliteResult};
use std::sync::{Arc, Mutex};

pub struct VoucherRepositoryImpl {
    conn: Arc<Mutex<Connection>>,
}

impl VoucherRepositoryImpl {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 批量插入或更新凭证
    pub fn upsert_batch(&self, vouchers: &[Voucher]) -> RepositoryResult<usize> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        let mut count = 0;
        for v in vouchers {
            count += tx.execute(
                r#"
                INSERT OR REPLACE INTO voucher (
                    voucher_id, property_id, category_id, year,
                    gross_amount, include_in_statement, description
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
                params![
                    v.voucher_id,
                    v.property_id,
                    v.category_id,
                    v.year,
                    v.gross_amount.to_string(),
                    if v.include_in_statement { 1 } else { 0 },
                    v.description,
                ],
            )?;
        }

        tx.commit()?;
        Ok(count)
    }
}

impl VoucherRepository for VoucherRepositoryImpl {
    fn list_vouchers(
        &self,
        property_id: &str,
        category_id: &str,
        year: i32,
    ) -> RepositoryResult<Vec<Voucher>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT voucher_id, property_id, category_id, year,
                   gross_amount, include_in_statement, description
            FROM voucher
            WHERE property_id = ?1 AND category_id = ?2 AND year = ?3
            ORDER BY voucher_id
            "#,
        )?;

        let vouchers = stmt
            .query_map(params![property_id, category_id, year], |row| {
                Ok(Voucher {
                    voucher_id: row.get(0)?,
                    property_id: row.get(1)?,
                    category_id: row.get(2)?,
                    year: row.get(3)?,
                    gross_amount: get_decimal(row, 4)?,
                    include_in_statement: row.get::<_, i64>(5)? != 0,
                    description: row.get(6)?,
                })
            })?
            .collect::<SqliteResult<Vec<Voucher>>>()?;
        Ok(vouchers)
    }
}
