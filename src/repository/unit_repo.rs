// ==========================================
// WEG 运营费用结算 - 物业与单元仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// ==========================================

use crate::domain::property::{Property, Unit};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::ports::UnitRepository;
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult};
use std::sync::{Arc, Mutex};

// ==========================================
// UnitRepositoryImpl - 物业与单元仓储
// ==========================================
pub struct UnitRepositoryImpl {
    conn: Arc<Mutex<Connection>>,
}

impl UnitRepositoryImpl {
    /// 从已有连接创建仓储实例
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 插入或更新物业
    pub fn upsert_property(&self, property: &Property) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT OR REPLACE INTO property (property_id, name) VALUES (?1, ?2)",
            params![property.property_id, property.name],
        )?;
        Ok(())
    }

    /// 批量插入或更新单元
    ///
    /// # 返回
    /// - Ok(usize): 写入的记录数
    pub fn upsert_units(&self, units: &[Unit]) -> RepositoryResult<usize> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        let mut count = 0;
        for unit in units {
            count += tx.execute(
                r#"
                INSERT OR REPLACE INTO unit (
                    unit_id, property_id, name, area_m2, ownership_share, person_count
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
                params![
                    unit.unit_id,
                    unit.property_id,
                    unit.name,
                    unit.area_m2,
                    unit.ownership_share,
                    unit.person_count,
                ],
            )?;
        }

        tx.commit()?;
        Ok(count)
    }

    fn map_row(row: &rusqlite::Row) -> rusqlite::Result<Unit> {
        Ok(Unit {
            unit_id: row.get(0)?,
            property_id: row.get(1)?,
            name: row.get(2)?,
            area_m2: row.get(3)?,
            ownership_share: row.get(4)?,
            person_count: row.get(5)?,
        })
    }
}

impl UnitRepository for UnitRepositoryImpl {
    fn find_property(&self, property_id: &str) -> RepositoryResult<Option<Property>> {
        let conn = self.get_conn()?;
        let property = conn
            .query_row(
                "SELECT property_id, name FROM property WHERE property_id = ?1",
                params![property_id],
                |row| {
                    Ok(Property {
                        property_id: row.get(0)?,
                        name: row.get(1)?,
                    })
                },
            )
            .optional()?;
        Ok(property)
    }

    fn list_units(&self, property_id: &str) -> RepositoryResult<Vec<Unit>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT unit_id, property_id, name, area_m2, ownership_share, person_count
            FROM unit
            WHERE property_id = ?1
            ORDER BY unit_id
            "#,
        )?;

        let units = stmt
            .query_map(params![property_id], Self::map_row)?
            .collect::<SqliteResult<Vec<Unit>>>()?;
        Ok(units)
    }
}
