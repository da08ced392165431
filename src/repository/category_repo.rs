// ==========================================
// WEG 运营费用结算 - 费用类别仓储
// ==========================================
// 红线: 分摊键只能通过 update_distribution_key 显式修改
// ==========================================

use crate::domain::cost::CostCategory;
use crate::domain::types::{CategoryKind, DistributionKey};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::ports::CategoryRepository;
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult};
use std::sync::{Arc, Mutex};

pub struct CategoryRepositoryImpl {
    conn: Arc<Mutex<Connection>>,
}

impl CategoryRepositoryImpl {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 插入或更新费用类别
    ///
    /// 若 raw_distribution_key 有值则原样写入（保留无法识别的历史键值）
    pub fn upsert(&self, category: &CostCategory) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let key_str = category
            .raw_distribution_key
            .clone()
            .unwrap_or_else(|| category.distribution_key.to_db_str().to_string());

        conn.execute(
            r#"
            INSERT OR REPLACE INTO cost_category (
                category_id, property_id, name, kind, distribution_key
            ) VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                category.category_id,
                category.property_id,
                category.name,
                category.kind.to_db_str(),
                key_str,
            ],
        )?;
        Ok(())
    }

    fn map_row(row: &rusqlite::Row) -> rusqlite::Result<CostCategory> {
        let kind: String = row.get(3)?;
        let raw_key: String = row.get(4)?;
        let (distribution_key, raw_distribution_key) = match DistributionKey::parse(&raw_key) {
            Some(key) => (key, None),
            None => (DistributionKey::Individual, Some(raw_key)),
        };

        Ok(CostCategory {
            category_id: row.get(0)?,
            property_id: row.get(1)?,
            name: row.get(2)?,
            kind: CategoryKind::from_str(&kind),
            distribution_key,
            raw_distribution_key,
        })
    }
}

impl CategoryRepository for CategoryRepositoryImpl {
    fn list_categories(&self, property_id: &str) -> RepositoryResult<Vec<CostCategory>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT category_id, property_id, name, kind, distribution_key
            FROM cost_category
            WHERE property_id = ?1
            ORDER BY category_id
            "#,
        )?;

        let categories = stmt
            .query_map(params![property_id], Self::map_row)?
            .collect::<SqliteResult<Vec<CostCategory>>>()?;
        Ok(categories)
    }

    fn find_category(&self, category_id: &str) -> RepositoryResult<Option<CostCategory>> {
        let conn = self.get_conn()?;
        let category = conn
            .query_row(
                r#"
                SELECT category_id, property_id, name, kind, distribution_key
                FROM cost_category
                WHERE category_id = ?1
                "#,
                params![category_id],
                Self::map_row,
            )
            .optional()?;
        Ok(category)
    }

    fn update_distribution_key(
        &self,
        category_id: &str,
        key: DistributionKey,
    ) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            "UPDATE cost_category SET distribution_key = ?1 WHERE category_id = ?2",
            params![key.to_db_str(), category_id],
        )?;

        if affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: "CostCategory".to_string(),
                id: category_id.to_string(),
            });
        }
        Ok(())
    }
}
