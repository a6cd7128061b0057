// ==========================================
// 样品申请目录系统 - 产品数据仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 唯一性: 产品名称全目录唯一
// ==========================================

use crate::domain::catalog::Product;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::sql_utils::{begin_write, in_placeholders, parse_ts, ts_to_sql};
use chrono::Utc;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex};

const PRODUCT_COLUMNS: &str = "product_id, name, created_at, updated_at";

fn map_product(row: &Row) -> rusqlite::Result<Product> {
    Ok(Product {
        product_id: row.get(0)?,
        name: row.get(1)?,
        created_at: parse_ts(2, &row.get::<_, String>(2)?)?,
        updated_at: parse_ts(3, &row.get::<_, String>(3)?)?,
    })
}

fn find_by_name_on(conn: &Connection, name: &str) -> rusqlite::Result<Option<Product>> {
    conn.query_row(
        &format!("SELECT {} FROM product WHERE name = ?1", PRODUCT_COLUMNS),
        params![name],
        map_product,
    )
    .optional()
}

fn insert_on(conn: &Connection, product: &Product) -> rusqlite::Result<usize> {
    conn.execute(
        "INSERT INTO product (product_id, name, created_at, updated_at) VALUES (?1, ?2, ?3, ?4)",
        params![
            product.product_id,
            product.name,
            ts_to_sql(&product.created_at),
            ts_to_sql(&product.updated_at),
        ],
    )
}

// ==========================================
// ProductRepository - 产品仓储
// ==========================================
pub struct ProductRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ProductRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    pub fn insert(&self, product: &Product) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        insert_on(&conn, product)?;
        Ok(())
    }

    /// 按名称查找或创建（单事务，唯一约束冲突时重新查询）
    pub fn find_or_create_by_name(&self, name: &str) -> RepositoryResult<(Product, bool)> {
        let mut conn = self.get_conn()?;
        let tx = begin_write(&mut conn)?;

        if let Some(existing) = find_by_name_on(&tx, name)? {
            tx.commit()?;
            return Ok((existing, false));
        }

        let product = Product::new(name);
        let result = match insert_on(&tx, &product) {
            Ok(_) => (product, true),
            Err(e) => {
                let err = RepositoryError::from(e);
                if !err.is_unique_violation() {
                    return Err(err);
                }
                let found = find_by_name_on(&tx, name)?
                    .ok_or_else(|| RepositoryError::not_found("Product", name))?;
                (found, false)
            }
        };

        tx.commit()?;
        Ok(result)
    }

    /// 产品改名（已有申请的快照不受影响）
    pub fn rename(&self, product_id: &str, name: &str) -> RepositoryResult<Product> {
        let conn = self.get_conn()?;
        let rows = conn.execute(
            "UPDATE product SET name = ?1, updated_at = ?2 WHERE product_id = ?3",
            params![name, ts_to_sql(&Utc::now()), product_id],
        )?;
        if rows == 0 {
            return Err(RepositoryError::not_found("Product", product_id));
        }

        conn.query_row(
            &format!("SELECT {} FROM product WHERE product_id = ?1", PRODUCT_COLUMNS),
            params![product_id],
            map_product,
        )
        .map_err(Into::into)
    }

    pub fn find_by_id(&self, product_id: &str) -> RepositoryResult<Option<Product>> {
        let conn = self.get_conn()?;
        let product = conn
            .query_row(
                &format!("SELECT {} FROM product WHERE product_id = ?1", PRODUCT_COLUMNS),
                params![product_id],
                map_product,
            )
            .optional()?;
        Ok(product)
    }

    pub fn find_by_name(&self, name: &str) -> RepositoryResult<Option<Product>> {
        let conn = self.get_conn()?;
        Ok(find_by_name_on(&conn, name)?)
    }

    /// 批量按 id 查询（单条 SQL）
    pub fn find_by_ids(&self, product_ids: &[String]) -> RepositoryResult<Vec<Product>> {
        if product_ids.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM product WHERE product_id IN ({})",
            PRODUCT_COLUMNS,
            in_placeholders(product_ids.len())
        );
        let mut stmt = conn.prepare(&sql)?;
        let products = stmt
            .query_map(params_from_iter(product_ids.iter()), map_product)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(products)
    }

    /// 分组下的产品（经关联表，按名称排序）
    pub fn list_by_group(&self, production_group_id: &str) -> RepositoryResult<Vec<Product>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT DISTINCT p.product_id, p.name, p.created_at, p.updated_at
            FROM product p
            JOIN product_assignment a ON a.product_id = p.product_id
            WHERE a.production_group_id = ?1
            ORDER BY p.name ASC
            "#,
        )?;
        let products = stmt
            .query_map(params![production_group_id], map_product)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(products)
    }

    pub fn count(&self) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let n: i64 = conn.query_row("SELECT COUNT(*) FROM product", [], |row| row.get(0))?;
        Ok(n as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_in_memory;

    fn repo() -> ProductRepository {
        ProductRepository::new(Arc::new(Mutex::new(open_in_memory().unwrap())))
    }

    #[test]
    fn test_find_or_create_reuses_existing() {
        let repo = repo();
        let (a, created) = repo.find_or_create_by_name("Milk").unwrap();
        let (b, created_again) = repo.find_or_create_by_name("Milk").unwrap();
        assert!(created);
        assert!(!created_again);
        assert_eq!(a.product_id, b.product_id);
    }

    #[test]
    fn test_rename_to_existing_name_is_unique_violation() {
        let repo = repo();
        repo.find_or_create_by_name("Widget").unwrap();
        let (gadget, _) = repo.find_or_create_by_name("Gadget").unwrap();
        let err = repo.rename(&gadget.product_id, "Widget").unwrap_err();
        assert!(err.is_unique_violation());
    }

    #[test]
    fn test_rename_missing_product_is_not_found() {
        let repo = repo();
        assert!(repo.rename("missing", "X").unwrap_err().is_not_found());
    }
}
