// ==========================================
// 样品申请目录系统 - 生产分组数据仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 唯一性: (name, sector_id)；同名分组可存在于不同行业
// ==========================================

use crate::domain::catalog::{DependentSummary, ProductionGroup, ProductionGroupView};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::sql_utils::{begin_write, in_placeholders, parse_ts, ts_to_sql};
use chrono::Utc;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex};

const GROUP_COLUMNS: &str = "production_group_id, name, sector_id, created_at, updated_at";

fn map_group(row: &Row) -> rusqlite::Result<ProductionGroup> {
    Ok(ProductionGroup {
        production_group_id: row.get(0)?,
        name: row.get(1)?,
        sector_id: row.get(2)?,
        created_at: parse_ts(3, &row.get::<_, String>(3)?)?,
        updated_at: parse_ts(4, &row.get::<_, String>(4)?)?,
    })
}

fn find_by_key_on(conn: &Connection, name: &str, sector_id: &str) -> rusqlite::Result<Option<ProductionGroup>> {
    conn.query_row(
        &format!(
            "SELECT {} FROM production_group WHERE name = ?1 AND sector_id = ?2",
            GROUP_COLUMNS
        ),
        params![name, sector_id],
        map_group,
    )
    .optional()
}

fn find_by_id_on(conn: &Connection, group_id: &str) -> rusqlite::Result<Option<ProductionGroup>> {
    conn.query_row(
        &format!(
            "SELECT {} FROM production_group WHERE production_group_id = ?1",
            GROUP_COLUMNS
        ),
        params![group_id],
        map_group,
    )
    .optional()
}

fn insert_on(conn: &Connection, group: &ProductionGroup) -> rusqlite::Result<usize> {
    conn.execute(
        r#"
        INSERT INTO production_group (production_group_id, name, sector_id, created_at, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5)
        "#,
        params![
            group.production_group_id,
            group.name,
            group.sector_id,
            ts_to_sql(&group.created_at),
            ts_to_sql(&group.updated_at),
        ],
    )
}

/// 分组下已关联的产品（按产品去重）
fn list_products_of_group_on(conn: &Connection, group_id: &str) -> rusqlite::Result<Vec<DependentSummary>> {
    let mut stmt = conn.prepare(
        r#"
        SELECT DISTINCT p.product_id, p.name
        FROM product_assignment a
        JOIN product p ON p.product_id = a.product_id
        WHERE a.production_group_id = ?1
        ORDER BY p.name ASC
        "#,
    )?;
    let rows = stmt
        .query_map(params![group_id], |row| {
            Ok(DependentSummary {
                id: row.get(0)?,
                name: row.get(1)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

fn count_assignments_of_group_on(conn: &Connection, group_id: &str) -> rusqlite::Result<usize> {
    let n: i64 = conn.query_row(
        "SELECT COUNT(*) FROM product_assignment WHERE production_group_id = ?1",
        params![group_id],
        |row| row.get(0),
    )?;
    Ok(n as usize)
}

/// 分组依赖快照：关联记录数 + 关联产品列表
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupDependents {
    pub assignment_count: usize,
    pub products: Vec<DependentSummary>,
}

impl GroupDependents {
    pub fn is_empty(&self) -> bool {
        self.assignment_count == 0
    }
}

// ==========================================
// ProductionGroupRepository - 生产分组仓储
// ==========================================
pub struct ProductionGroupRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ProductionGroupRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    // ==========================================
    // 写入操作
    // ==========================================

    /// 插入分组（行业不存在 → ForeignKeyViolation；重名 → UniqueConstraintViolation）
    pub fn insert(&self, group: &ProductionGroup) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        insert_on(&conn, group)?;
        Ok(())
    }

    /// 按 (name, sector_id) 查找或创建
    ///
    /// # 返回
    /// - Ok((group, created))
    pub fn find_or_create(&self, name: &str, sector_id: &str) -> RepositoryResult<(ProductionGroup, bool)> {
        let mut conn = self.get_conn()?;
        let tx = begin_write(&mut conn)?;

        if let Some(existing) = find_by_key_on(&tx, name, sector_id)? {
            tx.commit()?;
            return Ok((existing, false));
        }

        let group = ProductionGroup::new(name, sector_id);
        let result = match insert_on(&tx, &group) {
            Ok(_) => (group, true),
            Err(e) => {
                let err = RepositoryError::from(e);
                if !err.is_unique_violation() {
                    return Err(err);
                }
                let found = find_by_key_on(&tx, name, sector_id)?.ok_or_else(|| {
                    RepositoryError::not_found("ProductionGroup", &format!("{}::{}", sector_id, name))
                })?;
                (found, false)
            }
        };

        tx.commit()?;
        Ok(result)
    }

    /// 更新分组（None 表示保留原值）
    ///
    /// 行业变更时，分组下的关联记录同事务迁移到新行业
    pub fn update(
        &self,
        group_id: &str,
        name: Option<&str>,
        sector_id: Option<&str>,
    ) -> RepositoryResult<ProductionGroup> {
        let mut conn = self.get_conn()?;
        let tx = begin_write(&mut conn)?;
        let current = find_by_id_on(&tx, group_id)?
            .ok_or_else(|| RepositoryError::not_found("ProductionGroup", group_id))?;

        let new_name = name.unwrap_or(&current.name);
        let new_sector = sector_id.unwrap_or(&current.sector_id);
        tx.execute(
            "UPDATE production_group SET name = ?1, sector_id = ?2, updated_at = ?3 WHERE production_group_id = ?4",
            params![new_name, new_sector, ts_to_sql(&Utc::now()), group_id],
        )?;
        if new_sector != current.sector_id {
            tx.execute(
                "UPDATE product_assignment SET sector_id = ?1 WHERE production_group_id = ?2",
                params![new_sector, group_id],
            )?;
        }

        let updated = find_by_id_on(&tx, group_id)?
            .ok_or_else(|| RepositoryError::not_found("ProductionGroup", group_id))?;
        tx.commit()?;
        Ok(updated)
    }

    /// 守卫删除：同一事务内统计关联记录，无关联才删除
    ///
    /// # 返回
    /// - Ok(empty): 已删除
    /// - Ok(dependents): 存在关联，未删除
    /// - Err(NotFound): 分组不存在
    pub fn delete_unless_referenced(&self, group_id: &str) -> RepositoryResult<GroupDependents> {
        let mut conn = self.get_conn()?;
        let tx = begin_write(&mut conn)?;

        let assignment_count = count_assignments_of_group_on(&tx, group_id)?;
        if assignment_count > 0 {
            let products = list_products_of_group_on(&tx, group_id)?;
            tx.commit()?;
            return Ok(GroupDependents {
                assignment_count,
                products,
            });
        }

        let rows = tx.execute(
            "DELETE FROM production_group WHERE production_group_id = ?1",
            params![group_id],
        )?;
        if rows == 0 {
            return Err(RepositoryError::not_found("ProductionGroup", group_id));
        }

        tx.commit()?;
        Ok(GroupDependents::default())
    }

    // ==========================================
    // 查询操作
    // ==========================================

    pub fn find_by_id(&self, group_id: &str) -> RepositoryResult<Option<ProductionGroup>> {
        let conn = self.get_conn()?;
        Ok(find_by_id_on(&conn, group_id)?)
    }

    /// 批量按 id 查询（单条 SQL，避免 N+1）
    pub fn find_by_ids(&self, group_ids: &[String]) -> RepositoryResult<Vec<ProductionGroup>> {
        if group_ids.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM production_group WHERE production_group_id IN ({})",
            GROUP_COLUMNS,
            in_placeholders(group_ids.len())
        );
        let mut stmt = conn.prepare(&sql)?;
        let groups = stmt
            .query_map(params_from_iter(group_ids.iter()), map_group)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(groups)
    }

    /// 分组列表（可按行业过滤，按名称排序，带行业名称）
    pub fn list_views(&self, sector_id: Option<&str>) -> RepositoryResult<Vec<ProductionGroupView>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT g.production_group_id, g.name, g.sector_id, s.name
            FROM production_group g
            JOIN sector s ON s.sector_id = g.sector_id
            WHERE (?1 IS NULL OR g.sector_id = ?1)
            ORDER BY g.name ASC, s.name ASC
            "#,
        )?;
        let views = stmt
            .query_map(params![sector_id], |row| {
                Ok(ProductionGroupView {
                    production_group_id: row.get(0)?,
                    name: row.get(1)?,
                    sector_id: row.get(2)?,
                    sector_name: row.get(3)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(views)
    }

    /// 分组依赖（只读，依赖守卫预检使用）
    pub fn dependents(&self, group_id: &str) -> RepositoryResult<GroupDependents> {
        let conn = self.get_conn()?;
        Ok(GroupDependents {
            assignment_count: count_assignments_of_group_on(&conn, group_id)?,
            products: list_products_of_group_on(&conn, group_id)?,
        })
    }

    pub fn count(&self) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let n: i64 = conn.query_row("SELECT COUNT(*) FROM production_group", [], |row| row.get(0))?;
        Ok(n as usize)
    }
}
