// ==========================================
// 样品申请目录系统 - 行业数据仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 约束: 所有查询使用参数化
// 说明: find_or_create / 守卫删除均在单个事务内完成，消除先查后写竞态
// ==========================================

use crate::domain::catalog::{DependentSummary, Sector};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::sql_utils::{begin_write, parse_ts, ts_to_sql};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex};

const SECTOR_COLUMNS: &str = "sector_id, name, image_url, created_at, updated_at";

fn map_sector(row: &Row) -> rusqlite::Result<Sector> {
    Ok(Sector {
        sector_id: row.get(0)?,
        name: row.get(1)?,
        image_url: row.get(2)?,
        created_at: parse_ts(3, &row.get::<_, String>(3)?)?,
        updated_at: parse_ts(4, &row.get::<_, String>(4)?)?,
    })
}

fn find_by_name_on(conn: &Connection, name: &str) -> rusqlite::Result<Option<Sector>> {
    conn.query_row(
        &format!("SELECT {} FROM sector WHERE name = ?1", SECTOR_COLUMNS),
        params![name],
        map_sector,
    )
    .optional()
}

fn insert_on(conn: &Connection, sector: &Sector) -> rusqlite::Result<usize> {
    conn.execute(
        r#"
        INSERT INTO sector (sector_id, name, image_url, created_at, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5)
        "#,
        params![
            sector.sector_id,
            sector.name,
            sector.image_url,
            ts_to_sql(&sector.created_at),
            ts_to_sql(&sector.updated_at),
        ],
    )
}

// ==========================================
// SectorRepository - 行业仓储
// ==========================================
pub struct SectorRepository {
    conn: Arc<Mutex<Connection>>,
}

impl SectorRepository {
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

    // ==========================================
    // 写入操作
    // ==========================================

    /// 插入行业（名称重复时返回 UniqueConstraintViolation）
    pub fn insert(&self, sector: &Sector) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        insert_on(&conn, sector)?;
        Ok(())
    }

    /// 按名称查找或创建
    ///
    /// # 返回
    /// - Ok((sector, true)): 本次新建
    /// - Ok((sector, false)): 已存在（含并发写入方先建成的情况）
    ///
    /// # 说明
    /// - 单事务内 SELECT → INSERT；INSERT 遇唯一约束冲突时改为重新查询
    pub fn find_or_create_by_name(&self, name: &str) -> RepositoryResult<(Sector, bool)> {
        let mut conn = self.get_conn()?;
        let tx = begin_write(&mut conn)?;

        if let Some(existing) = find_by_name_on(&tx, name)? {
            tx.commit()?;
            return Ok((existing, false));
        }

        let sector = Sector::new(name);
        let result = match insert_on(&tx, &sector) {
            Ok(_) => (sector, true),
            Err(e) => {
                let err = RepositoryError::from(e);
                if !err.is_unique_violation() {
                    return Err(err);
                }
                let found = find_by_name_on(&tx, name)?
                    .ok_or_else(|| RepositoryError::not_found("Sector", name))?;
                (found, false)
            }
        };

        tx.commit()?;
        Ok(result)
    }

    /// 更新名称与图片（图片传 None 表示清空）
    pub fn update(&self, sector_id: &str, name: &str, image_url: Option<&str>) -> RepositoryResult<Sector> {
        let conn = self.get_conn()?;
        let rows = conn.execute(
            "UPDATE sector SET name = ?1, image_url = ?2, updated_at = ?3 WHERE sector_id = ?4",
            params![name, image_url, ts_to_sql(&Utc::now()), sector_id],
        )?;
        if rows == 0 {
            return Err(RepositoryError::not_found("Sector", sector_id));
        }

        conn.query_row(
            &format!("SELECT {} FROM sector WHERE sector_id = ?1", SECTOR_COLUMNS),
            params![sector_id],
            map_sector,
        )
        .map_err(Into::into)
    }

    /// 仅更新图片地址
    pub fn set_image_url(&self, sector_id: &str, image_url: Option<&str>) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let rows = conn.execute(
            "UPDATE sector SET image_url = ?1, updated_at = ?2 WHERE sector_id = ?3",
            params![image_url, ts_to_sql(&Utc::now()), sector_id],
        )?;
        if rows == 0 {
            return Err(RepositoryError::not_found("Sector", sector_id));
        }
        Ok(())
    }

    /// 守卫删除：同一事务内统计依赖分组，无依赖才删除
    ///
    /// # 返回
    /// - Ok(vec![]): 已删除
    /// - Ok(dependents): 存在依赖分组，未删除
    /// - Err(NotFound): 行业不存在
    pub fn delete_unless_referenced(&self, sector_id: &str) -> RepositoryResult<Vec<DependentSummary>> {
        let mut conn = self.get_conn()?;
        let tx = begin_write(&mut conn)?;

        let dependents = list_groups_of_sector_on(&tx, sector_id)?;
        if !dependents.is_empty() {
            tx.commit()?;
            return Ok(dependents);
        }

        let rows = tx.execute("DELETE FROM sector WHERE sector_id = ?1", params![sector_id])?;
        if rows == 0 {
            return Err(RepositoryError::not_found("Sector", sector_id));
        }

        tx.commit()?;
        Ok(Vec::new())
    }

    // ==========================================
    // 查询操作
    // ==========================================

    pub fn find_by_id(&self, sector_id: &str) -> RepositoryResult<Option<Sector>> {
        let conn = self.get_conn()?;
        let sector = conn
            .query_row(
                &format!("SELECT {} FROM sector WHERE sector_id = ?1", SECTOR_COLUMNS),
                params![sector_id],
                map_sector,
            )
            .optional()?;
        Ok(sector)
    }

    pub fn find_by_name(&self, name: &str) -> RepositoryResult<Option<Sector>> {
        let conn = self.get_conn()?;
        Ok(find_by_name_on(&conn, name)?)
    }

    /// 全部行业（新建在前）
    pub fn list_all(&self) -> RepositoryResult<Vec<Sector>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM sector ORDER BY created_at DESC, name ASC",
            SECTOR_COLUMNS
        ))?;
        let sectors = stmt
            .query_map([], map_sector)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(sectors)
    }

    /// 行业下的分组（只读，依赖守卫预检使用）
    pub fn list_dependent_groups(&self, sector_id: &str) -> RepositoryResult<Vec<DependentSummary>> {
        let conn = self.get_conn()?;
        Ok(list_groups_of_sector_on(&conn, sector_id)?)
    }

    pub fn count(&self) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let n: i64 = conn.query_row("SELECT COUNT(*) FROM sector", [], |row| row.get(0))?;
        Ok(n as usize)
    }
}

fn list_groups_of_sector_on(conn: &Connection, sector_id: &str) -> rusqlite::Result<Vec<DependentSummary>> {
    let mut stmt = conn.prepare(
        "SELECT production_group_id, name FROM production_group WHERE sector_id = ?1 ORDER BY name ASC",
    )?;
    let rows = stmt
        .query_map(params![sector_id], |row| {
            Ok(DependentSummary {
                id: row.get(0)?,
                name: row.get(1)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_in_memory;

    fn repo() -> SectorRepository {
        SectorRepository::new(Arc::new(Mutex::new(open_in_memory().unwrap())))
    }

    #[test]
    fn test_find_or_create_is_idempotent() {
        let repo = repo();
        let (first, created) = repo.find_or_create_by_name("Dairy").unwrap();
        assert!(created);
        let (second, created_again) = repo.find_or_create_by_name("Dairy").unwrap();
        assert!(!created_again);
        assert_eq!(first.sector_id, second.sector_id);
        assert_eq!(repo.count().unwrap(), 1);
    }

    #[test]
    fn test_insert_duplicate_name_is_unique_violation() {
        let repo = repo();
        repo.insert(&Sector::new("Meat")).unwrap();
        let err = repo.insert(&Sector::new("Meat")).unwrap_err();
        assert!(err.is_unique_violation());
    }

    #[test]
    fn test_update_missing_sector_is_not_found() {
        let repo = repo();
        let err = repo.update("missing", "X", None).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_delete_unreferenced_sector() {
        let repo = repo();
        let (sector, _) = repo.find_or_create_by_name("Textile").unwrap();
        let blockers = repo.delete_unless_referenced(&sector.sector_id).unwrap();
        assert!(blockers.is_empty());
        assert!(repo.find_by_id(&sector.sector_id).unwrap().is_none());
    }
}
