// ==========================================
// 样品申请目录系统 - 产品归属关联仓储
// ==========================================
// 红线: 三元组 (sector, group, product) 唯一
// 说明: 重复关联按错误类型识别（UniqueConstraintViolation），
//       其他失败（如外键缺失）一律向上传播，不能混入“重复”计数
// ==========================================

use crate::domain::catalog::ProductAssignment;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::sql_utils::{begin_write, in_placeholders, parse_ts, ts_to_sql};
use rusqlite::{params, params_from_iter, Connection, Row};
use std::sync::{Arc, Mutex};

const ASSIGNMENT_COLUMNS: &str = "assignment_id, sector_id, production_group_id, product_id, created_at";

fn map_assignment(row: &Row) -> rusqlite::Result<ProductAssignment> {
    Ok(ProductAssignment {
        assignment_id: row.get(0)?,
        sector_id: row.get(1)?,
        production_group_id: row.get(2)?,
        product_id: row.get(3)?,
        created_at: parse_ts(4, &row.get::<_, String>(4)?)?,
    })
}

fn insert_on(conn: &Connection, a: &ProductAssignment) -> rusqlite::Result<usize> {
    conn.execute(
        r#"
        INSERT INTO product_assignment (assignment_id, sector_id, production_group_id, product_id, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5)
        "#,
        params![
            a.assignment_id,
            a.sector_id,
            a.production_group_id,
            a.product_id,
            ts_to_sql(&a.created_at),
        ],
    )
}

/// 单条插入：重复 → Ok(false)；其他错误原样返回
fn create_if_absent_on(conn: &Connection, a: &ProductAssignment) -> RepositoryResult<bool> {
    match insert_on(conn, a) {
        Ok(_) => Ok(true),
        Err(e) => {
            let err = RepositoryError::from(e);
            if err.is_unique_violation() {
                Ok(false)
            } else {
                Err(err)
            }
        }
    }
}

/// 分块写入结果
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChunkWriteResult {
    pub inserted: usize,
    pub duplicates: usize,
}

// ==========================================
// AssignmentRepository - 关联仓储
// ==========================================
pub struct AssignmentRepository {
    conn: Arc<Mutex<Connection>>,
}

impl AssignmentRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 建立关联（已存在时返回 false）
    pub fn create_if_absent(&self, assignment: &ProductAssignment) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        create_if_absent_on(&conn, assignment)
    }

    /// 分块写入（单事务）
    ///
    /// # 说明
    /// - 重复关联计入 duplicates 并继续
    /// - 其他错误立即返回，事务回滚，本块不留下部分写入
    pub fn insert_chunk(&self, chunk: &[ProductAssignment]) -> RepositoryResult<ChunkWriteResult> {
        let mut conn = self.get_conn()?;
        let tx = begin_write(&mut conn)?;

        let mut result = ChunkWriteResult::default();
        for assignment in chunk {
            if create_if_absent_on(&tx, assignment)? {
                result.inserted += 1;
            } else {
                result.duplicates += 1;
            }
        }

        tx.commit()?;
        Ok(result)
    }

    /// 批量查询一组产品的全部关联（单条 SQL，申请校验使用）
    pub fn find_for_products(&self, product_ids: &[String]) -> RepositoryResult<Vec<ProductAssignment>> {
        if product_ids.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM product_assignment WHERE product_id IN ({})",
            ASSIGNMENT_COLUMNS,
            in_placeholders(product_ids.len())
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(product_ids.iter()), map_assignment)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn count(&self) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let n: i64 = conn.query_row("SELECT COUNT(*) FROM product_assignment", [], |row| row.get(0))?;
        Ok(n as usize)
    }
}
