// ==========================================
// 样品申请目录系统 - 导入审计日志仓储
// ==========================================
// 红线: 日志写入后不可修改
// ==========================================

use crate::domain::import::{ImportLog, InsertedCounts};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::sql_utils::{parse_ts, ts_to_sql};
use rusqlite::{params, Connection, Row};
use std::sync::{Arc, Mutex};

fn map_import_log(row: &Row) -> rusqlite::Result<ImportLog> {
    let as_count = |idx: usize| -> rusqlite::Result<usize> { Ok(row.get::<_, i64>(idx)? as usize) };
    Ok(ImportLog {
        import_log_id: row.get(0)?,
        source: row.get(1)?,
        dry_run: row.get(2)?,
        row_count: as_count(3)?,
        skipped_rows: as_count(4)?,
        inserted: InsertedCounts {
            sectors: as_count(5)?,
            groups: as_count(6)?,
            products: as_count(7)?,
            assignments: as_count(8)?,
        },
        duplicate_assignments: as_count(9)?,
        started_at: parse_ts(10, &row.get::<_, String>(10)?)?,
        finished_at: parse_ts(11, &row.get::<_, String>(11)?)?,
    })
}

// ==========================================
// ImportLogRepository - 导入日志仓储
// ==========================================
pub struct ImportLogRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ImportLogRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    pub fn insert(&self, log: &ImportLog) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO import_log (
                import_log_id, source, dry_run, row_count, skipped_rows,
                inserted_sectors, inserted_groups, inserted_products, inserted_assignments,
                duplicate_assignments, started_at, finished_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
            params![
                log.import_log_id,
                log.source,
                log.dry_run,
                log.row_count as i64,
                log.skipped_rows as i64,
                log.inserted.sectors as i64,
                log.inserted.groups as i64,
                log.inserted.products as i64,
                log.inserted.assignments as i64,
                log.duplicate_assignments as i64,
                ts_to_sql(&log.started_at),
                ts_to_sql(&log.finished_at),
            ],
        )?;
        Ok(())
    }

    /// 最近 N 条（新的在前）
    pub fn recent(&self, limit: usize) -> RepositoryResult<Vec<ImportLog>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT import_log_id, source, dry_run, row_count, skipped_rows,
                   inserted_sectors, inserted_groups, inserted_products, inserted_assignments,
                   duplicate_assignments, started_at, finished_at
            FROM import_log
            ORDER BY started_at DESC
            LIMIT ?1
            "#,
        )?;
        let logs = stmt
            .query_map(params![limit as i64], map_import_log)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(logs)
    }

    pub fn count(&self) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let n: i64 = conn.query_row("SELECT COUNT(*) FROM import_log", [], |row| row.get(0))?;
        Ok(n as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_in_memory;
    use chrono::{Duration, Utc};

    fn log_at(id: &str, offset_secs: i64) -> ImportLog {
        let started_at = Utc::now() + Duration::seconds(offset_secs);
        ImportLog {
            import_log_id: id.to_string(),
            source: "tabular-import".to_string(),
            dry_run: false,
            row_count: 3,
            skipped_rows: 1,
            inserted: InsertedCounts {
                sectors: 1,
                groups: 1,
                products: 2,
                assignments: 2,
            },
            duplicate_assignments: 0,
            started_at,
            finished_at: started_at,
        }
    }

    #[test]
    fn test_recent_returns_newest_first() {
        let repo = ImportLogRepository::new(Arc::new(Mutex::new(open_in_memory().unwrap())));
        repo.insert(&log_at("L1", -10)).unwrap();
        repo.insert(&log_at("L2", 0)).unwrap();

        let logs = repo.recent(10).unwrap();
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[0].import_log_id, "L2");
        assert_eq!(logs[1].inserted.products, 2);
        assert_eq!(repo.recent(1).unwrap().len(), 1);
    }
}
