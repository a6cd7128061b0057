// ==========================================
// 样品申请目录系统 - 样品申请数据仓储
// ==========================================
// 红线: 行项目快照写入后不再修改
// 红线: 状态历史只追加（seq_no 单调递增）
// 说明: 申请头 / 行项目 / 历史在同一事务内写入
// ==========================================

use crate::domain::request::{ContactInfo, RequestProductSnapshot, SampleRequest, StatusHistoryEntry};
use crate::domain::types::RequestStatus;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::sql_utils::{begin_write, in_placeholders, parse_ts, ts_to_sql};
use chrono::{DateTime, Utc};
use rusqlite::types::{Type, Value};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

const REQUEST_COLUMNS: &str = "request_id, company_name, first_name, last_name, email, phone, \
     address, province, district, sector_id, production_group_ids_json, status, created_at, updated_at";

// ==========================================
// RequestFilter - 列表过滤条件（条件之间为 AND）
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestFilter {
    pub sector_id: Option<String>,
    pub production_group_id: Option<String>,
    pub province: Option<String>,
    pub district: Option<String>,
}

impl RequestFilter {
    /// 生成 WHERE 子句与参数
    fn to_where_clause(&self) -> (String, Vec<Value>) {
        let mut clauses: Vec<&str> = Vec::new();
        let mut values: Vec<Value> = Vec::new();

        if let Some(sector_id) = &self.sector_id {
            clauses.push("r.sector_id = ?");
            values.push(Value::Text(sector_id.clone()));
        }
        if let Some(group_id) = &self.production_group_id {
            clauses.push(
                "EXISTS (SELECT 1 FROM request_line l WHERE l.request_id = r.request_id AND l.production_group_id = ?)",
            );
            values.push(Value::Text(group_id.clone()));
        }
        if let Some(province) = &self.province {
            clauses.push("r.province = ?");
            values.push(Value::Text(province.clone()));
        }
        if let Some(district) = &self.district {
            clauses.push("r.district = ?");
            values.push(Value::Text(district.clone()));
        }

        if clauses.is_empty() {
            (String::new(), values)
        } else {
            (format!("WHERE {}", clauses.join(" AND ")), values)
        }
    }
}

fn parse_status(col: usize, raw: &str) -> rusqlite::Result<RequestStatus> {
    RequestStatus::parse(raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            col,
            Type::Text,
            format!("未知申请状态: {}", raw).into(),
        )
    })
}

fn map_request_header(row: &Row) -> rusqlite::Result<SampleRequest> {
    let group_ids_json: String = row.get(10)?;
    let production_group_ids: Vec<String> = serde_json::from_str(&group_ids_json)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(10, Type::Text, Box::new(e)))?;

    Ok(SampleRequest {
        request_id: row.get(0)?,
        contact: ContactInfo {
            company_name: row.get(1)?,
            first_name: row.get(2)?,
            last_name: row.get(3)?,
            email: row.get(4)?,
            phone: row.get(5)?,
            address: row.get(6)?,
            province: row.get(7)?,
            district: row.get(8)?,
        },
        sector_id: row.get(9)?,
        production_group_ids,
        products: Vec::new(),
        status: parse_status(11, &row.get::<_, String>(11)?)?,
        status_history: Vec::new(),
        created_at: parse_ts(12, &row.get::<_, String>(12)?)?,
        updated_at: parse_ts(13, &row.get::<_, String>(13)?)?,
    })
}

/// 子表批量加载时每条 SQL 绑定的申请 id 上限（远低于 SQLite 变量数上限）
const CHILD_ID_BATCH: usize = 500;

/// 批量加载行项目与状态历史（每类每批一条 SQL）
fn attach_children_on(conn: &Connection, requests: &mut [SampleRequest]) -> rusqlite::Result<()> {
    if requests.is_empty() {
        return Ok(());
    }
    let ids: Vec<String> = requests.iter().map(|r| r.request_id.clone()).collect();

    let mut lines: HashMap<String, Vec<RequestProductSnapshot>> = HashMap::new();
    let mut history: HashMap<String, Vec<StatusHistoryEntry>> = HashMap::new();
    for batch in ids.chunks(CHILD_ID_BATCH) {
        load_lines_on(conn, batch, &mut lines)?;
        load_history_on(conn, batch, &mut history)?;
    }

    for request in requests.iter_mut() {
        request.products = lines.remove(&request.request_id).unwrap_or_default();
        request.status_history = history.remove(&request.request_id).unwrap_or_default();
    }
    Ok(())
}

fn load_lines_on(
    conn: &Connection,
    ids: &[String],
    out: &mut HashMap<String, Vec<RequestProductSnapshot>>,
) -> rusqlite::Result<()> {
    let mut stmt = conn.prepare(&format!(
        r#"
        SELECT request_id, product_id, product_name, production_group_id, production_group_name
        FROM request_line
        WHERE request_id IN ({})
        ORDER BY request_id, line_no ASC
        "#,
        in_placeholders(ids.len())
    ))?;
    let mut rows = stmt.query(params_from_iter(ids.iter()))?;
    while let Some(row) = rows.next()? {
        let request_id: String = row.get(0)?;
        out.entry(request_id).or_default().push(RequestProductSnapshot {
            product_id: row.get(1)?,
            product_name: row.get(2)?,
            production_group_id: row.get(3)?,
            production_group_name: row.get(4)?,
        });
    }
    Ok(())
}

fn load_history_on(
    conn: &Connection,
    ids: &[String],
    out: &mut HashMap<String, Vec<StatusHistoryEntry>>,
) -> rusqlite::Result<()> {
    let mut stmt = conn.prepare(&format!(
        r#"
        SELECT request_id, status, note, updated_by, changed_at
        FROM request_status_history
        WHERE request_id IN ({})
        ORDER BY request_id, seq_no ASC
        "#,
        in_placeholders(ids.len())
    ))?;
    let mut rows = stmt.query(params_from_iter(ids.iter()))?;
    while let Some(row) = rows.next()? {
        let request_id: String = row.get(0)?;
        out.entry(request_id).or_default().push(StatusHistoryEntry {
            status: parse_status(1, &row.get::<_, String>(1)?)?,
            note: row.get(2)?,
            updated_by: row.get(3)?,
            timestamp: parse_ts(4, &row.get::<_, String>(4)?)?,
        });
    }
    Ok(())
}

fn find_by_id_on(conn: &Connection, request_id: &str) -> rusqlite::Result<Option<SampleRequest>> {
    let header = conn
        .query_row(
            &format!("SELECT {} FROM sample_request WHERE request_id = ?1", REQUEST_COLUMNS),
            params![request_id],
            map_request_header,
        )
        .optional()?;

    match header {
        Some(request) => {
            let mut batch = [request];
            attach_children_on(conn, &mut batch)?;
            let [request] = batch;
            Ok(Some(request))
        }
        None => Ok(None),
    }
}

fn insert_history_on(
    conn: &Connection,
    request_id: &str,
    seq_no: i64,
    entry: &StatusHistoryEntry,
) -> rusqlite::Result<usize> {
    conn.execute(
        r#"
        INSERT INTO request_status_history (request_id, seq_no, status, note, updated_by, changed_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        "#,
        params![
            request_id,
            seq_no,
            entry.status.as_str(),
            entry.note,
            entry.updated_by,
            ts_to_sql(&entry.timestamp),
        ],
    )
}

// ==========================================
// RequestRepository - 样品申请仓储
// ==========================================
pub struct RequestRepository {
    conn: Arc<Mutex<Connection>>,
}

impl RequestRepository {
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

    /// 写入申请（申请头 + 行项目快照 + 初始历史，单事务）
    pub fn insert(&self, request: &SampleRequest) -> RepositoryResult<()> {
        let group_ids_json = serde_json::to_string(&request.production_group_ids)
            .map_err(|e| RepositoryError::InternalError(format!("分组列表序列化失败: {}", e)))?;

        let mut conn = self.get_conn()?;
        let tx = begin_write(&mut conn)?;

        let c = &request.contact;
        tx.execute(
            &format!(
                "INSERT INTO sample_request ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
                REQUEST_COLUMNS
            ),
            params![
                request.request_id,
                c.company_name,
                c.first_name,
                c.last_name,
                c.email,
                c.phone,
                c.address,
                c.province,
                c.district,
                request.sector_id,
                group_ids_json,
                request.status.as_str(),
                ts_to_sql(&request.created_at),
                ts_to_sql(&request.updated_at),
            ],
        )?;

        for (line_no, line) in request.products.iter().enumerate() {
            tx.execute(
                r#"
                INSERT INTO request_line
                    (request_id, line_no, product_id, product_name, production_group_id, production_group_name)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
                params![
                    request.request_id,
                    line_no as i64,
                    line.product_id,
                    line.product_name,
                    line.production_group_id,
                    line.production_group_name,
                ],
            )?;
        }

        for (seq_no, entry) in request.status_history.iter().enumerate() {
            insert_history_on(&tx, &request.request_id, seq_no as i64, entry)?;
        }

        tx.commit()?;
        Ok(())
    }

    /// 追加状态变更（更新状态 + 追加一条历史，单事务）
    ///
    /// # 返回
    /// - Ok(request): 更新后的申请
    /// - Err(NotFound): 申请不存在
    pub fn append_status(
        &self,
        request_id: &str,
        entry: &StatusHistoryEntry,
    ) -> RepositoryResult<SampleRequest> {
        let mut conn = self.get_conn()?;
        let tx = begin_write(&mut conn)?;

        let rows = tx.execute(
            "UPDATE sample_request SET status = ?1, updated_at = ?2 WHERE request_id = ?3",
            params![entry.status.as_str(), ts_to_sql(&entry.timestamp), request_id],
        )?;
        if rows == 0 {
            return Err(RepositoryError::not_found("SampleRequest", request_id));
        }

        let next_seq: i64 = tx.query_row(
            "SELECT COALESCE(MAX(seq_no), -1) + 1 FROM request_status_history WHERE request_id = ?1",
            params![request_id],
            |row| row.get(0),
        )?;
        insert_history_on(&tx, request_id, next_seq, entry)?;

        let updated = find_by_id_on(&tx, request_id)?
            .ok_or_else(|| RepositoryError::not_found("SampleRequest", request_id))?;

        tx.commit()?;
        Ok(updated)
    }

    /// 删除申请（行项目与历史一并删除）
    pub fn delete(&self, request_id: &str) -> RepositoryResult<()> {
        let mut conn = self.get_conn()?;
        let tx = begin_write(&mut conn)?;

        tx.execute("DELETE FROM request_line WHERE request_id = ?1", params![request_id])?;
        tx.execute(
            "DELETE FROM request_status_history WHERE request_id = ?1",
            params![request_id],
        )?;
        let rows = tx.execute("DELETE FROM sample_request WHERE request_id = ?1", params![request_id])?;
        if rows == 0 {
            return Err(RepositoryError::not_found("SampleRequest", request_id));
        }

        tx.commit()?;
        Ok(())
    }

    // ==========================================
    // 查询操作
    // ==========================================

    pub fn find_by_id(&self, request_id: &str) -> RepositoryResult<Option<SampleRequest>> {
        let conn = self.get_conn()?;
        Ok(find_by_id_on(&conn, request_id)?)
    }

    /// 分页查询（新建在前）
    ///
    /// # 返回
    /// - (当前页申请, 满足过滤条件的总数)
    pub fn list_page(
        &self,
        filter: &RequestFilter,
        limit: usize,
        offset: usize,
    ) -> RepositoryResult<(Vec<SampleRequest>, usize)> {
        let conn = self.get_conn()?;
        let (where_clause, mut values) = filter.to_where_clause();

        let total: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM sample_request r {}", where_clause),
            params_from_iter(values.iter()),
            |row| row.get(0),
        )?;

        let to_sql_int = |field: &str, v: usize| {
            i64::try_from(v).map_err(|_| RepositoryError::FieldValueError {
                field: field.to_string(),
                message: format!("超出范围: {}", v),
            })
        };
        values.push(Value::Integer(to_sql_int("limit", limit)?));
        values.push(Value::Integer(to_sql_int("offset", offset)?));
        let mut requests = Self::query_headers(
            &conn,
            &format!(
                "SELECT {} FROM sample_request r {} ORDER BY r.created_at DESC, r.request_id DESC LIMIT ? OFFSET ?",
                prefixed_columns(),
                where_clause
            ),
            &values,
        )?;
        attach_children_on(&conn, &mut requests)?;

        Ok((requests, total as usize))
    }

    /// 全量查询（不分页，新建在前；检索模式使用）
    pub fn list_all(&self, filter: &RequestFilter) -> RepositoryResult<Vec<SampleRequest>> {
        let conn = self.get_conn()?;
        let (where_clause, values) = filter.to_where_clause();
        let mut requests = Self::query_headers(
            &conn,
            &format!(
                "SELECT {} FROM sample_request r {} ORDER BY r.created_at DESC, r.request_id DESC",
                prefixed_columns(),
                where_clause
            ),
            &values,
        )?;
        attach_children_on(&conn, &mut requests)?;
        Ok(requests)
    }

    pub fn count(&self) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let n: i64 = conn.query_row("SELECT COUNT(*) FROM sample_request", [], |row| row.get(0))?;
        Ok(n as usize)
    }

    fn query_headers(conn: &Connection, sql: &str, values: &[Value]) -> rusqlite::Result<Vec<SampleRequest>> {
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt
            .query_map(params_from_iter(values.iter()), map_request_header)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }
}

fn prefixed_columns() -> String {
    REQUEST_COLUMNS
        .split(',')
        .map(|c| format!("r.{}", c.trim()))
        .collect::<Vec<_>>()
        .join(", ")
}

/// 新申请的初始历史
pub fn created_history_entry(at: DateTime<Utc>) -> StatusHistoryEntry {
    StatusHistoryEntry {
        status: RequestStatus::Pending,
        note: "created".to_string(),
        updated_by: None,
        timestamp: at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_in_memory;
    use chrono::Duration;

    fn repo() -> RequestRepository {
        RequestRepository::new(Arc::new(Mutex::new(open_in_memory().unwrap())))
    }

    fn sample(id: &str, created_at: DateTime<Utc>, province: &str, group_id: &str) -> SampleRequest {
        SampleRequest {
            request_id: id.to_string(),
            contact: ContactInfo {
                company_name: format!("Company {}", id),
                email: "buyer@example.com".to_string(),
                phone: "555-0100".to_string(),
                province: Some(province.to_string()),
                ..Default::default()
            },
            sector_id: Some("S1".to_string()),
            production_group_ids: vec![group_id.to_string()],
            products: vec![RequestProductSnapshot {
                product_id: Some("P1".to_string()),
                product_name: "Widget".to_string(),
                production_group_id: Some(group_id.to_string()),
                production_group_name: "Tools".to_string(),
            }],
            status: RequestStatus::Pending,
            status_history: vec![created_history_entry(created_at)],
            created_at,
            updated_at: created_at,
        }
    }

    #[test]
    fn test_insert_and_load_roundtrip() {
        let repo = repo();
        let now = Utc::now();
        repo.insert(&sample("REQ-000001", now, "Istanbul", "G1")).unwrap();

        let loaded = repo.find_by_id("REQ-000001").unwrap().unwrap();
        assert_eq!(loaded.products.len(), 1);
        assert_eq!(loaded.products[0].product_name, "Widget");
        assert_eq!(loaded.status_history.len(), 1);
        assert_eq!(loaded.status_history[0].note, "created");
        assert_eq!(loaded.production_group_ids, vec!["G1".to_string()]);
    }

    #[test]
    fn test_append_status_grows_history() {
        let repo = repo();
        repo.insert(&sample("R1", Utc::now(), "Izmir", "G1")).unwrap();

        let entry = StatusHistoryEntry {
            status: RequestStatus::Shipped,
            note: String::new(),
            updated_by: Some("admin".to_string()),
            timestamp: Utc::now(),
        };
        let updated = repo.append_status("R1", &entry).unwrap();
        assert_eq!(updated.status, RequestStatus::Shipped);
        assert_eq!(updated.status_history.len(), 2);
        assert_eq!(updated.status_history[0].status, RequestStatus::Pending);

        let err = repo.append_status("missing", &entry).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_list_page_filters_and_orders_newest_first() {
        let repo = repo();
        let base = Utc::now();
        repo.insert(&sample("R1", base - Duration::minutes(2), "Izmir", "G1")).unwrap();
        repo.insert(&sample("R2", base - Duration::minutes(1), "Izmir", "G2")).unwrap();
        repo.insert(&sample("R3", base, "Ankara", "G1")).unwrap();

        let (page, total) = repo.list_page(&RequestFilter::default(), 2, 0).unwrap();
        assert_eq!(total, 3);
        assert_eq!(page[0].request_id, "R3");
        assert_eq!(page[1].request_id, "R2");

        let filter = RequestFilter {
            province: Some("Izmir".to_string()),
            production_group_id: Some("G1".to_string()),
            ..Default::default()
        };
        let (page, total) = repo.list_page(&filter, 10, 0).unwrap();
        assert_eq!(total, 1);
        assert_eq!(page[0].request_id, "R1");
    }

    #[test]
    fn test_list_all_loads_children_beyond_one_batch() {
        let repo = repo();
        let base = Utc::now();
        let total = CHILD_ID_BATCH * 2 + 7;
        for i in 0..total {
            let id = format!("R{:05}", i);
            repo.insert(&sample(&id, base + Duration::milliseconds(i as i64), "Izmir", "G1"))
                .unwrap();
        }

        let all = repo.list_all(&RequestFilter::default()).unwrap();
        assert_eq!(all.len(), total);
        assert!(all.iter().all(|r| r.products.len() == 1 && r.status_history.len() == 1));
        assert_eq!(all[0].request_id, format!("R{:05}", total - 1));
    }

    #[test]
    fn test_delete_removes_children() {
        let repo = repo();
        repo.insert(&sample("R1", Utc::now(), "Izmir", "G1")).unwrap();
        repo.delete("R1").unwrap();
        assert!(repo.find_by_id("R1").unwrap().is_none());
        assert!(repo.delete("R1").unwrap_err().is_not_found());
    }
}
