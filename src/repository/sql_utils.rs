// ==========================================
// 样品申请目录系统 - 仓储层 SQL 辅助
// ==========================================
// 时间戳统一按 RFC3339 文本存储（固定纳秒位数，保证按文本排序即按时间排序）
// ==========================================

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, Transaction, TransactionBehavior};

/// 开启写事务（BEGIN IMMEDIATE）
///
/// 先读后写的事务必须一开始就拿写锁：DEFERRED 事务在读锁升级为写锁时
/// 遇到其他连接的写入会直接返回 SQLITE_BUSY，不走 busy_timeout 等待
pub fn begin_write(conn: &mut Connection) -> rusqlite::Result<Transaction<'_>> {
    conn.transaction_with_behavior(TransactionBehavior::Immediate)
}

/// 时间戳 → 存储文本
pub fn ts_to_sql(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

/// 存储文本 → 时间戳（列解析失败时返回转换错误，不静默回退）
pub fn parse_ts(col: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(col, Type::Text, Box::new(e)))
}

/// 生成 IN 子句占位符: `?1, ?2, ?3`
pub fn in_placeholders(count: usize) -> String {
    (1..=count)
        .map(|i| format!("?{}", i))
        .collect::<Vec<_>>()
        .join(", ")
}

/// 去重并保持首次出现顺序
pub fn dedup_preserving_order(ids: &[String]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    ids.iter()
        .filter(|id| seen.insert(id.as_str()))
        .cloned()
        .collect()
}
