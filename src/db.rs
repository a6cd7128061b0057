// ==========================================
// 样品申请目录系统 - SQLite 连接初始化与建表
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为（外键必须每个连接单独开启）
// - 统一 busy_timeout，减少多进程并发导入时的偶发 busy 错误
// - 唯一约束 / 外键约束写在 schema 里，作为引擎检查之后的第二道防线
// ==========================================

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要“每个连接”单独开启
/// - busy_timeout 需要“每个连接”单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 打开内存库（测试 / 试运行工具使用），并完成建表
pub fn open_in_memory() -> rusqlite::Result<Connection> {
    let conn = Connection::open_in_memory()?;
    configure_sqlite_connection(&conn)?;
    init_schema(&conn)?;
    Ok(conn)
}

/// 建表（幂等）
///
/// 约束说明：
/// - production_group(name, sector_id) 唯一；同名分组可挂在不同行业下
/// - product_assignment 三元组唯一；重复建立关联由仓储层按错误类型识别
/// - 所有外键均不级联删除（无 ON DELETE CASCADE）
/// - request_line 只保存快照，不引用目录表
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS config_kv (
            scope_id TEXT NOT NULL,
            key TEXT NOT NULL,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (scope_id, key)
        );

        CREATE TABLE IF NOT EXISTS sector (
            sector_id TEXT PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            image_url TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS production_group (
            production_group_id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            sector_id TEXT NOT NULL REFERENCES sector(sector_id),
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            UNIQUE(name, sector_id)
        );
        CREATE INDEX IF NOT EXISTS idx_production_group_sector ON production_group(sector_id);

        CREATE TABLE IF NOT EXISTS product (
            product_id TEXT PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS product_assignment (
            assignment_id TEXT PRIMARY KEY,
            sector_id TEXT NOT NULL REFERENCES sector(sector_id),
            production_group_id TEXT NOT NULL REFERENCES production_group(production_group_id),
            product_id TEXT NOT NULL REFERENCES product(product_id),
            created_at TEXT NOT NULL,
            UNIQUE(sector_id, production_group_id, product_id)
        );
        CREATE INDEX IF NOT EXISTS idx_assignment_group ON product_assignment(production_group_id);
        CREATE INDEX IF NOT EXISTS idx_assignment_product ON product_assignment(product_id);

        CREATE TABLE IF NOT EXISTS sample_request (
            request_id TEXT PRIMARY KEY,
            company_name TEXT NOT NULL,
            first_name TEXT,
            last_name TEXT,
            email TEXT NOT NULL,
            phone TEXT NOT NULL,
            address TEXT,
            province TEXT,
            district TEXT,
            sector_id TEXT,
            production_group_ids_json TEXT NOT NULL,
            status TEXT NOT NULL CHECK(status IN (
                'pending', 'review', 'approved', 'preparing',
                'shipped', 'delivered', 'completed', 'cancelled'
            )),
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_sample_request_created_at ON sample_request(created_at DESC);
        CREATE INDEX IF NOT EXISTS idx_sample_request_sector ON sample_request(sector_id);

        CREATE TABLE IF NOT EXISTS request_line (
            request_id TEXT NOT NULL REFERENCES sample_request(request_id),
            line_no INTEGER NOT NULL,
            product_id TEXT,
            product_name TEXT NOT NULL,
            production_group_id TEXT,
            production_group_name TEXT NOT NULL,
            PRIMARY KEY (request_id, line_no)
        );
        CREATE INDEX IF NOT EXISTS idx_request_line_group ON request_line(production_group_id);

        CREATE TABLE IF NOT EXISTS request_status_history (
            request_id TEXT NOT NULL REFERENCES sample_request(request_id),
            seq_no INTEGER NOT NULL,
            status TEXT NOT NULL,
            note TEXT NOT NULL DEFAULT '',
            updated_by TEXT,
            changed_at TEXT NOT NULL,
            PRIMARY KEY (request_id, seq_no)
        );

        CREATE TABLE IF NOT EXISTS import_log (
            import_log_id TEXT PRIMARY KEY,
            source TEXT NOT NULL,
            dry_run INTEGER NOT NULL,
            row_count INTEGER NOT NULL,
            skipped_rows INTEGER NOT NULL DEFAULT 0,
            inserted_sectors INTEGER NOT NULL DEFAULT 0,
            inserted_groups INTEGER NOT NULL DEFAULT 0,
            inserted_products INTEGER NOT NULL DEFAULT 0,
            inserted_assignments INTEGER NOT NULL DEFAULT 0,
            duplicate_assignments INTEGER NOT NULL DEFAULT 0,
            started_at TEXT NOT NULL,
            finished_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_import_log_started_at ON import_log(started_at DESC);
        "#,
    )?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [CURRENT_SCHEMA_VERSION],
    )?;

    Ok(())
}

/// 读取 schema_version（若表不存在则返回 None）
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> = conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}
