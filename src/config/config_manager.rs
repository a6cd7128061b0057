// ==========================================
// 样品申请目录系统 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (key-value + scope)
// ==========================================

use crate::config::catalog_config_trait::{CatalogConfigReader, ConfigResult};
use crate::db::open_sqlite_connection;
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

const GLOBAL_SCOPE: &str = "global";

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> ConfigResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        crate::db::init_schema(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> ConfigResult<Self> {
        {
            let conn_guard = conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
            crate::db::configure_sqlite_connection(&conn_guard)?;
        }

        Ok(Self { conn })
    }

    /// 读取 global scope 的配置值
    ///
    /// # 返回
    /// - Some(String): 配置值
    /// - None: 配置不存在
    pub fn get_global_config_value(&self, key: &str) -> ConfigResult<Option<String>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let value = conn
            .query_row(
                "SELECT value FROM config_kv WHERE scope_id = ?1 AND key = ?2",
                params![GLOBAL_SCOPE, key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    /// 写入 global scope 的配置值（UPSERT）
    pub fn set_global_config_value(&self, key: &str, value: &str) -> ConfigResult<()> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
        conn.execute(
            r#"
            INSERT INTO config_kv (scope_id, key, value, updated_at)
            VALUES (?1, ?2, ?3, datetime('now'))
            ON CONFLICT(scope_id, key) DO UPDATE SET value = ?3, updated_at = datetime('now')
            "#,
            params![GLOBAL_SCOPE, key, value],
        )?;

        tracing::info!(config_key = key, "配置已更新");
        Ok(())
    }

    /// 删除 global scope 的配置值（恢复默认）
    pub fn remove_global_config_value(&self, key: &str) -> ConfigResult<bool> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
        let rows = conn.execute(
            "DELETE FROM config_kv WHERE scope_id = ?1 AND key = ?2",
            params![GLOBAL_SCOPE, key],
        )?;
        Ok(rows > 0)
    }

    /// 所有 global 配置的快照（JSON，按键排序）
    pub fn get_config_snapshot(&self) -> ConfigResult<String> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let mut stmt = conn.prepare("SELECT key, value FROM config_kv WHERE scope_id = ?1 ORDER BY key")?;
        let rows = stmt.query_map(params![GLOBAL_SCOPE], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut config_map: BTreeMap<String, String> = BTreeMap::new();
        for row in rows {
            let (key, value) = row?;
            config_map.insert(key, value);
        }

        Ok(serde_json::to_string(&json!(config_map))?)
    }

    fn get_config_or_default(&self, key: &str, default: &str) -> ConfigResult<String> {
        Ok(self
            .get_global_config_value(key)?
            .unwrap_or_else(|| default.to_string()))
    }

    /// 正整数配置；格式错误或为 0 时告警并回退默认值
    fn get_positive_usize(&self, key: &str, default: usize) -> ConfigResult<usize> {
        let value = self.get_config_or_default(key, &default.to_string())?;
        match value.trim().parse::<usize>() {
            Ok(n) if n > 0 => Ok(n),
            _ => {
                tracing::warn!(config_key = key, raw_value = %value, default, "配置格式错误，使用默认值");
                Ok(default)
            }
        }
    }

    /// 可选文本配置；空白视为未配置
    fn get_optional_text(&self, key: &str) -> ConfigResult<Option<String>> {
        Ok(self
            .get_global_config_value(key)?
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty()))
    }
}

// ==========================================
// CatalogConfigReader Trait 实现
// ==========================================
#[async_trait]
impl CatalogConfigReader for ConfigManager {
    async fn get_import_source_name(&self) -> ConfigResult<String> {
        Ok(self
            .get_optional_text(config_keys::IMPORT_SOURCE_NAME)?
            .unwrap_or_else(|| defaults::IMPORT_SOURCE_NAME.to_string()))
    }

    async fn get_dry_run_sample_size(&self) -> ConfigResult<usize> {
        self.get_positive_usize(config_keys::DRY_RUN_SAMPLE_SIZE, defaults::DRY_RUN_SAMPLE_SIZE)
    }

    async fn get_import_chunk_size(&self) -> ConfigResult<usize> {
        self.get_positive_usize(config_keys::IMPORT_CHUNK_SIZE, defaults::IMPORT_CHUNK_SIZE)
    }

    async fn get_customer_page_size(&self) -> ConfigResult<usize> {
        self.get_positive_usize(config_keys::CUSTOMER_PAGE_SIZE, defaults::CUSTOMER_PAGE_SIZE)
    }

    async fn get_other_sector_label(&self) -> ConfigResult<String> {
        Ok(self
            .get_optional_text(config_keys::OTHER_SECTOR_LABEL)?
            .unwrap_or_else(|| defaults::OTHER_SECTOR_LABEL.to_string()))
    }

    async fn get_admin_email(&self) -> ConfigResult<Option<String>> {
        self.get_optional_text(config_keys::ADMIN_EMAIL)
    }

    async fn get_excel_sheet_name(&self) -> ConfigResult<Option<String>> {
        self.get_optional_text(config_keys::EXCEL_SHEET_NAME)
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 导入
    pub const IMPORT_SOURCE_NAME: &str = "import_source_name";
    pub const DRY_RUN_SAMPLE_SIZE: &str = "dry_run_sample_size";
    pub const IMPORT_CHUNK_SIZE: &str = "import_chunk_size";
    pub const EXCEL_SHEET_NAME: &str = "excel_sheet_name";

    // 客户列表
    pub const CUSTOMER_PAGE_SIZE: &str = "customer_page_size";
    pub const OTHER_SECTOR_LABEL: &str = "other_sector_label";

    // 通知
    pub const ADMIN_EMAIL: &str = "admin_email";
}

/// 配置默认值
pub mod defaults {
    pub const IMPORT_SOURCE_NAME: &str = "tabular-import";
    pub const DRY_RUN_SAMPLE_SIZE: usize = 5;
    pub const IMPORT_CHUNK_SIZE: usize = 500;
    pub const CUSTOMER_PAGE_SIZE: usize = 10;
    pub const OTHER_SECTOR_LABEL: &str = "Others";
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_in_memory;

    fn manager() -> ConfigManager {
        ConfigManager::from_connection(Arc::new(Mutex::new(open_in_memory().unwrap()))).unwrap()
    }

    #[tokio::test]
    async fn test_defaults_when_unset() {
        let config = manager();
        assert_eq!(config.get_import_source_name().await.unwrap(), "tabular-import");
        assert_eq!(config.get_dry_run_sample_size().await.unwrap(), 5);
        assert_eq!(config.get_import_chunk_size().await.unwrap(), 500);
        assert_eq!(config.get_customer_page_size().await.unwrap(), 10);
        assert_eq!(config.get_other_sector_label().await.unwrap(), "Others");
        assert!(config.get_admin_email().await.unwrap().is_none());
        assert!(config.get_excel_sheet_name().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_set_value_overrides_default() {
        let config = manager();
        config.set_global_config_value(config_keys::CUSTOMER_PAGE_SIZE, "25").unwrap();
        config.set_global_config_value(config_keys::CUSTOMER_PAGE_SIZE, "30").unwrap();
        assert_eq!(config.get_customer_page_size().await.unwrap(), 30);

        config.set_global_config_value(config_keys::ADMIN_EMAIL, "ops@example.com").unwrap();
        assert_eq!(
            config.get_admin_email().await.unwrap().as_deref(),
            Some("ops@example.com")
        );
    }

    #[tokio::test]
    async fn test_invalid_number_falls_back_to_default() {
        let config = manager();
        config.set_global_config_value(config_keys::IMPORT_CHUNK_SIZE, "zero").unwrap();
        assert_eq!(config.get_import_chunk_size().await.unwrap(), 500);
        config.set_global_config_value(config_keys::IMPORT_CHUNK_SIZE, "0").unwrap();
        assert_eq!(config.get_import_chunk_size().await.unwrap(), 500);
    }

    #[test]
    fn test_snapshot_and_remove() {
        let config = manager();
        config.set_global_config_value("b_key", "2").unwrap();
        config.set_global_config_value("a_key", "1").unwrap();
        assert_eq!(config.get_config_snapshot().unwrap(), r#"{"a_key":"1","b_key":"2"}"#);

        assert!(config.remove_global_config_value("a_key").unwrap());
        assert!(!config.remove_global_config_value("a_key").unwrap());
    }
}
