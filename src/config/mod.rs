// ==========================================
// 样品申请目录系统 - 配置层
// ==========================================
// 职责: 系统配置管理
// 存储: config_kv 表
// ==========================================

pub mod catalog_config_trait;
pub mod config_manager;

// 重导出核心配置管理器
pub use catalog_config_trait::{CatalogConfigReader, ConfigResult};
pub use config_manager::{config_keys, defaults, ConfigManager};
