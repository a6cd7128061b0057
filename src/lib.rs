// ==========================================
// 样品申请目录系统 - 核心库
// ==========================================
// 职责: 目录导入对账 / 引用完整性守卫 / 样品申请校验与快照 / 申请状态流转
// 技术栈: Rust + SQLite
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 业务规则
pub mod engine;

// 导入层 - 外部表格
pub mod importer;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一）
pub mod db;

// 日志系统
pub mod logging;

// 外部协作方适配（图片存储 / 汇总表 / 通知）
pub mod integration;

// API 层 - 业务接口
pub mod api;

// 应用层 - 组装
pub mod app;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{EntityKind, RequestStatus};

// 领域实体
pub use domain::{
    ImportLog, ImportOutcome, Product, ProductAssignment, ProductionGroup, SampleRequest, Sector,
};

// 引擎
pub use engine::{DependencyGuard, RequestValidator, SideEffectDispatcher};

// 导入
pub use importer::{CatalogImporter, CatalogImporterImpl};

// API
pub use api::{CatalogApi, ImportApi, RequestApi};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "样品申请目录系统";
