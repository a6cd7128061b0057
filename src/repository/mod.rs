// ==========================================
// 样品申请目录系统 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// ==========================================
// 职责: 提供数据访问接口,屏蔽数据库细节
// 约束: 所有查询使用参数化,防止 SQL 注入
// ==========================================

pub mod assignment_repo;
pub mod error;
pub mod import_log_repo;
pub mod product_repo;
pub mod production_group_repo;
pub mod request_repo;
pub mod sector_repo;
pub mod sql_utils;

// 重导出核心仓储
pub use assignment_repo::{AssignmentRepository, ChunkWriteResult};
pub use error::{RepositoryError, RepositoryResult};
pub use import_log_repo::ImportLogRepository;
pub use product_repo::ProductRepository;
pub use production_group_repo::{GroupDependents, ProductionGroupRepository};
pub use request_repo::{created_history_entry, RequestFilter, RequestRepository};
pub use sector_repo::SectorRepository;
