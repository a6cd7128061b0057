// ==========================================
// 样品申请目录系统 - API 层
// ==========================================
// 职责: 权限校验 + 错误转换，供 CLI / 外部服务调用
// ==========================================

pub mod auth;
pub mod catalog_api;
pub mod error;
pub mod import_api;
pub mod request_api;

// 重导出核心类型
pub use auth::CallerContext;
pub use catalog_api::CatalogApi;
pub use error::{ApiError, ApiResult, ErrorResponse};
pub use import_api::ImportApi;
pub use request_api::{CustomerListQuery, CustomerListResponse, CustomerRow, Pagination, RequestApi};
