// ==========================================
// 样品申请目录系统 - API层错误类型
// ==========================================
// 职责: 定义API层错误类型，把仓储 / 导入 / 校验错误转换为用户可读的错误
// 说明: code() 为稳定的机器码，to_error_response() 生成可序列化的错误载荷
// ==========================================

use crate::domain::catalog::DependentSummary;
use crate::domain::types::EntityKind;
use crate::engine::dependency_guard::DeleteCheck;
use crate::engine::request_validator::RequestValidationError;
use crate::importer::error::ImportError;
use crate::repository::error::RepositoryError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// API层错误类型
#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // 权限错误
    // ==========================================
    #[error("无权限: {0}")]
    Unauthorized(String),

    // ==========================================
    // 业务规则错误
    // ==========================================
    #[error("无效输入: {0}")]
    InvalidInput(String),

    #[error("数据验证失败: {0}")]
    ValidationError(String),

    #[error("产品与生产分组不匹配: product_id={product_id}, production_group_id={production_group_id}")]
    UnmatchedAssignment {
        product_id: String,
        production_group_id: String,
    },

    #[error("资源未找到: {0}")]
    NotFound(String),

    #[error("名称冲突: {0}")]
    Conflict(String),

    /// 依赖守卫拒绝删除（带依赖列表与处理建议）
    #[error("{entity}存在 {dependent_count} 个依赖，无法删除")]
    DeleteBlocked {
        entity: EntityKind,
        dependent_count: usize,
        dependents: Vec<DependentSummary>,
        action: String,
    },

    // ==========================================
    // 导入错误
    // ==========================================
    #[error("目录导入失败: {0}")]
    ImportError(String),

    // ==========================================
    // 数据访问错误
    // ==========================================
    #[error("数据库错误: {0}")]
    DatabaseError(String),

    #[error("数据库连接失败: {0}")]
    DatabaseConnectionError(String),

    #[error("数据库事务失败: {0}")]
    DatabaseTransactionError(String),

    // ==========================================
    // 通用错误
    // ==========================================
    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ApiError {
    pub fn delete_blocked(check: DeleteCheck) -> Self {
        ApiError::DeleteBlocked {
            entity: check.entity_kind,
            dependent_count: check.dependent_count,
            dependents: check.dependents,
            action: check.action.unwrap_or_default(),
        }
    }

    /// 稳定错误码
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Unauthorized(_) => "UNAUTHORIZED",
            ApiError::InvalidInput(_) => "INVALID_INPUT",
            ApiError::ValidationError(_) => "VALIDATION_ERROR",
            ApiError::UnmatchedAssignment { .. } => "UNMATCHED_ASSIGNMENT",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Conflict(_) => "CONFLICT",
            ApiError::DeleteBlocked { .. } => "DELETE_BLOCKED",
            ApiError::ImportError(_) => "IMPORT_ERROR",
            ApiError::DatabaseError(_) => "DATABASE_ERROR",
            ApiError::DatabaseConnectionError(_) => "DATABASE_CONNECTION_ERROR",
            ApiError::DatabaseTransactionError(_) => "DATABASE_TRANSACTION_ERROR",
            ApiError::InternalError(_) => "INTERNAL_ERROR",
            ApiError::Other(_) => "OTHER_ERROR",
        }
    }

    pub fn to_error_response(&self) -> ErrorResponse {
        ErrorResponse {
            code: self.code().to_string(),
            message: self.to_string(),
            details: match self {
                ApiError::UnmatchedAssignment {
                    product_id,
                    production_group_id,
                } => Some(serde_json::json!({
                    "product_id": product_id,
                    "production_group_id": production_group_id,
                })),
                ApiError::DeleteBlocked {
                    entity,
                    dependent_count,
                    dependents,
                    action,
                } => Some(serde_json::json!({
                    "entity": entity,
                    "dependent_count": dependent_count,
                    "dependents": dependents,
                    "action": action,
                })),
                _ => None,
            },
        }
    }

    /// 序列化为 JSON 字符串（CLI 输出使用）
    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.to_error_response()).unwrap_or_else(|_| self.to_string())
    }
}

/// 错误载荷
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// 错误码
    pub code: String,
    /// 错误消息
    pub message: String,
    /// 详细信息（可选）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

// ==========================================
// 从 RepositoryError 转换
// ==========================================
impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{}(id={})不存在", entity, id))
            }
            RepositoryError::DatabaseConnectionError(msg) => ApiError::DatabaseConnectionError(msg),
            RepositoryError::DatabaseTransactionError(msg) => {
                ApiError::DatabaseTransactionError(msg)
            }
            RepositoryError::LockError(msg) => {
                ApiError::DatabaseConnectionError(format!("数据库锁获取失败: {}", msg))
            }
            RepositoryError::DatabaseQueryError(msg) => ApiError::DatabaseError(msg),
            RepositoryError::UniqueConstraintViolation(msg) => ApiError::Conflict(msg),
            // 外键: 引用了不存在的记录，或删除仍被引用的记录
            RepositoryError::ForeignKeyViolation(msg) => {
                ApiError::Conflict(format!("外键约束违反: {}", msg))
            }

            RepositoryError::ValidationError(msg) => ApiError::ValidationError(msg),
            RepositoryError::FieldValueError { field, message } => {
                ApiError::InvalidInput(format!("字段{}错误: {}", field, message))
            }

            RepositoryError::InternalError(msg) => ApiError::InternalError(msg),
            RepositoryError::Other(err) => ApiError::Other(err),
        }
    }
}

// ==========================================
// 从 ImportError 转换
// ==========================================
impl From<ImportError> for ApiError {
    fn from(err: ImportError) -> Self {
        match err {
            ImportError::Repository(repo_err) => ApiError::from(repo_err),
            ImportError::FileNotFound(path) => ApiError::NotFound(format!("文件不存在: {}", path)),
            ImportError::UnsupportedFormat(_) => ApiError::InvalidInput(err.to_string()),
            other => ApiError::ImportError(other.to_string()),
        }
    }
}

// ==========================================
// 从 RequestValidationError 转换
// ==========================================
impl From<RequestValidationError> for ApiError {
    fn from(err: RequestValidationError) -> Self {
        match err {
            RequestValidationError::UnmatchedAssignment {
                product_id,
                production_group_id,
            } => ApiError::UnmatchedAssignment {
                product_id,
                production_group_id,
            },
            RequestValidationError::Repository(repo_err) => ApiError::from(repo_err),
            other => ApiError::ValidationError(other.to_string()),
        }
    }
}

/// Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unique_violation_maps_to_conflict() {
        let err = ApiError::from(RepositoryError::UniqueConstraintViolation("sector.name".into()));
        assert_eq!(err.code(), "CONFLICT");
    }

    #[test]
    fn test_not_found_message_names_entity() {
        let err = ApiError::from(RepositoryError::not_found("Sector", "S1"));
        assert_eq!(err.code(), "NOT_FOUND");
        assert!(err.to_string().contains("Sector(id=S1)"));
    }

    #[test]
    fn test_unmatched_assignment_carries_details() {
        let err = ApiError::from(RequestValidationError::UnmatchedAssignment {
            product_id: "P1".into(),
            production_group_id: "G1".into(),
        });
        let payload = err.to_error_response();
        assert_eq!(payload.code, "UNMATCHED_ASSIGNMENT");
        let details = payload.details.unwrap();
        assert_eq!(details["product_id"], "P1");
        assert_eq!(details["production_group_id"], "G1");
    }

    #[test]
    fn test_missing_field_is_validation_error() {
        let err = ApiError::from(RequestValidationError::MissingField("email"));
        assert_eq!(err.code(), "VALIDATION_ERROR");
        assert!(err.to_error_response().details.is_none());
    }

    #[test]
    fn test_import_repository_error_is_unwrapped() {
        let err = ApiError::from(ImportError::Repository(RepositoryError::LockError("x".into())));
        assert_eq!(err.code(), "DATABASE_CONNECTION_ERROR");
    }
}
