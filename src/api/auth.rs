// ==========================================
// 样品申请目录系统 - 调用方身份
// ==========================================
// 说明: 身份认证由外层完成，这里只携带结果
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallerContext {
    pub actor: Option<String>,
    pub is_admin: bool,
}

impl CallerContext {
    pub fn admin(actor: impl Into<String>) -> Self {
        Self {
            actor: Some(actor.into()),
            is_admin: true,
        }
    }

    /// 匿名访客（公开提交申请使用）
    pub fn anonymous() -> Self {
        Self {
            actor: None,
            is_admin: false,
        }
    }

    pub fn customer(actor: impl Into<String>) -> Self {
        Self {
            actor: Some(actor.into()),
            is_admin: false,
        }
    }

    /// 管理员校验
    pub fn require_admin(&self, operation: &str) -> ApiResult<()> {
        if self.is_admin {
            return Ok(());
        }
        tracing::warn!(actor = ?self.actor, operation, "非管理员调用被拒绝");
        Err(ApiError::Unauthorized(format!("{} 需要管理员权限", operation)))
    }
}
