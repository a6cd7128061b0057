// ==========================================
// 样品申请目录系统 - 领域类型定义
// ==========================================
// 职责: 申请状态、实体类别等枚举
// 序列化格式: 小写 snake_case（与数据库一致）
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 申请状态 (Request Status)
// ==========================================
// 说明: 状态之间不设顺序约束，管理员可从任意状态改为任意已知状态
//       （包括重新打开 completed / cancelled）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,   // 待处理
    Review,    // 审核中
    Approved,  // 已批准
    Preparing, // 备样中
    Shipped,   // 已发货
    Delivered, // 已送达
    Completed, // 已完成
    Cancelled, // 已取消
}

impl RequestStatus {
    /// 全部已知状态（按正常流转顺序）
    pub const ALL: [RequestStatus; 8] = [
        RequestStatus::Pending,
        RequestStatus::Review,
        RequestStatus::Approved,
        RequestStatus::Preparing,
        RequestStatus::Shipped,
        RequestStatus::Delivered,
        RequestStatus::Completed,
        RequestStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Review => "review",
            RequestStatus::Approved => "approved",
            RequestStatus::Preparing => "preparing",
            RequestStatus::Shipped => "shipped",
            RequestStatus::Delivered => "delivered",
            RequestStatus::Completed => "completed",
            RequestStatus::Cancelled => "cancelled",
        }
    }

    /// 严格解析：未知取值返回 None（不做默认回退）
    pub fn parse(s: &str) -> Option<RequestStatus> {
        let normalized = s.trim().to_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|status| status.as_str() == normalized)
    }

    /// 是否为终态（仅用于展示，不做状态锁定）
    pub fn is_terminal(&self) -> bool {
        matches!(self, RequestStatus::Completed | RequestStatus::Cancelled)
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// 可删除实体类别 (Entity Kind)
// ==========================================
// 依赖守卫只覆盖存在下游引用的实体
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Sector,
    ProductionGroup,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Sector => "sector",
            EntityKind::ProductionGroup => "production_group",
        }
    }

    pub fn parse(s: &str) -> Option<EntityKind> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "sector" => Some(EntityKind::Sector),
            "production_group" | "group" => Some(EntityKind::ProductionGroup),
            _ => None,
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
