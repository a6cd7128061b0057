// ==========================================
// 样品申请目录系统 - 样品申请领域模型
// ==========================================
// 红线: products 为提交时刻的冻结快照，不随目录改名/删除变化
// 红线: status_history 只追加，不改写、不截断
// ==========================================

use crate::domain::types::RequestStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ==========================================
// ContactInfo - 联系信息（创建后不可修改）
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContactInfo {
    pub company_name: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: String,
    pub phone: String,
    pub address: Option<String>,
    pub province: Option<String>,
    pub district: Option<String>,
}

impl ContactInfo {
    /// 姓名拼接（均为空时返回 "-"）
    pub fn full_name(&self) -> String {
        let parts: Vec<&str> = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();

        if parts.is_empty() {
            "-".to_string()
        } else {
            parts.join(" ")
        }
    }
}

// ==========================================
// RequestLineInput - 客户提交的行项目（未校验）
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestLineInput {
    pub product_id: String,
    pub production_group_id: String,
}

impl RequestLineInput {
    pub fn new(product_id: impl Into<String>, production_group_id: impl Into<String>) -> Self {
        Self {
            product_id: product_id.into(),
            production_group_id: production_group_id.into(),
        }
    }
}

// ==========================================
// RequestProductSnapshot - 行项目快照
// ==========================================
// 说明: id 可能指向已被删除的目录记录，名称以快照为准
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestProductSnapshot {
    pub product_id: Option<String>,
    pub product_name: String,
    pub production_group_id: Option<String>,
    pub production_group_name: String,
}

// ==========================================
// StatusHistoryEntry - 状态变更记录
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusHistoryEntry {
    pub status: RequestStatus,
    pub note: String,
    pub updated_by: Option<String>,
    pub timestamp: DateTime<Utc>,
}

// ==========================================
// SampleRequest - 样品申请（订单）
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleRequest {
    pub request_id: String,
    pub contact: ContactInfo,
    pub sector_id: Option<String>, // None = “其他”行业
    pub production_group_ids: Vec<String>,
    pub products: Vec<RequestProductSnapshot>,
    pub status: RequestStatus,
    pub status_history: Vec<StatusHistoryEntry>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SampleRequest {
    /// 快照中的产品名称（保持行顺序）
    pub fn product_names(&self) -> Vec<String> {
        self.products.iter().map(|p| p.product_name.clone()).collect()
    }

    /// 快照中的分组名称（保持行顺序）
    pub fn group_names(&self) -> Vec<String> {
        self.products
            .iter()
            .map(|p| p.production_group_name.clone())
            .collect()
    }

    /// 申请编号短码（id 末 6 位）
    pub fn short_id(&self) -> String {
        let chars: Vec<char> = self.request_id.chars().collect();
        let start = chars.len().saturating_sub(6);
        chars[start..].iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_name_joins_present_parts() {
        let contact = ContactInfo {
            first_name: Some("Ada".to_string()),
            last_name: None,
            ..Default::default()
        };
        assert_eq!(contact.full_name(), "Ada");
    }

    #[test]
    fn test_full_name_falls_back_to_dash() {
        let contact = ContactInfo {
            first_name: Some("  ".to_string()),
            ..Default::default()
        };
        assert_eq!(contact.full_name(), "-");
    }
}
