// ==========================================
// 样品申请目录系统 - 目录领域模型
// ==========================================
// 层级: Sector → ProductionGroup → Product
// 关联: ProductAssignment 是表达“产品在某行业某分组下销售”的唯一结构
// ==========================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ==========================================
// Sector - 行业（层级根）
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sector {
    pub sector_id: String,
    pub name: String, // 全局唯一
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Sector {
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            sector_id: Uuid::new_v4().to_string(),
            name: name.into(),
            image_url: None,
            created_at: now,
            updated_at: now,
        }
    }
}

// ==========================================
// ProductionGroup - 生产分组
// ==========================================
// 唯一性: (name, sector_id)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductionGroup {
    pub production_group_id: String,
    pub name: String,
    pub sector_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProductionGroup {
    pub fn new(name: impl Into<String>, sector_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            production_group_id: Uuid::new_v4().to_string(),
            name: name.into(),
            sector_id: sector_id.into(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// 分组列表视图（带所属行业名称）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductionGroupView {
    pub production_group_id: String,
    pub name: String,
    pub sector_id: String,
    pub sector_name: String,
}

// ==========================================
// Product - 产品（全目录唯一，独立于分组）
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub product_id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            product_id: Uuid::new_v4().to_string(),
            name: name.into(),
            created_at: now,
            updated_at: now,
        }
    }
}

// ==========================================
// ProductAssignment - 产品归属关联
// ==========================================
// 唯一性: (sector_id, production_group_id, product_id)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductAssignment {
    pub assignment_id: String,
    pub sector_id: String,
    pub production_group_id: String,
    pub product_id: String,
    pub created_at: DateTime<Utc>,
}

impl ProductAssignment {
    pub fn new(
        sector_id: impl Into<String>,
        production_group_id: impl Into<String>,
        product_id: impl Into<String>,
    ) -> Self {
        Self {
            assignment_id: Uuid::new_v4().to_string(),
            sector_id: sector_id.into(),
            production_group_id: production_group_id.into(),
            product_id: product_id.into(),
            created_at: Utc::now(),
        }
    }
}

/// 依赖方摘要（用于删除守卫返回的依赖列表）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependentSummary {
    pub id: String,
    pub name: String,
}
