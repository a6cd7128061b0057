// ==========================================
// 样品申请目录系统 - 依赖守卫
// ==========================================
// 规则:
// - 行业: 存在引用它的生产分组 → 禁止删除
// - 生产分组: 存在引用它的产品关联 → 禁止删除
// 红线: 不级联删除；拒绝时必须给出依赖列表与处理建议
// ==========================================

use crate::domain::catalog::DependentSummary;
use crate::domain::types::EntityKind;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::{ProductionGroupRepository, SectorRepository};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

// ==========================================
// DeleteCheck - 删除预检结果
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeleteCheck {
    pub entity_kind: EntityKind,
    pub entity_id: String,
    pub allowed: bool,
    pub dependent_count: usize,
    pub dependents: Vec<DependentSummary>,
    pub message: Option<String>,
    pub action: Option<String>,
}

impl DeleteCheck {
    fn allowed(entity_kind: EntityKind, entity_id: &str) -> Self {
        Self {
            entity_kind,
            entity_id: entity_id.to_string(),
            allowed: true,
            dependent_count: 0,
            dependents: Vec::new(),
            message: None,
            action: None,
        }
    }

    fn blocked_sector(sector_id: &str, groups: Vec<DependentSummary>) -> Self {
        let count = groups.len();
        Self {
            entity_kind: EntityKind::Sector,
            entity_id: sector_id.to_string(),
            allowed: false,
            dependent_count: count,
            dependents: groups,
            message: Some(format!("该行业下有 {} 个生产分组依赖，无法删除", count)),
            action: Some("请先删除这些生产分组或将其移动到其他行业".to_string()),
        }
    }

    fn blocked_group(group_id: &str, assignment_count: usize, products: Vec<DependentSummary>) -> Self {
        Self {
            entity_kind: EntityKind::ProductionGroup,
            entity_id: group_id.to_string(),
            allowed: false,
            dependent_count: assignment_count,
            message: Some(format!("该生产分组下有 {} 个产品关联，无法删除", assignment_count)),
            dependents: products,
            action: Some("请先解除这些产品与该分组的关联".to_string()),
        }
    }
}

/// 守卫删除结果
#[derive(Debug, Clone, PartialEq)]
pub enum GuardedDelete {
    Deleted,
    Blocked(DeleteCheck),
}

// ==========================================
// DependencyGuard - 依赖守卫
// ==========================================
pub struct DependencyGuard {
    sector_repo: Arc<SectorRepository>,
    group_repo: Arc<ProductionGroupRepository>,
}

impl DependencyGuard {
    pub fn new(sector_repo: Arc<SectorRepository>, group_repo: Arc<ProductionGroupRepository>) -> Self {
        Self {
            sector_repo,
            group_repo,
        }
    }

    /// 删除预检（只读）
    ///
    /// # 返回
    /// - Ok(check): allowed 表示当前可删除
    /// - Err(NotFound): 实体不存在
    pub fn can_delete(&self, kind: EntityKind, id: &str) -> RepositoryResult<DeleteCheck> {
        match kind {
            EntityKind::Sector => {
                if self.sector_repo.find_by_id(id)?.is_none() {
                    return Err(RepositoryError::not_found("Sector", id));
                }
                let groups = self.sector_repo.list_dependent_groups(id)?;
                if groups.is_empty() {
                    Ok(DeleteCheck::allowed(kind, id))
                } else {
                    Ok(DeleteCheck::blocked_sector(id, groups))
                }
            }
            EntityKind::ProductionGroup => {
                if self.group_repo.find_by_id(id)?.is_none() {
                    return Err(RepositoryError::not_found("ProductionGroup", id));
                }
                let deps = self.group_repo.dependents(id)?;
                if deps.is_empty() {
                    Ok(DeleteCheck::allowed(kind, id))
                } else {
                    Ok(DeleteCheck::blocked_group(id, deps.assignment_count, deps.products))
                }
            }
        }
    }

    /// 守卫删除（统计与删除在同一事务内）
    pub fn delete_guarded(&self, kind: EntityKind, id: &str) -> RepositoryResult<GuardedDelete> {
        let outcome = match kind {
            EntityKind::Sector => {
                let groups = self.sector_repo.delete_unless_referenced(id)?;
                if groups.is_empty() {
                    GuardedDelete::Deleted
                } else {
                    GuardedDelete::Blocked(DeleteCheck::blocked_sector(id, groups))
                }
            }
            EntityKind::ProductionGroup => {
                let deps = self.group_repo.delete_unless_referenced(id)?;
                if deps.is_empty() {
                    GuardedDelete::Deleted
                } else {
                    GuardedDelete::Blocked(DeleteCheck::blocked_group(
                        id,
                        deps.assignment_count,
                        deps.products,
                    ))
                }
            }
        };

        match &outcome {
            GuardedDelete::Deleted => tracing::info!(entity = %kind, id, "目录记录已删除"),
            GuardedDelete::Blocked(check) => tracing::warn!(
                entity = %kind,
                id,
                dependent_count = check.dependent_count,
                "存在依赖，拒绝删除"
            ),
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_in_memory;
    use crate::domain::catalog::ProductAssignment;
    use crate::repository::{AssignmentRepository, ProductRepository};
    use std::sync::Mutex;

    struct Fixture {
        guard: DependencyGuard,
        sectors: Arc<SectorRepository>,
        groups: Arc<ProductionGroupRepository>,
        products: ProductRepository,
        assignments: AssignmentRepository,
    }

    fn fixture() -> Fixture {
        let conn = Arc::new(Mutex::new(open_in_memory().unwrap()));
        let sectors = Arc::new(SectorRepository::new(conn.clone()));
        let groups = Arc::new(ProductionGroupRepository::new(conn.clone()));
        Fixture {
            guard: DependencyGuard::new(sectors.clone(), groups.clone()),
            sectors,
            groups,
            products: ProductRepository::new(conn.clone()),
            assignments: AssignmentRepository::new(conn),
        }
    }

    #[test]
    fn test_unknown_entity_is_not_found() {
        let f = fixture();
        assert!(f.guard.can_delete(EntityKind::Sector, "missing").unwrap_err().is_not_found());
        assert!(f
            .guard
            .can_delete(EntityKind::ProductionGroup, "missing")
            .unwrap_err()
            .is_not_found());
    }

    #[test]
    fn test_group_with_assignment_is_blocked_with_product_names() {
        let f = fixture();
        let (sector, _) = f.sectors.find_or_create_by_name("Dairy").unwrap();
        let (group, _) = f.groups.find_or_create("Cheese", &sector.sector_id).unwrap();
        let (product, _) = f.products.find_or_create_by_name("Brie").unwrap();
        f.assignments
            .create_if_absent(&ProductAssignment::new(
                &sector.sector_id,
                &group.production_group_id,
                &product.product_id,
            ))
            .unwrap();

        let check = f
            .guard
            .can_delete(EntityKind::ProductionGroup, &group.production_group_id)
            .unwrap();
        assert!(!check.allowed);
        assert_eq!(check.dependent_count, 1);
        assert_eq!(check.dependents[0].name, "Brie");
        assert!(check.action.is_some());

        let outcome = f
            .guard
            .delete_guarded(EntityKind::ProductionGroup, &group.production_group_id)
            .unwrap();
        assert!(matches!(outcome, GuardedDelete::Blocked(_)));
        assert!(f.groups.find_by_id(&group.production_group_id).unwrap().is_some());
    }

    #[test]
    fn test_empty_group_is_deleted() {
        let f = fixture();
        let (sector, _) = f.sectors.find_or_create_by_name("Dairy").unwrap();
        let (group, _) = f.groups.find_or_create("Cheese", &sector.sector_id).unwrap();

        let outcome = f
            .guard
            .delete_guarded(EntityKind::ProductionGroup, &group.production_group_id)
            .unwrap();
        assert_eq!(outcome, GuardedDelete::Deleted);
        assert!(f.guard.can_delete(EntityKind::Sector, &sector.sector_id).unwrap().allowed);
    }
}
