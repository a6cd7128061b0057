// ==========================================
// 样品申请目录系统 - 目录管理 API
// ==========================================
// 职责: 行业 / 生产分组 / 产品的增删改查，行业图片上传与移除
// 红线: 删除一律经过依赖守卫，禁止级联
// 权限: 写操作需要管理员；列表与按分组浏览产品为公开接口
// ==========================================

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use crate::api::auth::CallerContext;
use crate::api::error::{ApiError, ApiResult};
use crate::domain::catalog::{Product, ProductionGroup, ProductionGroupView, Sector};
use crate::domain::types::EntityKind;
use crate::engine::dependency_guard::{DeleteCheck, DependencyGuard, GuardedDelete};
use crate::integration::blob_store::{sector_image_key, validate_image_content_type, BlobError, BlobStore};
use crate::repository::{ProductRepository, ProductionGroupRepository, SectorRepository};

fn required_name(value: &str, field: &str) -> ApiResult<String> {
    let v = value.trim();
    if v.is_empty() {
        return Err(ApiError::InvalidInput(format!("{}不能为空", field)));
    }
    Ok(v.to_string())
}

fn map_blob_error(err: BlobError) -> ApiError {
    match err {
        BlobError::UnsupportedContentType(_) | BlobError::InvalidKey(_) => {
            ApiError::InvalidInput(err.to_string())
        }
        other => ApiError::InternalError(other.to_string()),
    }
}

// ==========================================
// CatalogApi - 目录管理 API
// ==========================================
pub struct CatalogApi {
    sector_repo: Arc<SectorRepository>,
    group_repo: Arc<ProductionGroupRepository>,
    product_repo: Arc<ProductRepository>,
    guard: Arc<DependencyGuard>,
    blob_store: Arc<dyn BlobStore>,
}

impl CatalogApi {
    pub fn new(
        sector_repo: Arc<SectorRepository>,
        group_repo: Arc<ProductionGroupRepository>,
        product_repo: Arc<ProductRepository>,
        guard: Arc<DependencyGuard>,
        blob_store: Arc<dyn BlobStore>,
    ) -> Self {
        Self {
            sector_repo,
            group_repo,
            product_repo,
            guard,
            blob_store,
        }
    }

    // ==========================================
    // 行业
    // ==========================================

    /// 全部行业（新建在前）
    pub fn list_sectors(&self) -> ApiResult<Vec<Sector>> {
        Ok(self.sector_repo.list_all()?)
    }

    /// 新建行业（重名 → Conflict）
    pub fn create_sector(&self, caller: &CallerContext, name: &str) -> ApiResult<Sector> {
        caller.require_admin("create_sector")?;
        let name = required_name(name, "行业名称")?;

        let sector = Sector::new(name);
        self.sector_repo.insert(&sector).map_err(|e| {
            if e.is_unique_violation() {
                ApiError::Conflict(format!("行业名称已存在: {}", sector.name))
            } else {
                e.into()
            }
        })?;

        info!(sector_id = %sector.sector_id, name = %sector.name, actor = ?caller.actor, "行业已创建");
        Ok(sector)
    }

    /// 更新行业名称（图片地址保持不变）
    pub fn update_sector(&self, caller: &CallerContext, sector_id: &str, name: &str) -> ApiResult<Sector> {
        caller.require_admin("update_sector")?;
        let name = required_name(name, "行业名称")?;

        let current = self
            .sector_repo
            .find_by_id(sector_id)?
            .ok_or_else(|| ApiError::NotFound(format!("Sector(id={})不存在", sector_id)))?;

        let updated = self
            .sector_repo
            .update(sector_id, &name, current.image_url.as_deref())
            .map_err(|e| {
                if e.is_unique_violation() {
                    ApiError::Conflict(format!("行业名称已存在: {}", name))
                } else {
                    e.into()
                }
            })?;
        info!(sector_id, name = %updated.name, "行业已更新");
        Ok(updated)
    }

    /// 删除预检
    pub fn can_delete(&self, caller: &CallerContext, kind: EntityKind, id: &str) -> ApiResult<DeleteCheck> {
        caller.require_admin("can_delete")?;
        Ok(self.guard.can_delete(kind, id)?)
    }

    /// 删除行业（经依赖守卫；删除成功后清理图片）
    pub async fn delete_sector(&self, caller: &CallerContext, sector_id: &str) -> ApiResult<()> {
        caller.require_admin("delete_sector")?;

        let image_url = self
            .sector_repo
            .find_by_id(sector_id)?
            .and_then(|s| s.image_url);

        match self.guard.delete_guarded(EntityKind::Sector, sector_id)? {
            GuardedDelete::Deleted => {
                if let Some(url) = image_url {
                    self.discard_image(&url).await;
                }
                Ok(())
            }
            GuardedDelete::Blocked(check) => Err(ApiError::delete_blocked(check)),
        }
    }

    // ==========================================
    // 生产分组
    // ==========================================

    /// 分组列表（可按行业过滤，按名称排序）
    pub fn list_production_groups(&self, sector_id: Option<&str>) -> ApiResult<Vec<ProductionGroupView>> {
        let sector_id = sector_id.map(str::trim).filter(|s| !s.is_empty() && *s != "all");
        Ok(self.group_repo.list_views(sector_id)?)
    }

    /// 新建分组（行业必须存在；同一行业下重名 → Conflict）
    pub fn create_production_group(
        &self,
        caller: &CallerContext,
        name: &str,
        sector_id: &str,
    ) -> ApiResult<ProductionGroup> {
        caller.require_admin("create_production_group")?;
        let name = required_name(name, "分组名称")?;
        let sector_id = required_name(sector_id, "所属行业")?;
        self.ensure_sector_exists(&sector_id)?;

        let group = ProductionGroup::new(name, sector_id);
        self.group_repo.insert(&group).map_err(|e| {
            if e.is_unique_violation() {
                ApiError::Conflict(format!("该行业下已存在分组: {}", group.name))
            } else {
                e.into()
            }
        })?;

        info!(
            production_group_id = %group.production_group_id,
            sector_id = %group.sector_id,
            name = %group.name,
            "生产分组已创建"
        );
        Ok(group)
    }

    /// 更新分组（改名 / 移动到其他行业；None 表示保留原值）
    pub fn update_production_group(
        &self,
        caller: &CallerContext,
        group_id: &str,
        name: Option<&str>,
        sector_id: Option<&str>,
    ) -> ApiResult<ProductionGroup> {
        caller.require_admin("update_production_group")?;
        let name = name.map(|n| required_name(n, "分组名称")).transpose()?;
        let sector_id = sector_id.map(|s| required_name(s, "所属行业")).transpose()?;
        if let Some(ref s) = sector_id {
            self.ensure_sector_exists(s)?;
        }

        let updated = self
            .group_repo
            .update(group_id, name.as_deref(), sector_id.as_deref())
            .map_err(|e| {
                if e.is_unique_violation() {
                    ApiError::Conflict("目标行业下已存在同名分组".to_string())
                } else {
                    e.into()
                }
            })?;
        info!(production_group_id = group_id, sector_id = %updated.sector_id, "生产分组已更新");
        Ok(updated)
    }

    /// 删除分组（经依赖守卫）
    pub fn delete_production_group(&self, caller: &CallerContext, group_id: &str) -> ApiResult<()> {
        caller.require_admin("delete_production_group")?;
        match self.guard.delete_guarded(EntityKind::ProductionGroup, group_id)? {
            GuardedDelete::Deleted => Ok(()),
            GuardedDelete::Blocked(check) => Err(ApiError::delete_blocked(check)),
        }
    }

    // ==========================================
    // 产品
    // ==========================================

    /// 分组下可申请的产品（客户浏览）
    pub fn list_products_by_group(&self, production_group_id: &str) -> ApiResult<Vec<Product>> {
        if self.group_repo.find_by_id(production_group_id)?.is_none() {
            return Err(ApiError::NotFound(format!(
                "ProductionGroup(id={})不存在",
                production_group_id
            )));
        }
        Ok(self.product_repo.list_by_group(production_group_id)?)
    }

    /// 产品改名（已提交申请中的快照名称不受影响）
    pub fn rename_product(&self, caller: &CallerContext, product_id: &str, name: &str) -> ApiResult<Product> {
        caller.require_admin("rename_product")?;
        let name = required_name(name, "产品名称")?;
        let product = self.product_repo.rename(product_id, &name).map_err(|e| {
            if e.is_unique_violation() {
                ApiError::Conflict(format!("产品名称已存在: {}", name))
            } else {
                e.into()
            }
        })?;
        info!(product_id, name = %product.name, "产品已改名");
        Ok(product)
    }

    // ==========================================
    // 行业图片
    // ==========================================

    /// 上传行业图片（替换旧图）
    pub async fn upload_sector_image(
        &self,
        caller: &CallerContext,
        sector_id: &str,
        file_name: &str,
        content_type: &str,
        bytes: &[u8],
    ) -> ApiResult<Sector> {
        caller.require_admin("upload_sector_image")?;
        validate_image_content_type(content_type).map_err(map_blob_error)?;
        if bytes.is_empty() {
            return Err(ApiError::InvalidInput("图片内容为空".to_string()));
        }

        let sector = self
            .sector_repo
            .find_by_id(sector_id)?
            .ok_or_else(|| ApiError::NotFound(format!("Sector(id={})不存在", sector_id)))?;

        let key = sector_image_key(sector_id, file_name, Utc::now());
        let url = self
            .blob_store
            .put(&key, bytes, content_type)
            .await
            .map_err(map_blob_error)?;
        self.sector_repo.set_image_url(sector_id, Some(&url))?;

        if let Some(old) = sector.image_url.as_deref() {
            if old != url {
                self.discard_image(old).await;
            }
        }

        info!(sector_id, key = %key, "行业图片已更新");
        Ok(Sector {
            image_url: Some(url),
            ..sector
        })
    }

    /// 移除行业图片
    pub async fn remove_sector_image(&self, caller: &CallerContext, sector_id: &str) -> ApiResult<Sector> {
        caller.require_admin("remove_sector_image")?;
        let sector = self
            .sector_repo
            .find_by_id(sector_id)?
            .ok_or_else(|| ApiError::NotFound(format!("Sector(id={})不存在", sector_id)))?;

        let Some(url) = sector.image_url.clone() else {
            return Ok(sector);
        };
        self.sector_repo.set_image_url(sector_id, None)?;
        self.discard_image(&url).await;

        Ok(Sector {
            image_url: None,
            ..sector
        })
    }

    // ==========================================
    // 内部辅助
    // ==========================================

    fn ensure_sector_exists(&self, sector_id: &str) -> ApiResult<()> {
        if self.sector_repo.find_by_id(sector_id)?.is_none() {
            return Err(ApiError::NotFound(format!("Sector(id={})不存在", sector_id)));
        }
        Ok(())
    }

    /// 删除存储中的图片；失败只告警
    async fn discard_image(&self, public_url: &str) {
        let result = match self.blob_store.key_from_public_url(public_url) {
            Ok(key) => self.blob_store.delete(&key).await,
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            warn!(public_url, error = %e, "行业图片清理失败");
        }
    }
}
