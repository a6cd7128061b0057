// ==========================================
// 样品申请目录系统 - 样品申请 API
// ==========================================
// 职责: 客户提交申请、管理员状态变更、客户列表（过滤 / 分页 / 检索）、删除申请
// 权限: submit 为公开接口，其余需要管理员
// 红线: 状态变更只追加历史；列表展示名称以提交时快照为准
// ==========================================

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::api::auth::CallerContext;
use crate::api::error::{ApiError, ApiResult};
use crate::config::catalog_config_trait::CatalogConfigReader;
use crate::config::{config_keys, ConfigManager};
use crate::domain::request::{SampleRequest, StatusHistoryEntry};
use crate::domain::types::RequestStatus;
use crate::engine::request_validator::{RequestValidator, SubmissionOutcome, SubmitRequestInput};
use crate::repository::{RequestFilter, RequestRepository, SectorRepository};

// ==========================================
// 客户列表查询与结果
// ==========================================

/// 客户列表查询条件（条件之间为 AND）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CustomerListQuery {
    pub page: Option<usize>,
    pub search: Option<String>,
    /// "all" 表示不过滤行业
    pub sector_id: Option<String>,
    pub production_group_id: Option<String>,
    pub province: Option<String>,
    pub district: Option<String>,
}

impl CustomerListQuery {
    fn to_filter(&self) -> RequestFilter {
        let clean = |v: &Option<String>| {
            v.as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };
        RequestFilter {
            sector_id: clean(&self.sector_id).filter(|s| !s.eq_ignore_ascii_case("all")),
            production_group_id: clean(&self.production_group_id),
            province: clean(&self.province),
            district: clean(&self.district),
        }
    }

    fn search_term(&self) -> Option<&str> {
        self.search.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub total: usize,
    pub page: usize,
    pub limit: usize,
    pub total_pages: usize,
}

/// 页码 → 偏移量（溢出或超出 SQLite 整数范围时拒绝）
fn page_offset(page: usize, limit: usize) -> ApiResult<usize> {
    (page - 1)
        .checked_mul(limit)
        .filter(|offset| i64::try_from(*offset).is_ok())
        .ok_or_else(|| ApiError::InvalidInput(format!("页码超出范围: {}", page)))
}

impl Pagination {
    fn paged(total: usize, page: usize, limit: usize) -> Self {
        Self {
            total,
            page,
            limit,
            total_pages: total.div_ceil(limit.max(1)),
        }
    }

    /// 检索模式：全部结果一页返回
    fn single_page(total: usize) -> Self {
        Self {
            total,
            page: 1,
            limit: total,
            total_pages: 1,
        }
    }
}

/// 客户列表行
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerRow {
    pub id: String,
    pub short_id: String,
    pub created_at: DateTime<Utc>,
    pub company_name: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: String,
    pub phone: String,
    pub address: Option<String>,
    pub province: Option<String>,
    pub district: Option<String>,
    pub sector_name: String,
    pub production_groups: String,
    pub products: String,
    pub status: RequestStatus,
}

impl CustomerRow {
    fn from_request(request: &SampleRequest, sector_name: String) -> Self {
        let c = &request.contact;
        Self {
            id: request.request_id.clone(),
            short_id: request.short_id(),
            created_at: request.created_at,
            company_name: c.company_name.clone(),
            first_name: c.first_name.clone(),
            last_name: c.last_name.clone(),
            email: c.email.clone(),
            phone: c.phone.clone(),
            address: c.address.clone(),
            province: c.province.clone(),
            district: c.district.clone(),
            sector_name,
            production_groups: request.group_names().join(", "),
            products: request.product_names().join(", "),
            status: request.status,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerListResponse {
    pub rows: Vec<CustomerRow>,
    pub pagination: Pagination,
}

/// 检索匹配：转义后的大小写不敏感子串匹配
fn build_search_matcher(term: &str) -> ApiResult<Regex> {
    RegexBuilder::new(&regex::escape(term))
        .case_insensitive(true)
        .build()
        .map_err(|e| ApiError::InvalidInput(format!("检索条件无效: {}", e)))
}

fn matches_search(matcher: &Regex, request: &SampleRequest, sector_name: &str) -> bool {
    let c = &request.contact;
    let fields = [
        Some(c.company_name.as_str()),
        c.first_name.as_deref(),
        c.last_name.as_deref(),
        Some(c.email.as_str()),
        Some(c.phone.as_str()),
        c.province.as_deref(),
        c.district.as_deref(),
        c.address.as_deref(),
        Some(sector_name),
    ];
    fields.into_iter().flatten().any(|f| matcher.is_match(f))
        || request.products.iter().any(|p| {
            matcher.is_match(&p.product_name) || matcher.is_match(&p.production_group_name)
        })
}

// ==========================================
// RequestApi - 样品申请 API
// ==========================================
pub struct RequestApi {
    validator: Arc<RequestValidator<ConfigManager>>,
    request_repo: Arc<RequestRepository>,
    sector_repo: Arc<SectorRepository>,
    config: Arc<ConfigManager>,
}

impl RequestApi {
    pub fn new(
        validator: Arc<RequestValidator<ConfigManager>>,
        request_repo: Arc<RequestRepository>,
        sector_repo: Arc<SectorRepository>,
        config: Arc<ConfigManager>,
    ) -> Self {
        Self {
            validator,
            request_repo,
            sector_repo,
            config,
        }
    }

    // ==========================================
    // 客户接口
    // ==========================================

    /// 提交样品申请（公开接口）
    ///
    /// # 返回
    /// - Ok(outcome): 已落库的申请 + 外部投递句柄（调用方可丢弃）
    /// - Err(ValidationError / UnmatchedAssignment): 整单拒绝，不落库
    pub async fn submit(&self, input: &SubmitRequestInput) -> ApiResult<SubmissionOutcome> {
        Ok(self.validator.submit(input).await?)
    }

    // ==========================================
    // 管理员接口
    // ==========================================

    pub fn get_request(&self, caller: &CallerContext, request_id: &str) -> ApiResult<SampleRequest> {
        caller.require_admin("get_request")?;
        self.request_repo
            .find_by_id(request_id)?
            .ok_or_else(|| ApiError::NotFound(format!("SampleRequest(id={})不存在", request_id)))
    }

    /// 变更申请状态（任意已知状态之间均可切换，每次追加一条历史）
    pub fn set_status(
        &self,
        caller: &CallerContext,
        request_id: &str,
        status: &str,
        note: Option<&str>,
    ) -> ApiResult<SampleRequest> {
        caller.require_admin("set_request_status")?;
        let new_status = RequestStatus::parse(status)
            .ok_or_else(|| ApiError::ValidationError(format!("未知的申请状态: {}", status)))?;

        let entry = StatusHistoryEntry {
            status: new_status,
            note: note.map(str::trim).unwrap_or_default().to_string(),
            updated_by: caller.actor.clone(),
            timestamp: Utc::now(),
        };
        let updated = self.request_repo.append_status(request_id, &entry)?;

        info!(
            request_id,
            status = %new_status,
            history_len = updated.status_history.len(),
            actor = ?caller.actor,
            "申请状态已更新"
        );
        Ok(updated)
    }

    /// 删除申请（行项目与历史一并删除）
    pub fn delete_request(&self, caller: &CallerContext, request_id: &str) -> ApiResult<()> {
        caller.require_admin("delete_request")?;
        self.request_repo.delete(request_id)?;
        info!(request_id, actor = ?caller.actor, "申请已删除");
        Ok(())
    }

    /// 客户列表
    ///
    /// # 行为
    /// - 无检索词: 分页（新建在前），每页条数来自配置
    /// - 有检索词: 不分页，全量过滤后一次返回
    pub async fn list_customers(
        &self,
        caller: &CallerContext,
        query: &CustomerListQuery,
    ) -> ApiResult<CustomerListResponse> {
        caller.require_admin("list_customers")?;

        let filter = query.to_filter();
        let other_label = self
            .config
            .get_other_sector_label()
            .await
            .map_err(|e| ApiError::InternalError(format!("{}: {}", config_keys::OTHER_SECTOR_LABEL, e)))?;
        let sector_names: HashMap<String, String> = self
            .sector_repo
            .list_all()?
            .into_iter()
            .map(|s| (s.sector_id, s.name))
            .collect();
        let sector_name_of = |request: &SampleRequest| {
            request
                .sector_id
                .as_ref()
                .and_then(|id| sector_names.get(id))
                .cloned()
                .unwrap_or_else(|| other_label.clone())
        };

        if let Some(term) = query.search_term() {
            let matcher = build_search_matcher(term)?;
            let rows: Vec<CustomerRow> = self
                .request_repo
                .list_all(&filter)?
                .iter()
                .filter_map(|r| {
                    let sector_name = sector_name_of(r);
                    matches_search(&matcher, r, &sector_name)
                        .then(|| CustomerRow::from_request(r, sector_name))
                })
                .collect();
            debug!(term, matched = rows.len(), "客户列表检索");
            let pagination = Pagination::single_page(rows.len());
            return Ok(CustomerListResponse { rows, pagination });
        }

        let limit = self
            .config
            .get_customer_page_size()
            .await
            .map_err(|e| ApiError::InternalError(format!("{}: {}", config_keys::CUSTOMER_PAGE_SIZE, e)))?
            .max(1);
        let page = query.page.unwrap_or(1).max(1);
        let (requests, total) = self
            .request_repo
            .list_page(&filter, limit, page_offset(page, limit)?)?;

        let rows = requests
            .iter()
            .map(|r| CustomerRow::from_request(r, sector_name_of(r)))
            .collect();
        Ok(CustomerListResponse {
            rows,
            pagination: Pagination::paged(total, page, limit),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::request::{ContactInfo, RequestProductSnapshot};

    fn request() -> SampleRequest {
        let now = Utc::now();
        SampleRequest {
            request_id: "0f8c1d2e-aaaa-bbbb-cccc-1234567890ab".to_string(),
            contact: ContactInfo {
                company_name: "Northwind Traders".to_string(),
                email: "orders@northwind.test".to_string(),
                phone: "555-0100".to_string(),
                province: Some("Ontario".to_string()),
                ..Default::default()
            },
            sector_id: None,
            production_group_ids: vec!["G1".to_string()],
            products: vec![RequestProductSnapshot {
                product_id: Some("P1".to_string()),
                product_name: "Widget (XL)".to_string(),
                production_group_id: Some("G1".to_string()),
                production_group_name: "Hardware".to_string(),
            }],
            status: RequestStatus::Pending,
            status_history: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_search_is_case_insensitive_substring() {
        let r = request();
        assert!(matches_search(&build_search_matcher("northWIND").unwrap(), &r, "Others"));
        assert!(matches_search(&build_search_matcher("ontario").unwrap(), &r, "Others"));
        assert!(matches_search(&build_search_matcher("hardware").unwrap(), &r, "Others"));
        assert!(matches_search(&build_search_matcher("others").unwrap(), &r, "Others"));
        assert!(!matches_search(&build_search_matcher("contoso").unwrap(), &r, "Others"));
    }

    #[test]
    fn test_search_term_is_literal() {
        let r = request();
        assert!(matches_search(&build_search_matcher("(xl)").unwrap(), &r, "Others"));
        assert!(!matches_search(&build_search_matcher("w.dget").unwrap(), &r, "Others"));
    }

    #[test]
    fn test_pagination_math() {
        assert_eq!(Pagination::paged(21, 2, 10).total_pages, 3);
        assert_eq!(Pagination::paged(0, 1, 10).total_pages, 0);
        let single = Pagination::single_page(4);
        assert_eq!((single.total, single.page, single.limit, single.total_pages), (4, 1, 4, 1));
    }

    #[test]
    fn test_sector_all_means_no_filter() {
        let query = CustomerListQuery {
            sector_id: Some("all".to_string()),
            province: Some("  ".to_string()),
            district: Some(" Central ".to_string()),
            ..Default::default()
        };
        let filter = query.to_filter();
        assert_eq!(filter.sector_id, None);
        assert_eq!(filter.province, None);
        assert_eq!(filter.district.as_deref(), Some("Central"));
    }

    #[test]
    fn test_customer_row_joins_snapshot_names() {
        let row = CustomerRow::from_request(&request(), "Others".to_string());
        assert_eq!(row.short_id, "7890ab");
        assert_eq!(row.products, "Widget (XL)");
        assert_eq!(row.production_groups, "Hardware");
    }

    #[test]
    fn test_page_offset_rejects_overflow() {
        assert_eq!(page_offset(1, 10).unwrap(), 0);
        assert_eq!(page_offset(3, 10).unwrap(), 20);
        assert_eq!(page_offset(usize::MAX, 10).unwrap_err().code(), "INVALID_INPUT");
        assert!(page_offset(usize::MAX, 1).is_err());
    }
}
