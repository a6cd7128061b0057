// ==========================================
// 样品申请目录系统 - 申请校验与快照
// ==========================================
// 规则:
// - 公司名 / 邮箱 / 电话（TRIM 后）必填，产品列表非空，行项目 id 非空
// - 每个 (产品, 分组) 必须存在对应关联；指定行业时行业也必须一致
// - 任一行不匹配 → 整单拒绝，不落库
// 红线: 产品 / 分组名称在提交时冻结，之后目录改名或删除不影响申请
// 红线: 关联与名称均批量查询，禁止逐行查询
// ==========================================

use crate::config::catalog_config_trait::CatalogConfigReader;
use crate::domain::catalog::{Product, ProductAssignment, ProductionGroup};
use crate::domain::request::{ContactInfo, RequestLineInput, RequestProductSnapshot, SampleRequest};
use crate::domain::types::RequestStatus;
use crate::engine::events::{DispatchHandle, RequestSubmittedEvent, SideEffectDispatcher};
use crate::repository::error::RepositoryError;
use crate::repository::sql_utils::dedup_preserving_order;
use crate::repository::{
    created_history_entry, AssignmentRepository, ProductRepository, ProductionGroupRepository,
    RequestRepository, SectorRepository,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

// ==========================================
// 输入 / 输出
// ==========================================

/// 客户提交的申请（未校验）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubmitRequestInput {
    pub contact: ContactInfo,
    pub sector_id: Option<String>,
    pub products: Vec<RequestLineInput>,
}

/// 校验通过后的申请内容（快照已解析）
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedRequest {
    pub contact: ContactInfo,
    pub sector_id: Option<String>,
    pub production_group_ids: Vec<String>,
    pub products: Vec<RequestProductSnapshot>,
}

/// 提交结果：已落库的申请 + 外部投递句柄（可丢弃）
#[derive(Debug)]
pub struct SubmissionOutcome {
    pub request: SampleRequest,
    pub dispatch: DispatchHandle,
}

#[derive(Error, Debug)]
pub enum RequestValidationError {
    #[error("必填字段缺失: {0}")]
    MissingField(&'static str),

    #[error("至少需要选择一个产品")]
    EmptyProductList,

    #[error("第 {line} 个产品的 {field} 为空")]
    EmptyLineId { line: usize, field: &'static str },

    #[error("产品 {product_id} 不属于生产分组 {production_group_id}（或行业不匹配）")]
    UnmatchedAssignment {
        product_id: String,
        production_group_id: String,
    },

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

fn trimmed_required(value: &str, field: &'static str) -> Result<String, RequestValidationError> {
    let v = value.trim();
    if v.is_empty() {
        return Err(RequestValidationError::MissingField(field));
    }
    Ok(v.to_string())
}

fn trimmed_optional(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// 联系信息清洗（必填项校验 + 可选项空白归一为 None）
fn normalize_contact(contact: &ContactInfo) -> Result<ContactInfo, RequestValidationError> {
    Ok(ContactInfo {
        company_name: trimmed_required(&contact.company_name, "company_name")?,
        email: trimmed_required(&contact.email, "email")?,
        phone: trimmed_required(&contact.phone, "phone")?,
        first_name: trimmed_optional(&contact.first_name),
        last_name: trimmed_optional(&contact.last_name),
        address: trimmed_optional(&contact.address),
        province: trimmed_optional(&contact.province),
        district: trimmed_optional(&contact.district),
    })
}

fn normalize_lines(lines: &[RequestLineInput]) -> Result<Vec<RequestLineInput>, RequestValidationError> {
    if lines.is_empty() {
        return Err(RequestValidationError::EmptyProductList);
    }
    lines
        .iter()
        .enumerate()
        .map(|(idx, line)| {
            let product_id = line.product_id.trim();
            let group_id = line.production_group_id.trim();
            if product_id.is_empty() {
                return Err(RequestValidationError::EmptyLineId {
                    line: idx + 1,
                    field: "product_id",
                });
            }
            if group_id.is_empty() {
                return Err(RequestValidationError::EmptyLineId {
                    line: idx + 1,
                    field: "production_group_id",
                });
            }
            Ok(RequestLineInput::new(product_id, group_id))
        })
        .collect()
}

fn line_matches(a: &ProductAssignment, line: &RequestLineInput, sector_id: Option<&str>) -> bool {
    a.product_id == line.product_id
        && a.production_group_id == line.production_group_id
        && sector_id.map_or(true, |s| a.sector_id == s)
}

// ==========================================
// RequestValidator - 申请校验与快照
// ==========================================
pub struct RequestValidator<C>
where
    C: CatalogConfigReader,
{
    sector_repo: Arc<SectorRepository>,
    group_repo: Arc<ProductionGroupRepository>,
    product_repo: Arc<ProductRepository>,
    assignment_repo: Arc<AssignmentRepository>,
    request_repo: Arc<RequestRepository>,
    config: Arc<C>,
    dispatcher: SideEffectDispatcher,
}

impl<C> RequestValidator<C>
where
    C: CatalogConfigReader,
{
    pub fn new(
        sector_repo: Arc<SectorRepository>,
        group_repo: Arc<ProductionGroupRepository>,
        product_repo: Arc<ProductRepository>,
        assignment_repo: Arc<AssignmentRepository>,
        request_repo: Arc<RequestRepository>,
        config: Arc<C>,
        dispatcher: SideEffectDispatcher,
    ) -> Self {
        Self {
            sector_repo,
            group_repo,
            product_repo,
            assignment_repo,
            request_repo,
            config,
            dispatcher,
        }
    }

    /// 校验并生成快照（只读）
    pub fn validate_and_snapshot(
        &self,
        input: &SubmitRequestInput,
    ) -> Result<ValidatedRequest, RequestValidationError> {
        let contact = normalize_contact(&input.contact)?;
        let lines = normalize_lines(&input.products)?;
        let sector_id = trimmed_optional(&input.sector_id);

        // 关联校验（一次批量查询）
        let product_ids =
            dedup_preserving_order(&lines.iter().map(|l| l.product_id.clone()).collect::<Vec<_>>());
        let assignments = self.assignment_repo.find_for_products(&product_ids)?;
        for line in &lines {
            if !assignments
                .iter()
                .any(|a| line_matches(a, line, sector_id.as_deref()))
            {
                tracing::warn!(
                    product_id = %line.product_id,
                    production_group_id = %line.production_group_id,
                    sector_id = ?sector_id,
                    "申请行项目未匹配到产品关联"
                );
                return Err(RequestValidationError::UnmatchedAssignment {
                    product_id: line.product_id.clone(),
                    production_group_id: line.production_group_id.clone(),
                });
            }
        }

        let production_group_ids = dedup_preserving_order(
            &lines
                .iter()
                .map(|l| l.production_group_id.clone())
                .collect::<Vec<_>>(),
        );

        // 名称快照（产品 / 分组各一次批量查询）
        let products: HashMap<String, Product> = self
            .product_repo
            .find_by_ids(&product_ids)?
            .into_iter()
            .map(|p| (p.product_id.clone(), p))
            .collect();
        let groups: HashMap<String, ProductionGroup> = self
            .group_repo
            .find_by_ids(&production_group_ids)?
            .into_iter()
            .map(|g| (g.production_group_id.clone(), g))
            .collect();

        let snapshots = lines
            .iter()
            .map(|line| {
                let product = products
                    .get(&line.product_id)
                    .ok_or_else(|| RepositoryError::not_found("Product", &line.product_id))?;
                let group = groups.get(&line.production_group_id).ok_or_else(|| {
                    RepositoryError::not_found("ProductionGroup", &line.production_group_id)
                })?;
                Ok(RequestProductSnapshot {
                    product_id: Some(product.product_id.clone()),
                    product_name: product.name.clone(),
                    production_group_id: Some(group.production_group_id.clone()),
                    production_group_name: group.name.clone(),
                })
            })
            .collect::<Result<Vec<_>, RepositoryError>>()?;

        Ok(ValidatedRequest {
            contact,
            sector_id,
            production_group_ids,
            products: snapshots,
        })
    }

    /// 提交申请：校验 → 快照 → 落库（含初始历史）→ 分离投递外部副作用
    ///
    /// 必须在 tokio 运行时内调用
    pub async fn submit(&self, input: &SubmitRequestInput) -> Result<SubmissionOutcome, RequestValidationError> {
        let validated = self.validate_and_snapshot(input)?;

        let now = Utc::now();
        let request = SampleRequest {
            request_id: Uuid::new_v4().to_string(),
            contact: validated.contact,
            sector_id: validated.sector_id,
            production_group_ids: validated.production_group_ids,
            products: validated.products,
            status: RequestStatus::Pending,
            status_history: vec![created_history_entry(now)],
            created_at: now,
            updated_at: now,
        };
        self.request_repo.insert(&request)?;

        tracing::info!(
            request_id = %request.request_id,
            company = %request.contact.company_name,
            lines = request.products.len(),
            "样品申请已创建"
        );

        let sector_name = self.sector_display_name(request.sector_id.as_deref()).await;
        let dispatch = self
            .dispatcher
            .dispatch(RequestSubmittedEvent::from_request(&request, sector_name));

        Ok(SubmissionOutcome { request, dispatch })
    }

    /// 投递用行业名称；查询失败只告警
    async fn sector_display_name(&self, sector_id: Option<&str>) -> String {
        if let Some(id) = sector_id {
            match self.sector_repo.find_by_id(id) {
                Ok(Some(sector)) => return sector.name,
                Ok(None) => tracing::warn!(sector_id = id, "申请引用的行业不存在，使用默认名称"),
                Err(e) => tracing::warn!(sector_id = id, error = %e, "行业名称查询失败，使用默认名称"),
            }
        }
        match self.config.get_other_sector_label().await {
            Ok(label) => label,
            Err(e) => {
                tracing::warn!(error = %e, "读取行业默认名称失败");
                crate::config::defaults::OTHER_SECTOR_LABEL.to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_contact_requires_trimmed_fields() {
        let contact = ContactInfo {
            company_name: "  ".to_string(),
            email: "a@example.com".to_string(),
            phone: "1".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            normalize_contact(&contact),
            Err(RequestValidationError::MissingField("company_name"))
        ));
    }

    #[test]
    fn test_normalize_contact_drops_blank_optionals() {
        let contact = ContactInfo {
            company_name: " Acme ".to_string(),
            email: "a@example.com".to_string(),
            phone: "1".to_string(),
            address: Some("   ".to_string()),
            ..Default::default()
        };
        let normalized = normalize_contact(&contact).unwrap();
        assert_eq!(normalized.company_name, "Acme");
        assert!(normalized.address.is_none());
    }

    #[test]
    fn test_normalize_lines_rejects_empty_ids() {
        assert!(matches!(
            normalize_lines(&[]),
            Err(RequestValidationError::EmptyProductList)
        ));
        assert!(matches!(
            normalize_lines(&[RequestLineInput::new("P1", " ")]),
            Err(RequestValidationError::EmptyLineId { line: 1, field: "production_group_id" })
        ));
    }
}
