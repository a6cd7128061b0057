// ==========================================
// 样品申请目录系统 - 目录导入 API
// ==========================================
// 职责: 封装目录导入（文件 / 原始行 / 试运行）与导入日志查询
// 权限: 全部接口需要管理员
// ==========================================

use std::path::Path;
use std::sync::Arc;

use tracing::info;

use crate::api::auth::CallerContext;
use crate::api::error::{ApiError, ApiResult};
use crate::domain::import::{ImportLog, ImportOutcome, RawRow};
use crate::importer::CatalogImporter;

/// 导入日志默认条数
pub const DEFAULT_LOG_LIMIT: usize = 20;

pub struct ImportApi {
    importer: Arc<dyn CatalogImporter>,
}

impl ImportApi {
    pub fn new(importer: Arc<dyn CatalogImporter>) -> Self {
        Self { importer }
    }

    /// 从文件导入目录
    ///
    /// # 参数
    /// - file_path: .csv / .xlsx / .xls 文件
    /// - source_name: 日志中的来源名称（None 使用配置默认值）
    /// - dry_run: 试运行，只报告不写库
    pub async fn import_file(
        &self,
        caller: &CallerContext,
        file_path: &str,
        source_name: Option<String>,
        dry_run: bool,
    ) -> ApiResult<ImportOutcome> {
        caller.require_admin("import_catalog")?;
        if file_path.trim().is_empty() {
            return Err(ApiError::InvalidInput("文件路径不能为空".to_string()));
        }

        let outcome = self
            .importer
            .import_from_file(Path::new(file_path.trim()), source_name, dry_run)
            .await?;
        log_outcome(&outcome, caller);
        Ok(outcome)
    }

    /// 导入已读取的原始行（外部数据源适配后调用）
    pub async fn import_rows(
        &self,
        caller: &CallerContext,
        rows: Vec<RawRow>,
        dry_run: bool,
    ) -> ApiResult<ImportOutcome> {
        caller.require_admin("import_catalog")?;
        let outcome = self.importer.import_rows(rows, dry_run).await?;
        log_outcome(&outcome, caller);
        Ok(outcome)
    }

    /// 最近的导入日志
    pub async fn recent_import_logs(&self, caller: &CallerContext, limit: Option<usize>) -> ApiResult<Vec<ImportLog>> {
        caller.require_admin("list_import_logs")?;
        let limit = limit.filter(|l| *l > 0).unwrap_or(DEFAULT_LOG_LIMIT);
        Ok(self.importer.recent_import_logs(limit).await?)
    }
}

fn log_outcome(outcome: &ImportOutcome, caller: &CallerContext) {
    match outcome {
        ImportOutcome::DryRun(report) => info!(
            actor = ?caller.actor,
            source = %report.source,
            rows = report.row_count,
            skipped = report.skipped.len(),
            "目录导入试运行完成"
        ),
        ImportOutcome::Applied(report) => info!(
            actor = ?caller.actor,
            source = %report.log.source,
            inserted = report.inserted().total(),
            skipped = report.skipped.len(),
            "目录导入完成"
        ),
    }
}
