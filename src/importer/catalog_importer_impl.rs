// ==========================================
// 样品申请目录系统 - 目录导入器实现
// ==========================================
// 红线: 写入顺序固定为 行业 → 分组 → 产品 → 关联
// 红线: 重复关联是幂等跳过；其他写入失败中止本次导入（不写日志）
// 说明: 整体非原子；重跑收敛（查找或创建幂等）
// ==========================================

use crate::config::catalog_config_trait::CatalogConfigReader;
use crate::config::config_keys;
use crate::domain::catalog::ProductAssignment;
use crate::domain::import::{
    DryRunReport, ImportLog, ImportOutcome, ImportReport, InsertedCounts, RawRow,
};
use crate::importer::catalog_deduper::CatalogPlan;
use crate::importer::catalog_importer_trait::CatalogImporter;
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::file_parser::{FileSource, InMemorySource, TabularSource, UniversalFileParser};
use crate::repository::{
    AssignmentRepository, ImportLogRepository, ProductRepository, ProductionGroupRepository,
    SectorRepository,
};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

// ==========================================
// CatalogImporterImpl - 目录导入器实现
// ==========================================
pub struct CatalogImporterImpl<C>
where
    C: CatalogConfigReader,
{
    // 数据访问层
    sector_repo: Arc<SectorRepository>,
    group_repo: Arc<ProductionGroupRepository>,
    product_repo: Arc<ProductRepository>,
    assignment_repo: Arc<AssignmentRepository>,
    import_log_repo: Arc<ImportLogRepository>,

    // 配置读取器
    config: Arc<C>,
}

impl<C> CatalogImporterImpl<C>
where
    C: CatalogConfigReader,
{
    pub fn new(
        sector_repo: Arc<SectorRepository>,
        group_repo: Arc<ProductionGroupRepository>,
        product_repo: Arc<ProductRepository>,
        assignment_repo: Arc<AssignmentRepository>,
        import_log_repo: Arc<ImportLogRepository>,
        config: Arc<C>,
    ) -> Self {
        Self {
            sector_repo,
            group_repo,
            product_repo,
            assignment_repo,
            import_log_repo,
            config,
        }
    }

    async fn resolve_source_name(&self, source: &dyn TabularSource) -> ImportResult<String> {
        match source.source_name() {
            Some(name) if !name.trim().is_empty() => Ok(name),
            _ => self
                .config
                .get_import_source_name()
                .await
                .map_err(|e| ImportError::config(config_keys::IMPORT_SOURCE_NAME, e)),
        }
    }

    async fn dry_run(&self, source_name: String, plan: &CatalogPlan) -> ImportResult<DryRunReport> {
        let sample_size = self
            .config
            .get_dry_run_sample_size()
            .await
            .map_err(|e| ImportError::config(config_keys::DRY_RUN_SAMPLE_SIZE, e))?;

        Ok(DryRunReport {
            source: source_name,
            row_count: plan.row_count,
            accepted_rows: plan.rows.len(),
            skipped: plan.skipped.clone(),
            unique: plan.unique_counts(),
            samples: plan.samples(sample_size),
        })
    }

    /// 正式写入（按固定顺序），返回新建计数与重复关联数
    async fn apply(&self, plan: &CatalogPlan) -> ImportResult<(InsertedCounts, usize)> {
        let chunk_size = self
            .config
            .get_import_chunk_size()
            .await
            .map_err(|e| ImportError::config(config_keys::IMPORT_CHUNK_SIZE, e))?;

        let mut inserted = InsertedCounts::default();

        // 步骤 1: 行业
        let mut sector_ids: HashMap<&str, String> = HashMap::with_capacity(plan.sectors.len());
        for name in &plan.sectors {
            let (sector, created) = self.sector_repo.find_or_create_by_name(name)?;
            if created {
                inserted.sectors += 1;
            }
            sector_ids.insert(name.as_str(), sector.sector_id);
        }
        debug!(sectors = sector_ids.len(), created = inserted.sectors, "行业处理完成");

        // 步骤 2: 分组（行业必须先于分组落库）
        let mut group_ids: HashMap<(&str, &str), String> = HashMap::with_capacity(plan.groups.len());
        for planned in &plan.groups {
            let sector_id = sector_ids.get(planned.sector.as_str()).ok_or_else(|| {
                ImportError::InternalError(format!("分组 {} 的行业未解析", planned))
            })?;
            let (group, created) = self.group_repo.find_or_create(&planned.group, sector_id)?;
            if created {
                inserted.groups += 1;
            }
            group_ids.insert(planned.key(), group.production_group_id);
        }
        debug!(groups = group_ids.len(), created = inserted.groups, "分组处理完成");

        // 步骤 3: 产品
        let mut product_ids: HashMap<&str, String> = HashMap::with_capacity(plan.products.len());
        for name in &plan.products {
            let (product, created) = self.product_repo.find_or_create_by_name(name)?;
            if created {
                inserted.products += 1;
            }
            product_ids.insert(name.as_str(), product.product_id);
        }
        debug!(products = product_ids.len(), created = inserted.products, "产品处理完成");

        // 步骤 4: 关联（每个有效行一条，分块事务写入）
        let mut assignments = Vec::with_capacity(plan.rows.len());
        for row in &plan.rows {
            let sector_id = sector_ids.get(row.sector.as_str());
            let group_id = group_ids.get(&row.group_key());
            let product_id = product_ids.get(row.product.as_str());
            match (sector_id, group_id, product_id) {
                (Some(s), Some(g), Some(p)) => assignments.push(ProductAssignment::new(s, g, p)),
                _ => {
                    return Err(ImportError::InternalError(format!(
                        "第 {} 行的目录记录未解析",
                        row.row_number
                    )))
                }
            }
        }

        let mut duplicates = 0usize;
        for (chunk_idx, chunk) in assignments.chunks(chunk_size.max(1)).enumerate() {
            let result = self.assignment_repo.insert_chunk(chunk).map_err(|e| {
                error!(chunk = chunk_idx, error = %e, "关联写入失败，中止导入");
                ImportError::from(e)
            })?;
            inserted.assignments += result.inserted;
            duplicates += result.duplicates;
        }
        debug!(created = inserted.assignments, duplicates, "关联处理完成");

        Ok((inserted, duplicates))
    }
}

#[async_trait]
impl<C> CatalogImporter for CatalogImporterImpl<C>
where
    C: CatalogConfigReader + Send + Sync,
{
    #[instrument(skip(self, source), fields(source = %source.describe()))]
    async fn import_source(&self, source: &dyn TabularSource, dry_run: bool) -> ImportResult<ImportOutcome> {
        let started_at = Utc::now();
        let timer = Instant::now();
        let source_name = self.resolve_source_name(source).await?;
        info!(source_name = %source_name, "开始导入目录");

        // 步骤 1: 读取数据源（失败时无任何写入）
        let raw_rows = source.fetch_rows().map_err(|e| {
            error!(error = %e, "数据源读取失败");
            e
        })?;

        // 步骤 2-3: 清洗 + 去重
        let plan = CatalogPlan::build(&raw_rows);
        if !plan.skipped.is_empty() {
            warn!(skipped = plan.skipped.len(), "存在字段缺失的行，已跳过");
        }
        info!(
            row_count = plan.row_count,
            accepted = plan.rows.len(),
            unique_sectors = plan.sectors.len(),
            unique_groups = plan.groups.len(),
            unique_products = plan.products.len(),
            "清洗与去重完成"
        );

        if dry_run {
            let report = self.dry_run(source_name, &plan).await?;
            info!("试运行完成，未写入任何数据");
            return Ok(ImportOutcome::DryRun(report));
        }

        // 步骤 4: 落库
        let (inserted, duplicate_assignments) = self.apply(&plan).await?;

        // 步骤 5: 导入日志
        let log = ImportLog {
            import_log_id: Uuid::new_v4().to_string(),
            source: source_name,
            dry_run: false,
            row_count: plan.row_count,
            skipped_rows: plan.skipped.len(),
            inserted,
            duplicate_assignments,
            started_at,
            finished_at: Utc::now(),
        };
        self.import_log_repo.insert(&log)?;

        let elapsed = timer.elapsed();
        info!(
            import_log_id = %log.import_log_id,
            inserted_sectors = inserted.sectors,
            inserted_groups = inserted.groups,
            inserted_products = inserted.products,
            inserted_assignments = inserted.assignments,
            duplicate_assignments,
            elapsed_ms = elapsed.as_millis() as u64,
            "目录导入完成"
        );

        Ok(ImportOutcome::Applied(ImportReport {
            unique: plan.unique_counts(),
            skipped: plan.skipped,
            log,
            elapsed,
        }))
    }

    async fn import_rows(&self, rows: Vec<RawRow>, dry_run: bool) -> ImportResult<ImportOutcome> {
        let source = InMemorySource::new(rows);
        self.import_source(&source, dry_run).await
    }

    #[instrument(skip(self, file_path), fields(file_path = %file_path.display()))]
    async fn import_from_file(
        &self,
        file_path: &Path,
        source_name: Option<String>,
        dry_run: bool,
    ) -> ImportResult<ImportOutcome> {
        let sheet_name = self
            .config
            .get_excel_sheet_name()
            .await
            .map_err(|e| ImportError::config(config_keys::EXCEL_SHEET_NAME, e))?;

        let mut source = FileSource::new(file_path, Box::new(UniversalFileParser::new(sheet_name)));
        if let Some(name) = source_name {
            source = source.with_name(name);
        }
        self.import_source(&source, dry_run).await
    }

    async fn recent_import_logs(&self, limit: usize) -> ImportResult<Vec<ImportLog>> {
        Ok(self.import_log_repo.recent(limit)?)
    }
}
