// ==========================================
// 样品申请目录系统 - 目录导入 Trait
// ==========================================
// 职责: 定义目录导入接口（不包含实现）
// ==========================================

use crate::domain::import::{ImportLog, ImportOutcome, RawRow};
use crate::importer::error::ImportResult;
use crate::importer::file_parser::TabularSource;
use async_trait::async_trait;
use std::path::Path;

// ==========================================
// CatalogImporter Trait
// ==========================================
// 实现者: CatalogImporterImpl
#[async_trait]
pub trait CatalogImporter: Send + Sync {
    /// 从数据源导入目录
    ///
    /// # 参数
    /// - source: 表格数据源
    /// - dry_run: true 时只清洗 + 去重，不写库、不写日志
    ///
    /// # 导入流程
    /// 1. 读取原始行
    /// 2. 清洗（TRIM，空字段行跳过并记录原因）
    /// 3. 去重（行业 / 行业::分组 / 产品）
    /// 4. 按 行业 → 分组 → 产品 → 关联 顺序查找或创建
    /// 5. 写入导入日志
    async fn import_source(&self, source: &dyn TabularSource, dry_run: bool) -> ImportResult<ImportOutcome>;

    /// 直接导入原始行（来源名称使用配置默认值）
    async fn import_rows(&self, rows: Vec<RawRow>, dry_run: bool) -> ImportResult<ImportOutcome>;

    /// 从文件导入（按扩展名选择 CSV / Excel 解析器）
    async fn import_from_file(
        &self,
        file_path: &Path,
        source_name: Option<String>,
        dry_run: bool,
    ) -> ImportResult<ImportOutcome>;

    /// 最近的导入日志（新的在前）
    async fn recent_import_logs(&self, limit: usize) -> ImportResult<Vec<ImportLog>>;
}
