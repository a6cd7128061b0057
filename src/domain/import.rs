// ==========================================
// 样品申请目录系统 - 目录导入领域模型
// ==========================================
// 职责: 外部表格行 → 强类型目录行 / 跳过行，导入计数与审计日志
// ==========================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

// ==========================================
// RawRow - 数据源原始行（未清洗）
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRow {
    pub row_number: usize, // 数据源中的行号（从 1 开始，不含表头）
    pub cells: Vec<String>,
}

impl RawRow {
    pub fn new(row_number: usize, cells: Vec<String>) -> Self {
        Self { row_number, cells }
    }
}

// ==========================================
// CatalogRow - 清洗后的目录行
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CatalogRow {
    pub row_number: usize,
    pub sector: String,
    pub group: String,
    pub product: String,
}

impl CatalogRow {
    /// 分组复合键 (行业, 分组)：同名分组在不同行业下是不同实体
    ///
    /// 按元组比较，名称中含分隔符也不会串键
    pub fn group_key(&self) -> (&str, &str) {
        (&self.sector, &self.group)
    }
}

// ==========================================
// SkipReason / SkippedRow - 跳过行（带原因）
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SkipReason {
    BlankRow,
    MissingSector,
    MissingGroup,
    MissingProduct,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::BlankRow => write!(f, "空白行"),
            SkipReason::MissingSector => write!(f, "行业为空"),
            SkipReason::MissingGroup => write!(f, "生产分组为空"),
            SkipReason::MissingProduct => write!(f, "产品为空"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedRow {
    pub row_number: usize,
    pub reason: SkipReason,
}

/// 行清洗结果
#[derive(Debug, Clone, PartialEq)]
pub enum RowOutcome {
    Accepted(CatalogRow),
    Skipped(SkippedRow),
}

// ==========================================
// InsertedCounts - 新建记录计数
// ==========================================
// 红线: 只统计本次新建的记录，已存在的不计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsertedCounts {
    pub sectors: usize,
    pub groups: usize,
    pub products: usize,
    pub assignments: usize,
}

impl InsertedCounts {
    pub fn total(&self) -> usize {
        self.sectors + self.groups + self.products + self.assignments
    }
}

/// 去重后的唯一计数
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UniqueCounts {
    pub sectors: usize,
    pub groups: usize,
    pub products: usize,
}

/// 试运行样例（每类最多 N 个）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DryRunSamples {
    pub sectors: Vec<String>,
    pub groups: Vec<String>,
    pub products: Vec<String>,
}

// ==========================================
// ImportLog - 导入审计记录（不可变）
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportLog {
    pub import_log_id: String,
    pub source: String,
    pub dry_run: bool,
    pub row_count: usize,
    pub skipped_rows: usize,
    pub inserted: InsertedCounts,
    pub duplicate_assignments: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

// ==========================================
// 导入结果
// ==========================================

/// 试运行报告（不落库）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DryRunReport {
    pub source: String,
    pub row_count: usize,
    pub accepted_rows: usize,
    pub skipped: Vec<SkippedRow>,
    pub unique: UniqueCounts,
    pub samples: DryRunSamples,
}

/// 正式导入报告
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportReport {
    pub log: ImportLog,
    pub skipped: Vec<SkippedRow>,
    pub unique: UniqueCounts,
    pub elapsed: Duration,
}

impl ImportReport {
    pub fn inserted(&self) -> InsertedCounts {
        self.log.inserted
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ImportOutcome {
    DryRun(DryRunReport),
    Applied(ImportReport),
}

impl ImportOutcome {
    pub fn is_dry_run(&self) -> bool {
        matches!(self, ImportOutcome::DryRun(_))
    }
}
