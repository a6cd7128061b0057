// ==========================================
// 样品申请目录系统 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod catalog;
pub mod import;
pub mod request;
pub mod types;

// 重导出核心类型
pub use catalog::{
    DependentSummary, Product, ProductAssignment, ProductionGroup, ProductionGroupView, Sector,
};
pub use import::{
    CatalogRow, DryRunReport, DryRunSamples, ImportLog, ImportOutcome, ImportReport,
    InsertedCounts, RawRow, RowOutcome, SkipReason, SkippedRow, UniqueCounts,
};
pub use request::{
    ContactInfo, RequestLineInput, RequestProductSnapshot, SampleRequest, StatusHistoryEntry,
};
pub use types::{EntityKind, RequestStatus};
