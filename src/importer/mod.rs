// ==========================================
// 样品申请目录系统 - 导入层
// ==========================================
// 职责: 外部表格 → 行业 / 分组 / 产品 / 关联
// 支持: Excel, CSV, 内存行
// ==========================================

// 模块声明
pub mod catalog_deduper;
pub mod catalog_importer_impl;
pub mod catalog_importer_trait;
pub mod error;
pub mod file_parser;
pub mod row_normalizer;

// 重导出核心类型
pub use catalog_deduper::{CatalogPlan, PlannedGroup};
pub use catalog_importer_impl::CatalogImporterImpl;
pub use error::{ImportError, ImportResult};
pub use file_parser::{
    CsvParser, ExcelParser, FileSource, InMemorySource, TabularSource, UniversalFileParser,
};
pub use row_normalizer::normalize_row;

// 重导出 Trait 接口
pub use catalog_importer_trait::CatalogImporter;
pub use file_parser::FileParser;
