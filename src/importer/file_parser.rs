// ==========================================
// 样品申请目录系统 - 表格数据源
// ==========================================
// 支持: Excel (.xlsx/.xls) / CSV (.csv) / 内存行
// 约定: 第一行为表头并跳过；前三列依次为 行业 / 生产分组 / 产品
// ==========================================

use crate::domain::import::RawRow;
use crate::importer::error::{ImportError, ImportResult};
use calamine::{open_workbook_auto, Reader};
use csv::ReaderBuilder;
use std::fs::File;
use std::path::{Path, PathBuf};

// ==========================================
// FileParser Trait - 文件 → 原始行
// ==========================================
pub trait FileParser: Send + Sync {
    fn parse_to_raw_rows(&self, file_path: &Path) -> ImportResult<Vec<RawRow>>;
}

// ==========================================
// TabularSource Trait - 外部表格数据源
// ==========================================
// 实现者: FileSource, InMemorySource
pub trait TabularSource: Send + Sync {
    /// 日志展示用的描述
    fn describe(&self) -> String;

    /// 写入导入日志的来源名称（None = 使用配置默认值）
    fn source_name(&self) -> Option<String> {
        None
    }

    /// 读取全部原始行（不含表头）
    fn fetch_rows(&self) -> ImportResult<Vec<RawRow>>;
}

fn ensure_exists(path: &Path) -> ImportResult<()> {
    if !path.exists() {
        return Err(ImportError::FileNotFound(path.display().to_string()));
    }
    Ok(())
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase()
}

// ==========================================
// CSV Parser 实现
// ==========================================
pub struct CsvParser;

impl FileParser for CsvParser {
    fn parse_to_raw_rows(&self, file_path: &Path) -> ImportResult<Vec<RawRow>> {
        ensure_exists(file_path)?;

        let ext = extension_of(file_path);
        if ext != "csv" {
            return Err(ImportError::UnsupportedFormat(ext));
        }

        let file = File::open(file_path)?;
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true) // 允许行长度不一致
            .from_reader(file);

        let mut rows = Vec::new();
        for (idx, result) in reader.records().enumerate() {
            let record = result?;
            let cells: Vec<String> = record.iter().map(|v| v.to_string()).collect();
            rows.push(RawRow::new(idx + 1, cells));
        }

        Ok(rows)
    }
}

// ==========================================
// Excel Parser 实现
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct ExcelParser {
    sheet_name: Option<String>, // None = 第一个工作表
}

impl ExcelParser {
    pub fn new(sheet_name: Option<String>) -> Self {
        Self { sheet_name }
    }
}

impl FileParser for ExcelParser {
    fn parse_to_raw_rows(&self, file_path: &Path) -> ImportResult<Vec<RawRow>> {
        ensure_exists(file_path)?;

        let ext = extension_of(file_path);
        if ext != "xlsx" && ext != "xls" {
            return Err(ImportError::UnsupportedFormat(ext));
        }

        let mut workbook = open_workbook_auto(file_path)?;

        let sheet_name = match &self.sheet_name {
            Some(name) => name.clone(),
            None => workbook
                .sheet_names()
                .first()
                .cloned()
                .ok_or_else(|| ImportError::ExcelParseError("Excel 文件无工作表".to_string()))?,
        };

        let range = workbook.worksheet_range(&sheet_name)?;

        let mut rows = Vec::new();
        // 第一行为表头
        for (idx, data_row) in range.rows().skip(1).enumerate() {
            let cells: Vec<String> = data_row.iter().map(|cell| cell.to_string()).collect();
            rows.push(RawRow::new(idx + 1, cells));
        }

        Ok(rows)
    }
}

// ==========================================
// 通用文件解析器（根据扩展名自动选择）
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct UniversalFileParser {
    excel_sheet_name: Option<String>,
}

impl UniversalFileParser {
    pub fn new(excel_sheet_name: Option<String>) -> Self {
        Self { excel_sheet_name }
    }
}

impl FileParser for UniversalFileParser {
    fn parse_to_raw_rows(&self, file_path: &Path) -> ImportResult<Vec<RawRow>> {
        match extension_of(file_path).as_str() {
            "csv" => CsvParser.parse_to_raw_rows(file_path),
            "xlsx" | "xls" => ExcelParser::new(self.excel_sheet_name.clone()).parse_to_raw_rows(file_path),
            other => Err(ImportError::UnsupportedFormat(other.to_string())),
        }
    }
}

// ==========================================
// FileSource - 文件数据源
// ==========================================
pub struct FileSource {
    path: PathBuf,
    parser: Box<dyn FileParser>,
    name: Option<String>,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>, parser: Box<dyn FileParser>) -> Self {
        Self {
            path: path.into(),
            parser,
            name: None,
        }
    }

    /// 指定导入日志中的来源名称
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

impl TabularSource for FileSource {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    fn source_name(&self) -> Option<String> {
        self.name.clone()
    }

    fn fetch_rows(&self) -> ImportResult<Vec<RawRow>> {
        self.parser.parse_to_raw_rows(&self.path)
    }
}

// ==========================================
// InMemorySource - 内存数据源（远程表格适配 / 测试）
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
    rows: Vec<RawRow>,
    name: Option<String>,
}

impl InMemorySource {
    pub fn new(rows: Vec<RawRow>) -> Self {
        Self { rows, name: None }
    }

    /// 由 (行业, 分组, 产品) 元组构造，行号从 1 开始
    pub fn from_triples<S: AsRef<str>>(triples: &[(S, S, S)]) -> Self {
        let rows = triples
            .iter()
            .enumerate()
            .map(|(idx, (sector, group, product))| {
                RawRow::new(
                    idx + 1,
                    vec![
                        sector.as_ref().to_string(),
                        group.as_ref().to_string(),
                        product.as_ref().to_string(),
                    ],
                )
            })
            .collect();
        Self::new(rows)
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

impl TabularSource for InMemorySource {
    fn describe(&self) -> String {
        format!("in-memory ({} rows)", self.rows.len())
    }

    fn source_name(&self) -> Option<String> {
        self.name.clone()
    }

    fn fetch_rows(&self) -> ImportResult<Vec<RawRow>> {
        Ok(self.rows.clone())
    }
}
