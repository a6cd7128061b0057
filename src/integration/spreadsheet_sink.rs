// ==========================================
// 样品申请目录系统 - 申请汇总表追加
// ==========================================
// 行格式（固定 11 列）:
// 日期 | 公司 | 名 | 姓 | 邮箱 | 电话 | 地址 | 行业 | 分组 | 产品 | 申请编号
// 空值统一写 "-"
// ==========================================

use crate::engine::events::{RequestEventSink, RequestSubmittedEvent, SinkError};
use async_trait::async_trait;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

pub const SPREADSHEET_COLUMNS: [&str; 11] = [
    "date",
    "company",
    "first_name",
    "last_name",
    "email",
    "phone",
    "address",
    "sector",
    "production_groups",
    "products",
    "request_id",
];

fn or_dash(value: Option<&str>) -> String {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => "-".to_string(),
    }
}

/// 汇总表的一行
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpreadsheetRow(pub [String; 11]);

impl SpreadsheetRow {
    pub fn from_event(event: &RequestSubmittedEvent) -> Self {
        Self([
            event.submitted_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            event.contact.company_name.clone(),
            or_dash(event.contact.first_name.as_deref()),
            or_dash(event.contact.last_name.as_deref()),
            event.contact.email.clone(),
            event.contact.phone.clone(),
            or_dash(event.contact.address.as_deref()),
            event.sector_name.clone(),
            event.group_names.join(", "),
            event.product_names.join(", "),
            event.request_id.clone(),
        ])
    }

    pub fn cells(&self) -> &[String] {
        &self.0
    }
}

// ==========================================
// CsvSpreadsheetSink - 追加到本地 CSV
// ==========================================
pub struct CsvSpreadsheetSink {
    path: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl CsvSpreadsheetSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Arc::new(Mutex::new(())),
        }
    }
}

/// 同步追加一行（文件不存在时先写表头）；在阻塞线程池中调用
fn append_row(path: &Path, write_lock: &Mutex<()>, row: &SpreadsheetRow) -> Result<(), SinkError> {
    let _guard = write_lock
        .lock()
        .map_err(|e| SinkError::Delivery(format!("锁获取失败: {}", e)))?;

    let is_new = !path.exists();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(file);

    let to_sink_err = |e: csv::Error| SinkError::Delivery(e.to_string());
    if is_new {
        writer.write_record(SPREADSHEET_COLUMNS).map_err(to_sink_err)?;
    }
    writer.write_record(row.cells()).map_err(to_sink_err)?;
    writer.flush()?;
    Ok(())
}

#[async_trait]
impl RequestEventSink for CsvSpreadsheetSink {
    fn name(&self) -> &str {
        "spreadsheet"
    }

    async fn deliver(&self, event: &RequestSubmittedEvent) -> Result<(), SinkError> {
        let row = SpreadsheetRow::from_event(event);
        let path = self.path.clone();
        let write_lock = self.write_lock.clone();
        tokio::task::spawn_blocking(move || append_row(&path, &write_lock, &row))
            .await
            .map_err(|e| SinkError::Delivery(format!("写入任务异常退出: {}", e)))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::request::ContactInfo;
    use chrono::{TimeZone, Utc};

    fn event() -> RequestSubmittedEvent {
        RequestSubmittedEvent {
            request_id: "REQ-1".to_string(),
            submitted_at: Utc.with_ymd_and_hms(2024, 5, 1, 9, 30, 0).unwrap(),
            contact: ContactInfo {
                company_name: "Acme".to_string(),
                first_name: Some("Ada".to_string()),
                email: "ada@example.com".to_string(),
                phone: "555".to_string(),
                address: Some(" ".to_string()),
                ..Default::default()
            },
            sector_name: "Others".to_string(),
            group_names: vec!["Cheese".to_string(), "Milk".to_string()],
            product_names: vec!["Brie".to_string(), "Skim".to_string()],
        }
    }

    #[test]
    fn test_row_layout() {
        let row = SpreadsheetRow::from_event(&event());
        assert_eq!(row.cells().len(), 11);
        assert_eq!(row.cells()[0], "2024-05-01 09:30:00");
        assert_eq!(row.cells()[3], "-");
        assert_eq!(row.cells()[6], "-");
        assert_eq!(row.cells()[8], "Cheese, Milk");
        assert_eq!(row.cells()[10], "REQ-1");
    }

    #[tokio::test]
    async fn test_appends_header_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("requests.csv");
        let sink = CsvSpreadsheetSink::new(&path);

        sink.deliver(&event()).await.unwrap();
        sink.deliver(&event()).await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("date,company"));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_concurrent_deliveries_keep_rows_whole() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("requests.csv");
        let sink = Arc::new(CsvSpreadsheetSink::new(&path));

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let sink = sink.clone();
                tokio::spawn(async move { sink.deliver(&event()).await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let records: Vec<_> = reader.records().collect::<Result<_, _>>().unwrap();
        assert_eq!(records.len(), 8);
        assert!(records.iter().all(|r| r.len() == 11));
    }
}
