// ==========================================
// 样品申请目录系统 - 外部协作方适配
// ==========================================
// 职责: 图片存储 / 汇总表追加 / 管理员通知
// 说明: 只定义契约与本地参考实现，不绑定具体云服务
// ==========================================

pub mod blob_store;
pub mod notification;
pub mod spreadsheet_sink;

pub use blob_store::{
    sanitize_file_name, sector_image_key, validate_image_content_type, BlobError, BlobStore,
    FsBlobStore, ALLOWED_IMAGE_TYPES,
};
pub use notification::{EmailNotificationSink, LogMailTransport, MailMessage, MailTransport};
pub use spreadsheet_sink::{CsvSpreadsheetSink, SpreadsheetRow, SPREADSHEET_COLUMNS};
