// ==========================================
// 样品申请目录系统 - 目录配置读取 Trait
// ==========================================
// 职责: 定义导入 / 申请 / 客户列表所需的配置读取接口（不包含实现）
// 红线: 不包含配置写入、不包含业务逻辑
// ==========================================

use async_trait::async_trait;
use std::error::Error;

/// 配置读取结果
pub type ConfigResult<T> = Result<T, Box<dyn Error + Send + Sync>>;

// ==========================================
// CatalogConfigReader Trait
// ==========================================
// 实现者: ConfigManager（从 config_kv 表读取）
#[async_trait]
pub trait CatalogConfigReader: Send + Sync {
    // ===== 导入配置 =====

    /// 导入日志的数据源名称
    ///
    /// # 默认值
    /// - "tabular-import"
    async fn get_import_source_name(&self) -> ConfigResult<String>;

    /// 试运行每类样例数量上限
    ///
    /// # 默认值
    /// - 5
    async fn get_dry_run_sample_size(&self) -> ConfigResult<usize>;

    /// 关联写入分块大小（每块一个事务）
    ///
    /// # 默认值
    /// - 500
    async fn get_import_chunk_size(&self) -> ConfigResult<usize>;

    /// Excel 工作表名称（None = 第一个工作表）
    async fn get_excel_sheet_name(&self) -> ConfigResult<Option<String>>;

    // ===== 客户列表 / 通知 =====

    /// 客户列表每页条数
    ///
    /// # 默认值
    /// - 10
    async fn get_customer_page_size(&self) -> ConfigResult<usize>;

    /// 未选择行业时显示的名称
    ///
    /// # 默认值
    /// - "Others"
    async fn get_other_sector_label(&self) -> ConfigResult<String>;

    /// 管理员通知邮箱（None = 不发送通知）
    async fn get_admin_email(&self) -> ConfigResult<Option<String>>;
}
