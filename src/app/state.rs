// ==========================================
// 样品申请目录系统 - 应用状态
// ==========================================
// 职责: 管理应用级别的共享状态和API实例
// 说明: 单进程共享一个 SQLite 连接（Arc<Mutex<Connection>>）
// ==========================================

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::api::{CatalogApi, ImportApi, RequestApi};
use crate::config::config_manager::ConfigManager;
use crate::config::config_keys;
use crate::db::{init_schema, open_sqlite_connection};
use crate::engine::{DependencyGuard, RequestEventSink, RequestValidator, SideEffectDispatcher};
use crate::importer::CatalogImporterImpl;
use crate::integration::{
    BlobStore, CsvSpreadsheetSink, EmailNotificationSink, FsBlobStore, LogMailTransport, MailTransport,
};
use crate::repository::{
    AssignmentRepository, ImportLogRepository, ProductRepository, ProductionGroupRepository,
    RequestRepository, SectorRepository,
};

/// 图片对外访问前缀（本地参考实现）
pub const DEFAULT_PUBLIC_BASE_URL: &str = "http://localhost/assets/";

/// 应用启动参数
pub struct AppOptions {
    /// 数据库文件路径
    pub db_path: String,
    /// 行业图片存储根目录
    pub blob_root: PathBuf,
    /// 图片对外访问前缀
    pub public_base_url: String,
    /// 申请汇总表（CSV）路径
    pub spreadsheet_path: PathBuf,
    /// 管理员通知通道
    pub mail_transport: Arc<dyn MailTransport>,
}

impl AppOptions {
    /// 以数据库所在目录为基准的默认参数
    pub fn for_db_path(db_path: impl Into<String>) -> Self {
        let db_path = db_path.into();
        let base_dir = Path::new(&db_path)
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        Self {
            blob_root: base_dir.join("sector-images"),
            spreadsheet_path: base_dir.join("sample_requests.csv"),
            public_base_url: DEFAULT_PUBLIC_BASE_URL.to_string(),
            mail_transport: Arc::new(LogMailTransport),
            db_path,
        }
    }
}

/// 应用状态
///
/// 包含所有API实例和共享资源
pub struct AppState {
    /// 数据库路径
    pub db_path: String,

    /// 目录管理API
    pub catalog_api: Arc<CatalogApi>,

    /// 目录导入API
    pub import_api: Arc<ImportApi>,

    /// 样品申请API
    pub request_api: Arc<RequestApi>,

    /// 配置管理器
    pub config_manager: Arc<ConfigManager>,

    /// 依赖守卫（CLI 删除预检直接使用）
    pub dependency_guard: Arc<DependencyGuard>,
}

impl AppState {
    /// 使用默认参数创建AppState
    pub fn new(db_path: String) -> Result<Self, String> {
        Self::with_options(AppOptions::for_db_path(db_path))
    }

    /// 创建新的AppState实例
    ///
    /// # 说明
    /// 该方法会：
    /// 1. 打开数据库并初始化表结构
    /// 2. 初始化所有Repository
    /// 3. 组装导入器 / 依赖守卫 / 申请校验器与外部投递
    /// 4. 创建所有API实例
    pub fn with_options(options: AppOptions) -> Result<Self, String> {
        tracing::info!(db_path = %options.db_path, "初始化AppState");

        let conn = open_sqlite_connection(&options.db_path)
            .map_err(|e| format!("无法打开数据库: {}", e))?;
        init_schema(&conn).map_err(|e| format!("数据库初始化失败: {}", e))?;
        let conn = Arc::new(Mutex::new(conn));

        // ==========================================
        // 初始化Repository层
        // ==========================================
        let sector_repo = Arc::new(SectorRepository::new(conn.clone()));
        let group_repo = Arc::new(ProductionGroupRepository::new(conn.clone()));
        let product_repo = Arc::new(ProductRepository::new(conn.clone()));
        let assignment_repo = Arc::new(AssignmentRepository::new(conn.clone()));
        let request_repo = Arc::new(RequestRepository::new(conn.clone()));
        let import_log_repo = Arc::new(ImportLogRepository::new(conn.clone()));

        let config_manager = Arc::new(
            ConfigManager::from_connection(conn.clone())
                .map_err(|e| format!("无法创建ConfigManager: {}", e))?,
        );

        // ==========================================
        // 初始化Engine层
        // ==========================================
        let importer = Arc::new(CatalogImporterImpl::new(
            sector_repo.clone(),
            group_repo.clone(),
            product_repo.clone(),
            assignment_repo.clone(),
            import_log_repo,
            config_manager.clone(),
        ));

        let dependency_guard = Arc::new(DependencyGuard::new(sector_repo.clone(), group_repo.clone()));

        // 管理员邮箱在启动时读取
        let admin_email = config_manager
            .get_global_config_value(config_keys::ADMIN_EMAIL)
            .map_err(|e| format!("读取管理员邮箱失败: {}", e))?;
        let notification = EmailNotificationSink::new(admin_email, options.mail_transport.clone())
            .map_err(|e| format!("通知模板初始化失败: {}", e))?;
        let sinks: Vec<Arc<dyn RequestEventSink>> = vec![
            Arc::new(CsvSpreadsheetSink::new(&options.spreadsheet_path)),
            Arc::new(notification),
        ];
        let dispatcher = SideEffectDispatcher::new(sinks);

        let validator = Arc::new(RequestValidator::new(
            sector_repo.clone(),
            group_repo.clone(),
            product_repo.clone(),
            assignment_repo,
            request_repo.clone(),
            config_manager.clone(),
            dispatcher,
        ));

        let blob_store: Arc<dyn BlobStore> = Arc::new(
            FsBlobStore::new(&options.blob_root, &options.public_base_url)
                .map_err(|e| format!("无法创建图片存储: {}", e))?,
        );

        // ==========================================
        // 创建API实例
        // ==========================================
        let catalog_api = Arc::new(CatalogApi::new(
            sector_repo.clone(),
            group_repo,
            product_repo,
            dependency_guard.clone(),
            blob_store,
        ));
        let import_api = Arc::new(ImportApi::new(importer));
        let request_api = Arc::new(RequestApi::new(
            validator,
            request_repo,
            sector_repo,
            config_manager.clone(),
        ));

        tracing::info!("AppState初始化完成");

        Ok(Self {
            db_path: options.db_path,
            catalog_api,
            import_api,
            request_api,
            config_manager,
            dependency_guard,
        })
    }
}

/// 获取默认数据库路径
///
/// 顺序: 环境变量 SAMPLE_CATALOG_DB_PATH → 用户数据目录 → 当前目录
pub fn get_default_db_path() -> String {
    if let Ok(path) = std::env::var("SAMPLE_CATALOG_DB_PATH") {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from("./sample_catalog.db");
    if let Some(data_dir) = dirs::data_dir() {
        let dir = data_dir.join("sample-catalog");
        if std::fs::create_dir_all(&dir).is_ok() {
            path = dir.join("sample_catalog.db");
        }
    }

    path.to_string_lossy().to_string()
}
