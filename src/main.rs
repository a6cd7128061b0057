// ==========================================
// 样品申请目录系统 - 管理命令行入口
// ==========================================
// 命令: import / import-logs / can-delete / delete / set-status / customers / config
// 输出: 成功时打印 JSON 结果；失败时打印 JSON 错误载荷并以非零码退出
// ==========================================

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;

use sample_catalog::api::{ApiError, CallerContext, CustomerListQuery};
use sample_catalog::app::{get_default_db_path, AppState};
use sample_catalog::domain::EntityKind;

#[derive(Parser)]
#[clap(name = "catalog-admin", author, version, about)]
struct Cli {
    /// 数据库文件路径（默认: SAMPLE_CATALOG_DB_PATH 或用户数据目录）
    #[clap(long, global = true)]
    db: Option<String>,
    /// 操作人（写入状态历史）
    #[clap(long, global = true, default_value = "catalog-admin")]
    actor: String,
    /// 以 JSON 格式输出日志（stderr）
    #[clap(long, global = true)]
    json_logs: bool,
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 从 CSV / Excel 导入目录
    Import {
        file: String,
        #[clap(long)]
        dry_run: bool,
        #[clap(long)]
        source: Option<String>,
    },
    /// 最近的导入日志
    ImportLogs {
        #[clap(short, long)]
        limit: Option<usize>,
    },
    /// 删除预检
    CanDelete { kind: String, id: String },
    /// 守卫删除
    Delete { kind: String, id: String },
    /// 变更申请状态
    SetStatus {
        request_id: String,
        status: String,
        #[clap(long)]
        note: Option<String>,
    },
    /// 客户列表
    Customers {
        #[clap(long)]
        page: Option<usize>,
        #[clap(long)]
        search: Option<String>,
        #[clap(long)]
        sector: Option<String>,
        #[clap(long)]
        group: Option<String>,
        #[clap(long)]
        province: Option<String>,
        #[clap(long)]
        district: Option<String>,
    },
    /// 配置读写
    Config {
        #[clap(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    Show,
    Set { key: String, value: String },
}

fn api_err(err: ApiError) -> anyhow::Error {
    anyhow::anyhow!(err.to_json())
}

fn parse_kind(kind: &str) -> Result<EntityKind> {
    EntityKind::parse(kind)
        .ok_or_else(|| api_err(ApiError::InvalidInput(format!("未知的实体类别: {}（sector / group）", kind))))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    if args.json_logs {
        sample_catalog::logging::init_json();
    } else {
        sample_catalog::logging::init();
    }

    let db_path = args.db.unwrap_or_else(get_default_db_path);
    info!(db_path = %db_path, version = sample_catalog::VERSION, "catalog-admin 启动");
    let state = AppState::new(db_path).map_err(anyhow::Error::msg)?;
    let caller = CallerContext::admin(args.actor);

    match args.command {
        Commands::Import { file, dry_run, source } => {
            let outcome = state
                .import_api
                .import_file(&caller, &file, source, dry_run)
                .await
                .map_err(api_err)?;
            print_json(&outcome)?;
        }
        Commands::ImportLogs { limit } => {
            let logs = state
                .import_api
                .recent_import_logs(&caller, limit)
                .await
                .map_err(api_err)?;
            print_json(&logs)?;
        }
        Commands::CanDelete { kind, id } => {
            let kind = parse_kind(&kind)?;
            let check = state.catalog_api.can_delete(&caller, kind, &id).map_err(api_err)?;
            print_json(&check)?;
        }
        Commands::Delete { kind, id } => {
            let result = match parse_kind(&kind)? {
                EntityKind::Sector => state.catalog_api.delete_sector(&caller, &id).await,
                EntityKind::ProductionGroup => state.catalog_api.delete_production_group(&caller, &id),
            };
            result.map_err(api_err)?;
            print_json(&serde_json::json!({ "deleted": id }))?;
        }
        Commands::SetStatus {
            request_id,
            status,
            note,
        } => {
            let request = state
                .request_api
                .set_status(&caller, &request_id, &status, note.as_deref())
                .map_err(api_err)?;
            print_json(&request)?;
        }
        Commands::Customers {
            page,
            search,
            sector,
            group,
            province,
            district,
        } => {
            let query = CustomerListQuery {
                page,
                search,
                sector_id: sector,
                production_group_id: group,
                province,
                district,
            };
            let response = state
                .request_api
                .list_customers(&caller, &query)
                .await
                .map_err(api_err)?;
            print_json(&response)?;
        }
        Commands::Config { command } => match command {
            ConfigCommands::Show => {
                let snapshot = state
                    .config_manager
                    .get_config_snapshot()
                    .map_err(|e| anyhow::anyhow!(e.to_string()))?;
                println!("{}", snapshot);
            }
            ConfigCommands::Set { key, value } => {
                state
                    .config_manager
                    .set_global_config_value(&key, &value)
                    .map_err(|e| anyhow::anyhow!(e.to_string()))?;
                print_json(&serde_json::json!({ "key": key, "value": value }))?;
            }
        },
    }

    Ok(())
}
