// ==========================================
// 纺织品库存台账系统 - 命令行入口
// ==========================================
// 用法: textile-stock <命令> [参数...]
// 输出: JSON（便于脚本处理）
// 数据库: TEXTILE_STOCK_DB 或用户数据目录
// ==========================================

use chrono::{Local, NaiveDate};
use serde::Serialize;
use textile_stock::api::StockQuery;
use textile_stock::app::{get_default_db_path, AppState};
use textile_stock::domain::SourceFilter;
use textile_stock::{logging, OrderStatus, StockSortPreset};

type CliResult = Result<(), Box<dyn std::error::Error>>;

const USAGE: &str = "\
用法: textile-stock <命令> [参数...]

  stock [搜索] [排序预设] [--stale]   库存总览
  as-of <YYYY-MM-DD> [搜索]           历史余额
  sessions [起始日] [结束日]          盘点会话列表
  session <会话id>                    盘点会话明细
  orders [DRAFT|CONFIRMED|CANCELLED]  预订单列表
  import-preview <文件> [最近天数]    来源表去重预览
  paste-preview <文件>                批量粘贴表预览
  config                              配置列表
  config-set <键> <值>                修改配置";

#[tokio::main]
async fn main() {
    logging::init();

    tracing::info!("==================================================");
    tracing::info!("{}", textile_stock::APP_NAME);
    tracing::info!("系统版本: {}", textile_stock::VERSION);
    tracing::info!("==================================================");

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.is_empty() {
        println!("{}", USAGE);
        return;
    }

    if let Err(e) = run(&args).await {
        tracing::error!("命令执行失败: {}", e);
        eprintln!("{}", e);
        std::process::exit(1);
    }
}

async fn run(args: &[String]) -> CliResult {
    let db_path = get_default_db_path();
    tracing::info!("使用数据库: {}", db_path);
    let state = AppState::new(db_path)?;
    let today = Local::now().date_naive();

    let command = args[0].as_str();
    let rest = &args[1..];
    match command {
        "stock" => {
            let positional: Vec<&String> = rest.iter().filter(|a| !a.starts_with("--")).collect();
            let query = StockQuery {
                search: positional.first().map(|s| s.to_string()),
                only_stale: rest.iter().any(|a| a == "--stale"),
                preset: positional
                    .get(1)
                    .map(|s| StockSortPreset::from_str(s))
                    .unwrap_or_default(),
                active_only: true,
            };
            print_json(&state.stock_api.stock_overview(&query, today)?)
        }
        "as-of" => {
            let as_of = parse_date(rest.first())?;
            let search = rest.get(1).map(String::as_str);
            print_json(&state.stock_api.balances_as_of(as_of, search)?)
        }
        "sessions" => {
            let from = rest.first().map(|s| parse_date(Some(s))).transpose()?;
            let to = rest.get(1).map(|s| parse_date(Some(s))).transpose()?;
            print_json(&state.reconciliation_api.list_sessions(from, to)?)
        }
        "session" => {
            let id = rest.first().ok_or("缺少会话id")?;
            print_json(&state.reconciliation_api.session_detail(id)?)
        }
        "orders" => {
            let status = rest.first().and_then(|s| OrderStatus::from_str(s));
            print_json(&state.order_api.list(status)?)
        }
        "import-preview" => {
            let file = rest.first().ok_or("缺少文件路径")?;
            let filter = SourceFilter {
                days_back: rest.get(1).and_then(|s| s.trim().parse::<i64>().ok()),
                ..SourceFilter::default()
            };
            print_json(&state.import_api.preview_file(file, &filter, today).await?)
        }
        "paste-preview" => {
            let file = rest.first().ok_or("缺少文件路径")?;
            let preview = state
                .catalog_api
                .preview_bulk_sheet(std::path::Path::new(file))
                .await?;
            print_json(&preview)
        }
        "config" => print_json(&state.config_api.list_configs()?),
        "config-set" => {
            let (key, value) = match (rest.first(), rest.get(1)) {
                (Some(k), Some(v)) => (k, v),
                _ => return Err("用法: config-set <键> <值>".into()),
            };
            state.config_api.update_config(key, value)?;
            println!("{}", textile_stock::i18n::t("common.success"));
            Ok(())
        }
        other => Err(format!("未知命令: {}\n\n{}", other, USAGE).into()),
    }
}

fn parse_date(value: Option<&String>) -> Result<NaiveDate, Box<dyn std::error::Error>> {
    let raw = value.ok_or("缺少日期参数")?;
    Ok(NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")?)
}

fn print_json<T: Serialize>(value: &T) -> CliResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
