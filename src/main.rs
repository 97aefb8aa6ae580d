// ==========================================
// 成本情报系统 - 命令行入口
// ==========================================
// 用法:
//   cost-intelligence resolve <物料名> [单位]
//   cost-intelligence add-price <物料名> <单位> <单价> [供应商]
//   cost-intelligence estimate <标题> <描述> [售价]
//   cost-intelligence estimates
//   cost-intelligence dashboard
//   cost-intelligence materials [搜索词]
//   cost-intelligence config-set <键> <值>
// 数据库: COST_INTELLIGENCE_DB 环境变量,缺省为用户数据目录
// ==========================================

use cost_intelligence::api::catalog_api::ManualPriceOptions;
use cost_intelligence::db::open_and_init;
use cost_intelligence::{
    CatalogApi, CatalogRepository, ConfigManager, CostEngineApi, CostEstimateInput, CostEstimator,
    CostEstimateRepository, MarginClassifier, MarginFilters, OnlineLookupCascade,
    PassthroughDissector, PriceResolver,
};
use std::sync::{Arc, Mutex};
use tracing::error;

/// 默认数据库路径（用户数据目录,不可用时退回当前目录）
fn default_db_path() -> String {
    dirs::data_dir()
        .map(|dir| {
            dir.join("cost-intelligence")
                .join("cost_intelligence.db")
                .to_string_lossy()
                .to_string()
        })
        .unwrap_or_else(|| "cost_intelligence.db".to_string())
}

fn db_path() -> String {
    std::env::var("COST_INTELLIGENCE_DB").unwrap_or_else(|_| default_db_path())
}

struct App {
    catalog_api: CatalogApi,
    cost_api: CostEngineApi,
    config: Arc<ConfigManager>,
}

/// 组装全部仓储与引擎（共享单一连接）
fn build_app(path: &str) -> Result<App, Box<dyn std::error::Error>> {
    if let Some(parent) = std::path::Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let conn = Arc::new(Mutex::new(open_and_init(path)?));

    let catalog = Arc::new(CatalogRepository::from_connection(conn.clone()));
    let estimate_repo = Arc::new(CostEstimateRepository::from_connection(conn.clone()));
    let config = Arc::new(ConfigManager::from_connection(conn));

    let credentials = config.lookup_credentials()?;
    let ttl_hours = config.online_ttl_hours()?;
    let cascade = OnlineLookupCascade::from_credentials(catalog.clone(), &credentials, ttl_hours);
    let resolver = Arc::new(PriceResolver::new(catalog.clone(), cascade));

    let estimator = CostEstimator::new(
        resolver.clone(),
        estimate_repo.clone(),
        config.clone(),
        Box::new(PassthroughDissector),
    );
    let classifier = MarginClassifier::new(estimate_repo.clone(), config.clone());

    Ok(App {
        catalog_api: CatalogApi::new(catalog),
        cost_api: CostEngineApi::new(resolver, estimator, classifier, estimate_repo),
        config,
    })
}

fn print_usage() {
    eprintln!(
        "用法:\n  \
         cost-intelligence resolve <物料名> [单位]\n  \
         cost-intelligence add-price <物料名> <单位> <单价> [供应商]\n  \
         cost-intelligence estimate <标题> <描述> [售价]\n  \
         cost-intelligence estimates\n  \
         cost-intelligence dashboard\n  \
         cost-intelligence materials [搜索词]\n  \
         cost-intelligence config-set <键> <值>"
    );
}

#[tokio::main]
async fn main() {
    cost_intelligence::logging::init();

    if let Err(e) = run().await {
        error!(error = %e, "命令执行失败");
        eprintln!("错误: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = args.first().map(String::as_str) else {
        print_usage();
        return Ok(());
    };

    let app = build_app(&db_path())?;

    match command {
        "resolve" => {
            let name = args.get(1).ok_or("缺少物料名")?;
            let unit = args.get(2).map(String::as_str).unwrap_or("piece");
            let resolved = app.cost_api.resolve_price(name, unit).await?;
            println!("{}", serde_json::to_string_pretty(&resolved)?);
        }
        "add-price" => {
            let name = args.get(1).ok_or("缺少物料名")?;
            let unit = args.get(2).ok_or("缺少单位")?;
            let price: f64 = args.get(3).ok_or("缺少单价")?.parse()?;
            let observation = app.catalog_api.add_manual_price(
                name,
                unit,
                price,
                ManualPriceOptions {
                    vendor_name: args.get(4).cloned(),
                    ..Default::default()
                },
            )?;
            println!("{}", serde_json::to_string_pretty(&observation)?);
        }
        "estimate" => {
            let title = args.get(1).ok_or("缺少标题")?.clone();
            let description = args.get(2).cloned();
            let selling_price = args.get(3).map(|s| s.parse::<f64>()).transpose()?;
            let estimate = app
                .cost_api
                .create_estimate(CostEstimateInput {
                    title,
                    description,
                    selling_price,
                    ..Default::default()
                })
                .await?;
            println!("{}", serde_json::to_string_pretty(&estimate)?);
        }
        "estimates" => {
            let estimates = app.cost_api.list_estimates()?;
            println!("{}", serde_json::to_string_pretty(&estimates)?);
        }
        "dashboard" => {
            let dashboard = app.cost_api.margin_dashboard(&MarginFilters::default())?;
            println!("{}", serde_json::to_string_pretty(&dashboard)?);
        }
        "materials" => {
            let materials = app
                .catalog_api
                .list_materials(args.get(1).map(String::as_str))?;
            println!("{}", serde_json::to_string_pretty(&materials)?);
        }
        "config-set" => {
            let key = args.get(1).ok_or("缺少配置键")?;
            let value = args.get(2).ok_or("缺少配置值")?;
            app.config.set_config_value(key, value)?;
            println!("已设置 {} = {}", key, value);
        }
        other => {
            eprintln!("未知命令: {}", other);
            print_usage();
        }
    }

    Ok(())
}
