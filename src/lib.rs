// ==========================================
// 成本情报系统 - 核心库
// ==========================================
// 技术栈: Rust + SQLite + reqwest
// 系统定位: 价格解析引擎 (Price Resolution Engine)
// 职责: 物料价格目录、来源优先级解析、在线询价级联、成本估算与毛利率分析
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 业务规则
pub mod engine;

// 在线询价层 - 外部价格来源策略
pub mod lookup;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA/建表统一）
pub mod db;

// 日志系统
pub mod logging;

// API 层 - 业务接口
pub mod api;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{LookupTierKind, PriceSource, ResolvedPrice, ResolvedSource};

// 领域实体
pub use domain::{
    BomLine, CostEstimate, CostEstimateInput, EstimateLine, EstimateSummary, IngestRow,
    IngestSummary, MarginDashboard, MarginFilters, Material, MaterialSummary, NewObservation,
    PriceObservation,
};

// 引擎
pub use engine::{
    BomDissector, CostEstimator, MarginClassifier, OnlineLookupCascade, PassthroughDissector,
    PriceResolver,
};

// 仓储
pub use repository::{CatalogRepository, CostEstimateRepository};

// 配置
pub use config::ConfigManager;

// API
pub use api::{CatalogApi, CostEngineApi};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "成本情报系统";

// 固定报价币种（统一折算为 OMR）
pub const REPORTING_CURRENCY: &str = "OMR";
