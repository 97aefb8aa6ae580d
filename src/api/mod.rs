// ==========================================
// 成本情报系统 - API 层
// ==========================================
// 职责: 对外业务接口,入参校验 + 错误转换
// 红线: API 不含业务规则,规则在引擎层
// ==========================================

pub mod catalog_api;
pub mod cost_engine_api;
pub mod error;

// 重导出 API
pub use catalog_api::{CatalogApi, ManualPriceOptions};
pub use cost_engine_api::CostEngineApi;
pub use error::{ApiError, ApiResult};
