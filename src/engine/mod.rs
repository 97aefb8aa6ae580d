// ==========================================
// 成本情报系统 - 引擎层
// ==========================================
// 职责: 实现业务规则引擎,不拼 SQL
// 红线: Engine 不拼 SQL,所有解析结果必须携带来源与置信度
// ==========================================

pub mod cascade;
pub mod dissection;
pub mod estimator;
pub mod margin;
pub mod resolver;

// 重导出核心引擎
pub use cascade::{CascadeHit, OnlineLookupCascade};
pub use dissection::{BomDissector, PassthroughDissector};
pub use estimator::CostEstimator;
pub use margin::MarginClassifier;
pub use resolver::PriceResolver;
