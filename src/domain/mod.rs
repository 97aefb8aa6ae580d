// ==========================================
// 成本情报系统 - 领域层
// ==========================================
// 职责: 定义实体与领域类型,不含持久化与业务流程
// ==========================================

pub mod estimate;
pub mod material;
pub mod types;

// 重导出核心实体
pub use estimate::{
    BomLine, CostEstimate, CostEstimateInput, EstimateLine, EstimateSummary, MarginDashboard,
    MarginEntry, MarginFilters, MarginSummary,
};
pub use material::{
    IngestRow, IngestSummary, Material, MaterialSummary, NewObservation, PriceObservation,
};
pub use types::{LookupTierKind, PriceSource, ResolvedPrice, ResolvedSource};
