// ==========================================
// 成本情报系统 - 成本引擎 API
// ==========================================
// 职责: 价格解析 / 成本估算 / 毛利率看板的对外接口
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::domain::estimate::{
    CostEstimate, CostEstimateInput, EstimateSummary, MarginDashboard, MarginFilters,
};
use crate::domain::types::ResolvedPrice;
use crate::engine::estimator::CostEstimator;
use crate::engine::margin::MarginClassifier;
use crate::engine::resolver::PriceResolver;
use crate::repository::estimate_repo::CostEstimateRepository;
use std::sync::Arc;
use tracing::info;

// ==========================================
// CostEngineApi - 成本引擎 API
// ==========================================
pub struct CostEngineApi {
    resolver: Arc<PriceResolver>,
    estimator: CostEstimator,
    classifier: MarginClassifier,
    estimate_repo: Arc<CostEstimateRepository>,
}

impl CostEngineApi {
    pub fn new(
        resolver: Arc<PriceResolver>,
        estimator: CostEstimator,
        classifier: MarginClassifier,
        estimate_repo: Arc<CostEstimateRepository>,
    ) -> Self {
        Self {
            resolver,
            estimator,
            classifier,
            estimate_repo,
        }
    }

    /// 解析物料单价
    ///
    /// NoData / Expired 以零价零置信度返回,不算错误
    pub async fn resolve_price(
        &self,
        material_name: &str,
        unit: &str,
    ) -> ApiResult<ResolvedPrice> {
        if material_name.trim().is_empty() {
            return Err(ApiError::InvalidInput("物料名称不能为空".to_string()));
        }

        Ok(self.resolver.resolve(material_name, unit).await?)
    }

    /// 创建成本估算
    pub async fn create_estimate(&self, input: CostEstimateInput) -> ApiResult<CostEstimate> {
        if input.title.trim().is_empty() {
            return Err(ApiError::InvalidInput("估算标题不能为空".to_string()));
        }
        if let Some(sp) = input.selling_price {
            if sp < 0.0 {
                return Err(ApiError::InvalidInput("售价不能为负".to_string()));
            }
        }

        let estimate = self.estimator.create_estimate(input).await?;
        info!(estimate_id = %estimate.id, "估算创建接口完成");
        Ok(estimate)
    }

    /// 按 id 查询估算（含明细行）
    pub fn get_estimate(&self, id: &str) -> ApiResult<CostEstimate> {
        self.estimate_repo
            .find_by_id(id)?
            .ok_or_else(|| ApiError::NotFound {
                entity: "CostEstimate".to_string(),
                id: id.to_string(),
            })
    }

    /// 估算列表（新→旧）
    pub fn list_estimates(&self) -> ApiResult<Vec<EstimateSummary>> {
        Ok(self.estimate_repo.list()?)
    }

    /// 更新售价并重算毛利率
    pub fn update_selling_price(&self, id: &str, selling_price: f64) -> ApiResult<CostEstimate> {
        if selling_price <= 0.0 {
            return Err(ApiError::InvalidInput("售价必须为正数".to_string()));
        }

        Ok(self.estimator.update_selling_price(id, selling_price)?)
    }

    /// 毛利率看板
    pub fn margin_dashboard(&self, filters: &MarginFilters) -> ApiResult<MarginDashboard> {
        Ok(self.classifier.margin_dashboard(filters)?)
    }
}
