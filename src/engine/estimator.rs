// ==========================================
// 成本情报系统 - 成本估算管道
// ==========================================
// 流程: BOM 行（显式或拆解）→ 逐行解析定价 → 成本汇总 → 持久化
// 红线: 估算绝不因个别物料无价而失败——无价行计零成本、零置信度
// 费用模型: 人工为整单固定费率,管理费用按 (材料+人工) 比例计提
// ==========================================

use crate::config::ConfigManager;
use crate::domain::estimate::{BomLine, CostEstimate, CostEstimateInput, EstimateLine};
use crate::engine::dissection::BomDissector;
use crate::engine::resolver::PriceResolver;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::estimate_repo::CostEstimateRepository;
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

// ==========================================
// CostEstimator - 成本估算管道
// ==========================================
pub struct CostEstimator {
    resolver: Arc<PriceResolver>,
    estimate_repo: Arc<CostEstimateRepository>,
    config: Arc<ConfigManager>,
    dissector: Box<dyn BomDissector>,
}

impl CostEstimator {
    pub fn new(
        resolver: Arc<PriceResolver>,
        estimate_repo: Arc<CostEstimateRepository>,
        config: Arc<ConfigManager>,
        dissector: Box<dyn BomDissector>,
    ) -> Self {
        Self {
            resolver,
            estimate_repo,
            config,
            dissector,
        }
    }

    /// 创建成本估算
    ///
    /// # 流程
    /// 1. 确定 BOM 行: 显式给定则直接使用,否则调用拆解协作方（至多一次）
    /// 2. 过滤空物料名与非正数量的行
    /// 3. 逐行解析定价（无价行计零成本,来源标记为 none/expired）
    /// 4. 成本汇总: 材料 + 固定人工 + 管理费用
    /// 5. 单事务持久化估算与全部明细行
    pub async fn create_estimate(
        &self,
        input: CostEstimateInput,
    ) -> RepositoryResult<CostEstimate> {
        let bom_lines = self.determine_bom_lines(&input).await;

        // 不可信输入过滤
        let bom_lines: Vec<BomLine> = bom_lines
            .into_iter()
            .filter(|line| !line.material_name.trim().is_empty() && line.quantity > 0.0)
            .collect();

        let estimate_id = Uuid::new_v4().to_string();
        let mut lines = Vec::with_capacity(bom_lines.len());
        let mut material_cost = 0.0;

        for (index, bom_line) in bom_lines.iter().enumerate() {
            let resolved = self
                .resolver
                .resolve(&bom_line.material_name, &bom_line.unit)
                .await?;

            let line_total = resolved.unit_price * bom_line.quantity;
            material_cost += line_total;

            lines.push(EstimateLine {
                id: Uuid::new_v4().to_string(),
                estimate_id: estimate_id.clone(),
                line_no: index as i32 + 1,
                material_name: bom_line.material_name.trim().to_string(),
                quantity: bom_line.quantity,
                unit: bom_line.unit.clone(),
                unit_price: resolved.unit_price,
                line_total,
                source: resolved.source.label(),
                source_detail: resolved.detail,
                confidence: resolved.confidence,
            });
        }

        let labour_cost = self.config.labour_rate_flat()?;
        let overhead_percent = self.config.overhead_percent()?;
        let overhead_cost = (material_cost + labour_cost) * overhead_percent / 100.0;
        let total_cost_price = material_cost + labour_cost + overhead_cost;

        let confidence_score = aggregate_confidence(&lines);
        let margin = input
            .selling_price
            .and_then(|sp| compute_margin(sp, total_cost_price));

        let now = Utc::now();
        let estimate = CostEstimate {
            id: estimate_id,
            title: input.title,
            description: input.description,
            category: input.category,
            client_name: input.client_name,
            material_cost,
            labour_cost,
            overhead_cost,
            total_cost_price,
            selling_price: input.selling_price,
            margin,
            confidence_score,
            lines,
            created_at: now,
            updated_at: now,
        };

        self.estimate_repo.insert_estimate(&estimate)?;
        info!(
            estimate_id = %estimate.id,
            lines = estimate.lines.len(),
            total = estimate.total_cost_price,
            confidence = estimate.confidence_score,
            "成本估算创建完成"
        );
        Ok(estimate)
    }

    /// 更新售价并重算毛利率（成本字段保持不变）
    pub fn update_selling_price(
        &self,
        id: &str,
        selling_price: f64,
    ) -> RepositoryResult<CostEstimate> {
        let existing = self
            .estimate_repo
            .find_by_id(id)?
            .ok_or_else(|| RepositoryError::NotFound {
                entity: "CostEstimate".to_string(),
                id: id.to_string(),
            })?;

        let margin = compute_margin(selling_price, existing.total_cost_price);
        self.estimate_repo
            .update_selling_price(id, selling_price, margin)?;

        self.estimate_repo
            .find_by_id(id)?
            .ok_or_else(|| RepositoryError::InternalError(format!("估算回读失败: {}", id)))
    }

    /// 确定 BOM 行: 显式 > 拆解 > 直通降级
    async fn determine_bom_lines(&self, input: &CostEstimateInput) -> Vec<BomLine> {
        if let Some(ref lines) = input.bom_lines {
            if !lines.is_empty() {
                return lines.clone();
            }
        }

        let description = input
            .description
            .as_deref()
            .unwrap_or(input.title.as_str());

        match self
            .dissector
            .dissect(description, input.category.as_deref())
            .await
        {
            Ok(lines) => lines,
            Err(e) => {
                // 拆解失败降级为单行 BOM,估算继续
                warn!(error = %e, "BOM 拆解失败,降级为单行");
                vec![BomLine {
                    material_name: description.to_string(),
                    quantity: 1.0,
                    unit: "piece".to_string(),
                }]
            }
        }
    }
}

/// 各行置信度均值 × 100,四舍五入为 0-100 整数（无行时为 0）
fn aggregate_confidence(lines: &[EstimateLine]) -> i32 {
    if lines.is_empty() {
        return 0;
    }
    let mean = lines.iter().map(|l| l.confidence).sum::<f64>() / lines.len() as f64;
    (mean * 100.0).round() as i32
}

/// 毛利率 = (售价 − 成本) / 售价 × 100,保留 1 位小数
///
/// 售价或成本不为正时无定义（返回 None,不是 0）
pub(crate) fn compute_margin(selling_price: f64, total_cost: f64) -> Option<f64> {
    if selling_price > 0.0 && total_cost > 0.0 {
        Some(((selling_price - total_cost) / selling_price * 1000.0).round() / 10.0)
    } else {
        None
    }
}
