// ==========================================
// 成本情报系统 - 毛利率风险分类器
// ==========================================
// 规则: margin 有定义 且 低于目标毛利率 → 风险单
//       margin 无定义（未定价/零成本）不算风险,看板中置底展示
// ==========================================

use crate::config::ConfigManager;
use crate::domain::estimate::{MarginDashboard, MarginEntry, MarginFilters, MarginSummary};
use crate::repository::error::RepositoryResult;
use crate::repository::estimate_repo::CostEstimateRepository;
use std::sync::Arc;

// ==========================================
// MarginClassifier - 毛利率风险分类器
// ==========================================
pub struct MarginClassifier {
    estimate_repo: Arc<CostEstimateRepository>,
    config: Arc<ConfigManager>,
}

impl MarginClassifier {
    pub fn new(estimate_repo: Arc<CostEstimateRepository>, config: Arc<ConfigManager>) -> Self {
        Self {
            estimate_repo,
            config,
        }
    }

    /// 毛利率看板: 过滤 + 风险标注 + 汇总
    ///
    /// 目标毛利率每次调用现读配置,看板始终反映当前阈值
    pub fn margin_dashboard(&self, filters: &MarginFilters) -> RepositoryResult<MarginDashboard> {
        let target_margin = self.config.target_margin_percent()?;
        let summaries = self.estimate_repo.list_for_dashboard(filters)?;

        let entries: Vec<MarginEntry> = summaries
            .into_iter()
            .map(|estimate| {
                let at_risk = estimate.margin.map(|m| m < target_margin).unwrap_or(false);
                MarginEntry {
                    estimate,
                    at_risk,
                    target_margin,
                }
            })
            .collect();

        let defined: Vec<f64> = entries.iter().filter_map(|e| e.estimate.margin).collect();
        let avg_margin = if defined.is_empty() {
            0.0
        } else {
            let mean = defined.iter().sum::<f64>() / defined.len() as f64;
            (mean * 10.0).round() / 10.0
        };

        let summary = MarginSummary {
            total: entries.len(),
            at_risk: entries.iter().filter(|e| e.at_risk).count(),
            avg_margin,
            target_margin,
        };

        Ok(MarginDashboard { estimates: entries, summary })
    }
}
