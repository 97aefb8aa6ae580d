// ==========================================
// 成本情报系统 - 来源优先级解析引擎
// ==========================================
// 红线: 信任等级制——先选出最高优先级来源子集,再在子集内求均值
//       单条 MANUAL 永远压过任意数量的 ONLINE 观测
// 置信度: (0.5 + 0.1×n) × (1 − 相对离散度),截断到 [0,1]
// ==========================================

use crate::domain::material::PriceObservation;
use crate::domain::types::{ResolvedPrice, ResolvedSource};
use crate::engine::cascade::OnlineLookupCascade;
use crate::lookup::round3;
use crate::repository::catalog_repo::CatalogRepository;
use crate::repository::error::RepositoryResult;
use chrono::Utc;
use std::sync::Arc;
use tracing::debug;

/// 参与解析的观测条数上限（新→旧截取,陈旧尾部不影响结果）
const MAX_OBSERVATIONS: usize = 20;

// ==========================================
// PriceResolver - 价格解析引擎
// ==========================================
pub struct PriceResolver {
    catalog: Arc<CatalogRepository>,
    cascade: OnlineLookupCascade,
}

impl PriceResolver {
    pub fn new(catalog: Arc<CatalogRepository>, cascade: OnlineLookupCascade) -> Self {
        Self { catalog, cascade }
    }

    /// 解析物料单价
    ///
    /// # 流程
    /// 1. 模糊匹配目录物料
    /// 2. 取未过期观测,按来源优先级选出最高子集,组内均值 + 置信度
    /// 3. 目录无可用观测时走在线询价级联
    /// 4. 级联也未命中: 曾有观测（全过期）返回 expired,否则 no_data
    ///
    /// # 说明
    /// - NoData / Expired 是合法结果,不是错误; Err 只表示存储故障
    pub async fn resolve(&self, material_name: &str, unit: &str) -> RepositoryResult<ResolvedPrice> {
        let mut had_observations = false;

        if let Some(material) = self.catalog.find_material_fuzzy(material_name)? {
            let all = self
                .catalog
                .observations_for(&material.id, false, MAX_OBSERVATIONS)?;
            had_observations = !all.is_empty();

            let now = Utc::now();
            let fresh: Vec<PriceObservation> =
                all.into_iter().filter(|o| !o.is_expired(now)).collect();

            if !fresh.is_empty() {
                let resolved = Self::aggregate(&fresh);
                debug!(
                    material_name,
                    matched = %material.name_normalized,
                    source = %resolved.source.label(),
                    price = resolved.unit_price,
                    "目录观测解析命中"
                );
                return Ok(resolved);
            }
        }

        // 目录无可用观测,走在线级联
        match self.cascade.lookup(material_name, unit).await {
            Some(hit) => Ok(ResolvedPrice {
                unit_price: hit.unit_price,
                source: ResolvedSource::Online(hit.tier),
                detail: Some(hit.detail),
                confidence: round2(hit.confidence),
            }),
            None if had_observations => {
                debug!(material_name, "观测全部过期且在线刷新未命中");
                Ok(ResolvedPrice::expired())
            }
            None => Ok(ResolvedPrice::no_data()),
        }
    }

    /// 在未过期观测中聚合出解析结果
    ///
    /// 输入按 recorded_at 新→旧排序,且至少一条
    fn aggregate(fresh: &[PriceObservation]) -> ResolvedPrice {
        let top_priority = fresh
            .iter()
            .map(|o| o.source.priority())
            .max()
            .unwrap_or(0);

        let winners: Vec<&PriceObservation> = fresh
            .iter()
            .filter(|o| o.source.priority() == top_priority)
            .collect();

        let prices: Vec<f64> = winners.iter().map(|o| o.unit_price).collect();
        let mean = prices.iter().sum::<f64>() / prices.len() as f64;

        // 优先级是单射,胜出子集必然同源
        let source = winners[0].source;
        let latest = winners[0];
        let detail = latest
            .source_detail
            .clone()
            .or_else(|| latest.vendor_name.clone());

        ResolvedPrice {
            unit_price: round3(mean),
            source: ResolvedSource::Catalog(source),
            detail,
            confidence: confidence_score(&prices),
        }
    }
}

/// 观测子集的置信度
///
/// 基础分随样本数增长 (0.5 + 0.1×n),再按相对离散度
/// (总体标准差 / 均值) 打折,截断到 [0,1],保留两位小数
fn confidence_score(prices: &[f64]) -> f64 {
    if prices.is_empty() {
        return 0.0;
    }

    let n = prices.len() as f64;
    let mean = prices.iter().sum::<f64>() / n;
    let base = 0.5 + 0.1 * n;

    let spread = if mean > 0.0 {
        let variance = prices.iter().map(|p| (p - mean).powi(2)).sum::<f64>() / n;
        variance.sqrt() / mean
    } else {
        0.0
    };

    round2((base * (1.0 - spread)).clamp(0.0, 1.0))
}

/// 置信度保留两位小数
fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
