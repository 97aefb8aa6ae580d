// ==========================================
// 成本情报系统 - 在线询价级联
// ==========================================
// 职责: 按固定次序逐层询价,首个命中即短路
// 次序: 缓存 → 大宗商品行情 → 静态参考表 → 即时应答 → 搜索服务
// 红线: 单层失败绝不中断级联; 命中结果回写目录作为 ONLINE 观测
// ==========================================

use crate::config::config_manager::LookupCredentials;
use crate::domain::material::NewObservation;
use crate::domain::types::{LookupTierKind, PriceSource};
use crate::lookup::{
    CommodityFeedTier, InstantAnswerTier, LookupTier, SerpApiTier, SerperTier, StaticReferenceTier,
};
use crate::repository::catalog_repo::CatalogRepository;
use std::sync::Arc;
use tracing::{debug, info, warn};

// ==========================================
// CascadeHit - 级联命中结果
// ==========================================
#[derive(Debug, Clone)]
pub struct CascadeHit {
    pub unit_price: f64,
    /// 命中层级的静态置信度
    pub confidence: f64,
    /// 命中的层级类别
    pub tier: LookupTierKind,
    /// 来源细节（如 "commodity:Copper" / "static-reference:PVC fabric"）
    pub detail: String,
}

// ==========================================
// OnlineLookupCascade - 在线询价级联
// ==========================================
pub struct OnlineLookupCascade {
    catalog: Arc<CatalogRepository>,
    /// 外部询价层,按构造顺序尝试
    tiers: Vec<Box<dyn LookupTier>>,
    /// 回写 ONLINE 观测的 TTL（小时）
    ttl_hours: i64,
}

impl OnlineLookupCascade {
    pub fn new(
        catalog: Arc<CatalogRepository>,
        tiers: Vec<Box<dyn LookupTier>>,
        ttl_hours: i64,
    ) -> Self {
        Self {
            catalog,
            tiers,
            ttl_hours,
        }
    }

    /// 按凭据构建标准层级次序
    ///
    /// 未配置密钥的层级照常入链,由 is_available 在运行时跳过
    pub fn from_credentials(
        catalog: Arc<CatalogRepository>,
        credentials: &LookupCredentials,
        ttl_hours: i64,
    ) -> Self {
        let tiers: Vec<Box<dyn LookupTier>> = vec![
            Box::new(CommodityFeedTier::new(
                credentials.metalprices_api_key.clone(),
            )),
            Box::new(StaticReferenceTier::new()),
            Box::new(InstantAnswerTier::new()),
            Box::new(SerpApiTier::new(credentials.serpapi_key.clone())),
            Box::new(SerperTier::new(credentials.serper_api_key.clone())),
        ];
        Self::new(catalog, tiers, ttl_hours)
    }

    /// 级联询价
    ///
    /// # 说明
    /// - 缓存命中（未过期 ONLINE 观测）直接短路,不触发外部请求
    /// - 外部层命中后回写目录; 回写失败只告警,不影响返回值
    /// - 全层未命中返回 None（合法结果）
    pub async fn lookup(&self, material_name: &str, unit: &str) -> Option<CascadeHit> {
        if let Some(hit) = self.try_cache(material_name) {
            return Some(hit);
        }

        for tier in &self.tiers {
            if !tier.is_available() {
                debug!(tier = tier.name(), "询价层未配置凭据,跳过");
                continue;
            }

            match tier.lookup(material_name, unit).await {
                Ok(Some(quote)) => {
                    info!(
                        material_name,
                        tier = tier.name(),
                        price = quote.unit_price,
                        "在线询价命中"
                    );
                    self.cache_quote(
                        material_name,
                        unit,
                        quote.unit_price,
                        quote.confidence,
                        &quote.detail,
                    );
                    return Some(CascadeHit {
                        unit_price: quote.unit_price,
                        confidence: quote.confidence,
                        tier: tier.kind(),
                        detail: quote.detail,
                    });
                }
                Ok(None) => {
                    debug!(material_name, tier = tier.name(), "询价层未命中");
                }
                Err(e) => {
                    // 单层失败只告警,级联继续
                    warn!(material_name, tier = tier.name(), error = %e, "询价层失败");
                }
            }
        }

        debug!(material_name, "在线询价级联穷尽,无数据");
        None
    }

    /// 缓存层: 目录内未过期的 ONLINE 观测
    fn try_cache(&self, material_name: &str) -> Option<CascadeHit> {
        let material = match self.catalog.find_material_exact(material_name) {
            Ok(found) => found?,
            Err(e) => {
                warn!(material_name, error = %e, "缓存层查询物料失败");
                return None;
            }
        };

        match self.catalog.latest_online_unexpired(&material.id) {
            Ok(Some(observation)) => {
                debug!(material_name, price = observation.unit_price, "缓存命中");
                Some(CascadeHit {
                    unit_price: observation.unit_price,
                    confidence: observation.confidence,
                    tier: LookupTierKind::CachedOnline,
                    detail: observation
                        .source_detail
                        .unwrap_or_else(|| "cached".to_string()),
                })
            }
            Ok(None) => None,
            Err(e) => {
                warn!(material_name, error = %e, "缓存层读取观测失败");
                None
            }
        }
    }

    /// 命中结果回写目录（惰性建物料 + ONLINE 观测,失败只告警）
    fn cache_quote(
        &self,
        material_name: &str,
        unit: &str,
        unit_price: f64,
        confidence: f64,
        detail: &str,
    ) {
        let material = match self.catalog.get_or_create_material(material_name, unit, None) {
            Ok(material) => material,
            Err(e) => {
                warn!(material_name, error = %e, "询价回写: 物料创建失败");
                return;
            }
        };

        let result = self.catalog.add_observation(NewObservation {
            material_id: material.id,
            source: PriceSource::Online,
            unit_price,
            vendor_name: None,
            source_ref: None,
            source_detail: Some(detail.to_string()),
            confidence,
            ttl_hours: Some(self.ttl_hours),
        });

        if let Err(e) = result {
            warn!(material_name, error = %e, "询价回写: 观测写入失败");
        }
    }
}
