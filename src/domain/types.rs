// ==========================================
// 成本情报系统 - 领域类型定义
// ==========================================
// 红线: 价格来源是"信任等级制",不是评分制
// 序列化格式: SCREAMING_SNAKE_CASE (与数据库一致)
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 价格来源 (Price Source)
// ==========================================
// 信任排序: MANUAL > VENDOR_PO > COST_SHEET > ONLINE
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PriceSource {
    Manual,    // 人工录入
    VendorPo,  // 采购订单提取
    CostSheet, // 历史成本表提取
    Online,    // 在线询价级联
}

impl PriceSource {
    /// 来源优先级（越大越可信）
    ///
    /// 解析时先按优先级选出最高来源子集,再在子集内求均值——
    /// 单条 MANUAL 永远压过任意数量的 ONLINE 观测
    pub fn priority(&self) -> u8 {
        match self {
            PriceSource::Manual => 4,
            PriceSource::VendorPo => 3,
            PriceSource::CostSheet => 2,
            PriceSource::Online => 1,
        }
    }

    /// 从数据库字符串解析（未知值返回 None）
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "MANUAL" => Some(PriceSource::Manual),
            "VENDOR_PO" => Some(PriceSource::VendorPo),
            "COST_SHEET" => Some(PriceSource::CostSheet),
            "ONLINE" => Some(PriceSource::Online),
            _ => None,
        }
    }
}

impl fmt::Display for PriceSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PriceSource::Manual => write!(f, "MANUAL"),
            PriceSource::VendorPo => write!(f, "VENDOR_PO"),
            PriceSource::CostSheet => write!(f, "COST_SHEET"),
            PriceSource::Online => write!(f, "ONLINE"),
        }
    }
}

// ==========================================
// 询价层级 (Lookup Tier)
// ==========================================
// 级联按此顺序逐层尝试,首个命中即短路
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LookupTierKind {
    CachedOnline,   // 未过期的 ONLINE 缓存观测
    CommodityFeed,  // 大宗商品行情（金属现货）
    ReferenceTable, // 静态参考价格表
    InstantAnswer,  // 免费即时应答搜索（无需密钥）
    SearchProvider, // 配置密钥的搜索服务
}

impl fmt::Display for LookupTierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LookupTierKind::CachedOnline => write!(f, "CACHED_ONLINE"),
            LookupTierKind::CommodityFeed => write!(f, "COMMODITY_FEED"),
            LookupTierKind::ReferenceTable => write!(f, "REFERENCE_TABLE"),
            LookupTierKind::InstantAnswer => write!(f, "INSTANT_ANSWER"),
            LookupTierKind::SearchProvider => write!(f, "SEARCH_PROVIDER"),
        }
    }
}

// ==========================================
// 解析来源标签 (Resolved Source)
// ==========================================
// 结构化标签,替代自由字符串,下游按枚举分支而非字符串匹配
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResolvedSource {
    /// 命中目录内观测（携带胜出的来源等级）
    Catalog(PriceSource),
    /// 命中在线询价级联（携带命中的层级）
    Online(LookupTierKind),
    /// 所有渠道穷尽仍无数据（合法结果,非错误）
    NoData,
    /// 目录内观测全部过期且在线刷新失败
    Expired,
}

impl ResolvedSource {
    /// 估算明细行与文档渲染使用的展示标签
    ///
    /// 在线命中统一展示为 "ONLINE",层级细节另存于 source_detail
    pub fn label(&self) -> String {
        match self {
            ResolvedSource::Catalog(source) => source.to_string(),
            ResolvedSource::Online(_) => "ONLINE".to_string(),
            ResolvedSource::NoData => "none".to_string(),
            ResolvedSource::Expired => "expired".to_string(),
        }
    }

    /// 是否为"无数据"结果（零置信度,下游可视化区分弱数据）
    pub fn is_no_data(&self) -> bool {
        matches!(self, ResolvedSource::NoData | ResolvedSource::Expired)
    }
}

// ==========================================
// 解析结果 (Resolved Price)
// ==========================================
/// resolve_price 的输出: 单价 + 结构化来源 + 置信度
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvedPrice {
    pub unit_price: f64,
    pub source: ResolvedSource,
    /// 来源细节（如 "commodity:Aluminium:static" / "serpapi"）
    pub detail: Option<String>,
    /// [0,1] 置信度,保留两位小数
    pub confidence: f64,
}

impl ResolvedPrice {
    /// 无数据结果
    pub fn no_data() -> Self {
        Self {
            unit_price: 0.0,
            source: ResolvedSource::NoData,
            detail: None,
            confidence: 0.0,
        }
    }

    /// 全部过期结果
    pub fn expired() -> Self {
        Self {
            unit_price: 0.0,
            source: ResolvedSource::Expired,
            detail: None,
            confidence: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_priority_ordering() {
        assert!(PriceSource::Manual.priority() > PriceSource::VendorPo.priority());
        assert!(PriceSource::VendorPo.priority() > PriceSource::CostSheet.priority());
        assert!(PriceSource::CostSheet.priority() > PriceSource::Online.priority());
    }

    #[test]
    fn test_source_parse_roundtrip() {
        for source in [
            PriceSource::Manual,
            PriceSource::VendorPo,
            PriceSource::CostSheet,
            PriceSource::Online,
        ] {
            assert_eq!(PriceSource::parse(&source.to_string()), Some(source));
        }
        assert_eq!(PriceSource::parse("UNKNOWN"), None);
    }

    #[test]
    fn test_resolved_source_label() {
        assert_eq!(
            ResolvedSource::Catalog(PriceSource::VendorPo).label(),
            "VENDOR_PO"
        );
        assert_eq!(
            ResolvedSource::Online(LookupTierKind::CommodityFeed).label(),
            "ONLINE"
        );
        assert_eq!(ResolvedSource::NoData.label(), "none");
        assert_eq!(ResolvedSource::Expired.label(), "expired");
    }
}
