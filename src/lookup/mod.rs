// ==========================================
// 成本情报系统 - 在线询价层
// ==========================================
// 设计: 有序的"能力检查"策略链
// - 未配置凭据的层级报告自身不可用(不是失败),级联直接跳过
// - 网络/凭据/响应异常只算该层未命中,绝不中断级联
// ==========================================

pub mod commodity;
pub mod reference_table;
pub mod web_search;

pub use commodity::CommodityFeedTier;
pub use reference_table::StaticReferenceTier;
pub use web_search::{InstantAnswerTier, SerpApiTier, SerperTier};

use crate::domain::types::LookupTierKind;
use async_trait::async_trait;
use thiserror::Error;

/// 询价层错误类型
///
/// 级联捕获后记录告警并继续下一层,不向上传播
#[derive(Error, Debug)]
pub enum LookupError {
    #[error("HTTP 请求失败: {0}")]
    Http(#[from] reqwest::Error),

    #[error("响应格式异常: {0}")]
    MalformedResponse(String),
}

/// Result 类型别名
pub type LookupResult<T> = Result<T, LookupError>;

// ==========================================
// TierQuote - 层级报价
// ==========================================
/// 单层询价命中结果
#[derive(Debug, Clone)]
pub struct TierQuote {
    /// 单价（固定报价币种 OMR）
    pub unit_price: f64,
    /// 该层的静态置信度
    pub confidence: f64,
    /// 来源细节（如 "commodity:Copper" / "serpapi"）
    pub detail: String,
    /// 命中片段（诊断用,截断）
    pub raw: Option<String>,
}

// ==========================================
// LookupTier - 询价层级 trait
// ==========================================
/// 在线询价级联中的单个层级
///
/// # 约定
/// - Ok(None): 本层无数据（合法结果,级联继续）
/// - Err: 本层失败（级联记录告警后继续）
#[async_trait]
pub trait LookupTier: Send + Sync {
    /// 层级类别（下游按枚举分支,不做字符串匹配）
    fn kind(&self) -> LookupTierKind;

    /// 层级名称（日志用）
    fn name(&self) -> &str;

    /// 是否可用（未配置凭据时返回 false,级联跳过本层）
    fn is_available(&self) -> bool {
        true
    }

    /// 询价
    async fn lookup(&self, material_name: &str, unit: &str) -> LookupResult<Option<TierQuote>>;
}

/// 价格保留 3 位小数（OMR 常用精度）
pub(crate) fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}
