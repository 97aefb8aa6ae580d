// ==========================================
// 成本情报系统 - 大宗商品行情层
// ==========================================
// 职责: 识别金属类物料关键词,查询现货行情并折算为 OMR/kg
// 折算链: USD/金衡盎司 → USD/公吨 → OMR/kg
// 降级: 行情或汇率不可达时使用静态近似价（置信度降档）
// ==========================================

use crate::domain::types::LookupTierKind;
use crate::lookup::{round3, LookupResult, LookupTier, TierQuote};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, warn};

/// 现货行情端点（免密钥,基础金属）
const SPOT_FEED_URL: &str = "https://api.metals.live/v1/spot";

/// 汇率端点（需密钥,缺省时用固定汇率）
const FX_FEED_URL: &str = "https://api.metalpriceapi.com/v1/latest";

/// 1 公吨 = 32,150.75 金衡盎司
const TROY_OUNCES_PER_TONNE: f64 = 32_150.75;

/// USD → OMR 固定兜底汇率（里亚尔钉住美元,波动极小）
const FALLBACK_USD_TO_OMR: f64 = 0.385;

/// 行情请求超时
const SPOT_TIMEOUT: Duration = Duration::from_secs(6);
const FX_TIMEOUT: Duration = Duration::from_secs(8);

/// 金属关键词 → (行情代码, 展示标签)
///
/// 命中即绕过搜索层,直连行情获得更高精度
const COMMODITY_KEYWORDS: &[(&str, &str, &str)] = &[
    ("aluminium", "aluminium", "Aluminium"),
    ("aluminum", "aluminium", "Aluminium"),
    ("copper", "copper", "Copper"),
    ("steel", "steel", "Steel"),
    ("iron", "steel", "Steel"),
    ("zinc", "zinc", "Zinc"),
    ("nickel", "nickel", "Nickel"),
    ("lead", "lead", "Lead"),
    ("tin", "tin", "Tin"),
];

/// 静态近似价（OMR/kg,市场价粗估,行情不可达时兜底）
const STATIC_RATES: &[(&str, f64)] = &[
    ("aluminium", 0.99), // ~USD 2570/吨
    ("copper", 3.68),    // ~USD 9570/吨
    ("steel", 0.29),     // ~USD 760/吨
    ("zinc", 1.14),      // ~USD 2970/吨
    ("nickel", 5.62),    // ~USD 14620/吨
    ("lead", 0.74),      // ~USD 1920/吨
    ("tin", 12.3),       // ~USD 32000/吨
];

/// 实时行情命中的置信度
const LIVE_CONFIDENCE: f64 = 0.75;
/// 静态近似价的置信度
const STATIC_CONFIDENCE: f64 = 0.5;

// ==========================================
// CommodityFeedTier - 大宗商品行情层
// ==========================================
pub struct CommodityFeedTier {
    client: Client,
    /// 汇率 API 密钥（缺省时实时路径仍可用,汇率用固定兜底值）
    fx_api_key: Option<String>,
}

impl CommodityFeedTier {
    pub fn new(fx_api_key: Option<String>) -> Self {
        let client = Client::builder()
            .timeout(FX_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { client, fx_api_key }
    }

    /// 识别物料名中的金属关键词
    fn match_commodity(material_name: &str) -> Option<(&'static str, &'static str)> {
        let lower = material_name.to_lowercase();
        COMMODITY_KEYWORDS
            .iter()
            .find(|(keyword, _, _)| lower.contains(keyword))
            .map(|(_, metal, label)| (*metal, *label))
    }

    /// 实时路径: 现货价（USD/金衡盎司）× 汇率 → OMR/kg
    async fn try_live(&self, metal: &str) -> LookupResult<Option<f64>> {
        let Some(usd_per_tonne) = self.fetch_spot_usd_per_tonne(metal).await? else {
            return Ok(None);
        };
        let usd_to_omr = self.fetch_usd_to_omr().await;
        Ok(Some(round3(usd_per_tonne / 1000.0 * usd_to_omr)))
    }

    /// 查询现货行情（返回 USD/公吨）
    async fn fetch_spot_usd_per_tonne(&self, metal: &str) -> LookupResult<Option<f64>> {
        let response = self
            .client
            .get(SPOT_FEED_URL)
            .timeout(SPOT_TIMEOUT)
            .send()
            .await?
            .error_for_status()?;

        // 响应形如 [{"gold": 1234.5}, {"copper": 4.1}, ...]
        let data: serde_json::Value = response.json().await?;
        let entries = data.as_array().cloned().unwrap_or_default();

        for entry in entries {
            let Some(object) = entry.as_object() else {
                continue;
            };
            let Some((key, value)) = object.iter().next() else {
                continue;
            };
            if key.to_lowercase() == metal {
                let usd_per_troy_oz = value.as_f64().unwrap_or(0.0);
                if usd_per_troy_oz > 0.0 {
                    return Ok(Some(usd_per_troy_oz * TROY_OUNCES_PER_TONNE));
                }
            }
        }
        Ok(None)
    }

    /// 查询 USD → OMR 汇率（未配置密钥或查询失败时用固定兜底值）
    async fn fetch_usd_to_omr(&self) -> f64 {
        let Some(ref api_key) = self.fx_api_key else {
            return FALLBACK_USD_TO_OMR;
        };

        let result = self
            .client
            .get(FX_FEED_URL)
            .query(&[
                ("api_key", api_key.as_str()),
                ("base", "USD"),
                ("currencies", "OMR"),
            ])
            .send()
            .await;

        match result {
            Ok(response) => match response.json::<serde_json::Value>().await {
                Ok(data) => data
                    .pointer("/rates/OMR")
                    .and_then(|v| v.as_f64())
                    .unwrap_or(FALLBACK_USD_TO_OMR),
                Err(e) => {
                    warn!(error = %e, "汇率响应解析失败,使用固定汇率");
                    FALLBACK_USD_TO_OMR
                }
            },
            Err(e) => {
                warn!(error = %e, "汇率查询失败,使用固定汇率");
                FALLBACK_USD_TO_OMR
            }
        }
    }

    /// 静态近似价兜底
    fn static_fallback(metal: &str, label: &str) -> Option<TierQuote> {
        STATIC_RATES
            .iter()
            .find(|(key, _)| *key == metal)
            .map(|(_, rate)| TierQuote {
                unit_price: *rate,
                confidence: STATIC_CONFIDENCE,
                detail: format!("commodity:{}:static", label),
                raw: Some(format!("Static estimate for {}", label)),
            })
    }
}

#[async_trait]
impl LookupTier for CommodityFeedTier {
    fn kind(&self) -> LookupTierKind {
        LookupTierKind::CommodityFeed
    }

    fn name(&self) -> &str {
        "commodity-feed"
    }

    async fn lookup(&self, material_name: &str, _unit: &str) -> LookupResult<Option<TierQuote>> {
        let Some((metal, label)) = Self::match_commodity(material_name) else {
            return Ok(None);
        };

        // 实时路径失败只降级,不算本层失败
        match self.try_live(metal).await {
            Ok(Some(price)) => {
                debug!(material_name, metal, price, "大宗商品实时行情命中");
                return Ok(Some(TierQuote {
                    unit_price: price,
                    confidence: LIVE_CONFIDENCE,
                    detail: format!("commodity:{}", label),
                    raw: None,
                }));
            }
            Ok(None) => {
                debug!(material_name, metal, "行情无该金属条目,使用静态近似价");
            }
            Err(e) => {
                warn!(material_name, metal, error = %e, "行情查询失败,使用静态近似价");
            }
        }

        Ok(Self::static_fallback(metal, label))
    }
}
