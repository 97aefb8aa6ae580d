// ==========================================
// 成本情报系统 - 网络搜索询价层
// ==========================================
// 职责: 用搜索结果片段做价格抽取
// - InstantAnswerTier: 免密钥即时应答接口（DuckDuckGo）
// - SerpApiTier / SerperTier: 配置密钥的搜索服务,按固定次序回退
// 抽取: 货币金额正则扫描片段,取首个落在合理区间的数值
// ==========================================

use crate::domain::types::LookupTierKind;
use crate::lookup::{round3, LookupResult, LookupTier, TierQuote};
use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use std::sync::OnceLock;
use std::time::Duration;
use tracing::debug;

/// 即时应答请求超时
const INSTANT_ANSWER_TIMEOUT: Duration = Duration::from_secs(8);
/// 搜索服务请求超时
const SEARCH_TIMEOUT: Duration = Duration::from_secs(10);

/// 免密钥层置信度
const INSTANT_ANSWER_CONFIDENCE: f64 = 0.5;
/// 密钥搜索层置信度
const SEARCH_PROVIDER_CONFIDENCE: f64 = 0.55;

/// 抽取金额的合理区间上限（排除电话号/年份等噪声大数）
const MAX_SANE_PRICE: f64 = 50_000.0;

/// 货币金额正则: "OMR 1.250" / "1.25 OMR" / "RO 1.25"
fn price_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"(?i)(?:OMR|RO)\s*([0-9][0-9,]*(?:\.[0-9]+)?)|([0-9][0-9,]*(?:\.[0-9]+)?)\s*(?:OMR|RO)",
        )
        .expect("价格正则必须合法")
    })
}

/// 从文本片段抽取首个落在合理区间的 OMR 金额
pub fn extract_omr_amount(text: &str) -> Option<f64> {
    for captures in price_pattern().captures_iter(text) {
        let matched = captures
            .get(1)
            .or_else(|| captures.get(2))
            .map(|m| m.as_str())?;
        let cleaned = matched.replace(',', "");
        if let Ok(price) = cleaned.parse::<f64>() {
            if price > 0.0 && price < MAX_SANE_PRICE {
                return Some(round3(price));
            }
        }
    }
    None
}

/// 询价搜索词
fn search_query(material_name: &str) -> String {
    format!("{} price oman OMR per unit", material_name)
}

/// 片段截断（诊断字段,避免原文过长）
fn truncate_snippet(text: &str) -> String {
    text.chars().take(120).collect()
}

/// 在片段集合中扫描价格,返回 (价格, 命中片段)
fn scan_snippets<'a, I>(snippets: I) -> Option<(f64, String)>
where
    I: IntoIterator<Item = &'a str>,
{
    for snippet in snippets {
        if let Some(price) = extract_omr_amount(snippet) {
            return Some((price, truncate_snippet(snippet)));
        }
    }
    None
}

// ==========================================
// InstantAnswerTier - 免密钥即时应答层
// ==========================================
pub struct InstantAnswerTier {
    client: Client,
}

impl InstantAnswerTier {
    pub fn new() -> Self {
        let client = Client::builder()
            .timeout(INSTANT_ANSWER_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { client }
    }

    /// 从即时应答响应收集可扫描的文本片段
    fn collect_snippets(data: &serde_json::Value) -> Vec<String> {
        let mut snippets = Vec::new();

        for key in ["Answer", "AbstractText", "Definition"] {
            if let Some(text) = data.get(key).and_then(|v| v.as_str()) {
                if !text.is_empty() {
                    snippets.push(text.to_string());
                }
            }
        }

        // RelatedTopics 存在一层嵌套分组（{Topics: [...]}）
        if let Some(topics) = data.get("RelatedTopics").and_then(|v| v.as_array()) {
            for topic in topics {
                if let Some(text) = topic.get("Text").and_then(|v| v.as_str()) {
                    snippets.push(text.to_string());
                }
                if let Some(nested) = topic.get("Topics").and_then(|v| v.as_array()) {
                    for inner in nested {
                        if let Some(text) = inner.get("Text").and_then(|v| v.as_str()) {
                            snippets.push(text.to_string());
                        }
                    }
                }
            }
        }
        snippets
    }
}

impl Default for InstantAnswerTier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LookupTier for InstantAnswerTier {
    fn kind(&self) -> LookupTierKind {
        LookupTierKind::InstantAnswer
    }

    fn name(&self) -> &str {
        "duckduckgo"
    }

    async fn lookup(&self, material_name: &str, _unit: &str) -> LookupResult<Option<TierQuote>> {
        let response = self
            .client
            .get("https://api.duckduckgo.com/")
            .query(&[
                ("q", search_query(material_name).as_str()),
                ("format", "json"),
                ("no_html", "1"),
                ("skip_disambig", "1"),
            ])
            .send()
            .await?
            .error_for_status()?;

        let data: serde_json::Value = response.json().await?;
        let snippets = Self::collect_snippets(&data);

        match scan_snippets(snippets.iter().map(String::as_str)) {
            Some((price, raw)) => {
                debug!(material_name, price, "即时应答层命中");
                Ok(Some(TierQuote {
                    unit_price: price,
                    confidence: INSTANT_ANSWER_CONFIDENCE,
                    detail: "duckduckgo".to_string(),
                    raw: Some(raw),
                }))
            }
            None => Ok(None),
        }
    }
}

// ==========================================
// SerpApiTier - SerpAPI 搜索层
// ==========================================
pub struct SerpApiTier {
    client: Client,
    api_key: Option<String>,
}

impl SerpApiTier {
    pub fn new(api_key: Option<String>) -> Self {
        let client = Client::builder()
            .timeout(SEARCH_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { client, api_key }
    }

    /// organic_results 的 title + snippet 拼接为可扫描片段
    fn collect_snippets(data: &serde_json::Value) -> Vec<String> {
        data.get("organic_results")
            .and_then(|v| v.as_array())
            .map(|results| {
                results
                    .iter()
                    .map(|r| {
                        format!(
                            "{} {}",
                            r.get("title").and_then(|v| v.as_str()).unwrap_or(""),
                            r.get("snippet").and_then(|v| v.as_str()).unwrap_or(""),
                        )
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl LookupTier for SerpApiTier {
    fn kind(&self) -> LookupTierKind {
        LookupTierKind::SearchProvider
    }

    fn name(&self) -> &str {
        "serpapi"
    }

    fn is_available(&self) -> bool {
        self.api_key.is_some()
    }

    async fn lookup(&self, material_name: &str, _unit: &str) -> LookupResult<Option<TierQuote>> {
        let Some(ref api_key) = self.api_key else {
            return Ok(None);
        };

        let query = search_query(material_name);
        let response = self
            .client
            .get("https://serpapi.com/search")
            .query(&[
                ("engine", "google"),
                ("q", query.as_str()),
                ("api_key", api_key.as_str()),
                ("num", "5"),
                ("gl", "om"),
                ("hl", "en"),
            ])
            .send()
            .await?
            .error_for_status()?;

        let data: serde_json::Value = response.json().await?;
        let snippets = Self::collect_snippets(&data);

        match scan_snippets(snippets.iter().map(String::as_str)) {
            Some((price, raw)) => {
                debug!(material_name, price, "SerpAPI 搜索层命中");
                Ok(Some(TierQuote {
                    unit_price: price,
                    confidence: SEARCH_PROVIDER_CONFIDENCE,
                    detail: "serpapi".to_string(),
                    raw: Some(raw),
                }))
            }
            None => Ok(None),
        }
    }
}

// ==========================================
// SerperTier - Serper 搜索层
// ==========================================
pub struct SerperTier {
    client: Client,
    api_key: Option<String>,
}

impl SerperTier {
    pub fn new(api_key: Option<String>) -> Self {
        let client = Client::builder()
            .timeout(SEARCH_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { client, api_key }
    }

    fn collect_snippets(data: &serde_json::Value) -> Vec<String> {
        data.get("organic")
            .and_then(|v| v.as_array())
            .map(|results| {
                results
                    .iter()
                    .map(|r| {
                        format!(
                            "{} {}",
                            r.get("title").and_then(|v| v.as_str()).unwrap_or(""),
                            r.get("snippet").and_then(|v| v.as_str()).unwrap_or(""),
                        )
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl LookupTier for SerperTier {
    fn kind(&self) -> LookupTierKind {
        LookupTierKind::SearchProvider
    }

    fn name(&self) -> &str {
        "serper"
    }

    fn is_available(&self) -> bool {
        self.api_key.is_some()
    }

    async fn lookup(&self, material_name: &str, _unit: &str) -> LookupResult<Option<TierQuote>> {
        let Some(ref api_key) = self.api_key else {
            return Ok(None);
        };

        let response = self
            .client
            .post("https://google.serper.dev/search")
            .header("X-API-KEY", api_key)
            .json(&serde_json::json!({
                "q": search_query(material_name),
                "gl": "om",
            }))
            .send()
            .await?
            .error_for_status()?;

        let data: serde_json::Value = response.json().await?;
        let snippets = Self::collect_snippets(&data);

        match scan_snippets(snippets.iter().map(String::as_str)) {
            Some((price, raw)) => {
                debug!(material_name, price, "Serper 搜索层命中");
                Ok(Some(TierQuote {
                    unit_price: price,
                    confidence: SEARCH_PROVIDER_CONFIDENCE,
                    detail: "serper".to_string(),
                    raw: Some(raw),
                }))
            }
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_prefix_and_suffix_forms() {
        assert_eq!(extract_omr_amount("PVC sheet OMR 1.250 per sqm"), Some(1.25));
        assert_eq!(extract_omr_amount("costs 2.4 OMR in Muscat"), Some(2.4));
        assert_eq!(extract_omr_amount("price RO 12.5 delivered"), Some(12.5));
    }

    #[test]
    fn test_extract_with_thousands_separator() {
        assert_eq!(extract_omr_amount("quoted OMR 1,250.75 total"), Some(1250.75));
    }

    #[test]
    fn test_extract_rejects_out_of_range() {
        // 超出合理区间的大数被跳过,继续扫描后续匹配
        assert_eq!(
            extract_omr_amount("OMR 99,999,999 is nonsense but OMR 3.2 is real"),
            Some(3.2)
        );
        assert_eq!(extract_omr_amount("no currency amounts here"), None);
    }

    #[test]
    fn test_unavailable_without_key() {
        assert!(!SerpApiTier::new(None).is_available());
        assert!(SerpApiTier::new(Some("key".to_string())).is_available());
        assert!(!SerperTier::new(None).is_available());
    }
}
