// ==========================================
// 成本情报系统 - 静态参考价格表层
// ==========================================
// 职责: 活动搭建/制作行业常见物料的人工维护参考价
// 匹配: 最长关键词子串命中优先,等长取表序靠前者（确定性）
// 说明: 表规模在几十条量级,线性扫描即可,无需前缀树
// ==========================================

use crate::domain::types::LookupTierKind;
use crate::lookup::{LookupResult, LookupTier, TierQuote};
use async_trait::async_trait;
use tracing::debug;

/// 参考价条目
struct ReferenceEntry {
    /// 任一关键词命中即可,取最长命中者参与全表比较
    keywords: &'static [&'static str],
    label: &'static str,
    unit_price: f64,
    unit: &'static str,
    confidence: f64,
}

/// 人工维护的参考价表（OMR,本地市场粗估）
const REFERENCE_TABLE: &[ReferenceEntry] = &[
    ReferenceEntry {
        keywords: &["pvc fabric", "flex banner", "510gsm"],
        label: "PVC fabric",
        unit_price: 1.85,
        unit: "sqm",
        confidence: 0.75,
    },
    ReferenceEntry {
        keywords: &["mesh fabric", "mesh banner"],
        label: "Mesh banner",
        unit_price: 2.1,
        unit: "sqm",
        confidence: 0.7,
    },
    ReferenceEntry {
        keywords: &["mdf board", "mdf"],
        label: "MDF board",
        unit_price: 4.5,
        unit: "sheet",
        confidence: 0.7,
    },
    ReferenceEntry {
        keywords: &["plywood"],
        label: "Plywood",
        unit_price: 6.8,
        unit: "sheet",
        confidence: 0.7,
    },
    ReferenceEntry {
        keywords: &["acrylic", "plexiglass"],
        label: "Acrylic sheet",
        unit_price: 12.0,
        unit: "sqm",
        confidence: 0.65,
    },
    ReferenceEntry {
        keywords: &["vinyl sticker", "vinyl print", "self adhesive vinyl"],
        label: "Vinyl print",
        unit_price: 2.4,
        unit: "sqm",
        confidence: 0.7,
    },
    ReferenceEntry {
        keywords: &["uv print", "uv printing"],
        label: "UV printing",
        unit_price: 3.5,
        unit: "sqm",
        confidence: 0.65,
    },
    ReferenceEntry {
        keywords: &["led screen", "led wall"],
        label: "LED screen",
        unit_price: 55.0,
        unit: "sqm",
        confidence: 0.55,
    },
    ReferenceEntry {
        keywords: &["led par", "par light", "spotlight"],
        label: "Stage light",
        unit_price: 8.5,
        unit: "piece",
        confidence: 0.6,
    },
    ReferenceEntry {
        keywords: &["truss"],
        label: "Truss",
        unit_price: 9.0,
        unit: "metre",
        confidence: 0.65,
    },
    ReferenceEntry {
        keywords: &["carpet"],
        label: "Carpet",
        unit_price: 1.2,
        unit: "sqm",
        confidence: 0.7,
    },
    ReferenceEntry {
        keywords: &["paint", "emulsion"],
        label: "Paint",
        unit_price: 3.2,
        unit: "litre",
        confidence: 0.6,
    },
    ReferenceEntry {
        keywords: &["labour", "manpower", "technician"],
        label: "Labour",
        unit_price: 2.5,
        unit: "hour",
        confidence: 0.65,
    },
    ReferenceEntry {
        keywords: &["forklift"],
        label: "Forklift rental",
        unit_price: 45.0,
        unit: "day",
        confidence: 0.6,
    },
    ReferenceEntry {
        keywords: &["generator"],
        label: "Generator rental",
        unit_price: 60.0,
        unit: "day",
        confidence: 0.6,
    },
    ReferenceEntry {
        keywords: &["scaffolding"],
        label: "Scaffolding",
        unit_price: 3.0,
        unit: "sqm",
        confidence: 0.55,
    },
    ReferenceEntry {
        keywords: &["nylon rope", "rope"],
        label: "Rope",
        unit_price: 0.6,
        unit: "metre",
        confidence: 0.5,
    },
];

// ==========================================
// StaticReferenceTier - 静态参考价格表层
// ==========================================
pub struct StaticReferenceTier;

impl StaticReferenceTier {
    pub fn new() -> Self {
        Self
    }

    /// 最长关键词匹配
    ///
    /// 返回 (条目, 命中关键词); 等长命中取表序靠前者
    fn best_match(material_name: &str) -> Option<(&'static ReferenceEntry, &'static str)> {
        let lower = material_name.to_lowercase();
        let mut best: Option<(&ReferenceEntry, &str)> = None;

        for entry in REFERENCE_TABLE {
            for keyword in entry.keywords {
                if lower.contains(keyword) {
                    let longer = match best {
                        Some((_, current)) => keyword.len() > current.len(),
                        None => true,
                    };
                    if longer {
                        best = Some((entry, keyword));
                    }
                }
            }
        }
        best
    }
}

impl Default for StaticReferenceTier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LookupTier for StaticReferenceTier {
    fn kind(&self) -> LookupTierKind {
        LookupTierKind::ReferenceTable
    }

    fn name(&self) -> &str {
        "static-reference"
    }

    async fn lookup(&self, material_name: &str, _unit: &str) -> LookupResult<Option<TierQuote>> {
        let Some((entry, keyword)) = Self::best_match(material_name) else {
            return Ok(None);
        };

        debug!(material_name, keyword, label = entry.label, "参考价表命中");
        Ok(Some(TierQuote {
            unit_price: entry.unit_price,
            confidence: entry.confidence,
            detail: format!("static-reference:{}", entry.label),
            raw: Some(format!("{} ({}/{})", entry.label, entry.unit_price, entry.unit)),
        }))
    }
}
