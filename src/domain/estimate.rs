// ==========================================
// 成本情报系统 - 成本估算领域模型
// ==========================================
// 红线: 估算创建后成本字段不可变,售价/毛利率可后续更新
// ==========================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ==========================================
// BomLine - 物料清单行
// ==========================================
/// 估算输入行（物料名 + 数量 + 单位）,不独立持久化
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BomLine {
    pub material_name: String,
    pub quantity: f64, // 正实数（非正值在管道入口被过滤）
    pub unit: String,
}

// ==========================================
// CostEstimateInput - 估算创建请求
// ==========================================
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CostEstimateInput {
    pub title: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub client_name: Option<String>,
    /// 缺省时由外部 BOM 拆解协作方从 description 推断
    pub bom_lines: Option<Vec<BomLine>>,
    pub selling_price: Option<f64>,
}

// ==========================================
// EstimateLine - 估算明细行
// ==========================================
/// 已解析定价的 BOM 行（随估算一次性持久化）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EstimateLine {
    pub id: String,
    pub estimate_id: String,
    pub line_no: i32, // 行序（保持输入顺序）
    pub material_name: String,
    pub quantity: f64,
    pub unit: String,
    pub unit_price: f64,
    pub line_total: f64, // unit_price × quantity
    /// 来源展示标签（MANUAL/VENDOR_PO/COST_SHEET/ONLINE/none/expired）
    pub source: String,
    pub source_detail: Option<String>,
    pub confidence: f64,
}

// ==========================================
// CostEstimate - 成本估算
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostEstimate {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub client_name: Option<String>,

    // ===== 成本字段（创建后不可变）=====
    pub material_cost: f64,
    pub labour_cost: f64,   // 配置的固定人工费率（非按行）
    pub overhead_cost: f64, // (material + labour) × overhead_percent
    pub total_cost_price: f64,

    // ===== 商业字段（可后续更新）=====
    pub selling_price: Option<f64>,
    /// 毛利率百分比,保留 1 位小数; 无售价或成本为 0 时为 None
    pub margin: Option<f64>,

    /// 0-100 整数,各行置信度均值 × 100 四舍五入
    pub confidence_score: i32,

    pub lines: Vec<EstimateLine>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ==========================================
// EstimateSummary - 估算列表视图
// ==========================================
/// 列表/看板接口输出（不含明细行,附行计数）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EstimateSummary {
    pub id: String,
    pub title: String,
    pub category: Option<String>,
    pub client_name: Option<String>,
    pub total_cost_price: f64,
    pub selling_price: Option<f64>,
    pub margin: Option<f64>,
    pub confidence_score: i32,
    pub line_count: i64,
    pub created_at: DateTime<Utc>,
}

// ==========================================
// 毛利率看板
// ==========================================

/// 看板过滤条件
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MarginFilters {
    /// 分类子串过滤（大小写不敏感）
    pub category: Option<String>,
    pub min_margin: Option<f64>,
    pub max_margin: Option<f64>,
}

/// 看板条目: 估算 + 风险标注
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarginEntry {
    #[serde(flatten)]
    pub estimate: EstimateSummary,
    /// margin 非空 且 低于目标毛利率
    pub at_risk: bool,
    pub target_margin: f64,
}

/// 看板汇总
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarginSummary {
    pub total: usize,
    pub at_risk: usize,
    /// 有毛利率定义的估算的均值（无则为 0）
    pub avg_margin: f64,
    pub target_margin: f64,
}

/// 毛利率看板输出
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarginDashboard {
    pub estimates: Vec<MarginEntry>,
    pub summary: MarginSummary,
}
