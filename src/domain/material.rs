// ==========================================
// 成本情报系统 - 物料领域模型
// ==========================================
// 红线: 价格观测只追加,不修改（新观测覆盖旧观测,而非编辑）
// 用途: 目录仓储写入,解析引擎只读
// ==========================================

use crate::domain::types::PriceSource;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ==========================================
// Material - 物料主数据
// ==========================================
// 生命周期: 首次出现观测时惰性创建（规范化名称去重）,本子系统从不删除
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Material {
    // ===== 主键 =====
    pub id: String, // UUID

    // ===== 基础信息 =====
    pub name: String,            // 物料名称（自由文本）
    pub name_normalized: String, // 规范化名称（trim + 小写,唯一索引）
    pub unit: String,            // 计量单位（sqm/kg/piece/hour/day/litre/metre/roll/set）
    pub category: Option<String>, // 可选分类标签

    // ===== 审计字段 =====
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Material {
    /// 规范化物料名称（get-or-create 与模糊查询共用同一口径）
    pub fn normalize_name(name: &str) -> String {
        name.trim().to_lowercase()
    }
}

// ==========================================
// PriceObservation - 价格观测
// ==========================================
// 红线: 创建后不可变,由更新的观测取代
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceObservation {
    pub id: String,
    pub material_id: String,

    // ===== 价格信息 =====
    pub source: PriceSource,  // 信任等级来源
    pub unit_price: f64,      // 单价（非负,固定报价币种）
    pub currency: String,     // 币种（固定 OMR）
    pub confidence: f64,      // [0,1] 置信度

    // ===== 溯源信息 =====
    pub vendor_name: Option<String>, // 供应商名称
    pub source_ref: Option<String>,  // 源记录标识（幂等去重键,如 "PO:1024:item:7"）
    pub source_detail: Option<String>, // 在线来源细节（如 "commodity:Copper"）

    // ===== 时间信息 =====
    pub recorded_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>, // 仅 ONLINE 观测正常携带
}

impl PriceObservation {
    /// 观测是否已过期（expires_at 为空视为永不过期）
    ///
    /// 红线: 已过期观测绝不能被解析引擎选中
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expires_at) => expires_at <= now,
            None => false,
        }
    }
}

// ==========================================
// NewObservation - 观测写入参数
// ==========================================
/// add_observation 的输入（id / recorded_at / expires_at 由仓储生成）
#[derive(Debug, Clone)]
pub struct NewObservation {
    pub material_id: String,
    pub source: PriceSource,
    pub unit_price: f64,
    pub vendor_name: Option<String>,
    pub source_ref: Option<String>,
    pub source_detail: Option<String>,
    pub confidence: f64,
    /// TTL 小时数（None 则按来源默认: ONLINE=24h,其余不过期）
    pub ttl_hours: Option<i64>,
}

// ==========================================
// MaterialSummary - 目录浏览视图
// ==========================================
/// 物料 + 最近价格 + 观测计数（目录浏览/搜索接口输出）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaterialSummary {
    pub material: Material,
    /// 最近 3 条观测（新→旧）
    pub latest_prices: Vec<PriceObservation>,
    pub observation_count: i64,
}

// ==========================================
// 批量提取（采购订单 / 历史成本表）
// ==========================================

/// 批量提取输入行
///
/// 提取作业本身在系统边界外,以 {描述, 单价, 供应商, 源记录标识} 元组喂入
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestRow {
    pub description: String,
    pub unit_price: f64,
    pub vendor_name: Option<String>,
    /// 幂等键: 同一 source_ref 重复喂入不会产生重复观测
    pub source_ref: String,
}

/// 批量提取结果汇总
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestSummary {
    pub lines_processed: usize,
    pub materials_created: usize,
    pub observations_inserted: usize,
    pub skipped: usize,
    /// 单行失败只记录,不中断整批
    pub errors: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_normalize_name() {
        assert_eq!(
            Material::normalize_name("  PVC Fabric 510gsm "),
            "pvc fabric 510gsm"
        );
    }

    #[test]
    fn test_observation_expiry() {
        let now = Utc::now();
        let make = |expires_at| PriceObservation {
            id: "obs-1".to_string(),
            material_id: "mat-1".to_string(),
            source: PriceSource::Online,
            unit_price: 1.0,
            currency: "OMR".to_string(),
            confidence: 0.6,
            vendor_name: None,
            source_ref: None,
            source_detail: None,
            recorded_at: now,
            expires_at,
        };

        assert!(!make(None).is_expired(now));
        assert!(!make(Some(now + Duration::hours(1))).is_expired(now));
        assert!(make(Some(now - Duration::hours(1))).is_expired(now));
    }
}
