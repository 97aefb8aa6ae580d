// ==========================================
// 成本情报系统 - 价格目录 API
// ==========================================
// 职责: 人工价格录入 / 批量提取 / 目录浏览的对外接口
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::domain::material::{
    IngestRow, IngestSummary, MaterialSummary, NewObservation, PriceObservation,
};
use crate::domain::types::PriceSource;
use crate::repository::catalog_repo::CatalogRepository;
use std::sync::Arc;
use tracing::{info, warn};

/// VENDOR_PO 提取观测的置信度
const VENDOR_PO_CONFIDENCE: f64 = 0.9;
/// COST_SHEET 提取观测的置信度
const COST_SHEET_CONFIDENCE: f64 = 0.8;
/// 人工录入默认置信度
const MANUAL_DEFAULT_CONFIDENCE: f64 = 1.0;

// ==========================================
// ManualPriceOptions - 人工录入可选参数
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct ManualPriceOptions {
    pub vendor_name: Option<String>,
    pub category: Option<String>,
    /// 缺省 1.0（人工录入视为最可信）
    pub confidence: Option<f64>,
    /// 人工价默认不过期,显式给定时按小时计算 expires_at
    pub ttl_hours: Option<i64>,
}

// ==========================================
// CatalogApi - 价格目录 API
// ==========================================
pub struct CatalogApi {
    catalog: Arc<CatalogRepository>,
}

impl CatalogApi {
    pub fn new(catalog: Arc<CatalogRepository>) -> Self {
        Self { catalog }
    }

    /// 人工录入价格（MANUAL 观测,不过期）
    pub fn add_manual_price(
        &self,
        material_name: &str,
        unit: &str,
        unit_price: f64,
        options: ManualPriceOptions,
    ) -> ApiResult<PriceObservation> {
        if material_name.trim().is_empty() {
            return Err(ApiError::InvalidInput("物料名称不能为空".to_string()));
        }
        if unit_price <= 0.0 {
            return Err(ApiError::InvalidInput("单价必须为正数".to_string()));
        }

        let material = self.catalog.get_or_create_material(
            material_name,
            unit,
            options.category.as_deref(),
        )?;

        let observation = self.catalog.add_observation(NewObservation {
            material_id: material.id,
            source: PriceSource::Manual,
            unit_price,
            vendor_name: options.vendor_name,
            source_ref: None,
            source_detail: None,
            confidence: options.confidence.unwrap_or(MANUAL_DEFAULT_CONFIDENCE),
            ttl_hours: options.ttl_hours,
        })?;

        info!(material_name, unit_price, "人工价格录入完成");
        Ok(observation)
    }

    /// 批量提取观测（采购订单 / 历史成本表）
    ///
    /// # 幂等性
    /// - source_ref 已存在的行计入 skipped,整批可安全重放
    ///
    /// # 容错
    /// - 空描述/非正单价的行计入 skipped
    /// - 单行仓储失败记入 errors,不中断整批
    pub fn ingest_observations(
        &self,
        source: PriceSource,
        rows: &[IngestRow],
        unit: &str,
    ) -> ApiResult<IngestSummary> {
        let confidence = match source {
            PriceSource::VendorPo => VENDOR_PO_CONFIDENCE,
            PriceSource::CostSheet => COST_SHEET_CONFIDENCE,
            other => {
                return Err(ApiError::InvalidInput(format!(
                    "批量提取只接受 VENDOR_PO / COST_SHEET,收到: {}",
                    other
                )));
            }
        };

        let mut summary = IngestSummary::default();
        for row in rows {
            summary.lines_processed += 1;

            if row.description.trim().is_empty() || row.unit_price <= 0.0 {
                summary.skipped += 1;
                continue;
            }

            match self.ingest_row(source, row, unit, confidence) {
                Ok(outcome) => {
                    if outcome.material_created {
                        summary.materials_created += 1;
                    }
                    if outcome.inserted {
                        summary.observations_inserted += 1;
                    } else {
                        summary.skipped += 1;
                    }
                }
                Err(e) => {
                    warn!(source_ref = %row.source_ref, error = %e, "提取行失败");
                    summary.errors.push(format!("{}: {}", row.source_ref, e));
                }
            }
        }

        info!(
            source = %source,
            processed = summary.lines_processed,
            inserted = summary.observations_inserted,
            skipped = summary.skipped,
            errors = summary.errors.len(),
            "批量提取完成"
        );
        Ok(summary)
    }

    /// 单行提取
    fn ingest_row(
        &self,
        source: PriceSource,
        row: &IngestRow,
        unit: &str,
        confidence: f64,
    ) -> ApiResult<IngestOutcome> {
        // source_ref 已存在的行直接跳过（幂等重放）
        if self
            .catalog
            .find_observation_by_source_ref(&row.source_ref)?
            .is_some()
        {
            return Ok(IngestOutcome {
                material_created: false,
                inserted: false,
            });
        }

        let material_created = self.catalog.find_material_exact(&row.description)?.is_none();
        let material = self
            .catalog
            .get_or_create_material(&row.description, unit, None)?;

        self.catalog.add_observation(NewObservation {
            material_id: material.id,
            source,
            unit_price: row.unit_price,
            vendor_name: row.vendor_name.clone(),
            source_ref: Some(row.source_ref.clone()),
            source_detail: None,
            confidence,
            ttl_hours: None,
        })?;

        Ok(IngestOutcome {
            material_created,
            inserted: true,
        })
    }

    /// 目录浏览（可选名称子串搜索）
    pub fn list_materials(&self, search: Option<&str>) -> ApiResult<Vec<MaterialSummary>> {
        Ok(self.catalog.list_materials(search)?)
    }
}

struct IngestOutcome {
    material_created: bool,
    inserted: bool,
}
