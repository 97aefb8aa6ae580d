// ==========================================
// 成本情报系统 - 物料价格目录仓储
// ==========================================
// 职责: 管理 materials / price_observations 表的数据访问
// 红线: 不含业务逻辑,只负责数据访问
// 并发: 物料创建与 source_ref 去重依赖唯一索引 + INSERT OR IGNORE + 回读
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::material::{Material, MaterialSummary, NewObservation, PriceObservation};
use crate::domain::types::PriceSource;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// ONLINE 观测的默认 TTL（小时）
const DEFAULT_ONLINE_TTL_HOURS: i64 = 24;

// ==========================================
// CatalogRepository - 物料价格目录仓储
// ==========================================
pub struct CatalogRepository {
    conn: Arc<Mutex<Connection>>,
}

impl CatalogRepository {
    /// 创建新的 CatalogRepository 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建仓储实例
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    // ==========================================
    // 物料 (get-or-create / 查询)
    // ==========================================

    /// 按规范化名称 get-or-create 物料
    ///
    /// # 并发说明
    /// - name_normalized 上有唯一索引
    /// - INSERT OR IGNORE + 回读: 两个调用方同时首次引用同名物料时,
    ///   只会产生一行,落后者拿到已存在的行
    pub fn get_or_create_material(
        &self,
        name: &str,
        unit: &str,
        category: Option<&str>,
    ) -> RepositoryResult<Material> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(RepositoryError::ValidationError(
                "物料名称不能为空".to_string(),
            ));
        }

        let normalized = Material::normalize_name(name);
        let now = Utc::now();

        {
            let conn = self.get_conn()?;
            conn.execute(
                r#"
                INSERT OR IGNORE INTO materials
                    (id, name, name_normalized, unit, category, created_at, updated_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
                params![
                    Uuid::new_v4().to_string(),
                    trimmed,
                    normalized,
                    unit,
                    category,
                    now.to_rfc3339(),
                    now.to_rfc3339(),
                ],
            )?;
        }

        // 回读（无论本次插入还是并发方已插入,此处必有一行）
        self.find_material_exact(name)?
            .ok_or_else(|| RepositoryError::InternalError(format!("物料回读失败: {}", trimmed)))
    }

    /// 按规范化名称精确查询物料
    pub fn find_material_exact(&self, name: &str) -> RepositoryResult<Option<Material>> {
        let normalized = Material::normalize_name(name);
        let conn = self.get_conn()?;

        let material = conn
            .query_row(
                r#"
                SELECT id, name, name_normalized, unit, category, created_at, updated_at
                FROM materials
                WHERE name_normalized = ?1
                "#,
                params![normalized],
                map_material_row,
            )
            .optional()?;

        material.map(into_material).transpose()
    }

    /// 按名称子串模糊查询物料（解析引擎读路径使用,容忍命名差异）
    ///
    /// 精确匹配优先; 多个子串命中时取名称最短者（最接近查询词）
    pub fn find_material_fuzzy(&self, name: &str) -> RepositoryResult<Option<Material>> {
        if let Some(material) = self.find_material_exact(name)? {
            return Ok(Some(material));
        }

        let normalized = Material::normalize_name(name);
        if normalized.is_empty() {
            return Ok(None);
        }

        let conn = self.get_conn()?;
        let material = conn
            .query_row(
                r#"
                SELECT id, name, name_normalized, unit, category, created_at, updated_at
                FROM materials
                WHERE name_normalized LIKE '%' || ?1 || '%'
                   OR ?1 LIKE '%' || name_normalized || '%'
                ORDER BY length(name_normalized) ASC, name_normalized ASC
                LIMIT 1
                "#,
                params![normalized],
                map_material_row,
            )
            .optional()?;

        material.map(into_material).transpose()
    }

    /// 按 id 查询物料
    pub fn find_material_by_id(&self, id: &str) -> RepositoryResult<Option<Material>> {
        let conn = self.get_conn()?;
        let material = conn
            .query_row(
                r#"
                SELECT id, name, name_normalized, unit, category, created_at, updated_at
                FROM materials
                WHERE id = ?1
                "#,
                params![id],
                map_material_row,
            )
            .optional()?;

        material.map(into_material).transpose()
    }

    // ==========================================
    // 价格观测 (只追加)
    // ==========================================

    /// 写入一条价格观测
    ///
    /// # 幂等性
    /// - source_ref 非空且已存在时: 不插入,返回已存在的观测
    /// - 并发重复插入由唯一索引兜底,冲突方回读已存在行
    ///
    /// # TTL
    /// - ttl_hours 显式给定时按其计算 expires_at
    /// - 否则 ONLINE 观测默认 24h,其余来源不过期
    pub fn add_observation(&self, new: NewObservation) -> RepositoryResult<PriceObservation> {
        if new.unit_price < 0.0 {
            return Err(RepositoryError::FieldValueError {
                field: "unit_price".to_string(),
                message: "单价不能为负".to_string(),
            });
        }
        if !(0.0..=1.0).contains(&new.confidence) {
            return Err(RepositoryError::FieldValueError {
                field: "confidence".to_string(),
                message: "置信度必须在 [0,1] 内".to_string(),
            });
        }

        // 幂等检查（先查后插,唯一索引兜底并发）
        if let Some(ref source_ref) = new.source_ref {
            if let Some(existing) = self.find_observation_by_source_ref(source_ref)? {
                return Ok(existing);
            }
        }

        let now = Utc::now();
        let expires_at = match new.ttl_hours {
            Some(hours) => Some(now + Duration::hours(hours)),
            None if new.source == PriceSource::Online => {
                Some(now + Duration::hours(DEFAULT_ONLINE_TTL_HOURS))
            }
            None => None,
        };

        let observation = PriceObservation {
            id: Uuid::new_v4().to_string(),
            material_id: new.material_id,
            source: new.source,
            unit_price: new.unit_price,
            currency: crate::REPORTING_CURRENCY.to_string(),
            confidence: new.confidence,
            vendor_name: new.vendor_name,
            source_ref: new.source_ref,
            source_detail: new.source_detail,
            recorded_at: now,
            expires_at,
        };

        let inserted = {
            let conn = self.get_conn()?;
            conn.execute(
                r#"
                INSERT OR IGNORE INTO price_observations
                    (id, material_id, source, unit_price, currency, vendor_name,
                     source_ref, source_detail, confidence, recorded_at, expires_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                "#,
                params![
                    observation.id,
                    observation.material_id,
                    observation.source.to_string(),
                    observation.unit_price,
                    observation.currency,
                    observation.vendor_name,
                    observation.source_ref,
                    observation.source_detail,
                    observation.confidence,
                    observation.recorded_at.to_rfc3339(),
                    observation.expires_at.map(|t| t.to_rfc3339()),
                ],
            )?
        };

        if inserted == 0 {
            // 并发方抢先插入了同一 source_ref,视为"已存在,跳过"
            if let Some(ref source_ref) = observation.source_ref {
                if let Some(existing) = self.find_observation_by_source_ref(source_ref)? {
                    return Ok(existing);
                }
            }
            return Err(RepositoryError::InternalError(
                "价格观测插入失败且无法回读".to_string(),
            ));
        }

        Ok(observation)
    }

    /// 按 source_ref 查询观测（幂等去重用）
    pub fn find_observation_by_source_ref(
        &self,
        source_ref: &str,
    ) -> RepositoryResult<Option<PriceObservation>> {
        let conn = self.get_conn()?;
        let row = conn
            .query_row(
                &format!(
                    "SELECT {} FROM price_observations WHERE source_ref = ?1",
                    OBSERVATION_COLUMNS
                ),
                params![source_ref],
                map_observation_row,
            )
            .optional()?;

        row.map(into_observation).transpose()
    }

    /// 查询某物料的价格观测（新→旧）
    ///
    /// # 参数
    /// - within_ttl: true 时过滤掉已过期观测（expires_at 已过）
    /// - limit: 返回条数上限
    pub fn observations_for(
        &self,
        material_id: &str,
        within_ttl: bool,
        limit: usize,
    ) -> RepositoryResult<Vec<PriceObservation>> {
        let rows = self.load_observations(material_id, limit)?;
        if !within_ttl {
            return Ok(rows);
        }

        let now = Utc::now();
        Ok(rows.into_iter().filter(|o| !o.is_expired(now)).collect())
    }

    /// 查询某物料最近一条未过期的 ONLINE 观测（级联缓存层使用）
    pub fn latest_online_unexpired(
        &self,
        material_id: &str,
    ) -> RepositoryResult<Option<PriceObservation>> {
        let now = Utc::now();
        Ok(self
            .load_observations(material_id, 50)?
            .into_iter()
            .find(|o| o.source == PriceSource::Online && !o.is_expired(now)))
    }

    /// 读取观测原始行（过期过滤在 Rust 侧进行,避免文本时间比较的边界问题）
    fn load_observations(
        &self,
        material_id: &str,
        limit: usize,
    ) -> RepositoryResult<Vec<PriceObservation>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            r#"
            SELECT {}
            FROM price_observations
            WHERE material_id = ?1
            ORDER BY recorded_at DESC
            LIMIT ?2
            "#,
            OBSERVATION_COLUMNS
        ))?;

        let rows = stmt.query_map(params![material_id, limit as i64], map_observation_row)?;

        let mut observations = Vec::new();
        for row in rows {
            observations.push(into_observation(row?)?);
        }
        Ok(observations)
    }

    // ==========================================
    // 目录浏览
    // ==========================================

    /// 物料列表（可选名称子串搜索,附最近 3 条价格与观测计数）
    pub fn list_materials(&self, search: Option<&str>) -> RepositoryResult<Vec<MaterialSummary>> {
        let materials = {
            let conn = self.get_conn()?;
            let mut materials = Vec::new();

            match search {
                Some(q) => {
                    let mut stmt = conn.prepare(
                        r#"
                        SELECT id, name, name_normalized, unit, category, created_at, updated_at
                        FROM materials
                        WHERE name_normalized LIKE '%' || ?1 || '%'
                        ORDER BY name ASC
                        "#,
                    )?;
                    let rows =
                        stmt.query_map(params![Material::normalize_name(q)], map_material_row)?;
                    for row in rows {
                        materials.push(into_material(row?)?);
                    }
                }
                None => {
                    let mut stmt = conn.prepare(
                        r#"
                        SELECT id, name, name_normalized, unit, category, created_at, updated_at
                        FROM materials
                        ORDER BY name ASC
                        "#,
                    )?;
                    let rows = stmt.query_map([], map_material_row)?;
                    for row in rows {
                        materials.push(into_material(row?)?);
                    }
                }
            }
            materials
        };

        let mut summaries = Vec::with_capacity(materials.len());
        for material in materials {
            let latest_prices = self.load_observations(&material.id, 3)?;
            let observation_count = self.count_observations(&material.id)?;
            summaries.push(MaterialSummary {
                material,
                latest_prices,
                observation_count,
            });
        }
        Ok(summaries)
    }

    /// 观测计数
    fn count_observations(&self, material_id: &str) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        let count = conn.query_row(
            "SELECT COUNT(*) FROM price_observations WHERE material_id = ?1",
            params![material_id],
            |row| row.get::<_, i64>(0),
        )?;
        Ok(count)
    }
}

// ==========================================
// 行映射（SQL 行 → 原始元组 → 领域实体）
// ==========================================

const OBSERVATION_COLUMNS: &str = "id, material_id, source, unit_price, currency, vendor_name, \
     source_ref, source_detail, confidence, recorded_at, expires_at";

type MaterialRow = (
    String,         // id
    String,         // name
    String,         // name_normalized
    String,         // unit
    Option<String>, // category
    String,         // created_at
    String,         // updated_at
);

fn map_material_row(row: &Row<'_>) -> rusqlite::Result<MaterialRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
    ))
}

fn into_material(row: MaterialRow) -> RepositoryResult<Material> {
    Ok(Material {
        id: row.0,
        name: row.1,
        name_normalized: row.2,
        unit: row.3,
        category: row.4,
        created_at: parse_timestamp("created_at", &row.5)?,
        updated_at: parse_timestamp("updated_at", &row.6)?,
    })
}

type ObservationRow = (
    String,         // id
    String,         // material_id
    String,         // source
    f64,            // unit_price
    String,         // currency
    Option<String>, // vendor_name
    Option<String>, // source_ref
    Option<String>, // source_detail
    f64,            // confidence
    String,         // recorded_at
    Option<String>, // expires_at
);

fn map_observation_row(row: &Row<'_>) -> rusqlite::Result<ObservationRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
        row.get(8)?,
        row.get(9)?,
        row.get(10)?,
    ))
}

fn into_observation(row: ObservationRow) -> RepositoryResult<PriceObservation> {
    let source = PriceSource::parse(&row.2).ok_or_else(|| RepositoryError::FieldValueError {
        field: "source".to_string(),
        message: format!("未知价格来源: {}", row.2),
    })?;

    Ok(PriceObservation {
        id: row.0,
        material_id: row.1,
        source,
        unit_price: row.3,
        currency: row.4,
        vendor_name: row.5,
        source_ref: row.6,
        source_detail: row.7,
        confidence: row.8,
        recorded_at: parse_timestamp("recorded_at", &row.9)?,
        expires_at: row
            .10
            .as_deref()
            .map(|v| parse_timestamp("expires_at", v))
            .transpose()?,
    })
}

/// RFC3339 时间戳解析（仓储层共用）
pub(crate) fn parse_timestamp(field: &str, value: &str) -> RepositoryResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| RepositoryError::FieldValueError {
            field: field.to_string(),
            message: format!("时间戳解析失败: {} ({})", value, e),
        })
}
