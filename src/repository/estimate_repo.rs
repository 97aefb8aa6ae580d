// ==========================================
// 成本情报系统 - 成本估算仓储
// ==========================================
// 职责: 管理 cost_estimates / estimate_lines 表的数据访问
// 红线: 成本字段创建后不可变,售价更新只改 selling_price / margin
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::estimate::{CostEstimate, EstimateLine, EstimateSummary, MarginFilters};
use crate::repository::catalog_repo::parse_timestamp;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex};

// ==========================================
// CostEstimateRepository - 成本估算仓储
// ==========================================
pub struct CostEstimateRepository {
    conn: Arc<Mutex<Connection>>,
}

impl CostEstimateRepository {
    /// 创建新的 CostEstimateRepository 实例
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

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    // ==========================================
    // 写入
    // ==========================================

    /// 持久化估算及其全部明细行（单事务,保证原子性）
    pub fn insert_estimate(&self, estimate: &CostEstimate) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let tx = conn.unchecked_transaction()?;

        tx.execute(
            r#"
            INSERT INTO cost_estimates
                (id, title, description, category, client_name,
                 material_cost, labour_cost, overhead_cost, total_cost_price,
                 selling_price, margin, confidence_score, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
            "#,
            params![
                estimate.id,
                estimate.title,
                estimate.description,
                estimate.category,
                estimate.client_name,
                estimate.material_cost,
                estimate.labour_cost,
                estimate.overhead_cost,
                estimate.total_cost_price,
                estimate.selling_price,
                estimate.margin,
                estimate.confidence_score,
                estimate.created_at.to_rfc3339(),
                estimate.updated_at.to_rfc3339(),
            ],
        )?;

        for line in &estimate.lines {
            tx.execute(
                r#"
                INSERT INTO estimate_lines
                    (id, estimate_id, line_no, material_name, quantity, unit,
                     unit_price, line_total, source, source_detail, confidence)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                "#,
                params![
                    line.id,
                    line.estimate_id,
                    line.line_no,
                    line.material_name,
                    line.quantity,
                    line.unit,
                    line.unit_price,
                    line.line_total,
                    line.source,
                    line.source_detail,
                    line.confidence,
                ],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    /// 更新售价与毛利率（成本字段保持不变）
    ///
    /// # 返回
    /// - Ok(()): 更新成功
    /// - Err(NotFound): 估算不存在
    pub fn update_selling_price(
        &self,
        id: &str,
        selling_price: f64,
        margin: Option<f64>,
    ) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let updated = conn.execute(
            r#"
            UPDATE cost_estimates
            SET selling_price = ?2, margin = ?3, updated_at = ?4
            WHERE id = ?1
            "#,
            params![
                id,
                selling_price,
                margin,
                chrono::Utc::now().to_rfc3339()
            ],
        )?;

        if updated == 0 {
            return Err(RepositoryError::NotFound {
                entity: "CostEstimate".to_string(),
                id: id.to_string(),
            });
        }
        Ok(())
    }

    // ==========================================
    // 查询
    // ==========================================

    /// 按 id 查询估算（含明细行,按 line_no 排序）
    pub fn find_by_id(&self, id: &str) -> RepositoryResult<Option<CostEstimate>> {
        let conn = self.get_conn()?;

        let estimate = conn
            .query_row(
                &format!("SELECT {} FROM cost_estimates WHERE id = ?1", ESTIMATE_COLUMNS),
                params![id],
                map_estimate_row,
            )
            .optional()?;

        let Some(row) = estimate else {
            return Ok(None);
        };

        let mut stmt = conn.prepare(
            r#"
            SELECT id, estimate_id, line_no, material_name, quantity, unit,
                   unit_price, line_total, source, source_detail, confidence
            FROM estimate_lines
            WHERE estimate_id = ?1
            ORDER BY line_no ASC
            "#,
        )?;
        let line_rows = stmt.query_map(params![id], |row| {
            Ok(EstimateLine {
                id: row.get(0)?,
                estimate_id: row.get(1)?,
                line_no: row.get(2)?,
                material_name: row.get(3)?,
                quantity: row.get(4)?,
                unit: row.get(5)?,
                unit_price: row.get(6)?,
                line_total: row.get(7)?,
                source: row.get(8)?,
                source_detail: row.get(9)?,
                confidence: row.get(10)?,
            })
        })?;

        let mut lines = Vec::new();
        for line in line_rows {
            lines.push(line?);
        }

        let mut estimate = into_estimate(row)?;
        estimate.lines = lines;
        Ok(Some(estimate))
    }

    /// 估算列表（新→旧,附行计数,不含明细）
    pub fn list(&self) -> RepositoryResult<Vec<EstimateSummary>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            r#"
            SELECT {}, (SELECT COUNT(*) FROM estimate_lines l WHERE l.estimate_id = e.id)
            FROM cost_estimates e
            ORDER BY created_at DESC
            "#,
            ESTIMATE_SUMMARY_COLUMNS
        ))?;

        let rows = stmt.query_map([], map_summary_row)?;
        let mut summaries = Vec::new();
        for row in rows {
            summaries.push(into_summary(row?)?);
        }
        Ok(summaries)
    }

    /// 看板查询: 按过滤条件筛选,毛利率升序（NULL 置底）
    pub fn list_for_dashboard(
        &self,
        filters: &MarginFilters,
    ) -> RepositoryResult<Vec<EstimateSummary>> {
        let mut sql = format!(
            r#"
            SELECT {}, (SELECT COUNT(*) FROM estimate_lines l WHERE l.estimate_id = e.id)
            FROM cost_estimates e
            WHERE 1 = 1
            "#,
            ESTIMATE_SUMMARY_COLUMNS
        );
        let mut bindings: Vec<Value> = Vec::new();

        if let Some(ref category) = filters.category {
            sql.push_str(&format!(
                " AND LOWER(COALESCE(category, '')) LIKE '%' || ?{} || '%'",
                bindings.len() + 1
            ));
            bindings.push(Value::Text(category.trim().to_lowercase()));
        }
        if let Some(min_margin) = filters.min_margin {
            sql.push_str(&format!(
                " AND margin IS NOT NULL AND margin >= ?{}",
                bindings.len() + 1
            ));
            bindings.push(Value::Real(min_margin));
        }
        if let Some(max_margin) = filters.max_margin {
            sql.push_str(&format!(
                " AND margin IS NOT NULL AND margin <= ?{}",
                bindings.len() + 1
            ));
            bindings.push(Value::Real(max_margin));
        }

        sql.push_str(" ORDER BY margin IS NULL, margin ASC, created_at DESC");

        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(bindings), map_summary_row)?;

        let mut summaries = Vec::new();
        for row in rows {
            summaries.push(into_summary(row?)?);
        }
        Ok(summaries)
    }
}

// ==========================================
// 行映射
// ==========================================

const ESTIMATE_COLUMNS: &str = "id, title, description, category, client_name, \
     material_cost, labour_cost, overhead_cost, total_cost_price, \
     selling_price, margin, confidence_score, created_at, updated_at";

const ESTIMATE_SUMMARY_COLUMNS: &str = "e.id, e.title, e.category, e.client_name, \
     e.total_cost_price, e.selling_price, e.margin, e.confidence_score, e.created_at";

type EstimateRow = (
    String,         // id
    String,         // title
    Option<String>, // description
    Option<String>, // category
    Option<String>, // client_name
    f64,            // material_cost
    f64,            // labour_cost
    f64,            // overhead_cost
    f64,            // total_cost_price
    Option<f64>,    // selling_price
    Option<f64>,    // margin
    i32,            // confidence_score
    String,         // created_at
    String,         // updated_at
);

fn map_estimate_row(row: &Row<'_>) -> rusqlite::Result<EstimateRow> {
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
        row.get(11)?,
        row.get(12)?,
        row.get(13)?,
    ))
}

fn into_estimate(row: EstimateRow) -> RepositoryResult<CostEstimate> {
    Ok(CostEstimate {
        id: row.0,
        title: row.1,
        description: row.2,
        category: row.3,
        client_name: row.4,
        material_cost: row.5,
        labour_cost: row.6,
        overhead_cost: row.7,
        total_cost_price: row.8,
        selling_price: row.9,
        margin: row.10,
        confidence_score: row.11,
        lines: Vec::new(),
        created_at: parse_timestamp("created_at", &row.12)?,
        updated_at: parse_timestamp("updated_at", &row.13)?,
    })
}

type SummaryRow = (
    String,         // id
    String,         // title
    Option<String>, // category
    Option<String>, // client_name
    f64,            // total_cost_price
    Option<f64>,    // selling_price
    Option<f64>,    // margin
    i32,            // confidence_score
    String,         // created_at
    i64,            // line_count
);

fn map_summary_row(row: &Row<'_>) -> rusqlite::Result<SummaryRow> {
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
    ))
}

fn into_summary(row: SummaryRow) -> RepositoryResult<EstimateSummary> {
    Ok(EstimateSummary {
        id: row.0,
        title: row.1,
        category: row.2,
        client_name: row.3,
        total_cost_price: row.4,
        selling_price: row.5,
        margin: row.6,
        confidence_score: row.7,
        line_count: row.9,
        created_at: parse_timestamp("created_at", &row.8)?,
    })
}
