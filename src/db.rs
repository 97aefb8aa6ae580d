// ==========================================
// 成本情报系统 - SQLite 连接初始化
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为，避免"部分模块外键开启/部分不开启"
// - 统一 busy_timeout，减少并发写入时的偶发 busy 错误
// - 统一建表入口，保证库与测试使用同一份 schema
// ==========================================

use rusqlite::Connection;
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要"每个连接"单独开启
/// - busy_timeout 需要"每个连接"单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 初始化数据库 schema（幂等）
///
/// # 说明
/// - 所有表使用 CREATE TABLE IF NOT EXISTS，可安全重复调用
/// - materials.name_normalized 上的唯一索引用于并发 get-or-create 去重
/// - price_observations.source_ref 上的唯一索引用于幂等批量提取
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        -- 配置表 (key-value + scope)
        CREATE TABLE IF NOT EXISTS config_kv (
            scope_id   TEXT NOT NULL DEFAULT 'global',
            key        TEXT NOT NULL,
            value      TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (scope_id, key)
        );

        -- 物料目录
        CREATE TABLE IF NOT EXISTS materials (
            id              TEXT PRIMARY KEY,
            name            TEXT NOT NULL,
            name_normalized TEXT NOT NULL,
            unit            TEXT NOT NULL,
            category        TEXT,
            created_at      TEXT NOT NULL,
            updated_at      TEXT NOT NULL
        );
        CREATE UNIQUE INDEX IF NOT EXISTS idx_materials_name_normalized
            ON materials(name_normalized);

        -- 价格观测（只追加，不修改）
        CREATE TABLE IF NOT EXISTS price_observations (
            id            TEXT PRIMARY KEY,
            material_id   TEXT NOT NULL REFERENCES materials(id),
            source        TEXT NOT NULL,
            unit_price    REAL NOT NULL CHECK (unit_price >= 0),
            currency      TEXT NOT NULL DEFAULT 'OMR',
            vendor_name   TEXT,
            source_ref    TEXT,
            source_detail TEXT,
            confidence    REAL NOT NULL CHECK (confidence >= 0 AND confidence <= 1),
            recorded_at   TEXT NOT NULL,
            expires_at    TEXT
        );
        CREATE UNIQUE INDEX IF NOT EXISTS idx_observations_source_ref
            ON price_observations(source_ref)
            WHERE source_ref IS NOT NULL;
        CREATE INDEX IF NOT EXISTS idx_observations_material
            ON price_observations(material_id, recorded_at DESC);

        -- 成本估算
        CREATE TABLE IF NOT EXISTS cost_estimates (
            id               TEXT PRIMARY KEY,
            title            TEXT NOT NULL,
            description      TEXT,
            category         TEXT,
            client_name      TEXT,
            material_cost    REAL NOT NULL,
            labour_cost      REAL NOT NULL,
            overhead_cost    REAL NOT NULL,
            total_cost_price REAL NOT NULL,
            selling_price    REAL,
            margin           REAL,
            confidence_score INTEGER NOT NULL,
            created_at       TEXT NOT NULL,
            updated_at       TEXT NOT NULL
        );

        -- 估算明细行（按 line_no 排序）
        CREATE TABLE IF NOT EXISTS estimate_lines (
            id            TEXT PRIMARY KEY,
            estimate_id   TEXT NOT NULL REFERENCES cost_estimates(id) ON DELETE CASCADE,
            line_no       INTEGER NOT NULL,
            material_name TEXT NOT NULL,
            quantity      REAL NOT NULL,
            unit          TEXT NOT NULL,
            unit_price    REAL NOT NULL,
            line_total    REAL NOT NULL,
            source        TEXT NOT NULL,
            source_detail TEXT,
            confidence    REAL NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_estimate_lines_estimate
            ON estimate_lines(estimate_id, line_no);
        "#,
    )?;
    Ok(())
}

/// 打开数据库连接并初始化 schema（二进制入口使用）
pub fn open_and_init(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = open_sqlite_connection(db_path)?;
    init_schema(&conn)?;
    Ok(conn)
}
