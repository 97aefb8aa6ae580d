// ==========================================
// 成本情报系统 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (key-value + scope)
// 说明: 引擎每次调用现读配置,不做进程级缓存,
//       避免跨重启/跨写入的陈旧值
// ==========================================

use crate::db::open_sqlite_connection;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection};
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

// ==========================================
// 配置键与默认值
// ==========================================

/// 目标毛利率（百分比）
pub const KEY_TARGET_MARGIN_PERCENT: &str = "margin/target_percent";
pub const DEFAULT_TARGET_MARGIN_PERCENT: f64 = 25.0;

/// 固定人工费率（整单,非按行）
pub const KEY_LABOUR_RATE_FLAT: &str = "estimate/labour_rate_flat";
pub const DEFAULT_LABOUR_RATE_FLAT: f64 = 15.0;

/// 管理费用比例（百分比）
pub const KEY_OVERHEAD_PERCENT: &str = "estimate/overhead_percent";
pub const DEFAULT_OVERHEAD_PERCENT: f64 = 10.0;

/// ONLINE 观测 TTL（小时）
pub const KEY_ONLINE_TTL_HOURS: &str = "lookup/online_ttl_hours";
pub const DEFAULT_ONLINE_TTL_HOURS: i64 = 24;

/// 外汇行情 API 密钥（大宗商品层,缺省禁用实时汇率）
pub const KEY_METALPRICES_API_KEY: &str = "lookup/metalprices_api_key";

/// SerpAPI 密钥（缺省禁用该搜索层）
pub const KEY_SERPAPI_KEY: &str = "lookup/serpapi_key";

/// Serper 密钥（缺省禁用该搜索层）
pub const KEY_SERPER_API_KEY: &str = "lookup/serper_api_key";

/// 在线询价层凭据快照（级联构建时一次性读取）
#[derive(Debug, Clone, Default)]
pub struct LookupCredentials {
    pub metalprices_api_key: Option<String>,
    pub serpapi_key: Option<String>,
    pub serper_api_key: Option<String>,
}

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 从 config_kv 表读取配置值（scope_id='global'）
    fn get_config_value(&self, key: &str) -> RepositoryResult<Option<String>> {
        let conn = self.get_conn()?;
        let result = conn.query_row(
            "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
            params![key],
            |row| row.get::<_, String>(0),
        );

        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 写入配置值（scope_id='global',upsert 语义）
    pub fn set_config_value(&self, key: &str, value: &str) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO config_kv (scope_id, key, value, updated_at)
            VALUES ('global', ?1, ?2, datetime('now'))
            ON CONFLICT (scope_id, key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
            params![key, value],
        )?;
        Ok(())
    }

    /// 读取 f64 配置,缺省或解析失败时返回默认值（解析失败记录告警）
    fn get_f64_or(&self, key: &str, default: f64) -> RepositoryResult<f64> {
        match self.get_config_value(key)? {
            Some(raw) => match raw.trim().parse::<f64>() {
                Ok(v) => Ok(v),
                Err(_) => {
                    tracing::warn!(key, raw, "配置值无法解析为数值,使用默认值");
                    Ok(default)
                }
            },
            None => Ok(default),
        }
    }

    /// 读取 i64 配置,缺省或解析失败时返回默认值
    fn get_i64_or(&self, key: &str, default: i64) -> RepositoryResult<i64> {
        match self.get_config_value(key)? {
            Some(raw) => match raw.trim().parse::<i64>() {
                Ok(v) => Ok(v),
                Err(_) => {
                    tracing::warn!(key, raw, "配置值无法解析为整数,使用默认值");
                    Ok(default)
                }
            },
            None => Ok(default),
        }
    }

    /// 读取可选字符串配置（空白值视为未配置）
    fn get_optional(&self, key: &str) -> RepositoryResult<Option<String>> {
        Ok(self
            .get_config_value(key)?
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty()))
    }

    // ==========================================
    // 类型化配置读取
    // ==========================================

    /// 目标毛利率（百分比,默认 25）
    pub fn target_margin_percent(&self) -> RepositoryResult<f64> {
        self.get_f64_or(KEY_TARGET_MARGIN_PERCENT, DEFAULT_TARGET_MARGIN_PERCENT)
    }

    /// 固定人工费率（默认 15）
    pub fn labour_rate_flat(&self) -> RepositoryResult<f64> {
        self.get_f64_or(KEY_LABOUR_RATE_FLAT, DEFAULT_LABOUR_RATE_FLAT)
    }

    /// 管理费用比例（百分比,默认 10）
    pub fn overhead_percent(&self) -> RepositoryResult<f64> {
        self.get_f64_or(KEY_OVERHEAD_PERCENT, DEFAULT_OVERHEAD_PERCENT)
    }

    /// ONLINE 观测 TTL（小时,默认 24）
    pub fn online_ttl_hours(&self) -> RepositoryResult<i64> {
        self.get_i64_or(KEY_ONLINE_TTL_HOURS, DEFAULT_ONLINE_TTL_HOURS)
    }

    /// 在线询价层凭据（缺省的密钥对应层级自动不可用）
    pub fn lookup_credentials(&self) -> RepositoryResult<LookupCredentials> {
        Ok(LookupCredentials {
            metalprices_api_key: self.get_optional(KEY_METALPRICES_API_KEY)?,
            serpapi_key: self.get_optional(KEY_SERPAPI_KEY)?,
            serper_api_key: self.get_optional(KEY_SERPER_API_KEY)?,
        })
    }

    /// 获取所有配置的快照（JSON 格式,测试与诊断用）
    pub fn get_config_snapshot(&self) -> RepositoryResult<String> {
        let conn = self.get_conn()?;
        let mut stmt = conn
            .prepare("SELECT key, value FROM config_kv WHERE scope_id = 'global' ORDER BY key")?;

        let mut config_map: HashMap<String, String> = HashMap::new();
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        for row in rows {
            let (key, value) = row?;
            config_map.insert(key, value);
        }

        serde_json::to_string(&json!(config_map))
            .map_err(|e| RepositoryError::InternalError(e.to_string()))
    }
}
