// ==========================================
// 纺织品库存台账系统 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (key-value + scope)
// ==========================================

use crate::config::import_config_trait::{ConfigResult, ImportConfigReader};
use crate::db::open_sqlite_connection;
use crate::domain::types::{BookCheck, StaleThresholds, UnitKind, ZeroDiffPolicy};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

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
    pub fn new(db_path: &str) -> ConfigResult<Self> {
        let conn = open_sqlite_connection(db_path)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：为保证连接行为一致，会对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> ConfigResult<Self> {
        {
            let conn_guard = conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
            crate::db::configure_sqlite_connection(&conn_guard)?;
        }

        Ok(Self { conn })
    }

    /// 从 config_kv 表读取配置值（scope_id='global'）
    ///
    /// # 返回
    /// - Some(String): 配置值
    /// - None: 配置不存在
    pub fn get_global_config_value(&self, key: &str) -> ConfigResult<Option<String>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let value = conn
            .query_row(
                "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    fn get_config_or_default(&self, key: &str, default: &str) -> ConfigResult<String> {
        Ok(self
            .get_global_config_value(key)?
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| default.to_string()))
    }

    /// 数值配置：缺失或无法解析时回退默认值
    fn get_number_or_default<T>(&self, key: &str, default: T) -> ConfigResult<T>
    where
        T: std::str::FromStr + std::fmt::Display + Copy,
    {
        let raw = self.get_config_or_default(key, &default.to_string())?;
        match raw.trim().parse::<T>() {
            Ok(v) => Ok(v),
            Err(_) => {
                tracing::warn!(config_key = key, raw_value = %raw, "配置值格式错误，使用默认值");
                Ok(default)
            }
        }
    }

    /// 写入 global scope 配置（UPSERT）
    pub fn set_global_config_value(&self, key: &str, value: &str) -> ConfigResult<()> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value, updated_at) VALUES ('global', ?1, ?2, datetime('now'))
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2, updated_at = datetime('now')",
            params![key, value],
        )?;
        tracing::info!(config_key = key, "配置已更新");
        Ok(())
    }

    /// 获取所有 global 配置的快照（JSON，按键排序）
    pub fn get_config_snapshot(&self) -> ConfigResult<String> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let mut stmt =
            conn.prepare("SELECT key, value FROM config_kv WHERE scope_id = 'global' ORDER BY key")?;
        let config_map = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
            .collect::<rusqlite::Result<BTreeMap<String, String>>>()?;

        Ok(serde_json::to_string(&json!(config_map))?)
    }

    // ===== 库存总览 =====

    /// 滞销阈值
    pub fn get_stale_thresholds(&self) -> ConfigResult<StaleThresholds> {
        let defaults = StaleThresholds::default();
        Ok(StaleThresholds {
            attention_days: self
                .get_number_or_default(config_keys::ATTENTION_DAYS_THRESHOLD, defaults.attention_days)?,
            stale_days: self
                .get_number_or_default(config_keys::STALE_DAYS_THRESHOLD, defaults.stale_days)?,
        })
    }

    // ===== 盘点 =====

    pub fn get_zero_diff_policy(&self) -> ConfigResult<ZeroDiffPolicy> {
        let value = self.get_config_or_default(config_keys::ZERO_DIFF_POLICY, "SKIP")?;
        Ok(ZeroDiffPolicy::from_str(&value))
    }

    pub fn get_book_check(&self) -> ConfigResult<BookCheck> {
        let value = self.get_config_or_default(config_keys::BOOK_CHECK, "ACCEPT_STALE")?;
        Ok(BookCheck::from_str(&value))
    }

    /// 调整流水备注；未配置时返回 None，由调用方使用本地化默认文案
    pub fn get_adjustment_note(&self) -> ConfigResult<Option<String>> {
        Ok(self
            .get_global_config_value(config_keys::ADJUSTMENT_NOTE)?
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty()))
    }

    // ===== 查询 =====

    pub fn get_query_chunk_size(&self) -> ConfigResult<usize> {
        let size = self.get_number_or_default(config_keys::QUERY_CHUNK_SIZE, 200usize)?;
        Ok(size.max(1))
    }
}

// ==========================================
// ImportConfigReader Trait 实现
// ==========================================
#[async_trait]
impl ImportConfigReader for ConfigManager {
    async fn get_printed_sub_category(&self) -> ConfigResult<String> {
        self.get_config_or_default(config_keys::IMPORT_PRINTED_SUB_CATEGORY, "مطبوع")
    }

    async fn get_design_name_prefix(&self) -> ConfigResult<String> {
        // 前缀末尾空格有意义，不做 trim
        Ok(self
            .get_global_config_value(config_keys::IMPORT_DESIGN_NAME_PREFIX)?
            .unwrap_or_else(|| "رسمة ".to_string()))
    }

    async fn get_default_unit(&self) -> ConfigResult<UnitKind> {
        let value = self.get_config_or_default(config_keys::IMPORT_DEFAULT_UNIT, "kg")?;
        Ok(UnitKind::from_str(&value).unwrap_or(UnitKind::Kg))
    }

    async fn get_image_retry_attempts(&self) -> ConfigResult<u32> {
        let attempts = self.get_number_or_default(config_keys::IMPORT_IMAGE_RETRY_ATTEMPTS, 2u32)?;
        Ok(attempts.max(1))
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 库存总览
    pub const STALE_DAYS_THRESHOLD: &str = "stale_days_threshold";
    pub const ATTENTION_DAYS_THRESHOLD: &str = "attention_days_threshold";

    // 盘点
    pub const ZERO_DIFF_POLICY: &str = "reconciliation_zero_diff_policy";
    pub const BOOK_CHECK: &str = "reconciliation_book_check";
    pub const ADJUSTMENT_NOTE: &str = "reconciliation_adjustment_note";

    // 印花来源导入
    pub const IMPORT_PRINTED_SUB_CATEGORY: &str = "import_printed_sub_category";
    pub const IMPORT_DESIGN_NAME_PREFIX: &str = "import_design_name_prefix";
    pub const IMPORT_DEFAULT_UNIT: &str = "import_default_unit";
    pub const IMPORT_IMAGE_RETRY_ATTEMPTS: &str = "import_image_retry_attempts";

    // 查询
    pub const QUERY_CHUNK_SIZE: &str = "query_chunk_size";
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> ConfigManager {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::migrate(&conn).unwrap();
        ConfigManager::from_connection(Arc::new(Mutex::new(conn))).unwrap()
    }

    #[test]
    fn test_defaults_when_missing() {
        let config = setup();
        assert_eq!(config.get_stale_thresholds().unwrap(), StaleThresholds::default());
        assert_eq!(config.get_zero_diff_policy().unwrap(), ZeroDiffPolicy::Skip);
        assert_eq!(config.get_book_check().unwrap(), BookCheck::AcceptStale);
        assert_eq!(config.get_adjustment_note().unwrap(), None);
        assert_eq!(config.get_query_chunk_size().unwrap(), 200);
    }

    #[test]
    fn test_set_and_read_back() {
        let config = setup();
        config.set_global_config_value(config_keys::STALE_DAYS_THRESHOLD, "45").unwrap();
        config.set_global_config_value(config_keys::ZERO_DIFF_POLICY, "record").unwrap();
        config.set_global_config_value(config_keys::QUERY_CHUNK_SIZE, "abc").unwrap();

        assert_eq!(config.get_stale_thresholds().unwrap().stale_days, 45);
        assert_eq!(config.get_zero_diff_policy().unwrap(), ZeroDiffPolicy::Record);
        assert_eq!(config.get_query_chunk_size().unwrap(), 200);

        let snapshot: serde_json::Value =
            serde_json::from_str(&config.get_config_snapshot().unwrap()).unwrap();
        assert_eq!(snapshot["stale_days_threshold"], "45");
    }

    #[tokio::test]
    async fn test_import_config_reader() {
        let config = setup();
        let mapping = config.get_catalog_mapping().await.unwrap();
        assert_eq!(mapping.sub_category, "مطبوع");
        assert_eq!(mapping.name_prefix, "رسمة ");
        assert_eq!(mapping.unit, UnitKind::Kg);

        config
            .set_global_config_value(config_keys::IMPORT_IMAGE_RETRY_ATTEMPTS, "0")
            .unwrap();
        assert_eq!(config.get_image_retry_attempts().await.unwrap(), 1);
    }
}
