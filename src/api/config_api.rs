// ==========================================
// 纺织品库存台账系统 - 配置管理 API
// ==========================================
// 职责: 配置查询、校验后更新、快照
// ==========================================

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::api::error::{config_error, ApiError, ApiResult};
use crate::config::config_keys;
use crate::config::ConfigManager;
use crate::domain::types::UnitKind;

/// 已知配置键及其默认值
const KNOWN_KEYS: [(&str, &str); 10] = [
    (config_keys::STALE_DAYS_THRESHOLD, "30"),
    (config_keys::ATTENTION_DAYS_THRESHOLD, "7"),
    (config_keys::ZERO_DIFF_POLICY, "SKIP"),
    (config_keys::BOOK_CHECK, "ACCEPT_STALE"),
    (config_keys::ADJUSTMENT_NOTE, ""),
    (config_keys::IMPORT_PRINTED_SUB_CATEGORY, "مطبوع"),
    (config_keys::IMPORT_DESIGN_NAME_PREFIX, "رسمة "),
    (config_keys::IMPORT_DEFAULT_UNIT, "kg"),
    (config_keys::IMPORT_IMAGE_RETRY_ATTEMPTS, "2"),
    (config_keys::QUERY_CHUNK_SIZE, "200"),
];

/// 配置项
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigItem {
    pub key: String,
    pub value: String,
    /// 未写入 config_kv，显示的是默认值
    pub is_default: bool,
}

// ==========================================
// ConfigApi - 配置管理 API
// ==========================================
pub struct ConfigApi {
    config_manager: Arc<ConfigManager>,
}

impl ConfigApi {
    pub fn new(config_manager: Arc<ConfigManager>) -> Self {
        Self { config_manager }
    }

    /// 全部已知配置（含默认值）
    pub fn list_configs(&self) -> ApiResult<Vec<ConfigItem>> {
        KNOWN_KEYS
            .iter()
            .map(|(key, default)| {
                let stored = self
                    .config_manager
                    .get_global_config_value(key)
                    .map_err(config_error)?;
                Ok(ConfigItem {
                    key: key.to_string(),
                    is_default: stored.is_none(),
                    value: stored.unwrap_or_else(|| default.to_string()),
                })
            })
            .collect()
    }

    /// 更新配置（写入前校验值格式）
    ///
    /// # 返回
    /// - Err(InvalidInput): 未知键或值格式错误
    pub fn update_config(&self, key: &str, value: &str) -> ApiResult<()> {
        validate_value(key, value)?;
        self.config_manager
            .set_global_config_value(key, value)
            .map_err(config_error)
    }

    /// 配置快照（JSON）
    pub fn get_config_snapshot(&self) -> ApiResult<String> {
        self.config_manager.get_config_snapshot().map_err(config_error)
    }
}

fn validate_value(key: &str, value: &str) -> ApiResult<()> {
    if !KNOWN_KEYS.iter().any(|(k, _)| *k == key) {
        return Err(ApiError::InvalidInput(format!("未知配置键: {}", key)));
    }

    let invalid = || ApiError::InvalidInput(format!("配置值格式错误: {}={}", key, value));
    let trimmed = value.trim();
    match key {
        config_keys::STALE_DAYS_THRESHOLD
        | config_keys::ATTENTION_DAYS_THRESHOLD
        | config_keys::IMPORT_IMAGE_RETRY_ATTEMPTS
        | config_keys::QUERY_CHUNK_SIZE => match trimmed.parse::<i64>() {
            Ok(n) if n >= 1 => Ok(()),
            _ => Err(invalid()),
        },
        config_keys::ZERO_DIFF_POLICY => match trimmed.to_uppercase().as_str() {
            "SKIP" | "RECORD" => Ok(()),
            _ => Err(invalid()),
        },
        config_keys::BOOK_CHECK => match trimmed.to_uppercase().as_str() {
            "ACCEPT_STALE" | "REVALIDATE" => Ok(()),
            _ => Err(invalid()),
        },
        config_keys::IMPORT_DEFAULT_UNIT => UnitKind::from_str(trimmed).map(|_| ()).ok_or_else(invalid),
        _ => Ok(()),
    }
}
