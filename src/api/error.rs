// ==========================================
// 纺织品库存台账系统 - API层错误类型
// ==========================================
// 职责: 统一 API 层错误，转换仓储/引擎/导入错误为操作员可读的消息
// 约定: 后端错误文本原样透出，不吞错
// ==========================================

use crate::engine::ReconciliationError;
use crate::importer::ImportError;
use crate::repository::error::RepositoryError;
use thiserror::Error;

/// API层错误类型
#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // 业务规则错误
    // ==========================================
    #[error("无效输入: {0}")]
    InvalidInput(String),

    #[error("资源未找到: {0}")]
    NotFound(String),

    #[error("业务规则违反: {0}")]
    BusinessRuleViolation(String),

    #[error("无效的状态转换: from={from} to={to}")]
    InvalidStateTransition { from: String, to: String },

    /// 目录中已存在同名同色号商品
    #[error("商品已存在: {0}")]
    DuplicateItem(String),

    /// 商品仍被流水引用，不能硬删除
    #[error("商品已有流水记录，不能删除: {item}（{movements} 条）")]
    ItemInUse { item: String, movements: i64 },

    /// 流水已被盘点封存
    #[error("流水已被盘点封存，不能修改或删除: {0}")]
    MovementSealed(String),

    // ==========================================
    // 对账错误
    // ==========================================
    #[error("盘点校验失败: {0}")]
    ValidationError(String),

    /// 账面余额在加载盘点表之后发生变化
    #[error("账面余额已变化，请重新加载盘点表: {}", .0.join(", "))]
    BookBalanceChanged(Vec<String>),

    #[error("没有可保存的内容")]
    NothingToSave,

    // ==========================================
    // 数据访问错误
    // ==========================================
    #[error("数据库错误: {0}")]
    DatabaseError(String),

    #[error("数据库连接失败: {0}")]
    DatabaseConnectionError(String),

    #[error("数据库事务失败: {0}")]
    DatabaseTransactionError(String),

    // ==========================================
    // 导入错误
    // ==========================================
    #[error("导入失败: {0}")]
    ImportError(String),

    // ==========================================
    // 通用错误
    // ==========================================
    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ==========================================
// 从 RepositoryError 转换
// ==========================================
impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{}(id={})不存在", entity, id))
            }
            RepositoryError::LockError(msg) => {
                ApiError::DatabaseConnectionError(format!("数据库锁获取失败: {}", msg))
            }
            RepositoryError::DatabaseTransactionError(msg) => {
                ApiError::DatabaseTransactionError(msg)
            }
            RepositoryError::DatabaseQueryError(msg) => ApiError::DatabaseError(msg),
            RepositoryError::UniqueConstraintViolation(msg) => {
                ApiError::BusinessRuleViolation(format!("唯一约束违反: {}", msg))
            }
            RepositoryError::ForeignKeyViolation(msg) => {
                ApiError::BusinessRuleViolation(format!("外键约束违反: {}", msg))
            }
            err @ RepositoryError::Backend { .. } => ApiError::DatabaseError(err.explain()),
            RepositoryError::BusinessRuleViolation(msg) => {
                if msg.contains("封存") {
                    ApiError::MovementSealed(msg)
                } else {
                    ApiError::BusinessRuleViolation(msg)
                }
            }
            RepositoryError::ValidationError(msg) => ApiError::ValidationError(msg),
            RepositoryError::FieldValueError { field, message } => {
                ApiError::InvalidInput(format!("字段{}错误: {}", field, message))
            }
            RepositoryError::InternalError(msg) => ApiError::InternalError(msg),
            RepositoryError::Other(err) => ApiError::Other(err),
        }
    }
}

// ==========================================
// 从 ReconciliationError 转换
// ==========================================
impl From<ReconciliationError> for ApiError {
    fn from(err: ReconciliationError) -> Self {
        match err {
            ReconciliationError::NothingToSave => ApiError::NothingToSave,
            ReconciliationError::BookBalanceChanged { items } => ApiError::BookBalanceChanged(items),
            ReconciliationError::UnknownItem(id) => {
                ApiError::NotFound(format!("盘点表中没有该商品: {}", id))
            }
            other => ApiError::ValidationError(other.to_string()),
        }
    }
}

// ==========================================
// 从 ImportError 转换
// ==========================================
impl From<ImportError> for ApiError {
    fn from(err: ImportError) -> Self {
        match err {
            ImportError::Repository(e) => ApiError::from(e),
            ImportError::FileNotFound(path) => ApiError::NotFound(format!("文件不存在: {}", path)),
            other => ApiError::ImportError(other.to_string()),
        }
    }
}

/// 配置读取失败 → ApiError
pub(crate) fn config_error(err: Box<dyn std::error::Error + Send + Sync>) -> ApiError {
    ApiError::InternalError(format!("配置读取失败: {}", err))
}

/// Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repository_error_mapping() {
        let err: ApiError = RepositoryError::NotFound {
            entity: "Item".to_string(),
            id: "x".to_string(),
        }
        .into();
        assert!(matches!(err, ApiError::NotFound(_)));

        let err: ApiError =
            RepositoryError::BusinessRuleViolation("流水已被盘点封存: m1".to_string()).into();
        assert!(matches!(err, ApiError::MovementSealed(_)));

        let err: ApiError = RepositoryError::Backend {
            message: "boom".to_string(),
            details: None,
            hint: Some("retry".to_string()),
            code: Some("19".to_string()),
        }
        .into();
        assert_eq!(err.to_string(), "数据库错误: boom | retry | code: 19");
    }

    #[test]
    fn test_reconciliation_error_mapping() {
        let err: ApiError = ReconciliationError::PartialEntry {
            item_id: "a".to_string(),
            item: "قطن - بوبلين [1]".to_string(),
        }
        .into();
        assert!(matches!(err, ApiError::ValidationError(_)));

        let err: ApiError = ReconciliationError::NothingToSave.into();
        assert!(matches!(err, ApiError::NothingToSave));
    }
}
