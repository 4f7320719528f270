// ==========================================
// 纺织品库存台账系统 - 仓储层错误类型
// ==========================================
// 工具: thiserror 派生宏
// 约定: 后端错误原样透出（message | details | hint | code）
// ==========================================

use thiserror::Error;

/// 仓储层错误类型
#[derive(Error, Debug)]
pub enum RepositoryError {
    // ===== 数据库错误 =====
    #[error("记录未找到: {entity} with id={id}")]
    NotFound { entity: String, id: String },

    #[error("数据库锁获取失败: {0}")]
    LockError(String),

    #[error("数据库事务失败: {0}")]
    DatabaseTransactionError(String),

    #[error("数据库查询失败: {0}")]
    DatabaseQueryError(String),

    #[error("唯一约束违反: {0}")]
    UniqueConstraintViolation(String),

    #[error("外键约束违反: {0}")]
    ForeignKeyViolation(String),

    /// 后端返回的原始错误
    #[error("{}", explain_backend(.message, .details, .hint, .code))]
    Backend {
        message: String,
        details: Option<String>,
        hint: Option<String>,
        code: Option<String>,
    },

    // ===== 业务规则错误 =====
    #[error("业务规则违反: {0}")]
    BusinessRuleViolation(String),

    // ===== 数据质量错误 =====
    #[error("数据验证失败: {0}")]
    ValidationError(String),

    #[error("字段值错误 (field={field}): {message}")]
    FieldValueError { field: String, message: String },

    // ===== 通用错误 =====
    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

fn explain_backend(
    message: &str,
    details: &Option<String>,
    hint: &Option<String>,
    code: &Option<String>,
) -> String {
    explain_parts(message, details.as_deref(), hint.as_deref(), code.as_deref())
}

/// 拼接 "message | details | hint | code: X"（空段省略）
pub fn explain_parts(
    message: &str,
    details: Option<&str>,
    hint: Option<&str>,
    code: Option<&str>,
) -> String {
    let mut parts: Vec<String> = Vec::new();
    for p in [Some(message), details, hint] {
        if let Some(p) = p.map(str::trim).filter(|p| !p.is_empty()) {
            parts.push(p.to_string());
        }
    }
    if let Some(code) = code.map(str::trim).filter(|c| !c.is_empty()) {
        parts.push(format!("code: {}", code));
    }
    parts.join(" | ")
}

impl RepositoryError {
    /// 面向操作员的完整错误文本
    pub fn explain(&self) -> String {
        self.to_string()
    }

    /// 是否为外键引用导致的拒绝
    pub fn is_foreign_key(&self) -> bool {
        matches!(self, RepositoryError::ForeignKeyViolation(_))
    }
}

// 实现 From<rusqlite::Error>
impl From<rusqlite::Error> for RepositoryError {
    fn from(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::SqliteFailure(ffi_err, msg) => {
                let message = msg.unwrap_or_else(|| ffi_err.to_string());
                if message.contains("UNIQUE") {
                    RepositoryError::UniqueConstraintViolation(message)
                } else if message.contains("FOREIGN KEY") {
                    RepositoryError::ForeignKeyViolation(message)
                } else {
                    RepositoryError::Backend {
                        message,
                        details: Some(format!("{:?}", ffi_err.code)),
                        hint: None,
                        code: Some(ffi_err.extended_code.to_string()),
                    }
                }
            }
            rusqlite::Error::QueryReturnedNoRows => RepositoryError::NotFound {
                entity: "Unknown".to_string(),
                id: "Unknown".to_string(),
            },
            _ => RepositoryError::DatabaseQueryError(err.to_string()),
        }
    }
}

/// Result 类型别名
pub type RepositoryResult<T> = Result<T, RepositoryError>;
