// ==========================================
// 成本情报系统 - API 错误类型
// ==========================================
// 约定: NotFound / InvalidInput 是调用方可处理的业务错误,
//       其余仓储故障折叠为 Internal
// ==========================================

use crate::repository::error::RepositoryError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("参数错误: {0}")]
    InvalidInput(String),

    #[error("{entity} 不存在: {id}")]
    NotFound { entity: String, id: String },

    #[error("内部错误: {0}")]
    Internal(String),
}

impl From<RepositoryError> for ApiError {
    fn from(e: RepositoryError) -> Self {
        match e {
            RepositoryError::NotFound { entity, id } => ApiError::NotFound { entity, id },
            RepositoryError::ValidationError(msg) => ApiError::InvalidInput(msg),
            RepositoryError::FieldValueError { field, message } => {
                ApiError::InvalidInput(format!("{}: {}", field, message))
            }
            other => ApiError::Internal(other.to_string()),
        }
    }
}

/// Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;
