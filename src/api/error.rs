// ==========================================
// DFU 需求转移系统 - API层错误类型
// ==========================================
// 职责: 定义API层错误类型，转换引擎/仓储/导入错误为调用方可理解的错误
// 红线: 所有错误信息必须包含 DFU 或操作上下文
// ==========================================

use crate::engine::error::EngineError;
use crate::importer::error::ImportError;
use crate::repository::error::RepositoryError;
use thiserror::Error;

/// API层错误类型
#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // 调用方错误
    // ==========================================
    #[error("数据验证失败: {0}")]
    ValidationError(String),

    #[error("资源未找到: {0}")]
    NotFound(String),

    #[error("无效状态: {0}")]
    InvalidState(String),

    // ==========================================
    // 数据访问 / 导入错误
    // ==========================================
    #[error("存储失败: {0}")]
    StorageError(String),

    #[error("文件导入失败: {0}")]
    ImportError(String),

    // ==========================================
    // 通用错误
    // ==========================================
    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ApiError {
    /// 稳定的错误类别标识（供传输层映射状态码）
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::ValidationError(_) => "VALIDATION_ERROR",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::InvalidState(_) => "INVALID_STATE",
            ApiError::StorageError(_) => "STORAGE_ERROR",
            ApiError::ImportError(_) => "IMPORT_ERROR",
            ApiError::InternalError(_) | ApiError::Other(_) => "INTERNAL_ERROR",
        }
    }
}

// ==========================================
// 从 RepositoryError 转换
// ==========================================
impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::LockError(msg) => {
                ApiError::StorageError(format!("数据库锁获取失败: {}", msg))
            }
            other => ApiError::StorageError(other.to_string()),
        }
    }
}

// ==========================================
// 从 EngineError 转换
// ==========================================
impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::DfuNotFound { .. } => ApiError::NotFound(err.to_string()),
            EngineError::NoOriginalSnapshot { .. } => ApiError::InvalidState(err.to_string()),
            EngineError::EmptySelection { .. }
            | EngineError::UnknownVariant { .. }
            | EngineError::DuplicateVariant { .. }
            | EngineError::InvalidQuantity { .. }
            | EngineError::MissingIdentifier(_) => ApiError::ValidationError(err.to_string()),
        }
    }
}

// ==========================================
// 从 ImportError 转换
// ==========================================
impl From<ImportError> for ApiError {
    fn from(err: ImportError) -> Self {
        ApiError::ImportError(err.to_string())
    }
}

/// Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;
