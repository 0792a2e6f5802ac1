// ==========================================
// DFU 需求转移系统 - 引擎层错误类型
// ==========================================
// 工具: thiserror 派生宏
// ==========================================

use thiserror::Error;

/// 引擎层错误类型
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("DFU 不存在: {dfu_code}")]
    DfuNotFound { dfu_code: String },

    #[error("转移选择为空: dfu={dfu_code}")]
    EmptySelection { dfu_code: String },

    #[error("目标变体不属于该 DFU: dfu={dfu_code}, variant={variant}")]
    UnknownVariant { dfu_code: String, variant: String },

    #[error("变体已存在: dfu={dfu_code}, variant={variant}")]
    DuplicateVariant { dfu_code: String, variant: String },

    #[error("转移数量无效: dfu={dfu_code}, quantity={quantity}")]
    InvalidQuantity { dfu_code: String, quantity: f64 },

    #[error("缺少必填标识: {0}")]
    MissingIdentifier(String),

    #[error("无可撤销的原始数据: dfu={dfu_code}")]
    NoOriginalSnapshot { dfu_code: String },
}

/// Result 类型别名
pub type EngineResult<T> = Result<T, EngineError>;
