// ==========================================
// DFU 需求转移系统 - API 层
// ==========================================
// 职责: 提供业务 API 接口,供传输层调用
// ==========================================

pub mod error;
pub mod transfer_api;

// 重导出核心类型
pub use error::{ApiError, ApiResult};
pub use transfer_api::{
    AddVariantResponse, DemandTransferApi, SupplementaryUploadResponse, TransferResponse,
    UndoResponse, UploadResponse,
};
