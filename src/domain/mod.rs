// ==========================================
// DFU 需求转移系统 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod action_log;
pub mod aggregate;
pub mod pending;
pub mod record;
pub mod session;
pub mod supplementary;
pub mod transfer;

// 重导出核心类型
pub use action_log::{ActionLog, ActionType};
pub use aggregate::{
    AggregationFilter, AggregationResult, DfuAggregate, VariantSummary, WeeklyBucket,
};
pub use pending::{GranularCell, PendingSelection, PendingSelections};
pub use record::{columns, DemandRecord, WeekKey};
pub use session::{Session, StoredSession, UploadInfo};
pub use supplementary::{SupplementaryData, SupplementaryKind, VariantLifecycle};
pub use transfer::{
    CompletedTransfer, CompletionInfo, GranularEntry, TransferSelection, TransferType,
};
