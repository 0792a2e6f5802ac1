// ==========================================
// DFU 需求转移系统 - 引擎层
// ==========================================
// 职责: 实现业务规则引擎,不拼 SQL
// 红线: 引擎只处理 DFU 切片副本,不直接修改会话
// ==========================================

pub mod aggregation;
pub mod consolidation;
pub mod error;
pub mod events;
pub mod locks;
pub mod transfer;
pub mod undo;
pub mod variant;

// 重导出核心引擎
pub use aggregation::AggregationEngine;
pub use consolidation::ConsolidationEngine;
pub use error::{EngineError, EngineResult};
pub use events::{
    BroadcastNotifier, ChangeNotification, ChangeNotifier, ChangeOperation, NoOpNotifier,
    OptionalNotifier,
};
pub use locks::DfuLockRegistry;
pub use transfer::{TransferContext, TransferEngine, TransferOutcome};
pub use undo::UndoEngine;
pub use variant::VariantEngine;
