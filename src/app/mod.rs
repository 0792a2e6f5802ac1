// ==========================================
// DFU 需求转移系统 - 应用层
// ==========================================
// 职责: 组装存储、配置、通知与 API,供传输层持有
// ==========================================

pub mod state;

// 重导出
pub use state::{get_default_db_path, AppState};
