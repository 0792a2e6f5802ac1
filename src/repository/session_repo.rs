// ==========================================
// DFU 需求转移系统 - 会话数据仓储
// ==========================================
// 职责: 会话状态的持久化（当前记录、原始上传快照、
//       已完成转移、上传标记、补充数据）
// 对齐: demand_record / completed_transfer / session_meta 表
// 红线: Repository 不含业务逻辑
// ==========================================

use crate::domain::record::DemandRecord;
use crate::domain::session::{StoredSession, UploadInfo};
use crate::domain::supplementary::SupplementaryData;
use crate::domain::transfer::CompletedTransfer;
use crate::repository::error::RepositoryResult;

mod core;
mod mapping;


pub use core::SqliteSessionRepository;

// ==========================================
// SessionStore - 会话存储协作者
// ==========================================
// API 层只依赖此 trait; 测试可注入失败实现
pub trait SessionStore: Send + Sync {
    /// 加载完整会话（空库返回默认会话）
    fn load_session(&self) -> RepositoryResult<StoredSession>;

    /// 整体替换当前记录
    fn save_session(&self, records: &[DemandRecord]) -> RepositoryResult<()>;

    /// 写入/覆盖某 DFU 的已完成转移
    fn save_completed_transfer(&self, dfu_code: &str, entry: &CompletedTransfer) -> RepositoryResult<()>;

    fn delete_completed_transfer(&self, dfu_code: &str) -> RepositoryResult<()>;

    /// 新上传: 替换当前记录与原始快照,清空已完成转移
    fn save_upload(&self, records: &[DemandRecord], upload: &UploadInfo) -> RepositoryResult<()>;

    fn save_supplementary(&self, data: &SupplementaryData) -> RepositoryResult<()>;

    /// 清空全部会话数据
    fn clear(&self) -> RepositoryResult<()>;
}
