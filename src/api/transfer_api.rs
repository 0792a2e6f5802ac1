// ==========================================
// DFU 需求转移系统 - 需求转移 API
// ==========================================
// 职责: 聚合查询、转移执行、撤销、新增变体、待执行选择、会话维护
// 并发: 会话位于 RwLock 内; 同一 DFU 的 读取→计算→合并→持久化 由 DFU 锁串行化
// 红线: 先持久化再提交内存; 存储失败时会话保持不变
// ==========================================

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

use crate::api::error::{ApiError, ApiResult};
use crate::domain::action_log::{ActionLog, ActionType};
use crate::domain::aggregate::{AggregationFilter, AggregationResult};
use crate::domain::record::DemandRecord;
use crate::domain::session::Session;
use crate::domain::transfer::{CompletedTransfer, TransferSelection};
use crate::engine::events::{ChangeNotification, ChangeNotifier, ChangeOperation, OptionalNotifier};
use crate::engine::{
    AggregationEngine, DfuLockRegistry, TransferContext, TransferEngine, UndoEngine, VariantEngine,
};
use crate::repository::action_log_repo::ActionLogRepository;
use crate::repository::session_repo::SessionStore;

mod pending;
mod session_ops;

#[cfg(test)]
mod tests;

pub use session_ops::{SupplementaryUploadResponse, UploadResponse};

// ==========================================
// 响应类型
// ==========================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferResponse {
    pub summary: String,
    pub aggregates: AggregationResult,
    pub notification: ChangeNotification,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UndoResponse {
    pub restored_records: usize,
    pub aggregates: AggregationResult,
    pub notification: ChangeNotification,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddVariantResponse {
    pub records_added: usize,
    pub notification: ChangeNotification,
}

/// 当前时间（精确到秒,与存储格式一致）
pub(crate) fn now_timestamp() -> NaiveDateTime {
    let now = chrono::Local::now().naive_local();
    now.with_nanosecond(0).unwrap_or(now)
}

// ==========================================
// DemandTransferApi - 需求转移 API
// ==========================================

/// 需求转移API
///
/// 职责：
/// 1. DFU 聚合视图（当前 / 原始上传）
/// 2. 转移执行与撤销
/// 3. 新增变体
/// 4. 待执行选择编辑
/// 5. 上传、补充数据、导出、重置
/// 6. ActionLog 记录与变更通知
pub struct DemandTransferApi {
    session: RwLock<Session>,
    store: Arc<dyn SessionStore>,
    action_log_repo: Option<Arc<ActionLogRepository>>,
    notifier: OptionalNotifier,
    locks: DfuLockRegistry,
    default_actor: String,
    import_sheet_name: Option<String>,
    aggregation_engine: AggregationEngine,
    transfer_engine: TransferEngine,
    undo_engine: UndoEngine,
    variant_engine: VariantEngine,
}

impl DemandTransferApi {
    /// 创建实例并从存储加载会话
    pub fn new(
        store: Arc<dyn SessionStore>,
        notifier: Option<Arc<dyn ChangeNotifier>>,
    ) -> ApiResult<Self> {
        let stored = store.load_session()?;
        tracing::info!(
            records = stored.records.len(),
            completed = stored.completed_transfers.len(),
            "会话已加载"
        );

        let notifier = match notifier {
            Some(n) => OptionalNotifier::with_notifier(n),
            None => OptionalNotifier::none(),
        };

        Ok(Self {
            session: RwLock::new(Session::from_stored(stored)),
            store,
            action_log_repo: None,
            notifier,
            locks: DfuLockRegistry::new(),
            default_actor: crate::config::DEFAULT_ACTOR.to_string(),
            import_sheet_name: None,
            aggregation_engine: AggregationEngine::new(),
            transfer_engine: TransferEngine::new(),
            undo_engine: UndoEngine::new(),
            variant_engine: VariantEngine::new(),
        })
    }

    pub fn with_action_log(mut self, repo: Arc<ActionLogRepository>) -> Self {
        self.action_log_repo = Some(repo);
        self
    }

    pub fn with_default_actor(mut self, actor: &str) -> Self {
        let actor = actor.trim();
        if !actor.is_empty() {
            self.default_actor = actor.to_string();
        }
        self
    }

    /// Excel 上传读取的工作表（None 表示第一个）
    pub fn with_import_sheet_name(mut self, sheet_name: Option<String>) -> Self {
        self.import_sheet_name = sheet_name;
        self
    }

    // ==========================================
    // 查询接口
    // ==========================================

    /// 当前记录的 DFU 聚合视图
    ///
    /// # 参数
    /// - filter: 工厂/产线过滤（空值表示不过滤）
    pub fn get_aggregates(&self, filter: &AggregationFilter) -> ApiResult<AggregationResult> {
        let session = self.read_session()?;
        Ok(self.aggregation_engine.aggregate(
            session.records(),
            filter,
            session.completed_transfers(),
            Some(session.supplementary()),
        ))
    }

    /// 指定 DFU 的当前记录
    pub fn get_dfu_records(&self, dfu_code: &str) -> ApiResult<Vec<DemandRecord>> {
        let session = self.read_session()?;
        if !session.contains_dfu(dfu_code) {
            return Err(ApiError::NotFound(format!("DFU 不存在: {}", dfu_code)));
        }
        Ok(session.dfu_records(dfu_code))
    }

    pub fn get_completed_transfer(&self, dfu_code: &str) -> ApiResult<Option<CompletedTransfer>> {
        Ok(self.read_session()?.completed(dfu_code).cloned())
    }

    // ==========================================
    // 转移执行
    // ==========================================

    /// 执行转移
    ///
    /// # 参数
    /// - dfu_code: DFU 代码
    /// - selection: 转移指令
    /// - user: 操作人（为空时使用默认操作人）
    ///
    /// # 返回
    /// - Ok(TransferResponse): 摘要、最新聚合视图、变更通知
    /// - Err(ApiError): NotFound / ValidationError / InvalidState / StorageError
    pub fn apply_transfer(
        &self,
        dfu_code: &str,
        selection: &TransferSelection,
        user: &str,
    ) -> ApiResult<TransferResponse> {
        let dfu_code = require_identifier(dfu_code, "DFU")?;
        let selection = &selection.trimmed();
        let actor = self.resolve_actor(user);

        let dfu_lock = self.locks.lock_for(dfu_code);
        let _dfu_guard = dfu_lock.lock().unwrap_or_else(PoisonError::into_inner);

        let (slice, existing, generation) = {
            let session = self.read_session()?;
            if !session.contains_dfu(dfu_code) {
                return Err(ApiError::NotFound(format!("DFU 不存在: {}", dfu_code)));
            }
            (
                session.dfu_records(dfu_code),
                session.completed(dfu_code).cloned(),
                session.generation(),
            )
        };

        let now = now_timestamp();
        let ctx = TransferContext::new(&actor, now);
        let original = slice.clone();
        let outcome = self.transfer_engine.apply(dfu_code, slice, selection, &ctx)?;

        // 原始切片只在首次转移时捕获
        let entry = match &existing {
            Some(previous) => previous.record_followup(selection, &actor, now),
            None => CompletedTransfer::first_capture(dfu_code, selection, &actor, now, original),
        };

        {
            let mut session = self.write_session()?;
            ensure_generation(&session, generation, dfu_code)?;

            let records = session.records_with_dfu_replaced(dfu_code, &outcome.records);
            self.store.save_completed_transfer(dfu_code, &entry)?;
            if let Err(e) = self.store.save_session(&records) {
                self.restore_completed_entry(dfu_code, existing.as_ref());
                return Err(e.into());
            }

            session.set_records(records);
            session.insert_completed(entry);
            session.pending_mut().clear(dfu_code);
        }

        let aggregates = self.get_aggregates(&AggregationFilter::all())?;
        let notification =
            ChangeNotification::for_dfu(dfu_code, ChangeOperation::Transfer, &actor, now)
                .with_transfer_type(outcome.transfer_type);
        self.notifier.publish(&notification);
        self.record_action(
            ActionLog::new(ActionType::Transfer, &actor, now)
                .with_dfu(dfu_code)
                .with_payload(selection)
                .with_detail(outcome.summary.clone()),
        );

        tracing::info!(
            dfu = dfu_code,
            actor = %actor,
            transfer_type = %outcome.transfer_type,
            touched = outcome.touched_records,
            moved = outcome.moved_quantity,
            "转移执行完成"
        );

        Ok(TransferResponse {
            summary: outcome.summary,
            aggregates,
            notification,
        })
    }

    /// 撤销转移（恢复首次转移前的切片）
    pub fn undo_transfer(&self, dfu_code: &str, user: &str) -> ApiResult<UndoResponse> {
        let dfu_code = require_identifier(dfu_code, "DFU")?;
        let actor = self.resolve_actor(user);

        let dfu_lock = self.locks.lock_for(dfu_code);
        let _dfu_guard = dfu_lock.lock().unwrap_or_else(PoisonError::into_inner);

        let (completed, generation) = {
            let session = self.read_session()?;
            let completed = session
                .completed(dfu_code)
                .cloned()
                .ok_or_else(|| ApiError::NotFound(format!("DFU 无已完成转移: {}", dfu_code)))?;
            (completed, session.generation())
        };

        let restored = self.undo_engine.restore(&completed)?;
        let restored_records = restored.len();
        let now = now_timestamp();

        {
            let mut session = self.write_session()?;
            ensure_generation(&session, generation, dfu_code)?;

            let records = session.records_with_dfu_replaced(dfu_code, &restored);
            self.store.delete_completed_transfer(dfu_code)?;
            if let Err(e) = self.store.save_session(&records) {
                self.restore_completed_entry(dfu_code, Some(&completed));
                return Err(e.into());
            }

            session.set_records(records);
            session.remove_completed(dfu_code);
            session.pending_mut().clear(dfu_code);
        }

        let aggregates = self.get_aggregates(&AggregationFilter::all())?;
        let notification = ChangeNotification::for_dfu(dfu_code, ChangeOperation::Undo, &actor, now)
            .with_transfer_type(completed.transfer_type);
        self.notifier.publish(&notification);
        self.record_action(
            ActionLog::new(ActionType::Undo, &actor, now)
                .with_dfu(dfu_code)
                .with_payload(&serde_json::json!({
                    "restored_records": restored_records,
                    "undone_transfers": completed.transfer_count,
                }))
                .with_detail(format!(
                    "Undo for DFU {}: restored {} record(s) captured before {} transfer(s)",
                    dfu_code, restored_records, completed.transfer_count
                )),
        );

        tracing::info!(dfu = dfu_code, actor = %actor, restored = restored_records, "撤销完成");

        Ok(UndoResponse {
            restored_records,
            aggregates,
            notification,
        })
    }

    /// 新增零需求变体
    pub fn add_variant(&self, dfu_code: &str, variant: &str, user: &str) -> ApiResult<AddVariantResponse> {
        let dfu_code = require_identifier(dfu_code, "DFU")?;
        let variant = require_identifier(variant, "Product Number")?;
        let actor = self.resolve_actor(user);

        let dfu_lock = self.locks.lock_for(dfu_code);
        let _dfu_guard = dfu_lock.lock().unwrap_or_else(PoisonError::into_inner);

        let (slice, generation) = {
            let session = self.read_session()?;
            if !session.contains_dfu(dfu_code) {
                return Err(ApiError::NotFound(format!("DFU 不存在: {}", dfu_code)));
            }
            (session.dfu_records(dfu_code), session.generation())
        };

        let now = now_timestamp();
        let ctx = TransferContext::new(&actor, now);
        let created = self
            .variant_engine
            .build_variant_records(dfu_code, &slice, variant, &ctx)?;
        let records_added = created.len();

        {
            let mut session = self.write_session()?;
            ensure_generation(&session, generation, dfu_code)?;

            let mut merged = slice;
            merged.extend(created);
            let records = session.records_with_dfu_replaced(dfu_code, &merged);
            self.store.save_session(&records)?;
            session.set_records(records);
        }

        let notification = ChangeNotification::for_dfu(dfu_code, ChangeOperation::AddVariant, &actor, now);
        self.notifier.publish(&notification);
        self.record_action(
            ActionLog::new(ActionType::AddVariant, &actor, now)
                .with_dfu(dfu_code)
                .with_payload(&serde_json::json!({ "variant": variant, "records_added": records_added }))
                .with_detail(format!(
                    "Added variant {} to DFU {} with {} zero-demand record(s)",
                    variant, dfu_code, records_added
                )),
        );

        tracing::info!(dfu = dfu_code, variant, records_added, "新增变体完成");

        Ok(AddVariantResponse {
            records_added,
            notification,
        })
    }

    // ==========================================
    // 内部辅助
    // ==========================================

    fn read_session(&self) -> ApiResult<RwLockReadGuard<'_, Session>> {
        self.session
            .read()
            .map_err(|e| ApiError::InternalError(format!("会话锁获取失败: {}", e)))
    }

    fn write_session(&self) -> ApiResult<RwLockWriteGuard<'_, Session>> {
        self.session
            .write()
            .map_err(|e| ApiError::InternalError(format!("会话锁获取失败: {}", e)))
    }

    fn resolve_actor(&self, user: &str) -> String {
        let user = user.trim();
        if user.is_empty() {
            self.default_actor.clone()
        } else {
            user.to_string()
        }
    }

    /// 记录存储失败后恢复已完成转移（补偿失败只记录 warn）
    fn restore_completed_entry(&self, dfu_code: &str, previous: Option<&CompletedTransfer>) {
        let result = match previous {
            Some(entry) => self.store.save_completed_transfer(dfu_code, entry),
            None => self.store.delete_completed_transfer(dfu_code),
        };
        if let Err(e) = result {
            tracing::warn!(dfu = dfu_code, "已完成转移补偿失败: {}", e);
        }
    }

    /// 写入操作日志（失败只记录 warn,操作本身已成功）
    fn record_action(&self, log: ActionLog) {
        let Some(repo) = &self.action_log_repo else {
            return;
        };
        if let Err(e) = repo.insert(&log) {
            tracing::warn!(action_type = %log.action_type, "操作日志写入失败: {}", e);
        }
    }
}

fn require_identifier<'a>(value: &'a str, field: &str) -> ApiResult<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ApiError::ValidationError(format!("{} 不能为空", field)));
    }
    Ok(trimmed)
}

/// 计算期间会话被整体替换（上传/重置）时拒绝提交
fn ensure_generation(session: &Session, expected: u64, dfu_code: &str) -> ApiResult<()> {
    if session.generation() != expected {
        return Err(ApiError::InvalidState(format!(
            "会话已被重新上传或重置,操作已放弃: dfu={}",
            dfu_code
        )));
    }
    Ok(())
}
