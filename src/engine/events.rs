// ==========================================
// DFU 需求转移系统 - 变更通知
// ==========================================
// 职责: 定义变更通知 trait,实现依赖倒置
// 说明: API 层只依赖 ChangeNotifier,传输层自行订阅
// 实现: 空操作 / tokio broadcast 广播
// ==========================================

use crate::domain::transfer::TransferType;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::sync::Arc;
use tokio::sync::broadcast;

// ==========================================
// 变更类型
// ==========================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeOperation {
    Upload,
    SupplementaryUpload,
    Transfer,
    Undo,
    AddVariant,
    Reset,
}

impl ChangeOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeOperation::Upload => "upload",
            ChangeOperation::SupplementaryUpload => "supplementary_upload",
            ChangeOperation::Transfer => "transfer",
            ChangeOperation::Undo => "undo",
            ChangeOperation::AddVariant => "add_variant",
            ChangeOperation::Reset => "reset",
        }
    }
}

/// 变更通知
///
/// 每次成功的变更都会生成一条,既作为返回值,也通过 ChangeNotifier 发布
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeNotification {
    /// 受影响的 DFU（None 表示整个会话）
    pub dfu_code: Option<String>,
    pub actor: String,
    pub operation: ChangeOperation,
    /// 仅转移操作携带
    pub transfer_type: Option<TransferType>,
    pub occurred_at: NaiveDateTime,
}

impl ChangeNotification {
    /// 会话级通知
    pub fn session_wide(operation: ChangeOperation, actor: &str, occurred_at: NaiveDateTime) -> Self {
        Self {
            dfu_code: None,
            actor: actor.to_string(),
            operation,
            transfer_type: None,
            occurred_at,
        }
    }

    /// DFU 级通知
    pub fn for_dfu(
        dfu_code: &str,
        operation: ChangeOperation,
        actor: &str,
        occurred_at: NaiveDateTime,
    ) -> Self {
        Self {
            dfu_code: Some(dfu_code.to_string()),
            ..Self::session_wide(operation, actor, occurred_at)
        }
    }

    pub fn with_transfer_type(mut self, transfer_type: TransferType) -> Self {
        self.transfer_type = Some(transfer_type);
        self
    }
}

// ==========================================
// 通知发布 Trait
// ==========================================

/// 变更通知发布者
///
/// # 返回
/// - `Ok(receivers)`: 收到通知的订阅者数量（不支持时为 0）
/// - `Err`: 发布失败（调用方只记录 warn,不影响已成功的操作）
pub trait ChangeNotifier: Send + Sync {
    fn notify(&self, notification: &ChangeNotification) -> Result<usize, Box<dyn Error + Send + Sync>>;
}

/// 空操作发布者
#[derive(Debug, Clone, Default)]
pub struct NoOpNotifier;

impl ChangeNotifier for NoOpNotifier {
    fn notify(&self, notification: &ChangeNotification) -> Result<usize, Box<dyn Error + Send + Sync>> {
        tracing::debug!(
            "NoOpNotifier: 跳过通知 - operation={}, dfu={:?}",
            notification.operation.as_str(),
            notification.dfu_code
        );
        Ok(0)
    }
}

/// 广播发布者（tokio broadcast）
///
/// 无订阅者时发送失败视为正常,返回 0
pub struct BroadcastNotifier {
    tx: broadcast::Sender<ChangeNotification>,
}

impl BroadcastNotifier {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeNotification> {
        self.tx.subscribe()
    }

    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl ChangeNotifier for BroadcastNotifier {
    fn notify(&self, notification: &ChangeNotification) -> Result<usize, Box<dyn Error + Send + Sync>> {
        match self.tx.send(notification.clone()) {
            Ok(receivers) => Ok(receivers),
            Err(_) => {
                tracing::debug!(
                    "BroadcastNotifier: 无订阅者 - operation={}",
                    notification.operation.as_str()
                );
                Ok(0)
            }
        }
    }
}

/// 可选的通知发布者包装
///
/// 简化 Option<Arc<dyn ChangeNotifier>> 的使用
#[derive(Clone)]
pub struct OptionalNotifier {
    inner: Option<Arc<dyn ChangeNotifier>>,
}

impl OptionalNotifier {
    pub fn with_notifier(notifier: Arc<dyn ChangeNotifier>) -> Self {
        Self {
            inner: Some(notifier),
        }
    }

    pub fn none() -> Self {
        Self { inner: None }
    }

    /// 发布通知; 失败只记录 warn
    pub fn publish(&self, notification: &ChangeNotification) {
        let Some(notifier) = &self.inner else {
            tracing::debug!(
                "OptionalNotifier: 未配置发布者,跳过通知 - operation={}",
                notification.operation.as_str()
            );
            return;
        };

        if let Err(e) = notifier.notify(notification) {
            tracing::warn!(
                operation = notification.operation.as_str(),
                dfu = ?notification.dfu_code,
                "变更通知发布失败: {}",
                e
            );
        }
    }

    pub fn is_configured(&self) -> bool {
        self.inner.is_some()
    }
}

impl Default for OptionalNotifier {
    fn default() -> Self {
        Self::none()
    }
}
