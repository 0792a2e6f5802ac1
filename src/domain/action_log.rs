// ==========================================
// DFU 需求转移系统 - 操作日志领域模型
// ==========================================
// 职责: 记录每次成功的会话变更（上传、转移、撤销、新增变体、重置）
// 红线: 所有写入必须记录
// 对齐: action_log 表
// ==========================================

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

// ==========================================
// ActionLog - 操作日志
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionLog {
    pub action_id: String,        // 日志ID (UUID)
    pub action_type: String,      // 操作类型 (存储为字符串)
    pub action_ts: NaiveDateTime, // 操作时间戳
    pub actor: String,            // 操作人
    pub dfu_code: Option<String>, // 关联 DFU（会话级操作为 None）

    pub payload_json: Option<JsonValue>, // 操作参数 (JSON)
    pub detail: Option<String>,          // 可读摘要
}

// ==========================================
// ActionType - 操作类型
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionType {
    Upload,              // 上传需求数据
    SupplementaryUpload, // 上传补充数据
    Transfer,            // 执行转移
    Undo,                // 撤销转移
    AddVariant,          // 新增变体
    Reset,               // 重置会话
}

impl ActionType {
    /// 转换为字符串 (用于数据库存储)
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::Upload => "Upload",
            ActionType::SupplementaryUpload => "SupplementaryUpload",
            ActionType::Transfer => "Transfer",
            ActionType::Undo => "Undo",
            ActionType::AddVariant => "AddVariant",
            ActionType::Reset => "Reset",
        }
    }

    /// 从字符串解析
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Upload" => Some(ActionType::Upload),
            "SupplementaryUpload" => Some(ActionType::SupplementaryUpload),
            "Transfer" => Some(ActionType::Transfer),
            "Undo" => Some(ActionType::Undo),
            "AddVariant" => Some(ActionType::AddVariant),
            "Reset" => Some(ActionType::Reset),
            _ => None,
        }
    }
}

impl ActionLog {
    /// 创建新的操作日志
    pub fn new(action_type: ActionType, actor: &str, action_ts: NaiveDateTime) -> Self {
        Self {
            action_id: uuid::Uuid::new_v4().to_string(),
            action_type: action_type.as_str().to_string(),
            action_ts,
            actor: actor.to_string(),
            dfu_code: None,
            payload_json: None,
            detail: None,
        }
    }

    pub fn with_dfu(mut self, dfu_code: &str) -> Self {
        self.dfu_code = Some(dfu_code.to_string());
        self
    }

    /// 设置操作负载 (转换为JSON)
    pub fn with_payload<T: Serialize>(mut self, payload: &T) -> Self {
        self.payload_json = serde_json::to_value(payload).ok();
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_type_roundtrip() {
        for action_type in [
            ActionType::Upload,
            ActionType::SupplementaryUpload,
            ActionType::Transfer,
            ActionType::Undo,
            ActionType::AddVariant,
            ActionType::Reset,
        ] {
            assert_eq!(ActionType::parse(action_type.as_str()), Some(action_type));
        }
        assert_eq!(ActionType::parse("Recalc"), None);
    }

    #[test]
    fn test_builder() {
        let ts = chrono::NaiveDate::from_ymd_opt(2026, 1, 5)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap();
        let log = ActionLog::new(ActionType::Undo, "alice", ts)
            .with_dfu("D100")
            .with_payload(&serde_json::json!({ "restored": 2 }))
            .with_detail("undo");

        assert_eq!(log.action_type, "Undo");
        assert_eq!(log.dfu_code.as_deref(), Some("D100"));
        assert_eq!(log.payload_json.unwrap()["restored"], 2);
        assert_eq!(log.action_id.len(), 36);
    }
}
