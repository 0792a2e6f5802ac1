// ==========================================
// DFU 需求转移系统 - 转移领域模型
// ==========================================
// 职责: 转移指令（整体/逐变体/按周）与已完成转移记录
// 红线: 原始切片只在首次转移时捕获,之后的转移不覆盖
// ==========================================

use crate::domain::record::{DemandRecord, WeekKey};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

// ==========================================
// TransferType - 转移类型
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferType {
    Bulk,       // 整体转移: 全部变体 → 单一目标
    Individual, // 逐变体转移: 源变体 → 各自目标
    Granular,   // 按周转移: 指定周/来源地的部分数量
}

impl TransferType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferType::Bulk => "bulk",
            TransferType::Individual => "individual",
            TransferType::Granular => "granular",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "bulk" => Some(TransferType::Bulk),
            "individual" => Some(TransferType::Individual),
            "granular" => Some(TransferType::Granular),
            _ => None,
        }
    }
}

impl fmt::Display for TransferType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ==========================================
// GranularEntry - 按周转移条目
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GranularEntry {
    pub source: String,
    pub target: String,
    pub week: WeekKey,
    /// None 表示转移源记录的全部当前需求
    pub custom_quantity: Option<f64>,
}

// ==========================================
// TransferSelection - 转移指令
// ==========================================
// 由调用方显式选择一种形态,不存在隐式优先级扫描
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransferSelection {
    Bulk { target: String },
    Individual { mapping: BTreeMap<String, String> },
    Granular { entries: Vec<GranularEntry> },
}

impl TransferSelection {
    pub fn transfer_type(&self) -> TransferType {
        match self {
            TransferSelection::Bulk { .. } => TransferType::Bulk,
            TransferSelection::Individual { .. } => TransferType::Individual,
            TransferSelection::Granular { .. } => TransferType::Granular,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            TransferSelection::Bulk { target } => target.trim().is_empty(),
            TransferSelection::Individual { mapping } => mapping.is_empty(),
            TransferSelection::Granular { entries } => entries.is_empty(),
        }
    }

    /// 去除变体标识两端空白
    pub fn trimmed(&self) -> TransferSelection {
        let trim = |s: &String| s.trim().to_string();
        match self {
            TransferSelection::Bulk { target } => TransferSelection::Bulk {
                target: trim(target),
            },
            TransferSelection::Individual { mapping } => TransferSelection::Individual {
                mapping: mapping.iter().map(|(k, v)| (trim(k), trim(v))).collect(),
            },
            TransferSelection::Granular { entries } => TransferSelection::Granular {
                entries: entries
                    .iter()
                    .map(|e| GranularEntry {
                        source: trim(&e.source),
                        target: trim(&e.target),
                        ..e.clone()
                    })
                    .collect(),
            },
        }
    }

    /// 第一个非有限的自定义数量
    pub fn non_finite_quantity(&self) -> Option<f64> {
        match self {
            TransferSelection::Granular { entries } => entries
                .iter()
                .filter_map(|e| e.custom_quantity)
                .find(|q| !q.is_finite()),
            _ => None,
        }
    }

    /// 涉及的目标变体（去重、排序）
    pub fn targets(&self) -> Vec<String> {
        let targets: BTreeSet<String> = match self {
            TransferSelection::Bulk { target } => std::iter::once(target.clone()).collect(),
            TransferSelection::Individual { mapping } => mapping.values().cloned().collect(),
            TransferSelection::Granular { entries } => {
                entries.iter().map(|e| e.target.clone()).collect()
            }
        };
        targets.into_iter().collect()
    }
}

// ==========================================
// CompletedTransfer - 已完成转移
// ==========================================
// 用途: 撤销的唯一依据
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletedTransfer {
    pub dfu_code: String,
    pub transfer_type: TransferType, // 最近一次转移类型
    pub targets: Vec<String>,        // 最近一次转移目标
    pub executed_at: NaiveDateTime,
    pub executed_by: String,
    pub transfer_count: u32, // 自首次捕获以来执行的转移次数
    pub original_records: Vec<DemandRecord>, // 首次转移前的 DFU 切片
}

impl CompletedTransfer {
    /// 首次转移: 捕获原始切片
    pub fn first_capture(
        dfu_code: &str,
        selection: &TransferSelection,
        executed_by: &str,
        executed_at: NaiveDateTime,
        original_records: Vec<DemandRecord>,
    ) -> Self {
        Self {
            dfu_code: dfu_code.to_string(),
            transfer_type: selection.transfer_type(),
            targets: selection.targets(),
            executed_at,
            executed_by: executed_by.to_string(),
            transfer_count: 1,
            original_records,
        }
    }

    /// 后续转移: 更新元数据,保留原始切片
    pub fn record_followup(
        &self,
        selection: &TransferSelection,
        executed_by: &str,
        executed_at: NaiveDateTime,
    ) -> Self {
        Self {
            dfu_code: self.dfu_code.clone(),
            transfer_type: selection.transfer_type(),
            targets: selection.targets(),
            executed_at,
            executed_by: executed_by.to_string(),
            transfer_count: self.transfer_count + 1,
            original_records: self.original_records.clone(),
        }
    }

    pub fn completion_info(&self) -> CompletionInfo {
        CompletionInfo {
            transfer_type: self.transfer_type,
            targets: self.targets.clone(),
            executed_at: self.executed_at,
            executed_by: self.executed_by.clone(),
            transfer_count: self.transfer_count,
        }
    }
}

/// 聚合视图中附带的完成信息（不含原始切片）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionInfo {
    pub transfer_type: TransferType,
    pub targets: Vec<String>,
    pub executed_at: NaiveDateTime,
    pub executed_by: String,
    pub transfer_count: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts(hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, 2)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_selection_targets_are_deduplicated() {
        let mut mapping = BTreeMap::new();
        mapping.insert("A".to_string(), "C".to_string());
        mapping.insert("B".to_string(), "C".to_string());
        let selection = TransferSelection::Individual { mapping };

        assert_eq!(selection.transfer_type(), TransferType::Individual);
        assert_eq!(selection.targets(), vec!["C".to_string()]);
        assert!(!selection.is_empty());
    }

    #[test]
    fn test_blank_bulk_target_is_empty() {
        let selection = TransferSelection::Bulk {
            target: "  ".to_string(),
        };
        assert!(selection.is_empty());
    }

    #[test]
    fn test_trimmed_strips_variant_identifiers() {
        let selection = TransferSelection::Bulk {
            target: " B ".to_string(),
        };
        assert_eq!(
            selection.trimmed(),
            TransferSelection::Bulk {
                target: "B".to_string()
            }
        );

        let mut mapping = BTreeMap::new();
        mapping.insert(" A".to_string(), "C ".to_string());
        let trimmed = TransferSelection::Individual { mapping }.trimmed();
        assert_eq!(trimmed.targets(), vec!["C".to_string()]);
    }

    #[test]
    fn test_followup_keeps_original_slice() {
        let original = vec![DemandRecord {
            dfu_code: "D1".to_string(),
            product_number: "A".to_string(),
            weekly_fcst: 10.0,
            ..Default::default()
        }];
        let first = CompletedTransfer::first_capture(
            "D1",
            &TransferSelection::Bulk { target: "B".to_string() },
            "alice",
            ts(8),
            original.clone(),
        );
        let second = first.record_followup(
            &TransferSelection::Bulk { target: "A".to_string() },
            "bob",
            ts(9),
        );

        assert_eq!(second.original_records, original);
        assert_eq!(second.transfer_count, 2);
        assert_eq!(second.executed_by, "bob");
        assert_eq!(second.targets, vec!["A".to_string()]);
    }

    #[test]
    fn test_selection_serde_is_tagged() {
        let selection = TransferSelection::Bulk { target: "B".to_string() };
        let json = serde_json::to_value(&selection).unwrap();
        assert_eq!(json["type"], "bulk");
        assert_eq!(json["target"], "B");
    }
}
