// ==========================================
// DFU 需求转移系统 - 撤销引擎
// ==========================================
// 职责: 依据已完成转移中的原始切片恢复 DFU
// 红线: 原始切片为空时拒绝撤销（该 DFU 视为未完成）
// ==========================================

use crate::domain::record::DemandRecord;
use crate::domain::transfer::CompletedTransfer;
use crate::engine::error::{EngineError, EngineResult};
use tracing::instrument;

#[derive(Debug, Default)]
pub struct UndoEngine;

impl UndoEngine {
    pub fn new() -> Self {
        Self
    }

    /// 取回首次转移前的切片
    #[instrument(skip_all, fields(dfu_code = %completed.dfu_code, transfer_count = completed.transfer_count))]
    pub fn restore(&self, completed: &CompletedTransfer) -> EngineResult<Vec<DemandRecord>> {
        if completed.original_records.is_empty() {
            return Err(EngineError::NoOriginalSnapshot {
                dfu_code: completed.dfu_code.clone(),
            });
        }
        Ok(completed.original_records.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::transfer::TransferSelection;
    use chrono::NaiveDate;

    fn completed(original: Vec<DemandRecord>) -> CompletedTransfer {
        CompletedTransfer::first_capture(
            "D100",
            &TransferSelection::Bulk { target: "B".to_string() },
            "alice",
            NaiveDate::from_ymd_opt(2026, 3, 2)
                .unwrap()
                .and_hms_opt(8, 0, 0)
                .unwrap(),
            original,
        )
    }

    #[test]
    fn test_restore_returns_original_slice() {
        let original = vec![DemandRecord {
            dfu_code: "D100".to_string(),
            product_number: "A".to_string(),
            weekly_fcst: 50.0,
            ..Default::default()
        }];
        let restored = UndoEngine::new().restore(&completed(original.clone())).unwrap();
        assert_eq!(restored, original);
    }

    #[test]
    fn test_empty_snapshot_is_rejected() {
        let err = UndoEngine::new().restore(&completed(vec![])).unwrap_err();
        assert_eq!(
            err,
            EngineError::NoOriginalSnapshot {
                dfu_code: "D100".to_string()
            }
        );
    }
}
