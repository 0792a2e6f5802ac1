// ==========================================
// DFU 需求转移系统 - 合并引擎
// ==========================================
// 职责: 转移后合并重复的 (变体, 周次, 来源地) 记录
// 输入: DFU 切片
// 输出: 去重后的切片（首条记录为种子,需求量求和,审计文本以 "; " 拼接）
// 红线: 需求总量不变; 记录数只减不增
// ==========================================

use crate::domain::record::DemandRecord;
use std::collections::HashMap;
use tracing::instrument;

#[derive(Debug, Default)]
pub struct ConsolidationEngine;

impl ConsolidationEngine {
    pub fn new() -> Self {
        Self
    }

    /// 合并 DFU 切片（保持首次出现顺序）
    #[instrument(skip_all, fields(records = records.len()))]
    pub fn consolidate(&self, records: Vec<DemandRecord>) -> Vec<DemandRecord> {
        let before = records.len();
        let mut index: HashMap<(String, String, String), usize> = HashMap::new();
        let mut merged: Vec<DemandRecord> = Vec::with_capacity(before);

        for record in records {
            match index.get(&record.consolidation_key()) {
                Some(&slot) => {
                    let seed = &mut merged[slot];
                    seed.weekly_fcst += record.weekly_fcst;
                    seed.append_history(&record.transfer_history);
                }
                None => {
                    index.insert(record.consolidation_key(), merged.len());
                    merged.push(record);
                }
            }
        }

        if merged.len() < before {
            tracing::debug!(before, after = merged.len(), "合并重复记录");
        }
        merged
    }
}
