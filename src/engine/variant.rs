// ==========================================
// DFU 需求转移系统 - 新增变体引擎
// ==========================================
// 职责: 为 DFU 新增一个零需求变体,使其可作为转移目标
// 规则: 每个已有 (周次, 来源地) 生成一条记录,以该周桶首条记录为模板
// 红线: 变体已存在时拒绝; 需求总量不变
// ==========================================

use crate::domain::record::DemandRecord;
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::transfer::TransferContext;
use std::collections::HashSet;
use tracing::instrument;

#[derive(Debug, Default)]
pub struct VariantEngine;

impl VariantEngine {
    pub fn new() -> Self {
        Self
    }

    /// 生成新变体的记录（按周桶首次出现顺序）
    ///
    /// # 返回
    /// - Ok(Vec<DemandRecord>): 待追加到会话的新记录
    /// - Err(EngineError): 变体为空 / DFU 不存在 / 变体已存在
    #[instrument(skip(self, records, ctx), fields(records = records.len()))]
    pub fn build_variant_records(
        &self,
        dfu_code: &str,
        records: &[DemandRecord],
        variant: &str,
        ctx: &TransferContext,
    ) -> EngineResult<Vec<DemandRecord>> {
        let variant = variant.trim();
        if variant.is_empty() {
            return Err(EngineError::MissingIdentifier("Product Number".to_string()));
        }
        if records.is_empty() {
            return Err(EngineError::DfuNotFound {
                dfu_code: dfu_code.to_string(),
            });
        }
        if records.iter().any(|r| r.product_number == variant) {
            return Err(EngineError::DuplicateVariant {
                dfu_code: dfu_code.to_string(),
                variant: variant.to_string(),
            });
        }

        let note = ctx.note("variant added");
        let mut seen = HashSet::new();
        let created: Vec<DemandRecord> = records
            .iter()
            .filter(|r| seen.insert(r.week_key()))
            .map(|template| DemandRecord {
                product_number: variant.to_string(),
                weekly_fcst: 0.0,
                part_description: String::new(),
                transfer_history: note.clone(),
                ..template.clone()
            })
            .collect();

        tracing::debug!(variant, created = created.len(), "生成新变体记录");
        Ok(created)
    }
}
