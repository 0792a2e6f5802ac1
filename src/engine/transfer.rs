// ==========================================
// DFU 需求转移系统 - 转移引擎
// ==========================================
// 职责: 在 DFU 切片上执行整体/逐变体/按周转移
// 输入: DFU 切片副本 + 转移指令 + 操作上下文
// 输出: 合并后的新切片 + 执行摘要
// 红线: 转移前后 DFU 需求总量不变
// 红线: 按周转移允许源记录变为负数,不做截断
// ==========================================

use crate::domain::record::{DemandRecord, WeekKey};
use crate::domain::transfer::{GranularEntry, TransferSelection, TransferType};
use crate::engine::consolidation::ConsolidationEngine;
use crate::engine::error::{EngineError, EngineResult};
use chrono::NaiveDateTime;
use std::collections::{BTreeMap, BTreeSet};
use tracing::instrument;

/// 审计文本中的时间格式
const NOTE_TS_FORMAT: &str = "%Y-%m-%d %H:%M";

// ==========================================
// TransferContext - 操作上下文
// ==========================================
#[derive(Debug, Clone)]
pub struct TransferContext {
    pub actor: String,
    pub executed_at: NaiveDateTime,
}

impl TransferContext {
    pub fn new(actor: &str, executed_at: NaiveDateTime) -> Self {
        Self {
            actor: actor.to_string(),
            executed_at,
        }
    }

    /// 审计文本前缀: "[2026-03-02 08:00] alice:"
    pub fn note(&self, body: &str) -> String {
        format!(
            "[{}] {}: {}",
            self.executed_at.format(NOTE_TS_FORMAT),
            self.actor,
            body
        )
    }
}

// ==========================================
// TransferOutcome - 转移结果
// ==========================================
#[derive(Debug, Clone)]
pub struct TransferOutcome {
    pub records: Vec<DemandRecord>, // 合并后的 DFU 切片
    pub transfer_type: TransferType,
    pub summary: String,
    pub touched_records: usize,
    pub moved_quantity: f64,
}

/// 单一形态的执行统计
struct ShapeReport {
    summary: String,
    touched: usize,
    moved: f64,
}

// ==========================================
// TransferEngine - 转移引擎
// ==========================================
#[derive(Debug, Default)]
pub struct TransferEngine {
    consolidation: ConsolidationEngine,
}

impl TransferEngine {
    pub fn new() -> Self {
        Self {
            consolidation: ConsolidationEngine::new(),
        }
    }

    /// 执行转移
    ///
    /// # 参数
    /// - `dfu_code`: DFU 代码
    /// - `records`: 该 DFU 的当前切片（副本）
    /// - `selection`: 转移指令（调用方显式选择形态）
    /// - `ctx`: 操作人与时间
    ///
    /// # 返回
    /// - Ok(TransferOutcome): 合并后的切片与摘要
    /// - Err(EngineError): DFU 不存在 / 指令为空 / 目标变体不属于该 DFU / 数量非有限值
    #[instrument(skip(self, records, selection, ctx), fields(records = records.len(), transfer_type = %selection.transfer_type()))]
    pub fn apply(
        &self,
        dfu_code: &str,
        records: Vec<DemandRecord>,
        selection: &TransferSelection,
        ctx: &TransferContext,
    ) -> EngineResult<TransferOutcome> {
        if records.is_empty() {
            return Err(EngineError::DfuNotFound {
                dfu_code: dfu_code.to_string(),
            });
        }
        if selection.is_empty() {
            return Err(EngineError::EmptySelection {
                dfu_code: dfu_code.to_string(),
            });
        }

        // NaN / 无穷大会破坏总量守恒
        if let Some(quantity) = selection.non_finite_quantity() {
            return Err(EngineError::InvalidQuantity {
                dfu_code: dfu_code.to_string(),
                quantity,
            });
        }

        let variants: BTreeSet<&str> = records.iter().map(|r| r.product_number.as_str()).collect();
        if let Some(unknown) = selection
            .targets()
            .into_iter()
            .find(|t| !variants.contains(t.as_str()))
        {
            return Err(EngineError::UnknownVariant {
                dfu_code: dfu_code.to_string(),
                variant: unknown,
            });
        }

        let mut records = records;
        let report = match selection {
            TransferSelection::Bulk { target } => {
                self.apply_bulk(dfu_code, &mut records, target, ctx)
            }
            TransferSelection::Individual { mapping } => {
                self.apply_individual(dfu_code, &mut records, mapping, ctx)
            }
            TransferSelection::Granular { entries } => {
                self.apply_granular(dfu_code, &mut records, entries, ctx)
            }
        };

        let records = self.consolidation.consolidate(records);

        tracing::debug!(
            touched = report.touched,
            moved = report.moved,
            remaining = records.len(),
            "转移计算完成"
        );

        Ok(TransferOutcome {
            records,
            transfer_type: selection.transfer_type(),
            summary: report.summary,
            touched_records: report.touched,
            moved_quantity: report.moved,
        })
    }

    // ==========================================
    // 整体转移
    // ==========================================

    /// 变体 ≠ 目标 的记录全部改写为目标
    fn apply_bulk(
        &self,
        dfu_code: &str,
        records: &mut [DemandRecord],
        target: &str,
        ctx: &TransferContext,
    ) -> ShapeReport {
        let mut sources = BTreeSet::new();
        let mut touched = 0;
        let mut moved = 0.0;

        for record in records.iter_mut().filter(|r| r.product_number != target) {
            let prior = reassign(record, target, ctx);
            moved += record.weekly_fcst;
            touched += 1;
            sources.insert(prior);
        }

        let summary = if touched == 0 {
            format!(
                "Bulk transfer for DFU {}: all records already assigned to {}",
                dfu_code, target
            )
        } else {
            format!(
                "Bulk transfer for DFU {}: {} record(s) from {} variant(s) ({}) reassigned to {}, quantity {}",
                dfu_code,
                touched,
                sources.len(),
                sources.into_iter().collect::<Vec<_>>().join(", "),
                target,
                moved
            )
        };

        ShapeReport {
            summary,
            touched,
            moved,
        }
    }

    // ==========================================
    // 逐变体转移
    // ==========================================

    /// 按映射顺序执行; 每一对改写"当前"持有源变体的记录
    fn apply_individual(
        &self,
        dfu_code: &str,
        records: &mut [DemandRecord],
        mapping: &BTreeMap<String, String>,
        ctx: &TransferContext,
    ) -> ShapeReport {
        let mut parts = Vec::new();
        let mut touched = 0;
        let mut moved = 0.0;

        for (source, target) in mapping {
            if source == target {
                continue;
            }

            let mut pair_count = 0;
            for record in records.iter_mut().filter(|r| &r.product_number == source) {
                reassign(record, target, ctx);
                moved += record.weekly_fcst;
                pair_count += 1;
            }
            touched += pair_count;
            parts.push(format!("{} -> {} ({} record(s))", source, target, pair_count));
        }

        let summary = if parts.is_empty() {
            format!(
                "Individual transfer for DFU {}: no changes (all variants mapped to themselves)",
                dfu_code
            )
        } else {
            format!(
                "Individual transfer for DFU {}: {}, quantity {}",
                dfu_code,
                parts.join(", "),
                moved
            )
        };

        ShapeReport {
            summary,
            touched,
            moved,
        }
    }

    // ==========================================
    // 按周转移
    // ==========================================

    fn apply_granular(
        &self,
        dfu_code: &str,
        records: &mut Vec<DemandRecord>,
        entries: &[GranularEntry],
        ctx: &TransferContext,
    ) -> ShapeReport {
        let mut applied = 0;
        let mut created = 0;
        let mut skipped = 0;
        let mut touched = 0;
        let mut moved = 0.0;

        for entry in entries {
            if entry.source == entry.target {
                skipped += 1;
                continue;
            }

            let Some(source_idx) = find_slot(records, &entry.source, &entry.week) else {
                tracing::debug!(
                    source = %entry.source,
                    week = %entry.week,
                    "按周转移源记录不存在,跳过"
                );
                skipped += 1;
                continue;
            };

            let amount = entry
                .custom_quantity
                .unwrap_or(records[source_idx].weekly_fcst);

            let received = ctx.note(&format!(
                "received {} from {} (week {})",
                amount, entry.source, entry.week
            ));
            match find_slot(records, &entry.target, &entry.week) {
                Some(target_idx) => {
                    let target = &mut records[target_idx];
                    target.weekly_fcst += amount;
                    target.append_history(&received);
                }
                None => {
                    let description = records
                        .iter()
                        .find(|r| r.product_number == entry.target)
                        .map(|r| r.part_description.clone());
                    let mut new_record = records[source_idx].clone();
                    new_record.product_number = entry.target.clone();
                    new_record.weekly_fcst = amount;
                    if let Some(description) = description {
                        new_record.part_description = description;
                    }
                    new_record.transfer_history = received;
                    records.push(new_record);
                    created += 1;
                }
            }

            let source = &mut records[source_idx];
            source.weekly_fcst -= amount;
            source.append_history(&ctx.note(&format!(
                "moved {} to {} (week {})",
                amount, entry.target, entry.week
            )));

            applied += 1;
            touched += 2;
            moved += amount;
        }

        ShapeReport {
            summary: format!(
                "Granular transfer for DFU {}: moved {} across {} week slot(s), {} new record(s) created, {} skipped",
                dfu_code, moved, applied, created, skipped
            ),
            touched,
            moved,
        }
    }
}

/// 改写变体并写审计; 返回原变体
fn reassign(record: &mut DemandRecord, target: &str, ctx: &TransferContext) -> String {
    let prior = std::mem::replace(&mut record.product_number, target.to_string());
    record.append_history(&ctx.note(&format!("Product Number {} -> {}", prior, target)));
    prior
}

fn find_slot(records: &[DemandRecord], variant: &str, week: &WeekKey) -> Option<usize> {
    records.iter().position(|r| r.matches_slot(variant, week))
}
