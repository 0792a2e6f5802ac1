// ==========================================
// DFU 需求转移系统 - 聚合引擎
// ==========================================
// 职责: 原始记录 → DFU → 变体 → 周桶
// 输入: 记录集 + 工厂/产线过滤 + 已完成转移 + 补充数据
// 输出: AggregationResult
// 红线: 纯函数,无隐藏状态; 同一输入多次计算结果完全一致
// ==========================================

use crate::domain::aggregate::{
    AggregationFilter, AggregationResult, DfuAggregate, VariantSummary, WeeklyBucket,
};
use crate::domain::record::DemandRecord;
use crate::domain::supplementary::{SupplementaryData, SupplementaryKind};
use crate::domain::transfer::CompletedTransfer;
use std::collections::{BTreeMap, BTreeSet};
use tracing::instrument;

// ==========================================
// AggregationEngine - 聚合引擎
// ==========================================
// 红线: 无状态引擎
#[derive(Debug, Default)]
pub struct AggregationEngine;

impl AggregationEngine {
    pub fn new() -> Self {
        Self
    }

    /// 计算聚合视图
    ///
    /// # 步骤
    /// 1. 基于全部记录计算工厂/产线选项（不受过滤影响）
    /// 2. 按过滤条件筛选（去空白后精确匹配）
    /// 3. 按 DFU 分组（空 DFU 丢弃）
    /// 4. 计算变体汇总与周桶
    /// 5. 附加完成信息与补充数据
    #[instrument(skip_all, fields(records = records.len(), filtered = filter.is_active()))]
    pub fn aggregate(
        &self,
        records: &[DemandRecord],
        filter: &AggregationFilter,
        completed: &BTreeMap<String, CompletedTransfer>,
        supplementary: Option<&SupplementaryData>,
    ) -> AggregationResult {
        let (plant_options, line_options) = self.filter_options(records);

        let plant = filter.plant_value();
        let line = filter.line_value();

        let mut dfus: BTreeMap<String, DfuAggregate> = BTreeMap::new();
        for record in records
            .iter()
            .filter(|r| Self::passes_filter(r, plant, line))
        {
            let dfu_code = record.dfu_code.trim();
            if dfu_code.is_empty() {
                continue;
            }

            let aggregate = dfus
                .entry(dfu_code.to_string())
                .or_insert_with(|| DfuAggregate {
                    dfu_code: dfu_code.to_string(),
                    variants: BTreeSet::new(),
                    variant_summaries: BTreeMap::new(),
                    plants: BTreeSet::new(),
                    lines: BTreeSet::new(),
                    filter: filter.clone(),
                    completed: false,
                    completion: None,
                });
            Self::accumulate(aggregate, record);
        }

        for aggregate in dfus.values_mut() {
            if let Some(entry) = completed.get(&aggregate.dfu_code) {
                aggregate.completed = true;
                aggregate.completion = Some(entry.completion_info());
            }
            if let Some(data) = supplementary {
                Self::enrich(aggregate, data);
            }
        }

        tracing::debug!(dfu_count = dfus.len(), "聚合完成");

        AggregationResult {
            dfus,
            plant_options,
            line_options,
        }
    }

    /// 工厂/产线选项（去重、排序）
    pub fn filter_options(&self, records: &[DemandRecord]) -> (Vec<String>, Vec<String>) {
        (
            distinct_values(records.iter().map(|r| r.production_plant.as_str())),
            distinct_values(records.iter().map(|r| r.production_line.as_str())),
        )
    }

    fn passes_filter(record: &DemandRecord, plant: Option<&str>, line: Option<&str>) -> bool {
        plant.map_or(true, |p| record.production_plant.trim() == p)
            && line.map_or(true, |l| record.production_line.trim() == l)
    }

    fn accumulate(aggregate: &mut DfuAggregate, record: &DemandRecord) {
        let variant = record.product_number.trim().to_string();
        let demand = demand_value(record.weekly_fcst);

        aggregate.variants.insert(variant.clone());
        let plant = record.production_plant.trim();
        if !plant.is_empty() {
            aggregate.plants.insert(plant.to_string());
        }
        let line = record.production_line.trim();
        if !line.is_empty() {
            aggregate.lines.insert(line.to_string());
        }

        let summary = aggregate
            .variant_summaries
            .entry(variant.clone())
            .or_insert_with(|| VariantSummary {
                product_number: variant,
                total_demand: 0.0,
                record_count: 0,
                description: record.part_description.clone(),
                weekly: BTreeMap::new(),
                stock_on_hand: None,
                open_supply: None,
                in_transit: None,
                lifecycle: None,
            });
        summary.total_demand += demand;
        summary.record_count += 1;

        let bucket = summary
            .weekly
            .entry(record.week_key().to_string())
            .or_insert_with(|| WeeklyBucket {
                week_number: record.week_number.clone(),
                source_location: record.source_location.clone(),
                demand: 0.0,
                record_count: 0,
            });
        bucket.demand += demand;
        bucket.record_count += 1;
    }

    fn enrich(aggregate: &mut DfuAggregate, data: &SupplementaryData) {
        for (product, summary) in aggregate.variant_summaries.iter_mut() {
            summary.stock_on_hand = data.quantity(SupplementaryKind::StockOnHand, product);
            summary.open_supply = data.quantity(SupplementaryKind::OpenSupply, product);
            summary.in_transit = data.quantity(SupplementaryKind::InTransit, product);
            summary.lifecycle = data.lifecycle.get(product).cloned();
        }
    }
}

fn distinct_values<'a>(values: impl Iterator<Item = &'a str>) -> Vec<String> {
    values
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// 非有限数值按 0 计
fn demand_value(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}
