// ==========================================
// DFU 需求转移系统 - 聚合视图模型
// ==========================================
// 职责: DFU → 变体 → 周桶 的派生结构
// 红线: 不独立存储,每次刷新都从当前记录重新计算
// ==========================================

use crate::domain::supplementary::VariantLifecycle;
use crate::domain::transfer::CompletionInfo;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

// ==========================================
// AggregationFilter - 工厂/产线过滤条件
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AggregationFilter {
    pub plant: Option<String>,
    pub line: Option<String>,
}

impl AggregationFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn new(plant: Option<&str>, line: Option<&str>) -> Self {
        Self {
            plant: plant.map(str::to_string),
            line: line.map(str::to_string),
        }
    }

    /// 去空白后的工厂过滤值（空串视为不过滤）
    pub fn plant_value(&self) -> Option<&str> {
        normalize(self.plant.as_deref())
    }

    pub fn line_value(&self) -> Option<&str> {
        normalize(self.line.as_deref())
    }

    pub fn is_active(&self) -> bool {
        self.plant_value().is_some() || self.line_value().is_some()
    }
}

fn normalize(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

// ==========================================
// WeeklyBucket - 周桶
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklyBucket {
    pub week_number: String,
    pub source_location: String,
    pub demand: f64,
    pub record_count: usize,
}

// ==========================================
// VariantSummary - 变体汇总
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantSummary {
    pub product_number: String,
    pub total_demand: f64,
    pub record_count: usize,
    pub description: String, // 首条记录的描述
    /// 键: "{week}-{location}"
    pub weekly: BTreeMap<String, WeeklyBucket>,

    // ===== 补充数据（展示增强）=====
    pub stock_on_hand: Option<f64>,
    pub open_supply: Option<f64>,
    pub in_transit: Option<f64>,
    pub lifecycle: Option<VariantLifecycle>,
}

// ==========================================
// DfuAggregate - DFU 聚合
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DfuAggregate {
    pub dfu_code: String,
    pub variants: BTreeSet<String>,
    pub variant_summaries: BTreeMap<String, VariantSummary>,
    pub plants: BTreeSet<String>, // 本 DFU 实际出现的工厂
    pub lines: BTreeSet<String>,  // 本 DFU 实际出现的产线
    pub filter: AggregationFilter,
    pub completed: bool,
    pub completion: Option<CompletionInfo>,
}

impl DfuAggregate {
    pub fn total_demand(&self) -> f64 {
        self.variant_summaries.values().map(|v| v.total_demand).sum()
    }

    pub fn record_count(&self) -> usize {
        self.variant_summaries.values().map(|v| v.record_count).sum()
    }

    pub fn variant_demand(&self, product_number: &str) -> Option<f64> {
        self.variant_summaries
            .get(product_number)
            .map(|v| v.total_demand)
    }
}

// ==========================================
// AggregationResult - 聚合结果
// ==========================================
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AggregationResult {
    pub dfus: BTreeMap<String, DfuAggregate>,
    /// 过滤选项（基于全部记录,不受当前过滤影响）
    pub plant_options: Vec<String>,
    pub line_options: Vec<String>,
}

impl AggregationResult {
    pub fn get(&self, dfu_code: &str) -> Option<&DfuAggregate> {
        self.dfus.get(dfu_code)
    }

    pub fn completed_count(&self) -> usize {
        self.dfus.values().filter(|d| d.completed).count()
    }
}
