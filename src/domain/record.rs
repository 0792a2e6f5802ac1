// ==========================================
// DFU 需求转移系统 - 需求记录领域模型
// ==========================================
// 职责: 上传预测数据的单行记录（原始数据）
// 对齐: 上传表格固定列名（大小写敏感）
// 红线: 记录无独立主键,逻辑标识为 (DFU, 变体, 周次, 来源地)
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 固定列名
// ==========================================
pub mod columns {
    pub const DFU: &str = "DFU";
    pub const PRODUCT_NUMBER: &str = "Product Number";
    pub const WEEKLY_FCST: &str = "weekly fcst";
    pub const PART_DESCRIPTION: &str = "PartDescription";
    pub const PRODUCTION_PLANT: &str = "Production Plant";
    pub const PRODUCTION_LINE: &str = "Production Line";
    pub const WEEK_NUMBER: &str = "Week Number";
    pub const SOURCE_LOCATION: &str = "Source Location";
    /// 引擎写入的审计列,导入时不要求存在
    pub const TRANSFER_HISTORY: &str = "Transfer History";

    /// 导入时必须存在的列
    pub const REQUIRED: [&str; 8] = [
        DFU,
        PRODUCT_NUMBER,
        WEEKLY_FCST,
        PART_DESCRIPTION,
        PRODUCTION_PLANT,
        PRODUCTION_LINE,
        WEEK_NUMBER,
        SOURCE_LOCATION,
    ];

    /// 导出列顺序
    pub const EXPORT_ORDER: [&str; 9] = [
        DFU,
        PRODUCT_NUMBER,
        WEEKLY_FCST,
        PART_DESCRIPTION,
        PRODUCTION_PLANT,
        PRODUCTION_LINE,
        WEEK_NUMBER,
        SOURCE_LOCATION,
        TRANSFER_HISTORY,
    ];
}

/// 审计文本分隔符（合并与追加共用）
pub const HISTORY_SEPARATOR: &str = "; ";

// ==========================================
// DemandRecord - 需求记录
// ==========================================
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DemandRecord {
    #[serde(rename = "DFU")]
    pub dfu_code: String,
    #[serde(rename = "Product Number")]
    pub product_number: String, // 变体代码
    #[serde(rename = "weekly fcst")]
    pub weekly_fcst: f64, // 周需求量
    #[serde(rename = "PartDescription")]
    pub part_description: String,
    #[serde(rename = "Production Plant")]
    pub production_plant: String,
    #[serde(rename = "Production Line")]
    pub production_line: String,
    #[serde(rename = "Week Number")]
    pub week_number: String,
    #[serde(rename = "Source Location")]
    pub source_location: String,
    #[serde(rename = "Transfer History", default)]
    pub transfer_history: String,
}

impl DemandRecord {
    pub fn belongs_to(&self, dfu_code: &str) -> bool {
        self.dfu_code == dfu_code
    }

    /// 周桶键（周次 + 来源地）
    pub fn week_key(&self) -> WeekKey {
        WeekKey::new(&self.week_number, &self.source_location)
    }

    /// 合并键: (变体, 周次, 来源地)
    pub fn consolidation_key(&self) -> (String, String, String) {
        (
            self.product_number.clone(),
            self.week_number.clone(),
            self.source_location.clone(),
        )
    }

    pub fn matches_slot(&self, variant: &str, week: &WeekKey) -> bool {
        self.product_number == variant
            && self.week_number == week.week_number
            && self.source_location == week.source_location
    }

    /// 追加审计文本（已有内容时以 "; " 分隔）
    pub fn append_history(&mut self, note: &str) {
        if note.is_empty() {
            return;
        }
        if self.transfer_history.is_empty() {
            self.transfer_history = note.to_string();
        } else {
            self.transfer_history.push_str(HISTORY_SEPARATOR);
            self.transfer_history.push_str(note);
        }
    }
}

// ==========================================
// WeekKey - 周桶键
// ==========================================
// 文本形式: "{week}-{location}", 例如 "3-PlantX"
// 周次不含 '-', 来源地可以包含
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WeekKey {
    pub week_number: String,
    pub source_location: String,
}

impl WeekKey {
    pub fn new(week_number: &str, source_location: &str) -> Self {
        Self {
            week_number: week_number.to_string(),
            source_location: source_location.to_string(),
        }
    }

    /// 解析 "{week}-{location}" 文本
    pub fn parse(raw: &str) -> Option<Self> {
        let (week, location) = raw.split_once('-')?;
        Some(Self::new(week.trim(), location.trim()))
    }
}

impl fmt::Display for WeekKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.week_number, self.source_location)
    }
}

/// 需求量求和
pub fn total_demand(records: &[DemandRecord]) -> f64 {
    records.iter().map(|r| r.weekly_fcst).sum()
}
