// ==========================================
// DFU 需求转移系统 - 补充数据集领域模型
// ==========================================
// 职责: 库存/在途/未结供应/生命周期数据（按 Product Number 键控）
// 用途: 仅用于聚合视图展示增强,不参与转移计算
// ==========================================

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// 生命周期数据列名
pub const SOS_DATE_COLUMN: &str = "SOS Date";
pub const EOS_DATE_COLUMN: &str = "EOS Date";

// ==========================================
// SupplementaryKind - 补充数据类型
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SupplementaryKind {
    StockOnHand,
    OpenSupply,
    InTransit,
    Lifecycle,
}

impl SupplementaryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SupplementaryKind::StockOnHand => "stock_on_hand",
            SupplementaryKind::OpenSupply => "open_supply",
            SupplementaryKind::InTransit => "in_transit",
            SupplementaryKind::Lifecycle => "lifecycle",
        }
    }

    /// 数量列名（生命周期数据无数量列）
    pub fn quantity_column(&self) -> Option<&'static str> {
        match self {
            SupplementaryKind::StockOnHand => Some("Stock On Hand"),
            SupplementaryKind::OpenSupply => Some("Open Supply"),
            SupplementaryKind::InTransit => Some("In Transit"),
            SupplementaryKind::Lifecycle => None,
        }
    }

    /// 导入时必须存在的列（均以 Product Number 键控）
    pub fn required_columns(&self) -> Vec<&'static str> {
        let mut required = vec![crate::domain::record::columns::PRODUCT_NUMBER];
        match self.quantity_column() {
            Some(column) => required.push(column),
            None => required.extend([SOS_DATE_COLUMN, EOS_DATE_COLUMN]),
        }
        required
    }
}

impl fmt::Display for SupplementaryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SupplementaryKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stock_on_hand" | "soh" => Ok(SupplementaryKind::StockOnHand),
            "open_supply" => Ok(SupplementaryKind::OpenSupply),
            "in_transit" => Ok(SupplementaryKind::InTransit),
            "lifecycle" => Ok(SupplementaryKind::Lifecycle),
            other => Err(format!("未知补充数据类型: {}", other)),
        }
    }
}

// ==========================================
// VariantLifecycle - 变体生命周期
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VariantLifecycle {
    pub sos_date: Option<NaiveDate>, // 开始供货
    pub eos_date: Option<NaiveDate>, // 停止供货
}

// ==========================================
// SupplementaryData - 补充数据集合
// ==========================================
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SupplementaryData {
    pub stock_on_hand: BTreeMap<String, f64>,
    pub open_supply: BTreeMap<String, f64>,
    pub in_transit: BTreeMap<String, f64>,
    pub lifecycle: BTreeMap<String, VariantLifecycle>,
}

impl SupplementaryData {
    pub fn is_empty(&self) -> bool {
        self.stock_on_hand.is_empty()
            && self.open_supply.is_empty()
            && self.in_transit.is_empty()
            && self.lifecycle.is_empty()
    }

    pub fn quantity(&self, kind: SupplementaryKind, product_number: &str) -> Option<f64> {
        let map = match kind {
            SupplementaryKind::StockOnHand => &self.stock_on_hand,
            SupplementaryKind::OpenSupply => &self.open_supply,
            SupplementaryKind::InTransit => &self.in_transit,
            SupplementaryKind::Lifecycle => return None,
        };
        map.get(product_number).copied()
    }

    /// 整体替换某一类数量数据（重复上传覆盖旧数据）
    pub fn replace_quantities(&mut self, kind: SupplementaryKind, values: BTreeMap<String, f64>) {
        match kind {
            SupplementaryKind::StockOnHand => self.stock_on_hand = values,
            SupplementaryKind::OpenSupply => self.open_supply = values,
            SupplementaryKind::InTransit => self.in_transit = values,
            SupplementaryKind::Lifecycle => {
                tracing::warn!("生命周期数据不是数量数据,忽略 replace_quantities 调用");
            }
        }
    }

    pub fn replace_lifecycle(&mut self, values: BTreeMap<String, VariantLifecycle>) {
        self.lifecycle = values;
    }

    pub fn entry_count(&self, kind: SupplementaryKind) -> usize {
        match kind {
            SupplementaryKind::StockOnHand => self.stock_on_hand.len(),
            SupplementaryKind::OpenSupply => self.open_supply.len(),
            SupplementaryKind::InTransit => self.in_transit.len(),
            SupplementaryKind::Lifecycle => self.lifecycle.len(),
        }
    }
}
