// ==========================================
// DFU 需求转移系统 - 待执行转移选择
// ==========================================
// 职责: 按 DFU 保存客户端逐步构建的转移选择（不持久化）
// 红线: 每个 DFU 同一时刻只有一种形态生效,设置新形态即清除旧形态
// ==========================================

use crate::domain::record::WeekKey;
use crate::domain::transfer::{GranularEntry, TransferSelection, TransferType};
use std::collections::{BTreeMap, HashMap};

/// 按周单元格键: (源变体, 目标变体, 周桶)
pub type GranularCellKey = (String, String, WeekKey);

#[derive(Debug, Clone, PartialEq, Default)]
pub struct GranularCell {
    pub selected: bool,
    pub custom_quantity: Option<f64>,
}

// ==========================================
// PendingSelection - 单个 DFU 的待执行选择
// ==========================================
#[derive(Debug, Clone, PartialEq)]
pub enum PendingSelection {
    Bulk {
        target: String,
    },
    Individual {
        mapping: BTreeMap<String, String>,
    },
    Granular {
        cells: BTreeMap<GranularCellKey, GranularCell>,
    },
}

impl PendingSelection {
    pub fn transfer_type(&self) -> TransferType {
        match self {
            PendingSelection::Bulk { .. } => TransferType::Bulk,
            PendingSelection::Individual { .. } => TransferType::Individual,
            PendingSelection::Granular { .. } => TransferType::Granular,
        }
    }

    /// 转换为可执行指令（空选择返回 None）
    pub fn to_selection(&self) -> Option<TransferSelection> {
        let selection = match self {
            PendingSelection::Bulk { target } => TransferSelection::Bulk {
                target: target.clone(),
            },
            PendingSelection::Individual { mapping } => TransferSelection::Individual {
                mapping: mapping.clone(),
            },
            PendingSelection::Granular { cells } => TransferSelection::Granular {
                entries: cells
                    .iter()
                    .filter(|(_, cell)| cell.selected)
                    .map(|((source, target, week), cell)| GranularEntry {
                        source: source.clone(),
                        target: target.clone(),
                        week: week.clone(),
                        custom_quantity: cell.custom_quantity,
                    })
                    .collect(),
            },
        };

        if selection.is_empty() {
            None
        } else {
            Some(selection)
        }
    }
}

// ==========================================
// PendingSelections - 全部 DFU 的待执行选择
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct PendingSelections {
    by_dfu: HashMap<String, PendingSelection>,
}

impl PendingSelections {
    pub fn get(&self, dfu_code: &str) -> Option<&PendingSelection> {
        self.by_dfu.get(dfu_code)
    }

    pub fn set_bulk(&mut self, dfu_code: &str, target: &str) {
        self.by_dfu.insert(
            dfu_code.to_string(),
            PendingSelection::Bulk {
                target: target.to_string(),
            },
        );
    }

    /// 设置单个源变体的目标; 当前形态不是逐变体时先清除
    pub fn set_individual_target(&mut self, dfu_code: &str, source: &str, target: &str) {
        let mut mapping = match self.by_dfu.remove(dfu_code) {
            Some(PendingSelection::Individual { mapping }) => mapping,
            _ => BTreeMap::new(),
        };
        mapping.insert(source.to_string(), target.to_string());
        self.by_dfu
            .insert(dfu_code.to_string(), PendingSelection::Individual { mapping });
    }

    /// 勾选/取消某周; 返回更新后的勾选状态
    pub fn toggle_granular_week(
        &mut self,
        dfu_code: &str,
        source: &str,
        target: &str,
        week: WeekKey,
    ) -> bool {
        self.with_granular_cell(dfu_code, source, target, week, |cell| {
            cell.selected = !cell.selected;
            cell.selected
        })
    }

    /// 设置自定义数量（同时勾选该周）; None 表示恢复为全部数量
    pub fn set_granular_quantity(
        &mut self,
        dfu_code: &str,
        source: &str,
        target: &str,
        week: WeekKey,
        quantity: Option<f64>,
    ) {
        self.with_granular_cell(dfu_code, source, target, week, |cell| {
            cell.selected = true;
            cell.custom_quantity = quantity;
        })
    }

    pub fn clear(&mut self, dfu_code: &str) -> Option<PendingSelection> {
        self.by_dfu.remove(dfu_code)
    }

    pub fn clear_all(&mut self) {
        self.by_dfu.clear();
    }

    pub fn len(&self) -> usize {
        self.by_dfu.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_dfu.is_empty()
    }

    /// 取出（或新建）按周选择并修改单元格; 当前形态不是按周时先清除
    fn with_granular_cell<R>(
        &mut self,
        dfu_code: &str,
        source: &str,
        target: &str,
        week: WeekKey,
        f: impl FnOnce(&mut GranularCell) -> R,
    ) -> R {
        let mut cells = match self.by_dfu.remove(dfu_code) {
            Some(PendingSelection::Granular { cells }) => cells,
            _ => BTreeMap::new(),
        };
        let result = f(cells
            .entry((source.to_string(), target.to_string(), week))
            .or_default());
        self.by_dfu
            .insert(dfu_code.to_string(), PendingSelection::Granular { cells });
        result
    }
}
