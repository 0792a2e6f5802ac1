// ==========================================
// DFU 需求转移系统 - 字段映射器实现
// ==========================================
// 职责: 原始行 → 需求记录 / 补充数据值 + 类型转换
// 规则: 数量列去除千分位逗号; 无法解析的数量按 0 计并计数
// ==========================================

use crate::domain::record::{columns, DemandRecord};
use crate::importer::error::{ImportError, ImportResult};
use chrono::{Duration, NaiveDate};
use std::collections::HashMap;

/// 支持的日期文本格式（依次尝试）
const DATE_FORMATS: [&str; 5] = ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%Y%m%d", "%d.%m.%Y"];

/// 数量解析结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParsedQuantity {
    Value(f64),
    Blank,
    Invalid,
}

impl ParsedQuantity {
    /// 空白与非法值按 0 计
    pub fn or_zero(self) -> f64 {
        match self {
            ParsedQuantity::Value(v) => v,
            ParsedQuantity::Blank | ParsedQuantity::Invalid => 0.0,
        }
    }
}

#[derive(Debug, Default)]
pub struct FieldMapper;

impl FieldMapper {
    /// 映射一行需求数据
    ///
    /// # 返回
    /// - (记录, 需求量是否为非法文本)
    pub fn map_demand_row(&self, row: &HashMap<String, String>) -> (DemandRecord, bool) {
        let quantity = self.parse_quantity(&self.get_string(row, columns::WEEKLY_FCST));

        let record = DemandRecord {
            dfu_code: self.get_string(row, columns::DFU),
            product_number: self.get_string(row, columns::PRODUCT_NUMBER),
            weekly_fcst: quantity.or_zero(),
            part_description: self.get_string(row, columns::PART_DESCRIPTION),
            production_plant: self.get_string(row, columns::PRODUCTION_PLANT),
            production_line: self.get_string(row, columns::PRODUCTION_LINE),
            week_number: self.get_string(row, columns::WEEK_NUMBER),
            source_location: self.get_string(row, columns::SOURCE_LOCATION),
            transfer_history: self.get_string(row, columns::TRANSFER_HISTORY),
        };

        (record, quantity == ParsedQuantity::Invalid)
    }

    /// 提取字符串字段（缺失列按空串处理）
    pub fn get_string(&self, row: &HashMap<String, String>, key: &str) -> String {
        row.get(key).map(|v| v.trim().to_string()).unwrap_or_default()
    }

    /// 解析数量（"1,250.5" → 1250.5）
    pub fn parse_quantity(&self, raw: &str) -> ParsedQuantity {
        let cleaned: String = raw.chars().filter(|c| *c != ',' && !c.is_whitespace()).collect();
        if cleaned.is_empty() {
            return ParsedQuantity::Blank;
        }
        match cleaned.parse::<f64>() {
            Ok(v) if v.is_finite() => ParsedQuantity::Value(v),
            _ => ParsedQuantity::Invalid,
        }
    }

    /// 解析日期; 纯数字按 Excel 序列日处理
    pub fn parse_date(&self, raw: &str, field: &str, row_number: usize) -> ImportResult<Option<NaiveDate>> {
        let value = raw.trim();
        if value.is_empty() {
            return Ok(None);
        }

        // 可能带时间部分: "2025-01-20 00:00:00" / "2025-01-20T00:00:00"
        let date_part = value.split([' ', 'T']).next().unwrap_or(value);
        if let Some(date) = DATE_FORMATS
            .iter()
            .find_map(|fmt| NaiveDate::parse_from_str(date_part, fmt).ok())
        {
            return Ok(Some(date));
        }

        if let Ok(serial) = value.parse::<f64>() {
            if let Some(date) = excel_serial_to_date(serial) {
                return Ok(Some(date));
            }
        }

        Err(ImportError::DateFormatError {
            row: row_number,
            field: field.to_string(),
            value: value.to_string(),
        })
    }
}

/// Excel 序列日（1900 日期系统）
fn excel_serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !(1.0..2_958_466.0).contains(&serial) {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    epoch.checked_add_signed(Duration::days(serial.trunc() as i64))
}
