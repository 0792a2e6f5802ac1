// ==========================================
// DFU 需求转移系统 - 文件解析器实现
// ==========================================
// 职责: 表格文件 → 表头 + 原始行（列名 → 文本值）
// 支持: Excel (.xlsx/.xls/.xlsm/.ods) / CSV (.csv)
// ==========================================

use crate::importer::error::{ImportError, ImportResult};
use calamine::{open_workbook_auto, Reader};
use csv::ReaderBuilder;
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

// ==========================================
// RawTable - 原始表格
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<HashMap<String, String>>,
}

impl RawTable {
    /// 缺失的列名（按传入顺序）
    pub fn missing_columns(&self, required: &[&str]) -> Vec<String> {
        required
            .iter()
            .filter(|col| !self.headers.iter().any(|h| h == *col))
            .map(|col| col.to_string())
            .collect()
    }

    fn push_row(&mut self, values: impl Iterator<Item = String>) {
        let mut row_map = HashMap::new();
        for (col_idx, value) in values.enumerate() {
            if let Some(header) = self.headers.get(col_idx) {
                row_map.insert(header.clone(), value.trim().to_string());
            }
        }

        // 跳过完全空白的行
        if row_map.values().all(|v| v.is_empty()) {
            return;
        }
        self.rows.push(row_map);
    }
}

// ==========================================
// FileParser - 文件解析接口
// ==========================================
pub trait FileParser: Send + Sync {
    fn parse_file(&self, file_path: &Path) -> ImportResult<RawTable>;
}

fn check_exists(path: &Path) -> ImportResult<()> {
    if !path.exists() {
        return Err(ImportError::FileNotFound(path.display().to_string()));
    }
    Ok(())
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase()
}

// ==========================================
// CSV Parser 实现
// ==========================================
pub struct CsvParser;

impl CsvParser {
    /// 从任意读取源解析（上传内容可能不落盘）
    pub fn parse_reader<R: Read>(&self, reader: R) -> ImportResult<RawTable> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true) // 允许行长度不一致
            .from_reader(reader);

        let headers: Vec<String> = reader
            .headers()?
            .iter()
            .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
            .collect();
        if headers.iter().all(|h| h.is_empty()) {
            return Err(ImportError::MissingHeader);
        }

        let mut table = RawTable {
            headers,
            rows: Vec::new(),
        };
        for result in reader.records() {
            let record = result?;
            table.push_row(record.iter().map(str::to_string));
        }

        Ok(table)
    }
}

impl FileParser for CsvParser {
    fn parse_file(&self, file_path: &Path) -> ImportResult<RawTable> {
        check_exists(file_path)?;

        let ext = extension_of(file_path);
        if ext != "csv" {
            return Err(ImportError::UnsupportedFormat(ext));
        }

        let file = File::open(file_path)?;
        self.parse_reader(file)
    }
}

// ==========================================
// Excel Parser 实现
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct ExcelParser {
    /// 指定工作表; None 表示第一个工作表
    pub sheet_name: Option<String>,
}

impl ExcelParser {
    pub fn new(sheet_name: Option<String>) -> Self {
        Self { sheet_name }
    }
}

impl FileParser for ExcelParser {
    fn parse_file(&self, file_path: &Path) -> ImportResult<RawTable> {
        check_exists(file_path)?;

        let ext = extension_of(file_path);
        if !matches!(ext.as_str(), "xlsx" | "xls" | "xlsm" | "ods") {
            return Err(ImportError::UnsupportedFormat(ext));
        }

        let mut workbook = open_workbook_auto(file_path)?;

        let sheet_names = workbook.sheet_names();
        let sheet_name = match &self.sheet_name {
            Some(name) if sheet_names.iter().any(|s| s == name) => name.clone(),
            Some(name) => {
                return Err(ImportError::ExcelParseError(format!("工作表不存在: {}", name)));
            }
            None => sheet_names
                .first()
                .cloned()
                .ok_or_else(|| ImportError::ExcelParseError("Excel 文件无工作表".to_string()))?,
        };

        let range = workbook.worksheet_range(&sheet_name)?;

        // 提取表头（第一行）
        let mut rows = range.rows();
        let header_row = rows.next().ok_or(ImportError::MissingHeader)?;

        let mut table = RawTable {
            headers: header_row
                .iter()
                .map(|cell| cell.to_string().trim().to_string())
                .collect(),
            rows: Vec::new(),
        };

        for data_row in rows {
            table.push_row(data_row.iter().map(|cell| cell.to_string()));
        }

        tracing::debug!(sheet = %sheet_name, rows = table.rows.len(), "Excel 解析完成");
        Ok(table)
    }
}

// ==========================================
// 通用文件解析器（根据扩展名自动选择）
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct UniversalFileParser {
    pub sheet_name: Option<String>,
}

impl UniversalFileParser {
    pub fn new(sheet_name: Option<String>) -> Self {
        Self { sheet_name }
    }

    pub fn parse<P: AsRef<Path>>(&self, file_path: P) -> ImportResult<RawTable> {
        let path = file_path.as_ref();

        match extension_of(path).as_str() {
            "csv" => CsvParser.parse_file(path),
            "xlsx" | "xls" | "xlsm" | "ods" => {
                ExcelParser::new(self.sheet_name.clone()).parse_file(path)
            }
            other => Err(ImportError::UnsupportedFormat(other.to_string())),
        }
    }
}
