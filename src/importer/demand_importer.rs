// ==========================================
// DFU 需求转移系统 - 需求数据导入器
// ==========================================
// 流程: 文件解析 → 必填列校验 → 字段映射 → 导入摘要
// 红线: 缺少任何必填列时整体拒绝,不做部分导入
// ==========================================

use crate::domain::record::{columns, DemandRecord};
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::field_mapper::FieldMapper;
use crate::importer::file_parser::{CsvParser, RawTable, UniversalFileParser};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::io::Read;
use std::path::Path;
use tracing::instrument;

// ==========================================
// ImportSummary - 导入摘要
// ==========================================
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ImportSummary {
    pub source_name: String,
    pub imported: usize,
    pub dfu_count: usize,
    pub variant_count: usize,
    pub blank_dfu_rows: usize,     // DFU 为空（聚合时会被忽略）
    pub invalid_quantities: usize, // 需求量无法解析,按 0 计
}

#[derive(Debug, Clone)]
pub struct DemandImport {
    pub records: Vec<DemandRecord>,
    pub summary: ImportSummary,
}

// ==========================================
// DemandImporter - 需求数据导入器
// ==========================================
#[derive(Debug, Default)]
pub struct DemandImporter {
    parser: UniversalFileParser,
    mapper: FieldMapper,
}

impl DemandImporter {
    pub fn new(sheet_name: Option<String>) -> Self {
        Self {
            parser: UniversalFileParser::new(sheet_name),
            mapper: FieldMapper,
        }
    }

    /// 从文件导入（.csv / .xlsx / .xls）
    #[instrument(skip(self, file_path), fields(path = %file_path.as_ref().display()))]
    pub fn import_file<P: AsRef<Path>>(&self, file_path: P) -> ImportResult<DemandImport> {
        let path = file_path.as_ref();
        let table = self.parser.parse(path)?;
        let source_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        self.map_table(table, &source_name)
    }

    /// 从 CSV 内容导入
    pub fn import_csv_reader<R: Read>(&self, reader: R, source_name: &str) -> ImportResult<DemandImport> {
        let table = CsvParser.parse_reader(reader)?;
        self.map_table(table, source_name)
    }

    fn map_table(&self, table: RawTable, source_name: &str) -> ImportResult<DemandImport> {
        let missing = table.missing_columns(&columns::REQUIRED);
        if !missing.is_empty() {
            tracing::warn!(source = source_name, ?missing, "需求数据缺少必填列");
            return Err(ImportError::MissingColumns(missing));
        }

        let mut summary = ImportSummary {
            source_name: source_name.to_string(),
            ..Default::default()
        };
        let mut dfus = BTreeSet::new();
        let mut variants = BTreeSet::new();

        let records: Vec<DemandRecord> = table
            .rows
            .iter()
            .map(|row| {
                let (record, invalid_quantity) = self.mapper.map_demand_row(row);
                if invalid_quantity {
                    summary.invalid_quantities += 1;
                }
                if record.dfu_code.is_empty() {
                    summary.blank_dfu_rows += 1;
                } else {
                    dfus.insert(record.dfu_code.clone());
                    variants.insert((record.dfu_code.clone(), record.product_number.clone()));
                }
                record
            })
            .collect();

        summary.imported = records.len();
        summary.dfu_count = dfus.len();
        summary.variant_count = variants.len();

        tracing::info!(
            source = source_name,
            imported = summary.imported,
            dfus = summary.dfu_count,
            invalid_quantities = summary.invalid_quantities,
            "需求数据解析完成"
        );

        Ok(DemandImport { records, summary })
    }
}
