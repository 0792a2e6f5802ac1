// ==========================================
// DFU 需求转移系统 - 导入导出层
// ==========================================
// 职责: 外部表格 ↔ 需求记录 / 补充数据
// 支持: Excel, CSV
// ==========================================

pub mod demand_importer;
pub mod error;
pub mod exporter;
pub mod field_mapper;
pub mod file_parser;
pub mod supplementary_importer;

// 重导出核心类型
pub use demand_importer::{DemandImport, DemandImporter, ImportSummary};
pub use error::{ImportError, ImportResult};
pub use exporter::CsvExporter;
pub use field_mapper::{FieldMapper, ParsedQuantity};
pub use file_parser::{CsvParser, ExcelParser, FileParser, RawTable, UniversalFileParser};
pub use supplementary_importer::{SupplementaryImport, SupplementaryImporter, SupplementaryPayload};
