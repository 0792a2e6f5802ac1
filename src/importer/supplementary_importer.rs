// ==========================================
// DFU 需求转移系统 - 补充数据导入器
// ==========================================
// 支持: 库存 / 未结供应 / 在途 / 生命周期（均按 Product Number 键控）
// 规则: 同一 Product Number 多行时数量求和; 生命周期取最后一行
// ==========================================

use crate::domain::record::columns;
use crate::domain::supplementary::{
    SupplementaryData, SupplementaryKind, VariantLifecycle, EOS_DATE_COLUMN, SOS_DATE_COLUMN,
};
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::field_mapper::{FieldMapper, ParsedQuantity};
use crate::importer::file_parser::{CsvParser, RawTable, UniversalFileParser};
use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;
use tracing::instrument;

/// 解析后的补充数据
#[derive(Debug, Clone, PartialEq)]
pub enum SupplementaryPayload {
    Quantities(BTreeMap<String, f64>),
    Lifecycle(BTreeMap<String, VariantLifecycle>),
}

#[derive(Debug, Clone)]
pub struct SupplementaryImport {
    pub kind: SupplementaryKind,
    pub payload: SupplementaryPayload,
    pub rows: usize,
    pub skipped_rows: usize, // Product Number 为空
    pub invalid_values: usize,
}

impl SupplementaryImport {
    pub fn product_count(&self) -> usize {
        match &self.payload {
            SupplementaryPayload::Quantities(values) => values.len(),
            SupplementaryPayload::Lifecycle(values) => values.len(),
        }
    }

    /// 覆盖写入对应数据集（其它数据集不变）
    pub fn apply_to(self, data: &mut SupplementaryData) {
        match self.payload {
            SupplementaryPayload::Quantities(values) => data.replace_quantities(self.kind, values),
            SupplementaryPayload::Lifecycle(values) => data.replace_lifecycle(values),
        }
    }
}

#[derive(Debug, Default)]
pub struct SupplementaryImporter {
    parser: UniversalFileParser,
    mapper: FieldMapper,
}

impl SupplementaryImporter {
    pub fn new(sheet_name: Option<String>) -> Self {
        Self {
            parser: UniversalFileParser::new(sheet_name),
            mapper: FieldMapper,
        }
    }

    #[instrument(skip(self, file_path), fields(path = %file_path.as_ref().display()))]
    pub fn import_file<P: AsRef<Path>>(
        &self,
        kind: SupplementaryKind,
        file_path: P,
    ) -> ImportResult<SupplementaryImport> {
        let table = self.parser.parse(file_path)?;
        self.map_table(kind, table)
    }

    pub fn import_csv_reader<R: Read>(
        &self,
        kind: SupplementaryKind,
        reader: R,
    ) -> ImportResult<SupplementaryImport> {
        let table = CsvParser.parse_reader(reader)?;
        self.map_table(kind, table)
    }

    fn map_table(&self, kind: SupplementaryKind, table: RawTable) -> ImportResult<SupplementaryImport> {
        let missing = table.missing_columns(&kind.required_columns());
        if !missing.is_empty() {
            return Err(ImportError::MissingColumns(missing));
        }

        let mut import = SupplementaryImport {
            kind,
            payload: SupplementaryPayload::Quantities(BTreeMap::new()),
            rows: table.rows.len(),
            skipped_rows: 0,
            invalid_values: 0,
        };

        let payload = match kind.quantity_column() {
            Some(column) => {
                SupplementaryPayload::Quantities(self.map_quantities(&table, column, &mut import))
            }
            None => SupplementaryPayload::Lifecycle(self.map_lifecycle(&table, &mut import)?),
        };
        import.payload = payload;

        tracing::info!(
            kind = %kind,
            rows = import.rows,
            products = import.product_count(),
            skipped = import.skipped_rows,
            invalid = import.invalid_values,
            "补充数据解析完成"
        );
        Ok(import)
    }

    fn map_quantities(
        &self,
        table: &RawTable,
        column: &str,
        import: &mut SupplementaryImport,
    ) -> BTreeMap<String, f64> {
        let mut values: BTreeMap<String, f64> = BTreeMap::new();

        for row in &table.rows {
            let product = self.mapper.get_string(row, columns::PRODUCT_NUMBER);
            if product.is_empty() {
                import.skipped_rows += 1;
                continue;
            }

            let quantity = self.mapper.parse_quantity(&self.mapper.get_string(row, column));
            if quantity == ParsedQuantity::Invalid {
                import.invalid_values += 1;
            }
            *values.entry(product).or_insert(0.0) += quantity.or_zero();
        }
        values
    }

    fn map_lifecycle(
        &self,
        table: &RawTable,
        import: &mut SupplementaryImport,
    ) -> ImportResult<BTreeMap<String, VariantLifecycle>> {
        let mut values = BTreeMap::new();

        for (idx, row) in table.rows.iter().enumerate() {
            let product = self.mapper.get_string(row, columns::PRODUCT_NUMBER);
            if product.is_empty() {
                import.skipped_rows += 1;
                continue;
            }

            // 行号从表头之后的第一行记为 2
            let row_number = idx + 2;
            let lifecycle = VariantLifecycle {
                sos_date: self.mapper.parse_date(
                    &self.mapper.get_string(row, SOS_DATE_COLUMN),
                    SOS_DATE_COLUMN,
                    row_number,
                )?,
                eos_date: self.mapper.parse_date(
                    &self.mapper.get_string(row, EOS_DATE_COLUMN),
                    EOS_DATE_COLUMN,
                    row_number,
                )?,
            };
            values.insert(product, lifecycle);
        }
        Ok(values)
    }
}
