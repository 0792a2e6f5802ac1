// ==========================================
// DFU 需求转移系统 - CSV 导出
// ==========================================
// 列顺序: 上传固定列 + Transfer History
// ==========================================

use crate::domain::record::{columns, DemandRecord};
use crate::importer::error::{ImportError, ImportResult};
use csv::WriterBuilder;
use std::fs::File;
use std::io::Write;
use std::path::Path;

#[derive(Debug, Default)]
pub struct CsvExporter;

impl CsvExporter {
    /// 写入任意输出流,返回写出的记录数
    pub fn write_records<W: Write>(&self, writer: W, records: &[DemandRecord]) -> ImportResult<usize> {
        let mut writer = WriterBuilder::new().has_headers(false).from_writer(writer);

        writer.write_record(columns::EXPORT_ORDER)?;
        for r in records {
            let fcst = r.weekly_fcst.to_string();
            writer.write_record([
                r.dfu_code.as_str(),
                r.product_number.as_str(),
                fcst.as_str(),
                r.part_description.as_str(),
                r.production_plant.as_str(),
                r.production_line.as_str(),
                r.week_number.as_str(),
                r.source_location.as_str(),
                r.transfer_history.as_str(),
            ])?;
        }

        writer
            .flush()
            .map_err(|e| ImportError::FileWriteError(e.to_string()))?;
        Ok(records.len())
    }

    pub fn export_file<P: AsRef<Path>>(&self, path: P, records: &[DemandRecord]) -> ImportResult<usize> {
        let file = File::create(path.as_ref())
            .map_err(|e| ImportError::FileWriteError(format!("{}: {}", path.as_ref().display(), e)))?;
        let count = self.write_records(file, records)?;
        tracing::info!(path = %path.as_ref().display(), records = count, "导出完成");
        Ok(count)
    }

    pub fn to_csv_string(&self, records: &[DemandRecord]) -> ImportResult<String> {
        let mut buffer = Vec::new();
        self.write_records(&mut buffer, records)?;
        String::from_utf8(buffer).map_err(|e| ImportError::InternalError(e.to_string()))
    }
}
