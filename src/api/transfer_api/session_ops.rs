use super::*;

use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

use crate::domain::session::UploadInfo;
use crate::domain::supplementary::SupplementaryKind;
use crate::importer::{
    CsvExporter, DemandImport, DemandImporter, ImportSummary, SupplementaryImport,
    SupplementaryImporter,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    pub summary: ImportSummary,
    pub notification: ChangeNotification,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupplementaryUploadResponse {
    pub kind: SupplementaryKind,
    pub rows: usize,
    pub products: usize,
    pub skipped_rows: usize,
    pub invalid_values: usize,
    pub notification: ChangeNotification,
}

impl DemandTransferApi {
    // ==========================================
    // 上传
    // ==========================================

    /// 上传需求文件（整体替换会话）
    pub fn upload_file<P: AsRef<Path>>(&self, file_path: P, user: &str) -> ApiResult<UploadResponse> {
        let import = DemandImporter::new(self.import_sheet_name.clone()).import_file(file_path)?;
        self.replace_upload(import, user)
    }

    /// 上传 CSV 内容（整体替换会话）
    pub fn upload_csv<R: Read>(&self, reader: R, source_name: &str, user: &str) -> ApiResult<UploadResponse> {
        let import = DemandImporter::default().import_csv_reader(reader, source_name)?;
        self.replace_upload(import, user)
    }

    fn replace_upload(&self, import: DemandImport, user: &str) -> ApiResult<UploadResponse> {
        let actor = self.resolve_actor(user);
        let now = now_timestamp();
        let DemandImport { records, summary } = import;

        let upload = UploadInfo {
            has_data: !records.is_empty(),
            uploaded_at: Some(now),
            uploaded_by: Some(actor.clone()),
            source_name: Some(summary.source_name.clone()),
            record_count: records.len(),
        };

        {
            let mut session = self.write_session()?;
            self.store.save_upload(&records, &upload)?;
            session.replace_upload(records, upload);
        }

        let notification = ChangeNotification::session_wide(ChangeOperation::Upload, &actor, now);
        self.notifier.publish(&notification);
        self.record_action(
            ActionLog::new(ActionType::Upload, &actor, now)
                .with_payload(&summary)
                .with_detail(format!(
                    "Uploaded {} record(s) across {} DFU(s) from {}",
                    summary.imported, summary.dfu_count, summary.source_name
                )),
        );

        tracing::info!(
            actor = %actor,
            source = %summary.source_name,
            records = summary.imported,
            "需求数据上传完成"
        );

        Ok(UploadResponse {
            summary,
            notification,
        })
    }

    /// 上传补充数据文件（只替换对应数据集）
    pub fn upload_supplementary_file<P: AsRef<Path>>(
        &self,
        kind: SupplementaryKind,
        file_path: P,
        user: &str,
    ) -> ApiResult<SupplementaryUploadResponse> {
        let import = SupplementaryImporter::new(self.import_sheet_name.clone())
            .import_file(kind, file_path)?;
        self.apply_supplementary(import, user)
    }

    pub fn upload_supplementary_csv<R: Read>(
        &self,
        kind: SupplementaryKind,
        reader: R,
        user: &str,
    ) -> ApiResult<SupplementaryUploadResponse> {
        let import = SupplementaryImporter::default().import_csv_reader(kind, reader)?;
        self.apply_supplementary(import, user)
    }

    fn apply_supplementary(
        &self,
        import: SupplementaryImport,
        user: &str,
    ) -> ApiResult<SupplementaryUploadResponse> {
        let actor = self.resolve_actor(user);
        let now = now_timestamp();
        let kind = import.kind;
        let (rows, products) = (import.rows, import.product_count());
        let (skipped_rows, invalid_values) = (import.skipped_rows, import.invalid_values);

        {
            let mut session = self.write_session()?;
            let mut data = session.supplementary().clone();
            import.apply_to(&mut data);
            self.store.save_supplementary(&data)?;
            session.set_supplementary(data);
        }

        let notification =
            ChangeNotification::session_wide(ChangeOperation::SupplementaryUpload, &actor, now);
        self.notifier.publish(&notification);
        self.record_action(
            ActionLog::new(ActionType::SupplementaryUpload, &actor, now)
                .with_payload(&serde_json::json!({
                    "kind": kind.as_str(),
                    "rows": rows,
                    "products": products,
                }))
                .with_detail(format!("Loaded {} data for {} product(s)", kind, products)),
        );

        tracing::info!(kind = %kind, products, "补充数据上传完成");

        Ok(SupplementaryUploadResponse {
            kind,
            rows,
            products,
            skipped_rows,
            invalid_values,
            notification,
        })
    }

    // ==========================================
    // 原始视图 / 导出
    // ==========================================

    /// 原始上传快照的聚合视图（不含完成标记）
    pub fn get_original_aggregates(&self, filter: &AggregationFilter) -> ApiResult<AggregationResult> {
        let session = self.read_session()?;
        Ok(self.aggregation_engine.aggregate(
            session.original_upload(),
            filter,
            &BTreeMap::new(),
            Some(session.supplementary()),
        ))
    }

    pub fn get_upload_info(&self) -> ApiResult<UploadInfo> {
        Ok(self.read_session()?.upload_info().clone())
    }

    /// 导出当前记录为 CSV 文件
    pub fn export_csv<P: AsRef<Path>>(&self, file_path: P) -> ApiResult<usize> {
        let records = self.read_session()?.records().to_vec();
        Ok(CsvExporter.export_file(file_path, &records)?)
    }

    pub fn export_csv_string(&self) -> ApiResult<String> {
        let session = self.read_session()?;
        Ok(CsvExporter.to_csv_string(session.records())?)
    }

    // ==========================================
    // 重置 / 操作日志
    // ==========================================

    /// 清空会话与存储
    pub fn reset(&self, user: &str) -> ApiResult<ChangeNotification> {
        let actor = self.resolve_actor(user);
        let now = now_timestamp();

        let cleared_records = {
            let mut session = self.write_session()?;
            let count = session.records().len();
            self.store.clear()?;
            session.clear();
            count
        };

        let notification = ChangeNotification::session_wide(ChangeOperation::Reset, &actor, now);
        self.notifier.publish(&notification);
        self.record_action(
            ActionLog::new(ActionType::Reset, &actor, now)
                .with_detail(format!("Session reset, {} record(s) cleared", cleared_records)),
        );

        tracing::info!(actor = %actor, cleared_records, "会话已重置");
        Ok(notification)
    }

    /// 最近的操作日志（未配置日志仓储时为空）
    pub fn recent_actions(&self, limit: i32) -> ApiResult<Vec<ActionLog>> {
        match &self.action_log_repo {
            Some(repo) => Ok(repo.find_recent(limit)?),
            None => Ok(Vec::new()),
        }
    }

    pub fn dfu_actions(&self, dfu_code: &str) -> ApiResult<Vec<ActionLog>> {
        match &self.action_log_repo {
            Some(repo) => Ok(repo.find_by_dfu(dfu_code)?),
            None => Ok(Vec::new()),
        }
    }
}
