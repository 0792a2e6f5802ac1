use super::mapping::{
    load_dataset, map_completed_row, read_meta, replace_dataset, upsert_completed, write_meta,
    DATASET_CURRENT, DATASET_ORIGINAL, META_SUPPLEMENTARY, META_UPLOAD,
};
use super::SessionStore;
use crate::domain::record::DemandRecord;
use crate::domain::session::{StoredSession, UploadInfo};
use crate::domain::supplementary::SupplementaryData;
use crate::domain::transfer::CompletedTransfer;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, Result as SqliteResult};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

// ==========================================
// SqliteSessionRepository - SQLite 会话仓储
// ==========================================
// 红线: Repository 不做业务逻辑,只做数据映射
pub struct SqliteSessionRepository {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteSessionRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    pub(super) fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn load_completed(conn: &Connection) -> RepositoryResult<BTreeMap<String, CompletedTransfer>> {
        let mut stmt = conn.prepare(
            r#"
            SELECT dfu_code, transfer_type, targets_json, executed_at,
                   executed_by, transfer_count, original_records_json
            FROM completed_transfer
            ORDER BY dfu_code
            "#,
        )?;

        let rows = stmt
            .query_map([], map_completed_row)?
            .collect::<SqliteResult<Vec<_>>>()?;

        let mut completed = BTreeMap::new();
        for row in rows {
            let entry = row.into_entity()?;
            completed.insert(entry.dfu_code.clone(), entry);
        }
        Ok(completed)
    }
}

impl SessionStore for SqliteSessionRepository {
    fn load_session(&self) -> RepositoryResult<StoredSession> {
        let conn = self.get_conn()?;

        let records = load_dataset(&conn, DATASET_CURRENT)?;
        let original_upload = load_dataset(&conn, DATASET_ORIGINAL)?;
        let completed_transfers = Self::load_completed(&conn)?;

        let mut upload: UploadInfo = match read_meta(&conn, META_UPLOAD)? {
            Some(raw) => serde_json::from_str(&raw)?,
            None => UploadInfo::default(),
        };
        upload.record_count = records.len();

        let supplementary: SupplementaryData = match read_meta(&conn, META_SUPPLEMENTARY)? {
            Some(raw) => serde_json::from_str(&raw)?,
            None => SupplementaryData::default(),
        };

        tracing::debug!(
            records = records.len(),
            original = original_upload.len(),
            completed = completed_transfers.len(),
            "会话加载完成"
        );

        Ok(StoredSession {
            records,
            original_upload,
            completed_transfers,
            upload,
            supplementary,
        })
    }

    fn save_session(&self, records: &[DemandRecord]) -> RepositoryResult<()> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;
        replace_dataset(&tx, DATASET_CURRENT, records)?;
        tx.commit()?;
        Ok(())
    }

    fn save_completed_transfer(&self, dfu_code: &str, entry: &CompletedTransfer) -> RepositoryResult<()> {
        if entry.dfu_code != dfu_code {
            return Err(RepositoryError::FieldValueError {
                field: "dfu_code".to_string(),
                message: format!("键与实体不一致: {} != {}", dfu_code, entry.dfu_code),
            });
        }
        let conn = self.get_conn()?;
        upsert_completed(&conn, entry)
    }

    fn delete_completed_transfer(&self, dfu_code: &str) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "DELETE FROM completed_transfer WHERE dfu_code = ?1",
            params![dfu_code],
        )?;
        Ok(())
    }

    fn save_upload(&self, records: &[DemandRecord], upload: &UploadInfo) -> RepositoryResult<()> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        replace_dataset(&tx, DATASET_CURRENT, records)?;
        replace_dataset(&tx, DATASET_ORIGINAL, records)?;
        tx.execute("DELETE FROM completed_transfer", [])?;
        write_meta(&tx, META_UPLOAD, &serde_json::to_string(upload)?)?;

        tx.commit()?;
        Ok(())
    }

    fn save_supplementary(&self, data: &SupplementaryData) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        write_meta(&conn, META_SUPPLEMENTARY, &serde_json::to_string(data)?)
    }

    fn clear(&self) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute_batch(
            r#"
            BEGIN;
            DELETE FROM demand_record;
            DELETE FROM completed_transfer;
            DELETE FROM session_meta;
            COMMIT;
            "#,
        )?;
        Ok(())
    }
}
