// 行映射与批量读写辅助函数（供 core.rs 在事务内调用）

use crate::domain::record::DemandRecord;
use crate::domain::transfer::{CompletedTransfer, TransferType};
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::NaiveDateTime;
use rusqlite::{params, Connection, Result as SqliteResult, Row};

pub(super) const TS_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub(super) const DATASET_CURRENT: &str = "current";
pub(super) const DATASET_ORIGINAL: &str = "original";

pub(super) const META_UPLOAD: &str = "upload";
pub(super) const META_SUPPLEMENTARY: &str = "supplementary";

// ==========================================
// demand_record
// ==========================================

pub(super) fn replace_dataset(
    conn: &Connection,
    dataset: &str,
    records: &[DemandRecord],
) -> RepositoryResult<usize> {
    conn.execute("DELETE FROM demand_record WHERE dataset = ?1", params![dataset])?;

    let mut stmt = conn.prepare(
        r#"
        INSERT INTO demand_record (
            dataset, seq, dfu_code, product_number, weekly_fcst,
            part_description, production_plant, production_line,
            week_number, source_location, transfer_history
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )?;

    for (seq, r) in records.iter().enumerate() {
        stmt.execute(params![
            dataset,
            seq as i64,
            r.dfu_code,
            r.product_number,
            r.weekly_fcst,
            r.part_description,
            r.production_plant,
            r.production_line,
            r.week_number,
            r.source_location,
            r.transfer_history,
        ])?;
    }

    Ok(records.len())
}

pub(super) fn load_dataset(conn: &Connection, dataset: &str) -> RepositoryResult<Vec<DemandRecord>> {
    let mut stmt = conn.prepare(
        r#"
        SELECT dfu_code, product_number, weekly_fcst,
               part_description, production_plant, production_line,
               week_number, source_location, transfer_history
        FROM demand_record
        WHERE dataset = ?
        ORDER BY seq
        "#,
    )?;

    let records = stmt
        .query_map(params![dataset], map_record_row)?
        .collect::<SqliteResult<Vec<_>>>()?;
    Ok(records)
}

fn map_record_row(row: &Row) -> SqliteResult<DemandRecord> {
    Ok(DemandRecord {
        dfu_code: row.get(0)?,
        product_number: row.get(1)?,
        weekly_fcst: row.get(2)?,
        part_description: row.get(3)?,
        production_plant: row.get(4)?,
        production_line: row.get(5)?,
        week_number: row.get(6)?,
        source_location: row.get(7)?,
        transfer_history: row.get(8)?,
    })
}

// ==========================================
// completed_transfer
// ==========================================

/// completed_transfer 原始行（JSON 字段尚未解析）
pub(super) struct CompletedRow {
    pub dfu_code: String,
    pub transfer_type: String,
    pub targets_json: String,
    pub executed_at: String,
    pub executed_by: String,
    pub transfer_count: i64,
    pub original_records_json: String,
}

pub(super) fn map_completed_row(row: &Row) -> SqliteResult<CompletedRow> {
    Ok(CompletedRow {
        dfu_code: row.get(0)?,
        transfer_type: row.get(1)?,
        targets_json: row.get(2)?,
        executed_at: row.get(3)?,
        executed_by: row.get(4)?,
        transfer_count: row.get(5)?,
        original_records_json: row.get(6)?,
    })
}

impl CompletedRow {
    pub(super) fn into_entity(self) -> RepositoryResult<CompletedTransfer> {
        let transfer_type =
            TransferType::parse(&self.transfer_type).ok_or_else(|| RepositoryError::FieldValueError {
                field: "transfer_type".to_string(),
                message: format!("未知转移类型: {}", self.transfer_type),
            })?;

        let executed_at = NaiveDateTime::parse_from_str(&self.executed_at, TS_FORMAT).map_err(|e| {
            RepositoryError::FieldValueError {
                field: "executed_at".to_string(),
                message: e.to_string(),
            }
        })?;

        Ok(CompletedTransfer {
            dfu_code: self.dfu_code,
            transfer_type,
            targets: serde_json::from_str(&self.targets_json)?,
            executed_at,
            executed_by: self.executed_by,
            transfer_count: u32::try_from(self.transfer_count).unwrap_or(0),
            original_records: serde_json::from_str(&self.original_records_json)?,
        })
    }
}

pub(super) fn upsert_completed(conn: &Connection, entry: &CompletedTransfer) -> RepositoryResult<()> {
    conn.execute(
        r#"
        INSERT INTO completed_transfer (
            dfu_code, transfer_type, targets_json, executed_at,
            executed_by, transfer_count, original_records_json
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        ON CONFLICT(dfu_code) DO UPDATE SET
            transfer_type = excluded.transfer_type,
            targets_json = excluded.targets_json,
            executed_at = excluded.executed_at,
            executed_by = excluded.executed_by,
            transfer_count = excluded.transfer_count,
            original_records_json = excluded.original_records_json
        "#,
        params![
            entry.dfu_code,
            entry.transfer_type.as_str(),
            serde_json::to_string(&entry.targets)?,
            entry.executed_at.format(TS_FORMAT).to_string(),
            entry.executed_by,
            entry.transfer_count as i64,
            serde_json::to_string(&entry.original_records)?,
        ],
    )?;
    Ok(())
}

// ==========================================
// session_meta
// ==========================================

pub(super) fn write_meta(conn: &Connection, key: &str, value_json: &str) -> RepositoryResult<()> {
    conn.execute(
        r#"
        INSERT INTO session_meta (meta_key, value_json, updated_at)
        VALUES (?1, ?2, datetime('now'))
        ON CONFLICT(meta_key) DO UPDATE SET
            value_json = excluded.value_json,
            updated_at = excluded.updated_at
        "#,
        params![key, value_json],
    )?;
    Ok(())
}

pub(super) fn read_meta(conn: &Connection, key: &str) -> RepositoryResult<Option<String>> {
    match conn.query_row(
        "SELECT value_json FROM session_meta WHERE meta_key = ?1",
        params![key],
        |row| row.get::<_, String>(0),
    ) {
        Ok(value) => Ok(Some(value)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}
