// ==========================================
// DFU 需求转移系统 - 会话领域模型
// ==========================================
// 职责: 共享会话状态（当前记录、原始上传快照、已完成转移、待执行选择）
// 红线: 显式传递,不使用全局变量
// 红线: 原始上传快照只读,仅在重新上传时整体替换
// ==========================================

use crate::domain::pending::PendingSelections;
use crate::domain::record::DemandRecord;
use crate::domain::supplementary::SupplementaryData;
use crate::domain::transfer::CompletedTransfer;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

// ==========================================
// UploadInfo - 上传标记
// ==========================================
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct UploadInfo {
    pub has_data: bool,
    pub uploaded_at: Option<NaiveDateTime>,
    pub uploaded_by: Option<String>,
    pub source_name: Option<String>,
    pub record_count: usize,
}

// ==========================================
// StoredSession - 存储层加载结果
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct StoredSession {
    pub records: Vec<DemandRecord>,
    pub original_upload: Vec<DemandRecord>,
    pub completed_transfers: BTreeMap<String, CompletedTransfer>,
    pub upload: UploadInfo,
    pub supplementary: SupplementaryData,
}

// ==========================================
// Session - 共享会话
// ==========================================
#[derive(Debug, Default)]
pub struct Session {
    records: Vec<DemandRecord>,
    original_upload: Vec<DemandRecord>,
    completed: BTreeMap<String, CompletedTransfer>,
    pending: PendingSelections,
    upload: UploadInfo,
    supplementary: SupplementaryData,
    // 每次整体替换（上传/重置）递增,用于检测并发的整体替换
    generation: u64,
}

impl Session {
    pub fn from_stored(stored: StoredSession) -> Self {
        Self {
            records: stored.records,
            original_upload: stored.original_upload,
            completed: stored.completed_transfers,
            pending: PendingSelections::default(),
            upload: stored.upload,
            supplementary: stored.supplementary,
            generation: 0,
        }
    }

    // ==========================================
    // 记录访问
    // ==========================================

    pub fn records(&self) -> &[DemandRecord] {
        &self.records
    }

    pub fn original_upload(&self) -> &[DemandRecord] {
        &self.original_upload
    }

    pub fn contains_dfu(&self, dfu_code: &str) -> bool {
        !dfu_code.is_empty() && self.records.iter().any(|r| r.belongs_to(dfu_code))
    }

    /// 复制 DFU 切片（引擎在副本上计算）
    pub fn dfu_records(&self, dfu_code: &str) -> Vec<DemandRecord> {
        self.records
            .iter()
            .filter(|r| r.belongs_to(dfu_code))
            .cloned()
            .collect()
    }

    pub fn dfu_variants(&self, dfu_code: &str) -> BTreeSet<String> {
        self.records
            .iter()
            .filter(|r| r.belongs_to(dfu_code))
            .map(|r| r.product_number.clone())
            .collect()
    }

    /// 构造替换 DFU 切片后的完整记录集（不修改会话）
    ///
    /// 新切片放在该 DFU 首条记录的位置; DFU 原本不存在时追加到末尾
    pub fn records_with_dfu_replaced(
        &self,
        dfu_code: &str,
        slice: &[DemandRecord],
    ) -> Vec<DemandRecord> {
        let mut result = Vec::with_capacity(self.records.len() + slice.len());
        let mut inserted = false;

        for record in &self.records {
            if record.belongs_to(dfu_code) {
                if !inserted {
                    result.extend_from_slice(slice);
                    inserted = true;
                }
                continue;
            }
            result.push(record.clone());
        }

        if !inserted {
            result.extend_from_slice(slice);
        }
        result
    }

    pub fn set_records(&mut self, records: Vec<DemandRecord>) {
        self.upload.record_count = records.len();
        self.records = records;
    }

    // ==========================================
    // 已完成转移
    // ==========================================

    pub fn completed(&self, dfu_code: &str) -> Option<&CompletedTransfer> {
        self.completed.get(dfu_code)
    }

    pub fn completed_transfers(&self) -> &BTreeMap<String, CompletedTransfer> {
        &self.completed
    }

    pub fn insert_completed(&mut self, entry: CompletedTransfer) {
        self.completed.insert(entry.dfu_code.clone(), entry);
    }

    pub fn remove_completed(&mut self, dfu_code: &str) -> Option<CompletedTransfer> {
        self.completed.remove(dfu_code)
    }

    // ==========================================
    // 待执行选择 / 上传标记 / 补充数据
    // ==========================================

    pub fn pending(&self) -> &PendingSelections {
        &self.pending
    }

    pub fn pending_mut(&mut self) -> &mut PendingSelections {
        &mut self.pending
    }

    pub fn upload_info(&self) -> &UploadInfo {
        &self.upload
    }

    pub fn supplementary(&self) -> &SupplementaryData {
        &self.supplementary
    }

    pub fn set_supplementary(&mut self, data: SupplementaryData) {
        self.supplementary = data;
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    // ==========================================
    // 整体替换
    // ==========================================

    /// 新上传: 替换记录与原始快照,丢弃已完成转移和待执行选择
    pub fn replace_upload(&mut self, records: Vec<DemandRecord>, upload: UploadInfo) {
        self.original_upload = records.clone();
        self.records = records;
        self.completed.clear();
        self.pending.clear_all();
        self.upload = upload;
        self.generation += 1;
    }

    /// 重置: 清空全部状态
    pub fn clear(&mut self) {
        self.records.clear();
        self.original_upload.clear();
        self.completed.clear();
        self.pending.clear_all();
        self.upload = UploadInfo::default();
        self.supplementary = SupplementaryData::default();
        self.generation += 1;
    }
}
