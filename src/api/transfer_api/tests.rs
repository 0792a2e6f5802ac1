use super::*;

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use rusqlite::Connection;

use crate::domain::pending::PendingSelection;
use crate::domain::record::WeekKey;
use crate::domain::transfer::GranularEntry;
use crate::domain::session::{StoredSession, UploadInfo};
use crate::domain::supplementary::{SupplementaryData, SupplementaryKind};
use crate::engine::events::BroadcastNotifier;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::session_repo::SqliteSessionRepository;

const DEMAND_CSV: &str = "\
DFU,Product Number,weekly fcst,PartDescription,Production Plant,Production Line,Week Number,Source Location
D100,A,50,Part A,P1,L1,1,PlantX
D100,B,30,Part B,P1,L1,1,PlantX
D200,C,10,Part C,P2,L2,1,PlantY
";

fn setup_test_db() -> Arc<Mutex<Connection>> {
    let conn = Connection::open_in_memory().unwrap();
    crate::db::configure_sqlite_connection(&conn).unwrap();
    crate::db::ensure_schema(&conn).unwrap();
    Arc::new(Mutex::new(conn))
}

/// 可按需让 save_session 失败的存储
struct FlakyStore {
    inner: SqliteSessionRepository,
    fail_save_session: AtomicBool,
}

impl FlakyStore {
    fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self {
            inner: SqliteSessionRepository::new(conn),
            fail_save_session: AtomicBool::new(false),
        }
    }
}

impl SessionStore for FlakyStore {
    fn load_session(&self) -> RepositoryResult<StoredSession> {
        self.inner.load_session()
    }

    fn save_session(&self, records: &[DemandRecord]) -> RepositoryResult<()> {
        if self.fail_save_session.load(Ordering::SeqCst) {
            return Err(RepositoryError::DatabaseQueryError("disk full".to_string()));
        }
        self.inner.save_session(records)
    }

    fn save_completed_transfer(&self, dfu_code: &str, entry: &CompletedTransfer) -> RepositoryResult<()> {
        self.inner.save_completed_transfer(dfu_code, entry)
    }

    fn delete_completed_transfer(&self, dfu_code: &str) -> RepositoryResult<()> {
        self.inner.delete_completed_transfer(dfu_code)
    }

    fn save_upload(&self, records: &[DemandRecord], upload: &UploadInfo) -> RepositoryResult<()> {
        self.inner.save_upload(records, upload)
    }

    fn save_supplementary(&self, data: &SupplementaryData) -> RepositoryResult<()> {
        self.inner.save_supplementary(data)
    }

    fn clear(&self) -> RepositoryResult<()> {
        self.inner.clear()
    }
}

fn api_with_data() -> (DemandTransferApi, Arc<Mutex<Connection>>) {
    let conn = setup_test_db();
    let store = Arc::new(SqliteSessionRepository::new(conn.clone()));
    let api = DemandTransferApi::new(store, None)
        .unwrap()
        .with_action_log(Arc::new(ActionLogRepository::new(conn.clone())))
        .with_default_actor("planner");
    api.upload_csv(DEMAND_CSV.as_bytes(), "demand.csv", "alice")
        .unwrap();
    (api, conn)
}

fn bulk(target: &str) -> TransferSelection {
    TransferSelection::Bulk {
        target: target.to_string(),
    }
}

fn variant_demand(api: &DemandTransferApi, dfu: &str, variant: &str) -> Option<f64> {
    api.get_aggregates(&AggregationFilter::all())
        .unwrap()
        .get(dfu)
        .and_then(|agg| agg.variant_demand(variant))
}

#[test]
fn test_upload_replaces_session() {
    let (api, _conn) = api_with_data();

    let info = api.get_upload_info().unwrap();
    assert!(info.has_data);
    assert_eq!(info.record_count, 3);
    assert_eq!(info.uploaded_by.as_deref(), Some("alice"));

    let aggregates = api.get_aggregates(&AggregationFilter::all()).unwrap();
    assert_eq!(aggregates.dfus.len(), 2);
    assert_eq!(variant_demand(&api, "D100", "A"), Some(50.0));
}

#[test]
fn test_bulk_transfer_and_undo_roundtrip() {
    let (api, _conn) = api_with_data();

    let response = api.apply_transfer("D100", &bulk("B"), "bob").unwrap();
    assert!(response.summary.contains("D100"));
    let d100 = response.aggregates.get("D100").unwrap();
    assert!(d100.completed);
    assert_eq!(d100.variant_demand("B"), Some(80.0));
    assert_eq!(d100.variant_demand("A"), None);
    assert_eq!(response.notification.operation, ChangeOperation::Transfer);

    // 原始视图不受影响
    let original = api.get_original_aggregates(&AggregationFilter::all()).unwrap();
    assert_eq!(original.get("D100").unwrap().variant_demand("A"), Some(50.0));
    assert!(!original.get("D100").unwrap().completed);

    let undo = api.undo_transfer("D100", "bob").unwrap();
    assert_eq!(undo.restored_records, 2);
    assert_eq!(variant_demand(&api, "D100", "A"), Some(50.0));
    assert_eq!(variant_demand(&api, "D100", "B"), Some(30.0));
    assert!(api.get_completed_transfer("D100").unwrap().is_none());
}

#[test]
fn test_undo_restores_first_capture() {
    let (api, _conn) = api_with_data();

    api.apply_transfer("D100", &bulk("B"), "bob").unwrap();
    api.add_variant("D100", "Z", "bob").unwrap();
    api.apply_transfer("D100", &bulk("Z"), "bob").unwrap();

    let completed = api.get_completed_transfer("D100").unwrap().unwrap();
    assert_eq!(completed.transfer_count, 2);
    assert_eq!(completed.original_records.len(), 2);

    api.undo_transfer("D100", "").unwrap();
    let records = api.get_dfu_records("D100").unwrap();
    let variants: Vec<&str> = records.iter().map(|r| r.product_number.as_str()).collect();
    assert_eq!(variants, vec!["A", "B"]);
}

#[test]
fn test_undo_without_transfer_is_not_found() {
    let (api, _conn) = api_with_data();
    let err = api.undo_transfer("D100", "bob").unwrap_err();
    assert_eq!(err.code(), "NOT_FOUND");
}

#[test]
fn test_transfer_validation_errors() {
    let (api, _conn) = api_with_data();

    assert_eq!(
        api.apply_transfer("D999", &bulk("B"), "bob").unwrap_err().code(),
        "NOT_FOUND"
    );
    assert_eq!(
        api.apply_transfer("D100", &bulk("C"), "bob").unwrap_err().code(),
        "VALIDATION_ERROR"
    );
    assert_eq!(
        api.apply_transfer("  ", &bulk("B"), "bob").unwrap_err().code(),
        "VALIDATION_ERROR"
    );
    let empty = TransferSelection::Individual {
        mapping: BTreeMap::new(),
    };
    assert_eq!(
        api.apply_transfer("D100", &empty, "bob").unwrap_err().code(),
        "VALIDATION_ERROR"
    );
}

#[test]
fn test_granular_transfer_rejects_non_finite_quantity() {
    let (api, _conn) = api_with_data();
    let before = api.get_dfu_records("D100").unwrap();

    for quantity in [f64::INFINITY, f64::NAN] {
        let selection = TransferSelection::Granular {
            entries: vec![GranularEntry {
                source: "A".to_string(),
                target: "B".to_string(),
                week: WeekKey::new("1", "PlantX"),
                custom_quantity: Some(quantity),
            }],
        };
        let err = api.apply_transfer("D100", &selection, "bob").unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
    }

    assert_eq!(api.get_dfu_records("D100").unwrap(), before);
    assert!(api.get_completed_transfer("D100").unwrap().is_none());
    assert_eq!(variant_demand(&api, "D100", "A"), Some(50.0));
    assert_eq!(variant_demand(&api, "D100", "B"), Some(30.0));
}

#[test]
fn test_bulk_target_is_trimmed() {
    let (api, _conn) = api_with_data();

    api.apply_transfer("D100", &bulk(" B "), "bob").unwrap();
    assert_eq!(variant_demand(&api, "D100", "B"), Some(80.0));
    let completed = api.get_completed_transfer("D100").unwrap().unwrap();
    assert_eq!(completed.targets, vec!["B".to_string()]);
}

#[test]
fn test_add_variant_and_duplicate() {
    let (api, _conn) = api_with_data();

    let response = api.add_variant("D100", " N ", "bob").unwrap();
    assert_eq!(response.records_added, 1);
    assert_eq!(variant_demand(&api, "D100", "N"), Some(0.0));

    let before = api.get_dfu_records("D100").unwrap();
    let err = api.add_variant("D100", "A", "bob").unwrap_err();
    assert_eq!(err.code(), "VALIDATION_ERROR");
    assert_eq!(api.get_dfu_records("D100").unwrap(), before);
    assert_eq!(api.add_variant("D404", "N", "bob").unwrap_err().code(), "NOT_FOUND");
}

#[test]
fn test_pending_granular_execute() {
    let (api, _conn) = api_with_data();

    assert!(api.toggle_granular_week("D100", "A", "B", "1-PlantX").unwrap());
    api.set_granular_quantity("D100", "A", "B", "1-PlantX", Some(20.0))
        .unwrap();
    assert!(matches!(
        api.get_pending("D100").unwrap(),
        Some(PendingSelection::Granular { .. })
    ));

    let response = api.execute_pending("D100", "bob").unwrap();
    assert_eq!(response.notification.transfer_type, Some(crate::domain::transfer::TransferType::Granular));
    assert_eq!(variant_demand(&api, "D100", "A"), Some(30.0));
    assert_eq!(variant_demand(&api, "D100", "B"), Some(50.0));
    // 执行后待执行选择被清除
    assert!(api.get_pending("D100").unwrap().is_none());
}

#[test]
fn test_pending_validation() {
    let (api, _conn) = api_with_data();

    assert_eq!(api.set_bulk_target("D100", "C").unwrap_err().code(), "VALIDATION_ERROR");
    assert_eq!(api.set_bulk_target("D404", "A").unwrap_err().code(), "NOT_FOUND");
    assert_eq!(
        api.toggle_granular_week("D100", "A", "B", "week1").unwrap_err().code(),
        "VALIDATION_ERROR"
    );
    assert_eq!(
        api.set_granular_quantity("D100", "A", "B", "1-PlantX", Some(f64::NAN))
            .unwrap_err()
            .code(),
        "VALIDATION_ERROR"
    );
    assert_eq!(api.execute_pending("D100", "bob").unwrap_err().code(), "VALIDATION_ERROR");

    api.set_individual_target("D100", "A", "B").unwrap();
    assert!(api.clear_pending("D100").unwrap());
    assert!(!api.clear_pending("D100").unwrap());
}

#[test]
fn test_failed_save_leaves_session_unchanged() {
    let conn = setup_test_db();
    let store = Arc::new(FlakyStore::new(conn));
    let api = DemandTransferApi::new(store.clone(), None).unwrap();
    api.upload_csv(DEMAND_CSV.as_bytes(), "demand.csv", "alice")
        .unwrap();

    store.fail_save_session.store(true, Ordering::SeqCst);
    let err = api.apply_transfer("D100", &bulk("B"), "bob").unwrap_err();
    assert_eq!(err.code(), "STORAGE_ERROR");

    assert_eq!(variant_demand(&api, "D100", "A"), Some(50.0));
    assert!(api.get_completed_transfer("D100").unwrap().is_none());
    // 已写入的完成记录被补偿删除
    assert!(store.load_session().unwrap().completed_transfers.is_empty());
}

#[test]
fn test_state_survives_reload() {
    let conn = setup_test_db();
    {
        let store = Arc::new(SqliteSessionRepository::new(conn.clone()));
        let api = DemandTransferApi::new(store, None).unwrap();
        api.upload_csv(DEMAND_CSV.as_bytes(), "demand.csv", "alice")
            .unwrap();
        api.apply_transfer("D100", &bulk("B"), "bob").unwrap();
    }

    let api = DemandTransferApi::new(Arc::new(SqliteSessionRepository::new(conn)), None).unwrap();
    assert_eq!(variant_demand(&api, "D100", "B"), Some(80.0));
    api.undo_transfer("D100", "bob").unwrap();
    assert_eq!(variant_demand(&api, "D100", "A"), Some(50.0));
}

#[test]
fn test_notifications_and_action_log() {
    let conn = setup_test_db();
    let notifier = Arc::new(BroadcastNotifier::new(16));
    let mut rx = notifier.subscribe();
    let api = DemandTransferApi::new(
        Arc::new(SqliteSessionRepository::new(conn.clone())),
        Some(notifier),
    )
    .unwrap()
    .with_action_log(Arc::new(ActionLogRepository::new(conn)));

    api.upload_csv(DEMAND_CSV.as_bytes(), "demand.csv", "alice")
        .unwrap();
    api.apply_transfer("D100", &bulk("B"), "").unwrap();

    let first = rx.try_recv().unwrap();
    assert_eq!(first.operation, ChangeOperation::Upload);
    assert!(first.dfu_code.is_none());
    let second = rx.try_recv().unwrap();
    assert_eq!(second.operation, ChangeOperation::Transfer);
    assert_eq!(second.dfu_code.as_deref(), Some("D100"));
    assert_eq!(second.actor, crate::config::DEFAULT_ACTOR);

    let actions = api.dfu_actions("D100").unwrap();
    assert_eq!(actions.len(), 1);
    assert_eq!(actions[0].action_type, "Transfer");
    assert_eq!(api.recent_actions(10).unwrap().len(), 2);
}

#[test]
fn test_supplementary_export_and_reset() {
    let (api, _conn) = api_with_data();

    let csv = "Product Number,Stock On Hand\nA,5\nA,7\nB,1\n";
    let response = api
        .upload_supplementary_csv(SupplementaryKind::StockOnHand, csv.as_bytes(), "alice")
        .unwrap();
    assert_eq!(response.products, 2);
    let aggregates = api.get_aggregates(&AggregationFilter::all()).unwrap();
    let summary = &aggregates.get("D100").unwrap().variant_summaries["A"];
    assert_eq!(summary.stock_on_hand, Some(12.0));

    let exported = api.export_csv_string().unwrap();
    assert!(exported.starts_with("DFU,Product Number"));
    assert_eq!(exported.lines().count(), 4);

    let notification = api.reset("alice").unwrap();
    assert_eq!(notification.operation, ChangeOperation::Reset);
    assert!(api.get_aggregates(&AggregationFilter::all()).unwrap().dfus.is_empty());
    assert!(!api.get_upload_info().unwrap().has_data);
    // 操作日志不随重置清空
    assert_eq!(api.recent_actions(10).unwrap().len(), 3);
}
