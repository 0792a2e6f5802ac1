use super::ActionLogRepository;
use crate::domain::action_log::{ActionLog, ActionType};
use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::Connection;
use std::sync::{Arc, Mutex};

fn setup_test_db() -> Arc<Mutex<Connection>> {
    let conn = Connection::open_in_memory().unwrap();
    crate::db::configure_sqlite_connection(&conn).unwrap();
    crate::db::ensure_schema(&conn).unwrap();
    Arc::new(Mutex::new(conn))
}

fn ts(minute: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2026, 3, 2)
        .unwrap()
        .and_hms_opt(8, minute, 0)
        .unwrap()
}

#[test]
fn test_insert_and_find_by_id() {
    let repo = ActionLogRepository::new(setup_test_db());

    let log = ActionLog::new(ActionType::Transfer, "alice", ts(0))
        .with_dfu("D100")
        .with_payload(&serde_json::json!({ "target": "B" }))
        .with_detail("Bulk transfer for DFU D100");
    let id = repo.insert(&log).unwrap();

    let found = repo.find_by_id(&id).unwrap().unwrap();
    assert_eq!(found.action_type, "Transfer");
    assert_eq!(found.dfu_code.as_deref(), Some("D100"));
    assert_eq!(found.action_ts, ts(0));
    assert_eq!(found.payload_json.unwrap()["target"], "B");

    assert!(repo.find_by_id("missing").unwrap().is_none());
}

#[test]
fn test_recent_and_by_dfu_are_newest_first() {
    let repo = ActionLogRepository::new(setup_test_db());

    repo.insert(&ActionLog::new(ActionType::Upload, "alice", ts(0))).unwrap();
    repo.insert(&ActionLog::new(ActionType::Transfer, "alice", ts(1)).with_dfu("D100"))
        .unwrap();
    repo.insert(&ActionLog::new(ActionType::Undo, "bob", ts(2)).with_dfu("D100"))
        .unwrap();
    repo.insert(&ActionLog::new(ActionType::Transfer, "bob", ts(3)).with_dfu("D200"))
        .unwrap();

    let recent = repo.find_recent(2).unwrap();
    assert_eq!(recent.len(), 2);
    assert_eq!(recent[0].dfu_code.as_deref(), Some("D200"));

    let d100 = repo.find_by_dfu("D100").unwrap();
    let types: Vec<&str> = d100.iter().map(|l| l.action_type.as_str()).collect();
    assert_eq!(types, vec!["Undo", "Transfer"]);

    assert_eq!(repo.count().unwrap(), 4);
}
