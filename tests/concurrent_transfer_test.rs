// ==========================================
// 并发控制测试
// ==========================================
// 职责: 验证同一 DFU 的串行化、存储失败回滚与变更广播
// ==========================================


#[cfg(test)]
mod concurrent_transfer_test {
    use dfu_demand_transfer::api::DemandTransferApi;
    use dfu_demand_transfer::domain::record::DemandRecord;
    use dfu_demand_transfer::domain::session::{StoredSession, UploadInfo};
    use dfu_demand_transfer::domain::supplementary::SupplementaryData;
    use dfu_demand_transfer::domain::transfer::CompletedTransfer;
    use dfu_demand_transfer::engine::events::{BroadcastNotifier, ChangeNotifier, ChangeOperation};
    use dfu_demand_transfer::repository::{
        RepositoryError, RepositoryResult, SessionStore, SqliteSessionRepository,
    };
    use dfu_demand_transfer::{AggregationFilter, TransferSelection};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread;

    use crate::test_helpers::{create_api, create_test_db, open_shared, standard_csv, DemandCsvBuilder};

    // ==========================================
    // 测试辅助
    // ==========================================

    /// 撤销时删除已完成转移失败的存储
    struct FailingDeleteStore {
        inner: SqliteSessionRepository,
        fail: AtomicBool,
    }

    impl SessionStore for FailingDeleteStore {
        fn load_session(&self) -> RepositoryResult<StoredSession> {
            self.inner.load_session()
        }

        fn save_session(&self, records: &[DemandRecord]) -> RepositoryResult<()> {
            self.inner.save_session(records)
        }

        fn save_completed_transfer(&self, dfu_code: &str, entry: &CompletedTransfer) -> RepositoryResult<()> {
            self.inner.save_completed_transfer(dfu_code, entry)
        }

        fn delete_completed_transfer(&self, dfu_code: &str) -> RepositoryResult<()> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(RepositoryError::DatabaseTransactionError("database is locked".to_string()));
            }
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

    fn total(api: &DemandTransferApi, dfu: &str) -> f64 {
        api.get_aggregates(&AggregationFilter::all())
            .unwrap()
            .get(dfu)
            .map(|agg| agg.total_demand())
            .unwrap_or_default()
    }

    // ==========================================
    // 串行化
    // ==========================================

    #[test]
    fn test_concurrent_transfers_on_same_dfu_preserve_total() {
        let (_temp, db_path) = create_test_db().unwrap();
        let api = Arc::new(create_api(&db_path, None));
        let csv = DemandCsvBuilder::new()
            .row("D1", "A", 100.0, "1", "PlantX")
            .row("D1", "B", 0.0, "1", "PlantX")
            .build();
        api.upload_csv(csv.as_bytes(), "d1.csv", "alice").unwrap();

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let api = Arc::clone(&api);
                thread::spawn(move || {
                    let target = if i % 2 == 0 { "B" } else { "A" };
                    let selection = TransferSelection::Bulk {
                        target: target.to_string(),
                    };
                    api.apply_transfer("D1", &selection, &format!("user{}", i))
                        .unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(total(&api, "D1"), 100.0);
        let completed = api.get_completed_transfer("D1").unwrap().unwrap();
        assert_eq!(completed.transfer_count, 8);
        // 原始切片只捕获一次
        assert_eq!(completed.original_records.len(), 2);

        api.undo_transfer("D1", "alice").unwrap();
        let records = api.get_dfu_records("D1").unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].weekly_fcst, 100.0);
    }

    #[test]
    fn test_concurrent_transfers_on_different_dfus() {
        let (_temp, db_path) = create_test_db().unwrap();
        let api = Arc::new(create_api(&db_path, None));
        let mut builder = DemandCsvBuilder::new();
        for i in 0..6 {
            let dfu = format!("D{}", i);
            builder = builder
                .row(&dfu, "A", 10.0, "1", "PlantX")
                .row(&dfu, "B", 5.0, "1", "PlantX");
        }
        api.upload_csv(builder.build().as_bytes(), "many.csv", "alice")
            .unwrap();

        let handles: Vec<_> = (0..6)
            .map(|i| {
                let api = Arc::clone(&api);
                thread::spawn(move || {
                    let selection = TransferSelection::Bulk {
                        target: "B".to_string(),
                    };
                    api.apply_transfer(&format!("D{}", i), &selection, "worker")
                        .unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let aggregates = api.get_aggregates(&AggregationFilter::all()).unwrap();
        assert_eq!(aggregates.completed_count(), 6);
        for aggregate in aggregates.dfus.values() {
            assert_eq!(aggregate.variant_demand("B"), Some(15.0));
        }

        // 重新加载后状态一致
        let reloaded = create_api(&db_path, None);
        assert_eq!(
            reloaded
                .get_aggregates(&AggregationFilter::all())
                .unwrap()
                .completed_count(),
            6
        );
    }

    // ==========================================
    // 存储失败
    // ==========================================

    #[test]
    fn test_failed_undo_keeps_transfer_applied() {
        let (_temp, db_path) = create_test_db().unwrap();
        let store = Arc::new(FailingDeleteStore {
            inner: SqliteSessionRepository::new(open_shared(&db_path)),
            fail: AtomicBool::new(false),
        });
        let api = DemandTransferApi::new(store.clone(), None).unwrap();
        api.upload_csv(standard_csv().as_bytes(), "demand.csv", "alice")
            .unwrap();
        api.apply_transfer(
            "D100",
            &TransferSelection::Bulk {
                target: "B".to_string(),
            },
            "bob",
        )
        .unwrap();

        store.fail.store(true, Ordering::SeqCst);
        let err = api.undo_transfer("D100", "bob").unwrap_err();
        assert_eq!(err.code(), "STORAGE_ERROR");

        let records = api.get_dfu_records("D100").unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].weekly_fcst, 80.0);
        assert!(api.get_completed_transfer("D100").unwrap().is_some());

        store.fail.store(false, Ordering::SeqCst);
        api.undo_transfer("D100", "bob").unwrap();
        assert_eq!(api.get_dfu_records("D100").unwrap().len(), 2);
    }

    // ==========================================
    // 变更广播
    // ==========================================

    #[test]
    fn test_broadcast_reaches_every_subscriber() {
        let (_temp, db_path) = create_test_db().unwrap();
        let notifier = Arc::new(BroadcastNotifier::new(32));
        let mut first = notifier.subscribe();
        let mut second = notifier.subscribe();
        let api = create_api(&db_path, Some(notifier.clone() as Arc<dyn ChangeNotifier>));

        api.upload_csv(standard_csv().as_bytes(), "demand.csv", "alice")
            .unwrap();
        api.add_variant("D200", "Z", "bob").unwrap();

        for rx in [&mut first, &mut second] {
            assert_eq!(rx.try_recv().unwrap().operation, ChangeOperation::Upload);
            let add = rx.try_recv().unwrap();
            assert_eq!(add.operation, ChangeOperation::AddVariant);
            assert_eq!(add.dfu_code.as_deref(), Some("D200"));
            assert_eq!(add.actor, "bob");
            assert!(rx.try_recv().is_err());
        }
    }

    #[test]
    fn test_failed_operation_does_not_notify() {
        let (_temp, db_path) = create_test_db().unwrap();
        let notifier = Arc::new(BroadcastNotifier::new(8));
        let mut rx = notifier.subscribe();
        let api = create_api(&db_path, Some(notifier.clone() as Arc<dyn ChangeNotifier>));
        api.upload_csv(standard_csv().as_bytes(), "demand.csv", "alice")
            .unwrap();
        rx.try_recv().unwrap();

        assert!(api.add_variant("D100", "A", "bob").is_err());
        assert!(api.undo_transfer("D100", "bob").is_err());
        assert!(rx.try_recv().is_err());
    }
}
