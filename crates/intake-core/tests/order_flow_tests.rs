//! End-to-end order flows across both stores.

use std::sync::{Arc, Mutex};

use intake_core::{
    AttendRequest, AvailabilityWindow, CoreConfig, CoreError, CreateOrderRequest, Database,
    DuplicateCheck, IntakeRequest, IntakeService, MirrorStatus, OrderFilter, OrderPatch,
    OrderStatus,
};
use intake_mirror::{ExternalOrder, ExternalOrderPayload, ExternalStore, MirrorError, MirrorResult};

/// In-memory external store with a reachability switch.
struct FakeStore {
    records: Mutex<Vec<ExternalOrder>>,
    unreachable: Mutex<bool>,
}

impl FakeStore {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            records: Mutex::new(Vec::new()),
            unreachable: Mutex::new(false),
        })
    }

    fn set_unreachable(&self, down: bool) {
        *self.unreachable.lock().unwrap() = down;
    }

    fn record_for(&self, shared_key: &str) -> Option<ExternalOrder> {
        self.records
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.fields.clave.as_deref() == Some(shared_key))
            .cloned()
    }

    fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    fn gate(&self) -> MirrorResult<()> {
        if *self.unreachable.lock().unwrap() {
            Err(MirrorError::Unavailable("connection refused".into()))
        } else {
            Ok(())
        }
    }
}

impl ExternalStore for FakeStore {
    fn find_by_shared_key(&self, shared_key: &str) -> MirrorResult<Option<ExternalOrder>> {
        self.gate()?;
        Ok(self.record_for(shared_key))
    }

    fn create(&self, payload: &ExternalOrderPayload) -> MirrorResult<ExternalOrder> {
        self.gate()?;
        let mut records = self.records.lock().unwrap();
        let record = ExternalOrder {
            id: format!("ext-{}", records.len() + 1),
            fields: payload.clone(),
        };
        records.push(record.clone());
        Ok(record)
    }

    fn update_by_internal_id(
        &self,
        internal_id: &str,
        payload: &ExternalOrderPayload,
    ) -> MirrorResult<()> {
        self.gate()?;
        let mut records = self.records.lock().unwrap();
        let record = records
            .iter_mut()
            .find(|r| r.id == internal_id)
            .ok_or(MirrorError::Status { code: 404 })?;
        record.fields = payload.clone();
        Ok(())
    }
}

fn setup_service(store: Arc<FakeStore>) -> IntakeService {
    let db = Database::open_in_memory().unwrap();
    // Monday morning window
    db.upsert_window(&AvailabilityWindow::new(
        "Dra. Rivas".into(),
        0,
        "audiometria".into(),
        "08:00".into(),
        "12:00".into(),
        20,
    ))
    .unwrap();
    IntakeService::new(db, store, CoreConfig::default())
}

fn request(subject_id: &str, time: &str) -> CreateOrderRequest {
    CreateOrderRequest {
        subject_id: subject_id.into(),
        first_name: "Ana".into(),
        last_name: "Mora".into(),
        sex: Some("F".into()),
        age: Some(40),
        exam_type: "audiometria".into(),
        scheduled_date: "2024-03-11".into(),
        scheduled_time: time.into(),
        ..Default::default()
    }
}

#[test]
fn test_admission_reaches_both_stores() {
    let store = FakeStore::new();
    let service = setup_service(store.clone());

    let outcome = service.create_order(request("415117423", "09:00")).unwrap();
    let key = &outcome.record.shared_key;
    assert!(matches!(outcome.mirror, MirrorStatus::Applied { .. }));

    let mirrored = store.record_for(key).unwrap();
    assert_eq!(mirrored.fields.cedula.as_deref(), Some("415117423"));
    assert_eq!(mirrored.fields.medico.as_deref(), Some("Dra. Rivas"));
    assert_eq!(mirrored.fields.estado.as_deref(), Some("pendiente"));
}

#[test]
fn test_open_order_blocks_second_admission() {
    let store = FakeStore::new();
    let service = setup_service(store.clone());

    let first = service.create_order(request("415117423", "09:00")).unwrap();
    let err = service.create_order(request("415117423", "09:20")).unwrap_err();

    match err {
        CoreError::Duplicate {
            order,
            has_linked_intake,
        } => {
            assert_eq!(order.shared_key, first.record.shared_key);
            assert_eq!(order.created_at, first.record.created_at);
            assert!(!has_linked_intake);
        }
        other => panic!("expected duplicate, got {other:?}"),
    }

    // Nothing extra hit either store
    assert_eq!(store.len(), 1);
    assert_eq!(service.list_orders(&OrderFilter::default()).unwrap().len(), 1);
}

#[test]
fn test_partial_update_never_blanks_fields() {
    let store = FakeStore::new();
    let service = setup_service(store.clone());

    let outcome = service.create_order(request("415117423", "09:00")).unwrap();
    let key = outcome.record.shared_key.clone();

    let patch = OrderPatch {
        email: Some("ana@x.com".into()),
        ..Default::default()
    };
    let updated = service.update_order(&key, patch).unwrap();

    // Untouched fields survive locally
    assert_eq!(updated.record.email.as_deref(), Some("ana@x.com"));
    assert_eq!(updated.record.sex.as_deref(), Some("F"));
    assert_eq!(updated.record.age, Some(40));
    assert_eq!(updated.record.version, 2);

    // And the mirrored payload carries the full row, not just the patch
    let mirrored = store.record_for(&key).unwrap();
    assert_eq!(mirrored.fields.email.as_deref(), Some("ana@x.com"));
    assert_eq!(mirrored.fields.genero.as_deref(), Some("F"));
    assert_eq!(mirrored.fields.edad, Some(40));
    assert_eq!(mirrored.fields.version, Some(2));
}

#[test]
fn test_mirror_failure_never_loses_the_local_commit() {
    let store = FakeStore::new();
    let service = setup_service(store.clone());
    store.set_unreachable(true);

    let outcome = service.create_order(request("415117423", "09:00")).unwrap();
    assert!(matches!(outcome.mirror, MirrorStatus::Failed { .. }));

    // Local row committed and queryable despite the dead mirror
    let local = service.get_order(&outcome.record.shared_key).unwrap();
    assert_eq!(local.subject_id, "415117423");
    assert_eq!(store.len(), 0);

    // And the open order still blocks duplicates
    let err = service.create_order(request("415117423", "09:20")).unwrap_err();
    assert!(matches!(err, CoreError::Duplicate { .. }));
}

#[test]
fn test_attend_then_new_admission() {
    let store = FakeStore::new();
    let service = setup_service(store.clone());

    let first = service.create_order(request("415117423", "09:00")).unwrap();
    let attended = service
        .mark_attended(
            &first.record.shared_key,
            AttendRequest {
                observations: Some("normal hearing".into()),
                recommendations: Some("recheck in 12 months".into()),
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(attended.record.status, OrderStatus::Attended);

    let mirrored = store.record_for(&first.record.shared_key).unwrap();
    assert_eq!(mirrored.fields.estado.as_deref(), Some("atendido"));
    assert_eq!(
        mirrored.fields.recomendaciones.as_deref(),
        Some("recheck in 12 months")
    );

    // History no longer blocks, only warns
    let second = service.create_order(request("415117423", "09:20")).unwrap();
    assert_eq!(
        second.prior_attended.unwrap().shared_key,
        first.record.shared_key
    );
    assert_eq!(store.len(), 2);
}

#[test]
fn test_concurrent_admissions_admit_exactly_one() {
    let store = FakeStore::new();
    let service = Arc::new(setup_service(store.clone()));

    let times = ["08:00", "08:20", "08:40", "09:00", "09:20", "09:40"];
    let handles: Vec<_> = times
        .iter()
        .map(|time| {
            let service = Arc::clone(&service);
            let time = time.to_string();
            std::thread::spawn(move || service.create_order(request("415117423", &time)))
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let admitted = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(admitted, 1);
    for result in &results {
        if let Err(e) = result {
            assert!(matches!(e, CoreError::Duplicate { .. }), "got {e:?}");
        }
    }

    let pending = service
        .list_orders(&OrderFilter {
            status: Some(OrderStatus::Pending),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(pending.len(), 1);
}

#[test]
fn test_background_dispatcher_drains_commits() {
    let store = FakeStore::new();
    let service = setup_service(store.clone()).with_dispatcher();

    let outcome = service.create_order(request("415117423", "09:00")).unwrap();
    assert_eq!(outcome.mirror, MirrorStatus::Queued);

    // Poll until the dispatcher lands the task
    let key = outcome.record.shared_key.clone();
    for _ in 0..200 {
        if store.record_for(&key).is_some() {
            break;
        }
        std::thread::sleep(std::time::Duration::from_millis(10));
    }
    assert!(store.record_for(&key).is_some());
}

#[test]
fn test_local_store_survives_reopen() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("intake.db");

    let key = {
        let db = Database::open(&path)?;
        db.upsert_window(&AvailabilityWindow::new(
            "Dra. Rivas".into(),
            0,
            "audiometria".into(),
            "08:00".into(),
            "12:00".into(),
            20,
        ))?;
        let service = IntakeService::new(db, FakeStore::new(), CoreConfig::default());
        service
            .create_order(request("415117423", "09:00"))
            .map_err(|e| anyhow::anyhow!("{e}"))?
            .record
            .shared_key
    };

    let db = Database::open(&path)?;
    let order = db.get_order(&key)?.expect("order persisted");
    assert_eq!(order.subject_id, "415117423");
    assert_eq!(order.provider.as_deref(), Some("Dra. Rivas"));
    Ok(())
}

#[test]
fn test_intake_linkage_changes_duplicate_detail() {
    let store = FakeStore::new();
    let service = setup_service(store.clone());

    let order = service.create_order(request("415117423", "09:00")).unwrap();
    match service.check_duplicate("415117423").unwrap() {
        DuplicateCheck::Pending {
            has_linked_intake, ..
        } => assert!(!has_linked_intake),
        other => panic!("expected pending, got {other:?}"),
    }

    let record = service
        .create_intake(IntakeRequest {
            subject_id: "415117423".into(),
            first_name: "Ana".into(),
            last_name: "Mora".into(),
            hearing_loss: true,
            ..Default::default()
        })
        .unwrap();
    assert_eq!(
        record.shared_key.as_deref(),
        Some(order.record.shared_key.as_str())
    );

    // The intake stays out of the external store
    assert_eq!(store.len(), 1);

    match service.check_duplicate("415117423").unwrap() {
        DuplicateCheck::Pending {
            has_linked_intake, ..
        } => assert!(has_linked_intake),
        other => panic!("expected pending, got {other:?}"),
    }
}
