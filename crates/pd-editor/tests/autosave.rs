//! Integration tests: auto-save timing, reentrancy and failure handling.
//!
//! All tests run on tokio's paused clock, so debounce and interval timers
//! elapse instantly and deterministically.

use async_trait::async_trait;
use pd_core::*;
use pd_editor::*;
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::sleep;

// ─── Test stores ─────────────────────────────────────────────────────────

/// Counts writes; optionally holds each write until released, or fails it.
#[derive(Default)]
struct ProbeStore {
    inner: InMemoryDocumentStore,
    puts: AtomicUsize,
    gate: Option<Notify>,
    fail: bool,
}

impl ProbeStore {
    fn counting() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn gated() -> Arc<Self> {
        Arc::new(Self {
            gate: Some(Notify::new()),
            ..Default::default()
        })
    }

    fn failing() -> Arc<Self> {
        Arc::new(Self {
            fail: true,
            ..Default::default()
        })
    }

    fn puts(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.notify_one();
        }
    }
}

#[async_trait]
impl DocumentStore for ProbeStore {
    async fn get(&self, page_design_id: &str) -> Result<PageDesign, StoreError> {
        self.inner.get(page_design_id).await
    }

    async fn put(
        &self,
        page_design_id: &str,
        document: PageDesign,
        expected_version: u64,
    ) -> Result<u64, StoreError> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        if self.fail {
            return Err(StoreError::storage("disk full"));
        }
        self.inner.put(page_design_id, document, expected_version).await
    }

    fn beacon(&self, page_design_id: &str, payload: String) -> bool {
        self.inner.beacon(page_design_id, payload)
    }
}

fn setup(page: &str, store: Arc<ProbeStore>) -> (SharedSession, AutoSave) {
    let _ = env_logger::builder().is_test(true).try_init();
    let session = EditorSession::init(page, EditorConfig::default()).into_shared();
    let autosave = AutoSave::new(session.clone(), store, AutoSaveConfig::default());
    (session, autosave)
}

/// Let spawned tasks run without advancing the clock.
async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}

// ─── Debounce ────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn burst_of_edits_saves_once_after_quiet_period() {
    let store = ProbeStore::counting();
    let (session, autosave) = setup("burst", store.clone());
    autosave.start();
    settle().await;

    let id = lock_session(&session)
        .add_component(ComponentType::Button, None, None)
        .unwrap();
    for label in ["a", "b", "c", "d"] {
        sleep(Duration::from_millis(40)).await;
        lock_session(&session)
            .update_component(id, &ComponentPatch::new().prop("label", label))
            .unwrap();
    }
    assert!(autosave.has_unsaved_changes());

    // Just short of the debounce after the last edit.
    sleep(Duration::from_millis(990)).await;
    settle().await;
    assert_eq!(store.puts(), 0);

    sleep(Duration::from_millis(20)).await;
    settle().await;
    assert_eq!(store.puts(), 1);
    assert!(!autosave.has_unsaved_changes());

    let saved = store.inner.document("burst").unwrap();
    assert_eq!(saved.version, 1);
    assert_eq!(
        saved.component_tree.components[&id].props["label"],
        serde_json::json!("d")
    );

    // Quiet afterwards: nothing else is written.
    sleep(Duration::from_secs(60)).await;
    settle().await;
    assert_eq!(store.puts(), 1);
    autosave.dispose();
}

#[tokio::test(start_paused = true)]
async fn continuous_edits_still_reach_storage_on_interval() {
    let store = ProbeStore::counting();
    let (session, autosave) = setup("drag", store.clone());
    autosave.start();
    settle().await;

    // A pan every 500ms keeps resetting the 1s debounce.
    for _ in 0..59 {
        lock_session(&session).pan_by(1.0, 0.0);
        sleep(Duration::from_millis(500)).await;
    }
    settle().await;
    assert_eq!(store.puts(), 0);

    for _ in 0..10 {
        lock_session(&session).pan_by(1.0, 0.0);
        sleep(Duration::from_millis(500)).await;
    }
    settle().await;
    assert_eq!(store.puts(), 1);
    autosave.dispose();
}

// ─── Reentrancy ──────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn concurrent_save_is_skipped_not_queued() {
    let store = ProbeStore::gated();
    let (session, autosave) = setup("reentrant", store.clone());
    lock_session(&session)
        .add_component(ComponentType::Form, None, None)
        .unwrap();

    let first = {
        let autosave = autosave.clone();
        tokio::spawn(async move { autosave.save().await })
    };
    settle().await;
    assert!(autosave.is_saving());

    assert_eq!(autosave.save().await, Ok(SaveOutcome::Skipped));
    assert_eq!(store.puts(), 1);

    store.release();
    assert_eq!(first.await.unwrap(), Ok(SaveOutcome::Saved { version: 1 }));
    assert!(!autosave.is_saving());
    assert_eq!(store.puts(), 1);
}

#[tokio::test(start_paused = true)]
async fn saves_in_sequence_advance_the_version() {
    let store = ProbeStore::counting();
    let (session, autosave) = setup("sequence", store.clone());

    lock_session(&session)
        .add_component(ComponentType::Text, None, None)
        .unwrap();
    assert_eq!(autosave.save().await, Ok(SaveOutcome::Saved { version: 1 }));

    lock_session(&session)
        .add_component(ComponentType::Text, None, None)
        .unwrap();
    assert_eq!(autosave.save().await, Ok(SaveOutcome::Saved { version: 2 }));
    assert_eq!(store.inner.document("sequence").unwrap().component_tree.components.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn node_version_never_goes_back_after_undo() {
    let store = ProbeStore::counting();
    let (session, autosave) = setup("undo_then_save", store.clone());
    let id = lock_session(&session)
        .add_component(ComponentType::Button, None, None)
        .unwrap();
    let stored_version = || {
        store.inner.document("undo_then_save").unwrap().component_tree.components[&id].version
    };

    autosave.save().await.unwrap();
    assert_eq!(stored_version(), 1);

    lock_session(&session)
        .update_component(id, &ComponentPatch::new().prop("label", "Hi"))
        .unwrap();
    autosave.save().await.unwrap();
    assert_eq!(stored_version(), 2);

    assert!(lock_session(&session).undo().is_some());
    assert_eq!(autosave.save().await, Ok(SaveOutcome::Saved { version: 3 }));
    assert_eq!(stored_version(), 3);
    let saved = store.inner.document("undo_then_save").unwrap();
    assert_eq!(
        saved.component_tree.components[&id].props["label"],
        serde_json::json!("Button")
    );
}

// ─── Failures ────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn failed_save_keeps_changes_and_reports() {
    let store = ProbeStore::failing();
    let (session, autosave) = setup("broken", store.clone());
    let reported = Arc::new(AtomicUsize::new(0));
    {
        let reported = reported.clone();
        autosave.set_error_callback(move |err| {
            assert_eq!(err, &StoreError::Storage("disk full".into()));
            reported.fetch_add(1, Ordering::SeqCst);
        });
    }
    autosave.start();
    settle().await;

    lock_session(&session)
        .add_component(ComponentType::Image, None, None)
        .unwrap();
    sleep(Duration::from_millis(1100)).await;
    settle().await;

    assert_eq!(store.puts(), 1);
    assert_eq!(reported.load(Ordering::SeqCst), 1);
    assert!(autosave.has_unsaved_changes());
    assert!(!autosave.is_saving());
    assert_eq!(lock_session(&session).persisted_version(), 0);

    // No immediate retry: the next attempt waits for the interval tick.
    sleep(Duration::from_secs(5)).await;
    settle().await;
    assert_eq!(store.puts(), 1);
    sleep(Duration::from_secs(30)).await;
    settle().await;
    assert_eq!(store.puts(), 2);
    autosave.dispose();
}

#[tokio::test(start_paused = true)]
async fn stale_version_surfaces_conflict() {
    let store = ProbeStore::counting();
    let mut newer = PageDesign::new("contested", "Contested");
    newer.version = 5;
    store.inner.insert(newer);

    let (session, autosave) = setup("contested", store.clone());
    lock_session(&session)
        .add_component(ComponentType::Heading, None, None)
        .unwrap();

    assert_eq!(
        autosave.save().await,
        Err(StoreError::VersionConflict {
            expected: 0,
            actual: 5
        })
    );
    assert!(autosave.has_unsaved_changes());
    assert_eq!(store.inner.document("contested").unwrap().version, 5);
}

// ─── Lifecycle ───────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn dispose_stops_all_timers() {
    let store = ProbeStore::counting();
    let (session, autosave) = setup("disposed", store.clone());
    autosave.start();
    settle().await;
    autosave.dispose();
    settle().await;

    lock_session(&session)
        .add_component(ComponentType::Card, None, None)
        .unwrap();
    sleep(Duration::from_secs(90)).await;
    settle().await;
    assert_eq!(store.puts(), 0);
    assert!(autosave.has_unsaved_changes());

    // Restarting a disposed coordinator does nothing.
    autosave.start();
    sleep(Duration::from_secs(90)).await;
    settle().await;
    assert_eq!(store.puts(), 0);
}

#[tokio::test(start_paused = true)]
async fn unload_hands_dirty_document_to_beacon() {
    let store = ProbeStore::counting();
    let (session, autosave) = setup("unload", store.clone());
    assert!(!autosave.flush_on_unload());

    let id = lock_session(&session)
        .add_component(ComponentType::Badge, None, None)
        .unwrap();
    assert!(autosave.flush_on_unload());
    assert_eq!(store.puts(), 0);

    let beacons = store.inner.beacons();
    assert_eq!(beacons.len(), 1);
    let sent: PageDesign = serde_json::from_str(&beacons[0].1).unwrap();
    assert_eq!(sent.id, "unload");
    assert_eq!(sent.version, 1);
    assert!(sent.component_tree.components.contains_key(&id));
}
