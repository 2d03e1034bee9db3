//! Auto-save coordinator.
//!
//! Watches the session's change revision and persists the page design:
//!
//! - **Debounce**: every change (content, selection or canvas) restarts a
//!   short timer; when it fires, a save runs.
//! - **Interval**: an independent ticker saves whenever changes are pending
//!   and nothing is in flight, so continuous edits (a long drag) that keep
//!   resetting the debounce still reach storage.
//! - **Reentrancy**: at most one save is in flight. A `save()` call that
//!   finds one running returns `SaveOutcome::Skipped` immediately; it is
//!   not queued.
//!
//! A failed save is logged, reported to the error callback and otherwise
//! dropped; the changes stay unsaved and the next trigger retries.

use crate::config::AutoSaveConfig;
use crate::session::{SharedSession, lock_session};
use crate::storage::{DocumentStore, StoreError};
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

/// Called with every failed save.
pub type ErrorCallback = Arc<dyn Fn(&StoreError) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    /// Written; `version` is the new stored version.
    Saved { version: u64 },
    /// Another save was already in flight.
    Skipped,
}

/// Handle to the coordinator of one session. Clones share state.
#[derive(Clone)]
pub struct AutoSave {
    inner: Arc<Inner>,
}

struct Inner {
    session: SharedSession,
    store: Arc<dyn DocumentStore>,
    config: AutoSaveConfig,
    /// Latest session revision, read without taking the session lock.
    revisions: watch::Receiver<u64>,
    /// Highest revision known to be persisted.
    saved_revision: AtomicU64,
    saving: AtomicBool,
    last_save_time: Mutex<Option<DateTime<Utc>>>,
    on_error: Mutex<Option<ErrorCallback>>,
    shutdown: watch::Sender<bool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

/// Clears the in-flight flag however the save ends, including when the
/// save future is dropped.
struct SavingGuard<'a>(&'a AtomicBool);

impl Drop for SavingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl AutoSave {
    /// Create a stopped coordinator. The session's current state counts as
    /// saved.
    pub fn new(session: SharedSession, store: Arc<dyn DocumentStore>, config: AutoSaveConfig) -> Self {
        let (revisions, revision) = {
            let s = lock_session(&session);
            (s.subscribe(), s.revision())
        };
        let (shutdown, _) = watch::channel(false);
        Self {
            inner: Arc::new(Inner {
                session,
                store,
                config,
                revisions,
                saved_revision: AtomicU64::new(revision),
                saving: AtomicBool::new(false),
                last_save_time: Mutex::new(None),
                on_error: Mutex::new(None),
                shutdown,
                task: Mutex::new(None),
            }),
        }
    }

    pub fn set_error_callback(&self, callback: impl Fn(&StoreError) + Send + Sync + 'static) {
        *lock(&self.inner.on_error) = Some(Arc::new(callback));
    }

    /// Spawn the timer loop on the current tokio runtime. No-op when
    /// disabled, already running or disposed.
    pub fn start(&self) {
        if !self.inner.config.enabled {
            log::debug!("auto-save disabled by configuration");
            return;
        }
        if *self.inner.shutdown.borrow() {
            return;
        }
        let mut task = lock(&self.inner.task);
        if task.is_some() {
            return;
        }
        let changes = lock_session(&self.inner.session).subscribe();
        let shutdown = self.inner.shutdown.subscribe();
        *task = Some(tokio::spawn(self.clone().run(changes, shutdown)));
    }

    /// Stop the timers. An in-flight save still completes.
    pub fn dispose(&self) {
        self.inner.shutdown.send_replace(true);
        lock(&self.inner.task).take();
    }

    pub fn has_unsaved_changes(&self) -> bool {
        *self.inner.revisions.borrow() > self.inner.saved_revision.load(Ordering::Acquire)
    }

    pub fn is_saving(&self) -> bool {
        self.inner.saving.load(Ordering::Acquire)
    }

    pub fn last_save_time(&self) -> Option<DateTime<Utc>> {
        *lock(&self.inner.last_save_time)
    }

    /// Persist the current tree with an optimistic version check.
    pub async fn save(&self) -> Result<SaveOutcome, StoreError> {
        let inner = &self.inner;
        if inner.saving.swap(true, Ordering::AcqRel) {
            log::debug!("save skipped: another save is in flight");
            return Ok(SaveOutcome::Skipped);
        }
        let _guard = SavingGuard(&inner.saving);

        let (page_design_id, document, expected_version, revision) = {
            let session = lock_session(&inner.session);
            let (document, _) = session.persisted_document();
            (
                session.page_design_id().to_string(),
                document,
                session.persisted_version(),
                session.revision(),
            )
        };

        let written = document.clone();
        match inner.store.put(&page_design_id, document, expected_version).await {
            Ok(version) => {
                lock_session(&inner.session).mark_saved(version, &written);
                inner.saved_revision.fetch_max(revision, Ordering::AcqRel);
                *lock(&inner.last_save_time) = Some(Utc::now());
                log::debug!("saved page design {page_design_id} at version {version}");
                Ok(SaveOutcome::Saved { version })
            }
            Err(e) => {
                log::error!("saving page design {page_design_id} failed: {e}");
                let callback = lock(&inner.on_error).clone();
                if let Some(callback) = callback {
                    callback(&e);
                }
                Err(e)
            }
        }
    }

    /// Best-effort flush for page teardown: hand the current document to
    /// the store's beacon without waiting. Returns whether anything was
    /// handed over.
    pub fn flush_on_unload(&self) -> bool {
        if !self.has_unsaved_changes() {
            return false;
        }
        let (page_design_id, document) = {
            let session = lock_session(&self.inner.session);
            (session.page_design_id().to_string(), session.persisted_document().0)
        };
        match serde_json::to_string(&document) {
            Ok(payload) => {
                let accepted = self.inner.store.beacon(&page_design_id, payload);
                log::debug!("unload flush of {page_design_id} accepted: {accepted}");
                accepted
            }
            Err(e) => {
                log::error!("could not encode page design {page_design_id} for unload flush: {e}");
                false
            }
        }
    }

    // ─── Timer loop ──────────────────────────────────────────────────────

    async fn run(self, mut changes: watch::Receiver<u64>, mut shutdown: watch::Receiver<bool>) {
        let debounce = self.inner.config.debounce();
        let period = self.inner.config.interval();
        let mut ticker = time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut deadline: Option<Instant> = None;

        loop {
            tokio::select! {
                changed = changes.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    deadline = Some(Instant::now() + debounce);
                }
                () = time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    deadline = None;
                    if self.has_unsaved_changes() {
                        self.spawn_save("debounce");
                    }
                }
                _ = ticker.tick() => {
                    if self.has_unsaved_changes() && !self.is_saving() {
                        self.spawn_save("interval");
                    }
                }
                _ = shutdown.changed() => break,
            }
        }
        log::debug!("auto-save loop stopped");
    }

    fn spawn_save(&self, trigger: &'static str) {
        let this = self.clone();
        tokio::spawn(async move {
            match this.save().await {
                Ok(SaveOutcome::Saved { version }) => {
                    log::debug!("{trigger} save wrote version {version}")
                }
                Ok(SaveOutcome::Skipped) => log::debug!("{trigger} save skipped"),
                // Logged and reported inside `save`.
                Err(_) => {}
            }
        });
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
