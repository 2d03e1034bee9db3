//! Persistence boundary for page designs.
//!
//! The editor only needs get/put by page-design id with an optimistic
//! version check, plus a fire-and-forget channel for page teardown. The
//! storage engine itself lives behind `DocumentStore`.

use async_trait::async_trait;
use pd_core::PageDesign;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("page design {0} not found")]
    NotFound(String),

    /// The stored document moved on since it was loaded. The caller must
    /// re-fetch; nothing is merged automatically.
    #[error("version conflict: expected stored version {expected}, found {actual}")]
    VersionConflict { expected: u64, actual: u64 },

    #[error("storage error: {0}")]
    Storage(String),
}

impl StoreError {
    pub fn storage(err: impl std::fmt::Display) -> Self {
        Self::Storage(err.to_string())
    }
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, page_design_id: &str) -> Result<PageDesign, StoreError>;

    /// Write `document` if the stored version equals `expected_version`
    /// (`0` creates a new document). Returns the new stored version,
    /// `expected_version + 1`.
    async fn put(
        &self,
        page_design_id: &str,
        document: PageDesign,
        expected_version: u64,
    ) -> Result<u64, StoreError>;

    /// Queue `payload` (a serialized `PageDesign`) without waiting for the
    /// outcome. Returns whether the transport accepted it.
    fn beacon(&self, page_design_id: &str, payload: String) -> bool;
}

// ─── In-memory store ─────────────────────────────────────────────────────

/// A `DocumentStore` backed by a map, for tests and embedding.
#[derive(Debug, Default)]
pub struct InMemoryDocumentStore {
    documents: Mutex<HashMap<String, PageDesign>>,
    beacons: Mutex<Vec<(String, String)>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a document as-is, bypassing the version check.
    pub fn insert(&self, document: PageDesign) {
        lock(&self.documents).insert(document.id.clone(), document);
    }

    pub fn document(&self, page_design_id: &str) -> Option<PageDesign> {
        lock(&self.documents).get(page_design_id).cloned()
    }

    /// Every beacon received, oldest first, as `(page_design_id, payload)`.
    pub fn beacons(&self) -> Vec<(String, String)> {
        lock(&self.beacons).clone()
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn get(&self, page_design_id: &str) -> Result<PageDesign, StoreError> {
        self.document(page_design_id)
            .ok_or_else(|| StoreError::NotFound(page_design_id.to_string()))
    }

    async fn put(
        &self,
        page_design_id: &str,
        mut document: PageDesign,
        expected_version: u64,
    ) -> Result<u64, StoreError> {
        let mut documents = lock(&self.documents);
        match documents.get(page_design_id) {
            Some(stored) if stored.version != expected_version => {
                return Err(StoreError::VersionConflict {
                    expected: expected_version,
                    actual: stored.version,
                });
            }
            None if expected_version != 0 => {
                return Err(StoreError::NotFound(page_design_id.to_string()));
            }
            _ => {}
        }
        let version = expected_version + 1;
        document.version = version;
        documents.insert(page_design_id.to_string(), document);
        Ok(version)
    }

    fn beacon(&self, page_design_id: &str, payload: String) -> bool {
        // Apply best-effort: only a newer, readable document replaces.
        if let Ok(document) = serde_json::from_str::<PageDesign>(&payload) {
            let mut documents = lock(&self.documents);
            let newer = documents
                .get(page_design_id)
                .is_none_or(|stored| stored.version < document.version);
            if newer {
                documents.insert(page_design_id.to_string(), document);
            }
        }
        lock(&self.beacons).push((page_design_id.to_string(), payload));
        true
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn create_then_update() {
        let store = InMemoryDocumentStore::new();
        let page = PageDesign::new("p1", "Landing");

        assert_eq!(store.put("p1", page.clone(), 0).await, Ok(1));
        assert_eq!(store.put("p1", page.clone(), 1).await, Ok(2));
        assert_eq!(store.get("p1").await.unwrap().version, 2);
    }

    #[tokio::test]
    async fn stale_version_conflicts() {
        let store = InMemoryDocumentStore::new();
        let page = PageDesign::new("p1", "Landing");
        store.put("p1", page.clone(), 0).await.unwrap();
        store.put("p1", page.clone(), 1).await.unwrap();

        assert_eq!(
            store.put("p1", page, 1).await,
            Err(StoreError::VersionConflict {
                expected: 1,
                actual: 2
            })
        );
        assert_eq!(store.document("p1").unwrap().version, 2);
    }

    #[tokio::test]
    async fn missing_documents() {
        let store = InMemoryDocumentStore::new();
        assert_eq!(
            store.get("nope").await.unwrap_err(),
            StoreError::NotFound("nope".into())
        );
        assert_eq!(
            store.put("nope", PageDesign::new("nope", "x"), 3).await,
            Err(StoreError::NotFound("nope".into()))
        );
    }

    #[test]
    fn beacon_applies_newer_documents_only() {
        let store = InMemoryDocumentStore::new();
        let mut page = PageDesign::new("p1", "Landing");
        page.version = 4;
        store.insert(page.clone());

        let mut stale = page.clone();
        stale.version = 3;
        stale.name = "Stale".into();
        assert!(store.beacon("p1", serde_json::to_string(&stale).unwrap()));
        assert_eq!(store.document("p1").unwrap().name, "Landing");

        let mut fresh = page;
        fresh.version = 5;
        fresh.name = "Fresh".into();
        assert!(store.beacon("p1", serde_json::to_string(&fresh).unwrap()));
        assert_eq!(store.document("p1").unwrap().name, "Fresh");
        assert_eq!(store.beacons().len(), 2);
    }
}
