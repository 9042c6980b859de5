//! # Shared Application State
//!
//! In-memory stores for every aggregate, shared across handlers via
//! `axum::extract::State`. Each store is a `parking_lot::RwLock` over
//! a `HashMap`; transition handlers use [`Store::try_update`] so the
//! read-validate-write of a lifecycle transition happens under one
//! write lock and concurrent decisions on the same application
//! serialize instead of racing.
//!
//! The optional `PgPool` enables write-through persistence: handlers
//! commit to the in-memory store first and then mirror the change to
//! Postgres.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use csign_core::{ApplicationId, DocumentId, FolderId, FormId, RouteId, UserId};
use csign_engine::{Application, ApprovalForm, ApprovalRoute};

/// A concurrent keyed store over one aggregate type.
#[derive(Debug)]
pub struct Store<K, V> {
    inner: Arc<RwLock<HashMap<K, V>>>,
}

impl<K, V> Clone for Store<K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K, V> Default for Store<K, V> {
    fn default() -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl<K: Eq + Hash, V: Clone> Store<K, V> {
    pub fn insert(&self, key: K, value: V) {
        self.inner.write().insert(key, value);
    }

    pub fn get(&self, key: &K) -> Option<V> {
        self.inner.read().get(key).cloned()
    }

    pub fn contains(&self, key: &K) -> bool {
        self.inner.read().contains_key(key)
    }

    pub fn remove(&self, key: &K) -> Option<V> {
        self.inner.write().remove(key)
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    /// Snapshot of all values.
    pub fn list(&self) -> Vec<V> {
        self.inner.read().values().cloned().collect()
    }

    /// Snapshot of values matching a predicate.
    pub fn list_where(&self, mut pred: impl FnMut(&V) -> bool) -> Vec<V> {
        self.inner
            .read()
            .values()
            .filter(|v| pred(v))
            .cloned()
            .collect()
    }

    /// Mutate a record atomically under the write lock.
    ///
    /// The closure's guards and the mutation run as one critical
    /// section, so two callers racing on the same record cannot both
    /// pass a state check that the other's update invalidates. Returns
    /// `None` when the key is absent; on success, a clone of the
    /// updated value is returned alongside the closure's output.
    pub fn try_update<R, E>(
        &self,
        key: &K,
        f: impl FnOnce(&mut V) -> Result<R, E>,
    ) -> Option<Result<(V, R), E>> {
        let mut map = self.inner.write();
        let value = map.get_mut(key)?;
        Some(f(value).map(|out| (value.clone(), out)))
    }

    /// Remove a record only if the guard passes, atomically.
    pub fn try_remove<E>(
        &self,
        key: &K,
        check: impl FnOnce(&V) -> Result<(), E>,
    ) -> Option<Result<V, E>> {
        let mut map = self.inner.write();
        let value = map.get(key)?;
        if let Err(err) = check(value) {
            return Some(Err(err));
        }
        Some(Ok(map.remove(key).unwrap()))
    }
}

/// A folder in the document tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FolderRecord {
    pub id: FolderId,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<FolderId>,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
}

/// A document filed in a folder.
///
/// Documents are created by the engine itself when an application
/// reaches final approval, carrying the approved form data as
/// metadata. There is no upload path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub id: DocumentId,
    pub name: String,
    pub folder_id: FolderId,
    /// The source application and its approved field values.
    pub metadata: serde_json::Value,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
}

/// Everything handlers share, cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub forms: Store<FormId, ApprovalForm>,
    pub routes: Store<RouteId, ApprovalRoute>,
    pub applications: Store<ApplicationId, Application>,
    pub folders: Store<FolderId, FolderRecord>,
    pub documents: Store<DocumentId, DocumentRecord>,
    /// Write-through persistence target; `None` runs in-memory only.
    pub db: Option<PgPool>,
}

impl AppState {
    pub fn new(db: Option<PgPool>) -> Self {
        Self {
            forms: Store::default(),
            routes: Store::default(),
            applications: Store::default(),
            folders: Store::default(),
            documents: Store::default(),
            db,
        }
    }

    /// In-memory state with no database, for tests.
    pub fn in_memory() -> Self {
        Self::new(None)
    }

    /// Load every persisted aggregate into the in-memory stores.
    ///
    /// No-op when no database is configured. Rows that fail to decode
    /// are skipped with a warning inside the loaders rather than
    /// aborting startup.
    pub async fn hydrate_from_db(&self) -> Result<(), sqlx::Error> {
        let Some(pool) = &self.db else {
            return Ok(());
        };

        for form in crate::db::forms::load_all(pool).await? {
            self.forms.insert(form.id, form);
        }
        for route in crate::db::routes::load_all(pool).await? {
            self.routes.insert(route.id, route);
        }
        for app in crate::db::applications::load_all(pool).await? {
            self.applications.insert(app.id, app);
        }
        for folder in crate::db::folders::load_all(pool).await? {
            self.folders.insert(folder.id, folder);
        }
        for doc in crate::db::documents::load_all(pool).await? {
            self.documents.insert(doc.id, doc);
        }

        tracing::info!(
            forms = self.forms.len(),
            routes = self.routes.len(),
            applications = self.applications.len(),
            folders = self.folders.len(),
            documents = self.documents.len(),
            "Hydrated in-memory stores from database"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_insert_get_remove() {
        let store: Store<u32, String> = Store::default();
        store.insert(1, "one".to_string());
        assert_eq!(store.get(&1).as_deref(), Some("one"));
        assert_eq!(store.len(), 1);
        assert_eq!(store.remove(&1).as_deref(), Some("one"));
        assert!(store.is_empty());
    }

    #[test]
    fn test_try_update_missing_key() {
        let store: Store<u32, String> = Store::default();
        let result = store.try_update(&7, |_v| Ok::<(), ()>(()));
        assert!(result.is_none());
    }

    #[test]
    fn test_try_update_applies_mutation() {
        let store: Store<u32, u64> = Store::default();
        store.insert(1, 10);
        let (updated, out) = store
            .try_update(&1, |v| {
                *v += 5;
                Ok::<u64, ()>(*v)
            })
            .unwrap()
            .unwrap();
        assert_eq!(updated, 15);
        assert_eq!(out, 15);
        assert_eq!(store.get(&1), Some(15));
    }

    #[test]
    fn test_try_remove_guard_blocks_removal() {
        let store: Store<u32, u64> = Store::default();
        store.insert(1, 10);
        let result = store.try_remove(&1, |_v| Err::<(), &str>("locked")).unwrap();
        assert!(result.is_err());
        assert!(store.contains(&1));

        let removed = store.try_remove(&1, |_v| Ok::<(), &str>(())).unwrap();
        assert_eq!(removed.unwrap(), 10);
        assert!(!store.contains(&1));
    }

    #[test]
    fn test_racing_approvals_have_single_winner() {
        use csign_core::UserId;
        use csign_engine::{ApprovalStatus, RouteStep};
        use std::sync::Barrier;

        let alice = UserId::new();
        let applicant = UserId::new();
        let form = ApprovalForm::new("Expense".to_string(), None, vec![], UserId::new(), None)
            .unwrap();
        let route = ApprovalRoute::new(
            "One step".to_string(),
            None,
            vec![RouteStep {
                step_number: 1,
                approver_id: alice,
            }],
            UserId::new(),
        )
        .unwrap();
        let mut app = Application::draft(&form, &route, applicant, serde_json::json!({}));
        app.submit(applicant, &form, &route).unwrap();
        let id = app.id;

        let store: Store<ApplicationId, Application> = Store::default();
        store.insert(id, app);

        // Two simultaneous approvals of the same step: the write lock
        // serializes them, and the loser sees the already-terminal
        // state inside its own critical section.
        let barrier = Arc::new(Barrier::new(2));
        let handles: Vec<_> = (0..2)
            .map(|_| {
                let store = store.clone();
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || {
                    barrier.wait();
                    store.try_update(&id, |a| a.approve(alice, None)).unwrap()
                })
            })
            .collect();

        let outcomes: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let wins = outcomes.iter().filter(|r| r.is_ok()).count();
        assert_eq!(wins, 1, "exactly one racing approval may commit");

        let settled = store.get(&id).unwrap();
        assert_eq!(settled.status, ApprovalStatus::Approved);
        assert_eq!(settled.history.len(), 1);
    }

    #[test]
    fn test_list_where_filters() {
        let store: Store<u32, u64> = Store::default();
        for i in 0..10 {
            store.insert(i, u64::from(i));
        }
        let evens = store.list_where(|v| v % 2 == 0);
        assert_eq!(evens.len(), 5);
    }
}
