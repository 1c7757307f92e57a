//! In-memory session store.
//!
//! The only shared mutable resource in the core. The outer map is guarded by
//! an `RwLock`; each session carries its own `Mutex` so two concurrent
//! requests against the *same* session serialize for the whole pipeline run,
//! while unrelated sessions proceed independently.
//!
//! Sessions live until an explicit `remove` — there is no TTL, so an
//! abandoned session stays resident for the life of the process.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};

use crate::models::Session;

type SessionHandle = Arc<Mutex<Session>>;

#[derive(Clone, Default)]
pub struct SessionStore {
    inner: Arc<RwLock<HashMap<String, SessionHandle>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new session for a user and return its id.
    pub async fn create(&self, user_id: &str) -> String {
        let session_id = uuid::Uuid::new_v4().to_string();
        let session = Session::new(session_id.clone(), user_id.to_string());
        self.inner
            .write()
            .await
            .insert(session_id.clone(), Arc::new(Mutex::new(session)));
        tracing::info!("New session started for user {}: {}", user_id, session_id);
        session_id
    }

    /// Fetch the handle for a session; callers lock it for the duration of
    /// their pipeline run.
    pub async fn get(&self, session_id: &str) -> Option<SessionHandle> {
        self.inner.read().await.get(session_id).cloned()
    }

    /// Drop a session. Returns false when the id was unknown.
    pub async fn remove(&self, session_id: &str) -> bool {
        let removed = self.inner.write().await.remove(session_id).is_some();
        if removed {
            tracing::info!("[{}] Session ended.", session_id);
        }
        removed
    }

    /// Active session ids (diagnostics).
    pub async fn list_ids(&self) -> Vec<String> {
        self.inner.read().await.keys().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}
