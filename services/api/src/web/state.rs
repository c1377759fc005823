//! services/api/src/web/state.rs
//!
//! Defines the application's shared state and the per-session lock registry.

use crate::config::Config;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tutor_core::ports::{ChapterStore, CompletionGateway, ScoreLedger, SessionStore};
use uuid::Uuid;

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<dyn SessionStore>,
    pub ledger: Arc<dyn ScoreLedger>,
    pub chapters: Arc<dyn ChapterStore>,
    pub gateway: Arc<dyn CompletionGateway>,
    pub config: Arc<Config>,
    pub session_locks: Arc<SessionLocks>,
}

//=========================================================================================
// SessionLocks (Per-Session Turn Serialization)
//=========================================================================================

/// A registry of async mutexes keyed by `(user_id, chapter_id)`.
///
/// A turn holds its session's lock from load to persist, so two concurrent
/// turns for the same session cannot interleave their read-modify-write and
/// silently lose an `answered_questions` update. Turns for different sessions
/// proceed independently.
#[derive(Default)]
pub struct SessionLocks {
    inner: Mutex<HashMap<(Uuid, Option<Uuid>), Arc<tokio::sync::Mutex<()>>>>,
}

impl SessionLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the lock for one `(user_id, chapter_id)` pair, creating it on
    /// first use. The caller awaits `.lock()` on the returned mutex for the
    /// duration of the turn.
    ///
    /// Entries nobody holds anymore (registry is the sole `Arc` owner) are
    /// evicted on the way in, so the registry stays proportional to the
    /// number of in-flight turns rather than growing for the process
    /// lifetime.
    pub fn lock_for(
        &self,
        user_id: Uuid,
        chapter_id: Option<Uuid>,
    ) -> Arc<tokio::sync::Mutex<()>> {
        let mut map = self.inner.lock().expect("session lock registry poisoned");
        map.retain(|_, lock| Arc::strong_count(lock) > 1);
        map.entry((user_id, chapter_id))
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_key_returns_the_same_lock() {
        let locks = SessionLocks::new();
        let user = Uuid::new_v4();
        let chapter = Some(Uuid::new_v4());

        let a = locks.lock_for(user, chapter);
        let b = locks.lock_for(user, chapter);
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn different_keys_return_independent_locks() {
        let locks = SessionLocks::new();
        let user = Uuid::new_v4();

        let a = locks.lock_for(user, Some(Uuid::new_v4()));
        let b = locks.lock_for(user, Some(Uuid::new_v4()));
        let c = locks.lock_for(user, None);
        assert!(!Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
    }

    #[test]
    fn released_locks_are_evicted_from_the_registry() {
        let locks = SessionLocks::new();
        let user = Uuid::new_v4();
        let old_key = (user, Some(Uuid::new_v4()));

        drop(locks.lock_for(old_key.0, old_key.1));
        // The next acquisition sweeps out entries nobody holds.
        let _held = locks.lock_for(user, None);

        let map = locks.inner.lock().unwrap();
        assert!(!map.contains_key(&old_key));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn held_locks_survive_the_eviction_sweep() {
        let locks = SessionLocks::new();
        let user = Uuid::new_v4();
        let chapter = Some(Uuid::new_v4());

        let held = locks.lock_for(user, chapter);
        let again = locks.lock_for(user, chapter);
        assert!(Arc::ptr_eq(&held, &again));

        let _other = locks.lock_for(user, None);
        assert!(locks.inner.lock().unwrap().contains_key(&(user, chapter)));
    }
}
