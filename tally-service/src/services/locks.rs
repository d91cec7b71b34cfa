//! Per-election mutual exclusion for tallying session transitions.
//!
//! Spec §5 requires every state transition of a single `TallyingSession` to
//! be totally ordered; this is enforced by holding an exclusive lock "on
//! the session row" for the duration of the transition. Rather than a
//! single global lock (which would serialize unrelated elections), each
//! election gets its own `tokio::sync::Mutex`, looked up and lazily
//! inserted behind a `parking_lot::Mutex<HashMap<..>>` — the same shape as
//! the teacher's `OpenSessions` registry of single-use session ids.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tally_types::ElectionId;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Registry of per-election exclusive locks.
#[derive(Default, Clone)]
pub(crate) struct ElectionLocks(Arc<Mutex<HashMap<ElectionId, Arc<AsyncMutex<()>>>>>);

/// Holds the per-election lock for the duration of a state transition.
/// Dropping it releases the lock for the next caller.
#[must_use]
pub(crate) struct ElectionLockGuard(OwnedMutexGuard<()>);

impl ElectionLocks {
    /// Acquires the exclusive lock for `election_id`, creating its entry on
    /// first use. Holding the returned guard serializes every other call
    /// that locks the same election; unrelated elections are unaffected.
    pub(crate) async fn lock(&self, election_id: ElectionId) -> ElectionLockGuard {
        let mutex = {
            let mut registry = self.0.lock();
            registry
                .entry(election_id)
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };
        ElectionLockGuard(mutex.lock_owned().await)
    }
}
