//! Per-character mutual exclusion.
//!
//! Sync and generation for the same character must not interleave, but
//! distinct characters proceed independently. Entries are held weakly and
//! pruned once no guard or waiter references them.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, Weak};

use nm_core::types::DbId;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Keyed lock table, one async mutex per character id.
#[derive(Debug, Default)]
pub struct CharacterLocks {
    entries: Mutex<HashMap<DbId, Weak<AsyncMutex<()>>>>,
}

/// Held for the duration of a sync or generation run.
#[derive(Debug)]
pub struct CharacterGuard {
    _guard: OwnedMutexGuard<()>,
}

impl CharacterLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `character_id`.
    pub async fn acquire(&self, character_id: DbId) -> CharacterGuard {
        let lock = {
            let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
            entries.retain(|_, weak| weak.strong_count() > 0);
            match entries.get(&character_id).and_then(Weak::upgrade) {
                Some(lock) => lock,
                None => {
                    let lock = Arc::new(AsyncMutex::new(()));
                    entries.insert(character_id, Arc::downgrade(&lock));
                    lock
                }
            }
        };
        CharacterGuard {
            _guard: lock.lock_owned().await,
        }
    }

    /// Number of characters with a live lock entry.
    pub fn tracked(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }
}
