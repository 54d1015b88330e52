//! Per-(project, trade) serialization.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use uuid::Uuid;

type Key = (Uuid, String);
type Slots = Arc<Mutex<HashMap<Key, Arc<AsyncMutex<()>>>>>;

/// One async mutex per (project, trade).
///
/// Operations on the same key are serialized; different trades of the same
/// project proceed concurrently. Never hold a guard across an oracle call.
/// A key's slot is dropped once no guard holds it and nobody waits on it.
#[derive(Clone, Default)]
pub struct KeyedLocks {
    inner: Slots,
}

/// Held lock on one (project, trade).
pub struct KeyGuard {
    guard: Option<OwnedMutexGuard<()>>,
    slots: Slots,
    key: Key,
}

impl Drop for KeyGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        // Waiters clone the slot under this map lock, so a count of one
        // means only the map still refers to it.
        let mut map = self.slots.lock();
        if map
            .get(&self.key)
            .is_some_and(|slot| Arc::strong_count(slot) == 1)
        {
            map.remove(&self.key);
        }
    }
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, project_id: Uuid, trade: &str) -> KeyGuard {
        let key = (project_id, trade.to_string());
        let slot = {
            let mut map = self.inner.lock();
            map.entry(key.clone())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };
        KeyGuard {
            guard: Some(slot.lock_owned().await),
            slots: self.inner.clone(),
            key,
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.inner.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn same_key_is_serialized() {
        let locks = KeyedLocks::new();
        let project = Uuid::new_v4();
        let guard = locks.lock(project, "SAN").await;

        let contender = {
            let locks = locks.clone();
            tokio::spawn(async move { locks.lock(project, "SAN").await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        drop(guard);
        let second = contender.await.unwrap();
        assert_eq!(locks.len(), 1);
        drop(second);
        assert_eq!(locks.len(), 0);
    }

    #[tokio::test]
    async fn different_trades_do_not_block() {
        let locks = KeyedLocks::new();
        let project = Uuid::new_v4();
        let _san = locks.lock(project, "SAN").await;
        let elekt = tokio::time::timeout(Duration::from_millis(50), locks.lock(project, "ELEKT")).await;
        assert!(elekt.is_ok());
        assert_eq!(locks.len(), 2);
    }

    #[tokio::test]
    async fn slots_are_released_after_use() {
        let locks = KeyedLocks::new();
        for _ in 0..50 {
            let project = Uuid::new_v4();
            let san = locks.lock(project, "SAN").await;
            let fli = locks.lock(project, "FLI").await;
            drop(san);
            drop(fli);
        }
        assert_eq!(locks.len(), 0);
    }
}
