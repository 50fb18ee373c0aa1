//! Per-identifier FIFO serialisation of sync operations.
//!
//! Each id maps to its own async mutex. Operations on the same id wait in
//! the order they first asked; operations on different ids never wait on
//! each other. A slot is dropped from the map once nobody holds or waits on it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type Slots = Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>;

#[derive(Clone, Default)]
pub struct IdQueue {
    slots: Slots,
}

/// Exclusive right to operate on one id; released on drop
pub struct IdTicket {
    id: String,
    guard: Option<OwnedMutexGuard<()>>,
    slots: Slots,
}

impl IdQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for every earlier ticket on `id` to be released
    pub async fn acquire(&self, id: &str) -> IdTicket {
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            slots.entry(id.to_string()).or_default().clone()
        };
        let guard = slot.lock_owned().await;
        IdTicket {
            id: id.to_string(),
            guard: Some(guard),
            slots: self.slots.clone(),
        }
    }

    /// Number of ids with a ticket held or awaited
    pub fn active(&self) -> usize {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

impl IdTicket {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Release the id now. Returns true if nobody else holds or waits on it.
    pub fn release(mut self) -> bool {
        self.release_slot()
    }

    fn release_slot(&mut self) -> bool {
        if self.guard.take().is_none() {
            return false;
        }
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        let idle = slots
            .get(&self.id)
            .is_some_and(|slot| Arc::strong_count(slot) == 1);
        if idle {
            slots.remove(&self.id);
        }
        idle
    }
}

impl Drop for IdTicket {
    fn drop(&mut self) {
        self.release_slot();
    }
}
