use std::sync::Arc;
use std::time::Instant;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::debug;

use crate::error::{ClaimError, Result};

/// Rejects a second dispatch of the same action on the same record while the
/// first one is still awaiting the backend. Clones share the same table.
#[derive(Debug, Clone, Default)]
pub struct InFlightGuard {
    pending: Arc<DashMap<String, Instant>>,
}

/// Held for the duration of one dispatch; releases the slot on drop.
#[derive(Debug)]
pub struct InFlightPermit {
    pending: Arc<DashMap<String, Instant>>,
    key: String,
}

impl InFlightGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn acquire(&self, action: &str, record_id: &str) -> Result<InFlightPermit> {
        let key = format!("{}:{}", action, record_id);
        match self.pending.entry(key.clone()) {
            Entry::Occupied(started) => {
                debug!(%key, elapsed_ms = started.get().elapsed().as_millis() as u64, "Duplicate dispatch rejected");
                Err(ClaimError::InFlight(action.to_string()))
            }
            Entry::Vacant(slot) => {
                slot.insert(Instant::now());
                Ok(InFlightPermit { pending: Arc::clone(&self.pending), key })
            }
        }
    }

    pub fn is_pending(&self, action: &str, record_id: &str) -> bool {
        self.pending.contains_key(&format!("{}:{}", action, record_id))
    }
}

impl Drop for InFlightPermit {
    fn drop(&mut self) {
        self.pending.remove(&self.key);
    }
}
