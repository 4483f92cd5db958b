//! Single-slot, versioned home of the latest [`WeatherSnapshot`].
//!
//! Every fetch is tagged with a request id taken from a monotonic counter.
//! A result may only be applied while its id is still the latest one issued,
//! so a slow fetch can never overwrite the result of a newer one. Readers get
//! whole `Arc` snapshots and are told about replacements through a `watch`
//! channel carrying the slot generation.

use std::sync::{
    Arc, PoisonError, RwLock,
    atomic::{AtomicU64, Ordering},
};

use tokio::sync::watch;

use crate::model::WeatherSnapshot;

pub type RequestId = u64;

#[derive(Debug, Default)]
struct Slot {
    snapshot: Option<Arc<WeatherSnapshot>>,
    generation: u64,
    applied: RequestId,
}

#[derive(Debug)]
pub struct SnapshotStore {
    slot: RwLock<Slot>,
    issued: AtomicU64,
    changes: watch::Sender<u64>,
}

impl Default for SnapshotStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotStore {
    pub fn new() -> Self {
        let (changes, _) = watch::channel(0);
        Self {
            slot: RwLock::new(Slot::default()),
            issued: AtomicU64::new(0),
            changes,
        }
    }

    /// Issue the id for a new fetch; it supersedes every earlier id.
    pub fn begin_request(&self) -> RequestId {
        self.issued.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Make every outstanding request stale without starting a new one.
    pub fn invalidate(&self) {
        self.issued.fetch_add(1, Ordering::SeqCst);
    }

    pub fn is_latest(&self, id: RequestId) -> bool {
        self.issued.load(Ordering::SeqCst) == id
    }

    /// Replace the snapshot if `id` is still the latest issued request.
    ///
    /// Returns `false` (and leaves the slot untouched) for stale results.
    pub fn apply(&self, id: RequestId, snapshot: WeatherSnapshot) -> bool {
        let generation = {
            let mut slot = self.slot.write().unwrap_or_else(PoisonError::into_inner);
            if !self.is_latest(id) || id <= slot.applied {
                return false;
            }
            slot.snapshot = Some(Arc::new(snapshot));
            slot.applied = id;
            slot.generation += 1;
            slot.generation
        };

        self.changes.send_replace(generation);
        true
    }

    pub fn current(&self) -> Option<Arc<WeatherSnapshot>> {
        self.slot.read().unwrap_or_else(PoisonError::into_inner).snapshot.clone()
    }

    /// Number of snapshots applied so far.
    pub fn generation(&self) -> u64 {
        self.slot.read().unwrap_or_else(PoisonError::into_inner).generation
    }

    /// Receiver notified with the new generation on every replacement.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.changes.subscribe()
    }
}
