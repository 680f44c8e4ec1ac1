//! Per-source tuner slot accounting.
//!
//! Each source id maps to the set of streams currently holding one of its
//! tuner slots. The whole map sits behind a single mutex that is held only
//! for the count check and the set mutation, never across I/O.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use parking_lot::Mutex;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use livetv_model::{TunerError, TunerSourceConfig};

/// Lifecycle of a held slot. Released leases are removed from the map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LeaseState {
    /// Slot granted, engine has not confirmed the stream yet.
    Granted,
    /// Engine opened the stream.
    Active,
}

#[derive(Debug)]
struct LeaseEntry {
    lease_id: u64,
    state: LeaseState,
    granted_at: Instant,
    last_seen: Instant,
    /// Shared with the lease; set when the reaper frees the slot.
    released: Arc<AtomicBool>,
    /// Shared with the lease; cancelled when the stream goes idle.
    expired: CancellationToken,
}

#[derive(Debug, Default)]
struct SourceSlots {
    /// Source id as configured, for reporting.
    display_id: String,
    streams: HashMap<String, LeaseEntry>,
}

#[derive(Debug, Default)]
struct AllocatorInner {
    /// Keyed by lowercased source id.
    sources: Mutex<HashMap<String, SourceSlots>>,
    next_lease_id: AtomicU64,
}

impl AllocatorInner {
    /// Remove the entry only if it still belongs to `lease_id`.
    fn remove(&self, source_key: &str, stream_id: &str, lease_id: u64) -> bool {
        let mut sources = self.sources.lock();
        let Some(slots) = sources.get_mut(source_key) else {
            return false;
        };

        let owned = slots
            .streams
            .get(stream_id)
            .is_some_and(|entry| entry.lease_id == lease_id);
        if owned {
            slots.streams.remove(stream_id);
        }
        if slots.streams.is_empty() {
            sources.remove(source_key);
        }
        owned
    }

    fn update<F>(&self, source_key: &str, stream_id: &str, lease_id: u64, f: F) -> bool
    where
        F: FnOnce(&mut LeaseEntry),
    {
        let mut sources = self.sources.lock();
        match sources
            .get_mut(source_key)
            .and_then(|slots| slots.streams.get_mut(stream_id))
            .filter(|entry| entry.lease_id == lease_id)
        {
            Some(entry) => {
                f(entry);
                true
            }
            None => false,
        }
    }
}

/// Point-in-time view of one held slot.
#[derive(Debug, Clone, Serialize)]
pub struct StreamUsage {
    pub stream_id: String,
    pub state: LeaseState,
    /// Seconds since the slot was granted.
    pub held_secs: u64,
}

/// Point-in-time view of one source's slots.
#[derive(Debug, Clone, Serialize)]
pub struct SourceUsage {
    pub source_id: String,
    pub streams: Vec<StreamUsage>,
}

/// Tracks tuner slots for every configured source.
///
/// Cloning is cheap; clones share the same accounting.
#[derive(Debug, Clone, Default)]
pub struct TunerAllocator {
    inner: Arc<AllocatorInner>,
}

impl TunerAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a source with `active` streams may start one more.
    pub fn admits(source: &TunerSourceConfig, active: usize) -> bool {
        source.is_unlimited() || active < source.tuner_count as usize
    }

    /// Grant a slot on `source` to `stream_id`, or reject with
    /// [`TunerError::Conflict`] when the tuner limit is reached.
    pub fn try_acquire(
        &self,
        source: &TunerSourceConfig,
        stream_id: &str,
    ) -> Result<TunerLease, TunerError> {
        let source_key = source.id.to_ascii_lowercase();
        let lease_id = self.inner.next_lease_id.fetch_add(1, Ordering::Relaxed);
        let released = Arc::new(AtomicBool::new(false));
        let expired = CancellationToken::new();

        {
            let mut sources = self.inner.sources.lock();
            let slots = sources.entry(source_key.clone()).or_insert_with(|| SourceSlots {
                display_id: source.id.clone(),
                streams: HashMap::new(),
            });

            if slots.streams.contains_key(stream_id) {
                return Err(TunerError::Conflict(format!(
                    "stream {} already holds a tuner on source {}",
                    stream_id, source.id
                )));
            }

            let active = slots.streams.len();
            if !Self::admits(source, active) {
                warn!(
                    "[TunerAllocator] Source {} at capacity ({}/{}), rejecting stream {}",
                    source.id, active, source.tuner_count, stream_id
                );
                return Err(TunerError::tuner_limit_reached());
            }

            let now = Instant::now();
            slots.streams.insert(
                stream_id.to_string(),
                LeaseEntry {
                    lease_id,
                    state: LeaseState::Granted,
                    granted_at: now,
                    last_seen: now,
                    released: Arc::clone(&released),
                    expired: expired.clone(),
                },
            );
            info!(
                "[TunerAllocator] Granted stream {} on source {} ({}/{})",
                stream_id,
                source.id,
                active + 1,
                if source.is_unlimited() {
                    "unlimited".to_string()
                } else {
                    source.tuner_count.to_string()
                }
            );
        }

        Ok(TunerLease {
            inner: Arc::clone(&self.inner),
            source_id: source.id.clone(),
            source_key,
            stream_id: stream_id.to_string(),
            lease_id,
            released,
            expired,
        })
    }

    /// Number of slots currently held on a source (case-insensitive id).
    pub fn active_count(&self, source_id: &str) -> usize {
        self.inner
            .sources
            .lock()
            .get(&source_id.to_ascii_lowercase())
            .map(|slots| slots.streams.len())
            .unwrap_or(0)
    }

    /// Total slots held across all sources.
    pub fn total_active(&self) -> usize {
        self.inner
            .sources
            .lock()
            .values()
            .map(|slots| slots.streams.len())
            .sum()
    }

    /// Usage of every source that currently holds a slot, sorted by id.
    pub fn snapshot(&self) -> Vec<SourceUsage> {
        let sources = self.inner.sources.lock();
        let mut usage: Vec<SourceUsage> = sources
            .values()
            .map(|slots| {
                let mut streams: Vec<StreamUsage> = slots
                    .streams
                    .iter()
                    .map(|(stream_id, entry)| StreamUsage {
                        stream_id: stream_id.clone(),
                        state: entry.state,
                        held_secs: entry.granted_at.elapsed().as_secs(),
                    })
                    .collect();
                streams.sort_by(|a, b| a.stream_id.cmp(&b.stream_id));
                SourceUsage {
                    source_id: slots.display_id.clone(),
                    streams,
                }
            })
            .collect();
        usage.sort_by(|a, b| a.source_id.cmp(&b.source_id));
        usage
    }

    /// Handle slots whose last heartbeat is older than `max_idle`.
    ///
    /// Idle `Granted` slots were never opened on the engine, so they are
    /// freed and their lease reports released. Idle `Active` slots keep
    /// counting against the tuner limit until their owner closes the engine
    /// stream; their lease's [`expired`](TunerLease::expired) token is
    /// cancelled to tell the owner to do so.
    ///
    /// Returns `(source_id, stream_id)` of each freed slot.
    pub fn reap_idle(&self, max_idle: Duration) -> Vec<(String, String)> {
        let mut reaped = Vec::new();
        let mut sources = self.inner.sources.lock();

        for slots in sources.values_mut() {
            let source_id = slots.display_id.clone();
            slots.streams.retain(|stream_id, entry| {
                if entry.last_seen.elapsed() <= max_idle {
                    return true;
                }
                match entry.state {
                    LeaseState::Granted => {
                        entry.released.store(true, Ordering::SeqCst);
                        entry.expired.cancel();
                        reaped.push((source_id.clone(), stream_id.clone()));
                        false
                    }
                    LeaseState::Active => {
                        if !entry.expired.is_cancelled() {
                            warn!(
                                "[TunerAllocator] Stream {} on source {} is idle, asking owner to close it",
                                stream_id, source_id
                            );
                            entry.expired.cancel();
                        }
                        true
                    }
                }
            });
        }
        sources.retain(|_, slots| !slots.streams.is_empty());

        for (source_id, stream_id) in &reaped {
            warn!(
                "[TunerAllocator] Reaped idle stream {} on source {}",
                stream_id, source_id
            );
        }
        reaped
    }
}

/// A held tuner slot.
///
/// Releasing is idempotent and may happen from any task; dropping the
/// lease releases it too.
#[derive(Debug)]
pub struct TunerLease {
    inner: Arc<AllocatorInner>,
    source_id: String,
    source_key: String,
    stream_id: String,
    lease_id: u64,
    released: Arc<AtomicBool>,
    expired: CancellationToken,
}

impl TunerLease {
    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    pub fn stream_id(&self) -> &str {
        &self.stream_id
    }

    /// Mark the slot active once the engine opened the stream.
    pub fn activate(&self) -> bool {
        self.inner
            .update(&self.source_key, &self.stream_id, self.lease_id, |entry| {
                entry.state = LeaseState::Active;
                entry.last_seen = Instant::now();
            })
    }

    /// Record consumer liveness. Returns false if the slot is gone.
    pub fn touch(&self) -> bool {
        self.inner
            .update(&self.source_key, &self.stream_id, self.lease_id, |entry| {
                entry.last_seen = Instant::now();
            })
    }

    /// Give the slot back. Returns true only for the call that freed it.
    pub fn release(&self) -> bool {
        if self.released.swap(true, Ordering::SeqCst) {
            return false;
        }

        let removed = self
            .inner
            .remove(&self.source_key, &self.stream_id, self.lease_id);
        if removed {
            info!(
                "[TunerAllocator] Released stream {} on source {}",
                self.stream_id, self.source_id
            );
        } else {
            debug!(
                "[TunerAllocator] Stream {} on source {} was already reaped",
                self.stream_id, self.source_id
            );
        }
        removed
    }

    /// True once the slot is gone, whether released here or reaped.
    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }

    /// Cancelled when the stream went idle, or when the slot was reaped.
    ///
    /// An opened stream keeps its slot until the owner closes it.
    pub fn expired(&self) -> CancellationToken {
        self.expired.clone()
    }
}

impl Drop for TunerLease {
    fn drop(&mut self) {
        self.release();
    }
}
