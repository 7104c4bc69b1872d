//! Pending-transaction table and transaction ids.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::oneshot;

use crate::errors::ChannelError;

/// Largest transaction id before wrapping back to 1 (`2^53 - 1`, the
/// largest integer every JSON peer represents exactly).
pub const MAX_TRANSACTION_ID: u64 = (1 << 53) - 1;

/// Monotonic transaction id source.
#[derive(Debug)]
pub struct TransactionIds {
    next: AtomicU64,
}

impl TransactionIds {
    /// Ids starting at 1.
    pub fn new() -> Self {
        Self::starting_at(1)
    }

    /// Ids starting at `first` (clamped into `1..=MAX_TRANSACTION_ID`).
    pub fn starting_at(first: u64) -> Self {
        Self {
            next: AtomicU64::new(first.clamp(1, MAX_TRANSACTION_ID)),
        }
    }

    /// Take the next id.
    pub fn next_id(&self) -> u64 {
        let advance = |id: u64| Some(if id >= MAX_TRANSACTION_ID { 1 } else { id + 1 });
        match self.next.fetch_update(Ordering::Relaxed, Ordering::Relaxed, advance) {
            Ok(id) | Err(id) => id,
        }
    }
}

impl Default for TransactionIds {
    fn default() -> Self {
        Self::new()
    }
}

type Reply = oneshot::Sender<Result<Value, ChannelError>>;

struct Pending {
    reply: Reply,
    stale: bool,
}

/// Requests awaiting a response, keyed by transaction id.
#[derive(Default)]
pub struct PendingTable {
    entries: Mutex<HashMap<u64, Pending>>,
}

impl PendingTable {
    /// Empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Track `id`; the receiver settles when the response arrives.
    pub fn insert(&self, id: u64) -> oneshot::Receiver<Result<Value, ChannelError>> {
        let (reply, rx) = oneshot::channel();
        let _ = self.entries.lock().insert(id, Pending { reply, stale: false });
        rx
    }

    /// Stop tracking `id` without settling it.
    pub fn remove(&self, id: u64) {
        let _ = self.entries.lock().remove(&id);
    }

    /// Settle `id`. Returns `false` if no such transaction is pending.
    pub fn settle(&self, id: u64, result: Result<Value, ChannelError>) -> bool {
        let Some(pending) = self.entries.lock().remove(&id) else {
            return false;
        };
        // caller may have stopped waiting
        let _ = pending.reply.send(result);
        true
    }

    /// One liveness pass: evict and reject entries already marked stale,
    /// mark the rest. Returns the evicted ids.
    pub fn sweep(&self) -> Vec<u64> {
        let evicted: Vec<(u64, Reply)> = {
            let mut entries = self.entries.lock();
            let stale_ids: Vec<u64> = entries
                .iter()
                .filter(|(_, p)| p.stale)
                .map(|(id, _)| *id)
                .collect();
            for pending in entries.values_mut() {
                pending.stale = true;
            }
            stale_ids
                .into_iter()
                .filter_map(|id| entries.remove(&id).map(|p| (id, p.reply)))
                .collect()
        };
        evicted
            .into_iter()
            .map(|(id, reply)| {
                let _ = reply.send(Err(ChannelError::Stale { id }));
                id
            })
            .collect()
    }

    /// Reject every pending transaction with [`ChannelError::Disconnected`].
    pub fn fail_all(&self) -> usize {
        let drained: Vec<Pending> = self.entries.lock().drain().map(|(_, p)| p).collect();
        let count = drained.len();
        for pending in drained {
            let _ = pending.reply.send(Err(ChannelError::Disconnected));
        }
        count
    }

    /// Number of pending transactions.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
