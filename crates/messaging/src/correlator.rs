//! Request/response correlation over asynchronous topics.
//!
//! A caller registers interest in a key, publishes its query, and waits. The
//! consumer of the response topic resolves the key when the answer arrives.
//! A key that nobody resolves before its deadline resolves to `false`.

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::time::Instant;

struct Pending {
    ticket: u64,
    tx: oneshot::Sender<bool>,
    deadline: Instant,
}

struct Table<K> {
    pending: HashMap<K, Pending>,
    closed: bool,
}

struct Inner<K> {
    table: Mutex<Table<K>>,
    next_ticket: AtomicU64,
}

/// Table of pending requests keyed by correlation key.
///
/// At most one registration exists per key; registering again for a key that
/// is still pending displaces the earlier registration, which resolves to
/// `false` at once. Every registration is removed by exactly one of: a
/// matching [`resolve`](Self::resolve), its own deadline, displacement,
/// dropping its [`PendingResponse`], or [`shutdown`](Self::shutdown).
pub struct Correlator<K> {
    inner: Arc<Inner<K>>,
}

impl<K> Clone for Correlator<K> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K> Default for Correlator<K>
where
    K: Eq + Hash + Clone + Debug + Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K> Correlator<K>
where
    K: Eq + Hash + Clone + Debug + Send + 'static,
{
    /// Creates an empty correlator.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                table: Mutex::new(Table {
                    pending: HashMap::new(),
                    closed: false,
                }),
                // Ticket 0 is reserved for registrations refused after shutdown.
                next_ticket: AtomicU64::new(1),
            }),
        }
    }

    fn table(&self) -> MutexGuard<'_, Table<K>> {
        self.inner
            .table
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers `key` and waits for its resolution.
    ///
    /// Returns the resolved value, or `false` once `timeout` elapses.
    pub async fn await_response(&self, key: K, timeout: Duration) -> bool {
        self.register(key, timeout).wait().await
    }

    /// Registers `key` without waiting yet.
    ///
    /// Use this to register before publishing the query, so a fast answer
    /// cannot arrive ahead of the registration.
    pub fn register(&self, key: K, timeout: Duration) -> PendingResponse<K> {
        let (tx, rx) = oneshot::channel();
        let deadline = Instant::now() + timeout;
        let mut table = self.table();

        if table.closed {
            let _ = tx.send(false);
            return PendingResponse {
                correlator: self.clone(),
                key,
                ticket: 0,
                deadline,
                rx,
            };
        }

        let ticket = self.inner.next_ticket.fetch_add(1, Ordering::Relaxed);
        let displaced = table
            .pending
            .insert(key.clone(), Pending { ticket, tx, deadline });

        if let Some(previous) = displaced {
            tracing::debug!(?key, "pending registration displaced");
            let _ = previous.tx.send(false);
        }

        PendingResponse {
            correlator: self.clone(),
            key,
            ticket,
            deadline,
            rx,
        }
    }

    /// Completes the pending registration for `key` with `exists`.
    ///
    /// Returns true if a waiter was completed; a late or duplicate resolution
    /// is dropped and returns false.
    pub fn resolve(&self, key: &K, exists: bool) -> bool {
        let mut table = self.table();

        match table.pending.remove(key) {
            Some(pending) => {
                let delivered = pending.tx.send(exists).is_ok();
                if delivered {
                    metrics::counter!("correlator_resolved_total").increment(1);
                }
                delivered
            }
            None => {
                tracing::debug!(?key, "no pending registration, resolution dropped");
                false
            }
        }
    }

    /// Number of registrations still waiting.
    pub fn pending_count(&self) -> usize {
        self.table().pending.len()
    }

    /// Returns true if `key` has a registration waiting.
    pub fn is_pending(&self, key: &K) -> bool {
        self.table().pending.contains_key(key)
    }

    /// The deadline of the registration waiting on `key`, if any.
    pub fn deadline(&self, key: &K) -> Option<Instant> {
        self.table().pending.get(key).map(|p| p.deadline)
    }

    /// Resolves every pending registration to `false` and refuses new ones.
    pub fn shutdown(&self) {
        let mut table = self.table();
        table.closed = true;

        let drained = table.pending.len();
        for (_, pending) in table.pending.drain() {
            let _ = pending.tx.send(false);
        }

        if drained > 0 {
            tracing::info!(drained, "correlator shut down with pending registrations");
        }
    }

    /// Removes the registration for `key` only if it is still `ticket`.
    fn remove_if_current(&self, key: &K, ticket: u64) -> bool {
        let mut table = self.table();
        match table.pending.get(key) {
            Some(pending) if pending.ticket == ticket => {
                table.pending.remove(key);
                true
            }
            _ => false,
        }
    }
}

/// A registration waiting for its resolution.
///
/// Dropping it without waiting removes the registration.
#[must_use = "a pending response resolves nothing unless awaited"]
pub struct PendingResponse<K>
where
    K: Eq + Hash + Clone + Debug + Send + 'static,
{
    correlator: Correlator<K>,
    key: K,
    ticket: u64,
    deadline: Instant,
    rx: oneshot::Receiver<bool>,
}

impl<K> PendingResponse<K>
where
    K: Eq + Hash + Clone + Debug + Send + 'static,
{
    /// The key this registration waits on.
    pub fn key(&self) -> &K {
        &self.key
    }

    /// Waits for the resolution, or `false` once the deadline passes.
    pub async fn wait(mut self) -> bool {
        match tokio::time::timeout_at(self.deadline, &mut self.rx).await {
            Ok(Ok(exists)) => exists,
            Ok(Err(_)) => false,
            Err(_) => {
                if self.correlator.remove_if_current(&self.key, self.ticket) {
                    metrics::counter!("correlator_timeouts_total").increment(1);
                    tracing::debug!(key = ?self.key, "pending registration timed out");
                    false
                } else {
                    // Resolved under the lock just as the deadline passed.
                    self.rx.try_recv().unwrap_or(false)
                }
            }
        }
    }
}

impl<K> Drop for PendingResponse<K>
where
    K: Eq + Hash + Clone + Debug + Send + 'static,
{
    fn drop(&mut self) {
        self.correlator.remove_if_current(&self.key, self.ticket);
    }
}
