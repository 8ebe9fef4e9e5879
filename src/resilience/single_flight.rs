//! Single-flight coordination.
//!
//! Concurrent callers asking for the same key share one in-flight operation.
//! The first caller starts it; everyone who arrives while it is pending awaits
//! the same shared future. Once it completes the slot is cleared, so the next
//! caller starts a fresh operation.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures_util::future::{BoxFuture, FutureExt, Shared};
use std::future::Future;
use std::hash::Hash;

use crate::observability::metrics;

/// Keyed registry of in-flight operations.
pub struct SingleFlight<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    name: &'static str,
    calls: DashMap<K, Shared<BoxFuture<'static, V>>>,
}

impl<K, V> SingleFlight<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone + Send + Sync + 'static,
{
    /// `name` labels log lines and metrics.
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            calls: DashMap::new(),
        }
    }

    /// Run `start()` unless an operation for `key` is already pending, in
    /// which case join it.
    ///
    /// The shared future keeps running if the caller that started it is
    /// dropped, as long as another waiter still polls it.
    pub async fn run<F, Fut>(&self, key: K, start: F) -> V
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = V> + Send + 'static,
    {
        let flight = match self.calls.entry(key.clone()) {
            Entry::Occupied(entry) => {
                tracing::debug!(flight = self.name, "Joining in-flight operation");
                metrics::record_single_flight_join(self.name);
                entry.get().clone()
            }
            Entry::Vacant(entry) => {
                let flight = start().boxed().shared();
                entry.insert(flight.clone());
                flight
            }
        };

        let result = flight.clone().await;
        self.calls
            .remove_if(&key, |_, pending| pending.ptr_eq(&flight));
        result
    }

    /// Number of operations currently in flight.
    pub fn in_flight(&self) -> usize {
        self.calls.len()
    }
}

impl<K, V> std::fmt::Debug for SingleFlight<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SingleFlight")
            .field("name", &self.name)
            .field("in_flight", &self.calls.len())
            .finish()
    }
}
