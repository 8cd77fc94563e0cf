//! Stateful sink of the RDS path.
//!
//! The adapter folds fragments into an [`RdsData`] cache and notifies a
//! single optional [`RdsEventSink`] when a field actually changes. The sink
//! runs on the caller's thread after the cache lock is released, so it may
//! call back into the receiver.
//!
//! Every clear bumps a generation counter. A change folded before a clear is
//! not delivered once the clear is visible. A clear racing the sink call
//! itself can still follow a notification for the old station.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use tracing::{debug, trace};

use super::{RdsData, RdsField, RdsFragment, RdsValue};
use crate::Result;

/// Receiver of RDS change notifications.
pub trait RdsEventSink: Send + Sync {
    fn on_change(&self, field: RdsField, value: &RdsValue);
}

impl<F> RdsEventSink for F
where
    F: Fn(RdsField, &RdsValue) + Send + Sync,
{
    fn on_change(&self, field: RdsField, value: &RdsValue) {
        self(field, value)
    }
}

#[derive(Default)]
struct State {
    data: RdsData,
    closed: bool,
    generation: u64,
}

/// A change folded into the cache and not yet notified
struct Change {
    field: RdsField,
    value: RdsValue,
    generation: u64,
}

/// RDS metadata cache with change detection.
#[derive(Default)]
pub struct RdsAdapter {
    state: Mutex<State>,
    sink: RwLock<Option<Arc<dyn RdsEventSink>>>,
}

impl RdsAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sink(sink: Arc<dyn RdsEventSink>) -> Self {
        let adapter = Self::new();
        adapter.subscribe(Some(sink));
        adapter
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the event sink; `None` removes it.
    pub fn subscribe(&self, sink: Option<Arc<dyn RdsEventSink>>) {
        *self.sink.write().unwrap_or_else(PoisonError::into_inner) = sink;
    }

    /// Fold one fragment into the cache.
    ///
    /// Returns the changed field, if any. An unknown type code is an error
    /// and leaves the cache as it was. Once the adapter is shut down,
    /// fragments are dropped.
    pub fn handle(&self, fragment: &RdsFragment) -> Result<Option<RdsField>> {
        let Some(change) = self.fold(fragment)? else {
            return Ok(None);
        };
        Ok(self.notify(change))
    }

    fn fold(&self, fragment: &RdsFragment) -> Result<Option<Change>> {
        let mut state = self.lock();
        if state.closed {
            trace!(code = fragment.code, "RDS fragment dropped after shutdown");
            return Ok(None);
        }
        let Some(field) = state.data.apply(fragment)? else {
            return Ok(None);
        };
        Ok(state.data.get(field).map(|value| Change {
            field,
            value: value.clone(),
            generation: state.generation,
        }))
    }

    fn notify(&self, change: Change) -> Option<RdsField> {
        let Change {
            field,
            value,
            generation,
        } = change;
        if self.lock().generation != generation {
            trace!(field = %field, "stale RDS change dropped after clear");
            return None;
        }

        debug!(field = %field, value = %value, "RDS data changed");
        let sink = self
            .sink
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(sink) = sink {
            sink.on_change(field, &value);
        }
        Some(field)
    }

    /// Wipe the cache without notifications.
    pub fn clear(&self) {
        let mut state = self.lock();
        state.data.clear();
        state.generation += 1;
    }

    /// Run `f` under the cache lock and wipe the cache if it succeeds.
    ///
    /// No fragment can be folded between the two, so a reader never sees
    /// data from before `f` once it returned.
    pub fn clear_with<T, E>(
        &self,
        f: impl FnOnce() -> std::result::Result<T, E>,
    ) -> std::result::Result<T, E> {
        let mut state = self.lock();
        let result = f()?;
        state.data.clear();
        state.generation += 1;
        Ok(result)
    }

    /// Copy of the current cache
    pub fn snapshot(&self) -> RdsData {
        self.lock().data.clone()
    }

    /// Stop accepting fragments.
    pub fn shutdown(&self) {
        self.lock().closed = true;
    }

    pub fn is_shut_down(&self) -> bool {
        self.lock().closed
    }
}
