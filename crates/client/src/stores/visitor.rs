//! Visitor store: the current visitor snapshot plus connectivity.
//!
//! Connection events are applied serially. Observers are invoked in-line, in
//! registration order, after every change to either half of the snapshot.
//! Changes from different threads are published one at a time, so observers
//! see them in the same order the store applied them.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde_json::Value;
use yourinfo_shared::{validate_visitor, VisitorInfo};

use crate::ws::ConnectionEvent;

/// What the presentation layer reads
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VisitorSnapshot {
    pub connected: bool,
    pub current_visitor: Option<Arc<VisitorInfo>>,
    /// When `current_visitor` was accepted
    pub updated_at: Option<DateTime<Utc>>,
}

impl VisitorSnapshot {
    /// Nothing to show yet: not connected and no visitor received.
    pub fn is_loading(&self) -> bool {
        !self.connected && self.current_visitor.is_none()
    }
}

/// Handle returned by [`VisitorStore::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Observer = Arc<dyn Fn(&VisitorSnapshot) + Send + Sync>;

#[derive(Default)]
pub struct VisitorStore {
    /// Held across apply and notify
    publishing: Mutex<()>,
    snapshot: Mutex<VisitorSnapshot>,
    observers: Mutex<Vec<(SubscriptionId, Observer)>>,
    next_id: AtomicU64,
}

impl VisitorStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> VisitorSnapshot {
        self.snapshot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_connected(&self) -> bool {
        self.snapshot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .connected
    }

    pub fn current_visitor(&self) -> Option<Arc<VisitorInfo>> {
        self.snapshot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .current_visitor
            .clone()
    }

    /// Register an observer. It is not called with the current value; use
    /// [`VisitorStore::snapshot`] for the initial read.
    ///
    /// Observers may read the store and (un)subscribe, but must not call
    /// `on_*`, `handle_event` or `reset` from inside the callback.
    pub fn subscribe(
        &self,
        observer: impl Fn(&VisitorSnapshot) + Send + Sync + 'static,
    ) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, Arc::new(observer)));
        id
    }

    /// Returns false if `id` was not registered
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut observers = self.observers.lock().unwrap_or_else(PoisonError::into_inner);
        let before = observers.len();
        observers.retain(|(existing, _)| *existing != id);
        observers.len() != before
    }

    pub fn subscriber_count(&self) -> usize {
        self.observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Apply one connection event
    pub fn handle_event(&self, event: ConnectionEvent) {
        match event {
            ConnectionEvent::Opened => self.on_opened(),
            ConnectionEvent::Closed { .. } => self.on_closed(),
            ConnectionEvent::Message(payload) => self.on_message(payload),
            ConnectionEvent::Error(reason) => {
                crate::log_debug!("Transport error reported to store: {}", reason);
            }
        }
    }

    pub fn on_opened(&self) {
        self.set_connected(true);
    }

    pub fn on_closed(&self) {
        self.set_connected(false);
    }

    /// Validate `payload` and make it the current visitor.
    ///
    /// Invalid payloads are logged and dropped without notifying anyone.
    pub fn on_message(&self, payload: Value) {
        let visitor = match validate_visitor(payload) {
            Ok(visitor) => visitor,
            Err(e) => {
                crate::log_warn!("Dropping telemetry message: {}", e);
                return;
            }
        };

        crate::log_debug!(
            "Accepted visitor {}",
            visitor.fingerprint_id().or(visitor.ip()).unwrap_or("<anonymous>")
        );

        self.publish(|snapshot| {
            snapshot.current_visitor = Some(Arc::new(visitor));
            snapshot.updated_at = Some(Utc::now());
            true
        });
    }

    /// Forget the current visitor. Connectivity is left alone.
    pub fn reset(&self) {
        self.publish(|snapshot| {
            let had_visitor = snapshot.current_visitor.take().is_some();
            snapshot.updated_at = None;
            had_visitor
        });
    }

    fn set_connected(&self, connected: bool) {
        self.publish(|snapshot| {
            let changed = snapshot.connected != connected;
            snapshot.connected = connected;
            changed
        });
    }

    /// Apply a change and notify observers if `apply` reports one
    fn publish(&self, apply: impl FnOnce(&mut VisitorSnapshot) -> bool) {
        let _publishing = self.publishing.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(snapshot) = self.update(apply) {
            self.notify(&snapshot);
        }
    }

    /// Mutate under the snapshot lock; returns a copy if `apply` reports a change
    fn update(&self, apply: impl FnOnce(&mut VisitorSnapshot) -> bool) -> Option<VisitorSnapshot> {
        let mut snapshot = self.snapshot.lock().unwrap_or_else(PoisonError::into_inner);
        apply(&mut snapshot).then(|| snapshot.clone())
    }

    fn notify(&self, snapshot: &VisitorSnapshot) {
        // Observers may (un)subscribe from inside the callback
        let observers: Vec<(SubscriptionId, Observer)> = self
            .observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        for (id, observer) in observers {
            if catch_unwind(AssertUnwindSafe(|| observer(snapshot))).is_err() {
                crate::log_error!("Visitor observer {:?} panicked", id);
            }
        }
    }
}
