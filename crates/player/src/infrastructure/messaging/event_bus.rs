//! Event Bus for publishing session events to collaborators.
//!
//! Subscribers register callbacks per [`EventKind`] (or for every event) and
//! are invoked synchronously, in subscription order, when an event is emitted.
//! A panicking subscriber is caught and logged; the remaining subscribers still
//! receive the event.

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::ports::outbound::{EventKind, SessionError, SessionEvent};

type Subscriber = Arc<dyn Fn(&SessionEvent) + Send + Sync + 'static>;

/// Handle returned by [`EventBus::on`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Entry {
    id: SubscriptionId,
    /// `None` receives every event
    filter: Option<EventKind>,
    callback: Subscriber,
}

#[derive(Default)]
struct Subscriptions {
    next_id: u64,
    entries: Vec<Entry>,
}

/// Event bus for session events.
///
/// Cloning shares the subscription table. The table is snapshotted before each
/// emit, so callbacks may subscribe or unsubscribe without deadlocking; such
/// changes take effect from the next emit.
#[derive(Clone, Default)]
pub struct EventBus {
    subscriptions: Arc<Mutex<Subscriptions>>,
}

impl EventBus {
    /// Create a new EventBus with no subscribers.
    pub fn new() -> Self {
        Self::default()
    }

    fn table(&self) -> MutexGuard<'_, Subscriptions> {
        self.subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn insert(&self, filter: Option<EventKind>, callback: Subscriber) -> SubscriptionId {
        let mut table = self.table();
        table.next_id += 1;
        let id = SubscriptionId(table.next_id);
        table.entries.push(Entry {
            id,
            filter,
            callback,
        });
        id
    }

    /// Subscribe to one kind of event.
    pub fn on(
        &self,
        kind: EventKind,
        callback: impl Fn(&SessionEvent) + Send + Sync + 'static,
    ) -> SubscriptionId {
        self.insert(Some(kind), Arc::new(callback))
    }

    /// Subscribe to every event.
    pub fn on_any(
        &self,
        callback: impl Fn(&SessionEvent) + Send + Sync + 'static,
    ) -> SubscriptionId {
        self.insert(None, Arc::new(callback))
    }

    /// Remove a subscription.
    ///
    /// Returns false if the id was already removed.
    pub fn off(&self, id: SubscriptionId) -> bool {
        let mut table = self.table();
        let before = table.entries.len();
        table.entries.retain(|entry| entry.id != id);
        table.entries.len() != before
    }

    /// Dispatch an event to all matching subscribers.
    ///
    /// Returns the number of subscribers invoked, including ones that panicked.
    pub fn emit(&self, event: &SessionEvent) -> usize {
        let kind = event.kind();
        let targets: Vec<Subscriber> = self
            .table()
            .entries
            .iter()
            .filter(|entry| entry.filter.map_or(true, |filter| filter == kind))
            .map(|entry| Arc::clone(&entry.callback))
            .collect();

        for callback in &targets {
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| callback(event))) {
                let error = SessionError::Subscriber {
                    event: kind,
                    message: panic_message(payload.as_ref()),
                };
                tracing::error!(error = %error, "Error in event subscriber");
            }
        }

        targets.len()
    }

    /// Get the number of subscribers for `kind`, counting catch-all ones.
    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        self.table()
            .entries
            .iter()
            .filter(|entry| entry.filter.map_or(true, |filter| filter == kind))
            .count()
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
