//! Tracker Events
//!
//! A plain publish/subscribe channel that runs next to dependency
//! notification. Reactive readers are woken through dependency handles;
//! explicit listeners registered with [`Tracker::on`](super::Tracker::on)
//! receive a [`TrackerEvent`] for the same trigger call. Neither channel
//! waits on the other.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use parking_lot::RwLock;

use super::key::ItemId;
use crate::error::CallbackError;

/// Something a trigger call announced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackerEvent {
    CollectionChanged { key: String },
    ItemAdded { key: String },
    ItemChanged { key: String, id: ItemId },
    ItemRemoved { key: String, id: ItemId },
    PropChanged { key: String, prop: String },
    ItemPropChanged { key: String, id: ItemId, prop: String },
}

impl TrackerEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            TrackerEvent::CollectionChanged { .. } => EventKind::CollectionChanged,
            TrackerEvent::ItemAdded { .. } => EventKind::ItemAdded,
            TrackerEvent::ItemChanged { .. } => EventKind::ItemChanged,
            TrackerEvent::ItemRemoved { .. } => EventKind::ItemRemoved,
            TrackerEvent::PropChanged { .. } => EventKind::PropChanged,
            TrackerEvent::ItemPropChanged { .. } => EventKind::ItemPropChanged,
        }
    }

    /// Name of the collection the event is about.
    pub fn key(&self) -> &str {
        match self {
            TrackerEvent::CollectionChanged { key }
            | TrackerEvent::ItemAdded { key }
            | TrackerEvent::ItemChanged { key, .. }
            | TrackerEvent::ItemRemoved { key, .. }
            | TrackerEvent::PropChanged { key, .. }
            | TrackerEvent::ItemPropChanged { key, .. } => key,
        }
    }
}

/// Discriminant of [`TrackerEvent`], used to subscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    CollectionChanged,
    ItemAdded,
    ItemChanged,
    ItemRemoved,
    PropChanged,
    ItemPropChanged,
}

/// Listener callback.
pub type Listener = Arc<dyn Fn(&TrackerEvent) -> Result<(), CallbackError> + Send + Sync>;

type ListenerTable = RwLock<IndexMap<EventKind, Vec<(u64, Listener)>>>;

/// Listener registry shared between a tracker and its subscriptions.
pub(crate) struct EventBus {
    next_id: AtomicU64,
    listeners: Arc<ListenerTable>,
}

impl EventBus {
    pub(crate) fn new() -> Self {
        Self {
            next_id: AtomicU64::new(0),
            listeners: Arc::new(RwLock::new(IndexMap::new())),
        }
    }

    pub(crate) fn subscribe(&self, kind: EventKind, listener: Listener) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.listeners
            .write()
            .entry(kind)
            .or_default()
            .push((id, listener));

        Subscription {
            listeners: Arc::downgrade(&self.listeners),
            kind,
            id,
            active: true,
        }
    }

    pub(crate) fn has_listeners(&self, kind: EventKind) -> bool {
        self.listeners
            .read()
            .get(&kind)
            .is_some_and(|listeners| !listeners.is_empty())
    }

    pub(crate) fn listener_count(&self, kind: EventKind) -> usize {
        self.listeners.read().get(&kind).map_or(0, Vec::len)
    }

    /// Snapshot the listeners for `kind`.
    ///
    /// Delivery works on the snapshot so listeners may subscribe or
    /// unsubscribe while an event is being delivered.
    pub(crate) fn listeners(&self, kind: EventKind) -> Vec<Listener> {
        self.listeners
            .read()
            .get(&kind)
            .map(|listeners| listeners.iter().map(|(_, l)| l.clone()).collect())
            .unwrap_or_default()
    }
}

/// Handle to a registered listener.
///
/// Dropping the handle unsubscribes the listener. Call
/// [`detach`](Self::detach) to keep the listener for the tracker's whole
/// lifetime.
#[must_use = "dropping a Subscription unsubscribes its listener"]
pub struct Subscription {
    listeners: Weak<ListenerTable>,
    kind: EventKind,
    id: u64,
    active: bool,
}

impl Subscription {
    pub fn kind(&self) -> EventKind {
        self.kind
    }

    /// Remove the listener now.
    pub fn unsubscribe(mut self) {
        self.remove();
    }

    /// Keep the listener registered after this handle is dropped.
    pub fn detach(mut self) {
        self.active = false;
    }

    fn remove(&mut self) {
        if !std::mem::replace(&mut self.active, false) {
            return;
        }
        if let Some(listeners) = self.listeners.upgrade() {
            if let Some(entries) = listeners.write().get_mut(&self.kind) {
                entries.retain(|(id, _)| *id != self.id);
            }
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.remove();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("kind", &self.kind)
            .field("id", &self.id)
            .field("active", &self.active)
            .finish()
    }
}
