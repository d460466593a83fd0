//! Tracker
//!
//! The tracker owns every dependency handle of a store and maps
//! `(collection, item, property)` keys onto them.
//!
//! # Granularity
//!
//! Handles are addressed at four levels:
//!
//! | Level | Key | Read with | Written with |
//! |---|---|---|---|
//! | collection | `key` | [`track`](Tracker::track) | [`trigger_collection`](Tracker::trigger_collection) |
//! | item | `(key, id)` | [`track_item`](Tracker::track_item) | [`trigger_item`](Tracker::trigger_item) |
//! | property | `(key, prop)` | [`track_prop`](Tracker::track_prop) | [`trigger_prop`](Tracker::trigger_prop) |
//! | item property | `(key, id, prop)` | [`track_item_prop`](Tracker::track_item_prop) | [`trigger_item_prop`](Tracker::trigger_item_prop) |
//!
//! Triggers never cascade between levels. Replacing a whole item with
//! `trigger_item` wakes item-level readers only; readers of that item's
//! properties stay asleep unless the caller also triggers those properties.
//! Call sites pick the trigger that matches the shape of their change.
//!
//! # Lifetime
//!
//! Handles are created lazily on first access and live as long as the
//! tracker. [`trigger_item_removed`](Tracker::trigger_item_removed) releases
//! the handles of one item; [`clear`](Tracker::clear) releases everything.
//!
//! # Locking
//!
//! The table is behind a `parking_lot` lock, but the lock is never held while
//! calling into the adapter. `notify()` may synchronously re-run reactive
//! computations that read through this same tracker.

mod events;
mod key;
mod options;
mod table;

use std::sync::Arc;

use parking_lot::RwLock;

pub use events::{EventKind, Listener, Subscription, TrackerEvent};
pub use key::ItemId;
pub use options::{ErrorHandler, TrackerOptions};

pub(crate) use key::DepKey;

use self::events::EventBus;
use self::options::report;
use self::table::DepTable;
use crate::adapter::{self, AdapterRef, Cleanup, DependencyRef, EffectBody, ReactivityAdapter};
use crate::error::{CallbackError, ErrorContext, TrackerError};

struct TrackerInner {
    adapter: AdapterRef,
    table: RwLock<DepTable>,
    events: EventBus,
    error_handler: Option<ErrorHandler>,
}

/// Registry of dependency handles for one store.
///
/// Cloning a tracker is cheap and yields a handle to the same registry.
///
/// # Example
///
/// ```rust,ignore
/// let tracker = Tracker::new(adapter);
///
/// // Reader side, inside a reactive computation.
/// tracker.track_item_prop("players", 1, "score");
///
/// // Writer side.
/// tracker.trigger_item_prop("players", 1, "score");
/// ```
#[derive(Clone)]
pub struct Tracker {
    inner: Arc<TrackerInner>,
}

impl Tracker {
    /// Create a tracker reporting to `adapter`.
    pub fn new(adapter: AdapterRef) -> Self {
        Self::with_options(TrackerOptions::default().with_adapter(adapter))
    }

    /// Create a tracker with the inert noop adapter.
    pub fn noop() -> Self {
        Self::with_options(TrackerOptions::default())
    }

    pub fn with_options(options: TrackerOptions) -> Self {
        Self {
            inner: Arc::new(TrackerInner {
                adapter: options.resolved_adapter(),
                table: RwLock::new(DepTable::new()),
                events: EventBus::new(),
                error_handler: options.error_handler,
            }),
        }
    }

    pub fn adapter(&self) -> &AdapterRef {
        &self.inner.adapter
    }

    /// Whether reads are currently being collected by the runtime.
    ///
    /// Adapters without a scope probe are assumed to always be in scope.
    pub fn is_in_scope(&self) -> bool {
        adapter::in_scope(self.inner.adapter.as_ref())
    }

    /// Whether two trackers share the same registry.
    pub fn ptr_eq(&self, other: &Tracker) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    // ------------------------------------------------------------------------
    // Tracking
    // ------------------------------------------------------------------------

    pub fn track(&self, key: &str) {
        self.track_key(DepKey::Collection(key));
    }

    pub fn track_item(&self, key: &str, id: impl Into<ItemId>) {
        let id = id.into();
        self.track_key(DepKey::Item(key, &id));
    }

    pub fn track_prop(&self, key: &str, prop: &str) {
        self.track_key(DepKey::Prop(key, prop));
    }

    pub fn track_item_prop(&self, key: &str, id: impl Into<ItemId>, prop: &str) {
        let id = id.into();
        self.track_key(DepKey::ItemProp(key, &id, prop));
    }

    pub(crate) fn track_key(&self, key: DepKey<'_>) {
        if !self.is_in_scope() {
            return;
        }
        self.resolve(key).depend();
    }

    // ------------------------------------------------------------------------
    // Triggering
    // ------------------------------------------------------------------------

    /// Alias of [`trigger_collection`](Self::trigger_collection).
    pub fn trigger(&self, key: &str) {
        self.trigger_collection(key);
    }

    /// Notify readers of the collection as a whole.
    ///
    /// Per-item handles are not notified.
    pub fn trigger_collection(&self, key: &str) {
        self.notify_key(DepKey::Collection(key));
        self.emit_with(EventKind::CollectionChanged, || TrackerEvent::CollectionChanged {
            key: key.to_owned(),
        });
    }

    /// Notify item-level readers of `id`.
    ///
    /// This does not reach readers of the item's individual properties.
    pub fn trigger_item(&self, key: &str, id: impl Into<ItemId>) {
        let id = id.into();
        self.notify_key(DepKey::Item(key, &id));
        self.emit_with(EventKind::ItemChanged, || TrackerEvent::ItemChanged {
            key: key.to_owned(),
            id: id.clone(),
        });
    }

    pub fn trigger_prop(&self, key: &str, prop: &str) {
        self.notify_key(DepKey::Prop(key, prop));
        self.emit_with(EventKind::PropChanged, || TrackerEvent::PropChanged {
            key: key.to_owned(),
            prop: prop.to_owned(),
        });
    }

    pub fn trigger_item_prop(&self, key: &str, id: impl Into<ItemId>, prop: &str) {
        let id = id.into();
        self.notify_key(DepKey::ItemProp(key, &id, prop));
        self.emit_with(EventKind::ItemPropChanged, || TrackerEvent::ItemPropChanged {
            key: key.to_owned(),
            id: id.clone(),
            prop: prop.to_owned(),
        });
    }

    /// An item was added: collection readers see a new shape.
    pub fn trigger_item_added(&self, key: &str) {
        self.notify_key(DepKey::Collection(key));
        self.emit_with(EventKind::ItemAdded, || TrackerEvent::ItemAdded {
            key: key.to_owned(),
        });
    }

    /// An item was removed.
    ///
    /// Item-level readers are notified first, then the item's handles are
    /// released. A later read of the same id gets fresh handles.
    pub fn trigger_item_removed(&self, key: &str, id: impl Into<ItemId>) {
        let id = id.into();
        self.notify_key(DepKey::Item(key, &id));

        let released = self.inner.table.write().release_item(key, &id);
        if released > 0 {
            tracing::debug!(key, id = %id, released, "released item dependencies");
        }

        self.emit_with(EventKind::ItemRemoved, || TrackerEvent::ItemRemoved {
            key: key.to_owned(),
            id: id.clone(),
        });
    }

    pub(crate) fn notify_key(&self, key: DepKey<'_>) {
        // Bind first so the read guard is gone before notify() runs.
        let dependency = self.inner.table.read().get(key);
        if let Some(dependency) = dependency {
            tracing::trace!(key = %key, "notify");
            dependency.notify();
        }
    }

    // ------------------------------------------------------------------------
    // Raw handles
    // ------------------------------------------------------------------------

    pub fn dep(&self, key: &str) -> DependencyRef {
        self.resolve(DepKey::Collection(key))
    }

    pub fn item_dep(&self, key: &str, id: impl Into<ItemId>) -> DependencyRef {
        let id = id.into();
        self.resolve(DepKey::Item(key, &id))
    }

    pub fn prop_dep(&self, key: &str, prop: &str) -> DependencyRef {
        self.resolve(DepKey::Prop(key, prop))
    }

    pub fn item_prop_dep(&self, key: &str, id: impl Into<ItemId>, prop: &str) -> DependencyRef {
        let id = id.into();
        self.resolve(DepKey::ItemProp(key, &id, prop))
    }

    /// Look up or create the handle for `key`.
    fn resolve(&self, key: DepKey<'_>) -> DependencyRef {
        let existing = self.inner.table.read().get(key);
        if let Some(dependency) = existing {
            return dependency;
        }

        // Create outside the lock; if another caller won the race, its
        // handle is kept and ours is discarded.
        let created = self.inner.adapter.create();
        tracing::trace!(key = %key, "created dependency");
        self.inner.table.write().insert_if_absent(key, created)
    }

    /// Number of live dependency handles.
    pub fn dependency_count(&self) -> usize {
        self.inner.table.read().len()
    }

    /// Drop every handle without notifying anyone.
    pub fn clear(&self) {
        let mut table = self.inner.table.write();
        tracing::debug!(dependencies = table.len(), "clearing tracker");
        table.clear();
    }

    // ------------------------------------------------------------------------
    // Events
    // ------------------------------------------------------------------------

    /// Subscribe to one kind of trigger event.
    ///
    /// The listener keeps running until the returned [`Subscription`] is
    /// dropped or unsubscribed.
    pub fn on<F>(&self, kind: EventKind, listener: F) -> Subscription
    where
        F: Fn(&TrackerEvent) -> Result<(), CallbackError> + Send + Sync + 'static,
    {
        self.inner.events.subscribe(kind, Arc::new(listener))
    }

    /// Deliver `event` to its listeners without touching any dependency.
    pub fn emit(&self, event: &TrackerEvent) {
        let kind = event.kind();
        for listener in self.inner.events.listeners(kind) {
            if let Err(err) = listener(event) {
                report(self.inner.error_handler.as_ref(), &err, ErrorContext::Listener(kind));
            }
        }
    }

    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.inner.events.listener_count(kind)
    }

    /// Build and emit an event only when someone listens for it.
    fn emit_with(&self, kind: EventKind, event: impl FnOnce() -> TrackerEvent) {
        if self.inner.events.has_listeners(kind) {
            self.emit(&event());
        }
    }

    // ------------------------------------------------------------------------
    // Effects
    // ------------------------------------------------------------------------

    /// Run `body` as an effect of the adapter's runtime.
    ///
    /// Fails with [`TrackerError::EffectUnsupported`] when the adapter has no
    /// effect runner. Errors returned by `body` go to the error handler.
    pub fn effect<F>(&self, mut body: F) -> Result<Cleanup, TrackerError>
    where
        F: FnMut() -> Result<Option<Cleanup>, CallbackError> + Send + 'static,
    {
        let runner = self
            .inner
            .adapter
            .effect_runner()
            .ok_or(TrackerError::EffectUnsupported)?;

        let handler = self.inner.error_handler.clone();
        let wrapped: EffectBody = Box::new(move || match body() {
            Ok(cleanup) => cleanup,
            Err(err) => {
                report(handler.as_ref(), &err, ErrorContext::Effect);
                None
            }
        });

        Ok(runner.effect(wrapped))
    }
}

impl Default for Tracker {
    fn default() -> Self {
        Self::noop()
    }
}

impl std::fmt::Debug for Tracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tracker")
            .field("dependency_count", &self.dependency_count())
            .field("in_scope", &self.is_in_scope())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::{Dependency, ScopeProbe};
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingDependency {
        depends: AtomicUsize,
        notifies: AtomicUsize,
    }

    impl Dependency for CountingDependency {
        fn depend(&self) {
            self.depends.fetch_add(1, Ordering::SeqCst);
        }

        fn notify(&self) {
            self.notifies.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Adapter that remembers every handle it made.
    #[derive(Default)]
    struct CountingAdapter {
        in_scope: AtomicBool,
        created: Mutex<Vec<Arc<CountingDependency>>>,
    }

    impl CountingAdapter {
        fn new(in_scope: bool) -> Arc<Self> {
            let adapter = Self::default();
            adapter.in_scope.store(in_scope, Ordering::SeqCst);
            Arc::new(adapter)
        }

        fn created(&self) -> usize {
            self.created.lock().len()
        }

        fn notifies(&self) -> Vec<usize> {
            self.created
                .lock()
                .iter()
                .map(|d| d.notifies.load(Ordering::SeqCst))
                .collect()
        }
    }

    impl ReactivityAdapter for CountingAdapter {
        fn create(&self) -> DependencyRef {
            let dependency = Arc::new(CountingDependency::default());
            self.created.lock().push(dependency.clone());
            dependency
        }

        fn scope_probe(&self) -> Option<&dyn ScopeProbe> {
            Some(self)
        }
    }

    impl ScopeProbe for CountingAdapter {
        fn is_in_scope(&self) -> bool {
            self.in_scope.load(Ordering::SeqCst)
        }
    }

    #[test]
    fn dep_accessors_return_the_same_handle() {
        let tracker = Tracker::noop();

        assert!(Arc::ptr_eq(&tracker.dep("k"), &tracker.dep("k")));
        assert!(Arc::ptr_eq(&tracker.item_dep("k", 1), &tracker.item_dep("k", 1)));
        assert!(Arc::ptr_eq(&tracker.prop_dep("k", "p"), &tracker.prop_dep("k", "p")));
        assert!(Arc::ptr_eq(
            &tracker.item_prop_dep("k", "a", "p"),
            &tracker.item_prop_dep("k", "a", "p")
        ));
        assert!(!Arc::ptr_eq(&tracker.item_dep("k", 1), &tracker.item_dep("k", 2)));
        assert_eq!(tracker.dependency_count(), 5);
    }

    #[test]
    fn numeric_and_string_ids_are_distinct_items() {
        let tracker = Tracker::noop();

        assert!(!Arc::ptr_eq(&tracker.item_dep("k", 7), &tracker.item_dep("k", "7")));
        assert!(!Arc::ptr_eq(
            &tracker.item_prop_dep("k", 7, "p"),
            &tracker.item_prop_dep("k", "7", "p")
        ));
        assert_eq!(tracker.dependency_count(), 4);
    }

    #[test]
    fn tracking_outside_scope_is_a_noop() {
        let adapter = CountingAdapter::new(false);
        let tracker = Tracker::new(adapter.clone());

        tracker.track("k");
        tracker.track_item("k", 1);
        tracker.track_prop("k", "p");
        tracker.track_item_prop("k", 1, "p");

        assert_eq!(adapter.created(), 0);
        assert_eq!(tracker.dependency_count(), 0);
    }

    #[test]
    fn tracking_in_scope_depends_once_per_call() {
        let adapter = CountingAdapter::new(true);
        let tracker = Tracker::new(adapter.clone());

        tracker.track_item_prop("players", 1, "score");
        tracker.track_item_prop("players", 1, "score");

        assert_eq!(adapter.created(), 1);
        let dep = adapter.created.lock()[0].clone();
        assert_eq!(dep.depends.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn triggers_do_not_cascade() {
        let adapter = CountingAdapter::new(true);
        let tracker = Tracker::new(adapter.clone());

        tracker.track("players"); // 0
        tracker.track_item("players", 1); // 1
        tracker.track_item_prop("players", 1, "name"); // 2
        tracker.track_item_prop("players", 1, "score"); // 3

        tracker.trigger_item_prop("players", 1, "score");
        assert_eq!(adapter.notifies(), vec![0, 0, 0, 1]);

        // Whole-item replace only reaches item-level readers.
        tracker.trigger_item("players", 1);
        assert_eq!(adapter.notifies(), vec![0, 1, 0, 1]);

        tracker.trigger_collection("players");
        assert_eq!(adapter.notifies(), vec![1, 1, 0, 1]);

        tracker.trigger_item_added("players");
        assert_eq!(adapter.notifies(), vec![2, 1, 0, 1]);
    }

    #[test]
    fn triggering_unknown_keys_creates_nothing() {
        let adapter = CountingAdapter::new(true);
        let tracker = Tracker::new(adapter.clone());

        tracker.trigger("k");
        tracker.trigger_item("k", 1);
        tracker.trigger_prop("k", "p");
        tracker.trigger_item_prop("k", 1, "p");
        tracker.trigger_item_removed("k", 1);

        assert_eq!(adapter.created(), 0);
    }

    #[test]
    fn item_removal_notifies_then_releases() {
        let adapter = CountingAdapter::new(true);
        let tracker = Tracker::new(adapter.clone());

        let item = tracker.item_dep("players", 1);
        let prop = tracker.item_prop_dep("players", 1, "score");
        let other = tracker.item_dep("players", 2);
        let collection = tracker.dep("players");

        tracker.trigger_item_removed("players", 1);
        assert_eq!(adapter.notifies(), vec![1, 0, 0, 0]);

        assert!(!Arc::ptr_eq(&item, &tracker.item_dep("players", 1)));
        assert!(!Arc::ptr_eq(&prop, &tracker.item_prop_dep("players", 1, "score")));
        assert!(Arc::ptr_eq(&other, &tracker.item_dep("players", 2)));
        assert!(Arc::ptr_eq(&collection, &tracker.dep("players")));
    }

    #[test]
    fn clear_drops_everything_silently() {
        let adapter = CountingAdapter::new(true);
        let tracker = Tracker::new(adapter.clone());

        let before = tracker.dep("k");
        tracker.prop_dep("k", "p");
        tracker.clear();

        assert_eq!(tracker.dependency_count(), 0);
        assert_eq!(adapter.notifies(), vec![0, 0]);
        assert!(!Arc::ptr_eq(&before, &tracker.dep("k")));
    }

    #[test]
    fn listeners_receive_trigger_events() {
        let tracker = Tracker::noop();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let seen_clone = seen.clone();
        let _added = tracker.on(EventKind::ItemAdded, move |event| {
            seen_clone.lock().push(event.clone());
            Ok(())
        });
        let seen_clone = seen.clone();
        let _removed = tracker.on(EventKind::ItemRemoved, move |event| {
            seen_clone.lock().push(event.clone());
            Ok(())
        });

        tracker.trigger_item_added("players");
        tracker.trigger_item_prop("players", 1, "score");
        tracker.trigger_item_removed("players", 1);

        assert_eq!(
            *seen.lock(),
            vec![
                TrackerEvent::ItemAdded { key: "players".into() },
                TrackerEvent::ItemRemoved {
                    key: "players".into(),
                    id: ItemId::from(1)
                },
            ]
        );
    }

    #[test]
    fn listener_errors_reach_the_error_handler() {
        let failures = Arc::new(Mutex::new(Vec::new()));
        let failures_clone = failures.clone();
        let tracker = Tracker::with_options(TrackerOptions::default().with_error_handler(
            move |err, context| {
                failures_clone.lock().push((err.to_string(), context));
            },
        ));

        let delivered = Arc::new(AtomicUsize::new(0));
        let delivered_clone = delivered.clone();
        let _failing = tracker.on(EventKind::CollectionChanged, |_| Err("boom".into()));
        let _ok = tracker.on(EventKind::CollectionChanged, move |_| {
            delivered_clone.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        tracker.trigger("players");

        assert_eq!(delivered.load(Ordering::SeqCst), 1);
        assert_eq!(
            *failures.lock(),
            vec![(
                "boom".to_string(),
                ErrorContext::Listener(EventKind::CollectionChanged)
            )]
        );
    }

    #[test]
    fn effect_requires_an_effect_runner() {
        let tracker = Tracker::noop();
        let result = tracker.effect(|| Ok(None));
        assert_eq!(result.err(), Some(TrackerError::EffectUnsupported));
    }

    #[test]
    fn noop_tracker_is_never_in_scope() {
        let tracker = Tracker::default();
        assert!(!tracker.is_in_scope());
        assert!(tracker.clone().ptr_eq(&tracker));
    }
}
