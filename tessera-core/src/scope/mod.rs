//! Scope
//!
//! The proxy engine. A [`Scope`] wraps plain data in proxies that call the
//! tracker on every read and write, so a store can hand out ordinary-looking
//! objects and still get fine-grained tracking.
//!
//! # Wrapping strategies
//!
//! Each value is classified once, when its proxy is built:
//!
//! - plain objects become an [`ObjectProxy`]
//! - arrays become an [`ArrayProxy`], a sequence wrapper whose mutators carry
//!   their own tracking hooks
//! - opaque values are never wrapped and pass through by reference
//! - primitives cannot be wrapped; box them first (see
//!   [`AdapterBundle::reference`](crate::bundle::AdapterBundle::reference))
//!
//! # Tracking keys
//!
//! A proxy is bound to a target: a collection key, optionally with an item
//! id. Property reads track `(key, prop)` or `(key, id, prop)`. In deep mode a
//! nested object comes back as another proxy bound to the same target, so
//! `p.get("a")?.get("b")` tracks the leaf name `b`, not the path `a.b`.
//!
//! # Identity
//!
//! Proxies are cached per scope by `(allocation, target, depth)`. Asking
//! twice for the same object under the same key yields the same proxy, which
//! keeps reference comparisons by consumers meaningful and avoids rebuilding
//! nested proxies on every access. The cache holds strong references; call
//! [`Scope::clear`] when tearing a store down.
//!
//! Proxies handed out keep working after their scope is dropped, but nested
//! identity only holds while the scope is alive: without it, every nested
//! read builds a fresh, uncached proxy.

mod array;
mod object;
mod value;

use std::sync::{Arc, Weak};

use dashmap::DashMap;

pub use array::{ArrayProxy, LENGTH_PROP};
pub use object::ObjectProxy;
pub use value::{ArrayRef, ObjectRef, OpaqueRef, Shape, Value};

use crate::error::ScopeError;
use crate::tracker::{DepKey, ItemId, Tracker};

/// What a proxy reports its reads and writes against.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct Target {
    key: Arc<str>,
    id: Option<ItemId>,
}

impl Target {
    fn new(key: &str, id: Option<ItemId>) -> Self {
        Self { key: Arc::from(key), id }
    }

    fn prop_key<'a>(&'a self, prop: &'a str) -> DepKey<'a> {
        match &self.id {
            Some(id) => DepKey::ItemProp(&self.key, id, prop),
            None => DepKey::Prop(&self.key, prop),
        }
    }

    /// The coarse key standing for the shape of the wrapped data: the item
    /// for item targets, the collection otherwise.
    fn structure_key(&self) -> DepKey<'_> {
        match &self.id {
            Some(id) => DepKey::Item(&self.key, id),
            None => DepKey::Collection(&self.key),
        }
    }

    pub(crate) fn track(&self, tracker: &Tracker, prop: &str) {
        tracker.track_key(self.prop_key(prop));
    }

    pub(crate) fn trigger(&self, tracker: &Tracker, prop: &str) {
        match &self.id {
            Some(id) => tracker.trigger_item_prop(&self.key, id, prop),
            None => tracker.trigger_prop(&self.key, prop),
        }
    }

    pub(crate) fn track_structure(&self, tracker: &Tracker) {
        tracker.track_key(self.structure_key());
    }

    pub(crate) fn trigger_structure(&self, tracker: &Tracker) {
        match &self.id {
            Some(id) => tracker.trigger_item(&self.key, id),
            None => tracker.trigger_collection(&self.key),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Depth {
    Shallow,
    Deep,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    addr: usize,
    target: Target,
    depth: Depth,
}

/// A wrapped object or array.
#[derive(Debug, Clone)]
pub enum Proxy {
    Object(ObjectProxy),
    Array(ArrayProxy),
}

impl Proxy {
    pub fn as_object(&self) -> Option<&ObjectProxy> {
        match self {
            Proxy::Object(o) => Some(o),
            Proxy::Array(_) => None,
        }
    }

    pub fn as_array(&self) -> Option<&ArrayProxy> {
        match self {
            Proxy::Array(a) => Some(a),
            Proxy::Object(_) => None,
        }
    }

    pub fn into_object(self) -> Option<ObjectProxy> {
        match self {
            Proxy::Object(o) => Some(o),
            Proxy::Array(_) => None,
        }
    }

    pub fn into_array(self) -> Option<ArrayProxy> {
        match self {
            Proxy::Array(a) => Some(a),
            Proxy::Object(_) => None,
        }
    }

    /// The wrapped value itself.
    pub fn raw(&self) -> Value {
        match self {
            Proxy::Object(o) => Value::Object(o.raw().clone()),
            Proxy::Array(a) => Value::Array(a.raw().clone()),
        }
    }

    /// Same proxy instance.
    pub fn ptr_eq(&self, other: &Proxy) -> bool {
        match (self, other) {
            (Proxy::Object(a), Proxy::Object(b)) => a.ptr_eq(b),
            (Proxy::Array(a), Proxy::Array(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

/// Result of reading through a proxy.
///
/// In deep mode nested objects and arrays come back wrapped; everything else
/// (and everything in shallow mode) comes back as the raw value.
#[derive(Debug, Clone)]
pub enum Tracked {
    Value(Value),
    Object(ObjectProxy),
    Array(ArrayProxy),
}

impl Tracked {
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Tracked::Value(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectProxy> {
        match self {
            Tracked::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&ArrayProxy> {
        match self {
            Tracked::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn into_object(self) -> Option<ObjectProxy> {
        match self {
            Tracked::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn into_array(self) -> Option<ArrayProxy> {
        match self {
            Tracked::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Unwrap to the underlying value, dropping any proxy.
    pub fn into_value(self) -> Value {
        match self {
            Tracked::Value(v) => v,
            Tracked::Object(o) => Value::Object(o.raw().clone()),
            Tracked::Array(a) => Value::Array(a.raw().clone()),
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        self.as_value().and_then(Value::as_i64)
    }

    pub fn as_f64(&self) -> Option<f64> {
        self.as_value().and_then(Value::as_f64)
    }

    pub fn as_str(&self) -> Option<&str> {
        self.as_value().and_then(Value::as_str)
    }

    pub fn as_bool(&self) -> Option<bool> {
        self.as_value().and_then(Value::as_bool)
    }
}

impl From<Tracked> for Value {
    fn from(tracked: Tracked) -> Self {
        tracked.into_value()
    }
}

impl From<Proxy> for Value {
    fn from(proxy: Proxy) -> Self {
        proxy.raw()
    }
}

struct ScopeInner {
    tracker: Tracker,
    cache: DashMap<CacheKey, Proxy>,
}

/// Factory for cached, auto-tracking proxies over one tracker.
#[derive(Clone)]
pub struct Scope {
    inner: Arc<ScopeInner>,
}

impl Scope {
    pub fn new(tracker: Tracker) -> Self {
        Self {
            inner: Arc::new(ScopeInner {
                tracker,
                cache: DashMap::new(),
            }),
        }
    }

    pub fn tracker(&self) -> &Tracker {
        &self.inner.tracker
    }

    /// Shallow proxy tracking `(key, prop)`.
    pub fn proxy(&self, value: &Value, key: &str) -> Result<Proxy, ScopeError> {
        self.wrap(value, Target::new(key, None), Depth::Shallow)
    }

    /// Shallow proxy tracking `(key, id, prop)`.
    pub fn item_proxy(&self, value: &Value, key: &str, id: impl Into<ItemId>) -> Result<Proxy, ScopeError> {
        self.wrap(value, Target::new(key, Some(id.into())), Depth::Shallow)
    }

    /// Recursive proxy tracking `(key, leaf_prop)`.
    pub fn deep_proxy(&self, value: &Value, key: &str) -> Result<Proxy, ScopeError> {
        self.wrap(value, Target::new(key, None), Depth::Deep)
    }

    /// Recursive proxy tracking `(key, id, leaf_prop)`.
    pub fn deep_item_proxy(
        &self,
        value: &Value,
        key: &str,
        id: impl Into<ItemId>,
    ) -> Result<Proxy, ScopeError> {
        self.wrap(value, Target::new(key, Some(id.into())), Depth::Deep)
    }

    /// Number of cached proxies.
    pub fn cached_len(&self) -> usize {
        self.inner.cache.len()
    }

    /// Forget every cached proxy. Proxies already handed out keep working.
    pub fn clear(&self) {
        tracing::debug!(cached = self.inner.cache.len(), "clearing proxy cache");
        self.inner.cache.clear();
    }

    fn wrap(&self, value: &Value, target: Target, depth: Depth) -> Result<Proxy, ScopeError> {
        wrap_in(&self.inner, value, target, depth)
    }
}

impl std::fmt::Debug for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scope")
            .field("cached", &self.cached_len())
            .finish()
    }
}

/// Shared context every proxy carries.
#[derive(Clone)]
pub(crate) struct ProxyContext {
    tracker: Tracker,
    scope: Weak<ScopeInner>,
    target: Target,
    depth: Depth,
}

impl ProxyContext {
    pub(crate) fn tracker(&self) -> &Tracker {
        &self.tracker
    }

    pub(crate) fn target(&self) -> &Target {
        &self.target
    }

    pub(crate) fn is_deep(&self) -> bool {
        self.depth == Depth::Deep
    }

    /// Turn a raw value read from a proxy into what the caller sees.
    pub(crate) fn present(&self, value: Value) -> Tracked {
        if !self.is_deep() {
            return Tracked::Value(value);
        }
        match value.shape() {
            Shape::PlainObject | Shape::Array => match self.nested(&value) {
                Some(Proxy::Object(o)) => Tracked::Object(o),
                Some(Proxy::Array(a)) => Tracked::Array(a),
                None => Tracked::Value(value),
            },
            Shape::Opaque | Shape::Primitive => Tracked::Value(value),
        }
    }

    /// Nested proxy for `value` under the same target, cached when the scope
    /// is still alive.
    fn nested(&self, value: &Value) -> Option<Proxy> {
        match self.scope.upgrade() {
            Some(scope) => wrap_in(&scope, value, self.target.clone(), self.depth).ok(),
            None => build(self.clone(), value).ok(),
        }
    }
}

fn wrap_in(scope: &Arc<ScopeInner>, value: &Value, target: Target, depth: Depth) -> Result<Proxy, ScopeError> {
    let addr = match value {
        Value::Object(o) => o.addr(),
        Value::Array(a) => a.addr(),
        other => {
            return Err(ScopeError::NotProxyable {
                shape: other.shape().name(),
            })
        }
    };

    let key = CacheKey {
        addr,
        target: target.clone(),
        depth,
    };
    if let Some(cached) = scope.cache.get(&key) {
        return Ok(cached.clone());
    }

    let context = ProxyContext {
        tracker: scope.tracker.clone(),
        scope: Arc::downgrade(scope),
        target,
        depth,
    };
    let proxy = build(context, value)?;
    Ok(scope.cache.entry(key).or_insert(proxy).clone())
}

/// Pick the wrapping strategy for `value`'s shape.
fn build(context: ProxyContext, value: &Value) -> Result<Proxy, ScopeError> {
    match value {
        Value::Object(o) => Ok(Proxy::Object(ObjectProxy::new(o.clone(), context))),
        Value::Array(a) => Ok(Proxy::Array(ArrayProxy::new(a.clone(), context))),
        other => Err(ScopeError::NotProxyable {
            shape: other.shape().name(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::{Dependency, DependencyRef, ReactivityAdapter};
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn primitives_and_opaques_are_rejected() {
        let scope = Scope::new(Tracker::noop());
        assert_eq!(
            scope.deep_proxy(&Value::from(1), "k").err(),
            Some(ScopeError::NotProxyable { shape: "primitive" })
        );
        assert_eq!(
            scope.proxy(&Value::Null, "k").err(),
            Some(ScopeError::NotProxyable { shape: "primitive" })
        );
        assert_eq!(
            scope.deep_item_proxy(&Value::opaque(1u8), "k", 1).err(),
            Some(ScopeError::NotProxyable { shape: "opaque" })
        );
    }

    #[test]
    fn proxies_are_cached_per_key_and_depth() {
        let scope = Scope::new(Tracker::noop());
        let value = Value::object([("a", 1)]);

        let first = scope.deep_proxy(&value, "k").unwrap();
        let second = scope.deep_proxy(&value, "k").unwrap();
        assert!(first.ptr_eq(&second));

        let other_key = scope.deep_proxy(&value, "j").unwrap();
        let shallow = scope.proxy(&value, "k").unwrap();
        let item = scope.deep_item_proxy(&value, "k", 1).unwrap();
        assert!(!first.ptr_eq(&other_key));
        assert!(!first.ptr_eq(&shallow));
        assert!(!first.ptr_eq(&item));
        assert_eq!(scope.cached_len(), 4);

        scope.clear();
        assert_eq!(scope.cached_len(), 0);
        assert!(!first.ptr_eq(&scope.deep_proxy(&value, "k").unwrap()));
    }

    #[test]
    fn separate_scopes_do_not_share_proxies() {
        let tracker = Tracker::noop();
        let value = Value::array([1, 2]);
        let a = Scope::new(tracker.clone()).deep_proxy(&value, "k").unwrap();
        let b = Scope::new(tracker).deep_proxy(&value, "k").unwrap();
        assert!(!a.ptr_eq(&b));
    }

    #[test]
    fn nested_proxies_are_reused() {
        let scope = Scope::new(Tracker::noop());
        let value = Value::from(serde_json::json!({"a": {"b": 1}}));
        let root = scope.deep_proxy(&value, "k").unwrap().into_object().unwrap();

        let first = root.get("a").and_then(Tracked::into_object).unwrap();
        let second = root.get("a").and_then(Tracked::into_object).unwrap();
        assert!(first.ptr_eq(&second));
        assert_eq!(scope.cached_len(), 2);
    }

    #[test]
    fn proxies_outlive_their_scope() {
        let value = Value::from(serde_json::json!({"a": {"b": 1}}));
        let root = {
            let scope = Scope::new(Tracker::noop());
            scope.deep_proxy(&value, "k").unwrap().into_object().unwrap()
        };
        let nested = root.get("a").and_then(Tracked::into_object).unwrap();
        assert_eq!(nested.get("b").and_then(|t| t.as_i64()), Some(1));

        // Nothing caches nested proxies once the scope is gone.
        let again = root.get("a").and_then(Tracked::into_object).unwrap();
        assert!(!nested.ptr_eq(&again));
        assert!(nested.raw().ptr_eq(again.raw()));
    }

    /// Adapter that remembers every handle it made, in creation order.
    #[derive(Default)]
    struct RecordingAdapter {
        created: Mutex<Vec<Arc<RecordingDependency>>>,
    }

    #[derive(Default)]
    struct RecordingDependency {
        notifies: AtomicUsize,
    }

    impl Dependency for RecordingDependency {
        fn depend(&self) {}

        fn notify(&self) {
            self.notifies.fetch_add(1, Ordering::SeqCst);
        }
    }

    impl ReactivityAdapter for RecordingAdapter {
        fn create(&self) -> DependencyRef {
            let dependency = Arc::new(RecordingDependency::default());
            self.created.lock().push(dependency.clone());
            dependency
        }
    }

    impl RecordingAdapter {
        fn notifies(&self) -> Vec<usize> {
            self.created
                .lock()
                .iter()
                .map(|d| d.notifies.load(Ordering::SeqCst))
                .collect()
        }
    }

    #[test]
    fn deep_write_notifies_only_the_leaf() {
        let adapter = Arc::new(RecordingAdapter::default());
        let tracker = Tracker::new(adapter.clone());
        let scope = Scope::new(tracker.clone());
        let value = Value::from(serde_json::json!({"a": {"b": 1}}));
        let root = scope.deep_proxy(&value, "k").unwrap().into_object().unwrap();

        // Reading p.a.b creates ("k", "a") then ("k", "b").
        let nested = root.get("a").and_then(Tracked::into_object).unwrap();
        assert_eq!(nested.get("b").and_then(|t| t.as_i64()), Some(1));
        assert_eq!(tracker.dependency_count(), 2);
        assert!(Arc::ptr_eq(&tracker.prop_dep("k", "b"), &created_dep(&adapter, 1)));

        nested.set("b", 2);
        assert_eq!(adapter.notifies(), vec![0, 1]);
        assert_eq!(tracker.dependency_count(), 2);
        assert_eq!(value.to_json(), serde_json::json!({"a": {"b": 2}}));
    }

    fn created_dep(adapter: &RecordingAdapter, index: usize) -> DependencyRef {
        adapter.created.lock()[index].clone()
    }
}
