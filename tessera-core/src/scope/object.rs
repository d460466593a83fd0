//! Object proxies.

use std::sync::Arc;

use super::{ObjectRef, ProxyContext, Tracked, Value};

struct ObjectProxyInner {
    raw: ObjectRef,
    context: ProxyContext,
}

/// Auto-tracking view of a plain object.
///
/// Every read goes through [`get`](Self::get) (or [`has`](Self::has),
/// [`keys`](Self::keys), [`len`](Self::len)) and every write through
/// [`set`](Self::set) / [`remove`](Self::remove), which call the tracker
/// with the property name being touched.
#[derive(Clone)]
pub struct ObjectProxy {
    inner: Arc<ObjectProxyInner>,
}

impl ObjectProxy {
    pub(crate) fn new(raw: ObjectRef, context: ProxyContext) -> Self {
        Self {
            inner: Arc::new(ObjectProxyInner { raw, context }),
        }
    }

    /// The wrapped object.
    pub fn raw(&self) -> &ObjectRef {
        &self.inner.raw
    }

    /// Same proxy instance.
    pub fn ptr_eq(&self, other: &ObjectProxy) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn context(&self) -> &ProxyContext {
        &self.inner.context
    }

    /// Read `prop`, tracking it.
    ///
    /// In deep mode nested objects and arrays come back as proxies bound to
    /// the same key; opaque values and primitives come back as-is.
    pub fn get(&self, prop: &str) -> Option<Tracked> {
        let context = self.context();
        context.target().track(context.tracker(), prop);

        let value = self.inner.raw.read().get(prop).cloned();
        value.map(|value| context.present(value))
    }

    /// Read `prop` without tracking or wrapping.
    pub fn get_untracked(&self, prop: &str) -> Option<Value> {
        self.inner.raw.read().get(prop).cloned()
    }

    /// Whether `prop` exists. Tracks `prop`.
    pub fn has(&self, prop: &str) -> bool {
        let context = self.context();
        context.target().track(context.tracker(), prop);
        self.inner.raw.read().contains_key(prop)
    }

    /// Property names, in insertion order. Tracks the object's structure.
    pub fn keys(&self) -> Vec<String> {
        let context = self.context();
        context.target().track_structure(context.tracker());
        self.inner.raw.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        let context = self.context();
        context.target().track_structure(context.tracker());
        self.inner.raw.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Write `prop` and trigger it. Returns the previous value.
    ///
    /// Adding a property that did not exist also triggers the structure, so
    /// readers of [`keys`](Self::keys) see it.
    pub fn set(&self, prop: &str, value: impl Into<Value>) -> Option<Value> {
        let previous = self.inner.raw.write().insert(prop.to_owned(), value.into());

        let context = self.context();
        context.target().trigger(context.tracker(), prop);
        if previous.is_none() {
            context.target().trigger_structure(context.tracker());
        }
        previous
    }

    /// Replace `prop` with `f(current)`.
    pub fn update<F>(&self, prop: &str, f: F) -> Option<Value>
    where
        F: FnOnce(Option<&Value>) -> Value,
    {
        // Clone out so `f` may touch this object without deadlocking.
        let current = self.inner.raw.read().get(prop).cloned();
        self.set(prop, f(current.as_ref()))
    }

    /// Delete `prop`. Triggers it and the structure when it existed.
    pub fn remove(&self, prop: &str) -> Option<Value> {
        let removed = self.inner.raw.write().shift_remove(prop);
        if removed.is_some() {
            let context = self.context();
            context.target().trigger(context.tracker(), prop);
            context.target().trigger_structure(context.tracker());
        }
        removed
    }

    /// Untracked JSON snapshot.
    pub fn to_json(&self) -> serde_json::Value {
        Value::Object(self.inner.raw.clone()).to_json()
    }
}

impl From<&ObjectProxy> for Value {
    fn from(proxy: &ObjectProxy) -> Self {
        Value::Object(proxy.raw().clone())
    }
}

impl std::fmt::Debug for ObjectProxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectProxy")
            .field("raw", &Value::Object(self.inner.raw.clone()))
            .field("target", self.context().target())
            .field("deep", &self.context().is_deep())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use crate::scope::{Scope, Tracked, Value};
    use crate::tracker::Tracker;
    use serde_json::json;

    fn scope() -> Scope {
        Scope::new(Tracker::noop())
    }

    #[test]
    fn shallow_reads_return_raw_values() {
        let value = Value::from(json!({"a": {"b": 1}, "n": 2}));
        let proxy = scope().proxy(&value, "k").unwrap().into_object().unwrap();

        assert_eq!(proxy.get("n").and_then(|t| t.as_i64()), Some(2));
        match proxy.get("a") {
            Some(Tracked::Value(Value::Object(_))) => {}
            other => panic!("expected raw object, got {other:?}"),
        }
        assert!(proxy.get("missing").is_none());
    }

    #[test]
    fn deep_reads_wrap_nested_containers() {
        let value = Value::from(json!({"a": {"b": 1}, "list": [1, 2]}));
        let proxy = scope().deep_proxy(&value, "k").unwrap().into_object().unwrap();

        assert!(proxy.get("a").and_then(Tracked::into_object).is_some());
        assert!(proxy.get("list").and_then(Tracked::into_array).is_some());
    }

    #[test]
    fn writes_reach_the_raw_object() {
        let value = Value::from(json!({"a": {"b": 1}}));
        let proxy = scope().deep_proxy(&value, "k").unwrap().into_object().unwrap();

        let nested = proxy.get("a").and_then(Tracked::into_object).unwrap();
        assert_eq!(nested.set("b", 2), Some(Value::from(1)));
        assert_eq!(value.to_json(), json!({"a": {"b": 2}}));

        nested.update("b", |v| Value::from(v.and_then(Value::as_i64).unwrap_or(0) + 1));
        assert_eq!(nested.get_untracked("b"), Some(Value::from(3)));

        assert_eq!(nested.remove("b"), Some(Value::from(3)));
        assert!(!nested.has("b"));
        assert!(nested.is_empty());
    }

    #[test]
    fn update_may_write_the_same_object() {
        let value = Value::object([("n", 1)]);
        let proxy = scope().proxy(&value, "k").unwrap().into_object().unwrap();

        proxy.update("n", |current| {
            proxy.set("seen", current.cloned());
            Value::from(current.and_then(Value::as_i64).unwrap_or(0) + 1)
        });

        assert_eq!(value.to_json(), json!({"n": 2, "seen": 1}));
    }

    #[test]
    fn keys_keep_insertion_order() {
        let value = Value::object([("z", 1), ("a", 2)]);
        let proxy = scope().proxy(&value, "k").unwrap().into_object().unwrap();
        proxy.set("m", 3);
        assert_eq!(proxy.keys(), vec!["z", "a", "m"]);
        assert_eq!(proxy.len(), 3);
    }

    #[test]
    fn opaque_values_pass_through_by_identity() {
        let stamp = Value::opaque(std::time::SystemTime::UNIX_EPOCH);
        let value = Value::object([("at", stamp.clone())]);
        let proxy = scope().deep_proxy(&value, "k").unwrap().into_object().unwrap();

        let read = proxy.get("at").unwrap();
        assert_eq!(read.as_value(), Some(&stamp));
    }
}
