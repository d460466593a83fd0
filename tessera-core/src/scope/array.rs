//! Array Proxies
//!
//! A sequence wrapper exposing the usual array surface with tracking built
//! in, instead of intercepting a native array.
//!
//! # Reads
//!
//! - `get(i)` tracks the index as a property (`"0"`, `"1"`, ...)
//! - `len()` tracks the synthetic [`LENGTH_PROP`] property
//! - iteration (`for_each`, `map`, `filter`, `find`, `position`, `contains`,
//!   `to_vec`) tracks `"length"` and then every index it visits
//!
//! All reads also track the target's structure (the collection, or the item
//! for item proxies), which is what mutators trigger.
//!
//! # Writes
//!
//! - `set(i, v)` on an existing index triggers that index only
//! - every mutator (`push`, `pop`, `splice`, `sort_by`, ...) triggers the
//!   structure exactly once per call, however many indices it moved, and only
//!   when the array actually changed

use std::cmp::Ordering;
use std::sync::Arc;

use super::{ArrayRef, ProxyContext, Tracked, Value};

/// Property name tracked by [`ArrayProxy::len`].
pub const LENGTH_PROP: &str = "length";

struct ArrayProxyInner {
    raw: ArrayRef,
    context: ProxyContext,
}

/// Auto-tracking view of an array.
#[derive(Clone)]
pub struct ArrayProxy {
    inner: Arc<ArrayProxyInner>,
}

impl ArrayProxy {
    pub(crate) fn new(raw: ArrayRef, context: ProxyContext) -> Self {
        Self {
            inner: Arc::new(ArrayProxyInner { raw, context }),
        }
    }

    pub fn raw(&self) -> &ArrayRef {
        &self.inner.raw
    }

    pub fn ptr_eq(&self, other: &ArrayProxy) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn context(&self) -> &ProxyContext {
        &self.inner.context
    }

    fn track_index(&self, index: usize) {
        let context = self.context();
        context.target().track(context.tracker(), &index.to_string());
    }

    fn track_shape(&self) {
        let context = self.context();
        context.target().track_structure(context.tracker());
        context.target().track(context.tracker(), LENGTH_PROP);
    }

    fn trigger_shape(&self) {
        let context = self.context();
        context.target().trigger_structure(context.tracker());
    }

    // ------------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------------

    pub fn get(&self, index: usize) -> Option<Tracked> {
        let context = self.context();
        context.target().track_structure(context.tracker());
        self.track_index(index);

        let value = self.inner.raw.read().get(index).cloned();
        value.map(|value| context.present(value))
    }

    pub fn get_untracked(&self, index: usize) -> Option<Value> {
        self.inner.raw.read().get(index).cloned()
    }

    pub fn len(&self) -> usize {
        self.track_shape();
        self.inner.raw.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot the elements, tracking the shape and every index.
    ///
    /// Callbacks run on the snapshot, so they may read or write this same
    /// array without deadlocking.
    fn tracked_items(&self) -> Vec<Tracked> {
        self.track_shape();
        let items = self.inner.raw.read().clone();
        items
            .into_iter()
            .enumerate()
            .map(|(index, value)| {
                self.track_index(index);
                self.context().present(value)
            })
            .collect()
    }

    pub fn to_vec(&self) -> Vec<Tracked> {
        self.tracked_items()
    }

    pub fn for_each<F>(&self, mut f: F)
    where
        F: FnMut(usize, Tracked),
    {
        for (index, item) in self.tracked_items().into_iter().enumerate() {
            f(index, item);
        }
    }

    pub fn map<R, F>(&self, mut f: F) -> Vec<R>
    where
        F: FnMut(Tracked) -> R,
    {
        self.tracked_items().into_iter().map(|item| f(item)).collect()
    }

    pub fn filter<F>(&self, mut f: F) -> Vec<Tracked>
    where
        F: FnMut(&Tracked) -> bool,
    {
        self.tracked_items().into_iter().filter(|item| f(item)).collect()
    }

    /// First element matching `f`. Stops tracking at the match.
    pub fn find<F>(&self, mut f: F) -> Option<Tracked>
    where
        F: FnMut(&Tracked) -> bool,
    {
        self.position_inner(&mut f).map(|(_, item)| item)
    }

    pub fn position<F>(&self, mut f: F) -> Option<usize>
    where
        F: FnMut(&Tracked) -> bool,
    {
        self.position_inner(&mut f).map(|(index, _)| index)
    }

    pub fn contains(&self, needle: &Value) -> bool {
        self.position(|item| match item {
            Tracked::Value(value) => value == needle,
            Tracked::Object(o) => needle.as_object().is_some_and(|n| n.ptr_eq(o.raw())),
            Tracked::Array(a) => needle.as_array().is_some_and(|n| n.ptr_eq(a.raw())),
        })
        .is_some()
    }

    fn position_inner(&self, f: &mut dyn FnMut(&Tracked) -> bool) -> Option<(usize, Tracked)> {
        self.track_shape();
        let items = self.inner.raw.read().clone();
        for (index, value) in items.into_iter().enumerate() {
            self.track_index(index);
            let item = self.context().present(value);
            if f(&item) {
                return Some((index, item));
            }
        }
        None
    }

    // ------------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------------

    /// Write one index.
    ///
    /// Writing past the end grows the array (padding with `Null`) and counts
    /// as a structural change.
    pub fn set(&self, index: usize, value: impl Into<Value>) {
        let grew = {
            let mut raw = self.inner.raw.write();
            if index < raw.len() {
                raw[index] = value.into();
                false
            } else {
                raw.resize(index, Value::Null);
                raw.push(value.into());
                true
            }
        };

        if grew {
            self.trigger_shape();
        } else {
            let context = self.context();
            context.target().trigger(context.tracker(), &index.to_string());
        }
    }

    /// Run a structural mutation and trigger once if it reports a change.
    fn mutate<R>(&self, f: impl FnOnce(&mut Vec<Value>) -> (R, bool)) -> R {
        let (result, changed) = f(&mut self.inner.raw.write());
        if changed {
            self.trigger_shape();
        }
        result
    }

    /// Append and return the new length.
    pub fn push(&self, value: impl Into<Value>) -> usize {
        let value = value.into();
        self.mutate(|raw| {
            raw.push(value);
            (raw.len(), true)
        })
    }

    pub fn pop(&self) -> Option<Value> {
        self.mutate(|raw| {
            let popped = raw.pop();
            let changed = popped.is_some();
            (popped, changed)
        })
    }

    /// Remove and return the first element.
    pub fn shift(&self) -> Option<Value> {
        self.mutate(|raw| {
            if raw.is_empty() {
                (None, false)
            } else {
                (Some(raw.remove(0)), true)
            }
        })
    }

    /// Prepend and return the new length.
    pub fn unshift(&self, value: impl Into<Value>) -> usize {
        let value = value.into();
        self.mutate(|raw| {
            raw.insert(0, value);
            (raw.len(), true)
        })
    }

    /// Insert at `index`, clamped to the current length.
    pub fn insert(&self, index: usize, value: impl Into<Value>) {
        let value = value.into();
        self.mutate(|raw| {
            let index = index.min(raw.len());
            raw.insert(index, value);
            ((), true)
        })
    }

    pub fn remove(&self, index: usize) -> Option<Value> {
        self.mutate(|raw| {
            if index < raw.len() {
                (Some(raw.remove(index)), true)
            } else {
                (None, false)
            }
        })
    }

    /// Remove `delete_count` elements at `start` and insert `items` there.
    ///
    /// `start` and `delete_count` are clamped like `Array.prototype.splice`.
    /// Returns the removed elements.
    pub fn splice<I>(&self, start: usize, delete_count: usize, items: I) -> Vec<Value>
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        let items: Vec<Value> = items.into_iter().map(Into::into).collect();
        self.mutate(|raw| {
            let start = start.min(raw.len());
            let end = start.saturating_add(delete_count).min(raw.len());
            let inserting = !items.is_empty();
            let removed: Vec<Value> = raw.splice(start..end, items).collect();
            let changed = inserting || !removed.is_empty();
            (removed, changed)
        })
    }

    pub fn reverse(&self) {
        self.mutate(|raw| {
            raw.reverse();
            ((), raw.len() > 1)
        })
    }

    /// Sort with `compare`. The comparator runs outside the array's lock.
    pub fn sort_by<F>(&self, compare: F)
    where
        F: FnMut(&Value, &Value) -> Ordering,
    {
        let mut items = self.inner.raw.read().clone();
        items.sort_by(compare);
        self.mutate(|raw| {
            let changed = raw.len() > 1;
            *raw = items;
            ((), changed)
        })
    }

    pub fn truncate(&self, len: usize) {
        self.mutate(|raw| {
            let changed = len < raw.len();
            raw.truncate(len);
            ((), changed)
        })
    }

    pub fn clear(&self) {
        self.mutate(|raw| {
            let changed = !raw.is_empty();
            raw.clear();
            ((), changed)
        })
    }

    /// Keep the elements matching `keep`. The predicate runs outside the
    /// array's lock.
    pub fn retain<F>(&self, mut keep: F)
    where
        F: FnMut(&Value) -> bool,
    {
        let items = self.inner.raw.read().clone();
        let before = items.len();
        let kept: Vec<Value> = items.into_iter().filter(|value| keep(value)).collect();
        self.mutate(|raw| {
            let changed = kept.len() != before;
            *raw = kept;
            ((), changed)
        })
    }

    pub fn to_json(&self) -> serde_json::Value {
        Value::Array(self.inner.raw.clone()).to_json()
    }
}

impl From<&ArrayProxy> for Value {
    fn from(proxy: &ArrayProxy) -> Self {
        Value::Array(proxy.raw().clone())
    }
}

impl std::fmt::Debug for ArrayProxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArrayProxy")
            .field("raw", &Value::Array(self.inner.raw.clone()))
            .field("target", self.context().target())
            .field("deep", &self.context().is_deep())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::Scope;
    use crate::tracker::Tracker;
    use serde_json::json;

    /// The scope is returned so nested proxies stay cached for the test.
    fn array(items: serde_json::Value) -> (Scope, Value, ArrayProxy) {
        let scope = Scope::new(Tracker::noop());
        let value = Value::from(items);
        let proxy = scope.deep_proxy(&value, "k").unwrap().into_array().unwrap();
        (scope, value, proxy)
    }

    #[test]
    fn reads_do_not_mutate() {
        let (_scope, value, proxy) = array(json!([1, 2, 3]));
        assert_eq!(proxy.len(), 3);
        assert_eq!(proxy.get(1).and_then(|t| t.as_i64()), Some(2));
        assert!(proxy.get(9).is_none());
        assert_eq!(proxy.map(|t| t.as_i64().unwrap() * 10), vec![10, 20, 30]);
        assert_eq!(proxy.position(|t| t.as_i64() == Some(3)), Some(2));
        assert!(proxy.contains(&Value::from(1)));
        assert!(!proxy.contains(&Value::from(7)));
        assert_eq!(value.to_json(), json!([1, 2, 3]));
    }

    #[test]
    fn mutators_edit_the_raw_array() {
        let (_scope, value, proxy) = array(json!([1, 2, 3]));

        assert_eq!(proxy.push(4), 4);
        assert_eq!(proxy.pop(), Some(Value::from(4)));
        assert_eq!(proxy.shift(), Some(Value::from(1)));
        assert_eq!(proxy.unshift(0), 3);
        assert_eq!(value.to_json(), json!([0, 2, 3]));

        let removed = proxy.splice(1, 1, [Value::from(7), Value::from(8)]);
        assert_eq!(removed, vec![Value::from(2)]);
        assert_eq!(value.to_json(), json!([0, 7, 8, 3]));

        proxy.sort_by(|a, b| a.as_i64().cmp(&b.as_i64()));
        assert_eq!(value.to_json(), json!([0, 3, 7, 8]));

        proxy.reverse();
        proxy.retain(|v| v.as_i64() != Some(7));
        assert_eq!(value.to_json(), json!([8, 3, 0]));

        proxy.truncate(1);
        proxy.insert(5, "x");
        assert_eq!(value.to_json(), json!([8, "x"]));

        proxy.clear();
        assert!(proxy.is_empty());
    }

    #[test]
    fn set_past_end_pads_with_null() {
        let (_scope, value, proxy) = array(json!([1]));
        proxy.set(0, 5);
        proxy.set(2, 9);
        assert_eq!(value.to_json(), json!([5, null, 9]));
    }

    #[test]
    fn splice_clamps_like_javascript() {
        let (_scope, value, proxy) = array(json!([1, 2]));
        assert!(proxy.splice(5, 10, Vec::<Value>::new()).is_empty());
        assert_eq!(proxy.splice(1, 10, Vec::<Value>::new()), vec![Value::from(2)]);
        assert_eq!(value.to_json(), json!([1]));
    }

    #[test]
    fn nested_elements_are_wrapped() {
        let (_scope, _, proxy) = array(json!([{"name": "a"}, [1]]));
        assert!(proxy.get(0).and_then(Tracked::into_object).is_some());
        assert!(proxy.get(1).and_then(Tracked::into_array).is_some());

        let first = proxy.find(|t| t.as_object().is_some()).and_then(Tracked::into_object);
        let again = proxy.get(0).and_then(Tracked::into_object);
        assert!(first.unwrap().ptr_eq(&again.unwrap()));
    }
}
