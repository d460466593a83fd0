//! Value Model
//!
//! Dynamic values the proxy engine can wrap. Objects and arrays are shared,
//! interior-mutable containers with reference identity: cloning a
//! [`Value::Object`] clones the handle, not the map, and two handles are equal
//! only when they point at the same allocation. Primitives compare by value.
//!
//! Anything that should be observed only as a whole (timestamps, compiled
//! patterns, foreign maps and sets) goes into [`Value::Opaque`].

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Classification used to pick a wrapping strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Shape {
    PlainObject,
    Array,
    Opaque,
    Primitive,
}

impl Shape {
    pub fn name(self) -> &'static str {
        match self {
            Shape::PlainObject => "object",
            Shape::Array => "array",
            Shape::Opaque => "opaque",
            Shape::Primitive => "primitive",
        }
    }
}

/// Shared, mutable string-keyed map.
#[derive(Clone, Default)]
pub struct ObjectRef(Arc<RwLock<IndexMap<String, Value>>>);

impl ObjectRef {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn read(&self) -> RwLockReadGuard<'_, IndexMap<String, Value>> {
        self.0.read()
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, IndexMap<String, Value>> {
        self.0.write()
    }

    pub fn ptr_eq(&self, other: &ObjectRef) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Allocation address, used as the identity token for proxy caching.
    pub(crate) fn addr(&self) -> usize {
        Arc::as_ptr(&self.0) as *const () as usize
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for ObjectRef {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let map = iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        Self(Arc::new(RwLock::new(map)))
    }
}

/// Shared, mutable sequence.
#[derive(Clone, Default)]
pub struct ArrayRef(Arc<RwLock<Vec<Value>>>);

impl ArrayRef {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn read(&self) -> RwLockReadGuard<'_, Vec<Value>> {
        self.0.read()
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, Vec<Value>> {
        self.0.write()
    }

    pub fn ptr_eq(&self, other: &ArrayRef) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn addr(&self) -> usize {
        Arc::as_ptr(&self.0) as *const () as usize
    }
}

impl<V: Into<Value>> FromIterator<V> for ArrayRef {
    fn from_iter<I: IntoIterator<Item = V>>(iter: I) -> Self {
        Self(Arc::new(RwLock::new(iter.into_iter().map(Into::into).collect())))
    }
}

/// A value observed only as a whole.
#[derive(Clone)]
pub struct OpaqueRef {
    type_name: &'static str,
    value: Arc<dyn Any + Send + Sync>,
}

impl OpaqueRef {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            type_name: std::any::type_name::<T>(),
            value: Arc::new(value),
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.value.downcast_ref::<T>()
    }

    pub fn ptr_eq(&self, other: &OpaqueRef) -> bool {
        Arc::ptr_eq(&self.value, &other.value)
    }
}

/// A dynamic value.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Object(ObjectRef),
    Array(ArrayRef),
    Opaque(OpaqueRef),
}

impl Value {
    /// Build an object value from key/value pairs.
    pub fn object<K, V, I>(entries: I) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        Value::Object(entries.into_iter().collect())
    }

    pub fn array<V, I>(items: I) -> Self
    where
        V: Into<Value>,
        I: IntoIterator<Item = V>,
    {
        Value::Array(items.into_iter().collect())
    }

    pub fn opaque<T: Any + Send + Sync>(value: T) -> Self {
        Value::Opaque(OpaqueRef::new(value))
    }

    pub fn shape(&self) -> Shape {
        match self {
            Value::Object(_) => Shape::PlainObject,
            Value::Array(_) => Shape::Array,
            Value::Opaque(_) => Shape::Opaque,
            _ => Shape::Primitive,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&ArrayRef> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_opaque(&self) -> Option<&OpaqueRef> {
        match self {
            Value::Opaque(o) => Some(o),
            _ => None,
        }
    }

    /// Deep copy into JSON. Opaque values become their type name.
    ///
    /// Cyclic graphs are not supported.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(i) => serde_json::Value::from(*i),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map_or(serde_json::Value::Null, serde_json::Value::Number),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Object(o) => serde_json::Value::Object(
                o.read().iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
            Value::Array(a) => serde_json::Value::Array(a.read().iter().map(Value::to_json).collect()),
            Value::Opaque(o) => serde_json::Value::String(o.type_name().to_owned()),
        }
    }
}

/// Primitives compare by value, containers by identity.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            (Value::Array(a), Value::Array(b)) => a.ptr_eq(b),
            (Value::Opaque(a), Value::Opaque(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("Null"),
            Value::Bool(b) => write!(f, "{b:?}"),
            Value::Int(i) => write!(f, "{i:?}"),
            Value::Float(x) => write!(f, "{x:?}"),
            Value::String(s) => write!(f, "{s:?}"),
            Value::Object(o) => write!(f, "Object@{:#x}", o.addr()),
            Value::Array(a) => write!(f, "Array@{:#x}", a.addr()),
            Value::Opaque(o) => write!(f, "Opaque<{}>", o.type_name()),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<u32> for Value {
    fn from(i: u32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<ObjectRef> for Value {
    fn from(o: ObjectRef) -> Self {
        Value::Object(o)
    }
}

impl From<ArrayRef> for Value {
    fn from(a: ArrayRef) -> Self {
        Value::Array(a)
    }
}

impl From<OpaqueRef> for Value {
    fn from(o: OpaqueRef) -> Self {
        Value::Opaque(o)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => n.as_f64().map_or(Value::Null, Value::Float),
            },
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => Value::array(items),
            serde_json::Value::Object(entries) => Value::object(entries),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn shapes_are_classified() {
        assert_eq!(Value::object([("a", 1)]).shape(), Shape::PlainObject);
        assert_eq!(Value::array([1, 2]).shape(), Shape::Array);
        assert_eq!(Value::opaque(std::time::Duration::from_secs(1)).shape(), Shape::Opaque);
        assert_eq!(Value::from(3).shape(), Shape::Primitive);
        assert_eq!(Value::Null.shape(), Shape::Primitive);
    }

    #[test]
    fn containers_compare_by_identity() {
        let a = Value::object([("x", 1)]);
        let b = Value::object([("x", 1)]);
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
        assert_eq!(Value::from("s"), Value::from("s"));
    }

    #[test]
    fn clones_share_storage() {
        let a = Value::array([1]);
        let b = a.clone();
        b.as_array().unwrap().write().push(Value::from(2));
        assert_eq!(a.as_array().unwrap().read().len(), 2);
    }

    #[test]
    fn json_conversion() {
        let value = Value::from(json!({"a": {"b": [1, 2.5, "x", null, true]}}));
        assert_eq!(value.to_json(), json!({"a": {"b": [1, 2.5, "x", null, true]}}));
    }

    #[test]
    fn opaque_downcasts() {
        let value = Value::opaque(42u8);
        let opaque = value.as_opaque().unwrap();
        assert_eq!(opaque.downcast_ref::<u8>(), Some(&42));
        assert!(opaque.downcast_ref::<u16>().is_none());
        assert_eq!(opaque.type_name(), "u8");
    }
}
