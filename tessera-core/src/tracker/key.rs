//! Dependency keys.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of an entity inside a collection.
///
/// `Int(7)` and `Str("7")` are different ids and address different handles.
/// Pick one representation per collection and use it for both reads and
/// triggers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ItemId {
    Int(i64),
    Str(String),
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemId::Int(id) => write!(f, "{id}"),
            ItemId::Str(id) => f.write_str(id),
        }
    }
}

impl From<i64> for ItemId {
    fn from(id: i64) -> Self {
        ItemId::Int(id)
    }
}

impl From<i32> for ItemId {
    fn from(id: i32) -> Self {
        ItemId::Int(i64::from(id))
    }
}

impl From<u32> for ItemId {
    fn from(id: u32) -> Self {
        ItemId::Int(i64::from(id))
    }
}

impl From<&str> for ItemId {
    fn from(id: &str) -> Self {
        ItemId::Str(id.to_owned())
    }
}

impl From<String> for ItemId {
    fn from(id: String) -> Self {
        ItemId::Str(id)
    }
}

impl From<&ItemId> for ItemId {
    fn from(id: &ItemId) -> Self {
        id.clone()
    }
}

/// Address of one dependency handle in the tracker's table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DepKey<'a> {
    /// Something in the collection changed.
    Collection(&'a str),
    /// One entity changed or was removed.
    Item(&'a str, &'a ItemId),
    /// A field of a singleton changed.
    Prop(&'a str, &'a str),
    /// One field of one entity changed.
    ItemProp(&'a str, &'a ItemId, &'a str),
}

impl<'a> DepKey<'a> {
    pub(crate) fn collection(&self) -> &'a str {
        match *self {
            DepKey::Collection(key)
            | DepKey::Item(key, _)
            | DepKey::Prop(key, _)
            | DepKey::ItemProp(key, _, _) => key,
        }
    }
}

impl fmt::Display for DepKey<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DepKey::Collection(key) => f.write_str(key),
            DepKey::Item(key, id) => write!(f, "{key}[{id}]"),
            DepKey::Prop(key, prop) => write!(f, "{key}.{prop}"),
            DepKey::ItemProp(key, id, prop) => write!(f, "{key}[{id}].{prop}"),
        }
    }
}
