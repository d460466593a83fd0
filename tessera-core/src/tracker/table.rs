//! Dependency Table
//!
//! Storage for the tracker's dependency handles. Handles are grouped per
//! collection, and item handles are grouped per item, so releasing an item
//! drops its item handle and all of its property handles in one step while
//! leaving the rest of the collection alone.

use indexmap::IndexMap;

use super::key::{DepKey, ItemId};
use crate::adapter::DependencyRef;

#[derive(Default)]
struct ItemDeps {
    item: Option<DependencyRef>,
    props: IndexMap<String, DependencyRef>,
}

impl ItemDeps {
    fn len(&self) -> usize {
        usize::from(self.item.is_some()) + self.props.len()
    }
}

#[derive(Default)]
struct CollectionDeps {
    collection: Option<DependencyRef>,
    props: IndexMap<String, DependencyRef>,
    items: IndexMap<ItemId, ItemDeps>,
}

impl CollectionDeps {
    fn len(&self) -> usize {
        usize::from(self.collection.is_some())
            + self.props.len()
            + self.items.values().map(ItemDeps::len).sum::<usize>()
    }
}

/// All handles owned by one tracker.
#[derive(Default)]
pub(crate) struct DepTable {
    collections: IndexMap<String, CollectionDeps>,
}

impl DepTable {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Look up a handle without creating it.
    pub(crate) fn get(&self, key: DepKey<'_>) -> Option<DependencyRef> {
        let collection = self.collections.get(key.collection())?;
        match key {
            DepKey::Collection(_) => collection.collection.clone(),
            DepKey::Prop(_, prop) => collection.props.get(prop).cloned(),
            DepKey::Item(_, id) => collection.items.get(id)?.item.clone(),
            DepKey::ItemProp(_, id, prop) => collection.items.get(id)?.props.get(prop).cloned(),
        }
    }

    /// Store `dependency` under `key` unless a handle is already there.
    ///
    /// Returns whichever handle ends up in the table.
    pub(crate) fn insert_if_absent(&mut self, key: DepKey<'_>, dependency: DependencyRef) -> DependencyRef {
        let collection = self
            .collections
            .entry(key.collection().to_owned())
            .or_default();

        let slot = match key {
            DepKey::Collection(_) => return collection.collection.get_or_insert(dependency).clone(),
            DepKey::Prop(_, prop) => collection.props.entry(prop.to_owned()),
            DepKey::Item(_, id) => {
                let item = collection.items.entry(id.clone()).or_default();
                return item.item.get_or_insert(dependency).clone();
            }
            DepKey::ItemProp(_, id, prop) => collection
                .items
                .entry(id.clone())
                .or_default()
                .props
                .entry(prop.to_owned()),
        };
        slot.or_insert(dependency).clone()
    }

    /// Drop every handle scoped to one item. Returns how many were dropped.
    pub(crate) fn release_item(&mut self, key: &str, id: &ItemId) -> usize {
        self.collections
            .get_mut(key)
            .and_then(|collection| collection.items.shift_remove(id))
            .map_or(0, |item| item.len())
    }

    pub(crate) fn clear(&mut self) {
        self.collections.clear();
    }

    /// Total number of live handles.
    pub(crate) fn len(&self) -> usize {
        self.collections.values().map(CollectionDeps::len).sum()
    }
}
