//! Local dependency handles.

use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use parking_lot::Mutex;

use super::context::ReactiveContext;
use super::effect::{EffectId, EffectInner};
use crate::adapter::Dependency;

/// Dependency handle of the local runtime.
///
/// `depend()` subscribes the running effect; `notify()` re-runs every
/// subscribed effect synchronously, in subscription order.
///
/// Subscriptions are strong: an effect stays alive while anything it read
/// can still notify it, until it is disposed.
pub struct LocalDependency {
    this: Weak<LocalDependency>,
    subscribers: Mutex<IndexMap<EffectId, Arc<EffectInner>>>,
}

impl LocalDependency {
    pub fn new() -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            this: this.clone(),
            subscribers: Mutex::new(IndexMap::new()),
        })
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }

    pub(crate) fn unsubscribe(&self, effect: EffectId) {
        // Dropped after the lock is released; it may be the last handle.
        let removed = self.subscribers.lock().shift_remove(&effect);
        drop(removed);
    }
}

impl Dependency for LocalDependency {
    fn depend(&self) {
        let Some(effect) = ReactiveContext::current() else {
            return;
        };
        let inserted = self
            .subscribers
            .lock()
            .insert(effect.id(), effect.clone())
            .is_none();
        if inserted {
            effect.add_source(self.this.clone());
        }
    }

    fn notify(&self) {
        // Snapshot so effects can subscribe and unsubscribe while we iterate.
        let effects: Vec<Arc<EffectInner>> = self
            .subscribers
            .lock()
            .values()
            .cloned()
            .collect();

        for effect in effects {
            if !effect.is_disposed() {
                effect.execute();
            }
        }
    }
}

impl std::fmt::Debug for LocalDependency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalDependency")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::local::LocalEffect;

    #[test]
    fn depend_outside_an_effect_does_nothing() {
        let dep = LocalDependency::new();
        dep.depend();
        assert_eq!(dep.subscriber_count(), 0);
        dep.notify();
    }

    #[test]
    fn repeated_reads_subscribe_once() {
        let dep = LocalDependency::new();
        let dep_clone = dep.clone();
        let effect = LocalEffect::new(move || {
            dep_clone.depend();
            dep_clone.depend();
            None
        });

        assert_eq!(dep.subscriber_count(), 1);
        assert_eq!(effect.dependency_count(), 1);

        effect.dispose();
        assert_eq!(dep.subscriber_count(), 0);
    }
}
