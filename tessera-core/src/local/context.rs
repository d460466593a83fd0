//! Reactive Context
//!
//! Tracks which local effect is currently running, so that a dependency read
//! during the run can register that effect as a subscriber.
//!
//! # Implementation
//!
//! We use a thread-local stack. Running an effect pushes it; the guard pops it
//! again when dropped, which keeps the stack balanced even if the effect body
//! panics. Nested effects (an effect created inside another) simply stack.

use std::cell::RefCell;
use std::sync::Arc;

use super::effect::{EffectId, EffectInner};

thread_local! {
    static CONTEXT_STACK: RefCell<Vec<Arc<EffectInner>>> = const { RefCell::new(Vec::new()) };
}

/// Guard that pops the context when dropped.
pub(crate) struct ReactiveContext {
    effect_id: EffectId,
}

impl ReactiveContext {
    /// Make `effect` the current computation until the guard is dropped.
    pub(crate) fn enter(effect: Arc<EffectInner>) -> Self {
        let effect_id = effect.id();
        CONTEXT_STACK.with(|stack| stack.borrow_mut().push(effect));
        Self { effect_id }
    }

    /// Check if any effect is running on this thread.
    pub(crate) fn is_active() -> bool {
        CONTEXT_STACK.with(|stack| !stack.borrow().is_empty())
    }

    /// The innermost running effect, if any.
    pub(crate) fn current() -> Option<Arc<EffectInner>> {
        CONTEXT_STACK.with(|stack| stack.borrow().last().cloned())
    }
}

impl Drop for ReactiveContext {
    fn drop(&mut self) {
        CONTEXT_STACK.with(|stack| {
            let popped = stack.borrow_mut().pop();

            // Catch mismatched enter/exit pairs in debug builds.
            if let Some(effect) = popped {
                debug_assert_eq!(
                    effect.id(),
                    self.effect_id,
                    "ReactiveContext mismatch: expected {:?}, got {:?}",
                    self.effect_id,
                    effect.id()
                );
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_tracks_effect() {
        let effect = EffectInner::detached();

        assert!(!ReactiveContext::is_active());
        assert!(ReactiveContext::current().is_none());

        {
            let _ctx = ReactiveContext::enter(effect.clone());
            assert!(ReactiveContext::is_active());
            assert_eq!(ReactiveContext::current().map(|e| e.id()), Some(effect.id()));
        }

        assert!(!ReactiveContext::is_active());
        assert!(ReactiveContext::current().is_none());
    }

    #[test]
    fn nested_contexts() {
        let outer = EffectInner::detached();
        let inner = EffectInner::detached();

        {
            let _outer = ReactiveContext::enter(outer.clone());
            {
                let _inner = ReactiveContext::enter(inner.clone());
                assert_eq!(ReactiveContext::current().map(|e| e.id()), Some(inner.id()));
            }
            assert_eq!(ReactiveContext::current().map(|e| e.id()), Some(outer.id()));
        }

        assert!(ReactiveContext::current().is_none());
    }
}
