//! Local Runtime
//!
//! A small synchronous reactive runtime that implements every adapter
//! capability. It is what the crate's own tests run against, and it is enough
//! for embedders that only ever have one runtime in the process.
//!
//! - [`LocalDependency`]: remembers which effects read it and re-runs them
//!   when notified
//! - [`LocalEffect`]: runs a body inside a tracking context
//! - [`LocalRuntime`]: the adapter tying both to a tracker
//!
//! Effects re-run synchronously inside `notify()`. There is no batching and no
//! scheduling queue.

mod context;
mod dependency;
mod effect;

pub use dependency::LocalDependency;
pub use effect::{EffectId, LocalEffect, MAX_PENDING_RERUNS};

use self::context::ReactiveContext;
use crate::adapter::{
    Cleanup, DependencyRef, DisposeCallback, DisposeHook, EffectBody, EffectRunner,
    ReactivityAdapter, ScopeProbe,
};

/// Adapter for the local runtime.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalRuntime;

impl LocalRuntime {
    pub fn new() -> Self {
        Self
    }

    /// Whether a local effect is running on this thread.
    pub fn is_tracking() -> bool {
        ReactiveContext::is_active()
    }
}

impl ReactivityAdapter for LocalRuntime {
    fn create(&self) -> DependencyRef {
        LocalDependency::new()
    }

    fn scope_probe(&self) -> Option<&dyn ScopeProbe> {
        Some(self)
    }

    fn dispose_hook(&self) -> Option<&dyn DisposeHook> {
        Some(self)
    }

    fn effect_runner(&self) -> Option<&dyn EffectRunner> {
        Some(self)
    }
}

impl ScopeProbe for LocalRuntime {
    fn is_in_scope(&self) -> bool {
        ReactiveContext::is_active()
    }
}

impl DisposeHook for LocalRuntime {
    /// Attach `callback` to the running effect. Outside an effect there is
    /// nothing to attach to and the callback is dropped.
    fn on_dispose(&self, callback: DisposeCallback, _dependency: &DependencyRef) {
        match ReactiveContext::current() {
            Some(effect) => effect.add_disposer(callback),
            None => tracing::trace!("on_dispose outside an effect, ignoring"),
        }
    }
}

impl EffectRunner for LocalRuntime {
    /// The effect keeps running while its dependencies are alive, whether or
    /// not the returned cleanup is kept. Calling the cleanup stops it.
    fn effect(&self, body: EffectBody) -> Cleanup {
        let effect = LocalEffect::new(body);
        Box::new(move || effect.dispose())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::on_dispose;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn scope_follows_running_effects() {
        assert!(!LocalRuntime.is_in_scope());

        let seen = Arc::new(AtomicUsize::new(0));
        let seen_clone = seen.clone();
        let _effect = LocalEffect::new(move || {
            if LocalRuntime::is_tracking() {
                seen_clone.fetch_add(1, Ordering::SeqCst);
            }
            None
        });

        assert_eq!(seen.load(Ordering::SeqCst), 1);
        assert!(!LocalRuntime.is_in_scope());
    }

    #[test]
    fn effect_cleanup_disposes() {
        let runtime = LocalRuntime::new();
        let dep = runtime.create();
        let runs = Arc::new(AtomicUsize::new(0));

        let dep_clone = dep.clone();
        let runs_clone = runs.clone();
        let stop = runtime.effect(Box::new(move || {
            dep_clone.depend();
            runs_clone.fetch_add(1, Ordering::SeqCst);
            None
        }));

        dep.notify();
        assert_eq!(runs.load(Ordering::SeqCst), 2);

        stop();
        dep.notify();
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn effect_survives_a_dropped_cleanup() {
        let runtime = LocalRuntime::new();
        let dep = runtime.create();
        let runs = Arc::new(AtomicUsize::new(0));
        let cleaned = Arc::new(AtomicUsize::new(0));

        let dep_clone = dep.clone();
        let runs_clone = runs.clone();
        let cleaned_clone = cleaned.clone();
        drop(runtime.effect(Box::new(move || {
            dep_clone.depend();
            runs_clone.fetch_add(1, Ordering::SeqCst);
            let cleaned = cleaned_clone.clone();
            Some(Box::new(move || {
                cleaned.fetch_add(1, Ordering::SeqCst);
            }) as Cleanup)
        })));

        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(cleaned.load(Ordering::SeqCst), 0);

        dep.notify();
        assert_eq!(runs.load(Ordering::SeqCst), 2);
        assert_eq!(cleaned.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn dispose_callbacks_run_before_rerun() {
        let runtime = LocalRuntime::new();
        let dep = runtime.create();
        let disposed = Arc::new(AtomicUsize::new(0));

        let dep_clone = dep.clone();
        let disposed_clone = disposed.clone();
        let effect = LocalEffect::new(move || {
            dep_clone.depend();
            let disposed = disposed_clone.clone();
            on_dispose(
                &LocalRuntime,
                Arc::new(move || {
                    disposed.fetch_add(1, Ordering::SeqCst);
                }),
                &dep_clone,
            );
            None
        });

        assert_eq!(disposed.load(Ordering::SeqCst), 0);
        dep.notify();
        assert_eq!(disposed.load(Ordering::SeqCst), 1);
        effect.dispose();
        assert_eq!(disposed.load(Ordering::SeqCst), 2);
    }
}
