//! Reactivity Adapters
//!
//! An adapter is the only thing the tracking core knows about the reactive
//! runtime it reports to. The runtime hands out [`Dependency`] handles and,
//! optionally, exposes a few extra capabilities:
//!
//! - [`ScopeProbe`]: "is a reactive computation collecting reads right now?"
//! - [`DisposeHook`]: "run this when the current computation goes away"
//! - [`EffectRunner`]: "run this function as a reactive computation"
//!
//! # Capabilities
//!
//! Optional capabilities are exposed through accessors returning
//! `Option<&dyn Capability>`. An adapter that does not override an accessor
//! simply does not have the capability, and callers check for it explicitly
//! instead of probing:
//!
//! ```rust,ignore
//! if let Some(probe) = adapter.scope_probe() {
//!     probe.is_in_scope()
//! }
//! ```
//!
//! Missing capabilities have well defined fallbacks: a missing scope probe
//! means "always in scope", a missing dispose hook means "nothing to clean
//! up", and a missing effect runner makes `Tracker::effect` fail with
//! [`TrackerError::EffectUnsupported`](crate::error::TrackerError).

mod func;
mod multi;

use std::sync::Arc;

pub use func::{FnAdapter, FnAdapterBuilder};
pub use multi::{multi_adapter, CompositeDependency, MultiAdapter};

/// A single trackable unit supplied by a reactive runtime.
pub trait Dependency: Send + Sync {
    /// Register the currently running computation as interested in this unit.
    fn depend(&self);

    /// Wake every computation registered through [`depend`](Self::depend).
    fn notify(&self);

    /// Downcast hook used by [`MultiAdapter`] to recognise its own handles.
    fn as_composite(&self) -> Option<&CompositeDependency> {
        None
    }
}

/// Shared handle to a dependency.
pub type DependencyRef = Arc<dyn Dependency>;

/// Shared handle to an adapter.
pub type AdapterRef = Arc<dyn ReactivityAdapter>;

/// Cleanup returned from effect bodies and from [`EffectRunner::effect`].
pub type Cleanup = Box<dyn FnOnce() + Send>;

/// Callback registered through [`DisposeHook::on_dispose`].
///
/// Shared rather than boxed because a multi-adapter forwards the same
/// callback to every member runtime.
pub type DisposeCallback = Arc<dyn Fn() + Send + Sync>;

/// Body of an effect run by an [`EffectRunner`].
pub type EffectBody = Box<dyn FnMut() -> Option<Cleanup> + Send>;

/// Reports whether a reactive computation is currently collecting reads.
pub trait ScopeProbe {
    fn is_in_scope(&self) -> bool;
}

/// Attaches cleanup work to the lifetime of the current computation.
pub trait DisposeHook {
    fn on_dispose(&self, callback: DisposeCallback, dependency: &DependencyRef);
}

/// Runs a function as a reactive computation of the host runtime.
pub trait EffectRunner {
    /// Start `body` as an effect. The returned cleanup stops it.
    fn effect(&self, body: EffectBody) -> Cleanup;
}

/// Binding between the tracking core and one reactive runtime.
pub trait ReactivityAdapter: Send + Sync {
    /// Create a fresh dependency handle.
    fn create(&self) -> DependencyRef;

    fn scope_probe(&self) -> Option<&dyn ScopeProbe> {
        None
    }

    fn dispose_hook(&self) -> Option<&dyn DisposeHook> {
        None
    }

    fn effect_runner(&self) -> Option<&dyn EffectRunner> {
        None
    }
}

impl<A: ReactivityAdapter + ?Sized> ReactivityAdapter for Arc<A> {
    fn create(&self) -> DependencyRef {
        (**self).create()
    }

    fn scope_probe(&self) -> Option<&dyn ScopeProbe> {
        (**self).scope_probe()
    }

    fn dispose_hook(&self) -> Option<&dyn DisposeHook> {
        (**self).dispose_hook()
    }

    fn effect_runner(&self) -> Option<&dyn EffectRunner> {
        (**self).effect_runner()
    }
}

/// Scope check with the optimistic default: no probe means "in scope".
pub fn in_scope(adapter: &dyn ReactivityAdapter) -> bool {
    adapter
        .scope_probe()
        .map_or(true, |probe| probe.is_in_scope())
}

/// Forward a dispose registration if the adapter supports it.
pub fn on_dispose(adapter: &dyn ReactivityAdapter, callback: DisposeCallback, dependency: &DependencyRef) {
    if let Some(hook) = adapter.dispose_hook() {
        hook.on_dispose(callback, dependency);
    }
}

// ----------------------------------------------------------------------------
// Noop Adapter
// ----------------------------------------------------------------------------

/// Dependency that does nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopDependency;

impl Dependency for NoopDependency {
    fn depend(&self) {}

    fn notify(&self) {}
}

/// Inert adapter used when a tracker is built without one.
///
/// It never reports an active scope, so tracking calls are free. Handles
/// obtained through the explicit `*_dep` accessors still exist and keep their
/// identity, which is enough to unit test store logic without a runtime.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopAdapter;

impl ReactivityAdapter for NoopAdapter {
    fn create(&self) -> DependencyRef {
        Arc::new(NoopDependency)
    }

    fn scope_probe(&self) -> Option<&dyn ScopeProbe> {
        Some(self)
    }
}

impl ScopeProbe for NoopAdapter {
    fn is_in_scope(&self) -> bool {
        false
    }
}
