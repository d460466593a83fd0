//! Multi-Adapter
//!
//! Lets several reactive runtimes observe the same store at once. A
//! [`MultiAdapter`] is itself a [`ReactivityAdapter`]: every handle it creates
//! is a [`CompositeDependency`] holding one handle per member runtime, so the
//! tracker and the proxy engine drive all runtimes without knowing there is
//! more than one.

use std::sync::atomic::{AtomicU64, Ordering};

use smallvec::SmallVec;

use super::{
    in_scope, on_dispose, AdapterRef, Dependency, DependencyRef, DisposeCallback, DisposeHook,
    ReactivityAdapter, ScopeProbe,
};
use crate::error::MultiAdapterError;

/// Counter for telling multi-adapters apart.
static MULTI_ADAPTER_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

fn next_multi_adapter_id() -> u64 {
    MULTI_ADAPTER_ID_COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// A dependency that fans out to one handle per member runtime.
///
/// The sub-handles are owned by their runtimes; the composite only keeps
/// references to them, in the same order as the adapters that created them.
pub struct CompositeDependency {
    /// Id of the multi-adapter that produced this composite.
    origin: u64,

    /// One handle per adapter, inline for the usual one or two runtimes.
    dependencies: SmallVec<[DependencyRef; 2]>,
}

impl CompositeDependency {
    /// The underlying handles, in adapter order.
    pub fn dependencies(&self) -> &[DependencyRef] {
        &self.dependencies
    }

    pub fn len(&self) -> usize {
        self.dependencies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dependencies.is_empty()
    }
}

impl Dependency for CompositeDependency {
    fn depend(&self) {
        for dependency in &self.dependencies {
            dependency.depend();
        }
    }

    fn notify(&self) {
        for dependency in &self.dependencies {
            dependency.notify();
        }
    }

    fn as_composite(&self) -> Option<&CompositeDependency> {
        Some(self)
    }
}

impl std::fmt::Debug for CompositeDependency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompositeDependency")
            .field("origin", &self.origin)
            .field("len", &self.dependencies.len())
            .finish()
    }
}

/// Several adapters presented as one.
pub struct MultiAdapter {
    id: u64,
    adapters: Vec<AdapterRef>,
}

impl MultiAdapter {
    /// Wrap a non-empty list of adapters.
    pub fn new<I>(adapters: I) -> Result<Self, MultiAdapterError>
    where
        I: IntoIterator<Item = AdapterRef>,
    {
        let adapters: Vec<AdapterRef> = adapters.into_iter().collect();
        if adapters.is_empty() {
            return Err(MultiAdapterError::Empty);
        }

        Ok(Self {
            id: next_multi_adapter_id(),
            adapters,
        })
    }

    /// The wrapped adapters, in fan-out order.
    pub fn adapters(&self) -> &[AdapterRef] {
        &self.adapters
    }

    /// Whether `composite` was created by this multi-adapter.
    fn owns(&self, composite: &CompositeDependency) -> bool {
        composite.origin == self.id && composite.len() == self.adapters.len()
    }
}

impl ReactivityAdapter for MultiAdapter {
    fn create(&self) -> DependencyRef {
        let dependencies = self.adapters.iter().map(|adapter| adapter.create()).collect();
        std::sync::Arc::new(CompositeDependency {
            origin: self.id,
            dependencies,
        })
    }

    fn scope_probe(&self) -> Option<&dyn ScopeProbe> {
        Some(self)
    }

    fn dispose_hook(&self) -> Option<&dyn DisposeHook> {
        Some(self)
    }
}

impl ScopeProbe for MultiAdapter {
    fn is_in_scope(&self) -> bool {
        self.adapters.iter().any(|adapter| in_scope(adapter.as_ref()))
    }
}

impl DisposeHook for MultiAdapter {
    fn on_dispose(&self, callback: DisposeCallback, dependency: &DependencyRef) {
        let Some(composite) = dependency.as_composite() else {
            return;
        };
        if !self.owns(composite) {
            tracing::warn!(
                multi_adapter = self.id,
                origin = composite.origin,
                "on_dispose called with a composite from another multi-adapter, ignoring"
            );
            return;
        }

        tracing::debug!(multi_adapter = self.id, "forwarding dispose callback");
        for (adapter, sub) in self.adapters.iter().zip(composite.dependencies()) {
            on_dispose(adapter.as_ref(), callback.clone(), sub);
        }
    }
}

impl std::fmt::Debug for MultiAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MultiAdapter")
            .field("id", &self.id)
            .field("adapters", &self.adapters.len())
            .finish()
    }
}

/// Free-function form of [`MultiAdapter::new`].
///
/// ```rust,ignore
/// let adapter = multi_adapter([solid_adapter, vue_adapter])?;
/// ```
pub fn multi_adapter<I>(adapters: I) -> Result<MultiAdapter, MultiAdapterError>
where
    I: IntoIterator<Item = AdapterRef>,
{
    MultiAdapter::new(adapters)
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
