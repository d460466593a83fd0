//! Adapter Bundle
//!
//! Ready-made helpers wired to one adapter: deep reactive [`State`],
//! boxed primitive [`Ref`]s, effects and trackers. Stores that need finer
//! control use [`Tracker`] and [`Scope`] directly.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::adapter::{AdapterRef, Cleanup};
use crate::error::{CallbackError, ScopeError, TrackerError};
use crate::scope::{ArrayProxy, ObjectProxy, Proxy, Scope, Value};
use crate::tracker::{Tracker, TrackerOptions};

/// Collection key used by [`State`] proxies.
pub const STATE_KEY: &str = "state";

/// Collection key used by [`Ref`]s.
pub const REF_KEY: &str = "ref";

/// Property tracked by [`Ref::get`].
pub const REF_PROP: &str = "value";

/// One adapter plus the helpers built on it.
#[derive(Clone, Debug)]
pub struct AdapterBundle {
    options: TrackerOptions,
}

impl AdapterBundle {
    pub fn new(adapter: AdapterRef) -> Self {
        Self::with_options(TrackerOptions::default().with_adapter(adapter))
    }

    /// Bundle whose trackers share `options` (adapter and error handler).
    pub fn with_options(options: TrackerOptions) -> Self {
        Self { options }
    }

    pub fn adapter(&self) -> AdapterRef {
        self.options.resolved_adapter()
    }

    pub fn create_tracker(&self) -> Tracker {
        Tracker::with_options(self.options.clone())
    }

    /// Tracker with custom options, falling back to the bundle's adapter and
    /// error handler for whatever `options` leaves unset.
    pub fn create_tracker_with(&self, mut options: TrackerOptions) -> Tracker {
        if options.adapter.is_none() {
            options.adapter = self.options.adapter.clone();
        }
        if options.error_handler.is_none() {
            options.error_handler = self.options.error_handler.clone();
        }
        Tracker::with_options(options)
    }

    /// Deep reactive state over an object or array.
    pub fn state(&self, value: impl Into<Value>) -> Result<State, ScopeError> {
        let scope = Scope::new(self.create_tracker());
        let proxy = scope.deep_proxy(&value.into(), STATE_KEY)?;
        Ok(State { scope, proxy })
    }

    /// Reactive box around a single value.
    pub fn reference(&self, value: impl Into<Value>) -> Ref {
        Ref {
            tracker: self.create_tracker(),
            value: Arc::new(RwLock::new(value.into())),
        }
    }

    pub fn effect<F>(&self, body: F) -> Result<Cleanup, TrackerError>
    where
        F: FnMut() -> Result<Option<Cleanup>, CallbackError> + Send + 'static,
    {
        self.create_tracker().effect(body)
    }
}

/// Deep reactive state created by [`AdapterBundle::state`].
#[derive(Clone, Debug)]
pub struct State {
    scope: Scope,
    proxy: Proxy,
}

impl State {
    pub fn proxy(&self) -> &Proxy {
        &self.proxy
    }

    pub fn as_object(&self) -> Option<&ObjectProxy> {
        self.proxy.as_object()
    }

    pub fn as_array(&self) -> Option<&ArrayProxy> {
        self.proxy.as_array()
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub fn tracker(&self) -> &Tracker {
        self.scope.tracker()
    }
}

/// Reactive box created by [`AdapterBundle::reference`].
///
/// Primitives cannot be proxied, so they live in a box whose single `value`
/// property is tracked.
#[derive(Clone, Debug)]
pub struct Ref {
    tracker: Tracker,
    value: Arc<RwLock<Value>>,
}

impl Ref {
    pub fn get(&self) -> Value {
        self.tracker.track_prop(REF_KEY, REF_PROP);
        self.value.read().clone()
    }

    pub fn get_untracked(&self) -> Value {
        self.value.read().clone()
    }

    pub fn set(&self, value: impl Into<Value>) {
        *self.value.write() = value.into();
        self.tracker.trigger_prop(REF_KEY, REF_PROP);
    }

    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&Value) -> Value,
    {
        let current = self.value.read().clone();
        self.set(f(&current));
    }
}
