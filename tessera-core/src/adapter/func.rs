//! Closure-based adapter.
//!
//! Handy when a runtime's primitives are plain functions rather than a type
//! that can implement [`ReactivityAdapter`] directly.

use std::fmt;

use super::{
    Cleanup, DependencyRef, DisposeCallback, DisposeHook, EffectBody, EffectRunner,
    ReactivityAdapter, ScopeProbe,
};
use crate::error::AdapterError;

type CreateFn = Box<dyn Fn() -> DependencyRef + Send + Sync>;
type InScopeFn = Box<dyn Fn() -> bool + Send + Sync>;
type OnDisposeFn = Box<dyn Fn(DisposeCallback, &DependencyRef) + Send + Sync>;
type EffectFn = Box<dyn Fn(EffectBody) -> Cleanup + Send + Sync>;

/// Adapter assembled from closures.
///
/// # Example
///
/// ```rust,ignore
/// let adapter = FnAdapter::builder()
///     .create(|| runtime.new_dependency())
///     .in_scope(|| runtime.is_tracking())
///     .build()?;
/// ```
pub struct FnAdapter {
    create: CreateFn,
    in_scope: Option<InScopeFn>,
    on_dispose: Option<OnDisposeFn>,
    effect: Option<EffectFn>,
}

impl FnAdapter {
    pub fn builder() -> FnAdapterBuilder {
        FnAdapterBuilder::default()
    }
}

impl ReactivityAdapter for FnAdapter {
    fn create(&self) -> DependencyRef {
        (self.create)()
    }

    fn scope_probe(&self) -> Option<&dyn ScopeProbe> {
        self.in_scope.as_ref().map(|_| self as &dyn ScopeProbe)
    }

    fn dispose_hook(&self) -> Option<&dyn DisposeHook> {
        self.on_dispose.as_ref().map(|_| self as &dyn DisposeHook)
    }

    fn effect_runner(&self) -> Option<&dyn EffectRunner> {
        self.effect.as_ref().map(|_| self as &dyn EffectRunner)
    }
}

impl ScopeProbe for FnAdapter {
    fn is_in_scope(&self) -> bool {
        self.in_scope.as_ref().map_or(true, |f| f())
    }
}

impl DisposeHook for FnAdapter {
    fn on_dispose(&self, callback: DisposeCallback, dependency: &DependencyRef) {
        if let Some(f) = &self.on_dispose {
            f(callback, dependency);
        }
    }
}

impl EffectRunner for FnAdapter {
    fn effect(&self, body: EffectBody) -> Cleanup {
        match &self.effect {
            Some(f) => f(body),
            None => Box::new(|| {}),
        }
    }
}

impl fmt::Debug for FnAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnAdapter")
            .field("in_scope", &self.in_scope.is_some())
            .field("on_dispose", &self.on_dispose.is_some())
            .field("effect", &self.effect.is_some())
            .finish()
    }
}

/// Builder for [`FnAdapter`]. Only `create` is mandatory.
#[derive(Default)]
pub struct FnAdapterBuilder {
    create: Option<CreateFn>,
    in_scope: Option<InScopeFn>,
    on_dispose: Option<OnDisposeFn>,
    effect: Option<EffectFn>,
}

impl FnAdapterBuilder {
    pub fn create<F>(mut self, f: F) -> Self
    where
        F: Fn() -> DependencyRef + Send + Sync + 'static,
    {
        self.create = Some(Box::new(f));
        self
    }

    pub fn in_scope<F>(mut self, f: F) -> Self
    where
        F: Fn() -> bool + Send + Sync + 'static,
    {
        self.in_scope = Some(Box::new(f));
        self
    }

    pub fn on_dispose<F>(mut self, f: F) -> Self
    where
        F: Fn(DisposeCallback, &DependencyRef) + Send + Sync + 'static,
    {
        self.on_dispose = Some(Box::new(f));
        self
    }

    pub fn effect<F>(mut self, f: F) -> Self
    where
        F: Fn(EffectBody) -> Cleanup + Send + Sync + 'static,
    {
        self.effect = Some(Box::new(f));
        self
    }

    /// Finish the adapter. Fails when no `create` closure was supplied.
    pub fn build(self) -> Result<FnAdapter, AdapterError> {
        let create = self.create.ok_or(AdapterError::MissingCreate)?;
        Ok(FnAdapter {
            create,
            in_scope: self.in_scope,
            on_dispose: self.on_dispose,
            effect: self.effect,
        })
    }
}
