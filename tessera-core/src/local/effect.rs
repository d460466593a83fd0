//! Local Effects
//!
//! An effect is a side-effecting computation that re-runs whenever one of the
//! dependencies it read changes.
//!
//! # How Effects Work
//!
//! 1. When created, the effect runs immediately to establish its initial
//!    dependencies.
//!
//! 2. When a dependency is notified, the effect re-runs synchronously.
//!
//! 3. Before re-running, the effect drops its old dependencies, runs the
//!    cleanup returned by the previous run and any dispose callbacks
//!    registered during it, then collects new dependencies while running.
//!
//! # Re-entrancy
//!
//! A notification reaching an effect that is already running (the body wrote
//! to something it read) does not recurse. The effect is marked pending and
//! runs once more after the current run returns, up to
//! [`MAX_PENDING_RERUNS`] times in a row.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use super::context::ReactiveContext;
use super::dependency::LocalDependency;
use crate::adapter::{Cleanup, DisposeCallback, EffectBody};

/// Consecutive self-triggered re-runs allowed before giving up.
pub const MAX_PENDING_RERUNS: usize = 100;

/// Unique identifier for an effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EffectId(u64);

impl EffectId {
    fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

pub(crate) struct EffectInner {
    id: EffectId,

    /// The effect function.
    body: Mutex<EffectBody>,

    /// Cleanup returned by the last run.
    cleanup: Mutex<Option<Cleanup>>,

    /// Callbacks registered through `on_dispose` during the last run.
    disposers: Mutex<Vec<DisposeCallback>>,

    /// Dependencies read during the last run.
    sources: Mutex<Vec<Weak<LocalDependency>>>,

    disposed: AtomicBool,
    running: AtomicBool,
    pending: AtomicBool,
    run_count: AtomicUsize,
}

impl EffectInner {
    fn new(body: EffectBody) -> Arc<Self> {
        Arc::new(Self {
            id: EffectId::new(),
            body: Mutex::new(body),
            cleanup: Mutex::new(None),
            disposers: Mutex::new(Vec::new()),
            sources: Mutex::new(Vec::new()),
            disposed: AtomicBool::new(false),
            running: AtomicBool::new(false),
            pending: AtomicBool::new(false),
            run_count: AtomicUsize::new(0),
        })
    }

    /// An effect with an empty body that never runs on its own.
    #[cfg(test)]
    pub(crate) fn detached() -> Arc<Self> {
        Self::new(Box::new(|| None))
    }

    pub(crate) fn id(&self) -> EffectId {
        self.id
    }

    pub(crate) fn add_source(&self, dependency: Weak<LocalDependency>) {
        self.sources.lock().push(dependency);
    }

    pub(crate) fn add_disposer(&self, callback: DisposeCallback) {
        self.disposers.lock().push(callback);
    }

    pub(crate) fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    /// Run the body inside a reactive context.
    pub(crate) fn execute(self: &Arc<Self>) {
        if self.is_disposed() {
            return;
        }
        if self.running.swap(true, Ordering::SeqCst) {
            self.pending.store(true, Ordering::SeqCst);
            return;
        }

        let mut reruns = 0;
        loop {
            self.pending.store(false, Ordering::SeqCst);
            self.teardown_run();

            let cleanup = {
                let _ctx = ReactiveContext::enter(self.clone());
                let mut body = self.body.lock();
                (*body)()
            };
            *self.cleanup.lock() = cleanup;
            self.run_count.fetch_add(1, Ordering::SeqCst);

            // Disposed from inside the body: dispose() already tore down, so
            // whatever this run left behind is released here.
            if self.is_disposed() {
                self.teardown_run();
                break;
            }
            if !self.pending.load(Ordering::SeqCst) {
                break;
            }
            reruns += 1;
            if reruns >= MAX_PENDING_RERUNS {
                tracing::warn!(effect = ?self.id, reruns, "effect keeps re-triggering itself, stopping");
                break;
            }
        }

        self.running.store(false, Ordering::SeqCst);
    }

    /// Drop subscriptions and run cleanups left by the previous run.
    fn teardown_run(&self) {
        let sources = std::mem::take(&mut *self.sources.lock());
        for source in sources.iter().filter_map(Weak::upgrade) {
            source.unsubscribe(self.id);
        }

        let cleanup = self.cleanup.lock().take();
        if let Some(cleanup) = cleanup {
            cleanup();
        }

        let disposers = std::mem::take(&mut *self.disposers.lock());
        for disposer in disposers {
            disposer();
        }
    }

    pub(crate) fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.teardown_run();
    }
}

impl Drop for EffectInner {
    /// Last handle gone without a dispose: nothing can re-run the effect, so
    /// release its cleanups now.
    fn drop(&mut self) {
        if !self.is_disposed() {
            self.teardown_run();
        }
    }
}

/// A synchronous effect of the local runtime.
///
/// Cloning yields another handle to the same effect.
///
/// # Example
///
/// ```rust,ignore
/// let effect = LocalEffect::new(move || {
///     println!("score: {:?}", player.get("score"));
///     None
/// });
/// ```
#[derive(Clone)]
pub struct LocalEffect {
    inner: Arc<EffectInner>,
}

impl LocalEffect {
    /// Create an effect and run it immediately.
    pub fn new<F>(body: F) -> Self
    where
        F: FnMut() -> Option<Cleanup> + Send + 'static,
    {
        let effect = Self::new_lazy(body);
        effect.execute();
        effect
    }

    /// Create an effect without running it.
    pub fn new_lazy<F>(body: F) -> Self
    where
        F: FnMut() -> Option<Cleanup> + Send + 'static,
    {
        Self {
            inner: EffectInner::new(Box::new(body)),
        }
    }

    pub fn id(&self) -> EffectId {
        self.inner.id
    }

    pub fn execute(&self) {
        self.inner.execute();
    }

    /// Stop the effect and run its cleanups. It will not run again.
    pub fn dispose(&self) {
        self.inner.dispose();
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.is_disposed()
    }

    /// Number of completed runs.
    pub fn run_count(&self) -> usize {
        self.inner.run_count.load(Ordering::SeqCst)
    }

    /// Number of live dependencies read during the last run.
    pub fn dependency_count(&self) -> usize {
        self.inner
            .sources
            .lock()
            .iter()
            .filter(|source| source.strong_count() > 0)
            .count()
    }
}

impl std::fmt::Debug for LocalEffect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalEffect")
            .field("id", &self.id())
            .field("run_count", &self.run_count())
            .field("dependency_count", &self.dependency_count())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
