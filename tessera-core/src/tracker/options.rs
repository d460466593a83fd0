//! Tracker configuration.

use std::sync::Arc;

use crate::adapter::{AdapterRef, NoopAdapter};
use crate::error::{CallbackError, ErrorContext};

/// Receives failures from listeners and effect bodies.
pub type ErrorHandler = Arc<dyn Fn(&CallbackError, ErrorContext) + Send + Sync>;

/// Options for [`Tracker::with_options`](super::Tracker::with_options).
///
/// ```rust,ignore
/// let tracker = Tracker::with_options(
///     TrackerOptions::default()
///         .with_adapter(adapter)
///         .with_error_handler(|err, ctx| eprintln!("{ctx}: {err}")),
/// );
/// ```
#[derive(Clone, Default)]
pub struct TrackerOptions {
    /// Runtime to report to. `None` means the inert [`NoopAdapter`].
    pub adapter: Option<AdapterRef>,

    /// Failure sink for callbacks. `None` logs through `tracing`.
    pub error_handler: Option<ErrorHandler>,
}

impl TrackerOptions {
    pub fn with_adapter(mut self, adapter: AdapterRef) -> Self {
        self.adapter = Some(adapter);
        self
    }

    pub fn with_error_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&CallbackError, ErrorContext) + Send + Sync + 'static,
    {
        self.error_handler = Some(Arc::new(handler));
        self
    }

    pub(crate) fn resolved_adapter(&self) -> AdapterRef {
        self.adapter
            .clone()
            .unwrap_or_else(|| Arc::new(NoopAdapter))
    }
}

impl std::fmt::Debug for TrackerOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackerOptions")
            .field("adapter", &self.adapter.is_some())
            .field("error_handler", &self.error_handler.is_some())
            .finish()
    }
}

/// Route a callback failure to the handler, or log it.
pub(crate) fn report(handler: Option<&ErrorHandler>, err: &CallbackError, context: ErrorContext) {
    match handler {
        Some(handler) => handler(err, context),
        None => tracing::error!(%context, error = %err, "tracker callback failed"),
    }
}
