//! Error Types
//!
//! Every fallible operation in the crate returns one of the enums below.
//! Configuration errors surface at construction time, capability errors at
//! call time. Failures inside user callbacks (listeners, effect bodies) are
//! carried as [`CallbackError`] and routed to the tracker's error handler.

use thiserror::Error;

use crate::tracker::EventKind;

/// Error returned by user callbacks (event listeners, effect bodies).
pub type CallbackError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors raised while assembling an adapter.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AdapterError {
    /// The adapter has no way to create dependency handles.
    #[error("adapter is missing the required `create` capability")]
    MissingCreate,
}

/// Errors raised while building a [`MultiAdapter`](crate::adapter::MultiAdapter).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MultiAdapterError {
    /// A multi-adapter needs at least one member.
    #[error("multi-adapter requires a non-empty list of adapters")]
    Empty,
}

/// Errors raised by tracker convenience operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TrackerError {
    /// The configured adapter has no effect runner.
    ///
    /// Callers can fall back to [`Tracker::on`](crate::tracker::Tracker::on).
    #[error("the configured adapter does not support effects")]
    EffectUnsupported,
}

/// Errors raised by the proxy engine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ScopeError {
    /// Only objects and arrays can be wrapped; primitives must be boxed.
    #[error("cannot proxy a {shape} value, only objects and arrays")]
    NotProxyable { shape: &'static str },
}

/// Where a callback failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorContext {
    /// An event listener subscribed through `Tracker::on` failed.
    Listener(EventKind),
    /// An effect body registered through `Tracker::effect` failed.
    Effect,
}

impl std::fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorContext::Listener(kind) => write!(f, "listener for {kind:?}"),
            ErrorContext::Effect => f.write_str("effect"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_are_readable() {
        assert_eq!(
            MultiAdapterError::Empty.to_string(),
            "multi-adapter requires a non-empty list of adapters"
        );
        assert_eq!(
            ScopeError::NotProxyable { shape: "primitive" }.to_string(),
            "cannot proxy a primitive value, only objects and arrays"
        );
        assert_eq!(
            ErrorContext::Listener(EventKind::ItemAdded).to_string(),
            "listener for ItemAdded"
        );
    }
}
