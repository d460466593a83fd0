//! Tessera Core
//!
//! Granular dependency tracking for collection-oriented stores, independent of
//! any particular reactive framework. A store describes what it reads and
//! writes in terms of keys; a [`ReactivityAdapter`] supplied by the host
//! framework turns those keys into its own dependency handles.
//!
//! It implements:
//!
//! - A keyed [`Tracker`] (collection, item, property, item property)
//! - Identity-cached reactive proxies over plain objects and arrays ([`Scope`])
//! - Fan-out to several frameworks at once ([`MultiAdapter`])
//! - A small synchronous runtime for tests and single-runtime hosts
//!   ([`LocalRuntime`])
//!
//! # Architecture
//!
//! - `adapter`: the seam to the host framework, plus the composite adapter
//! - `tracker`: keyed dependency table, triggers and the event channel
//! - `scope`: dynamic values and the proxies that track access to them
//! - `local`: in-process reference runtime
//! - `bundle`: ready-made state, refs and effects over one adapter
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tessera_core::{LocalRuntime, Tracker};
//!
//! let tracker = Tracker::new(Arc::new(LocalRuntime));
//!
//! let reader = tracker.clone();
//! let stop = tracker.effect(move || {
//!     reader.track_item_prop("players", 1, "score");
//!     Ok(None)
//! })?;
//!
//! // Re-runs the effect; writes to other players or props do not.
//! tracker.trigger_item_prop("players", 1, "score");
//! stop();
//! ```

pub mod adapter;
pub mod bundle;
pub mod error;
pub mod local;
pub mod scope;
pub mod tracker;

pub use adapter::{
    multi_adapter, CompositeDependency, Dependency, DependencyRef, FnAdapter, MultiAdapter,
    NoopAdapter, ReactivityAdapter,
};
pub use bundle::{AdapterBundle, Ref, State};
pub use error::{AdapterError, CallbackError, MultiAdapterError, ScopeError, TrackerError};
pub use local::{LocalEffect, LocalRuntime};
pub use scope::{ArrayProxy, ObjectProxy, Proxy, Scope, Tracked, Value};
pub use tracker::{EventKind, ItemId, Subscription, Tracker, TrackerEvent, TrackerOptions};
