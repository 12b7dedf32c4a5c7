//! Hub routing for PipeWire.
//!
//! Selected application streams, capture devices and sink monitors feed a
//! shared hub sink; the hub's monitor feeds the selected output sinks. The
//! [`Engine`] keeps the live graph converged on that selection.

pub mod apply;
pub mod command;
pub mod engine;
pub mod error;
pub mod intent;
pub mod reconcile;
pub mod refresh;
pub mod tools;

pub use apply::{Executor, HubSettle};
pub use command::{ApplyReport, Command, FailureKind, HubOwnership, Outcome, PortRef, SkipReason};
pub use engine::{Discarded, Engine, EngineOptions, EndpointListing, EndpointView, HubStatus};
pub use error::EngineError;
pub use intent::{Intent, PruneReport, Selection};
pub use reconcile::{LinkStatus, MappingReport, Plan, Reconciler, Unmatched};
pub use refresh::{refresh_once, spawn_refresh_task, watch_until, RefreshEvent};
pub use tools::{HubSink, LinkSink, Pactl, PwLink, ToolFailure};
