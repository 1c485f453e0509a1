//! Correlation types for request tracking.
//!
//! A `RequestContext` travels with every engine call so that log lines,
//! change-log entries and errors produced by one request can be tied together.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! correlation_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(String);

        impl $name {
            /// Generate a fresh identifier (UUIDv7, time ordered).
            pub fn new() -> Self {
                Self(Uuid::now_v7().to_string())
            }

            /// Get the string representation.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Wrap an identifier received from a caller.
            pub fn from_string(s: String) -> Self {
                Self(s)
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

correlation_id!(
    /// Unique identifier for a single engine request.
    RequestId
);

correlation_id!(
    /// Trace identifier propagated from an upstream caller.
    TraceId
);

/// Context carried through operation boundaries.
///
/// `actor_id` identifies who asked for the change; it is recorded in module
/// status history and in the relation change log.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub request_id: RequestId,
    pub trace_id: Option<TraceId>,
    pub actor_id: Option<String>,
}

impl RequestContext {
    /// Create a new anonymous context with a fresh RequestId.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a context on behalf of an actor.
    pub fn for_actor(actor_id: impl Into<String>) -> Self {
        Self {
            actor_id: Some(actor_id.into()),
            ..Self::default()
        }
    }

    /// Attach an upstream TraceId.
    pub fn with_trace_id(mut self, trace_id: TraceId) -> Self {
        self.trace_id = Some(trace_id);
        self
    }
}
