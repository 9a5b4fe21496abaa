//! Traceline - client-side tracing SDK.
//!
//! Traceline lets application code mark functions as traced units of
//! work. Invoking a wrapped function builds a hierarchical trace/span
//! record of the call, capturing arguments, results, failures, and
//! timing, and a client forwards completed traces to a remote collection
//! service over HTTP.
//!
//! # Architecture
//!
//! - `core`: data model (traces, spans, events), errors, configuration
//! - `context`: per-thread execution context with scoped save/restore
//! - `instrument`: wrappers that turn ordinary callables into traced ones
//! - `client`: trace lifecycle bookkeeping and HTTP transport
//!
//! # Example
//!
//! ```no_run
//! use traceline::{init, traced, ClientConfig, TraceOptions};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = init(ClientConfig::default().service_name("calculator"))?;
//!
//!     let add = traced(
//!         client,
//!         TraceOptions::new("add").arg_names(&["a", "b"]),
//!         |a: i64, b: i64| a + b,
//!     );
//!
//!     assert_eq!(add.call((2, 3)), 5);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod client;
pub mod context;
pub mod core;
pub mod instrument;

pub use crate::client::{SpanState, TraceClient};
pub use crate::core::config::ClientConfig;
pub use crate::core::error::{Result, TracelineError};
pub use crate::core::types::{
    AttributeValue, Attributes, Span, SpanId, Trace, TraceContext, TraceEvent, TraceId,
    TraceStatus,
};
pub use crate::instrument::{
    traced, traced_agent, traced_llm, AgentOptions, LlmOptions, TraceOptions, Traced,
};

use std::sync::Arc;

/// Initializes a client handle from the given configuration.
///
/// Returns an explicit, shareable handle; there is no hidden global
/// client. Pass the handle (or clones of it) to wrapper construction.
pub fn init(config: ClientConfig) -> Result<Arc<TraceClient>> {
    Ok(Arc::new(TraceClient::new(config)?))
}
