//! Core domain models and shared plumbing.
//!
//! This module contains the trace/span data model, the error type, and
//! client configuration.

pub mod config;
pub mod error;
pub mod types;

pub use config::ClientConfig;
pub use error::{Result, TracelineError};
pub use types::{
    AttributeValue, Attributes, Span, SpanId, Trace, TraceContext, TraceEvent, TraceId,
    TraceStatus,
};
