use crate::core::error::{Result, TracelineError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a trace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TraceId(String);

/// Unique identifier for a span within a trace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SpanId(String);

impl TraceId {
    /// Creates a new TraceId after validation.
    pub fn new(id: String) -> Result<Self> {
        if id.is_empty() {
            return Err(TracelineError::invalid_trace("TraceId cannot be empty"));
        }
        Ok(TraceId(id))
    }

    /// Generates a fresh globally-unique trace identifier.
    pub fn generate() -> Self {
        TraceId(Uuid::new_v4().to_string())
    }

    /// Returns the string representation of the trace ID.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the inner string value.
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl SpanId {
    /// Creates a new SpanId after validation.
    pub fn new(id: String) -> Result<Self> {
        if id.is_empty() {
            return Err(TracelineError::invalid_span("SpanId cannot be empty"));
        }
        Ok(SpanId(id))
    }

    /// Generates a fresh globally-unique span identifier.
    pub fn generate() -> Self {
        SpanId(Uuid::new_v4().to_string())
    }

    /// Returns the string representation of the span ID.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the inner string value.
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for SpanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Final status of a trace or span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TraceStatus {
    /// Completed successfully.
    #[default]
    Ok,
    /// Completed with an error.
    Error,
    /// Timed out before completion.
    Timeout,
    /// Cancelled before completion.
    Cancelled,
}

impl TraceStatus {
    /// Returns true if the status indicates success.
    pub fn is_ok(&self) -> bool {
        matches!(self, TraceStatus::Ok)
    }

    /// Returns true if the status indicates an error.
    pub fn is_error(&self) -> bool {
        matches!(self, TraceStatus::Error)
    }

    /// Returns true for statuses that must not be downgraded once set.
    pub fn is_terminal(&self) -> bool {
        !self.is_ok()
    }

    /// Merges a later status into this one. Terminal statuses win over
    /// any subsequent value.
    pub fn merge(self, next: TraceStatus) -> TraceStatus {
        if self.is_terminal() {
            self
        } else {
            next
        }
    }

    /// Returns the wire representation of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            TraceStatus::Ok => "ok",
            TraceStatus::Error => "error",
            TraceStatus::Timeout => "timeout",
            TraceStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for TraceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A scalar attribute value: string, number, boolean, or null.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    /// Absent value, serialized as JSON null.
    Null,
    /// Boolean value.
    Bool(bool),
    /// Integer value.
    Int(i64),
    /// Floating-point value.
    Float(f64),
    /// String value.
    String(String),
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::String(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        AttributeValue::String(value)
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        AttributeValue::Bool(value)
    }
}

impl From<i32> for AttributeValue {
    fn from(value: i32) -> Self {
        AttributeValue::Int(i64::from(value))
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        AttributeValue::Int(value)
    }
}

impl From<u32> for AttributeValue {
    fn from(value: u32) -> Self {
        AttributeValue::Int(i64::from(value))
    }
}

impl From<f32> for AttributeValue {
    fn from(value: f32) -> Self {
        AttributeValue::Float(f64::from(value))
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        AttributeValue::Float(value)
    }
}

impl<T: Into<AttributeValue>> From<Option<T>> for AttributeValue {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(inner) => inner.into(),
            None => AttributeValue::Null,
        }
    }
}

/// Key-value attribute mapping attached to traces, spans, and events.
pub type Attributes = HashMap<String, AttributeValue>;

/// Standard attribute keys stamped on spans and traces.
pub mod keys {
    /// Name of the traced service.
    pub const SERVICE_NAME: &str = "service.name";
    /// Logical name of the trace.
    pub const TRACE_NAME: &str = "trace.name";
    /// Name of the instrumented function.
    pub const FUNCTION_NAME: &str = "function.name";
    /// Module containing the instrumented function.
    pub const FUNCTION_MODULE: &str = "function.module";
    /// Fully qualified name of the instrumented function.
    pub const FUNCTION_QUALNAME: &str = "function.qualname";
    /// Wall-clock duration of the instrumented call in milliseconds.
    pub const FUNCTION_DURATION: &str = "function.duration_ms";
    /// Return value of the instrumented call, when scalar.
    pub const FUNCTION_RESULT: &str = "function.result";
    /// Type name of a non-scalar return value.
    pub const FUNCTION_RESULT_TYPE: &str = "function.result.type";
    /// Type name of a captured failure.
    pub const ERROR_TYPE: &str = "error.type";
    /// Message of a captured failure.
    pub const ERROR_MESSAGE: &str = "error.message";
    /// Component kind, e.g. "agent" or "llm".
    pub const COMPONENT_TYPE: &str = "component.type";
    /// Name of the traced agent.
    pub const AGENT_NAME: &str = "agent.name";
    /// Model used for a traced LLM call.
    pub const LLM_MODEL: &str = "llm.model";
}

/// A timestamped marker appended to a span. Purely additive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceEvent {
    /// Event name.
    pub name: String,
    /// When the event was recorded.
    pub timestamp: DateTime<Utc>,
    /// Event attributes.
    pub attributes: Attributes,
}

impl TraceEvent {
    /// Creates an event stamped with the current time.
    pub fn new<S: Into<String>>(name: S, attributes: Attributes) -> Self {
        Self {
            name: name.into(),
            timestamp: Utc::now(),
            attributes,
        }
    }
}

/// A single unit of work within a trace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Span {
    /// Unique identifier for this span.
    pub span_id: SpanId,
    /// Identifier of the owning trace.
    pub trace_id: TraceId,
    /// Parent span, absent for root spans.
    pub parent_span_id: Option<SpanId>,
    /// Name of the operation this span represents.
    pub name: String,
    /// When the span started.
    pub start_time: DateTime<Utc>,
    /// When the span ended; a span with no end time is open.
    pub end_time: Option<DateTime<Utc>>,
    /// Final status of the span.
    pub status: TraceStatus,
    /// Key-value attributes.
    pub attributes: Attributes,
    /// Ordered sequence of events.
    pub events: Vec<TraceEvent>,
}

impl Span {
    /// Creates an open root span with a generated identifier and the
    /// current time as start.
    pub fn new<S: Into<String>>(trace_id: TraceId, name: S) -> Self {
        Self {
            span_id: SpanId::generate(),
            trace_id,
            parent_span_id: None,
            name: name.into(),
            start_time: Utc::now(),
            end_time: None,
            status: TraceStatus::default(),
            attributes: Attributes::new(),
            events: Vec::new(),
        }
    }

    /// Links this span under a parent span.
    pub fn child_of(mut self, parent: SpanId) -> Self {
        self.parent_span_id = Some(parent);
        self
    }

    /// Returns true if this span has no parent.
    pub fn is_root(&self) -> bool {
        self.parent_span_id.is_none()
    }

    /// Returns true while no end time has been set.
    pub fn is_open(&self) -> bool {
        self.end_time.is_none()
    }

    /// Merges an attribute into this span.
    pub fn set_attribute<K: Into<String>, V: Into<AttributeValue>>(&mut self, key: K, value: V) {
        self.attributes.insert(key.into(), value.into());
    }

    /// Appends an event to this span.
    pub fn add_event(&mut self, event: TraceEvent) {
        self.events.push(event);
    }

    /// Closes the span with the given status. The end time is clamped so
    /// it never precedes the start time.
    pub fn close(&mut self, status: TraceStatus) {
        let now = Utc::now();
        self.end_time = Some(now.max(self.start_time));
        self.status = self.status.merge(status);
    }
}

// Identity is the span_id, not structural equality.
impl PartialEq for Span {
    fn eq(&self, other: &Self) -> bool {
        self.span_id == other.span_id
    }
}

impl Eq for Span {}

/// A complete trace: the top-level record of one logical operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trace {
    /// Unique identifier for this trace.
    pub trace_id: TraceId,
    /// Logical name of the trace.
    pub name: String,
    /// When the trace started.
    pub start_time: DateTime<Utc>,
    /// When the trace ended, if it has.
    pub end_time: Option<DateTime<Utc>>,
    /// Final status of the trace.
    pub status: TraceStatus,
    /// Owned spans, in creation order.
    pub spans: Vec<Span>,
    /// Trace-level attributes.
    pub attributes: Attributes,
    /// Name of the service that produced this trace.
    pub service_name: Option<String>,
}

impl Trace {
    /// Creates an open trace with a generated identifier.
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            trace_id: TraceId::generate(),
            name: name.into(),
            start_time: Utc::now(),
            end_time: None,
            status: TraceStatus::default(),
            spans: Vec::new(),
            attributes: Attributes::new(),
            service_name: None,
        }
    }

    /// Sets the owning service name.
    pub fn with_service<S: Into<String>>(mut self, service_name: S) -> Self {
        self.service_name = Some(service_name.into());
        self
    }

    /// Appends a span. The span must carry this trace's identifier.
    pub fn push_span(&mut self, span: Span) -> Result<()> {
        if span.trace_id != self.trace_id {
            return Err(TracelineError::invalid_trace(format!(
                "span {} belongs to trace {}, not {}",
                span.span_id, span.trace_id, self.trace_id
            )));
        }
        self.spans.push(span);
        Ok(())
    }

    /// Looks up a span by identifier.
    pub fn span(&self, span_id: &SpanId) -> Option<&Span> {
        self.spans.iter().find(|span| &span.span_id == span_id)
    }

    /// Returns the spans nested directly under the given parent.
    pub fn children_of(&self, parent_id: &SpanId) -> Vec<&Span> {
        self.spans
            .iter()
            .filter(|span| span.parent_span_id.as_ref() == Some(parent_id))
            .collect()
    }

    /// Ends the trace, recording the end time and merging in the final
    /// status.
    pub fn end(&mut self, status: TraceStatus) {
        let now = Utc::now();
        self.end_time = Some(now.max(self.start_time));
        self.status = self.status.merge(status);
    }

    /// Returns true while no end time has been set.
    pub fn is_open(&self) -> bool {
        self.end_time.is_none()
    }
}

// Identity is the trace_id, not structural equality.
impl PartialEq for Trace {
    fn eq(&self, other: &Self) -> bool {
        self.trace_id == other.trace_id
    }
}

impl Eq for Trace {}

/// Transient record of the active trace/span for one execution flow.
///
/// Owned exclusively by the flow-local context slot; never shared
/// across flows.
#[derive(Debug, Clone, PartialEq)]
pub struct TraceContext {
    /// Identifier of the active trace.
    pub trace_id: TraceId,
    /// Identifier of the active span, if any.
    pub span_id: Option<SpanId>,
    /// Name of the owning service.
    pub service_name: Option<String>,
    /// Trace-level attributes accumulated so far.
    pub attributes: Attributes,
}

impl TraceContext {
    /// Creates a context for the given trace with no active span.
    pub fn new(trace_id: TraceId) -> Self {
        Self {
            trace_id,
            span_id: None,
            service_name: None,
            attributes: Attributes::new(),
        }
    }

    /// Returns a copy of this context with the given span active.
    pub fn with_span(&self, span_id: SpanId) -> Self {
        Self {
            trace_id: self.trace_id.clone(),
            span_id: Some(span_id),
            service_name: self.service_name.clone(),
            attributes: self.attributes.clone(),
        }
    }

    /// Merges an attribute into this context.
    pub fn set_attribute<K: Into<String>, V: Into<AttributeValue>>(&mut self, key: K, value: V) {
        self.attributes.insert(key.into(), value.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_id_validation() {
        assert!(TraceId::new("t1".to_string()).is_ok());
        assert!(TraceId::new(String::new()).is_err());
        assert!(SpanId::new(String::new()).is_err());
    }

    #[test]
    fn test_generated_ids_are_unique() {
        let a = TraceId::generate();
        let b = TraceId::generate();
        assert!(!a.as_str().is_empty());
        assert_ne!(a, b);
        assert_ne!(SpanId::generate(), SpanId::generate());
    }

    #[test]
    fn test_status_merge_keeps_terminal() {
        assert_eq!(TraceStatus::Ok.merge(TraceStatus::Error), TraceStatus::Error);
        assert_eq!(TraceStatus::Error.merge(TraceStatus::Ok), TraceStatus::Error);
        assert_eq!(TraceStatus::Timeout.merge(TraceStatus::Cancelled), TraceStatus::Timeout);
        assert_eq!(TraceStatus::Ok.merge(TraceStatus::Ok), TraceStatus::Ok);
    }

    #[test]
    fn test_status_wire_format() {
        let json = serde_json::to_string(&TraceStatus::Cancelled).unwrap();
        assert_eq!(json, "\"cancelled\"");
        let back: TraceStatus = serde_json::from_str("\"timeout\"").unwrap();
        assert_eq!(back, TraceStatus::Timeout);
    }

    #[test]
    fn test_attribute_value_serde() {
        let mut attrs = Attributes::new();
        attrs.insert("s".into(), "text".into());
        attrs.insert("i".into(), 42i64.into());
        attrs.insert("f".into(), 1.5f64.into());
        attrs.insert("b".into(), true.into());
        attrs.insert("n".into(), AttributeValue::Null);

        let json = serde_json::to_value(&attrs).unwrap();
        assert_eq!(json["s"], "text");
        assert_eq!(json["i"], 42);
        assert_eq!(json["f"], 1.5);
        assert_eq!(json["b"], true);
        assert!(json["n"].is_null());

        let back: Attributes = serde_json::from_value(json).unwrap();
        assert_eq!(back, attrs);
    }

    #[test]
    fn test_span_defaults() {
        let trace_id = TraceId::generate();
        let span = Span::new(trace_id.clone(), "work");
        assert!(!span.span_id.as_str().is_empty());
        assert_eq!(span.trace_id, trace_id);
        assert!(span.is_root());
        assert!(span.is_open());
        assert!(span.attributes.is_empty());
        assert!(span.events.is_empty());
        assert_eq!(span.status, TraceStatus::Ok);
    }

    #[test]
    fn test_span_close_sets_end_after_start() {
        let mut span = Span::new(TraceId::generate(), "work");
        span.close(TraceStatus::Error);
        assert!(!span.is_open());
        assert!(span.end_time.unwrap() >= span.start_time);
        assert_eq!(span.status, TraceStatus::Error);
        // A later OK close must not downgrade the status.
        span.close(TraceStatus::Ok);
        assert_eq!(span.status, TraceStatus::Error);
    }

    #[test]
    fn test_fresh_collections_do_not_alias() {
        let mut a = Trace::new("a");
        let b = Trace::new("b");
        a.attributes.insert("k".into(), "v".into());
        assert!(b.attributes.is_empty());
        assert!(b.spans.is_empty());
    }

    #[test]
    fn test_push_span_rejects_foreign_trace_id() {
        let mut trace = Trace::new("t");
        let foreign = Span::new(TraceId::generate(), "orphan");
        assert!(trace.push_span(foreign).is_err());

        let owned = Span::new(trace.trace_id.clone(), "child");
        assert!(trace.push_span(owned).is_ok());
        assert_eq!(trace.spans.len(), 1);
    }

    #[test]
    fn test_children_of() {
        let mut trace = Trace::new("t");
        let root = Span::new(trace.trace_id.clone(), "root");
        let root_id = root.span_id.clone();
        let child = Span::new(trace.trace_id.clone(), "child").child_of(root_id.clone());
        let child_id = child.span_id.clone();
        trace.push_span(root).unwrap();
        trace.push_span(child).unwrap();

        let children = trace.children_of(&root_id);
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].span_id, child_id);
        assert!(trace.children_of(&child_id).is_empty());
    }

    #[test]
    fn test_identity_equality() {
        let trace_id = TraceId::generate();
        let mut a = Span::new(trace_id.clone(), "a");
        let b = a.clone();
        a.set_attribute("k", "v");
        // Same identifier, different contents: still equal.
        assert_eq!(a, b);
        assert_ne!(a, Span::new(trace_id, "a"));
    }

    #[test]
    fn test_trace_wire_round_trip() {
        let mut trace = Trace::new("checkout").with_service("shop");
        let mut span = Span::new(trace.trace_id.clone(), "charge");
        span.set_attribute("amount", 19.99f64);
        span.add_event(TraceEvent::new("card.charged", Attributes::new()));
        span.close(TraceStatus::Ok);
        trace.push_span(span).unwrap();
        trace.end(TraceStatus::Ok);

        let json = serde_json::to_string(&trace).unwrap();
        let back: Trace = serde_json::from_str(&json).unwrap();
        assert_eq!(back.trace_id, trace.trace_id);
        assert_eq!(back.spans.len(), 1);
        assert_eq!(back.spans[0].attributes, trace.spans[0].attributes);
        assert_eq!(back.spans[0].events, trace.spans[0].events);
        assert_eq!(back.service_name.as_deref(), Some("shop"));

        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["status"], "ok");
        assert!(value["spans"][0]["parent_span_id"].is_null());
    }
}
