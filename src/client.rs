//! Trace lifecycle and transport to the collection service.
//!
//! The client owns two concerns: local bookkeeping of trace/span state
//! (start, end, events, span updates) and the single point where trace
//! data leaves the process, a synchronous HTTP POST in [`TraceClient::send_trace`].
//! Transport problems never propagate into instrumented application code;
//! they are logged and reported as `false`.

use crate::core::config::ClientConfig;
use crate::core::error::{Result, TracelineError};
use crate::core::types::{
    keys, Attributes, SpanId, Trace, TraceContext, TraceEvent, TraceId, TraceStatus,
};
use parking_lot::Mutex;
use reqwest::blocking::Client as HttpClient;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use reqwest::StatusCode;
use std::collections::HashMap;
use tracing::{debug, warn};

const SDK_USER_AGENT: &str = concat!("traceline-rust-sdk/", env!("CARGO_PKG_VERSION"));

/// Accumulated bookkeeping state for one span.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpanState {
    /// Attribute union across all updates; last writer wins per key.
    pub attributes: Attributes,
    /// Merged status; terminal values are never downgraded.
    pub status: TraceStatus,
    /// Number of update calls observed for this span.
    pub updates: u32,
}

#[derive(Default)]
struct Bookkeeping {
    spans: HashMap<SpanId, SpanState>,
    events: HashMap<TraceId, Vec<TraceEvent>>,
    ended: HashMap<TraceId, TraceStatus>,
}

/// Client for the remote trace collection service.
///
/// Construction validates the configuration and builds the outbound HTTP
/// session with its standard headers. The client is read-mostly after
/// construction and safe to share across threads behind an `Arc`.
pub struct TraceClient {
    endpoint: String,
    service_name: String,
    http: HttpClient,
    book: Mutex<Bookkeeping>,
}

impl TraceClient {
    /// Creates a client from the given configuration.
    pub fn new(config: ClientConfig) -> Result<Self> {
        config.validate()?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(USER_AGENT, HeaderValue::from_static(SDK_USER_AGENT));
        if let Some(api_key) = &config.api_key {
            let bearer = HeaderValue::from_str(&format!("Bearer {api_key}"))
                .map_err(|_| TracelineError::auth("API key contains invalid header characters"))?;
            headers.insert(AUTHORIZATION, bearer);
        }

        let http = HttpClient::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            endpoint: config.normalized_endpoint().to_string(),
            service_name: config.resolved_service_name().to_string(),
            http,
            book: Mutex::new(Bookkeeping::default()),
        })
    }

    /// Returns the configured endpoint, without trailing slash.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Returns the service name stamped on traces.
    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// Starts a new trace and returns its context.
    ///
    /// Local-only: nothing is transmitted until [`send_trace`](Self::send_trace)
    /// is called with an assembled [`Trace`].
    pub fn start_trace(&self, name: &str, attributes: Attributes) -> TraceContext {
        let trace_id = TraceId::generate();
        let mut merged = Attributes::new();
        merged.insert(keys::TRACE_NAME.to_string(), name.into());
        merged.insert(keys::SERVICE_NAME.to_string(), self.service_name.as_str().into());
        merged.extend(attributes);

        debug!(trace_id = %trace_id, name, "starting trace");
        TraceContext {
            trace_id,
            span_id: Some(SpanId::generate()),
            service_name: Some(self.service_name.clone()),
            attributes: merged,
        }
    }

    /// Marks a trace as ended with the given status.
    ///
    /// Bookkeeping only; transmission stays caller-driven through
    /// [`send_trace`](Self::send_trace).
    pub fn end_trace(&self, trace_id: &TraceId, status: TraceStatus) {
        debug!(trace_id = %trace_id, status = %status, "ending trace");
        let mut book = self.book.lock();
        let merged = book
            .ended
            .get(trace_id)
            .copied()
            .unwrap_or_default()
            .merge(status);
        book.ended.insert(trace_id.clone(), merged);
    }

    /// Appends an event to a trace's bookkeeping journal.
    pub fn add_event(&self, trace_id: &TraceId, name: &str, attributes: Attributes) {
        debug!(trace_id = %trace_id, name, "adding event");
        let event = TraceEvent::new(name, attributes);
        self.book
            .lock()
            .events
            .entry(trace_id.clone())
            .or_default()
            .push(event);
    }

    /// Merges attributes and status into a span's bookkeeping state.
    ///
    /// Attribute merges are a union with last-writer-wins per key; a
    /// terminal status is never downgraded by a later update.
    pub fn update_span(&self, span_id: &SpanId, attributes: Attributes, status: TraceStatus) {
        debug!(span_id = %span_id, count = attributes.len(), status = %status, "updating span");
        let mut book = self.book.lock();
        let state = book.spans.entry(span_id.clone()).or_default();
        state.attributes.extend(attributes);
        state.status = state.status.merge(status);
        state.updates += 1;
    }

    /// Returns the accumulated state for a span, if it was ever updated.
    pub fn span_state(&self, span_id: &SpanId) -> Option<SpanState> {
        self.book.lock().spans.get(span_id).cloned()
    }

    /// Returns the events recorded against a trace, in append order.
    pub fn trace_events(&self, trace_id: &TraceId) -> Vec<TraceEvent> {
        self.book
            .lock()
            .events
            .get(trace_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Returns the final status recorded by [`end_trace`](Self::end_trace).
    pub fn trace_status(&self, trace_id: &TraceId) -> Option<TraceStatus> {
        self.book.lock().ended.get(trace_id).copied()
    }

    /// Sends a complete trace to the collection service.
    ///
    /// Returns true only on HTTP 200. Rejections and transport failures
    /// are logged and reported as false; they never propagate.
    pub fn send_trace(&self, trace: &Trace) -> bool {
        let url = format!("{}/api/v1/traces", self.endpoint);
        match self.http.post(&url).json(trace).send() {
            Ok(response) if response.status() == StatusCode::OK => {
                debug!(trace_id = %trace.trace_id, spans = trace.spans.len(), "trace accepted");
                true
            },
            Ok(response) => {
                warn!(
                    trace_id = %trace.trace_id,
                    status = %response.status(),
                    "collection service rejected trace"
                );
                false
            },
            Err(err) => {
                warn!(trace_id = %trace.trace_id, error = %err, "failed to send trace");
                false
            },
        }
    }

    /// Checks the collection service's health endpoint.
    pub fn health(&self) -> bool {
        let url = format!("{}/health", self.endpoint);
        match self.http.get(&url).send() {
            Ok(response) => response.status() == StatusCode::OK,
            Err(err) => {
                debug!(error = %err, "health check failed");
                false
            },
        }
    }

    /// Fetches aggregate statistics from the collection service.
    pub fn fetch_stats(&self) -> Result<serde_json::Value> {
        let url = format!("{}/api/v1/stats", self.endpoint);
        let response = self.http.get(&url).send()?.error_for_status()?;
        Ok(response.json()?)
    }

    /// Fetches stored traces from the collection service.
    pub fn fetch_traces(&self) -> Result<serde_json::Value> {
        let url = format!("{}/api/v1/traces", self.endpoint);
        let response = self.http.get(&url).send()?.error_for_status()?;
        Ok(response.json()?)
    }
}

impl std::fmt::Debug for TraceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TraceClient")
            .field("endpoint", &self.endpoint)
            .field("service_name", &self.service_name)
            .finish_non_exhaustive()
    }
}
