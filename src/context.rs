//! Per-flow execution context.
//!
//! Tracks "the currently active trace/span" for the calling thread so
//! nested instrumented calls attach to the right parent without explicit
//! parameter passing. Each thread owns its slot exclusively; nothing here
//! is shared across threads.
//!
//! None of these operations fail: an absent context is a normal,
//! representable state.

use crate::core::types::{AttributeValue, SpanId, TraceContext, TraceId};
use std::cell::RefCell;
use std::collections::HashMap;

/// Lightweight descriptor kept in the per-flow span table.
///
/// Debug aid only: parent linkage is carried by the context chain and by
/// [`Span::parent_span_id`](crate::core::types::Span), not by this table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpanRecord {
    /// Span name.
    pub name: String,
    /// Owning trace.
    pub trace_id: TraceId,
    /// The span's own identifier.
    pub span_id: SpanId,
}

thread_local! {
    static CURRENT: RefCell<Option<TraceContext>> = const { RefCell::new(None) };
    static SPANS: RefCell<HashMap<SpanId, SpanRecord>> = RefCell::new(HashMap::new());
}

/// Returns the active context for the calling thread, if any.
pub fn current() -> Option<TraceContext> {
    CURRENT.with(|slot| slot.borrow().clone())
}

/// Installs `ctx` as the active context, overwriting any prior value.
///
/// The prior value is not saved; callers that need nesting discipline
/// should use [`ContextScope`] instead.
pub fn set_current(ctx: TraceContext) {
    CURRENT.with(|slot| *slot.borrow_mut() = Some(ctx));
}

/// Generates a span identifier and records a descriptor for it in the
/// per-thread span table.
pub fn create_span_record(name: &str, trace_id: &TraceId) -> SpanId {
    let span_id = SpanId::generate();
    let record = SpanRecord {
        name: name.to_string(),
        trace_id: trace_id.clone(),
        span_id: span_id.clone(),
    };
    SPANS.with(|table| {
        table.borrow_mut().insert(span_id.clone(), record);
    });
    span_id
}

/// Looks up a span descriptor by identifier.
pub fn lookup_span(span_id: &SpanId) -> Option<SpanRecord> {
    SPANS.with(|table| table.borrow().get(span_id).cloned())
}

/// Merges an attribute into the active context. Silently ignored when no
/// context is active.
pub fn set_trace_attribute<K: Into<String>, V: Into<AttributeValue>>(key: K, value: V) {
    CURRENT.with(|slot| {
        if let Some(ctx) = slot.borrow_mut().as_mut() {
            ctx.attributes.insert(key.into(), value.into());
        }
    });
}

/// Removes the active context and the span table for the calling thread.
///
/// Used between logical units of work, e.g. between test cases or
/// request handlers.
pub fn clear() {
    CURRENT.with(|slot| *slot.borrow_mut() = None);
    SPANS.with(|table| table.borrow_mut().clear());
}

/// Scoped context installation with guaranteed restoration.
///
/// Saves the previously active context on entry and restores it when the
/// scope is dropped, on normal return, early return, and unwind alike.
/// Instrumented calls go through this guard so an inner call can never
/// leak its context to the caller.
#[must_use = "dropping the scope immediately restores the previous context"]
pub struct ContextScope {
    previous: Option<TraceContext>,
}

impl ContextScope {
    /// Installs `ctx` as active, saving the previous context.
    pub fn enter(ctx: TraceContext) -> Self {
        let previous = CURRENT.with(|slot| slot.borrow_mut().replace(ctx));
        Self { previous }
    }
}

impl Drop for ContextScope {
    fn drop(&mut self) {
        let previous = self.previous.take();
        CURRENT.with(|slot| *slot.borrow_mut() = previous);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(trace_id: &TraceId) -> TraceContext {
        TraceContext::new(trace_id.clone())
    }

    #[test]
    fn test_current_starts_absent() {
        clear();
        assert!(current().is_none());
    }

    #[test]
    fn test_set_and_clear() {
        clear();
        let trace_id = TraceId::generate();
        set_current(ctx(&trace_id));
        assert_eq!(current().unwrap().trace_id, trace_id);
        clear();
        assert!(current().is_none());
    }

    #[test]
    fn test_span_table() {
        clear();
        let trace_id = TraceId::generate();
        let span_id = create_span_record("work", &trace_id);
        let record = lookup_span(&span_id).unwrap();
        assert_eq!(record.name, "work");
        assert_eq!(record.trace_id, trace_id);
        assert_eq!(record.span_id, span_id);
        assert!(lookup_span(&SpanId::generate()).is_none());
        clear();
        assert!(lookup_span(&span_id).is_none());
    }

    #[test]
    fn test_set_trace_attribute_requires_context() {
        clear();
        // No context active: silently ignored.
        set_trace_attribute("k", "v");
        assert!(current().is_none());

        set_current(ctx(&TraceId::generate()));
        set_trace_attribute("k", "v");
        let active = current().unwrap();
        assert_eq!(active.attributes.get("k"), Some(&AttributeValue::String("v".into())));
        clear();
    }

    #[test]
    fn test_scope_restores_previous() {
        clear();
        let outer_id = TraceId::generate();
        set_current(ctx(&outer_id));
        {
            let _scope = ContextScope::enter(ctx(&TraceId::generate()));
            assert_ne!(current().unwrap().trace_id, outer_id);
        }
        assert_eq!(current().unwrap().trace_id, outer_id);
        clear();
    }

    #[test]
    fn test_scope_restores_absence() {
        clear();
        {
            let _scope = ContextScope::enter(ctx(&TraceId::generate()));
            assert!(current().is_some());
        }
        assert!(current().is_none());
    }

    #[test]
    fn test_scope_restores_on_unwind() {
        clear();
        let outer_id = TraceId::generate();
        set_current(ctx(&outer_id));
        let result = std::panic::catch_unwind(|| {
            let _scope = ContextScope::enter(TraceContext::new(TraceId::generate()));
            panic!("boom");
        });
        assert!(result.is_err());
        assert_eq!(current().unwrap().trace_id, outer_id);
        clear();
    }

    #[test]
    fn test_contexts_are_thread_private() {
        clear();
        set_current(ctx(&TraceId::generate()));
        let handle = std::thread::spawn(|| current().is_none());
        assert!(handle.join().unwrap());
        clear();
    }
}
