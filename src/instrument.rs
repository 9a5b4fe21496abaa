//! Instrumentation wrappers.
//!
//! A wrapper turns an ordinary function into a traced one: invoking it
//! resolves (or starts) the active trace, creates a span, captures
//! arguments, result or failure, and timing, and reports the span to the
//! client exactly once per call. The previous execution context is
//! restored on every exit path.
//!
//! Rust has no runtime reflection, so the callable's parameter names are
//! supplied through [`TraceOptions::arg_names`]; unnamed positions fall
//! back to `arg0`, `arg1`, and so on. Scalar arguments and results are
//! recorded by value; anything else is recorded by type name only, never
//! as a serialized object graph.

use crate::client::TraceClient;
use crate::context::{self, ContextScope};
use crate::core::types::{keys, AttributeValue, Attributes, SpanId, TraceStatus};
use std::any::Any;
use std::fmt::Display;
use std::sync::Arc;
use std::time::Instant;
use tracing::trace;

/// A captured value: either a scalar recorded directly, or an opaque
/// type name.
enum Captured {
    Scalar(AttributeValue),
    Opaque(&'static str),
}

/// Classifies a value as a recordable scalar or an opaque type.
fn capture<T: Any>(value: &T) -> Captured {
    let any = value as &dyn Any;
    if let Some(v) = any.downcast_ref::<String>() {
        Captured::Scalar(v.as_str().into())
    } else if let Some(v) = any.downcast_ref::<&str>() {
        Captured::Scalar((*v).into())
    } else if let Some(v) = any.downcast_ref::<bool>() {
        Captured::Scalar((*v).into())
    } else if let Some(v) = any.downcast_ref::<i8>() {
        Captured::Scalar(i64::from(*v).into())
    } else if let Some(v) = any.downcast_ref::<i16>() {
        Captured::Scalar(i64::from(*v).into())
    } else if let Some(v) = any.downcast_ref::<i32>() {
        Captured::Scalar((*v).into())
    } else if let Some(v) = any.downcast_ref::<i64>() {
        Captured::Scalar((*v).into())
    } else if let Some(v) = any.downcast_ref::<isize>() {
        match i64::try_from(*v) {
            Ok(int) => Captured::Scalar(int.into()),
            Err(_) => Captured::Opaque("isize"),
        }
    } else if let Some(v) = any.downcast_ref::<u8>() {
        Captured::Scalar(i64::from(*v).into())
    } else if let Some(v) = any.downcast_ref::<u16>() {
        Captured::Scalar(i64::from(*v).into())
    } else if let Some(v) = any.downcast_ref::<u32>() {
        Captured::Scalar((*v).into())
    } else if let Some(v) = any.downcast_ref::<u64>() {
        match i64::try_from(*v) {
            Ok(int) => Captured::Scalar(int.into()),
            Err(_) => Captured::Opaque("u64"),
        }
    } else if let Some(v) = any.downcast_ref::<usize>() {
        match i64::try_from(*v) {
            Ok(int) => Captured::Scalar(int.into()),
            Err(_) => Captured::Opaque("usize"),
        }
    } else if let Some(v) = any.downcast_ref::<f32>() {
        Captured::Scalar((*v).into())
    } else if let Some(v) = any.downcast_ref::<f64>() {
        Captured::Scalar((*v).into())
    } else if any.downcast_ref::<()>().is_some() {
        Captured::Scalar(AttributeValue::Null)
    } else {
        Captured::Opaque(std::any::type_name::<T>())
    }
}

/// Argument tuples that can record themselves as span attributes.
///
/// Implemented for tuples of up to five `'static` elements.
pub trait CaptureArgs {
    /// Records each element under `function.args.<name>` (scalar) or
    /// `function.args.<name>.type` (opaque), taking names positionally
    /// from `names`.
    fn capture_into(&self, names: &[String], attrs: &mut Attributes);
}

/// Callables invocable with an argument tuple.
///
/// Implemented for `Fn` closures and function pointers of up to five
/// arguments; the tuple shape picks the arity.
pub trait FnArgs<A> {
    /// The callable's return type.
    type Output;

    /// Invokes the callable with the given argument tuple.
    fn invoke(&self, args: A) -> Self::Output;
}

macro_rules! impl_arg_tuples {
    ($( $idx:tt : $ty:ident ),*) => {
        impl<$($ty: Any),*> CaptureArgs for ($($ty,)*) {
            #[allow(unused_variables)]
            fn capture_into(&self, names: &[String], attrs: &mut Attributes) {
                $(
                    let fallback;
                    let name: &str = match names.get($idx) {
                        Some(name) => name,
                        None => {
                            fallback = format!("arg{}", $idx);
                            &fallback
                        },
                    };
                    match capture(&self.$idx) {
                        Captured::Scalar(value) => {
                            attrs.insert(format!("function.args.{name}"), value);
                        },
                        Captured::Opaque(type_name) => {
                            attrs.insert(format!("function.args.{name}.type"), type_name.into());
                        },
                    }
                )*
            }
        }

        impl<Func, Out, $($ty),*> FnArgs<($($ty,)*)> for Func
        where
            Func: Fn($($ty),*) -> Out,
        {
            type Output = Out;

            #[allow(non_snake_case)]
            fn invoke(&self, ($($ty,)*): ($($ty,)*)) -> Out {
                (self)($($ty),*)
            }
        }
    };
}

impl_arg_tuples!();
impl_arg_tuples!(0: A0);
impl_arg_tuples!(0: A0, 1: A1);
impl_arg_tuples!(0: A0, 1: A1, 2: A2);
impl_arg_tuples!(0: A0, 1: A1, 2: A2, 3: A3);
impl_arg_tuples!(0: A0, 1: A1, 2: A2, 3: A3, 4: A4);

/// Configuration for a traced function.
#[derive(Debug, Clone)]
pub struct TraceOptions {
    name: Option<String>,
    module: Option<String>,
    function: String,
    capture_args: bool,
    capture_result: bool,
    ignore_errors: bool,
    arg_names: Vec<String>,
    attributes: Attributes,
}

impl TraceOptions {
    /// Creates options for the named function. Captures arguments and
    /// results by default; errors propagate.
    pub fn new<S: Into<String>>(function: S) -> Self {
        Self {
            name: None,
            module: None,
            function: function.into(),
            capture_args: true,
            capture_result: true,
            ignore_errors: false,
            arg_names: Vec::new(),
            attributes: Attributes::new(),
        }
    }

    /// Overrides the span name. Defaults to `module::function`.
    pub fn name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the module the function belongs to.
    pub fn module<S: Into<String>>(mut self, module: S) -> Self {
        self.module = Some(module.into());
        self
    }

    /// Enables or disables argument capture.
    pub fn capture_args(mut self, capture: bool) -> Self {
        self.capture_args = capture;
        self
    }

    /// Enables or disables result capture.
    pub fn capture_result(mut self, capture: bool) -> Self {
        self.capture_result = capture;
        self
    }

    /// When set, failures are swallowed instead of propagated; the
    /// wrapped call then returns no value.
    pub fn ignore_errors(mut self, ignore: bool) -> Self {
        self.ignore_errors = ignore;
        self
    }

    /// Names the function's parameters, positionally.
    pub fn arg_names(mut self, names: &[&str]) -> Self {
        self.arg_names = names.iter().map(|name| (*name).to_string()).collect();
        self
    }

    /// Seeds an extra attribute onto every span this wrapper produces.
    pub fn attribute<K: Into<String>, V: Into<AttributeValue>>(mut self, key: K, value: V) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    fn qualified_name(&self) -> String {
        match &self.module {
            Some(module) => format!("{}::{}", module, self.function),
            None => self.function.clone(),
        }
    }

    fn span_name(&self) -> String {
        self.name.clone().unwrap_or_else(|| self.qualified_name())
    }
}

/// A function wrapped with tracing instrumentation.
///
/// Built by [`traced`], [`traced_agent`] or [`traced_llm`]. Invoke with
/// [`call`](Self::call) for infallible callables or
/// [`try_call`](Self::try_call) for `Result`-returning ones.
pub struct Traced<F> {
    client: Arc<TraceClient>,
    options: TraceOptions,
    inner: F,
}

/// Wraps a callable with the tracing contract of [`Traced`].
pub fn traced<F>(client: Arc<TraceClient>, options: TraceOptions, inner: F) -> Traced<F> {
    Traced {
        client,
        options,
        inner,
    }
}

impl<F> Traced<F> {
    /// Returns the wrapper's configuration.
    pub fn options(&self) -> &TraceOptions {
        &self.options
    }

    /// Shared prologue: resolve the active trace (starting one when
    /// absent), register the span, seed attributes, capture arguments,
    /// and make this span current for nested callees.
    fn begin<A: CaptureArgs>(&self, args: &A) -> (SpanId, Attributes, ContextScope, Instant) {
        let span_name = self.options.span_name();

        let ctx = match context::current() {
            Some(ctx) => ctx,
            None => {
                let ctx = self.client.start_trace(&span_name, Attributes::new());
                context::set_current(ctx.clone());
                ctx
            },
        };

        let span_id = context::create_span_record(&span_name, &ctx.trace_id);
        trace!(span = %span_id, name = %span_name, "entering traced call");

        let mut attributes = Attributes::new();
        attributes.insert(keys::FUNCTION_NAME.to_string(), self.options.function.as_str().into());
        if let Some(module) = &self.options.module {
            attributes.insert(keys::FUNCTION_MODULE.to_string(), module.as_str().into());
        }
        attributes.insert(
            keys::FUNCTION_QUALNAME.to_string(),
            self.options.qualified_name().into(),
        );
        attributes.extend(self.options.attributes.clone());

        if self.options.capture_args {
            args.capture_into(&self.options.arg_names, &mut attributes);
        }

        let scope = ContextScope::enter(ctx.with_span(span_id.clone()));
        (span_id, attributes, scope, Instant::now())
    }

    fn finish(&self, span_id: &SpanId, mut attributes: Attributes, status: TraceStatus, started: Instant) {
        let duration_ms = started.elapsed().as_secs_f64() * 1000.0;
        attributes.insert(keys::FUNCTION_DURATION.to_string(), duration_ms.into());
        self.client.update_span(span_id, attributes, status);
    }

    /// Invokes an infallible callable, tracing the call.
    ///
    /// If the callable panics, the unwind passes through: the previous
    /// context is restored, but no span update is reported. Failures a
    /// caller should see on the span belong in a `Result` via
    /// [`try_call`](Self::try_call).
    pub fn call<A, R>(&self, args: A) -> R
    where
        A: CaptureArgs,
        F: FnArgs<A, Output = R>,
        R: Any,
    {
        let (span_id, mut attributes, scope, started) = self.begin(&args);
        let result = self.inner.invoke(args);

        if self.options.capture_result {
            match capture(&result) {
                // The null scalar covers unit returns; nothing to record.
                Captured::Scalar(AttributeValue::Null) => {},
                Captured::Scalar(value) => {
                    attributes.insert(keys::FUNCTION_RESULT.to_string(), value);
                },
                Captured::Opaque(type_name) => {
                    attributes.insert(keys::FUNCTION_RESULT_TYPE.to_string(), type_name.into());
                },
            }
        }

        self.finish(&span_id, attributes, TraceStatus::Ok, started);
        drop(scope);
        result
    }

    /// Invokes a `Result`-returning callable, tracing the call.
    ///
    /// Returns `Ok(Some(value))` on success and `Err(e)` on failure. With
    /// `ignore_errors` set, failures are recorded on the span but
    /// swallowed, and the call returns `Ok(None)`. Panics are not caught;
    /// as with [`call`](Self::call), an unwinding callable restores the
    /// previous context but reports no span update.
    pub fn try_call<A, T, E>(&self, args: A) -> Result<Option<T>, E>
    where
        A: CaptureArgs,
        F: FnArgs<A, Output = Result<T, E>>,
        T: Any,
        E: Display,
    {
        let (span_id, mut attributes, scope, started) = self.begin(&args);
        let outcome = self.inner.invoke(args);

        let mut status = TraceStatus::Ok;
        let result = match outcome {
            Ok(value) => {
                if self.options.capture_result {
                    match capture(&value) {
                        Captured::Scalar(AttributeValue::Null) => {},
                        Captured::Scalar(scalar) => {
                            attributes.insert(keys::FUNCTION_RESULT.to_string(), scalar);
                        },
                        Captured::Opaque(type_name) => {
                            attributes
                                .insert(keys::FUNCTION_RESULT_TYPE.to_string(), type_name.into());
                        },
                    }
                }
                Ok(Some(value))
            },
            Err(err) => {
                status = TraceStatus::Error;
                attributes.insert(keys::ERROR_TYPE.to_string(), std::any::type_name::<E>().into());
                attributes.insert(keys::ERROR_MESSAGE.to_string(), err.to_string().into());
                if self.options.ignore_errors {
                    Ok(None)
                } else {
                    Err(err)
                }
            },
        };

        self.finish(&span_id, attributes, status, started);
        drop(scope);
        result
    }
}

/// Configuration for a traced agent.
#[derive(Debug, Clone)]
pub struct AgentOptions {
    function: String,
    agent_name: Option<String>,
    capture_inputs: bool,
    capture_outputs: bool,
    arg_names: Vec<String>,
    attributes: Attributes,
}

impl AgentOptions {
    /// Creates agent options for the named function.
    pub fn new<S: Into<String>>(function: S) -> Self {
        Self {
            function: function.into(),
            agent_name: None,
            capture_inputs: true,
            capture_outputs: true,
            arg_names: Vec::new(),
            attributes: Attributes::new(),
        }
    }

    /// Names the agent; defaults to the function name.
    pub fn agent_name<S: Into<String>>(mut self, name: S) -> Self {
        self.agent_name = Some(name.into());
        self
    }

    /// Enables or disables input capture.
    pub fn capture_inputs(mut self, capture: bool) -> Self {
        self.capture_inputs = capture;
        self
    }

    /// Enables or disables output capture.
    pub fn capture_outputs(mut self, capture: bool) -> Self {
        self.capture_outputs = capture;
        self
    }

    /// Names the function's parameters, positionally.
    pub fn arg_names(mut self, names: &[&str]) -> Self {
        self.arg_names = names.iter().map(|name| (*name).to_string()).collect();
        self
    }

    /// Seeds an extra agent attribute.
    pub fn attribute<K: Into<String>, V: Into<AttributeValue>>(mut self, key: K, value: V) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
}

/// Wraps an AI-agent entry point. Delegates to the base wrapper with an
/// `agent.` span name and agent seed attributes.
pub fn traced_agent<F>(client: Arc<TraceClient>, options: AgentOptions, inner: F) -> Traced<F> {
    let agent = options.agent_name.unwrap_or_else(|| options.function.clone());
    let mut base = TraceOptions::new(options.function)
        .name(format!("agent.{agent}"))
        .capture_args(options.capture_inputs)
        .capture_result(options.capture_outputs)
        .attribute(keys::COMPONENT_TYPE, "agent")
        .attribute(keys::AGENT_NAME, agent);
    base.arg_names = options.arg_names;
    base.attributes.extend(options.attributes);
    traced(client, base, inner)
}

/// Configuration for a traced LLM call.
#[derive(Debug, Clone)]
pub struct LlmOptions {
    function: String,
    model: Option<String>,
    capture_prompts: bool,
    capture_responses: bool,
    arg_names: Vec<String>,
    attributes: Attributes,
}

impl LlmOptions {
    /// Creates LLM options for the named function.
    pub fn new<S: Into<String>>(function: S) -> Self {
        Self {
            function: function.into(),
            model: None,
            capture_prompts: true,
            capture_responses: true,
            arg_names: Vec::new(),
            attributes: Attributes::new(),
        }
    }

    /// Names the model being called.
    pub fn model<S: Into<String>>(mut self, model: S) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Enables or disables prompt capture.
    pub fn capture_prompts(mut self, capture: bool) -> Self {
        self.capture_prompts = capture;
        self
    }

    /// Enables or disables response capture.
    pub fn capture_responses(mut self, capture: bool) -> Self {
        self.capture_responses = capture;
        self
    }

    /// Names the function's parameters, positionally.
    pub fn arg_names(mut self, names: &[&str]) -> Self {
        self.arg_names = names.iter().map(|name| (*name).to_string()).collect();
        self
    }

    /// Seeds an extra LLM attribute.
    pub fn attribute<K: Into<String>, V: Into<AttributeValue>>(mut self, key: K, value: V) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
}

/// Wraps an LLM call. Delegates to the base wrapper with an `llm.` span
/// name and model seed attributes.
pub fn traced_llm<F>(client: Arc<TraceClient>, options: LlmOptions, inner: F) -> Traced<F> {
    let span_label = options.model.clone().unwrap_or_else(|| options.function.clone());
    let model: AttributeValue = options.model.into();
    let mut base = TraceOptions::new(options.function)
        .name(format!("llm.{span_label}"))
        .capture_args(options.capture_prompts)
        .capture_result(options.capture_responses)
        .attribute(keys::COMPONENT_TYPE, "llm")
        .attribute(keys::LLM_MODEL, model);
    base.arg_names = options.arg_names;
    base.attributes.extend(options.attributes);
    traced(client, base, inner)
}
