//! Finished spans recorded through the SDK, for tests.

use opentelemetry::{
    Context, KeyValue,
    trace::{Span as _, TraceContextExt, Tracer as _, TracerProvider as _},
};
use opentelemetry_sdk::trace::{InMemorySpanExporter, SdkTracerProvider, SpanData};

/// One finished trace: the root span first, then one child per name.
pub(crate) fn trace_of(root: &str, attributes: Vec<KeyValue>, children: &[&str]) -> Vec<SpanData> {
    let memory = InMemorySpanExporter::default();
    let provider = SdkTracerProvider::builder()
        .with_simple_exporter(memory.clone())
        .build();
    let tracer = provider.tracer("test");

    let root_span = tracer
        .span_builder(root.to_string())
        .with_attributes(attributes)
        .start(&tracer);
    let cx = Context::current_with_span(root_span);
    for name in children {
        tracer.start_with_context(name.to_string(), &cx).end();
    }
    cx.span().end();

    let mut spans = memory.get_finished_spans().unwrap();
    // The root ended last.
    spans.rotate_right(1);
    spans
}

/// A root span named `name` with an `agent.name` attribute and no children.
pub(crate) fn root(name: &str) -> SpanData {
    trace_of(name, vec![KeyValue::new("agent.name", "post-analyzer")], &[])
        .remove(0)
}

pub(crate) fn trace_key(span: &SpanData) -> String {
    span.span_context.trace_id().to_string()
}
