use std::future::{self, Future};

use opentelemetry::{KeyValue, trace::TracerProvider as _};
use opentelemetry_sdk::{
    Resource,
    error::{OTelSdkError, OTelSdkResult},
    trace::{SdkTracerProvider, SpanData, Tracer},
};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tracing::{Metadata, Subscriber, debug};
use tracing_subscriber::{Layer, Registry, filter::filter_fn, registry::LookupSpan};

const TRACER_NAME: &str = "agl-exporter";

/// Targets whose spans are never exported; exporting them would feed back
/// into the exporter's own HTTP calls.
const IGNORED_TARGETS: &[&str] = &[
    "agl_client",
    "agl_exporter::exporter",
    "reqwest",
    "hyper",
    "hyper_util",
    "h2",
    "tower",
];

fn is_ignored(target: &str) -> bool {
    IGNORED_TARGETS.iter().any(|t| {
        target
            .strip_prefix(t)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with("::"))
    })
}

/// Whether spans and events at this callsite reach the tracer.
pub fn is_exported(meta: &Metadata<'_>) -> bool {
    !is_ignored(meta.target())
}

/// Resource every exported span is tagged with.
pub fn service_resource(service_name: &str) -> Resource {
    Resource::builder()
        .with_service_name(service_name.to_string())
        .build()
}

/// SDK exporter handing finished spans to [`crate::SpanExporter::run`].
///
/// Correlation needs HTTP round trips, so it happens on the receiving task
/// and never inside the SDK's span processor.
#[derive(Debug)]
pub struct SpanForwarder {
    tx: UnboundedSender<SpanData>,
}

impl SpanForwarder {
    pub fn new() -> (Self, UnboundedReceiver<SpanData>) {
        let (tx, rx) = unbounded_channel();
        (Self { tx }, rx)
    }
}

impl opentelemetry_sdk::trace::SpanExporter for SpanForwarder {
    fn export(&self, batch: Vec<SpanData>) -> impl Future<Output = OTelSdkResult> + Send {
        // The receiver is gone once the exporter stopped.
        let sent = batch
            .into_iter()
            .try_for_each(|span| self.tx.send(span))
            .map_err(|_| OTelSdkError::AlreadyShutdown);
        future::ready(sent)
    }
}

/// Tracer provider feeding `tracing` spans to the span exporter.
///
/// Spans are exported one by one as they end; the receiver returned by
/// [`SpanPipeline::new`] sees them in end order.
pub struct SpanPipeline {
    provider: SdkTracerProvider,
    tracer: Tracer,
}

impl SpanPipeline {
    pub fn new(service_name: &str) -> (Self, UnboundedReceiver<SpanData>) {
        let (forwarder, rx) = SpanForwarder::new();
        let provider = SdkTracerProvider::builder()
            .with_resource(service_resource(service_name))
            .with_simple_exporter(forwarder)
            .build();
        let tracer = provider.tracer(TRACER_NAME);
        (Self { provider, tracer }, rx)
    }

    /// `tracing` layer recording spans into this pipeline.
    pub fn layer<S>(&self) -> impl Layer<S> + Send + Sync + use<S>
    where
        S: Subscriber + for<'span> LookupSpan<'span> + Send + Sync,
    {
        tracing_opentelemetry::layer()
            .with_tracer(self.tracer.clone())
            .with_filter(filter_fn(is_exported))
    }

    /// [`SpanPipeline::layer`] boxed for a registry-based subscriber.
    pub fn boxed_layer(&self) -> Box<dyn Layer<Registry> + Send + Sync + 'static> {
        Box::new(self.layer::<Registry>())
    }

    /// Stop recording. Spans ending afterwards are discarded.
    pub fn shutdown(&self) {
        if let Err(e) = self.provider.shutdown() {
            debug!(error = %e, "span pipeline shutdown");
        }
    }
}

/// Resource attributes with `extra` appended.
pub(crate) fn extend_resource(
    resource: &Resource,
    extra: impl IntoIterator<Item = KeyValue>,
) -> Resource {
    Resource::builder_empty()
        .with_attributes(
            resource
                .iter()
                .map(|(key, value)| KeyValue::new(key.clone(), value.clone())),
        )
        .with_attributes(extra)
        .build()
}
