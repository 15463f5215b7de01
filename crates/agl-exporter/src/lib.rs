//! Span exporter: maps trace spans onto rollout/attempt records.
//!
//! `tracing` spans are recorded by an OpenTelemetry tracer provider
//! ([`SpanPipeline`]) and reach the [`SpanExporter`] as SDK `SpanData`.
//!
//! Every span is correlated to a rollout by its trace id. The first root span
//! of an unseen trace creates a rollout and an attempt on the queue server;
//! later spans of the same trace reuse that pair and receive the next
//! per-rollout sequence number. Child spans of traces this process never saw
//! the root of are dropped.
//!
//! Correlation state lives in a [`CorrelationStore`] owned by one
//! [`SpanExporter`]. It is in-memory only and does not survive a restart.

mod config;
pub use config::{DEFAULT_SERVICE_NAME, ExportTransport, ExporterConfig};

mod convert;
pub use convert::{
    epoch_seconds, rollout_input, sanitize_attributes, to_otlp_request, to_span_record,
};

mod error;
pub use error::ExportError;

mod exporter;
pub use exporter::{ExportReport, SpanExporter, SpanOutcome};

pub use opentelemetry_sdk::trace::SpanData;

mod pipeline;
pub use pipeline::{SpanForwarder, SpanPipeline, is_exported, service_resource};

mod predicate;
pub use predicate::{NameHeuristic, RootSpanPredicate, is_child};

mod store;
pub use store::{Correlation, CorrelationStore, TraceGuard};

#[cfg(test)]
mod testing;
