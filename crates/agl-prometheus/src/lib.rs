//! Prometheus metrics backend for the rollout worker and span exporter.
//!
//! [`PrometheusMetrics`] implements [`agl_core::MetricsBackend`] on its own
//! [`Registry`]. Pass it to `Worker::with_metrics` and
//! `SpanExporter::with_metrics`, then serve [`PrometheusMetrics::encode`]
//! from whatever HTTP server the application already runs.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use agl_core::{MetricsBackend, MetricsHandle};
//! use agl_prometheus::PrometheusMetrics;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let metrics = PrometheusMetrics::new()?;
//! let handle: MetricsHandle = Arc::new(metrics.clone());
//! handle.record_rollout_claimed();
//!
//! let text = metrics.encode()?;
//! assert!(text.contains("agl_rollouts_claimed_total 1"));
//! # Ok(())
//! # }
//! ```
//!
//! ## Metrics
//! - `agl_rollouts_claimed_total` - Counter
//! - `agl_rollouts_completed_total{outcome}` - Counter
//! - `agl_rollout_duration_seconds{outcome}` - Histogram
//! - `agl_empty_polls_total` - Counter
//! - `agl_transport_errors_total{operation}` - Counter
//! - `agl_heartbeat_failures_total` - Counter
//! - `agl_spans_exported_total{outcome}` - Counter

mod backend;
pub use backend::PrometheusMetrics;

pub use prometheus::{Encoder, Registry, TextEncoder};
