use std::time::Duration;

use agl_core::{MetricsBackend, TaskOutcome};
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
    proto::MetricFamily,
};

/// Rollouts are agent runs; most finish within seconds, some take minutes.
const DURATION_BUCKETS: &[f64] = &[0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0];

#[derive(Clone)]
pub struct PrometheusMetrics {
    registry: Registry,
    rollouts_claimed: IntCounter,
    rollouts_completed: IntCounterVec,
    rollout_duration: HistogramVec,
    empty_polls: IntCounter,
    transport_errors: IntCounterVec,
    heartbeat_failures: IntCounter,
    spans_exported: IntCounterVec,
}

impl PrometheusMetrics {
    /// Create the backend with a fresh registry.
    pub fn new() -> Result<Self, prometheus::Error> {
        Self::with_registry(Registry::new())
    }

    /// Register all metrics on an existing registry.
    pub fn with_registry(registry: Registry) -> Result<Self, prometheus::Error> {
        let rollouts_claimed = IntCounter::with_opts(Opts::new(
            "agl_rollouts_claimed_total",
            "Rollouts dequeued by this worker",
        ))?;
        let rollouts_completed = IntCounterVec::new(
            Opts::new(
                "agl_rollouts_completed_total",
                "Rollouts settled by this worker",
            ),
            &["outcome"],
        )?;
        let rollout_duration = HistogramVec::new(
            HistogramOpts::new(
                "agl_rollout_duration_seconds",
                "Executor wall time per rollout",
            )
            .buckets(DURATION_BUCKETS.to_vec()),
            &["outcome"],
        )?;
        let empty_polls = IntCounter::with_opts(Opts::new(
            "agl_empty_polls_total",
            "Dequeue calls that found no rollout",
        ))?;
        let transport_errors = IntCounterVec::new(
            Opts::new(
                "agl_transport_errors_total",
                "Failed calls to the queue server",
            ),
            &["operation"],
        )?;
        let heartbeat_failures = IntCounter::with_opts(Opts::new(
            "agl_heartbeat_failures_total",
            "Heartbeats that could not be delivered",
        ))?;
        let spans_exported = IntCounterVec::new(
            Opts::new("agl_spans_exported_total", "Spans handled by the exporter"),
            &["outcome"],
        )?;

        registry.register(Box::new(rollouts_claimed.clone()))?;
        registry.register(Box::new(rollouts_completed.clone()))?;
        registry.register(Box::new(rollout_duration.clone()))?;
        registry.register(Box::new(empty_polls.clone()))?;
        registry.register(Box::new(transport_errors.clone()))?;
        registry.register(Box::new(heartbeat_failures.clone()))?;
        registry.register(Box::new(spans_exported.clone()))?;

        Ok(Self {
            registry,
            rollouts_claimed,
            rollouts_completed,
            rollout_duration,
            empty_polls,
            transport_errors,
            heartbeat_failures,
            spans_exported,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn gather(&self) -> Vec<MetricFamily> {
        self.registry.gather()
    }

    /// Text exposition format, ready to serve on `/metrics`.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

impl MetricsBackend for PrometheusMetrics {
    fn record_rollout_claimed(&self) {
        self.rollouts_claimed.inc();
    }

    fn record_rollout_completed(&self, outcome: TaskOutcome, duration: Duration) {
        let label = outcome.as_str();
        self.rollouts_completed.with_label_values(&[label]).inc();
        self.rollout_duration
            .with_label_values(&[label])
            .observe(duration.as_secs_f64());
    }

    fn record_empty_poll(&self) {
        self.empty_polls.inc();
    }

    fn record_transport_error(&self, operation: &'static str) {
        self.transport_errors.with_label_values(&[operation]).inc();
    }

    fn record_heartbeat_failure(&self) {
        self.heartbeat_failures.inc();
    }

    fn record_span_exported(&self, outcome: &'static str) {
        self.spans_exported.with_label_values(&[outcome]).inc();
    }
}
