mod report;
pub use report::{ExportReport, SpanOutcome};

use std::sync::Arc;

use opentelemetry_sdk::{Resource, trace::SpanData};
use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use agl_client::{ClientError, QueueApi, QueueClient};
use agl_core::{MetricsHandle, noop_metrics};
use agl_model::{
    AttemptStatus, AttemptUpdate, EnqueueRequest, RolloutConfig, RolloutMode, RolloutStatus,
    RolloutUpdate,
};

use crate::{
    config::{ExportTransport, ExporterConfig},
    convert::{rollout_input, to_otlp_request, to_span_record},
    error::ExportError,
    pipeline::service_resource,
    predicate::{NameHeuristic, RootSpanPredicate},
    store::{Correlation, CorrelationStore},
};

/// Upper bound on spans exported together by [`SpanExporter::run`].
const MAX_BATCH: usize = 512;

const SYNTHETIC_MAX_ATTEMPTS: u32 = 1;
const SYNTHETIC_TIMEOUT_SECONDS: u64 = 300;

pub struct SpanExporter {
    api: Arc<dyn QueueApi>,
    store: CorrelationStore,
    predicate: Arc<dyn RootSpanPredicate>,
    transport: ExportTransport,
    resource: Resource,
    metrics: MetricsHandle,
}

impl SpanExporter {
    pub fn new(api: Arc<dyn QueueApi>, cfg: &ExporterConfig) -> Self {
        Self {
            api,
            store: CorrelationStore::new(),
            predicate: Arc::new(NameHeuristic::default()),
            transport: cfg.transport,
            resource: service_resource(&cfg.service_name),
            metrics: noop_metrics(),
        }
    }

    /// Exporter talking HTTP to the configured endpoint.
    pub fn connect(cfg: &ExporterConfig) -> Result<Self, ExportError> {
        cfg.validate()?;
        let client = QueueClient::new(&cfg.client_config())?;
        Ok(Self::new(Arc::new(client), cfg))
    }

    pub fn with_predicate(mut self, predicate: Arc<dyn RootSpanPredicate>) -> Self {
        self.predicate = predicate;
        self
    }

    pub fn with_metrics(mut self, metrics: MetricsHandle) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn store(&self) -> &CorrelationStore {
        &self.store
    }

    /// Export a batch span by span.
    ///
    /// Spans are isolated from each other: a failure on one is recorded in
    /// the report and the rest of the batch is still processed.
    pub async fn export(&self, batch: Vec<SpanData>) -> ExportReport {
        let mut outcomes = Vec::with_capacity(batch.len());
        for span in &batch {
            let outcome = self.export_span(span).await;
            self.metrics.record_span_exported(outcome.label());
            outcomes.push(outcome);
        }

        let report = ExportReport::new(outcomes);
        if !report.is_success() {
            warn!(
                spans = report.len(),
                sent = report.sent(),
                failed = report.failed(),
                "span batch partially failed"
            );
        }
        report
    }

    /// Nothing is buffered, so there is nothing to flush.
    pub async fn force_flush(&self) {}

    /// Mark every open rollout and attempt `succeeded`, then forget them.
    ///
    /// Errors are ignored. Returns the number of correlations that were open.
    pub async fn shutdown(&self) -> usize {
        let open = self.store.drain();
        for c in &open {
            if let Err(e) = self
                .api
                .update_rollout(&c.rollout_id, RolloutUpdate::status(RolloutStatus::Succeeded))
                .await
            {
                debug!(rollout_id = %c.rollout_id, error = %e, "shutdown: rollout update failed");
            }
            if let Err(e) = self
                .api
                .update_attempt(
                    &c.rollout_id,
                    &c.attempt_id,
                    AttemptUpdate::status(AttemptStatus::Succeeded),
                )
                .await
            {
                debug!(attempt_id = %c.attempt_id, error = %e, "shutdown: attempt update failed");
            }
        }
        info!(reconciled = open.len(), "span exporter shut down");
        open.len()
    }

    /// Export spans from `spans` until cancelled or the channel closes, then
    /// shut down. Spans already queued at that point are still exported.
    pub async fn run(
        &self,
        mut spans: UnboundedReceiver<SpanData>,
        cancel: CancellationToken,
    ) -> usize {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                next = spans.recv() => match next {
                    Some(first) => {
                        let mut batch = vec![first];
                        while batch.len() < MAX_BATCH {
                            match spans.try_recv() {
                                Ok(span) => batch.push(span),
                                Err(_) => break,
                            }
                        }
                        self.export(batch).await;
                    }
                    None => break,
                },
            }
        }

        let mut rest = Vec::new();
        while let Ok(span) = spans.try_recv() {
            rest.push(span);
        }
        if !rest.is_empty() {
            self.export(rest).await;
        }
        self.shutdown().await
    }

    #[instrument(
        level = "trace",
        skip(self, span),
        fields(trace_id = %span.span_context.trace_id(), span_name = %span.name)
    )]
    async fn export_span(&self, span: &SpanData) -> SpanOutcome {
        let (correlation, sequence_id) = match self.correlate(span).await {
            Ok(Some(found)) => found,
            Ok(None) => {
                debug!("skipping orphan span");
                return SpanOutcome::Orphan;
            }
            Err(e) => {
                warn!(error = %e, "failed to create rollout for trace");
                return SpanOutcome::CorrelationFailed {
                    error: e.to_string(),
                };
            }
        };

        match self.send(span, &correlation, sequence_id).await {
            Ok(()) => {
                debug!(rollout_id = %correlation.rollout_id, sequence_id, "sent span");
                SpanOutcome::Sent { sequence_id }
            }
            Err(e) => {
                warn!(rollout_id = %correlation.rollout_id, sequence_id, error = %e, "failed to send span");
                SpanOutcome::SendFailed {
                    sequence_id,
                    error: e.to_string(),
                }
            }
        }
    }

    /// Resolve the rollout for the span's trace and take the next sequence id.
    ///
    /// `Ok(None)` marks an orphan. The whole lookup-or-create runs under the
    /// trace's lock, so one trace never gets two rollouts.
    async fn correlate(
        &self,
        span: &SpanData,
    ) -> Result<Option<(Correlation, u64)>, ClientError> {
        let trace_id = span.span_context.trace_id().to_string();
        let _guard = self.store.lock_trace(&trace_id).await;

        let correlation = match self.store.get(&trace_id) {
            Some(found) => found,
            None if self.predicate.is_root(span) => {
                let created = self.create_rollout(span).await?;
                self.store.insert(&trace_id, created.clone());
                created
            }
            None => return Ok(None),
        };

        let sequence_id = self.store.next_sequence(&correlation.rollout_id);
        Ok(Some((correlation, sequence_id)))
    }

    async fn create_rollout(&self, span: &SpanData) -> Result<Correlation, ClientError> {
        let timestamp = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_default();
        let request = EnqueueRequest::new(rollout_input(span, &timestamp), RolloutMode::Train)
            .with_config(RolloutConfig::new(
                SYNTHETIC_MAX_ATTEMPTS,
                SYNTHETIC_TIMEOUT_SECONDS,
            ));

        let rollout = self.api.enqueue_rollout(request).await?;
        self.api.start_rollout(&rollout.rollout_id).await?;
        let attempt_id = self.api.start_attempt(&rollout.rollout_id).await?;

        info!(
            trace_id = %span.span_context.trace_id(),
            rollout_id = %rollout.rollout_id,
            attempt_id = %attempt_id,
            "created rollout for trace"
        );
        Ok(Correlation {
            rollout_id: rollout.rollout_id,
            attempt_id,
        })
    }

    async fn send(
        &self,
        span: &SpanData,
        correlation: &Correlation,
        sequence_id: u64,
    ) -> Result<(), ExportError> {
        match self.transport {
            ExportTransport::AddSpan => {
                let record = to_span_record(span, correlation, sequence_id, &self.resource);
                self.api.add_span(&record).await?;
            }
            ExportTransport::Otlp => {
                let request = to_otlp_request(span, correlation, sequence_id, &self.resource);
                self.api
                    .add_otlp_traces(&serde_json::to_value(&request)?)
                    .await?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests;
