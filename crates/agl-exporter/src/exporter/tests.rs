use std::{sync::Arc, time::Duration};

use opentelemetry::KeyValue;
use serde_json::json;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::layer::SubscriberExt;

use agl_client::fake::{Call, FakeQueue, Op};
use agl_model::{AttemptStatus, RolloutMode, RolloutStatus};

use super::*;
use crate::{
    pipeline::SpanPipeline,
    predicate::is_child,
    testing::{root, trace_key, trace_of},
};

fn exporter(fake: &Arc<FakeQueue>) -> SpanExporter {
    SpanExporter::new(fake.clone(), &ExporterConfig::default())
}

/// An agent trace: root first, then its children.
fn agent_trace(children: &[&str]) -> Vec<SpanData> {
    trace_of(
        "agent.generate",
        vec![KeyValue::new("agent.name", "post-analyzer")],
        children,
    )
}

fn sequences(fake: &FakeQueue) -> Vec<u64> {
    fake.spans().iter().map(|s| s.sequence_id).collect()
}

#[tokio::test]
async fn sequence_ids_start_at_zero_without_gaps() {
    let fake = Arc::new(FakeQueue::new());
    let exporter = exporter(&fake);
    let mut trace = agent_trace(&["llm.chat", "tool.call", "llm.chat"]);
    let last = trace.pop().unwrap();

    let report = exporter.export(trace).await;

    assert!(report.is_success());
    assert_eq!(
        report.outcomes,
        vec![
            SpanOutcome::Sent { sequence_id: 0 },
            SpanOutcome::Sent { sequence_id: 1 },
            SpanOutcome::Sent { sequence_id: 2 },
        ]
    );
    assert_eq!(sequences(&fake), vec![0, 1, 2]);
    assert_eq!(fake.count(Op::Enqueue), 1);

    // Later batches continue the same counter.
    exporter.export(vec![last]).await;
    assert_eq!(sequences(&fake), vec![0, 1, 2, 3]);
}

#[tokio::test]
async fn orphan_child_makes_no_calls() {
    let fake = Arc::new(FakeQueue::new());
    let exporter = exporter(&fake);
    let orphan = trace_of("request", vec![], &["llm.chat"]).remove(1);

    let report = exporter.export(vec![orphan]).await;

    assert_eq!(report.outcomes, vec![SpanOutcome::Orphan]);
    assert!(report.is_success());
    assert!(fake.calls().is_empty());
    assert!(exporter.store().is_empty());
}

#[tokio::test]
async fn orphan_traces_leave_no_trace_locks() {
    let fake = Arc::new(FakeQueue::new());
    let exporter = exporter(&fake);
    let orphans: Vec<SpanData> = (0..200)
        .map(|_| trace_of("request", vec![], &["llm.chat"]).remove(1))
        .collect();

    let report = exporter.export(orphans).await;

    assert_eq!(report.len(), 200);
    assert!(report.outcomes.iter().all(|o| *o == SpanOutcome::Orphan));
    assert_eq!(exporter.store().lock_count(), 0);

    // Correlated traces release their lock too.
    exporter.export(agent_trace(&["llm.chat"])).await;
    assert_eq!(exporter.store().len(), 1);
    assert_eq!(exporter.store().lock_count(), 0);
}

#[tokio::test]
async fn child_before_root_in_one_batch_is_dropped() {
    let fake = Arc::new(FakeQueue::new());
    let exporter = exporter(&fake);
    let mut trace = trace_of("request", vec![], &["db.query"]);
    let root_id = trace[0].span_context.span_id().to_string();
    trace.reverse();

    let report = exporter.export(trace).await;

    assert_eq!(
        report.outcomes,
        vec![SpanOutcome::Orphan, SpanOutcome::Sent { sequence_id: 0 }]
    );
    assert_eq!(fake.count(Op::Enqueue), 1);
    let spans = fake.spans();
    assert_eq!(spans.len(), 1);
    assert_eq!(spans[0].span_id, root_id);
    assert_eq!(spans[0].sequence_id, 0);
}

#[tokio::test]
async fn spans_of_one_trace_reuse_the_pair() {
    let fake = Arc::new(FakeQueue::new());
    let exporter = exporter(&fake);
    let mut trace = agent_trace(&["agent.step", "llm.chat"]);
    let rest = trace.split_off(1);

    exporter.export(trace).await;
    exporter.export(rest).await;

    assert_eq!(fake.count(Op::Enqueue), 1);
    assert_eq!(fake.count(Op::StartAttempt), 1);
    let spans = fake.spans();
    assert!(spans.iter().all(|s| s.rollout_id == spans[0].rollout_id));
    assert!(spans.iter().all(|s| s.attempt_id == spans[0].attempt_id));
    assert_eq!(sequences(&fake), vec![0, 1, 2]);
}

#[tokio::test]
async fn each_trace_gets_its_own_rollout() {
    let fake = Arc::new(FakeQueue::new());
    let exporter = exporter(&fake);
    let first = agent_trace(&["llm.chat"]);
    let second = root("agent.generate");

    exporter
        .export(vec![first[0].clone(), second, first[1].clone()])
        .await;

    assert_eq!(fake.count(Op::Enqueue), 2);
    assert_eq!(exporter.store().len(), 2);
    assert_eq!(sequences(&fake), vec![0, 0, 1]);
}

#[tokio::test]
async fn root_span_synthesizes_a_running_rollout() {
    let fake = Arc::new(FakeQueue::new());
    let exporter = exporter(&fake);
    let span = root("agent.generate");
    let key = trace_key(&span);

    exporter.export(vec![span]).await;

    let calls = fake.calls();
    let ops: Vec<Op> = calls.iter().map(Call::op).collect();
    assert_eq!(
        ops,
        vec![Op::Enqueue, Op::StartRollout, Op::StartAttempt, Op::AddSpan]
    );

    let Call::Enqueue(request) = &calls[0] else {
        panic!("first call should enqueue");
    };
    assert_eq!(request.mode, RolloutMode::Train);
    let config = request.config.unwrap();
    assert_eq!(config.max_attempts, Some(1));
    assert_eq!(config.timeout_seconds, Some(300));
    assert_eq!(request.input["trace_id"], json!(key));
    assert_eq!(request.input["span_name"], json!("agent.generate"));
    assert_eq!(request.input["agent"], json!("post-analyzer"));

    let correlation = exporter.store().get(&key).unwrap();
    assert_eq!(
        fake.rollout(&correlation.rollout_id).unwrap().status,
        RolloutStatus::Running
    );
}

#[tokio::test]
async fn shutdown_reconciles_every_entry_even_when_calls_fail() {
    let fake = Arc::new(FakeQueue::new());
    let exporter = exporter(&fake);
    exporter
        .export(vec![
            root("agent.one"),
            root("agent.two"),
            root("agent.three"),
        ])
        .await;
    fake.fail_always(Op::UpdateRollout);

    let reconciled = exporter.shutdown().await;

    assert_eq!(reconciled, 3);
    assert_eq!(fake.count(Op::UpdateRollout), 3);
    assert_eq!(fake.count(Op::UpdateAttempt), 3);
    assert!(exporter.store().is_empty());

    for call in fake.calls() {
        if let Call::UpdateAttempt(_, _, update) = call {
            assert_eq!(update.status, Some(AttemptStatus::Succeeded));
        }
    }

    // Nothing left to reconcile.
    assert_eq!(exporter.shutdown().await, 0);
    assert_eq!(fake.count(Op::UpdateRollout), 3);
}

#[tokio::test]
async fn failed_rollout_creation_is_retried_by_the_next_root() {
    let fake = Arc::new(FakeQueue::new());
    fake.fail(Op::Enqueue, 1);
    let exporter = exporter(&fake);
    let trace = agent_trace(&["llm.chat"]);

    let report = exporter.export(trace.clone()).await;
    assert!(matches!(
        report.outcomes[0],
        SpanOutcome::CorrelationFailed { .. }
    ));
    assert_eq!(report.outcomes[1], SpanOutcome::Orphan);
    assert!(exporter.store().is_empty());

    let report = exporter.export(vec![trace[0].clone()]).await;
    assert_eq!(report.outcomes, vec![SpanOutcome::Sent { sequence_id: 0 }]);
    assert_eq!(fake.count(Op::Enqueue), 2);
}

#[tokio::test]
async fn send_failure_is_isolated_to_its_span() {
    let fake = Arc::new(FakeQueue::new());
    fake.fail(Op::AddSpan, 1);
    let exporter = exporter(&fake);

    let report = exporter.export(agent_trace(&["llm.chat"])).await;

    assert!(!report.is_success());
    assert!(matches!(
        report.outcomes[0],
        SpanOutcome::SendFailed { sequence_id: 0, .. }
    ));
    assert_eq!(report.outcomes[1], SpanOutcome::Sent { sequence_id: 1 });
    assert_eq!(exporter.store().len(), 1);
}

#[tokio::test]
async fn concurrent_roots_of_one_trace_create_one_rollout() {
    let fake = Arc::new(FakeQueue::new().with_latency(Duration::from_millis(10)));
    let exporter = exporter(&fake);
    let trace = agent_trace(&["agent.step"]);

    let (left, right) = tokio::join!(
        exporter.export(vec![trace[0].clone()]),
        exporter.export(vec![trace[1].clone()]),
    );

    assert_eq!(fake.count(Op::Enqueue), 1);
    let mut seqs: Vec<_> = left
        .outcomes
        .into_iter()
        .chain(right.outcomes)
        .map(|o| match o {
            SpanOutcome::Sent { sequence_id } => sequence_id,
            other => panic!("unexpected outcome {:?}", other),
        })
        .collect();
    seqs.sort();
    assert_eq!(seqs, vec![0, 1]);
    assert_eq!(exporter.store().lock_count(), 0);
}

#[tokio::test]
async fn otlp_transport_posts_trace_requests() {
    let fake = Arc::new(FakeQueue::new());
    let cfg = ExporterConfig {
        transport: ExportTransport::Otlp,
        service_name: "analyzer".into(),
        ..ExporterConfig::default()
    };
    let exporter = SpanExporter::new(fake.clone(), &cfg);
    let span = root("agent.generate");
    let key = trace_key(&span);

    exporter.export(vec![span]).await;

    assert_eq!(fake.count(Op::AddSpan), 0);
    let body = fake
        .calls()
        .into_iter()
        .find_map(|c| match c {
            Call::AddOtlp(body) => Some(body),
            _ => None,
        })
        .unwrap();
    let correlation = exporter.store().get(&key).unwrap();
    assert!(body.get("resourceSpans").is_some());
    let text = body.to_string();
    assert!(text.contains("agentlightning.rollout_id"));
    assert!(text.contains(correlation.rollout_id.as_str()));
    assert!(text.contains("agentlightning.span_sequence_id"));
    assert!(text.contains("analyzer"));
}

#[tokio::test]
async fn injected_predicate_replaces_the_name_heuristic() {
    let fake = Arc::new(FakeQueue::new());
    let parentless_only = |span: &SpanData| !is_child(span);
    let exporter = exporter(&fake).with_predicate(Arc::new(parentless_only));

    let named_like_agent = trace_of("request", vec![], &["agent.run"]).remove(1);
    let report = exporter.export(vec![named_like_agent]).await;

    assert_eq!(report.outcomes, vec![SpanOutcome::Orphan]);
    assert!(fake.calls().is_empty());
}

#[tokio::test]
async fn run_exports_queued_spans_then_shuts_down() {
    let fake = Arc::new(FakeQueue::new());
    let exporter = exporter(&fake);
    let (tx, rx) = mpsc::unbounded_channel();

    for span in agent_trace(&["llm.chat"]) {
        tx.send(span).unwrap();
    }
    drop(tx);

    let reconciled = exporter.run(rx, CancellationToken::new()).await;

    assert_eq!(reconciled, 1);
    assert_eq!(fake.count(Op::AddSpan), 2);
    assert_eq!(fake.count(Op::UpdateRollout), 1);
    assert!(exporter.store().is_empty());
}

#[tokio::test]
async fn spans_recorded_through_tracing_reach_the_queue() {
    let fake = Arc::new(FakeQueue::new());
    let exporter = exporter(&fake);
    let (pipeline, rx) = SpanPipeline::new("analyzer");
    let subscriber = tracing_subscriber::registry().with(pipeline.layer());

    tracing::subscriber::with_default(subscriber, || {
        let root = tracing::info_span!("agent.generate", agent.name = "post-analyzer");
        let _root = root.enter();
        tracing::info_span!("agent.step").in_scope(|| {});
    });

    // Spans arrive in end order, the step first; its name makes it a root.
    let cancel = CancellationToken::new();
    cancel.cancel();
    let reconciled = exporter.run(rx, cancel).await;

    assert_eq!(reconciled, 1);
    assert_eq!(fake.count(Op::Enqueue), 1);
    let spans = fake.spans();
    let names: Vec<&str> = spans.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["agent.step", "agent.generate"]);
    assert_eq!(sequences(&fake), vec![0, 1]);
    assert_eq!(spans[0].parent_id.as_deref(), Some(spans[1].span_id.as_str()));
}
