use std::{process::ExitCode, sync::Arc};

use tokio::{net::TcpListener, sync::mpsc::UnboundedReceiver};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use agl_core::{MetricsHandle, TaskExecutor, Worker, WorkerConfig};
use agl_exec::{ExecRouter, ProcConfig, ProcExecutor};
use agl_exporter::{SpanData, SpanExporter, SpanPipeline};
use agl_observe::Journal;
use agl_prometheus::PrometheusMetrics;
use agl_tools::{POST_ANALYSIS_TASK, PostAnalysisExecutor};

use crate::{
    cli::{Cli, WorkerArgs},
    commands::connect,
    http,
    signal::cancel_on_signal,
};

pub fn build_router(args: &WorkerArgs) -> ExecRouter {
    let mut cfg = ProcConfig::new(args.exec.clone());
    for arg in &args.args {
        cfg = cfg.arg(arg.clone());
    }
    if let Some(timeout_ms) = args.exec_timeout_ms {
        cfg = cfg.with_timeout_ms(timeout_ms);
    }
    let analyzer: Arc<dyn TaskExecutor> =
        Arc::new(ProcExecutor::new(cfg).with_name(args.exec.clone()));

    let router = ExecRouter::new().route(
        POST_ANALYSIS_TASK,
        Arc::new(PostAnalysisExecutor::new(analyzer.clone())),
    );
    if args.raw_fallback {
        router.fallback(analyzer)
    } else {
        router
    }
}

/// Exit 1 only when the server is unusable at start; once running, the
/// worker stops on SIGINT/SIGTERM and exits 0.
pub async fn run(
    cli: &Cli,
    args: &WorkerArgs,
    spans: Option<(SpanPipeline, UnboundedReceiver<SpanData>)>,
) -> anyhow::Result<ExitCode> {
    let api = connect(cli)?;
    let metrics = PrometheusMetrics::new()?;
    let handle: MetricsHandle = Arc::new(metrics.clone());

    let cfg = WorkerConfig {
        worker_id: args.worker_id.clone(),
        poll_interval_ms: args.poll_interval_ms,
        error_backoff_ms: args.error_backoff_ms,
    };
    let mut worker = Worker::new(api.clone(), Arc::new(build_router(args)), cfg)?
        .with_metrics(handle.clone())
        .with_subscriber(Arc::new(Journal::new()));

    match worker.preflight().await {
        Ok(health) => info!(server = %cli.server_url, status = %health.status, "queue server healthy"),
        Err(e) => {
            error!(server = %cli.server_url, error = %e, "queue server unavailable");
            return Ok(ExitCode::FAILURE);
        }
    }

    // Side tasks outlive the worker loop so its last spans still get out.
    let side_cancel = CancellationToken::new();

    let metrics_task = match args.metrics_addr {
        Some(addr) => {
            let listener = TcpListener::bind(addr).await?;
            Some(tokio::spawn(http::serve(
                listener,
                metrics,
                side_cancel.clone(),
            )))
        }
        None => None,
    };

    let (pipeline, exporter_task) = match spans {
        Some((pipeline, rx)) => {
            let cfg = args.export.exporter_config(&cli.client_config());
            let exporter = SpanExporter::connect(&cfg)?.with_metrics(handle);
            info!(transport = ?cfg.transport, "span export enabled");
            let cancel = side_cancel.clone();
            let task = tokio::spawn(async move { exporter.run(rx, cancel).await });
            (Some(pipeline), Some(task))
        }
        None => (None, None),
    };

    let summary = worker.run(cancel_on_signal()).await;
    if let Some(pipeline) = &pipeline {
        pipeline.shutdown();
    }
    side_cancel.cancel();

    if let Some(task) = exporter_task {
        match task.await {
            Ok(reconciled) => info!(reconciled, "span exporter stopped"),
            Err(e) => warn!(error = %e, "span exporter task failed"),
        }
    }
    if let Some(task) = metrics_task {
        match task.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %e, "metrics endpoint failed"),
            Err(e) => warn!(error = %e, "metrics task failed"),
        }
    }

    info!(
        tasks_processed = summary.tasks_processed,
        tasks_failed = summary.tasks_failed,
        "worker exited"
    );
    Ok(ExitCode::SUCCESS)
}
