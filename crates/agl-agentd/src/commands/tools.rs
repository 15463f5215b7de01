use std::process::ExitCode;

use tracing::info;

use agl_tools::{
    analyze as analyze_rollouts, check_health, evaluate as evaluate_rollouts,
    expected_classifications, load_posts, post_analysis_config, status_summary, submit_posts,
    test_posts,
};

use crate::{
    cli::{Cli, StatusArgs, SubmitArgs},
    commands::connect,
    print,
};

/// Exit 1 when the server is unreachable or nothing could be enqueued.
pub async fn submit(cli: &Cli, args: &SubmitArgs) -> anyhow::Result<ExitCode> {
    let api = connect(cli)?;
    if !check_health(api.as_ref()).await {
        println!("🔴 Queue server at {} is not reachable or unhealthy", cli.server_url);
        return Ok(ExitCode::FAILURE);
    }

    let posts = match &args.file {
        Some(path) => load_posts(path)?,
        None => test_posts(),
    };
    info!(posts = posts.len(), mode = %args.mode, "submitting posts");
    println!("\nSubmitting {} posts for analysis...\n", posts.len());

    let report = submit_posts(api.as_ref(), &posts, args.mode, post_analysis_config()).await;
    print::submit(&report);

    if report.enqueued.is_empty() && !posts.is_empty() {
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

pub async fn evaluate(cli: &Cli) -> anyhow::Result<ExitCode> {
    let api = connect(cli)?;
    let summary = evaluate_rollouts(api.as_ref(), &expected_classifications()).await?;
    print::evaluation(&summary);
    Ok(ExitCode::SUCCESS)
}

pub async fn status(cli: &Cli, args: &StatusArgs) -> anyhow::Result<ExitCode> {
    let api = connect(cli)?;
    let summary = status_summary(api.as_ref(), args.limit).await?;
    print::status(&summary);
    Ok(ExitCode::SUCCESS)
}

pub async fn analyze(cli: &Cli) -> anyhow::Result<ExitCode> {
    let api = connect(cli)?;
    let analysis = analyze_rollouts(api.as_ref()).await?;
    print::analysis(&analysis);
    Ok(ExitCode::SUCCESS)
}
