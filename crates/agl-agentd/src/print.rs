//! Human-readable command output on stdout.

use agl_model::RolloutStatus;
use agl_tools::{
    Analysis, EvaluationSummary, MonitorSnapshot, Readiness, StatusSummary, SubmitReport,
};

const RULE: usize = 60;

fn rule(c: char) -> String {
    std::iter::repeat_n(c, RULE).collect()
}

fn percent(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{v:.1}%"))
}

fn status_marker(status: RolloutStatus) -> &'static str {
    match status {
        RolloutStatus::Succeeded => "✅",
        RolloutStatus::Failed => "❌",
        RolloutStatus::Running => "🔄",
        RolloutStatus::Queuing => "⏳",
        _ => "📋",
    }
}

pub fn submit(report: &SubmitReport) {
    for (post_id, rollout_id) in &report.enqueued {
        println!("  ✅ Enqueued: {rollout_id} | Post: {post_id}");
    }
    for (post_id, error) in &report.failed {
        println!("  ❌ Failed to enqueue post {post_id}: {error}");
    }
    println!(
        "\nTotal enqueued: {}/{}\n",
        report.enqueued.len(),
        report.attempted()
    );
}

pub fn evaluation(summary: &EvaluationSummary) {
    for r in &summary.rollouts {
        let marker = if r.reward.is_perfect() {
            "✅"
        } else if r.reward.category_correct {
            "⚠️"
        } else {
            "❌"
        };
        println!(
            "{marker} {}: Expected {}/{}, Got {}/{} (reward: {:.1})",
            r.rollout_id,
            r.expected.category,
            r.expected.sentiment,
            r.category.as_deref().unwrap_or("-"),
            r.sentiment.as_deref().unwrap_or("-"),
            r.reward.value,
        );
    }

    let n = summary.evaluated();
    println!("\n{}", rule('='));
    println!("Evaluation results:");
    println!("   Rollouts evaluated: {n}");
    println!("   Skipped (no ground truth or result): {}", summary.skipped);
    if summary.update_failures > 0 {
        println!("   Failed to store: {}", summary.update_failures);
    }
    println!(
        "   Perfect matches: {} ({})",
        summary.perfect(),
        percent(summary.accuracy())
    );
    println!(
        "   Category accuracy: {}/{n} ({})",
        summary.category_correct(),
        percent(summary.category_accuracy())
    );
    println!(
        "   Sentiment accuracy: {}/{n} ({})",
        summary.sentiment_correct(),
        percent(summary.sentiment_accuracy())
    );
    if n == 0 {
        println!("\n   No test rollouts found to evaluate. Run: agl submit");
    }
    println!();
}

pub fn status(summary: &StatusSummary) {
    match &summary.health {
        Some(h) if h.is_ok() => println!("✅ Server health: {}", h.status),
        Some(h) => println!("❌ Server health: {}", h.status),
        None => println!("❌ Server health: unreachable"),
    }

    println!("\nRollouts (total {}):", summary.total);
    for (status, count) in &summary.by_status {
        println!("   - {status}: {count}");
    }

    println!("\nRecent {}:", summary.recent.len());
    for r in &summary.recent {
        let mode = r.mode.map_or("N/A", |m| m.as_str());
        println!("   - {}: {} (mode: {mode})", r.rollout_id, r.status);
    }
    println!();
}

pub fn analysis(a: &Analysis) {
    println!("\nCollection progress:");
    println!("   Total rollouts: {}", a.total);
    println!("   Succeeded: {}", a.succeeded);
    println!("   Failed: {}", a.failed);
    println!("   Success rate: {}", percent(a.success_rate()));

    if let Some(t) = &a.execution_time {
        println!("\nExecution time ({} samples):", t.samples);
        println!("   Average: {:.0}ms", t.avg_ms);
        println!("   Min: {:.0}ms", t.min_ms);
        println!("   Max: {:.0}ms", t.max_ms);
    }

    if !a.categories.is_empty() {
        println!("\nCategory distribution:");
        for (category, count) in &a.categories {
            let share = *count as f64 * 100.0 / a.succeeded.max(1) as f64;
            println!("   {category:<20}: {count} ({share:.1}%)");
        }
    }

    let minimum = Analysis::training_minimum();
    println!();
    match a.readiness() {
        Readiness::NeedMoreData => println!(
            "⚠️  Need more data: {}/{minimum} succeeded rollouts. Run: agl submit",
            a.succeeded
        ),
        Readiness::Collecting => println!(
            "📊 Good progress: {}/{minimum}. Keep collecting with agl submit",
            a.succeeded
        ),
        Readiness::ReadyForTraining => {
            println!("✅ Ready for training ({} rollouts)", a.succeeded)
        }
    }
    println!();
}

pub fn snapshot(s: &MonitorSnapshot) {
    println!("\nIteration #{}", s.iteration);
    println!("{}", rule('─'));
    println!("Status summary:");
    for (status, count) in &s.by_status {
        println!("  {} {:<15}: {count}", status_marker(*status), status.as_str());
    }
    if !s.active.is_empty() {
        println!("\nRecent active rollouts:");
        for (id, status) in &s.active {
            println!("  {} {id}: {status}", status_marker(*status));
        }
    }
}
