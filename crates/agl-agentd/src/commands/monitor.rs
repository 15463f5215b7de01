use std::process::ExitCode;

use agl_tools::{Monitor, MonitorConfig};

use crate::{
    cli::{Cli, MonitorArgs},
    commands::connect,
    print,
    signal::cancel_on_signal,
};

pub async fn run(cli: &Cli, args: &MonitorArgs) -> anyhow::Result<ExitCode> {
    let cfg = MonitorConfig {
        interval_ms: args.interval_ms,
        limit: args.limit,
    };
    let monitor = Monitor::new(connect(cli)?, cfg)?;

    println!("\nRollout monitor on {} - press Ctrl+C to stop", cli.server_url);
    monitor.run(cancel_on_signal(), print::snapshot).await;
    println!("\nMonitoring stopped\n");
    Ok(ExitCode::SUCCESS)
}
