pub mod check;
pub mod monitor;
pub mod tools;
pub mod worker;

use std::sync::Arc;

use agl_client::{QueueApi, QueueClient};

use crate::cli::Cli;

fn connect(cli: &Cli) -> anyhow::Result<Arc<dyn QueueApi>> {
    let client = QueueClient::new(&cli.client_config())?;
    Ok(Arc::new(client))
}
