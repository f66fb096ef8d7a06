pub mod health;
pub mod normalize;
pub mod poller;
pub mod supervisor;
pub mod upstream;

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::config::CollectorConfig;
use crate::config_db::ConfigDb;
use crate::storage::StorageWriter;
use supervisor::CollectorDeps;

/// Handle to the running collector; dropping it does not stop the collector — call
/// `shutdown` and `join` explicitly (mirrors the teacher's supervised-task handles).
pub struct CollectorHandle {
    join: JoinHandle<()>,
    shutdown_tx: broadcast::Sender<()>,
}

impl CollectorHandle {
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    pub async fn join(self) {
        let _ = self.join.await;
    }
}

pub fn spawn(
    client: reqwest::Client,
    config: CollectorConfig,
    writer: StorageWriter,
    registry: Arc<ConfigDb>,
) -> CollectorHandle {
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let deps = CollectorDeps {
        client,
        config,
        writer,
        registry,
    };
    let join = tokio::spawn(supervisor::run_supervisor(deps, shutdown_rx));
    CollectorHandle { join, shutdown_tx }
}
