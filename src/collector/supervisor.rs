use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, Semaphore, broadcast};

use crate::collector::health::KitHealth;
use crate::collector::poller::{poll_fast_cycle, poll_slow_cycle};
use crate::config::CollectorConfig;
use crate::config_db::{ConfigDb, RegistryEvent};
use crate::models::kit::Kit;
use crate::storage::StorageWriter;

#[derive(Clone)]
pub struct CollectorDeps {
    pub client: reqwest::Client,
    pub config: CollectorConfig,
    pub writer: StorageWriter,
    pub registry: Arc<ConfigDb>,
}

struct KitTasks {
    cancel_tx: broadcast::Sender<()>,
}

/// The supervisor (§5, §9): holds the authoritative map of live kit tasks and
/// spawns/cancels them in reaction to `RegistryEvent`s, rather than having polling
/// loops read a shared mutable kits map directly.
pub async fn run_supervisor(deps: CollectorDeps, mut shutdown_rx: broadcast::Receiver<()>) {
    let mut events = deps.registry.subscribe();
    let mut tasks: HashMap<String, KitTasks> = HashMap::new();

    let initial = match deps.registry.list_kits(None) {
        Ok(kits) => kits,
        Err(e) => {
            tracing::error!(error = %e, "supervisor: failed to load initial kit list");
            Vec::new()
        }
    };
    for kit in initial.into_iter().filter(|k| k.enabled) {
        spawn_kit(&deps, &kit, &mut tasks, &shutdown_rx);
    }

    loop {
        tokio::select! {
            biased;
            _ = shutdown_rx.recv() => {
                tracing::info!("supervisor: shutdown signal received, stopping all kit tasks");
                for (_, kit_tasks) in tasks.drain() {
                    let _ = kit_tasks.cancel_tx.send(());
                }
                break;
            }
            event = events.recv() => {
                match event {
                    Ok(RegistryEvent::Added(kit)) if kit.enabled => {
                        tracing::info!(kit_id = %kit.kit_id, "supervisor: kit added, spawning tasks");
                        spawn_kit(&deps, &kit, &mut tasks, &shutdown_rx);
                    }
                    Ok(RegistryEvent::Added(_)) => {}
                    Ok(RegistryEvent::Removed(kit_id)) => {
                        tracing::info!(kit_id, "supervisor: kit removed, cancelling tasks");
                        if let Some(kit_tasks) = tasks.remove(&kit_id) {
                            let _ = kit_tasks.cancel_tx.send(());
                        }
                    }
                    Ok(RegistryEvent::Updated(kit)) => {
                        tracing::info!(kit_id = %kit.kit_id, "supervisor: kit updated, respawning tasks");
                        if let Some(kit_tasks) = tasks.remove(&kit.kit_id) {
                            let _ = kit_tasks.cancel_tx.send(());
                        }
                        if kit.enabled {
                            spawn_kit(&deps, &kit, &mut tasks, &shutdown_rx);
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!("supervisor: registry event channel lagged by {n}");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }
}

fn spawn_kit(
    deps: &CollectorDeps,
    kit: &Kit,
    tasks: &mut HashMap<String, KitTasks>,
    shutdown_rx: &broadcast::Receiver<()>,
) {
    let (cancel_tx, _) = broadcast::channel(1);
    let health = Arc::new(Mutex::new(KitHealth::default()));
    // Bounds in-flight requests against this kit's host: fast cycle issues 2
    // concurrently, slow cycle issues 1, with headroom for an overlapping retry.
    let host_permits = Arc::new(Semaphore::new(deps.config.max_concurrent_requests_per_kit as usize));

    spawn_fast_loop(
        deps.clone(),
        kit.kit_id.clone(),
        kit.api_url.clone(),
        health.clone(),
        cancel_tx.subscribe(),
        shutdown_rx.resubscribe(),
        host_permits.clone(),
    );
    spawn_slow_loop(
        deps.clone(),
        kit.kit_id.clone(),
        kit.api_url.clone(),
        health.clone(),
        cancel_tx.subscribe(),
        shutdown_rx.resubscribe(),
        host_permits,
    );

    tasks.insert(kit.kit_id.clone(), KitTasks { cancel_tx });
}

fn spawn_fast_loop(
    deps: CollectorDeps,
    kit_id: String,
    base_url: String,
    health: Arc<Mutex<KitHealth>>,
    mut cancel_rx: broadcast::Receiver<()>,
    mut shutdown_rx: broadcast::Receiver<()>,
    host_permits: Arc<Semaphore>,
) {
    tokio::spawn(async move {
        loop {
            poll_fast_cycle(
                &kit_id,
                &base_url,
                &deps.client,
                &deps.config,
                &deps.writer,
                &health,
                &deps.registry,
                &host_permits,
            )
            .await;

            let delay = {
                let h = health.lock().await;
                h.backoff_delay(
                    Duration::from_secs(deps.config.poll_interval_fast_secs),
                    Duration::from_secs(deps.config.max_backoff_secs),
                )
            };

            tokio::select! {
                biased;
                _ = cancel_rx.recv() => break,
                _ = shutdown_rx.recv() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }
        tracing::info!(kit_id, "fast poll loop cancelled");
    });
}

fn spawn_slow_loop(
    deps: CollectorDeps,
    kit_id: String,
    base_url: String,
    health: Arc<Mutex<KitHealth>>,
    mut cancel_rx: broadcast::Receiver<()>,
    mut shutdown_rx: broadcast::Receiver<()>,
    host_permits: Arc<Semaphore>,
) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(deps.config.poll_interval_status_secs));
        loop {
            tokio::select! {
                biased;
                _ = cancel_rx.recv() => break,
                _ = shutdown_rx.recv() => break,
                _ = interval.tick() => {
                    poll_slow_cycle(&kit_id, &base_url, &deps.client, &deps.config, &deps.writer, &health, &host_permits).await;
                }
            }
        }
        tracing::info!(kit_id, "slow poll loop cancelled");
    });
}
