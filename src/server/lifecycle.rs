use std::future::Future;
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::TryRecvError};
use tokio::time::{sleep, Duration};

use crate::state::Metrics;

/// Keeps one worker slot occupied until shutdown.
///
/// `make_worker` is called for every (re)spawn. A worker that returns or
/// panics before shutdown is replaced after `restart_delay`. Returns how many
/// times the slot was refilled.
pub async fn supervise<F, Fut>(
    id: usize,
    make_worker: F,
    mut shutdown_rx: broadcast::Receiver<()>,
    metrics: Arc<Metrics>,
    restart_delay: Duration,
) -> u32
where
    F: Fn() -> Fut,
    Fut: Future<Output = ()> + Send + 'static,
{
    let mut restart_count = 0;

    loop {
        let mut worker = tokio::spawn(make_worker());
        metrics.active_workers.inc();
        tracing::debug!("Worker {} started", id);

        tokio::select! {
            _ = shutdown_rx.recv() => {
                // the worker watches the same signal and drains on its own
                if let Err(e) = worker.await {
                    tracing::error!("Worker {} failed while stopping: {}", id, e);
                }
                metrics.active_workers.dec();
                tracing::debug!("Worker {} stopped", id);
                return restart_count;
            }
            exit = &mut worker => {
                metrics.active_workers.dec();

                if shutdown_requested(&mut shutdown_rx) {
                    return restart_count;
                }

                match exit {
                    Ok(()) => tracing::error!("Worker {} exited unexpectedly", id),
                    Err(e) => tracing::error!("Worker {} died: {}", id, e),
                }
            }
        }

        restart_count += 1;
        metrics.worker_restarts.inc();

        if !restart_delay.is_zero() {
            tracing::info!("Waiting {:?} before restarting worker {}", restart_delay, id);
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    tracing::debug!("Worker {} not restarted, shutting down", id);
                    return restart_count;
                }
                _ = sleep(restart_delay) => {}
            }
        }

        // a replacement would subscribe too late to see an earlier signal
        if shutdown_requested(&mut shutdown_rx) {
            return restart_count;
        }
        tracing::info!("Restarting worker {} (restart count: {})", id, restart_count);
    }
}

fn shutdown_requested(shutdown_rx: &mut broadcast::Receiver<()>) -> bool {
    !matches!(shutdown_rx.try_recv(), Err(TryRecvError::Empty))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_crashed_worker_is_replaced() {
        let (shutdown_tx, shutdown_rx) = broadcast::channel(4);
        let metrics = Arc::new(Metrics::new());
        let spawned = Arc::new(AtomicU32::new(0));

        let worker_shutdown = shutdown_tx.clone();
        let counter = spawned.clone();
        let supervisor = tokio::spawn(supervise(
            0,
            move || {
                let attempt = counter.fetch_add(1, Ordering::SeqCst);
                let mut rx = worker_shutdown.subscribe();
                async move {
                    match attempt {
                        0 => panic!("worker blew up"),
                        1 => {}
                        _ => {
                            let _ = rx.recv().await;
                        }
                    }
                }
            },
            shutdown_rx,
            metrics.clone(),
            Duration::from_millis(1),
        ));

        while spawned.load(Ordering::SeqCst) < 3 {
            tokio::task::yield_now().await;
        }
        shutdown_tx.send(()).unwrap();

        assert_eq!(supervisor.await.unwrap(), 2);
        assert_eq!(metrics.worker_restarts.get(), 2);
        assert_eq!(metrics.active_workers.get(), 0);
    }

    #[tokio::test]
    async fn test_shutdown_during_restart_delay() {
        let (shutdown_tx, shutdown_rx) = broadcast::channel(4);
        let metrics = Arc::new(Metrics::new());
        let spawned = Arc::new(AtomicU32::new(0));

        let counter = spawned.clone();
        let supervisor = tokio::spawn(supervise(
            1,
            move || {
                let attempt = counter.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt > 0 {
                        // never listens for shutdown
                        std::future::pending::<()>().await;
                    }
                }
            },
            shutdown_rx,
            metrics.clone(),
            Duration::from_millis(200),
        ));

        while metrics.worker_restarts.get() == 0 {
            tokio::task::yield_now().await;
        }
        shutdown_tx.send(()).unwrap();

        let restarts = tokio::time::timeout(Duration::from_secs(2), supervisor)
            .await
            .expect("supervisor should stop without respawning")
            .unwrap();
        assert_eq!(restarts, 1);
        assert_eq!(spawned.load(Ordering::SeqCst), 1);
        assert_eq!(metrics.active_workers.get(), 0);
    }

    #[tokio::test]
    async fn test_shutdown_without_failures() {
        let (shutdown_tx, shutdown_rx) = broadcast::channel(4);
        let metrics = Arc::new(Metrics::new());

        let worker_shutdown = shutdown_tx.clone();
        let supervisor = tokio::spawn(supervise(
            3,
            move || {
                let mut rx = worker_shutdown.subscribe();
                async move {
                    let _ = rx.recv().await;
                }
            },
            shutdown_rx,
            metrics.clone(),
            Duration::ZERO,
        ));

        while metrics.active_workers.get() == 0 {
            tokio::task::yield_now().await;
        }
        shutdown_tx.send(()).unwrap();

        assert_eq!(supervisor.await.unwrap(), 0);
        assert_eq!(metrics.worker_restarts.get(), 0);
    }
}
