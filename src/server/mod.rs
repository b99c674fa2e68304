use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

use crate::error::Result;
use crate::state::AppState;
use crate::web;

pub mod lifecycle;

pub use lifecycle::supervise;

/// A fixed number of HTTP workers sharing one listening socket.
///
/// Every worker accepts connections from the same listener, so the kernel
/// spreads connections across them. Workers that die are replaced; the pool
/// only stops once the shutdown channel fires.
pub struct WorkerPool {
    state: Arc<AppState>,
    listener: Arc<TcpListener>,
}

impl WorkerPool {
    /// Binds the configured `host:port`.
    pub async fn bind(state: Arc<AppState>) -> Result<Self> {
        let addr = state.config.listen_addr();
        let listener = TcpListener::bind(&addr).await?;
        Ok(Self::from_listener(state, listener))
    }

    pub fn from_listener(state: Arc<AppState>, listener: TcpListener) -> Self {
        Self {
            state,
            listener: Arc::new(listener),
        }
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub async fn run(self) -> Result<()> {
        let workers = self.state.config.server.workers;
        let restart_delay = self.state.config.restart_delay();
        tracing::info!(
            "Serving plugin registry on {} with {} workers",
            self.local_addr()?,
            workers
        );

        let mut supervisors = Vec::with_capacity(workers);
        for id in 0..workers {
            let state = self.state.clone();
            let listener = self.listener.clone();
            let make_worker = move || {
                let mut shutdown_rx = state.subscribe_shutdown();
                web::serve(state.clone(), listener.clone(), async move {
                    let _ = shutdown_rx.recv().await;
                })
            };

            supervisors.push(tokio::spawn(supervise(
                id,
                make_worker,
                self.state.subscribe_shutdown(),
                self.state.metrics.clone(),
                restart_delay,
            )));
        }

        for supervisor in supervisors {
            if let Err(e) = supervisor.await {
                tracing::error!("Worker supervisor failed: {}", e);
            }
        }

        tracing::info!("All workers stopped");
        Ok(())
    }
}
