//! Graceful shutdown coordination
//!
//! One watch channel fans the shutdown signal out to the HTTP server and background
//! tasks. `shutdown()` then drains registered tasks and closes the span store.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;

use super::constants::SHUTDOWN_TIMEOUT_SECS;
use crate::data::DuckdbService;

#[derive(Clone)]
pub struct ShutdownService {
    tx: Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
    tasks: Arc<Mutex<Vec<JoinHandle<()>>>>,
    store: Arc<DuckdbService>,
}

impl ShutdownService {
    pub fn new(store: Arc<DuckdbService>) -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            tx: Arc::new(tx),
            rx,
            tasks: Arc::new(Mutex::new(Vec::new())),
            store,
        }
    }

    /// Track a background task; it is awaited (with a timeout) on shutdown
    pub async fn register(&self, handle: JoinHandle<()>) {
        self.tasks.lock().await.push(handle);
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.rx.clone()
    }

    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }

    /// Signal, drain background tasks, then checkpoint and close the store
    pub async fn shutdown(&self) {
        self.trigger();
        self.drain_tasks().await;

        if let Err(e) = self.store.checkpoint().await {
            tracing::warn!(error = %e, "Final checkpoint failed");
        }
        if let Err(e) = Arc::clone(&self.store).close().await {
            tracing::warn!(error = %e, "Closing DuckDB failed");
        }
        tracing::debug!("Shutdown complete");
    }

    async fn drain_tasks(&self) {
        let tasks = std::mem::take(&mut *self.tasks.lock().await);
        if tasks.is_empty() {
            return;
        }
        tracing::debug!(count = tasks.len(), "Waiting for background tasks");

        let timeout = Duration::from_secs(SHUTDOWN_TIMEOUT_SECS);
        if tokio::time::timeout(timeout, futures::future::join_all(tasks))
            .await
            .is_err()
        {
            tracing::warn!(
                timeout_secs = SHUTDOWN_TIMEOUT_SECS,
                "Background tasks did not stop in time"
            );
        }
    }

    /// Resolves once shutdown is triggered; owned so it can be handed to axum
    pub fn wait(&self) -> impl std::future::Future<Output = ()> + Send + 'static {
        let mut rx = self.rx.clone();
        async move {
            let _ = rx.wait_for(|triggered| *triggered).await;
        }
    }

    /// Trigger shutdown on Ctrl+C or SIGTERM
    pub fn install_signal_handlers(&self) {
        let service = self.clone();
        tokio::spawn(async move {
            let signal = wait_for_signal().await;
            tracing::info!(signal, "Shutting down");
            service.trigger();
        });
    }
}

async fn wait_for_signal() -> &'static str {
    let ctrl_c = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => "SIGINT",
            Err(e) => {
                tracing::warn!(error = %e, "Cannot listen for Ctrl+C");
                std::future::pending().await
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                "SIGTERM"
            }
            Err(e) => {
                tracing::warn!(error = %e, "Cannot install SIGTERM handler");
                std::future::pending().await
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<&'static str>();

    tokio::select! {
        name = ctrl_c => name,
        name = terminate => name,
    }
}
