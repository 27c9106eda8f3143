use std::net::SocketAddr;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use vitals_server::{Server, ServerConfig};

const READY_TIMEOUT: Duration = Duration::from_secs(30);

/// A telemetry server running inside this process on an ephemeral port.
///
/// Dropping it signals graceful shutdown.
pub struct LocalServer {
    pub addr: SocketAddr,
    pub capacity: usize,
    shutdown_tx: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl LocalServer {
    /// Bind on `127.0.0.1:0`, wait until the listener is ready, and return the live server.
    pub async fn spawn(capacity: usize) -> Result<Self, String> {
        let (ready_tx, ready_rx) = oneshot::channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let config = ServerConfig {
            address: "127.0.0.1:0".parse().map_err(|e| format!("bad bind address: {e}"))?,
            capacity,
        };

        let handle = tokio::spawn(async move {
            let shutdown = async move {
                shutdown_rx.await.ok();
            };
            if let Err(e) = Server::new(config).serve(ready_tx, shutdown).await {
                eprintln!("server exited with error: {e}");
            }
        });

        let addr = timeout(READY_TIMEOUT, ready_rx)
            .await
            .map_err(|_| format!("server not ready within {}s", READY_TIMEOUT.as_secs()))?
            .map_err(|_| "server exited before binding".to_string())?;

        Ok(Self { addr, capacity, shutdown_tx: Some(shutdown_tx), handle: Some(handle) })
    }

    /// Signal shutdown and wait for in-flight requests to drain.
    pub async fn stop(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            tx.send(()).ok();
        }
        if let Some(handle) = self.handle.take() {
            handle.await.ok();
        }
    }
}

impl Drop for LocalServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            tx.send(()).ok();
        }
    }
}
