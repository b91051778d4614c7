//! HTTP server with graceful shutdown

use std::future::Future;

use axum::Router;
use contracts::ServerConfig;
use tokio::net::TcpListener;
use tracing::{info, instrument, warn};

use crate::error::ServerError;
use crate::routes::router;
use crate::state::AppState;

/// SSE broadcaster HTTP server
pub struct HttpServer {
    config: ServerConfig,
    state: AppState,
}

impl HttpServer {
    pub fn new(config: ServerConfig, state: AppState) -> Self {
        Self { config, state }
    }

    pub fn socket_addr(&self) -> String {
        self.config.socket_addr()
    }

    /// Get the router (for testing)
    pub fn router(&self) -> Router {
        router(self.state.clone(), &self.config)
    }

    /// Bind the configured address and serve until `shutdown` resolves
    pub async fn serve<F>(self, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = self.socket_addr();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;
        self.serve_on(listener, shutdown).await
    }

    /// Serve on an already bound listener
    ///
    /// When `shutdown` resolves the dispatcher is shut down first, which
    /// closes every open event stream, and then in-flight requests drain.
    #[instrument(name = "http_server", skip_all)]
    pub async fn serve_on<F>(self, listener: TcpListener, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let local = listener.local_addr()?;
        info!(
            addr = %local,
            route_prefix = %self.config.route_prefix,
            cors = self.config.allow_cors,
            "HTTP server listening"
        );

        let app = self.router();
        let dispatcher = self.state.dispatcher().clone();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                shutdown.await;
                info!("Shutdown signal received, closing event streams");
                match dispatcher.shutdown().await {
                    Ok(report) => info!(
                        closed = report.closed,
                        discarded = report.discarded,
                        "Dispatcher stopped"
                    ),
                    Err(e) => warn!(error = %e, "Dispatcher already stopped"),
                }
            })
            .await?;

        info!("HTTP server stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::DeliveryConfig;
    use dispatcher::spawn_dispatcher;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;
    use tokio::sync::oneshot;

    #[tokio::test]
    async fn test_shutdown_ends_open_streams() {
        let (handle, dispatcher_task) = spawn_dispatcher(DeliveryConfig::default());
        let state = AppState::new(handle.clone(), Duration::from_secs(60));
        let server = HttpServer::new(ServerConfig::default(), state);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let server_task = tokio::spawn(server.serve_on(listener, async move {
            let _ = stop_rx.await;
        }));

        let mut client = TcpStream::connect(addr).await.unwrap();
        client
            .write_all(b"GET /events/news HTTP/1.1\r\nHost: localhost\r\n\r\n")
            .await
            .unwrap();

        // Wait until the subscription is routed
        tokio::time::timeout(Duration::from_secs(2), async {
            while handle.snapshot().await.unwrap().subscribers("news") == 0 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        stop_tx.send(()).unwrap();

        let mut response = Vec::new();
        tokio::time::timeout(Duration::from_secs(5), client.read_to_end(&mut response))
            .await
            .unwrap()
            .unwrap();
        let response = String::from_utf8_lossy(&response);
        assert!(response.starts_with("HTTP/1.1 200"));

        tokio::time::timeout(Duration::from_secs(5), server_task)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        dispatcher_task.await.unwrap();
        assert!(handle.is_closed());
    }
}
