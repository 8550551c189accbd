use crate::connection::serve_connection;
use crate::handlers::{Handler, ServeMux};
use crate::server::config::ServerConfig;
use crate::stream::StreamRegistry;
use crate::{Error, Result};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// An embeddable RTMP server: a listener, a handler and the shared stream
/// registry. With the default handler it accepts publishers and fans their
/// packets out to players with no further wiring.
pub struct Server {
    config: Arc<ServerConfig>,
    handler: Arc<dyn Handler>,
    streams: Arc<StreamRegistry>,
    shutdown: CancellationToken,
}

impl Server {
    /// Server with the default `ServeMux` handler.
    pub fn new(config: ServerConfig) -> Self {
        let streams = Arc::new(StreamRegistry::new(config.ring_capacity));
        let handler = Arc::new(ServeMux::new(streams.clone()));
        Server::assemble(config, handler, streams)
    }

    /// Server with a custom handler. The registry is still created so the
    /// handler can share it (`ServeMux::new` takes the same `Arc`).
    pub fn with_handler(config: ServerConfig, handler: Arc<dyn Handler>) -> Self {
        let streams = Arc::new(StreamRegistry::new(config.ring_capacity));
        Server::assemble(config, handler, streams)
    }

    fn assemble(
        config: ServerConfig,
        handler: Arc<dyn Handler>,
        streams: Arc<StreamRegistry>,
    ) -> Self {
        Server {
            config: Arc::new(config),
            handler,
            streams,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// The published-stream registry shared with handlers.
    pub fn streams(&self) -> Arc<StreamRegistry> {
        self.streams.clone()
    }

    /// Accept connections until shutdown. Each connection runs in its own
    /// task and owns its protocol state end to end.
    pub async fn listen_and_serve(&self) -> Result<()> {
        if self.shutdown.is_cancelled() {
            return Err(Error::ServerClosed);
        }

        let listener = TcpListener::bind(&self.config.addr)
            .await
            .map_err(|e| Error::connection(format!("bind {}: {}", self.config.addr, e)))?;
        info!(addr = %self.config.addr, "rtmp server listening");

        loop {
            let accepted = tokio::select! {
                _ = self.shutdown.cancelled() => return Err(Error::ServerClosed),
                accepted = listener.accept() => accepted,
            };

            let (socket, peer_addr) = match accepted {
                Ok(pair) => pair,
                Err(e) => {
                    if self.shutdown.is_cancelled() {
                        return Err(Error::ServerClosed);
                    }
                    warn!(error = %e, "accept failed");
                    continue;
                }
            };

            if let Err(e) = socket.set_nodelay(true) {
                warn!(error = %e, "failed to set TCP_NODELAY");
            }
            info!(peer = %peer_addr, "connection accepted");

            let config = self.config.clone();
            let handler = self.handler.clone();
            let streams = self.streams.clone();
            tokio::spawn(async move {
                serve_connection(socket, peer_addr.to_string(), config, handler, streams).await;
            });
        }
    }

    /// Cooperative shutdown: stop accepting and make `listen_and_serve`
    /// return `ServerClosed`. In-flight connections run to natural close.
    pub fn shutdown(&self) {
        info!("rtmp server shutting down");
        self.shutdown.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_listen_after_shutdown_is_closed() {
        let config = ServerConfig::builder()
            .addr("127.0.0.1:0")
            .build()
            .unwrap();
        let server = Server::new(config);
        server.shutdown();
        assert!(matches!(
            server.listen_and_serve().await,
            Err(Error::ServerClosed)
        ));
    }

    #[tokio::test]
    async fn test_shutdown_stops_accept_loop() {
        let config = ServerConfig::builder()
            .addr("127.0.0.1:0")
            .build()
            .unwrap();
        let server = Arc::new(Server::new(config));

        let task = {
            let server = server.clone();
            tokio::spawn(async move { server.listen_and_serve().await })
        };
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        server.shutdown();
        let result = task.await.unwrap();
        assert!(matches!(result, Err(Error::ServerClosed)));
    }
}
