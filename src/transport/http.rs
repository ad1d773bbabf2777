//! Streamable HTTP transport for the MCP server.
//!
//! Both the `http` and `sse` transport kinds are served by rmcp's
//! streamable HTTP service; they differ only in the endpoint path.

use crate::config::{McpServerConfig, TransportKind};
use crate::error::{DbError, DbResult};
use crate::mcp::{ClickHouseService, ServiceConnector};
use crate::transport::{Transport, wait_for_signal};
use rmcp::transport::streamable_http_server::{
    StreamableHttpService, session::local::LocalSessionManager,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

/// Time allowed for open streams to drain after a shutdown signal.
const GRACEFUL_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP transport implementation with Streamable HTTP support.
pub struct HttpTransport {
    connector: Arc<ServiceConnector>,
    query_timeout: Duration,
    kind: TransportKind,
    bind_addr: String,
}

impl HttpTransport {
    /// Create a transport for `http` or `sse` from the server settings.
    pub fn new(connector: Arc<ServiceConnector>, server: &McpServerConfig) -> Self {
        Self {
            connector,
            query_timeout: server.query_timeout_duration(),
            kind: server.transport,
            bind_addr: server.bind_addr(),
        }
    }

    pub fn bind_addr(&self) -> &str {
        &self.bind_addr
    }

    /// MCP endpoint path.
    pub fn endpoint(&self) -> &'static str {
        self.kind.endpoint()
    }
}

impl Transport for HttpTransport {
    async fn run(&self) -> DbResult<()> {
        info!(
            transport = %self.kind,
            "Starting MCP server with HTTP transport on {}",
            self.bind_addr
        );

        let connector = self.connector.clone();
        let query_timeout = self.query_timeout;
        let service = StreamableHttpService::new(
            move || Ok(ClickHouseService::new(connector.clone(), query_timeout)),
            LocalSessionManager::default().into(),
            Default::default(),
        );

        let endpoint = self.endpoint();
        let app = axum::Router::new().nest_service(endpoint, service);

        let listener = TcpListener::bind(&self.bind_addr).await.map_err(|e| {
            DbError::connection(
                format!("Failed to bind to {}: {}", self.bind_addr, e),
                "Check CLICKHOUSE_MCP_BIND_HOST and CLICKHOUSE_MCP_BIND_PORT",
            )
        })?;

        info!(endpoint = %endpoint, "MCP endpoint ready");

        let shutdown_notify = Arc::new(tokio::sync::Notify::new());
        let shutdown_notify_clone = shutdown_notify.clone();
        let shutdown_signal = async move {
            wait_for_signal().await;
            shutdown_notify_clone.notify_one();
        };

        let server = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal);

        // Streaming responses can keep the server alive indefinitely, so the
        // drain is bounded by a timeout or a second signal.
        tokio::select! {
            result = server => {
                match result {
                    Ok(()) => info!("HTTP server stopped"),
                    Err(e) => {
                        error!(error = %e, "HTTP server error");
                        return Err(DbError::internal(format!("HTTP server error: {}", e)));
                    }
                }
            }
            _ = async {
                shutdown_notify.notified().await;
                info!(
                    timeout_secs = GRACEFUL_TIMEOUT.as_secs(),
                    "Waiting for connections to close (send signal again to force exit)..."
                );
                tokio::select! {
                    _ = tokio::time::sleep(GRACEFUL_TIMEOUT) => {
                        warn!("Graceful shutdown timeout, forcing exit");
                    }
                    _ = wait_for_signal() => {
                        warn!("Received second signal, forcing immediate exit");
                    }
                }
            } => {}
        }

        Ok(())
    }

    fn name(&self) -> &'static str {
        self.kind.as_str()
    }
}
