//! Stdio transport for the MCP server.
//!
//! JSON-RPC messages are read from stdin and responses written to stdout.
//! Logs go to stderr so they never interleave with the protocol stream.

use crate::error::{DbError, DbResult};
use crate::mcp::{ClickHouseService, ServiceConnector};
use crate::transport::{Transport, wait_for_signal};
use rmcp::{ServiceExt, transport::stdio};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Stdio transport implementation.
pub struct StdioTransport {
    connector: Arc<ServiceConnector>,
    query_timeout: Duration,
}

impl StdioTransport {
    pub fn new(connector: Arc<ServiceConnector>, query_timeout: Duration) -> Self {
        Self {
            connector,
            query_timeout,
        }
    }
}

impl Transport for StdioTransport {
    async fn run(&self) -> DbResult<()> {
        info!("Starting MCP server with stdio transport");

        let service = ClickHouseService::new(self.connector.clone(), self.query_timeout);
        let running_service = service
            .serve(stdio())
            .await
            .map_err(|e| DbError::internal(format!("Failed to start stdio transport: {}", e)))?;

        let shutdown_requested = tokio::select! {
            result = running_service.waiting() => {
                match result {
                    Ok(_quit_reason) => info!("Stdio transport completed normally"),
                    Err(e) => {
                        warn!(error = %e, "Stdio transport error");
                        return Err(DbError::internal(format!("Stdio transport error: {}", e)));
                    }
                }
                false
            }
            _ = wait_for_signal() => {
                info!("Shutdown signal received");
                true
            }
        };

        if shutdown_requested {
            // A blocking stdin read cannot be interrupted from here
            info!("Exiting process");
            std::process::exit(0);
        }

        Ok(())
    }

    fn name(&self) -> &'static str {
        "stdio"
    }
}
