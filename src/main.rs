//! ClickHouse MCP Server - Main entry point.
//!
//! Serves ClickHouse tools over MCP with per-request tenant roles.

use clap::Parser;
use mcp_clickhouse::config::{Config, TransportKind};
use mcp_clickhouse::db::HttpConnector;
use mcp_clickhouse::transport::{HttpTransport, StdioTransport, Transport};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initialize the tracing subscriber for logging.
///
/// Logs always go to stderr; stdout belongs to the stdio transport.
fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if config.json_logs {
        subscriber
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        subscriber
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::parse();

    init_tracing(&config);

    if let Err(e) = config.validate() {
        error!(error = %e, "Invalid configuration");
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    if !config.clickhouse.enabled {
        error!("CLICKHOUSE_ENABLED=false: no backend to serve");
        eprintln!("Error: ClickHouse is disabled and this build does not serve chDB.");
        eprintln!("Set CLICKHOUSE_ENABLED=true and provide CLICKHOUSE_HOST, CLICKHOUSE_USER, CLICKHOUSE_PASSWORD.");
        std::process::exit(1);
    }
    if config.chdb.enabled {
        warn!(
            data_path = %config.chdb.data_path,
            in_memory = config.chdb.is_in_memory(),
            "CHDB_ENABLED is set but chDB is not served by this build; ignoring"
        );
    }

    info!(
        transport = %config.server.transport,
        host = %config.clickhouse.host(),
        port = config.clickhouse.port(),
        secure = config.clickhouse.secure,
        "Starting ClickHouse MCP Server v{}",
        env!("CARGO_PKG_VERSION")
    );

    let connector = Arc::new(HttpConnector::from_config(&config.clickhouse).await?);

    let result = match config.server.transport {
        TransportKind::Stdio => {
            let transport =
                StdioTransport::new(connector, config.server.query_timeout_duration());
            transport.run().await
        }
        TransportKind::Http | TransportKind::Sse => {
            let transport = HttpTransport::new(connector, &config.server);
            info!(
                transport = transport.name(),
                bind = %transport.bind_addr(),
                endpoint = %transport.endpoint(),
                "Using HTTP transport"
            );
            transport.run().await
        }
    };

    if let Err(e) = result {
        error!(error = %e, "Server error");
        return Err(e.into());
    }

    info!("Server shutdown complete");
    Ok(())
}
