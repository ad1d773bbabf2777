//! Configuration handling for the ClickHouse MCP Server.
//!
//! This module provides configuration management via CLI arguments and environment variables.
//! The [`Config`] is parsed and validated once at startup, then shared read-only.

use crate::error::ConfigError;
use clap::{ArgAction, Args, Parser};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use url::Url;

pub const DEFAULT_SECURE_PORT: u16 = 8443;
pub const DEFAULT_INSECURE_PORT: u16 = 8123;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_SEND_RECEIVE_TIMEOUT_SECS: u64 = 300;
pub const DEFAULT_CHDB_DATA_PATH: &str = ":memory:";

// MCP server defaults
pub const DEFAULT_BIND_HOST: &str = "127.0.0.1";
pub const DEFAULT_BIND_PORT: u16 = 8000;
pub const DEFAULT_QUERY_TIMEOUT_SECS: u64 = 30;

/// Environment variables that must be present when ClickHouse is enabled.
pub const ENV_HOST: &str = "CLICKHOUSE_HOST";
pub const ENV_USER: &str = "CLICKHOUSE_USER";
pub const ENV_PASSWORD: &str = "CLICKHOUSE_PASSWORD";
pub const ENV_QUERY_TIMEOUT: &str = "CLICKHOUSE_MCP_QUERY_TIMEOUT";

/// Flag semantics shared by every boolean setting: only "true" (any case) is true.
fn parse_flag(value: &str) -> Result<bool, std::convert::Infallible> {
    Ok(value.trim().eq_ignore_ascii_case("true"))
}

/// Transport kind for the MCP server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportKind {
    /// Standard input/output (for CLI integration)
    #[default]
    Stdio,
    /// Streamable HTTP
    Http,
    /// Streamable HTTP served on the legacy SSE path
    Sse,
}

impl TransportKind {
    pub const ALL: [TransportKind; 3] = [Self::Stdio, Self::Http, Self::Sse];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stdio => "stdio",
            Self::Http => "http",
            Self::Sse => "sse",
        }
    }

    /// Endpoint path the HTTP-based transports are mounted on.
    pub fn endpoint(&self) -> &'static str {
        match self {
            Self::Stdio => "/",
            Self::Http => "/mcp",
            Self::Sse => "/sse",
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransportKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == value)
            .ok_or_else(|| ConfigError::InvalidTransport {
                value,
                valid: Self::ALL
                    .iter()
                    .map(|kind| format!("\"{}\"", kind))
                    .collect::<Vec<_>>()
                    .join(", "),
            })
    }
}

/// Where the ClickHouse password comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PasswordSpec {
    /// Read directly from `CLICKHOUSE_PASSWORD`.
    Literal(String),
    /// Fetched from AWS SSM Parameter Store on every session.
    SsmPath(String),
}

/// ClickHouse connection settings.
#[derive(Debug, Clone, Args)]
pub struct ClickHouseConfig {
    /// Enable the ClickHouse backend
    #[arg(
        id = "clickhouse_enabled",
        long = "clickhouse-enabled",
        env = "CLICKHOUSE_ENABLED",
        default_value = "true",
        value_parser = parse_flag,
        action = ArgAction::Set
    )]
    pub enabled: bool,

    /// ClickHouse server hostname
    #[arg(long = "clickhouse-host", env = "CLICKHOUSE_HOST")]
    pub host: Option<String>,

    /// Port (default: 8443 when secure, 8123 otherwise)
    #[arg(long = "clickhouse-port", env = "CLICKHOUSE_PORT")]
    pub port: Option<u16>,

    /// Username for authentication
    #[arg(long = "clickhouse-user", env = "CLICKHOUSE_USER")]
    pub username: Option<String>,

    /// Password for authentication (sensitive - not logged)
    #[arg(long = "clickhouse-password", env = "CLICKHOUSE_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// SSM parameter path to read the password from instead of CLICKHOUSE_PASSWORD
    #[arg(
        long = "clickhouse-password-ssm-path",
        env = "CLICKHOUSE_PASSWORD_FROM_SSM_PATH"
    )]
    pub password_ssm_path: Option<String>,

    /// Default database
    #[arg(long = "clickhouse-database", env = "CLICKHOUSE_DATABASE")]
    pub database: Option<String>,

    /// Use HTTPS
    #[arg(
        long = "clickhouse-secure",
        env = "CLICKHOUSE_SECURE",
        default_value = "true",
        value_parser = parse_flag,
        action = ArgAction::Set
    )]
    pub secure: bool,

    /// Verify TLS certificates
    #[arg(
        long = "clickhouse-verify",
        env = "CLICKHOUSE_VERIFY",
        default_value = "true",
        value_parser = parse_flag,
        action = ArgAction::Set
    )]
    pub verify: bool,

    /// Connection timeout in seconds
    #[arg(
        long = "clickhouse-connect-timeout",
        env = "CLICKHOUSE_CONNECT_TIMEOUT",
        default_value_t = DEFAULT_CONNECT_TIMEOUT_SECS
    )]
    pub connect_timeout: u64,

    /// Send/receive timeout in seconds
    #[arg(
        long = "clickhouse-send-receive-timeout",
        env = "CLICKHOUSE_SEND_RECEIVE_TIMEOUT",
        default_value_t = DEFAULT_SEND_RECEIVE_TIMEOUT_SECS
    )]
    pub send_receive_timeout: u64,

    /// Path prefix for servers behind an HTTP proxy
    #[arg(long = "clickhouse-proxy-path", env = "CLICKHOUSE_PROXY_PATH")]
    pub proxy_path: Option<String>,
}

impl Default for ClickHouseConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: None,
            port: None,
            username: None,
            password: None,
            password_ssm_path: None,
            database: None,
            secure: true,
            verify: true,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT_SECS,
            send_receive_timeout: DEFAULT_SEND_RECEIVE_TIMEOUT_SECS,
            proxy_path: None,
        }
    }
}

impl ClickHouseConfig {
    /// Check that every required setting is present, reporting all missing ones at once.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut names = Vec::new();
        if self.host.is_none() {
            names.push(ENV_HOST.to_string());
        }
        if self.username.is_none() {
            names.push(ENV_USER.to_string());
        }
        if self.password.is_none() && self.password_ssm_path.is_none() {
            names.push(ENV_PASSWORD.to_string());
        }

        if names.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::MissingRequiredSetting { names })
        }
    }

    pub fn host(&self) -> &str {
        self.host.as_deref().unwrap_or_default()
    }

    pub fn username(&self) -> &str {
        self.username.as_deref().unwrap_or_default()
    }

    /// Effective port: explicit override, else derived from `secure`.
    pub fn port(&self) -> u16 {
        self.port.unwrap_or(if self.secure {
            DEFAULT_SECURE_PORT
        } else {
            DEFAULT_INSECURE_PORT
        })
    }

    pub fn scheme(&self) -> &'static str {
        if self.secure { "https" } else { "http" }
    }

    /// Password indirection. An SSM path wins over a literal password.
    pub fn password_spec(&self) -> PasswordSpec {
        match self.password_ssm_path.as_deref().filter(|p| !p.is_empty()) {
            Some(path) => PasswordSpec::SsmPath(path.to_string()),
            None => PasswordSpec::Literal(self.password.clone().unwrap_or_default()),
        }
    }

    pub fn connect_timeout_duration(&self) -> Duration {
        Duration::from_secs(self.connect_timeout)
    }

    pub fn send_receive_timeout_duration(&self) -> Duration {
        Duration::from_secs(self.send_receive_timeout)
    }

    /// Base URL of the HTTP interface, including the proxy path if any.
    pub fn endpoint_url(&self) -> Result<Url, ConfigError> {
        let base = format!("{}://{}:{}/", self.scheme(), self.host(), self.port());
        let mut url = Url::parse(&base).map_err(|e| ConfigError::InvalidValue {
            name: ENV_HOST.to_string(),
            message: e.to_string(),
        })?;

        if let Some(path) = self.proxy_path.as_deref() {
            let trimmed = path.trim_matches('/');
            if !trimmed.is_empty() {
                url.set_path(&format!("{}/", trimmed));
            }
        }
        Ok(url)
    }
}

/// chDB (embedded engine) settings.
#[derive(Debug, Clone, Args)]
pub struct ChDbConfig {
    /// Enable the embedded chDB engine
    #[arg(
        id = "chdb_enabled",
        long = "chdb-enabled",
        env = "CHDB_ENABLED",
        default_value = "false",
        value_parser = parse_flag,
        action = ArgAction::Set
    )]
    pub enabled: bool,

    /// chDB data directory
    #[arg(long = "chdb-data-path", env = "CHDB_DATA_PATH", default_value = DEFAULT_CHDB_DATA_PATH)]
    pub data_path: String,
}

impl Default for ChDbConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            data_path: DEFAULT_CHDB_DATA_PATH.to_string(),
        }
    }
}

impl ChDbConfig {
    /// chDB has no required settings; `data_path` always resolves.
    pub fn validate(&self) -> Result<(), ConfigError> {
        Ok(())
    }

    pub fn is_in_memory(&self) -> bool {
        self.data_path == DEFAULT_CHDB_DATA_PATH
    }
}

/// MCP server-level settings, independent of ClickHouse validation.
#[derive(Debug, Clone, Args)]
pub struct McpServerConfig {
    /// Transport: stdio, http or sse
    #[arg(
        short,
        long,
        env = "CLICKHOUSE_MCP_SERVER_TRANSPORT",
        default_value = "stdio"
    )]
    pub transport: TransportKind,

    /// Host to bind to (http/sse only)
    #[arg(long, env = "CLICKHOUSE_MCP_BIND_HOST", default_value = DEFAULT_BIND_HOST)]
    pub bind_host: String,

    /// Port to bind to (http/sse only)
    #[arg(long, env = "CLICKHOUSE_MCP_BIND_PORT", default_value_t = DEFAULT_BIND_PORT)]
    pub bind_port: u16,

    /// Timeout for run_select_query in seconds (at least 1)
    #[arg(
        long,
        env = "CLICKHOUSE_MCP_QUERY_TIMEOUT",
        default_value_t = DEFAULT_QUERY_TIMEOUT_SECS,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub query_timeout: u64,
}

impl Default for McpServerConfig {
    fn default() -> Self {
        Self {
            transport: TransportKind::Stdio,
            bind_host: DEFAULT_BIND_HOST.to_string(),
            bind_port: DEFAULT_BIND_PORT,
            query_timeout: DEFAULT_QUERY_TIMEOUT_SECS,
        }
    }
}

impl McpServerConfig {
    /// A zero query timeout would fail every run_select_query immediately.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.query_timeout == 0 {
            return Err(ConfigError::InvalidValue {
                name: ENV_QUERY_TIMEOUT.to_string(),
                message: "must be at least 1 second".to_string(),
            });
        }
        Ok(())
    }

    /// Get the HTTP bind address.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.bind_host, self.bind_port)
    }

    /// Get the query timeout as a Duration.
    pub fn query_timeout_duration(&self) -> Duration {
        Duration::from_secs(self.query_timeout)
    }
}

/// Configuration for the ClickHouse MCP Server.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "mcp-clickhouse",
    about = "MCP server for ClickHouse with per-request row-level security",
    version,
    author
)]
pub struct Config {
    #[command(flatten)]
    pub clickhouse: ClickHouseConfig,

    #[command(flatten)]
    pub chdb: ChDbConfig,

    #[command(flatten)]
    pub server: McpServerConfig,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "CLICKHOUSE_MCP_LOG_LEVEL")]
    pub log_level: String,

    /// Enable JSON logging format
    #[arg(long, env = "CLICKHOUSE_MCP_JSON_LOGS")]
    pub json_logs: bool,
}

impl Config {
    /// Validate the server settings and every enabled subsystem.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;
        if self.clickhouse.enabled {
            self.clickhouse.validate()?;
        }
        if self.chdb.enabled {
            self.chdb.validate()?;
        }
        Ok(())
    }

    /// Create a default configuration (useful for testing).
    pub fn default_config() -> Self {
        Self {
            clickhouse: ClickHouseConfig::default(),
            chdb: ChDbConfig::default(),
            server: McpServerConfig::default(),
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::default_config()
    }
}
