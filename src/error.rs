//! Error types for the ClickHouse MCP Server.
//!
//! This module defines all error types using `thiserror` for ergonomic error handling.
//! Per-call errors carry the backend's cause text so operators can diagnose them,
//! and map onto MCP error codes in [`From<DbError> for rmcp::ErrorData`].

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    /// The request metadata carried no usable `company_id`.
    #[error("company_id is required")]
    MissingTenantContext,

    /// The backend rejected `SET role` for the caller's tenant.
    #[error("Failed to set role: {message}")]
    TenantScope { role: String, message: String },

    /// The tool's own statement failed after the tenant scope was applied.
    #[error("Query execution failed: {message}")]
    QueryExecution { message: String },

    #[error("Connection failed: {message}")]
    Connection { message: String, suggestion: String },

    #[error("Database error: {message}")]
    Database {
        message: String,
        /// ClickHouse exception code, e.g. "60" for unknown table
        code: Option<String>,
        suggestion: String,
    },

    #[error("Permission denied: {operation} - {reason}")]
    Permission { operation: String, reason: String },

    #[error("Timeout: {operation} exceeded {elapsed_secs}s")]
    Timeout {
        operation: String,
        elapsed_secs: u64,
    },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Configuration errors. Fatal at startup, never produced per call except
/// for secret-store fetches, which happen whenever a session is opened.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required environment variables: {}", .names.join(", "))]
    MissingRequiredSetting { names: Vec<String> },

    #[error("Invalid transport '{value}'. Valid options: {valid}")]
    InvalidTransport { value: String, valid: String },

    #[error("Failed to retrieve password from SSM path '{path}': {message}")]
    SecretFetch { path: String, message: String },

    #[error("Invalid value for {name}: {message}")]
    InvalidValue { name: String, message: String },
}

impl DbError {
    /// Create a tenant scope error for the given role.
    pub fn tenant_scope(role: impl Into<String>, message: impl Into<String>) -> Self {
        Self::TenantScope {
            role: role.into(),
            message: message.into(),
        }
    }

    /// Create a query execution error.
    pub fn query_execution(message: impl Into<String>) -> Self {
        Self::QueryExecution {
            message: message.into(),
        }
    }

    /// Create a connection error with a helpful suggestion.
    pub fn connection(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Create a database error with optional exception code.
    pub fn database(
        message: impl Into<String>,
        code: Option<String>,
        suggestion: impl Into<String>,
    ) -> Self {
        Self::Database {
            message: message.into(),
            code,
            suggestion: suggestion.into(),
        }
    }

    /// Create a permission error.
    pub fn permission(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Permission {
            operation: operation.into(),
            reason: reason.into(),
        }
    }

    /// Create a timeout error.
    pub fn timeout(operation: impl Into<String>, elapsed_secs: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            elapsed_secs,
        }
    }

    /// Create an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Get the suggestion for this error, if available.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::MissingTenantContext => {
                Some("Pass company_id in the request _meta object")
            }
            Self::TenantScope { .. } => {
                Some("Verify that a ClickHouse role named after company_id exists and is granted")
            }
            Self::Connection { suggestion, .. } => Some(suggestion),
            Self::Database { suggestion, .. } => Some(suggestion),
            _ => None,
        }
    }

    /// True for errors that already describe a tool-level outcome and must
    /// reach the caller unchanged. Raw backend failures return false.
    pub fn is_domain(&self) -> bool {
        !matches!(
            self,
            Self::Connection { .. } | Self::Database { .. } | Self::Internal { .. }
        )
    }
}

/// Convert reqwest errors raised while talking to the ClickHouse HTTP interface.
impl From<reqwest::Error> for DbError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            DbError::connection(
                format!("Request timed out: {}", err),
                "Check CLICKHOUSE_SEND_RECEIVE_TIMEOUT and server load",
            )
        } else if err.is_connect() {
            DbError::connection(
                format!("Failed to reach ClickHouse: {}", err),
                "Check CLICKHOUSE_HOST, CLICKHOUSE_PORT and CLICKHOUSE_SECURE",
            )
        } else if err.is_decode() {
            DbError::internal(format!("Failed to decode ClickHouse response: {}", err))
        } else {
            DbError::connection(
                format!("HTTP error: {}", err),
                "Check network connectivity and ClickHouse server status",
            )
        }
    }
}

/// Result type alias for database operations.
pub type DbResult<T> = Result<T, DbError>;

/// Build suggestion data as JSON value.
fn suggestion_data(suggestion: Option<&str>) -> Option<serde_json::Value> {
    suggestion.map(|s| serde_json::json!({ "suggestion": s }))
}

/// Convert DbError to MCP ErrorData for semantic error categorization.
/// Includes the suggestion field in the `data` object when available.
impl From<DbError> for rmcp::ErrorData {
    fn from(err: DbError) -> Self {
        match &err {
            // Caller-side problems -> invalid_params
            DbError::MissingTenantContext
            | DbError::TenantScope { .. }
            | DbError::QueryExecution { .. }
            | DbError::Permission { .. }
            | DbError::InvalidInput { .. } => {
                rmcp::ErrorData::invalid_params(err.to_string(), suggestion_data(err.suggestion()))
            }

            // Database errors -> invalid_params with exception code in message
            DbError::Database {
                message,
                code,
                suggestion,
            } => {
                let msg = match code {
                    Some(code) => format!("{} (code: {})", message, code),
                    None => message.clone(),
                };
                rmcp::ErrorData::invalid_params(msg, suggestion_data(Some(suggestion)))
            }

            DbError::Connection { suggestion, .. } => {
                rmcp::ErrorData::internal_error(err.to_string(), suggestion_data(Some(suggestion)))
            }
            DbError::Timeout { .. } => rmcp::ErrorData::internal_error(
                err.to_string(),
                suggestion_data(Some(
                    "Narrow the query or raise CLICKHOUSE_MCP_QUERY_TIMEOUT",
                )),
            ),
            DbError::Internal { .. } | DbError::Config(_) => {
                rmcp::ErrorData::internal_error(err.to_string(), None)
            }
        }
    }
}
