//! ClickHouse MCP Server Library
//!
//! MCP (Model Context Protocol) tools that let AI assistants query ClickHouse.
//! Every call runs under the ClickHouse role named by the `company_id` in the
//! request metadata, so row-level security is enforced by the server's row
//! policies.

pub mod config;
pub mod context;
pub mod db;
pub mod error;
pub mod mcp;
pub mod secrets;
pub mod tools;
pub mod transport;

pub use config::Config;
pub use context::UserContext;
pub use error::{ConfigError, DbError};
pub use mcp::ClickHouseService;
