//! MCP server integration module.
//!
//! This module connects the MCP protocol to the ClickHouse tool handlers
//! using the rmcp framework.

pub mod service;

pub use service::{ClickHouseService, ServiceConnector};
