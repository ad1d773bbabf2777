//! Database access layer.
//!
//! - `backend`: connector/session traits and result types
//! - `client`: ClickHouse HTTP interface implementation
//! - `tenant`: sessions scoped to a tenant role

pub mod backend;
pub mod client;
pub mod tenant;

pub use backend::{Connector, NamedRow, QueryResult, QuerySettings, Session};
pub use client::{HttpConnector, HttpSession};
pub use tenant::{ScopedSession, require_company_id, role_command};
