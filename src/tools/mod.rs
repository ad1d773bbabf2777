//! MCP tool implementations.
//!
//! - `query`: `run_select_query`
//! - `schema`: `list_databases` and `list_tables`
//! - `pagination`: page tokens for `list_tables`
//! - `sql_validator`: read-only statement classification

pub mod pagination;
pub mod query;
pub mod schema;
pub mod sql_validator;

pub use query::{QueryOutput, QueryToolHandler, RunSelectQueryInput};
pub use schema::{
    ColumnInfo, ListDatabasesOutput, ListTablesInput, ListTablesOutput, SchemaToolHandler,
    TableInfo,
};
