//! MCP service implementation using rmcp.
//!
//! This module defines the ClickHouseService struct with the ClickHouse tools
//! exposed via the MCP protocol using the rmcp framework's macros. Every tool
//! reads the caller's `user_name` and `company_id` from the request `_meta`.

use crate::context::UserContext;
use crate::db::HttpConnector;
use crate::secrets::SsmSecretStore;
use crate::tools::query::{QueryOutput, QueryToolHandler, RunSelectQueryInput};
use crate::tools::schema::{
    ListDatabasesOutput, ListTablesInput, ListTablesOutput, SchemaToolHandler,
};
use rmcp::Json;
use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::tool::ToolRouter,
    handler::server::wrapper::Parameters,
    model::{Implementation, Meta, ProtocolVersion, ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Connector type the service talks to.
pub type ServiceConnector = HttpConnector<SsmSecretStore>;

#[derive(Clone)]
pub struct ClickHouseService {
    /// Shared connector; each tool call opens its own session from it
    connector: Arc<ServiceConnector>,
    /// Upper bound for run_select_query
    query_timeout: Duration,
    /// Tool router for MCP tool dispatch (auto-generated)
    tool_router: ToolRouter<Self>,
}

impl ClickHouseService {
    /// Create a new ClickHouseService instance.
    pub fn new(connector: Arc<ServiceConnector>, query_timeout: Duration) -> Self {
        Self {
            connector,
            query_timeout,
            tool_router: Self::tool_router(),
        }
    }
}

/// Resolve the request context and write the audit line for a tool call.
fn audit(tool: &'static str, meta: &Meta) -> Option<UserContext> {
    let context = UserContext::from_meta(Some(&meta.0));
    info!(
        tool = tool,
        user_name = ?context.as_ref().and_then(|c| c.user_name.as_deref()),
        company_id = ?context.as_ref().and_then(|c| c.company_id.as_deref()),
        "Tool call"
    );
    context
}

#[tool_router]
impl ClickHouseService {
    #[tool(
        description = "Run a SELECT query against ClickHouse and return its columns and rows.\nThe query runs read-only under the role named by company_id in the request _meta."
    )]
    async fn run_select_query(
        &self,
        Parameters(input): Parameters<RunSelectQueryInput>,
        meta: Meta,
    ) -> Result<Json<QueryOutput>, McpError> {
        let context = audit("run_select_query", &meta);
        QueryToolHandler::new(self.connector.clone(), self.query_timeout)
            .run_select_query(context.as_ref(), input)
            .await
            .map(Json)
            .map_err(McpError::from)
    }

    #[tool(description = "List the databases visible to the caller's role.")]
    async fn list_databases(&self, meta: Meta) -> Result<Json<ListDatabasesOutput>, McpError> {
        let context = audit("list_databases", &meta);
        SchemaToolHandler::new(self.connector.clone())
            .list_databases(context.as_ref())
            .await
            .map(Json)
            .map_err(McpError::from)
    }

    #[tool(
        description = "List tables in a database with engine, size, keys and comments.\nFilter by name with `like` / `not_like`. Results are paginated: pass next_page_token back as page_token.\nSet include_detailed_columns to false to omit column lists."
    )]
    async fn list_tables(
        &self,
        Parameters(input): Parameters<ListTablesInput>,
        meta: Meta,
    ) -> Result<Json<ListTablesOutput>, McpError> {
        let context = audit("list_tables", &meta);
        SchemaToolHandler::new(self.connector.clone())
            .list_tables(context.as_ref(), input)
            .await
            .map(Json)
            .map_err(McpError::from)
    }
}

#[tool_handler]
impl ServerHandler for ClickHouseService {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2025_03_26,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "mcp-clickhouse".to_owned(),
                title: Some("ClickHouse MCP Server".to_owned()),
                version: env!("CARGO_PKG_VERSION").to_owned(),
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "ClickHouse tools with per-tenant row-level security.\n\
                \n\
                ## Request metadata\n\
                Every tool call must carry a `_meta` object with:\n\
                - `company_id` (required): the ClickHouse role the call runs under\n\
                - `user_name` (optional): recorded in the server's audit log\n\
                Calls without `company_id` fail with \"company_id is required\".\n\
                \n\
                ## Workflow\n\
                1. `list_databases` to see which databases your role can read\n\
                2. `list_tables` with a `database` to inspect tables and columns\n\
                3. `run_select_query` to query. Only read-only statements are accepted."
                    .to_string(),
            ),
        }
    }
}
