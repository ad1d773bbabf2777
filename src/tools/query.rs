//! Query execution tool.
//!
//! This module implements the `run_select_query` MCP tool. Statements the
//! SQL classifier recognises as writes are rejected up front; everything else
//! runs under the caller's role with `readonly=1`.

use crate::context::UserContext;
use crate::db::{Connector, QueryResult, QuerySettings, ScopedSession, require_company_id};
use crate::error::{DbError, DbResult};
use crate::tools::sql_validator;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Input for the run_select_query tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct RunSelectQueryInput {
    /// ClickHouse SELECT statement to execute. Runs read-only under the caller's role.
    pub query: String,
}

/// Output from the run_select_query tool.
#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
pub struct QueryOutput {
    /// Column names in result order
    pub columns: Vec<String>,
    /// Result rows, one array of values per row
    pub rows: Vec<Vec<JsonValue>>,
}

impl From<QueryResult> for QueryOutput {
    fn from(result: QueryResult) -> Self {
        Self {
            columns: result.column_names,
            rows: result.result_rows,
        }
    }
}

/// Handler for query execution.
pub struct QueryToolHandler<C> {
    connector: Arc<C>,
    timeout: Duration,
}

impl<C: Connector> QueryToolHandler<C> {
    /// Create a new query tool handler.
    ///
    /// `timeout` bounds the query itself and is also sent to the server as
    /// `max_execution_time`. Role setup is bounded by the connector's own
    /// timeouts.
    pub fn new(connector: Arc<C>, timeout: Duration) -> Self {
        Self { connector, timeout }
    }

    /// Handle the run_select_query tool call.
    pub async fn run_select_query(
        &self,
        context: Option<&UserContext>,
        input: RunSelectQueryInput,
    ) -> DbResult<QueryOutput> {
        require_company_id(context)?;
        sql_validator::validate_readonly(&input.query)?;

        let settings = QuerySettings::readonly().with_max_execution_time(self.timeout);
        let start = Instant::now();

        let scoped = ScopedSession::establish(self.connector.as_ref(), context).await?;
        debug!(company_id = %scoped.company_id(), query = %input.query, "Executing query");

        let result = tokio::time::timeout(self.timeout, scoped.query(&input.query, &settings))
            .await
            .map_err(|_| DbError::timeout("run_select_query", self.timeout.as_secs()))??;

        info!(
            columns = result.column_names.len(),
            row_count = result.result_rows.len(),
            execution_time_ms = start.elapsed().as_millis() as u64,
            "Query executed"
        );

        Ok(result.into())
    }
}
