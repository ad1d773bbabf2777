//! Schema introspection tools.
//!
//! This module implements the `list_databases` and `list_tables` MCP tools on
//! top of `SHOW DATABASES`, `system.tables` and `system.columns`. What a
//! caller sees is whatever the active role is granted.

use crate::context::UserContext;
use crate::db::{Connector, NamedRow, QuerySettings, ScopedSession, require_company_id};
use crate::error::{DbError, DbResult};
use crate::tools::pagination::PageToken;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

pub const DEFAULT_PAGE_SIZE: u32 = 50;
pub const MAX_PAGE_SIZE: u32 = 1000;

/// Input for the list_tables tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ListTablesInput {
    /// Database to list tables from
    pub database: String,
    /// Only include tables whose name matches this LIKE pattern
    #[serde(default)]
    pub like: Option<String>,
    /// Exclude tables whose name matches this LIKE pattern
    #[serde(default)]
    pub not_like: Option<String>,
    /// Token from a previous response's next_page_token
    #[serde(default)]
    pub page_token: Option<String>,
    /// Tables per page. Default: 50, max: 1000
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    /// Include the column list of each table. Default: true
    #[serde(default = "default_true")]
    pub include_detailed_columns: bool,
}

/// Output for the list_databases tool.
#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
pub struct ListDatabasesOutput {
    /// Databases visible to the caller's role
    pub databases: Vec<String>,
}

/// Output from the list_tables tool.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct ListTablesOutput {
    pub tables: Vec<TableInfo>,
    /// Pass as page_token to fetch the next page; absent on the last page
    pub next_page_token: Option<String>,
    /// Number of tables matching the filters across all pages
    pub total_tables: u64,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct TableInfo {
    pub database: String,
    pub name: String,
    pub engine: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sorting_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_rows: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_bytes: Option<u64>,
    /// Human readable total_bytes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_size: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub columns: Option<Vec<ColumnInfo>>,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct ColumnInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_expression: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

fn default_true() -> bool {
    true
}

fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

/// Format bytes as human-readable size string.
///
/// # Examples
///
/// ```
/// use mcp_clickhouse::tools::schema::format_size;
///
/// assert_eq!(format_size(512), "512 B");
/// assert_eq!(format_size(1024), "1 kB");
/// ```
pub fn format_size(bytes: u64) -> String {
    humansize::format_size(bytes, humansize::WINDOWS)
}

/// Quote a string as a ClickHouse string literal.
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "\\'"))
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value.filter(|s| !s.is_empty()).map(str::to_string)
}

/// `WHERE` clause shared by the count and page queries.
fn tables_filter(database: &str, like: Option<&str>, not_like: Option<&str>) -> String {
    let mut clause = format!("database = {}", quote_literal(database));
    if let Some(pattern) = like {
        clause.push_str(&format!(" AND name LIKE {}", quote_literal(pattern)));
    }
    if let Some(pattern) = not_like {
        clause.push_str(&format!(" AND name NOT LIKE {}", quote_literal(pattern)));
    }
    clause
}

fn table_from_row(row: NamedRow<'_>) -> TableInfo {
    let total_bytes = row.u64("total_bytes");
    TableInfo {
        database: row.str("database").unwrap_or_default().to_string(),
        name: row.str("name").unwrap_or_default().to_string(),
        engine: row.str("engine").unwrap_or_default().to_string(),
        comment: non_empty(row.str("comment")),
        primary_key: non_empty(row.str("primary_key")),
        sorting_key: non_empty(row.str("sorting_key")),
        total_rows: row.u64("total_rows"),
        total_bytes,
        total_size: total_bytes.map(format_size),
        columns: None,
    }
}

fn column_from_row(row: NamedRow<'_>) -> ColumnInfo {
    ColumnInfo {
        name: row.str("name").unwrap_or_default().to_string(),
        column_type: row.str("type").unwrap_or_default().to_string(),
        default_kind: non_empty(row.str("default_kind")),
        default_expression: non_empty(row.str("default_expression")),
        comment: non_empty(row.str("comment")),
    }
}

/// Handler for schema introspection tools.
pub struct SchemaToolHandler<C> {
    connector: Arc<C>,
}

impl<C: Connector> SchemaToolHandler<C> {
    /// Create a new schema tool handler.
    pub fn new(connector: Arc<C>) -> Self {
        Self { connector }
    }

    /// Handle the list_databases tool call.
    pub async fn list_databases(
        &self,
        context: Option<&UserContext>,
    ) -> DbResult<ListDatabasesOutput> {
        let scoped = ScopedSession::establish(self.connector.as_ref(), context).await?;
        let text = scoped.command("SHOW DATABASES").await?;

        let databases: Vec<String> = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();

        info!(count = databases.len(), "Listed databases");
        Ok(ListDatabasesOutput { databases })
    }

    /// Handle the list_tables tool call.
    pub async fn list_tables(
        &self,
        context: Option<&UserContext>,
        input: ListTablesInput,
    ) -> DbResult<ListTablesOutput> {
        require_company_id(context)?;
        if input.database.trim().is_empty() {
            return Err(DbError::invalid_input("database is required"));
        }
        if input.page_size == 0 || input.page_size > MAX_PAGE_SIZE {
            return Err(DbError::invalid_input(format!(
                "page_size must be between 1 and {}",
                MAX_PAGE_SIZE
            )));
        }

        let like = input.like.as_deref().filter(|p| !p.is_empty());
        let not_like = input.not_like.as_deref().filter(|p| !p.is_empty());
        let offset = match input.page_token.as_deref().filter(|t| !t.is_empty()) {
            Some(token) => PageToken::resume(token, &input.database, like, not_like)?.offset,
            None => 0,
        };

        let scoped = ScopedSession::establish(self.connector.as_ref(), context).await?;
        let settings = QuerySettings::readonly();
        let filter = tables_filter(&input.database, like, not_like);

        let count = scoped
            .query(
                &format!("SELECT count() AS total FROM system.tables WHERE {}", filter),
                &settings,
            )
            .await?;
        let total_tables = count
            .named_rows()
            .next()
            .and_then(|row| row.u64("total"))
            .unwrap_or(0);

        let page = scoped
            .query(
                &format!(
                    "SELECT database, name, engine, comment, primary_key, sorting_key, \
                     total_rows, total_bytes FROM system.tables WHERE {} \
                     ORDER BY name LIMIT {} OFFSET {}",
                    filter, input.page_size, offset
                ),
                &settings,
            )
            .await?;
        let mut tables: Vec<TableInfo> = page.named_rows().map(table_from_row).collect();

        if input.include_detailed_columns && !tables.is_empty() {
            self.attach_columns(&scoped, &input.database, &mut tables, &settings)
                .await?;
        }

        let next_offset = offset + tables.len() as u64;
        let next_page_token = if !tables.is_empty() && next_offset < total_tables {
            Some(PageToken::new(&input.database, like, not_like, next_offset).encode()?)
        } else {
            None
        };

        info!(
            database = %input.database,
            returned = tables.len(),
            total_tables = total_tables,
            offset = offset,
            "Listed tables"
        );

        Ok(ListTablesOutput {
            tables,
            next_page_token,
            total_tables,
        })
    }

    async fn attach_columns(
        &self,
        scoped: &ScopedSession<C::Session>,
        database: &str,
        tables: &mut [TableInfo],
        settings: &QuerySettings,
    ) -> DbResult<()> {
        let names = tables
            .iter()
            .map(|t| quote_literal(&t.name))
            .collect::<Vec<_>>()
            .join(", ");

        let result = scoped
            .query(
                &format!(
                    "SELECT table, name, type, default_kind, default_expression, comment \
                     FROM system.columns WHERE database = {} AND table IN ({}) \
                     ORDER BY table, position",
                    quote_literal(database),
                    names
                ),
                settings,
            )
            .await?;

        let mut by_table: HashMap<String, Vec<ColumnInfo>> = HashMap::new();
        for row in result.named_rows() {
            let table = row.str("table").unwrap_or_default().to_string();
            by_table.entry(table).or_default().push(column_from_row(row));
        }

        for table in tables.iter_mut() {
            table.columns = Some(by_table.remove(&table.name).unwrap_or_default());
        }
        Ok(())
    }
}
