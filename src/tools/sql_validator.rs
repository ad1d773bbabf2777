//! Read-only classification for `run_select_query`.
//!
//! Statements are parsed with the ClickHouse dialect of
//! [sqlparser](https://docs.rs/sqlparser/). Anything recognised as a write,
//! DDL, or session/administrative statement is rejected before it reaches the
//! server. ClickHouse has plenty of syntax the parser does not know
//! (`SETTINGS`, `FORMAT`, `ARRAY JOIN` variants); such statements are passed
//! through, since the server itself runs every query with `readonly=1`.

use crate::error::{DbError, DbResult};
use sqlparser::ast::Statement;
use sqlparser::dialect::ClickHouseDialect;
use sqlparser::parser::Parser;
use tracing::debug;

/// Category of a parsed statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlStatementType {
    /// SELECT, SHOW, DESCRIBE, EXPLAIN of a read
    Read,
    /// INSERT, UPDATE, DELETE, MERGE, TRUNCATE
    Write,
    /// CREATE, ALTER, DROP
    Ddl,
    /// SET, USE, GRANT, REVOKE, KILL, OPTIMIZE
    Session,
    /// Parsed but not recognised as read-only
    Other,
}

mod error_messages {
    pub const WRITE: &str = "Data modification is not allowed. run_select_query is read-only.";
    pub const DDL: &str = "Schema modification is not allowed. run_select_query is read-only.";
    pub const SESSION: &str =
        "Session and access control statements are not allowed in run_select_query.";
    pub const OTHER: &str = "Only SELECT, SHOW, DESCRIBE and EXPLAIN statements are allowed.";
}

/// Reject statements that are recognisably not read-only.
///
/// # Examples
///
/// ```
/// use mcp_clickhouse::tools::sql_validator::validate_readonly;
///
/// assert!(validate_readonly("SELECT * FROM events").is_ok());
/// assert!(validate_readonly("INSERT INTO events VALUES (1)").is_err());
/// ```
pub fn validate_readonly(sql: &str) -> DbResult<()> {
    if sql.trim().trim_end_matches(';').trim().is_empty() {
        return Err(DbError::invalid_input("Empty SQL statement"));
    }

    let statements = match Parser::parse_sql(&ClickHouseDialect {}, sql) {
        Ok(statements) => statements,
        Err(e) => {
            debug!(error = %e, "Statement not parsed locally, deferring to server readonly mode");
            return Ok(());
        }
    };

    for stmt in &statements {
        let (kind, operation) = classify_statement(stmt);
        let reason = match kind {
            SqlStatementType::Read => continue,
            SqlStatementType::Write => error_messages::WRITE,
            SqlStatementType::Ddl => error_messages::DDL,
            SqlStatementType::Session => error_messages::SESSION,
            SqlStatementType::Other => error_messages::OTHER,
        };
        return Err(DbError::permission(operation, reason));
    }

    Ok(())
}

/// Classify a parsed statement.
pub fn classify_statement(stmt: &Statement) -> (SqlStatementType, &'static str) {
    use SqlStatementType::*;

    match stmt {
        Statement::Query(_) => (Read, "SELECT"),
        Statement::ShowTables { .. } => (Read, "SHOW TABLES"),
        Statement::ShowColumns { .. } => (Read, "SHOW COLUMNS"),
        Statement::ShowDatabases { .. } => (Read, "SHOW DATABASES"),
        Statement::ShowCreate { .. } => (Read, "SHOW CREATE"),
        Statement::ShowFunctions { .. } => (Read, "SHOW FUNCTIONS"),
        Statement::ShowVariable { .. } | Statement::ShowVariables { .. } => (Read, "SHOW"),
        Statement::ExplainTable { .. } => (Read, "DESCRIBE"),

        // EXPLAIN inherits the category of what it explains
        Statement::Explain { statement, .. } => match classify_statement(statement) {
            (Read, _) => (Read, "EXPLAIN"),
            other => other,
        },

        Statement::Insert(_) => (Write, "INSERT"),
        Statement::Update { .. } => (Write, "UPDATE"),
        Statement::Delete(_) => (Write, "DELETE"),
        Statement::Merge { .. } => (Write, "MERGE"),
        Statement::Truncate { .. } => (Write, "TRUNCATE"),

        Statement::CreateTable { .. } => (Ddl, "CREATE TABLE"),
        Statement::CreateView { .. } => (Ddl, "CREATE VIEW"),
        Statement::CreateDatabase { .. } => (Ddl, "CREATE DATABASE"),
        Statement::CreateFunction { .. } => (Ddl, "CREATE FUNCTION"),
        Statement::CreateIndex(_) => (Ddl, "CREATE INDEX"),
        Statement::CreateRole { .. } => (Ddl, "CREATE ROLE"),
        Statement::AlterTable { .. } => (Ddl, "ALTER TABLE"),
        Statement::AlterView { .. } => (Ddl, "ALTER VIEW"),
        Statement::AlterRole { .. } => (Ddl, "ALTER ROLE"),
        Statement::Drop { .. } => (Ddl, "DROP"),
        Statement::DropFunction { .. } => (Ddl, "DROP FUNCTION"),

        Statement::Set(_) => (Session, "SET"),
        Statement::Use(_) => (Session, "USE"),
        Statement::Grant { .. } => (Session, "GRANT"),
        Statement::Revoke { .. } => (Session, "REVOKE"),
        Statement::Kill { .. } => (Session, "KILL"),
        Statement::OptimizeTable { .. } => (Session, "OPTIMIZE"),
        Statement::AttachDatabase { .. } => (Session, "ATTACH"),

        _ => (Other, "statement"),
    }
}
