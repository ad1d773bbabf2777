//! Recording mock backend shared by the integration tests.

#![allow(dead_code)]

use mcp_clickhouse::context::UserContext;
use mcp_clickhouse::db::{Connector, QueryResult, QuerySettings, Session};
use mcp_clickhouse::error::{DbError, DbResult};
use serde_json::{Value as JsonValue, json};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// One backend interaction. `session` is 0 for `connect` itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub session: usize,
    pub op: String,
}

#[derive(Clone, Default)]
pub struct Behaviour {
    /// Error text returned for `SET role`
    pub role_error: Option<String>,
    /// Delay before answering `SET role`
    pub role_delay: Option<Duration>,
    /// Error text returned for every query
    pub query_error: Option<String>,
    /// Delay before answering queries
    pub query_delay: Option<Duration>,
    /// Output of `SHOW DATABASES`
    pub databases: Vec<String>,
    /// Result of ad-hoc queries
    pub result: QueryResult,
    /// Rows served from `system.tables`: (name, engine, total_rows, total_bytes)
    pub tables: Vec<(String, String, u64, u64)>,
}

#[derive(Clone, Default)]
pub struct MockConnector {
    calls: Arc<Mutex<Vec<Call>>>,
    sessions: Arc<AtomicUsize>,
    behaviour: Arc<Behaviour>,
}

impl MockConnector {
    pub fn new(behaviour: Behaviour) -> Self {
        Self {
            behaviour: Arc::new(behaviour),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Operations in order, without session numbers.
    pub fn ops(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.op).collect()
    }

    pub fn connects(&self) -> usize {
        self.sessions.load(Ordering::SeqCst)
    }
}

impl Connector for MockConnector {
    type Session = MockSession;

    async fn connect(&self) -> DbResult<MockSession> {
        let id = self.sessions.fetch_add(1, Ordering::SeqCst) + 1;
        self.calls.lock().unwrap().push(Call {
            session: 0,
            op: "connect".to_string(),
        });
        Ok(MockSession {
            id,
            calls: self.calls.clone(),
            behaviour: self.behaviour.clone(),
        })
    }
}

pub struct MockSession {
    id: usize,
    calls: Arc<Mutex<Vec<Call>>>,
    behaviour: Arc<Behaviour>,
}

impl MockSession {
    fn record(&self, op: String) {
        self.calls.lock().unwrap().push(Call {
            session: self.id,
            op,
        });
    }

    fn tables_page(&self, sql: &str) -> QueryResult {
        let offset = sql
            .rsplit("OFFSET ")
            .next()
            .and_then(|s| s.trim().parse::<usize>().ok())
            .unwrap_or(0);
        let limit = sql
            .split("LIMIT ")
            .nth(1)
            .and_then(|s| s.split_whitespace().next())
            .and_then(|s| s.parse::<usize>().ok())
            .unwrap_or(usize::MAX);

        QueryResult {
            column_names: [
                "database",
                "name",
                "engine",
                "comment",
                "primary_key",
                "sorting_key",
                "total_rows",
                "total_bytes",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            column_types: Vec::new(),
            result_rows: self
                .behaviour
                .tables
                .iter()
                .skip(offset)
                .take(limit)
                .map(|(name, engine, rows, bytes)| {
                    vec![
                        json!("analytics"),
                        json!(name),
                        json!(engine),
                        json!(""),
                        json!("id"),
                        json!("id"),
                        // UInt64 arrives as a string
                        json!(rows.to_string()),
                        json!(bytes.to_string()),
                    ]
                })
                .collect(),
        }
    }

    fn columns(&self) -> QueryResult {
        let mut rows = Vec::new();
        for (name, ..) in &self.behaviour.tables {
            rows.push(vec![
                json!(name),
                json!("id"),
                json!("UInt64"),
                json!(""),
                json!(""),
                json!("primary id"),
            ]);
            rows.push(vec![
                json!(name),
                json!("ts"),
                json!("DateTime"),
                json!("DEFAULT"),
                json!("now()"),
                json!(""),
            ]);
        }
        QueryResult {
            column_names: [
                "table",
                "name",
                "type",
                "default_kind",
                "default_expression",
                "comment",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            column_types: Vec::new(),
            result_rows: rows,
        }
    }
}

impl Session for MockSession {
    async fn command(&self, sql: &str) -> DbResult<String> {
        self.record(format!("command {}", sql));
        if sql.starts_with("SET role=") {
            if let Some(delay) = self.behaviour.role_delay {
                tokio::time::sleep(delay).await;
            }
            if let Some(message) = &self.behaviour.role_error {
                return Err(DbError::database(message.clone(), Some("511".into()), ""));
            }
            return Ok(String::new());
        }
        if sql == "SHOW DATABASES" {
            return Ok(self.behaviour.databases.join("\n"));
        }
        Ok(String::new())
    }

    async fn query(&self, sql: &str, settings: &QuerySettings) -> DbResult<QueryResult> {
        let suffix = if settings.readonly { " [readonly]" } else { "" };
        self.record(format!("query {}{}", sql, suffix));

        if let Some(delay) = self.behaviour.query_delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(message) = &self.behaviour.query_error {
            return Err(DbError::database(message.clone(), Some("60".into()), ""));
        }

        if sql.contains("FROM system.tables") && sql.contains("count()") {
            return Ok(QueryResult {
                column_names: vec!["total".to_string()],
                column_types: vec!["UInt64".to_string()],
                result_rows: vec![vec![json!(self.behaviour.tables.len().to_string())]],
            });
        }
        if sql.contains("FROM system.tables") {
            return Ok(self.tables_page(sql));
        }
        if sql.contains("FROM system.columns") {
            return Ok(self.columns());
        }
        Ok(self.behaviour.result.clone())
    }
}

pub fn context(user_name: Option<&str>, company_id: Option<&str>) -> UserContext {
    UserContext {
        user_name: user_name.map(str::to_string),
        company_id: company_id.map(str::to_string),
    }
}

pub fn single_value_result(column: &str, value: JsonValue) -> QueryResult {
    QueryResult {
        column_names: vec![column.to_string()],
        column_types: vec!["UInt8".to_string()],
        result_rows: vec![vec![value]],
    }
}
