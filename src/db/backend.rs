//! Backend abstraction.
//!
//! A [`Connector`] opens a [`Session`]; a session is a single server-side
//! ClickHouse session in which every statement observes the settings of the
//! statements before it. Tool code never touches a `Session` directly, only
//! through [`crate::db::ScopedSession`].

use crate::error::DbResult;
use serde_json::Value as JsonValue;
use std::future::Future;
use std::time::Duration;

/// Tabular result of a query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    pub column_names: Vec<String>,
    pub column_types: Vec<String>,
    pub result_rows: Vec<Vec<JsonValue>>,
}

impl QueryResult {
    /// Rows as `(column name -> value)` lookups.
    pub fn named_rows(&self) -> impl Iterator<Item = NamedRow<'_>> {
        self.result_rows.iter().map(move |row| NamedRow {
            columns: &self.column_names,
            values: row,
        })
    }
}

/// Borrowed view of one row with access by column name.
#[derive(Debug, Clone, Copy)]
pub struct NamedRow<'a> {
    columns: &'a [String],
    values: &'a [JsonValue],
}

impl<'a> NamedRow<'a> {
    pub fn get(&self, name: &str) -> Option<&'a JsonValue> {
        let idx = self.columns.iter().position(|c| c == name)?;
        self.values.get(idx)
    }

    pub fn str(&self, name: &str) -> Option<&'a str> {
        self.get(name).and_then(JsonValue::as_str)
    }

    /// ClickHouse serializes 64-bit integers as JSON strings by default.
    pub fn u64(&self, name: &str) -> Option<u64> {
        match self.get(name)? {
            JsonValue::Number(n) => n.as_u64(),
            JsonValue::String(s) => s.parse().ok(),
            _ => None,
        }
    }
}

/// Per-statement settings sent alongside a query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QuerySettings {
    /// Run with `readonly=1`.
    pub readonly: bool,
    /// Server-side `max_execution_time`.
    pub max_execution_time: Option<Duration>,
}

impl QuerySettings {
    pub fn readonly() -> Self {
        Self {
            readonly: true,
            max_execution_time: None,
        }
    }

    pub fn with_max_execution_time(mut self, limit: Duration) -> Self {
        self.max_execution_time = Some(limit);
        self
    }

    /// Settings as URL parameters. `readonly` always comes last.
    pub fn to_params(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        if let Some(limit) = self.max_execution_time {
            params.push(("max_execution_time", limit.as_secs().max(1).to_string()));
        }
        if self.readonly {
            params.push(("readonly", "1".to_string()));
        }
        params
    }
}

/// Opens backend sessions.
pub trait Connector: Send + Sync {
    type Session: Session;

    /// Open a new session. Credentials are resolved here, so a rotated
    /// password is picked up by the next call.
    fn connect(&self) -> impl Future<Output = DbResult<Self::Session>> + Send;
}

/// One server-side session.
pub trait Session: Send + Sync {
    /// Run a statement whose output is plain text (e.g. `SET`, `SHOW`).
    fn command(&self, sql: &str) -> impl Future<Output = DbResult<String>> + Send;

    /// Run a query and return its rows.
    fn query(
        &self,
        sql: &str,
        settings: &QuerySettings,
    ) -> impl Future<Output = DbResult<QueryResult>> + Send;
}
