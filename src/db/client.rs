//! ClickHouse HTTP interface client.
//!
//! Every statement is a `POST` to the configured endpoint with the SQL as the
//! request body. Statements that share a `session_id` run in the same server
//! session, which is what makes `SET role` stick for the statement after it.

use crate::config::ClickHouseConfig;
use crate::db::backend::{Connector, QueryResult, QuerySettings, Session};
use crate::error::{DbError, DbResult};
use crate::secrets::{PasswordSource, SecretStore, SsmSecretStore};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use tracing::debug;
use url::Url;
use uuid::Uuid;

/// Seconds an idle server-side session is kept alive.
pub const SESSION_TIMEOUT_SECS: u64 = 60;

const HEADER_USER: &str = "X-ClickHouse-User";
const HEADER_KEY: &str = "X-ClickHouse-Key";
const HEADER_EXCEPTION_CODE: &str = "X-ClickHouse-Exception-Code";

const FORMAT_QUERY: &str = "JSONCompact";
const FORMAT_COMMAND: &str = "TabSeparated";

/// Opens sessions against the ClickHouse HTTP interface.
///
/// The underlying `reqwest::Client` (and its connection pool) is shared by
/// every session; the password is resolved again for each new session.
pub struct HttpConnector<S> {
    client: reqwest::Client,
    endpoint: Url,
    username: String,
    password: PasswordSource<S>,
    database: Option<String>,
}

impl<S: SecretStore> HttpConnector<S> {
    /// Build a connector from validated settings.
    pub fn new(config: &ClickHouseConfig, password: PasswordSource<S>) -> DbResult<Self> {
        let endpoint = config.endpoint_url()?;

        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout_duration())
            .timeout(config.send_receive_timeout_duration())
            .danger_accept_invalid_certs(!config.verify)
            .user_agent(concat!("mcp-clickhouse/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| {
                DbError::connection(
                    format!("Failed to build HTTP client: {}", e),
                    "Check the TLS settings (CLICKHOUSE_SECURE, CLICKHOUSE_VERIFY)",
                )
            })?;

        debug!(
            endpoint = %endpoint,
            user = %config.username(),
            database = ?config.database,
            verify = config.verify,
            "ClickHouse connector configured"
        );

        Ok(Self {
            client,
            endpoint,
            username: config.username().to_string(),
            password,
            database: config.database.clone().filter(|d| !d.is_empty()),
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

impl HttpConnector<SsmSecretStore> {
    /// Build a connector, creating an SSM client only when the password lives in SSM.
    pub async fn from_config(config: &ClickHouseConfig) -> DbResult<Self> {
        let password =
            PasswordSource::from_spec(config.password_spec(), SsmSecretStore::from_env).await;
        Self::new(config, password)
    }
}

impl<S: SecretStore> Connector for HttpConnector<S> {
    type Session = HttpSession;

    async fn connect(&self) -> DbResult<HttpSession> {
        let password = self.password.resolve().await?;
        let session_id = Uuid::new_v4().to_string();
        debug!(session_id = %session_id, "Opening ClickHouse session");

        Ok(HttpSession {
            client: self.client.clone(),
            endpoint: self.endpoint.clone(),
            username: self.username.clone(),
            password,
            database: self.database.clone(),
            session_id,
        })
    }
}

/// A single ClickHouse HTTP session.
pub struct HttpSession {
    client: reqwest::Client,
    endpoint: Url,
    username: String,
    password: String,
    database: Option<String>,
    session_id: String,
}

impl HttpSession {
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    fn request_url(&self, format: &str, settings: &QuerySettings) -> Url {
        let mut url = self.endpoint.clone();
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("session_id", &self.session_id);
            pairs.append_pair("session_timeout", &SESSION_TIMEOUT_SECS.to_string());
            if let Some(database) = &self.database {
                pairs.append_pair("database", database);
            }
            pairs.append_pair("default_format", format);
            for (name, value) in settings.to_params() {
                pairs.append_pair(name, &value);
            }
        }
        url
    }

    async fn execute(&self, sql: &str, format: &str, settings: &QuerySettings) -> DbResult<String> {
        let url = self.request_url(format, settings);
        debug!(session_id = %self.session_id, sql = %sql, "Sending statement");

        let response = self
            .client
            .post(url)
            .header(HEADER_USER, &self.username)
            .header(HEADER_KEY, &self.password)
            .body(sql.to_string())
            .send()
            .await?;

        let status = response.status();
        let code = response
            .headers()
            .get(HEADER_EXCEPTION_CODE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.text().await?;

        if !status.is_success() {
            return Err(DbError::database(
                body.trim(),
                code,
                suggestion_for_status(status),
            ));
        }
        Ok(body)
    }
}

impl Session for HttpSession {
    async fn command(&self, sql: &str) -> DbResult<String> {
        let body = self
            .execute(sql, FORMAT_COMMAND, &QuerySettings::default())
            .await?;
        Ok(body.trim_end_matches('\n').to_string())
    }

    async fn query(&self, sql: &str, settings: &QuerySettings) -> DbResult<QueryResult> {
        let body = self.execute(sql, FORMAT_QUERY, settings).await?;
        parse_json_compact(&body)
    }
}

#[derive(Debug, Deserialize)]
struct JsonCompactBody {
    #[serde(default)]
    meta: Vec<JsonCompactColumn>,
    #[serde(default)]
    data: Vec<Vec<JsonValue>>,
}

#[derive(Debug, Deserialize)]
struct JsonCompactColumn {
    name: String,
    #[serde(rename = "type")]
    type_name: String,
}

/// Parse a `JSONCompact` response body. An empty body is an empty result.
fn parse_json_compact(body: &str) -> DbResult<QueryResult> {
    if body.trim().is_empty() {
        return Ok(QueryResult::default());
    }

    let parsed: JsonCompactBody = serde_json::from_str(body)
        .map_err(|e| DbError::internal(format!("Invalid JSONCompact response: {}", e)))?;

    let (column_names, column_types) = parsed
        .meta
        .into_iter()
        .map(|c| (c.name, c.type_name))
        .unzip();

    Ok(QueryResult {
        column_names,
        column_types,
        result_rows: parsed.data,
    })
}

fn suggestion_for_status(status: StatusCode) -> &'static str {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            "Check CLICKHOUSE_USER and the configured password"
        }
        StatusCode::NOT_FOUND => "Check CLICKHOUSE_PROXY_PATH",
        s if s.is_server_error() => "Check ClickHouse server status and logs",
        _ => "Check the SQL statement and the grants of the active role",
    }
}
