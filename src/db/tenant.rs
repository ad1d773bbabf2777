//! Tenant scoping.
//!
//! A [`ScopedSession`] is a backend session on which `SET role=<company_id>`
//! has already succeeded. Tool handlers can only reach the backend through
//! one, so no data statement ever runs outside a tenant role.

use crate::context::UserContext;
use crate::db::backend::{Connector, QueryResult, QuerySettings, Session};
use crate::error::{DbError, DbResult};
use tracing::{debug, error, warn};

/// Statement that activates the tenant's role.
///
/// The identifier is interpolated verbatim; the HTTP interface accepts a
/// single statement per request.
pub fn role_command(company_id: &str) -> String {
    format!("SET role={}", company_id)
}

/// The tenant identifier of a request, or `MissingTenantContext`.
pub fn require_company_id(context: Option<&UserContext>) -> DbResult<&str> {
    match context.and_then(UserContext::tenant) {
        Some(company_id) => Ok(company_id),
        None => {
            warn!(
                user_name = ?context.and_then(|c| c.user_name.as_deref()),
                "Request rejected: no company_id in request metadata"
            );
            Err(DbError::MissingTenantContext)
        }
    }
}

/// A session running under a tenant role.
pub struct ScopedSession<S> {
    session: S,
    company_id: String,
}

impl<S: Session> ScopedSession<S> {
    /// Open a session and switch it to the caller's role.
    ///
    /// Fails with `MissingTenantContext` before any backend work when the
    /// context has no `company_id`, and with `TenantScope` when the role
    /// cannot be set. Neither failure is retried.
    pub async fn establish<C>(connector: &C, context: Option<&UserContext>) -> DbResult<Self>
    where
        C: Connector<Session = S>,
    {
        let company_id = require_company_id(context)?.to_string();
        let session = connector.connect().await?;

        if let Err(e) = session.command(&role_command(&company_id)).await {
            error!(company_id = %company_id, error = %e, "Failed to set role");
            return Err(DbError::tenant_scope(company_id, e.to_string()));
        }
        debug!(company_id = %company_id, "Role set");

        Ok(Self {
            session,
            company_id,
        })
    }

    pub fn company_id(&self) -> &str {
        &self.company_id
    }

    /// Run a query under the tenant role.
    pub async fn query(&self, sql: &str, settings: &QuerySettings) -> DbResult<QueryResult> {
        self.session
            .query(sql, settings)
            .await
            .map_err(into_execution_error)
    }

    /// Run a text command under the tenant role.
    pub async fn command(&self, sql: &str) -> DbResult<String> {
        self.session.command(sql).await.map_err(into_execution_error)
    }
}

fn into_execution_error(err: DbError) -> DbError {
    if err.is_domain() {
        err
    } else {
        DbError::query_execution(err.to_string())
    }
}
