//! Per-request user context.
//!
//! MCP clients pass `user_name` and `company_id` in the request `_meta`
//! object. `company_id` names the ClickHouse role the call runs under;
//! `user_name` is only used for audit logging.

use serde_json::{Map, Value as JsonValue};

pub const META_USER_NAME: &str = "user_name";
pub const META_COMPANY_ID: &str = "company_id";

/// User context extracted from MCP request metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserContext {
    pub user_name: Option<String>,
    pub company_id: Option<String>,
}

impl UserContext {
    /// Extract a context from request metadata.
    ///
    /// Returns `None` when there is no metadata at all (an empty `_meta` is
    /// treated the same way). Each field is read on its own; a missing or
    /// non-string value leaves only that field empty.
    pub fn from_meta(meta: Option<&Map<String, JsonValue>>) -> Option<Self> {
        let meta = meta.filter(|m| !m.is_empty())?;
        Some(Self {
            user_name: string_field(meta, META_USER_NAME),
            company_id: string_field(meta, META_COMPANY_ID),
        })
    }

    /// The tenant identifier, if present and non-empty.
    pub fn tenant(&self) -> Option<&str> {
        self.company_id.as_deref().filter(|id| !id.is_empty())
    }
}

fn string_field(meta: &Map<String, JsonValue>, key: &str) -> Option<String> {
    meta.get(key).and_then(JsonValue::as_str).map(str::to_string)
}
