//! Opaque page tokens for `list_tables`.
//!
//! A token is URL-safe base64 of a small JSON document carrying the listing
//! filters and the offset of the next page. Nothing is kept server-side, so a
//! token stays valid across sessions and server restarts.

use crate::error::{DbError, DbResult};
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageToken {
    pub database: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub like: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_like: Option<String>,
    pub offset: u64,
}

impl PageToken {
    pub fn new(
        database: &str,
        like: Option<&str>,
        not_like: Option<&str>,
        offset: u64,
    ) -> Self {
        Self {
            database: database.to_string(),
            like: like.map(str::to_string),
            not_like: not_like.map(str::to_string),
            offset,
        }
    }

    pub fn encode(&self) -> DbResult<String> {
        let json = serde_json::to_vec(self)
            .map_err(|e| DbError::internal(format!("Failed to encode page token: {}", e)))?;
        Ok(URL_SAFE_NO_PAD.encode(json))
    }

    pub fn decode(token: &str) -> DbResult<Self> {
        let bytes = URL_SAFE_NO_PAD
            .decode(token.trim())
            .map_err(|_| DbError::invalid_input("Invalid page_token"))?;
        serde_json::from_slice(&bytes).map_err(|_| DbError::invalid_input("Invalid page_token"))
    }

    /// Decode `token` and check it was issued for the same filters.
    pub fn resume(
        token: &str,
        database: &str,
        like: Option<&str>,
        not_like: Option<&str>,
    ) -> DbResult<Self> {
        let decoded = Self::decode(token)?;
        if decoded.database != database
            || decoded.like.as_deref() != like
            || decoded.not_like.as_deref() != not_like
        {
            return Err(DbError::invalid_input(
                "page_token was issued for different list_tables arguments",
            ));
        }
        Ok(decoded)
    }
}
