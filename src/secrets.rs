//! Password resolution through AWS SSM Parameter Store.
//!
//! When `CLICKHOUSE_PASSWORD_FROM_SSM_PATH` is set the password is fetched
//! every time a backend session is opened, so a rotated secret is picked up
//! without a restart.

use crate::config::PasswordSpec;
use crate::error::ConfigError;
use aws_config::BehaviorVersion;
use std::future::Future;
use tracing::{error, info};

/// A store that can resolve a secret by path.
pub trait SecretStore: Send + Sync {
    fn fetch(&self, path: &str) -> impl Future<Output = Result<String, ConfigError>> + Send;
}

/// AWS Systems Manager Parameter Store backed secret store.
#[derive(Debug, Clone)]
pub struct SsmSecretStore {
    client: aws_sdk_ssm::Client,
}

impl SsmSecretStore {
    /// Build a client from the default AWS credential/region chain.
    pub async fn from_env() -> Self {
        let sdk_config = aws_config::defaults(BehaviorVersion::latest()).load().await;
        Self {
            client: aws_sdk_ssm::Client::new(&sdk_config),
        }
    }
}

impl SecretStore for SsmSecretStore {
    async fn fetch(&self, path: &str) -> Result<String, ConfigError> {
        info!(path = %path, "Retrieving ClickHouse password from SSM");

        let response = self
            .client
            .get_parameter()
            .name(path)
            .with_decryption(true)
            .send()
            .await
            .map_err(|e| {
                let err = ConfigError::SecretFetch {
                    path: path.to_string(),
                    message: aws_sdk_ssm::error::DisplayErrorContext(&e).to_string(),
                };
                error!(error = %err, "SSM password retrieval failed");
                err
            })?;

        let value = response
            .parameter()
            .and_then(|p| p.value())
            .map(str::to_string)
            .ok_or_else(|| ConfigError::SecretFetch {
                path: path.to_string(),
                message: "parameter has no value".to_string(),
            })?;

        info!("Successfully retrieved password from SSM");
        Ok(value)
    }
}

/// Resolved password source, pairing a [`PasswordSpec`] with its store.
///
/// Not `Debug`: the literal variant holds the password itself.
#[derive(Clone)]
pub enum PasswordSource<S> {
    Literal(String),
    Store { store: S, path: String },
}

impl<S: SecretStore> PasswordSource<S> {
    /// Pair a password setting with a store, calling `make_store` only for SSM paths.
    pub async fn from_spec<F, Fut>(spec: PasswordSpec, make_store: F) -> Self
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = S>,
    {
        match spec {
            PasswordSpec::Literal(password) => Self::Literal(password),
            PasswordSpec::SsmPath(path) => Self::Store {
                store: make_store().await,
                path,
            },
        }
    }

    /// Resolve the password. Store-backed sources fetch on every call.
    pub async fn resolve(&self) -> Result<String, ConfigError> {
        match self {
            Self::Literal(password) => Ok(password.clone()),
            Self::Store { store, path } => store.fetch(path).await,
        }
    }
}
