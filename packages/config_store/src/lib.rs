#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Per-source configuration lookup.
//!
//! Each source's configuration is a JSON blob stored under the parameter
//! name `{app}--{source}-config`. [`SsmConfigStore`] reads it from AWS
//! Systems Manager Parameter Store (decrypting `SecureString` values);
//! [`FileConfigStore`] reads `{dir}/{app}--{source}-config.json` for local
//! runs.
//!
//! # Environment Variables
//!
//! [`SsmConfigStore::from_env`] uses the standard AWS chain (`AWS_REGION`,
//! `AWS_PROFILE`, `AWS_ACCESS_KEY_ID`/`AWS_SECRET_ACCESS_KEY`,
//! `AWS_ENDPOINT_URL`, ...).

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use aws_sdk_ssm::operation::get_parameter::GetParameterError;

/// Errors that can occur while looking up a source's configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigStoreError {
    /// No parameter exists under the derived name.
    #[error("config parameter '{parameter}' not found")]
    NotFound {
        /// Parameter name looked up.
        parameter: String,
    },

    /// The parameter exists but holds no value.
    #[error("config parameter '{parameter}' has no value")]
    Empty {
        /// Parameter name looked up.
        parameter: String,
    },

    /// The stored value is not valid JSON.
    #[error("config parameter '{parameter}' is not valid JSON: {source}")]
    InvalidJson {
        /// Parameter name looked up.
        parameter: String,
        /// Underlying parse error.
        source: serde_json::Error,
    },

    /// SSM `GetParameter` failed for another reason.
    #[error("failed to get config parameter '{parameter}': {source}")]
    Sdk {
        /// Parameter name looked up.
        parameter: String,
        /// Underlying SDK error.
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// I/O error reading a local config file.
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        /// File that was read.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}

/// Derives the parameter name a source's configuration is stored under.
#[must_use]
pub fn parameter_name(app: &str, source_name: &str) -> String {
    format!("{app}--{source_name}-config")
}

/// Parses a stored config value, ignoring surrounding whitespace.
///
/// # Errors
///
/// Returns [`ConfigStoreError::InvalidJson`] if the value is not JSON.
pub fn parse_config_blob(parameter: &str, raw: &str) -> Result<serde_json::Value, ConfigStoreError> {
    serde_json::from_str(raw.trim()).map_err(|source| ConfigStoreError::InvalidJson {
        parameter: parameter.to_owned(),
        source,
    })
}

/// Looks up the configuration blob for a source.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Fetches the raw configuration blob for `source_name` under `app`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigStoreError`] if the blob is missing, unreadable, or
    /// not valid JSON.
    async fn fetch_config(
        &self,
        app: &str,
        source_name: &str,
    ) -> Result<serde_json::Value, ConfigStoreError>;
}

/// Config store backed by SSM Parameter Store.
pub struct SsmConfigStore {
    client: aws_sdk_ssm::Client,
}

impl SsmConfigStore {
    /// Creates a store from the standard AWS environment/profile chain.
    pub async fn from_env() -> Self {
        let config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        Self::new(aws_sdk_ssm::Client::new(&config))
    }

    /// Creates a store around an existing client.
    #[must_use]
    pub const fn new(client: aws_sdk_ssm::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ConfigStore for SsmConfigStore {
    async fn fetch_config(
        &self,
        app: &str,
        source_name: &str,
    ) -> Result<serde_json::Value, ConfigStoreError> {
        let parameter = parameter_name(app, source_name);
        log::info!("Fetching config parameter {parameter}");

        let output = self
            .client
            .get_parameter()
            .name(&parameter)
            .with_decryption(true)
            .send()
            .await
            .map_err(|e| {
                if e.as_service_error()
                    .is_some_and(GetParameterError::is_parameter_not_found)
                {
                    ConfigStoreError::NotFound {
                        parameter: parameter.clone(),
                    }
                } else {
                    ConfigStoreError::Sdk {
                        parameter: parameter.clone(),
                        source: Box::new(e),
                    }
                }
            })?;

        let raw = output
            .parameter()
            .and_then(|p| p.value())
            .ok_or_else(|| ConfigStoreError::Empty {
                parameter: parameter.clone(),
            })?;

        parse_config_blob(&parameter, raw)
    }
}

/// Config store reading JSON files from a local directory.
#[derive(Debug, Clone)]
pub struct FileConfigStore {
    dir: PathBuf,
}

impl FileConfigStore {
    /// Creates a store reading from `dir`.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Path of the file holding a source's configuration.
    #[must_use]
    pub fn path_for(&self, app: &str, source_name: &str) -> PathBuf {
        self.dir
            .join(format!("{}.json", parameter_name(app, source_name)))
    }

    /// Directory configs are read from.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl ConfigStore for FileConfigStore {
    async fn fetch_config(
        &self,
        app: &str,
        source_name: &str,
    ) -> Result<serde_json::Value, ConfigStoreError> {
        let parameter = parameter_name(app, source_name);
        let path = self.path_for(app, source_name);
        log::info!("Reading config from {}", path.display());

        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ConfigStoreError::NotFound { parameter });
            }
            Err(source) => return Err(ConfigStoreError::Io { path, source }),
        };

        parse_config_blob(&parameter, &raw)
    }
}
