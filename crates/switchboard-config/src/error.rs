//! Error types for the provider config store.

use thiserror::Error;

/// Errors returned while reading or writing stored provider state.
#[derive(Debug, Error)]
pub enum ConfigStoreError {
    /// Reading or writing a store file failed.
    #[error("config store io error: {0}")]
    Io(#[from] std::io::Error),
    /// Encoding a record to JSON failed.
    #[error("failed to encode config record: {0}")]
    Encode(#[from] serde_json::Error),
    /// A persisted provider config failed schema validation.
    #[error("invalid provider config for '{provider_id}': {message}")]
    InvalidProviderConfig {
        provider_id: String,
        message: String,
    },
}

impl ConfigStoreError {
    /// Build an invalid-provider-config error with context.
    pub(crate) fn invalid(provider_id: &str, message: impl Into<String>) -> Self {
        Self::InvalidProviderConfig {
            provider_id: provider_id.to_string(),
            message: message.into(),
        }
    }
}
