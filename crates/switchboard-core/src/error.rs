//! Error types for the provider invocation core.

use crate::gateway::GatewayRpcError;
use crate::provider::ProviderError;
use switchboard_config::ConfigStoreError;
use thiserror::Error;

/// Errors returned by orchestration and roster operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Provider id is unknown to the registry.
    #[error("provider not found: '{id}'")]
    ProviderNotFound { id: String },
    /// An agent config record failed validation.
    #[error("invalid agent config for '{agent_id}': {message}")]
    InvalidAgentConfig { agent_id: String, message: String },
    /// Provider config store failure.
    #[error(transparent)]
    Config(#[from] ConfigStoreError),
    /// Provider invocation failure.
    #[error(transparent)]
    Provider(#[from] ProviderError),
    /// Gateway RPC failure.
    #[error(transparent)]
    Gateway(#[from] GatewayRpcError),
    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl CoreError {
    /// Build a provider-not-found error for a (possibly raw) id.
    pub(crate) fn provider_not_found(id: impl Into<String>) -> Self {
        Self::ProviderNotFound { id: id.into() }
    }

    /// Build an invalid-agent-config error with context.
    pub(crate) fn invalid_agent(agent_id: &str, message: impl Into<String>) -> Self {
        Self::InvalidAgentConfig {
            agent_id: agent_id.to_string(),
            message: message.into(),
        }
    }
}
