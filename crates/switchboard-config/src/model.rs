//! Persisted record shapes for provider config and session bindings.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Schema version written to every store record.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

/// Environment variable bundle persisted per provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderStoredConfig {
    /// Record schema version; always [`CURRENT_SCHEMA_VERSION`].
    pub schema_version: u32,
    /// Provider the record belongs to.
    pub provider_id: String,
    /// Stored environment variables.
    pub env: BTreeMap<String, String>,
    /// RFC 3339 timestamp of the last write.
    pub updated_at: String,
}

/// Alias-to-native session id table persisted per (provider, agent).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderSessionBindings {
    /// Record schema version; always [`CURRENT_SCHEMA_VERSION`].
    pub schema_version: u32,
    /// Provider the table belongs to.
    pub provider_id: String,
    /// Agent the table belongs to.
    pub agent_id: String,
    /// RFC 3339 timestamp of the last write.
    pub updated_at: String,
    /// Application alias to provider-native session id.
    pub bindings: BTreeMap<String, String>,
}

impl ProviderSessionBindings {
    /// Fresh empty table for a (provider, agent) pair.
    pub fn empty(provider_id: &str, agent_id: &str) -> Self {
        Self {
            schema_version: CURRENT_SCHEMA_VERSION,
            provider_id: provider_id.to_string(),
            agent_id: agent_id.to_string(),
            updated_at: chrono::Utc::now().to_rfc3339(),
            bindings: BTreeMap::new(),
        }
    }

    /// Look up the native session id mapped to an alias.
    pub fn native_id(&self, alias: &str) -> Option<&str> {
        self.bindings.get(alias).map(String::as_str)
    }
}
