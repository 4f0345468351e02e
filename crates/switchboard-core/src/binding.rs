//! Agent-to-provider binding resolution.
//!
//! The source of truth is a field inside the agent's own config
//! record, which is owned externally; this core only reads the
//! `runtime.provider.id` field and migrates the legacy
//! `runtime.adapter` field.

use crate::error::CoreError;
use crate::provider::gateway::GATEWAY_PROVIDER_ID;
use async_trait::async_trait;
use log::debug;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use switchboard_config::normalize_id;

/// Fixed id of the org-chart root agent.
pub const ROOT_AGENT_ID: &str = "root";

/// Message produced whenever a root rebind is attempted.
pub const ROOT_REBIND_MESSAGE: &str =
    "the root agent is permanently bound to the gateway provider";

/// Provider reference inside an agent's runtime config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderRef {
    /// Bound provider id.
    #[serde(default)]
    pub id: Option<String>,
}

/// Runtime section of an agent config record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentRuntime {
    /// Explicit provider binding.
    #[serde(default)]
    pub provider: Option<ProviderRef>,
    /// Legacy binding field, still honored for back-compat.
    #[serde(default)]
    pub adapter: Option<String>,
}

/// The slice of an agent config record this core reads.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentRecord {
    /// Runtime configuration.
    #[serde(default)]
    pub runtime: AgentRuntime,
}

/// External collaborator boundary: where agent config records live.
#[async_trait]
pub trait AgentConfigSource: Send + Sync {
    /// Load the record for a (normalized) agent id, if one exists.
    async fn agent_record(&self, agent_id: &str) -> Result<Option<AgentRecord>, CoreError>;
}

/// Directory-backed source reading `agents/<id>/agent.json`.
pub struct DirAgentConfigSource {
    root: PathBuf,
}

impl DirAgentConfigSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl AgentConfigSource for DirAgentConfigSource {
    async fn agent_record(&self, agent_id: &str) -> Result<Option<AgentRecord>, CoreError> {
        let agent_id = normalize_id(agent_id);
        let path = self.root.join("agents").join(&agent_id).join("agent.json");
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(CoreError::Io(err)),
        };
        let record = serde_json::from_str(&contents).map_err(|err| {
            CoreError::invalid_agent(&agent_id, format!("malformed agent record: {err}"))
        })?;
        Ok(Some(record))
    }
}

/// Pick the provider id out of an agent record: explicit binding
/// first, legacy adapter second, the global default last.
pub fn provider_id_from_record(record: Option<&AgentRecord>, default_provider_id: &str) -> String {
    let from_record = record.and_then(|record| {
        record
            .runtime
            .provider
            .as_ref()
            .and_then(|provider| provider.id.as_deref())
            .or(record.runtime.adapter.as_deref())
            .map(normalize_id)
            .filter(|id| !id.is_empty())
    });
    match from_record {
        Some(id) => id,
        None => normalize_id(default_provider_id),
    }
}

/// Normalize an agent id, rejecting ids that are empty after
/// trimming.
pub fn normalize_agent_id(agent_id: &str) -> Result<String, CoreError> {
    let normalized = normalize_id(agent_id);
    if normalized.is_empty() {
        return Err(CoreError::invalid_agent(agent_id, "agent id is empty"));
    }
    Ok(normalized)
}

/// Guard for binding writes: the root agent is permanently bound to
/// the gateway provider and any rebind is rejected, regardless of
/// input casing or whitespace.
pub fn validate_rebind(agent_id: &str, provider_id: &str) -> Result<(), CoreError> {
    if normalize_id(agent_id) == ROOT_AGENT_ID
        && normalize_id(provider_id) != GATEWAY_PROVIDER_ID
    {
        return Err(CoreError::invalid_agent(ROOT_AGENT_ID, ROOT_REBIND_MESSAGE));
    }
    debug!(
        "rebind allowed (agent_id={}, provider_id={})",
        agent_id, provider_id
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{
        AgentRecord, AgentRuntime, ProviderRef, ROOT_REBIND_MESSAGE, normalize_agent_id,
        provider_id_from_record, validate_rebind,
    };
    use crate::error::CoreError;
    use pretty_assertions::assert_eq;

    fn record(provider: Option<&str>, adapter: Option<&str>) -> AgentRecord {
        AgentRecord {
            runtime: AgentRuntime {
                provider: provider.map(|id| ProviderRef {
                    id: Some(id.to_string()),
                }),
                adapter: adapter.map(str::to_string),
            },
        }
    }

    #[test]
    fn provider_resolution_prefers_explicit_binding() {
        let explicit = record(Some("Claude"), Some("legacy"));
        assert_eq!(provider_id_from_record(Some(&explicit), "gateway"), "claude");

        let legacy = record(None, Some("Codex"));
        assert_eq!(provider_id_from_record(Some(&legacy), "gateway"), "codex");

        assert_eq!(provider_id_from_record(None, "Gateway"), "gateway");
        let empty = record(Some("   "), None);
        assert_eq!(provider_id_from_record(Some(&empty), "gateway"), "gateway");
    }

    #[test]
    fn normalize_agent_id_rejects_empty_input() {
        assert_eq!(normalize_agent_id(" Planner ").expect("id"), "planner");
        let err = normalize_agent_id("   ").expect_err("empty");
        assert!(matches!(err, CoreError::InvalidAgentConfig { .. }));
    }

    #[test]
    fn root_rebind_fails_with_fixed_message_for_any_casing() {
        for (agent, provider) in [("root", "claude"), (" ROOT ", "Claude"), ("Root", " codex ")] {
            let err = validate_rebind(agent, provider).expect_err("rebind rejected");
            match err {
                CoreError::InvalidAgentConfig { message, .. } => {
                    assert_eq!(message, ROOT_REBIND_MESSAGE);
                }
                other => panic!("unexpected error: {other:?}"),
            }
        }
        validate_rebind("root", " GATEWAY ").expect("gateway binding allowed");
        validate_rebind("planner", "claude").expect("non-root rebind allowed");
    }

    #[tokio::test]
    async fn dir_source_reads_and_validates_records() {
        use super::{AgentConfigSource, DirAgentConfigSource};
        let root = tempfile::tempdir().expect("root");
        let dir = root.path().join("agents").join("planner");
        std::fs::create_dir_all(&dir).expect("mkdir");
        std::fs::write(
            dir.join("agent.json"),
            r#"{"runtime": {"provider": {"id": "claude"}}}"#,
        )
        .expect("write");

        let source = DirAgentConfigSource::new(root.path());
        let record = source
            .agent_record("Planner")
            .await
            .expect("read")
            .expect("present");
        assert_eq!(
            record.runtime.provider.and_then(|provider| provider.id),
            Some("claude".to_string())
        );
        assert!(source.agent_record("missing").await.expect("read").is_none());

        std::fs::write(dir.join("agent.json"), "{broken").expect("corrupt");
        let err = source.agent_record("planner").await.expect_err("invalid");
        assert!(matches!(err, CoreError::InvalidAgentConfig { .. }));
    }
}
