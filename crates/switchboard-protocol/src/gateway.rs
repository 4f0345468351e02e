//! Payload types for the gateway RPC methods this core consumes.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Gateway RPC method names.
pub mod method {
    /// Fetch the raw roster configuration document.
    pub const CONFIG_GET: &str = "config.get";
    /// Write the roster configuration document back.
    pub const CONFIG_APPLY: &str = "config.apply";
    /// Dispatch a message to an agent through the gateway.
    pub const AGENT: &str = "agent";
    /// Fetch the gateway skill status object.
    pub const SKILLS_STATUS: &str = "skills.status";
}

/// Response of `config.get`: the raw document plus an optional
/// concurrency token. A missing hash means the gateway does not
/// support compare-and-swap for this document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigGetResponse {
    /// Raw configuration text (nominally JSON).
    pub raw: String,
    /// Opaque concurrency token for compare-and-swap writes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
}

/// Parameters of `config.apply`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigApplyParams {
    /// Full replacement document text.
    pub raw: String,
    /// Token from the preceding `config.get`; omitted when the
    /// gateway reported none, which makes the write unconditional.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_hash: Option<String>,
}

/// Parameters of the `agent` invocation method.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentInvokeParams {
    /// Message content to deliver.
    pub message: String,
    /// Resolved agent identifier.
    pub agent_id: String,
    /// Key letting the gateway deduplicate repeated delivery.
    pub idempotency_key: String,
    /// Optional model override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Optional native session id to continue.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    /// Optional session routing key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_key: Option<String>,
}

/// One text chunk returned by the `agent` method.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextPayload {
    /// Chunk content.
    #[serde(default)]
    pub text: String,
}

/// Agent-level metadata attached to an `agent` response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentMeta {
    /// Session id the gateway reports for this turn.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

/// Metadata envelope of an `agent` response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvokeMeta {
    /// Agent metadata, when present.
    #[serde(default)]
    pub agent_meta: AgentMeta,
}

/// Response of the `agent` invocation method.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentInvokeResponse {
    /// Ordered text payload chunks.
    #[serde(default)]
    pub payloads: Vec<TextPayload>,
    /// Response metadata.
    #[serde(default)]
    pub meta: InvokeMeta,
}

impl AgentInvokeResponse {
    /// Decode an `agent` response from a raw RPC result value.
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    /// Join the text payload chunks into one output body, separated
    /// by a blank line.
    pub fn joined_text(&self) -> String {
        self.payloads
            .iter()
            .map(|payload| payload.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Session id reported back by the gateway, if any.
    pub fn session_id(&self) -> Option<&str> {
        self.meta.agent_meta.session_id.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::AgentInvokeResponse;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn agent_response_joins_payloads_with_blank_line() {
        let response = AgentInvokeResponse::from_value(json!({
            "payloads": [{"text": "first"}, {"text": "second"}],
            "meta": {"agentMeta": {"sessionId": "native-42"}},
        }))
        .expect("decode");

        assert_eq!(response.joined_text(), "first\n\nsecond");
        assert_eq!(response.session_id(), Some("native-42"));
    }

    #[test]
    fn agent_response_tolerates_missing_fields() {
        let response = AgentInvokeResponse::from_value(json!({})).expect("decode");
        assert_eq!(response.joined_text(), "");
        assert_eq!(response.session_id(), None);
    }
}
