//! Roster document model: the gateway's shared JSON list of agent
//! entries. Unknown fields are preserved through read-modify-write.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The gateway configuration document as this core sees it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RosterDocument {
    /// Known agent entries.
    #[serde(default)]
    pub agents: Vec<RosterEntry>,
    /// Fields owned by the gateway that this core must not touch.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One agent entry in the roster.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterEntry {
    /// Agent identifier.
    pub id: String,
    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Workspace path for the agent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace: Option<String>,
    /// Agent state directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_dir: Option<String>,
    /// Sandbox policy for the entry.
    #[serde(default)]
    pub sandbox: SandboxSettings,
    /// Tool policy for the entry.
    #[serde(default)]
    pub tools: ToolSettings,
    /// Unmanaged fields, carried through verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Sandbox settings of a roster entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SandboxSettings {
    /// Sandbox mode token, e.g. `"off"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    /// Unmanaged sandbox fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Tool settings of a roster entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolSettings {
    /// Tool allowlist; `"*"` means all tools.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow: Option<Vec<String>>,
    /// Unmanaged tool fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[cfg(test)]
mod tests {
    use super::RosterDocument;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn roster_round_trip_preserves_unknown_fields() {
        let raw = json!({
            "agents": [{
                "id": "planner",
                "sandbox": {"mode": "off", "profile": "strict"},
                "tools": {"allow": ["*"], "deny": []},
                "channel": "ops",
            }],
            "gateway": {"port": 4100},
        });

        let document: RosterDocument =
            serde_json::from_value(raw.clone()).expect("decode roster");
        let encoded = serde_json::to_value(&document).expect("encode roster");
        assert_eq!(encoded, raw);
    }
}
