//! Wire protocol types shared across Switchboard crates.

mod gateway;
mod roster;

pub use gateway::{
    AgentInvokeParams, AgentInvokeResponse, AgentMeta, ConfigApplyParams, ConfigGetResponse,
    InvokeMeta, TextPayload, method,
};
pub use roster::{RosterDocument, RosterEntry, SandboxSettings, ToolSettings};

use serde::{Deserialize, Serialize};

/// Backend archetype for a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// Backed by a local CLI tool.
    Cli,
    /// Backed by an HTTP/RPC-reachable service.
    Http,
}

/// Fixed capability flags declared by every provider variant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderCapabilities {
    /// Supports agent-style invocation (agent identity forwarded).
    pub agent_invocation: bool,
    /// Supports selecting a model per invocation.
    pub model_selection: bool,
    /// Supports an authentication flow.
    pub auth: bool,
    /// Supports passing through extra CLI arguments.
    pub passthrough_args: bool,
    /// Supports creating and deleting remote agents.
    pub remote_agents: bool,
}

/// Aggregated result of a single provider invocation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvokeOutcome {
    /// Process exit code; `None` when terminated by signal.
    pub code: Option<i32>,
    /// Aggregated stdout.
    pub stdout: String,
    /// Aggregated stderr.
    pub stderr: String,
    /// Native session token reported by the provider, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_session_id: Option<String>,
}

impl InvokeOutcome {
    /// Whether the provider exited successfully.
    pub fn succeeded(&self) -> bool {
        self.code == Some(0)
    }
}
