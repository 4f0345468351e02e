//! Roster synchronizer: read-modify-write of the gateway's shared
//! agent roster with hash-based optimistic concurrency.

use super::{CallOptions, GatewayClient, GatewayRpcError, parse_loose_json};
use log::{debug, info, warn};
use serde_json::Value;
use std::collections::BTreeMap;
use switchboard_config::normalize_id;
use switchboard_protocol::{
    ConfigApplyParams, ConfigGetResponse, RosterDocument, RosterEntry, method,
};

/// Sandbox mode forced onto managed roster entries.
const SANDBOX_OFF: &str = "off";
/// Wildcard tool allowlist entry.
const TOOL_WILDCARD: &str = "*";

/// Roster document plus the concurrency token it was read with.
#[derive(Debug, Clone)]
pub struct RosterSnapshot {
    /// Decoded roster document.
    pub document: RosterDocument,
    /// Opaque token to forward on write; `None` when the gateway did
    /// not supply one, which makes the next write unconditional.
    pub hash: Option<String>,
}

/// Managed fields of a roster entry this core creates or updates.
#[derive(Debug, Clone, Default)]
pub struct RosterAgentSpec {
    /// Agent id (normalized before matching).
    pub id: String,
    /// Display name, merged when present.
    pub name: Option<String>,
    /// Workspace path, merged when present.
    pub workspace: Option<String>,
    /// Agent state directory, merged when present.
    pub agent_dir: Option<String>,
}

/// Result of an idempotent roster removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveOutcome {
    /// An entry was removed and the roster written back.
    Removed,
    /// No matching entry existed; nothing was written.
    AlreadyAbsent,
}

/// Result of a bulk policy sync.
#[derive(Debug, Clone, Default)]
pub struct PolicySyncReport {
    /// Agent ids whose entries were actually changed.
    pub changed: Vec<String>,
    /// One warning per requested id with no roster entry.
    pub warnings: Vec<String>,
}

/// Synchronizes the gateway roster for one environment.
pub struct RosterSync<'a> {
    client: &'a GatewayClient,
    env: &'a BTreeMap<String, String>,
}

impl<'a> RosterSync<'a> {
    pub fn new(client: &'a GatewayClient, env: &'a BTreeMap<String, String>) -> Self {
        Self { client, env }
    }

    /// Fetch and decode the current roster. The token is read fresh
    /// on every cycle and never cached across unrelated writes.
    pub async fn read_roster(&self) -> Result<RosterSnapshot, GatewayRpcError> {
        let result = self
            .client
            .call(self.env, method::CONFIG_GET, Value::Null, CallOptions::default())
            .await?;
        let response: ConfigGetResponse =
            serde_json::from_value(result).map_err(|err| GatewayRpcError::Decode {
                method: method::CONFIG_GET.to_string(),
                message: err.to_string(),
            })?;

        let value = parse_loose_json(&response.raw).ok_or_else(|| GatewayRpcError::Decode {
            method: method::CONFIG_GET.to_string(),
            message: "gateway configuration is not recoverable JSON".to_string(),
        })?;
        let document: RosterDocument =
            serde_json::from_value(value).map_err(|err| GatewayRpcError::Decode {
                method: method::CONFIG_GET.to_string(),
                message: err.to_string(),
            })?;
        debug!(
            "read roster (agents={}, has_hash={})",
            document.agents.len(),
            response.hash.is_some()
        );
        Ok(RosterSnapshot {
            document,
            hash: response.hash,
        })
    }

    /// Write a patched roster back, forwarding the token from the
    /// read that produced it. The gateway is authoritative for
    /// conflict detection.
    pub async fn apply_roster_patch(
        &self,
        document: &RosterDocument,
        base_hash: Option<String>,
    ) -> Result<(), GatewayRpcError> {
        if base_hash.is_none() {
            // Lost-update hazard: without a token the gateway cannot
            // detect a concurrent edit. Flagged, not worked around.
            warn!("applying roster patch without a concurrency token; write is unconditional");
        }
        let raw = serde_json::to_string_pretty(document).map_err(|err| {
            GatewayRpcError::Decode {
                method: method::CONFIG_APPLY.to_string(),
                message: err.to_string(),
            }
        })?;
        let params = serde_json::to_value(ConfigApplyParams { raw, base_hash }).map_err(|err| {
            GatewayRpcError::Decode {
                method: method::CONFIG_APPLY.to_string(),
                message: err.to_string(),
            }
        })?;
        self.client
            .call(self.env, method::CONFIG_APPLY, params, CallOptions::default())
            .await?;
        Ok(())
    }

    /// Create or update a managed roster entry. Returns whether the
    /// roster actually changed (and was written back).
    pub async fn upsert_agent(&self, spec: &RosterAgentSpec) -> Result<bool, GatewayRpcError> {
        let snapshot = self.read_roster().await?;
        let mut document = snapshot.document;
        let changed = upsert_entry(&mut document, spec);
        if !changed {
            debug!("roster upsert is a no-op (agent_id={})", spec.id);
            return Ok(false);
        }
        self.apply_roster_patch(&document, snapshot.hash).await?;
        info!("upserted roster entry (agent_id={})", spec.id);
        Ok(true)
    }

    /// Remove a roster entry by id. Removing an absent entry is a
    /// no-op success, so repeated deletes are idempotent.
    pub async fn remove_agent(&self, agent_id: &str) -> Result<RemoveOutcome, GatewayRpcError> {
        let snapshot = self.read_roster().await?;
        let mut document = snapshot.document;
        if !remove_entry(&mut document, agent_id) {
            debug!("roster entry already absent (agent_id={})", agent_id);
            return Ok(RemoveOutcome::AlreadyAbsent);
        }
        self.apply_roster_patch(&document, snapshot.hash).await?;
        info!("removed roster entry (agent_id={})", agent_id);
        Ok(RemoveOutcome::Removed)
    }

    /// Force the managed sandbox/tool policy onto each present entry
    /// and collect a warning per requested id with no entry. Writes
    /// back at most once, and only when something changed.
    pub async fn sync_policies(
        &self,
        agent_ids: &[String],
    ) -> Result<PolicySyncReport, GatewayRpcError> {
        let snapshot = self.read_roster().await?;
        let mut document = snapshot.document;
        let mut report = PolicySyncReport::default();

        for agent_id in agent_ids {
            let normalized = normalize_id(agent_id);
            match document
                .agents
                .iter_mut()
                .find(|entry| normalize_id(&entry.id) == normalized)
            {
                Some(entry) => {
                    if ensure_entry_policy(entry) {
                        report.changed.push(normalized);
                    }
                }
                None => {
                    report
                        .warnings
                        .push(format!("agent '{agent_id}' has no roster entry"));
                }
            }
        }

        if report.changed.is_empty() {
            debug!(
                "policy sync changed nothing (requested={}, warnings={})",
                agent_ids.len(),
                report.warnings.len()
            );
            return Ok(report);
        }
        self.apply_roster_patch(&document, snapshot.hash).await?;
        info!(
            "synced roster policies (changed={}, warnings={})",
            report.changed.len(),
            report.warnings.len()
        );
        Ok(report)
    }
}

/// Force the full managed policy: sandbox off, allowlist exactly the
/// wildcard. Used for entries this core creates or updates.
fn force_entry_policy(entry: &mut RosterEntry) -> bool {
    let mut changed = false;
    if entry.sandbox.mode.as_deref() != Some(SANDBOX_OFF) {
        entry.sandbox.mode = Some(SANDBOX_OFF.to_string());
        changed = true;
    }
    let wildcard_only = vec![TOOL_WILDCARD.to_string()];
    if entry.tools.allow.as_ref() != Some(&wildcard_only) {
        entry.tools.allow = Some(wildcard_only);
        changed = true;
    }
    changed
}

/// Force sandbox off and make sure the allowlist contains the
/// wildcard, without discarding other allowed tools. Used by bulk
/// policy sync.
fn ensure_entry_policy(entry: &mut RosterEntry) -> bool {
    let mut changed = false;
    if entry.sandbox.mode.as_deref() != Some(SANDBOX_OFF) {
        entry.sandbox.mode = Some(SANDBOX_OFF.to_string());
        changed = true;
    }
    let allow = entry.tools.allow.get_or_insert_with(Vec::new);
    if !allow.iter().any(|tool| tool == TOOL_WILDCARD) {
        allow.push(TOOL_WILDCARD.to_string());
        changed = true;
    }
    changed
}

/// Shallow-merge a managed spec into the roster, appending a new
/// entry when no normalized id matches. Returns whether the document
/// changed.
fn upsert_entry(document: &mut RosterDocument, spec: &RosterAgentSpec) -> bool {
    let normalized = normalize_id(&spec.id);
    match document
        .agents
        .iter_mut()
        .find(|entry| normalize_id(&entry.id) == normalized)
    {
        Some(entry) => {
            let before = entry.clone();
            entry.id = normalized;
            if spec.name.is_some() {
                entry.name = spec.name.clone();
            }
            if spec.workspace.is_some() {
                entry.workspace = spec.workspace.clone();
            }
            if spec.agent_dir.is_some() {
                entry.agent_dir = spec.agent_dir.clone();
            }
            let forced = force_entry_policy(entry);
            forced || *entry != before
        }
        None => {
            let mut entry = RosterEntry {
                id: normalized,
                name: spec.name.clone(),
                workspace: spec.workspace.clone(),
                agent_dir: spec.agent_dir.clone(),
                ..RosterEntry::default()
            };
            force_entry_policy(&mut entry);
            document.agents.push(entry);
            true
        }
    }
}

/// Drop every entry whose normalized id matches. Returns whether
/// anything was removed.
fn remove_entry(document: &mut RosterDocument, agent_id: &str) -> bool {
    let normalized = normalize_id(agent_id);
    let before = document.agents.len();
    document
        .agents
        .retain(|entry| normalize_id(&entry.id) != normalized);
    document.agents.len() != before
}

#[cfg(test)]
mod tests {
    use super::{RosterAgentSpec, ensure_entry_policy, force_entry_policy, remove_entry, upsert_entry};
    use pretty_assertions::assert_eq;
    use switchboard_protocol::{RosterDocument, RosterEntry};

    fn entry(id: &str) -> RosterEntry {
        RosterEntry {
            id: id.to_string(),
            ..RosterEntry::default()
        }
    }

    #[test]
    fn upsert_appends_with_forced_policy() {
        let mut document = RosterDocument::default();
        let spec = RosterAgentSpec {
            id: "Planner".to_string(),
            name: Some("Planner".to_string()),
            workspace: Some("/work/planner".to_string()),
            agent_dir: None,
        };

        assert_eq!(upsert_entry(&mut document, &spec), true);
        let added = &document.agents[0];
        assert_eq!(added.id, "planner");
        assert_eq!(added.sandbox.mode.as_deref(), Some("off"));
        assert_eq!(added.tools.allow, Some(vec!["*".to_string()]));

        // Same spec again: nothing to change.
        assert_eq!(upsert_entry(&mut document, &spec), false);
    }

    #[test]
    fn upsert_merges_existing_entry_by_normalized_id() {
        let mut document = RosterDocument::default();
        let mut existing = entry("planner");
        existing.name = Some("Old name".to_string());
        document.agents.push(existing);

        let spec = RosterAgentSpec {
            id: "  PLANNER ".to_string(),
            name: Some("New name".to_string()),
            workspace: None,
            agent_dir: None,
        };
        assert_eq!(upsert_entry(&mut document, &spec), true);
        assert_eq!(document.agents.len(), 1);
        assert_eq!(document.agents[0].name.as_deref(), Some("New name"));
    }

    #[test]
    fn remove_entry_is_idempotent() {
        let mut document = RosterDocument::default();
        document.agents.push(entry("planner"));

        assert_eq!(remove_entry(&mut document, " Planner "), true);
        assert_eq!(remove_entry(&mut document, "planner"), false);
        assert_eq!(document.agents.len(), 0);
    }

    #[test]
    fn force_policy_overwrites_allowlist() {
        let mut target = entry("a");
        target.tools.allow = Some(vec!["bash".to_string()]);
        assert_eq!(force_entry_policy(&mut target), true);
        assert_eq!(target.tools.allow, Some(vec!["*".to_string()]));
        assert_eq!(force_entry_policy(&mut target), false);
    }

    #[test]
    fn ensure_policy_keeps_existing_tools() {
        let mut target = entry("a");
        target.tools.allow = Some(vec!["bash".to_string()]);
        assert_eq!(ensure_entry_policy(&mut target), true);
        assert_eq!(
            target.tools.allow,
            Some(vec!["bash".to_string(), "*".to_string()])
        );
        assert_eq!(target.sandbox.mode.as_deref(), Some("off"));
        assert_eq!(ensure_entry_policy(&mut target), false);
    }
}
