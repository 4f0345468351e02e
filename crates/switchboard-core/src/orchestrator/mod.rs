//! Invocation orchestrator: resolves the agent's provider, builds
//! its environment, translates session aliases, invokes, and applies
//! the narrow gateway fallback and retry policies.

mod classify;

pub use classify::{
    CWD_FAILURE_MARKER, InvokeDisposition, UV_CWD_MARKER, classify_outcome,
};

use crate::binding::{
    AgentConfigSource, ROOT_AGENT_ID, normalize_agent_id, provider_id_from_record,
};
use crate::error::CoreError;
use crate::gateway::GatewayClient;
use crate::provider::gateway::GATEWAY_PROVIDER_ID;
use crate::provider::{InvokeOptions, InvokeOutputSink, Provider, ProviderError};
use crate::registry::ProviderRegistry;
use log::{debug, info, warn};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use switchboard_config::ConfigStore;
use switchboard_protocol::{AgentInvokeParams, InvokeOutcome};
use uuid::Uuid;

/// One logical "send this message as this agent" request.
#[derive(Debug, Clone, Default)]
pub struct InvocationRequest {
    /// Target agent id (normalized during resolution).
    pub agent_id: String,
    /// Message content.
    pub message: String,
    /// Caller env override; the orchestrator's ambient snapshot is
    /// used when absent.
    pub env: Option<BTreeMap<String, String>>,
    /// Application-level session alias.
    pub provider_session_id: Option<String>,
    /// Optional model override.
    pub model: Option<String>,
    /// Caller-supplied idempotency key for the gateway fallback; a
    /// fresh key is generated per call when absent.
    pub idempotency_key: Option<String>,
    /// Passthrough arguments for providers that declare support.
    pub extra_args: Vec<String>,
    /// Working directory override.
    pub cwd: Option<PathBuf>,
}

/// Invocation result tagged with the resolved identities.
#[derive(Debug, Clone)]
pub struct InvocationResult {
    /// Normalized agent id the request resolved to.
    pub agent_id: String,
    /// Provider id that serviced the request.
    pub provider_id: String,
    /// Aggregated provider outcome.
    pub outcome: InvokeOutcome,
}

/// Orchestration facade over the registry, config store, agent
/// config records, and the gateway client.
pub struct Orchestrator {
    registry: Arc<ProviderRegistry>,
    store: ConfigStore,
    agents: Arc<dyn AgentConfigSource>,
    gateway: GatewayClient,
    default_provider_id: String,
    /// Ambient process env, captured once at this boundary and
    /// threaded explicitly from here on.
    ambient_env: BTreeMap<String, String>,
}

impl Orchestrator {
    /// Construct an orchestrator, snapshotting the ambient process
    /// environment once.
    pub fn new(
        registry: Arc<ProviderRegistry>,
        store: ConfigStore,
        agents: Arc<dyn AgentConfigSource>,
        gateway: GatewayClient,
    ) -> Self {
        info!("initializing orchestrator");
        Self {
            registry,
            store,
            agents,
            gateway,
            default_provider_id: GATEWAY_PROVIDER_ID.to_string(),
            ambient_env: std::env::vars().collect(),
        }
    }

    /// Override the global default provider id.
    pub fn with_default_provider(mut self, provider_id: &str) -> Self {
        self.default_provider_id = switchboard_config::normalize_id(provider_id);
        self
    }

    /// Replace the ambient env snapshot (used by tests and embedders
    /// that manage the environment themselves).
    pub fn with_ambient_env(mut self, env: BTreeMap<String, String>) -> Self {
        self.ambient_env = env;
        self
    }

    /// Resolve the provider id bound to an agent. The root agent is
    /// hard-wired to the gateway provider; other agents resolve via
    /// their config record, falling back to the default provider.
    /// Idempotent between writes to the agent's record.
    pub async fn resolve_agent_provider_id(&self, agent_id: &str) -> Result<String, CoreError> {
        let agent_id = normalize_agent_id(agent_id)?;
        if agent_id == ROOT_AGENT_ID {
            return Ok(GATEWAY_PROVIDER_ID.to_string());
        }
        let record = self.agents.agent_record(&agent_id).await?;
        let provider_id = provider_id_from_record(record.as_ref(), &self.default_provider_id);
        debug!(
            "resolved agent binding (agent_id={}, provider_id={})",
            agent_id, provider_id
        );
        Ok(provider_id)
    }

    /// Run the full invocation pipeline for one request.
    pub async fn invoke(
        &self,
        request: InvocationRequest,
        mut sink: Option<&mut (dyn InvokeOutputSink + Send + '_)>,
    ) -> Result<InvocationResult, CoreError> {
        // 1. Binding. The registry validates that the agent's record
        //    still names a registered provider.
        let agent_id = normalize_agent_id(&request.agent_id)?;
        let provider_id = self.resolve_agent_provider_id(&agent_id).await?;
        let provider = self.registry.create(&provider_id).await?;
        let is_gateway = provider_id == GATEWAY_PROVIDER_ID;

        // 2. Environment: persisted provider env with the caller's
        //    override (or the ambient snapshot) layered on top.
        let caller_env = request.env.as_ref().unwrap_or(&self.ambient_env);
        let env = self.store.resolve_provider_env(&provider_id, caller_env)?;

        // 3. Session alias. The gateway provider speaks the
        //    application's native session format, so its ids pass
        //    through verbatim; everyone else goes through the alias
        //    table, where an unmapped alias means "start fresh".
        let session_id = match &request.provider_session_id {
            Some(alias) if is_gateway => Some(alias.clone()),
            Some(alias) => self
                .store
                .session_bindings(&provider_id, &agent_id)?
                .native_id(alias)
                .map(str::to_string),
            None => None,
        };

        let capabilities = provider.capabilities();
        let options = InvokeOptions {
            message: request.message.clone(),
            env: env.clone(),
            cwd: request.cwd.clone(),
            session_id,
            agent_id: capabilities.agent_invocation.then(|| agent_id.clone()),
            model: request.model.clone().filter(|_| capabilities.model_selection),
            extra_args: if capabilities.passthrough_args {
                request.extra_args.clone()
            } else {
                Vec::new()
            },
        };

        // 4-6. Invoke, then apply the two narrow policies.
        let first = provider.invoke(options.clone(), sink.as_deref_mut()).await;
        let outcome = match first {
            Ok(outcome)
                if is_gateway
                    && classify_outcome(&outcome) == InvokeDisposition::TransientGatewayCwd =>
            {
                self.retry_after_restart(&env, provider.as_ref(), options, outcome, sink)
                    .await?
            }
            Ok(outcome) => outcome,
            Err(ProviderError::CommandNotFound { command }) if is_gateway => {
                info!(
                    "gateway command missing, falling back to rpc (command={}, agent_id={})",
                    command, agent_id
                );
                self.invoke_via_rpc(&env, &agent_id, &request).await?
            }
            Err(err) => return Err(err.into()),
        };

        // 7. Persist a newly learned alias mapping. Never overwrite a
        //    known mapping with an absent or empty output id.
        self.persist_session_alias(is_gateway, &provider_id, &agent_id, &request, &outcome)?;

        // 8. Tagged result.
        Ok(InvocationResult {
            agent_id,
            provider_id,
            outcome,
        })
    }

    /// One-shot restart-and-retry after the transient gateway cwd
    /// signature. The retried result is final even when it matches
    /// the signature again; there is never a second restart.
    async fn retry_after_restart(
        &self,
        env: &BTreeMap<String, String>,
        provider: &dyn Provider,
        options: InvokeOptions,
        original: InvokeOutcome,
        sink: Option<&mut (dyn InvokeOutputSink + Send + '_)>,
    ) -> Result<InvokeOutcome, CoreError> {
        warn!("gateway invocation hit the transient cwd failure signature");
        match self.gateway.restart(env).await {
            Ok(true) => {
                info!("gateway restarted, re-invoking once");
                provider.invoke(options, sink).await.map_err(Into::into)
            }
            Ok(false) => {
                debug!("gateway restart unavailable, returning original result");
                Ok(original)
            }
            Err(err) => {
                warn!("gateway restart failed, returning original result: {err}");
                Ok(original)
            }
        }
    }

    /// Gateway fallback: the `agent` RPC call, normalized into the
    /// CLI result shape.
    async fn invoke_via_rpc(
        &self,
        env: &BTreeMap<String, String>,
        agent_id: &str,
        request: &InvocationRequest,
    ) -> Result<InvokeOutcome, CoreError> {
        let idempotency_key = request
            .idempotency_key
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let response = self
            .gateway
            .invoke_agent(
                env,
                AgentInvokeParams {
                    message: request.message.clone(),
                    agent_id: agent_id.to_string(),
                    idempotency_key,
                    model: request.model.clone(),
                    // Gateway session ids are native, pass verbatim.
                    session_id: request.provider_session_id.clone(),
                    session_key: None,
                },
            )
            .await?;

        Ok(InvokeOutcome {
            code: Some(0),
            stdout: response.joined_text(),
            stderr: String::new(),
            provider_session_id: response.session_id().map(str::to_string),
        })
    }

    fn persist_session_alias(
        &self,
        is_gateway: bool,
        provider_id: &str,
        agent_id: &str,
        request: &InvocationRequest,
        outcome: &InvokeOutcome,
    ) -> Result<(), CoreError> {
        if is_gateway {
            return Ok(());
        }
        let (Some(alias), Some(native)) = (
            request.provider_session_id.as_deref(),
            outcome.provider_session_id.as_deref(),
        ) else {
            return Ok(());
        };
        if native.trim().is_empty() {
            return Ok(());
        }

        let mut table = self.store.session_bindings(provider_id, agent_id)?;
        if table.native_id(alias) == Some(native) {
            return Ok(());
        }
        table
            .bindings
            .insert(alias.to_string(), native.to_string());
        self.store.write_session_bindings(&table)?;
        debug!(
            "persisted session alias (provider_id={}, agent_id={}, alias={})",
            provider_id, agent_id, alias
        );
        Ok(())
    }
}
