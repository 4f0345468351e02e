//! The gateway-backed provider: prefers the local gateway CLI and
//! carries remote agent management through the roster synchronizer.

use super::{
    InvokeOptions, InvokeOutputSink, Provider, ProviderError, capture_session_line,
    run_provider_command,
};
use crate::gateway::roster::{RosterAgentSpec, RosterSync};
use crate::gateway::{GatewayClient, GatewayEnv};
use crate::registry::{
    OnboardingSpec, ProviderFactory, ProviderInfo, ProviderRegistration,
};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use switchboard_protocol::{InvokeOutcome, ProviderCapabilities, ProviderKind};

/// Fixed id of the gateway-backed provider.
pub const GATEWAY_PROVIDER_ID: &str = "gateway";

const GATEWAY_DISPLAY_NAME: &str = "Gateway";
const SESSION_PREFIX: &str = "session:";

/// Capabilities the gateway provider declares.
pub fn gateway_capabilities() -> ProviderCapabilities {
    ProviderCapabilities {
        agent_invocation: true,
        model_selection: true,
        auth: false,
        passthrough_args: false,
        remote_agents: true,
    }
}

/// Provider backed by the gateway. Invocation shells out to the
/// gateway companion CLI; the orchestrator falls back to the RPC
/// `agent` method when that command is missing. Session ids from this
/// provider are already the application's native format, so the
/// aliasing layer never applies to it.
pub struct GatewayProvider {
    client: GatewayClient,
}

impl GatewayProvider {
    pub fn new(client: GatewayClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Provider for GatewayProvider {
    fn id(&self) -> &str {
        GATEWAY_PROVIDER_ID
    }

    fn display_name(&self) -> &str {
        GATEWAY_DISPLAY_NAME
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Http
    }

    fn capabilities(&self) -> ProviderCapabilities {
        gateway_capabilities()
    }

    async fn invoke(
        &self,
        options: InvokeOptions,
        sink: Option<&mut (dyn InvokeOutputSink + Send + '_)>,
    ) -> Result<InvokeOutcome, ProviderError> {
        let gateway_env = GatewayEnv::from_env(&options.env);
        let mut args = vec!["agent".to_string()];
        if let Some(agent_id) = &options.agent_id {
            args.push("--agent".to_string());
            args.push(agent_id.clone());
        }
        if let Some(session_id) = &options.session_id {
            args.push("--session".to_string());
            args.push(session_id.clone());
        }
        if let Some(model) = &options.model {
            args.push("--model".to_string());
            args.push(model.clone());
        }
        args.push(options.message.clone());

        let mut outcome = run_provider_command(
            &gateway_env.bin,
            &args,
            &options.env,
            options.cwd.as_ref(),
            sink,
        )
        .await?;
        outcome.provider_session_id = capture_session_line(&outcome.stdout, SESSION_PREFIX);
        Ok(outcome)
    }

    async fn create_remote_agent(
        &self,
        agent_id: &str,
        env: &BTreeMap<String, String>,
    ) -> Result<(), ProviderError> {
        let sync = RosterSync::new(&self.client, env);
        sync.upsert_agent(&RosterAgentSpec {
            id: agent_id.to_string(),
            ..RosterAgentSpec::default()
        })
        .await
        .map_err(|err| ProviderError::Invoke {
            provider_id: GATEWAY_PROVIDER_ID.to_string(),
            message: err.to_string(),
        })?;
        Ok(())
    }

    async fn delete_remote_agent(
        &self,
        agent_id: &str,
        env: &BTreeMap<String, String>,
    ) -> Result<(), ProviderError> {
        let sync = RosterSync::new(&self.client, env);
        sync.remove_agent(agent_id)
            .await
            .map_err(|err| ProviderError::Invoke {
                provider_id: GATEWAY_PROVIDER_ID.to_string(),
                message: err.to_string(),
            })?;
        Ok(())
    }
}

struct GatewayProviderFactory {
    client: GatewayClient,
}

#[async_trait]
impl ProviderFactory for GatewayProviderFactory {
    async fn create(&self) -> Result<Arc<dyn Provider>, ProviderError> {
        Ok(Arc::new(GatewayProvider::new(self.client.clone())))
    }
}

/// Registration entry for the gateway provider.
pub fn gateway_registration(client: GatewayClient) -> ProviderRegistration {
    ProviderRegistration {
        info: ProviderInfo {
            id: GATEWAY_PROVIDER_ID.to_string(),
            display_name: GATEWAY_DISPLAY_NAME.to_string(),
            kind: ProviderKind::Http,
            capabilities: gateway_capabilities(),
        },
        onboarding: Some(OnboardingSpec {
            summary: "Install the gateway companion CLI or point the environment at an external gateway".to_string(),
            required_env: vec![
                crate::gateway::ENV_GATEWAY_MODE.to_string(),
                crate::gateway::ENV_GATEWAY_URL.to_string(),
                crate::gateway::ENV_GATEWAY_TOKEN.to_string(),
            ],
            docs_url: None,
        }),
        factory: Arc::new(GatewayProviderFactory { client }),
    }
}
