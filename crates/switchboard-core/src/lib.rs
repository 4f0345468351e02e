//! Provider invocation and gateway synchronization core.
//!
//! Resolves which provider backs an agent, invokes it under a
//! normalized request/response contract, falls back from a missing
//! local command to the gateway RPC, retries once after the known
//! transient gateway failure, translates session aliases through the
//! config store, and synchronizes the gateway roster with hash-based
//! optimistic concurrency.

pub mod binding;
mod error;
pub mod gateway;
pub mod orchestrator;
pub mod provider;
mod registry;

pub use binding::{
    AgentConfigSource, AgentRecord, AgentRuntime, DirAgentConfigSource, ProviderRef,
    ROOT_AGENT_ID, ROOT_REBIND_MESSAGE, normalize_agent_id, provider_id_from_record,
    validate_rebind,
};
pub use error::CoreError;
pub use gateway::{
    CallOptions, GatewayClient, GatewayEnv, GatewayMode, GatewayRpcError, GatewayTransport,
    parse_loose_json,
};
pub use orchestrator::{
    InvocationRequest, InvocationResult, InvokeDisposition, Orchestrator, classify_outcome,
};
pub use provider::cli::{CliProvider, CliProviderSpec};
pub use provider::gateway::{GATEWAY_PROVIDER_ID, GatewayProvider, gateway_registration};
pub use provider::{InvokeOptions, InvokeOutputSink, Provider, ProviderError};
pub use registry::{
    OnboardingSpec, ProviderFactory, ProviderInfo, ProviderRegistration, ProviderRegistry,
};
