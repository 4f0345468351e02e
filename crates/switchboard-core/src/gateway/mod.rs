//! Gateway RPC client: one request/response call against the
//! external gateway, over a pluggable transport.

mod parse;
pub mod roster;
mod transport;

pub use parse::parse_loose_json;
pub use transport::{DefaultTransport, HttpTransport, LocalProcessTransport};

use async_trait::async_trait;
use log::{debug, warn};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use switchboard_protocol::{AgentInvokeParams, AgentInvokeResponse, method};
use thiserror::Error;

/// Env key selecting local or external gateway mode.
pub const ENV_GATEWAY_MODE: &str = "SWITCHBOARD_GATEWAY_MODE";
/// Env key naming the gateway companion executable.
pub const ENV_GATEWAY_BIN: &str = "SWITCHBOARD_GATEWAY_BIN";
/// Env key with the external gateway base URL.
pub const ENV_GATEWAY_URL: &str = "SWITCHBOARD_GATEWAY_URL";
/// Env key with the external gateway bearer token.
pub const ENV_GATEWAY_TOKEN: &str = "SWITCHBOARD_GATEWAY_TOKEN";
/// Env key overriding the default call timeout in milliseconds.
pub const ENV_GATEWAY_TIMEOUT_MS: &str = "SWITCHBOARD_GATEWAY_TIMEOUT_MS";

/// Companion executable used when none is configured.
pub const DEFAULT_GATEWAY_BIN: &str = "switchboard-gateway";
const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Errors raised by gateway RPC calls.
#[derive(Debug, Error)]
pub enum GatewayRpcError {
    /// The gateway companion executable does not exist on this host.
    #[error("gateway command not found: '{command}'")]
    CommandNotFound { command: String },
    /// The call did not complete within the timeout.
    #[error("gateway call timed out (method={method}, timeout_ms={timeout_ms})")]
    Timeout { method: String, timeout_ms: u64 },
    /// The transport failed before an RPC-level response arrived.
    #[error("gateway transport error (method={method}): {message}")]
    Transport { method: String, message: String },
    /// The gateway answered with an application-level failure.
    #[error("gateway rpc failure (method={method}): {message}")]
    Rpc { method: String, message: String },
    /// The gateway rejected a write because the supplied concurrency
    /// token is stale.
    #[error("gateway rejected write: stale concurrency token")]
    WriteConflict,
    /// The gateway response could not be decoded.
    #[error("failed to decode gateway response (method={method}): {message}")]
    Decode { method: String, message: String },
}

/// Connection mode carried by the invocation environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayMode {
    /// Gateway runs on this host and may be restarted by this layer.
    Local,
    /// Gateway is reached over HTTP and is never restarted here.
    External,
}

/// Gateway connection settings extracted from an environment map.
#[derive(Debug, Clone)]
pub struct GatewayEnv {
    /// Connection mode.
    pub mode: GatewayMode,
    /// Companion executable for local mode.
    pub bin: String,
    /// Base URL for external mode.
    pub url: Option<String>,
    /// Bearer token for external mode.
    pub token: Option<String>,
    /// Default call timeout.
    pub timeout_ms: u64,
}

impl GatewayEnv {
    /// Read gateway settings out of a resolved environment map.
    pub fn from_env(env: &BTreeMap<String, String>) -> Self {
        let mode = match env.get(ENV_GATEWAY_MODE).map(|mode| mode.trim()) {
            Some(mode) if mode.eq_ignore_ascii_case("external") => GatewayMode::External,
            _ => GatewayMode::Local,
        };
        let bin = env
            .get(ENV_GATEWAY_BIN)
            .map(|bin| bin.trim().to_string())
            .filter(|bin| !bin.is_empty())
            .unwrap_or_else(|| DEFAULT_GATEWAY_BIN.to_string());
        let timeout_ms = env
            .get(ENV_GATEWAY_TIMEOUT_MS)
            .and_then(|raw| raw.trim().parse().ok())
            .unwrap_or(DEFAULT_TIMEOUT_MS);
        Self {
            mode,
            bin,
            url: env.get(ENV_GATEWAY_URL).cloned(),
            token: env.get(ENV_GATEWAY_TOKEN).cloned(),
            timeout_ms,
        }
    }
}

/// Per-call options.
#[derive(Debug, Clone, Copy, Default)]
pub struct CallOptions {
    /// Ask the gateway to long-poll until a final result exists.
    pub expect_final: bool,
    /// Override the environment's call timeout.
    pub timeout_ms: Option<u64>,
}

/// Transport seam behind the client: local subprocess or HTTP.
#[async_trait]
pub trait GatewayTransport: Send + Sync {
    /// Issue one call and return the raw response envelope.
    async fn call(
        &self,
        env: &GatewayEnv,
        method: &str,
        params: &Value,
        options: &CallOptions,
    ) -> Result<Value, GatewayRpcError>;

    /// Restart a local gateway; returns whether the restart reported
    /// success.
    async fn restart(&self, env: &GatewayEnv) -> Result<bool, GatewayRpcError>;
}

/// Gateway RPC client over a pluggable transport.
#[derive(Clone)]
pub struct GatewayClient {
    transport: Arc<dyn GatewayTransport>,
}

impl GatewayClient {
    /// Client over the default mode-dispatching transport.
    pub fn new() -> Self {
        Self::with_transport(Arc::new(DefaultTransport::new()))
    }

    /// Client over an explicit transport (used by tests).
    pub fn with_transport(transport: Arc<dyn GatewayTransport>) -> Self {
        Self { transport }
    }

    /// Issue one RPC call and decode the result payload.
    pub async fn call(
        &self,
        env: &BTreeMap<String, String>,
        method: &str,
        params: Value,
        options: CallOptions,
    ) -> Result<Value, GatewayRpcError> {
        let gateway_env = GatewayEnv::from_env(env);
        let timeout_ms = options.timeout_ms.unwrap_or(gateway_env.timeout_ms);
        debug!(
            "gateway call (method={}, mode={:?}, timeout_ms={})",
            method, gateway_env.mode, timeout_ms
        );

        let call = self
            .transport
            .call(&gateway_env, method, &params, &options);
        let envelope = match tokio::time::timeout(Duration::from_millis(timeout_ms), call).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(GatewayRpcError::Timeout {
                    method: method.to_string(),
                    timeout_ms,
                });
            }
        };
        decode_envelope(method, envelope)
    }

    /// Restart the local gateway. External-mode gateways are never
    /// restarted by this layer; the call reports no restart instead.
    pub async fn restart(&self, env: &BTreeMap<String, String>) -> Result<bool, GatewayRpcError> {
        let gateway_env = GatewayEnv::from_env(env);
        if gateway_env.mode != GatewayMode::Local {
            debug!("skipping gateway restart for external mode");
            return Ok(false);
        }
        self.transport.restart(&gateway_env).await
    }

    /// Invoke an agent through the gateway `agent` method.
    pub async fn invoke_agent(
        &self,
        env: &BTreeMap<String, String>,
        params: AgentInvokeParams,
    ) -> Result<AgentInvokeResponse, GatewayRpcError> {
        let params = serde_json::to_value(&params).map_err(|err| GatewayRpcError::Decode {
            method: method::AGENT.to_string(),
            message: err.to_string(),
        })?;
        let result = self
            .call(
                env,
                method::AGENT,
                params,
                CallOptions {
                    expect_final: true,
                    timeout_ms: None,
                },
            )
            .await?;
        AgentInvokeResponse::from_value(result).map_err(|err| GatewayRpcError::Decode {
            method: method::AGENT.to_string(),
            message: err.to_string(),
        })
    }

    /// Fetch the gateway skill status object.
    pub async fn skills_status(
        &self,
        env: &BTreeMap<String, String>,
    ) -> Result<Value, GatewayRpcError> {
        self.call(env, method::SKILLS_STATUS, Value::Null, CallOptions::default())
            .await
    }
}

impl Default for GatewayClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Decode a raw response envelope: `{"result": ..}` on success,
/// `{"error": {"message", "code"?}}` on failure. A conflict code maps
/// to [`GatewayRpcError::WriteConflict`]; conflict wording without a
/// code counts only on `config.apply`, where a stale token is the one
/// conflict the gateway reports.
fn decode_envelope(method: &str, envelope: Value) -> Result<Value, GatewayRpcError> {
    let object = match envelope {
        Value::Object(object) => object,
        other => {
            return Err(GatewayRpcError::Decode {
                method: method.to_string(),
                message: format!("response envelope is not an object: {other}"),
            });
        }
    };

    if let Some(error) = object.get("error") {
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unknown gateway error")
            .to_string();
        let code = error.get("code").and_then(Value::as_str).unwrap_or("");
        let conflict = code.eq_ignore_ascii_case("conflict")
            || (method == method::CONFIG_APPLY && message.to_lowercase().contains("conflict"));
        if conflict {
            warn!("gateway reported a write conflict (method={method})");
            return Err(GatewayRpcError::WriteConflict);
        }
        return Err(GatewayRpcError::Rpc {
            method: method.to_string(),
            message,
        });
    }

    match object.get("result") {
        Some(result) => Ok(result.clone()),
        None => Err(GatewayRpcError::Decode {
            method: method.to_string(),
            message: "response envelope has neither result nor error".to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::{GatewayEnv, GatewayMode, decode_envelope};
    use crate::gateway::GatewayRpcError;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn env(entries: &[(&str, &str)]) -> BTreeMap<String, String> {
        entries
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect()
    }

    #[test]
    fn gateway_env_defaults_to_local_mode() {
        let gateway_env = GatewayEnv::from_env(&BTreeMap::new());
        assert_eq!(gateway_env.mode, GatewayMode::Local);
        assert_eq!(gateway_env.bin, "switchboard-gateway");
        assert_eq!(gateway_env.timeout_ms, 30_000);
    }

    #[test]
    fn gateway_env_reads_external_settings() {
        let gateway_env = GatewayEnv::from_env(&env(&[
            ("SWITCHBOARD_GATEWAY_MODE", "External"),
            ("SWITCHBOARD_GATEWAY_URL", "http://gateway.internal:4100"),
            ("SWITCHBOARD_GATEWAY_TOKEN", "secret"),
            ("SWITCHBOARD_GATEWAY_TIMEOUT_MS", "500"),
        ]));
        assert_eq!(gateway_env.mode, GatewayMode::External);
        assert_eq!(
            gateway_env.url,
            Some("http://gateway.internal:4100".to_string())
        );
        assert_eq!(gateway_env.token, Some("secret".to_string()));
        assert_eq!(gateway_env.timeout_ms, 500);
    }

    #[test]
    fn decode_envelope_returns_result_payload() {
        let result = decode_envelope("config.get", json!({"result": {"raw": "{}"}}))
            .expect("decode");
        assert_eq!(result, json!({"raw": "{}"}));
    }

    #[test]
    fn decode_envelope_maps_conflict_code() {
        let err = decode_envelope(
            "config.apply",
            json!({"error": {"code": "conflict", "message": "base hash is stale"}}),
        )
        .expect_err("conflict");
        assert!(matches!(err, GatewayRpcError::WriteConflict));
    }

    #[test]
    fn decode_envelope_maps_conflict_wording_on_config_apply() {
        let err = decode_envelope(
            "config.apply",
            json!({"error": {"message": "write conflict detected"}}),
        )
        .expect_err("conflict");
        assert!(matches!(err, GatewayRpcError::WriteConflict));
    }

    #[test]
    fn decode_envelope_keeps_conflict_wording_on_other_methods() {
        let err = decode_envelope(
            "agent",
            json!({"error": {"message": "agent name conflicts with a reserved word"}}),
        )
        .expect_err("rpc failure");
        match err {
            GatewayRpcError::Rpc { method, message } => {
                assert_eq!(method, "agent");
                assert!(message.contains("conflicts"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn decode_envelope_maps_rpc_failure() {
        let err = decode_envelope(
            "agent",
            json!({"error": {"message": "agent is busy"}}),
        )
        .expect_err("rpc failure");
        match err {
            GatewayRpcError::Rpc { method, message } => {
                assert_eq!(method, "agent");
                assert_eq!(message, "agent is busy");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
