//! Gateway transports: local subprocess and external HTTP.

use super::{CallOptions, GatewayEnv, GatewayMode, GatewayRpcError, GatewayTransport};
use async_trait::async_trait;
use log::{debug, info};
use serde_json::{Value, json};
use tokio::process::Command;

/// Run the gateway companion executable and capture its output.
async fn run_gateway_binary(
    env: &GatewayEnv,
    args: &[String],
) -> Result<std::process::Output, GatewayRpcError> {
    // Resolve up front so a missing binary is reported consistently
    // across platforms instead of surfacing as a raw spawn error.
    let bin = which::which(&env.bin).map_err(|_| GatewayRpcError::CommandNotFound {
        command: env.bin.clone(),
    })?;

    Command::new(bin)
        .args(args)
        .stdin(std::process::Stdio::null())
        // A timed-out call drops this future; the child goes with it.
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|err| {
            if err.kind() == std::io::ErrorKind::NotFound {
                GatewayRpcError::CommandNotFound {
                    command: env.bin.clone(),
                }
            } else {
                GatewayRpcError::Transport {
                    method: args.first().cloned().unwrap_or_default(),
                    message: err.to_string(),
                }
            }
        })
}

/// Transport that shells out to the local gateway executable.
#[derive(Debug, Default)]
pub struct LocalProcessTransport;

#[async_trait]
impl GatewayTransport for LocalProcessTransport {
    async fn call(
        &self,
        env: &GatewayEnv,
        method: &str,
        params: &Value,
        options: &CallOptions,
    ) -> Result<Value, GatewayRpcError> {
        let mut args = vec![
            "rpc".to_string(),
            method.to_string(),
            "--json".to_string(),
            params.to_string(),
        ];
        if options.expect_final {
            args.push("--expect-final".to_string());
        }

        let output = run_gateway_binary(env, &args).await?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(GatewayRpcError::Transport {
                method: method.to_string(),
                message: format!(
                    "gateway exited with {:?}: {}",
                    output.status.code(),
                    stderr.trim()
                ),
            });
        }

        serde_json::from_str(stdout.trim()).map_err(|err| GatewayRpcError::Decode {
            method: method.to_string(),
            message: err.to_string(),
        })
    }

    async fn restart(&self, env: &GatewayEnv) -> Result<bool, GatewayRpcError> {
        info!("restarting local gateway (bin={})", env.bin);
        let output = run_gateway_binary(env, &["restart".to_string()]).await?;
        Ok(output.status.success())
    }
}

/// Transport that speaks to an external gateway over HTTP.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GatewayTransport for HttpTransport {
    async fn call(
        &self,
        env: &GatewayEnv,
        method: &str,
        params: &Value,
        options: &CallOptions,
    ) -> Result<Value, GatewayRpcError> {
        let url = env.url.as_deref().ok_or_else(|| GatewayRpcError::Transport {
            method: method.to_string(),
            message: "external mode requires SWITCHBOARD_GATEWAY_URL".to_string(),
        })?;

        let mut request = self.client.post(url).json(&json!({
            "method": method,
            "params": params,
            "expectFinal": options.expect_final,
        }));
        if let Some(token) = &env.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|err| GatewayRpcError::Transport {
            method: method.to_string(),
            message: err.to_string(),
        })?;
        let status = response.status();
        if !status.is_success() {
            return Err(GatewayRpcError::Transport {
                method: method.to_string(),
                message: format!("gateway answered with HTTP {status}"),
            });
        }
        response.json().await.map_err(|err| GatewayRpcError::Decode {
            method: method.to_string(),
            message: err.to_string(),
        })
    }

    async fn restart(&self, _env: &GatewayEnv) -> Result<bool, GatewayRpcError> {
        // External gateways are owned elsewhere; never restarted here.
        debug!("external gateway restart requested; reporting no restart");
        Ok(false)
    }
}

/// Default transport: picks local or HTTP based on the environment's
/// connection mode.
pub struct DefaultTransport {
    local: LocalProcessTransport,
    http: HttpTransport,
}

impl DefaultTransport {
    pub fn new() -> Self {
        Self {
            local: LocalProcessTransport,
            http: HttpTransport::new(),
        }
    }
}

impl Default for DefaultTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GatewayTransport for DefaultTransport {
    async fn call(
        &self,
        env: &GatewayEnv,
        method: &str,
        params: &Value,
        options: &CallOptions,
    ) -> Result<Value, GatewayRpcError> {
        match env.mode {
            GatewayMode::Local => self.local.call(env, method, params, options).await,
            GatewayMode::External => self.http.call(env, method, params, options).await,
        }
    }

    async fn restart(&self, env: &GatewayEnv) -> Result<bool, GatewayRpcError> {
        // Mode gating lives in `GatewayClient::restart`; only local
        // environments reach a transport restart.
        self.local.restart(env).await
    }
}
