//! Scripted gateway transport with call recording.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::VecDeque;
use switchboard_core::{CallOptions, GatewayEnv, GatewayRpcError, GatewayTransport};

/// One recorded transport call.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    /// RPC method name.
    pub method: String,
    /// Raw params value.
    pub params: Value,
    /// Whether the caller asked for a final result.
    pub expect_final: bool,
}

/// Transport double returning queued envelopes in order and counting
/// restarts. An exhausted queue fails the test loudly.
#[derive(Default)]
pub struct ScriptedTransport {
    responses: Mutex<VecDeque<Result<Value, GatewayRpcError>>>,
    restart_results: Mutex<VecDeque<Result<bool, GatewayRpcError>>>,
    calls: Mutex<Vec<RecordedCall>>,
    restarts: Mutex<usize>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a raw response envelope for the next call.
    pub fn push_envelope(&self, envelope: Value) {
        self.responses.lock().push_back(Ok(envelope));
    }

    /// Queue a successful `{"result": ..}` envelope.
    pub fn push_result(&self, result: Value) {
        self.push_envelope(serde_json::json!({ "result": result }));
    }

    /// Queue a transport-level failure for the next call.
    pub fn push_error(&self, error: GatewayRpcError) {
        self.responses.lock().push_back(Err(error));
    }

    /// Queue the outcome of the next restart request.
    pub fn push_restart(&self, result: Result<bool, GatewayRpcError>) {
        self.restart_results.lock().push_back(result);
    }

    /// Calls recorded so far.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    /// Number of restart requests observed.
    pub fn restart_count(&self) -> usize {
        *self.restarts.lock()
    }
}

#[async_trait]
impl GatewayTransport for ScriptedTransport {
    async fn call(
        &self,
        _env: &GatewayEnv,
        method: &str,
        params: &Value,
        options: &CallOptions,
    ) -> Result<Value, GatewayRpcError> {
        self.calls.lock().push(RecordedCall {
            method: method.to_string(),
            params: params.clone(),
            expect_final: options.expect_final,
        });
        self.responses
            .lock()
            .pop_front()
            .unwrap_or_else(|| panic!("unscripted gateway call: {method}"))
    }

    async fn restart(&self, _env: &GatewayEnv) -> Result<bool, GatewayRpcError> {
        *self.restarts.lock() += 1;
        self.restart_results
            .lock()
            .pop_front()
            .unwrap_or(Ok(true))
    }
}
