//! Scripted provider doubles.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use switchboard_core::{
    InvokeOptions, InvokeOutputSink, Provider, ProviderError, ProviderFactory, ProviderInfo,
    ProviderRegistration,
};
use switchboard_protocol::{InvokeOutcome, ProviderCapabilities, ProviderKind};

/// Sink that captures streamed chunks for assertions.
#[derive(Default)]
pub struct RecordingSink {
    /// Captured stdout.
    pub stdout: String,
    /// Captured stderr.
    pub stderr: String,
}

impl InvokeOutputSink for RecordingSink {
    fn stdout(&mut self, chunk: &str) {
        self.stdout.push_str(chunk);
    }

    fn stderr(&mut self, chunk: &str) {
        self.stderr.push_str(chunk);
    }
}

/// Provider double that replays queued invocation results and
/// records the options it was invoked with.
pub struct ScriptedProvider {
    id: String,
    capabilities: ProviderCapabilities,
    results: Mutex<VecDeque<Result<InvokeOutcome, ProviderError>>>,
    invocations: Mutex<Vec<InvokeOptions>>,
}

impl ScriptedProvider {
    pub fn new(id: &str, capabilities: ProviderCapabilities) -> Self {
        Self {
            id: id.to_string(),
            capabilities,
            results: Mutex::new(VecDeque::new()),
            invocations: Mutex::new(Vec::new()),
        }
    }

    /// Queue the next invocation result.
    pub fn push_result(&self, result: Result<InvokeOutcome, ProviderError>) {
        self.results.lock().push_back(result);
    }

    /// Options recorded per invocation, in order.
    pub fn invocations(&self) -> Vec<InvokeOptions> {
        self.invocations.lock().clone()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn id(&self) -> &str {
        &self.id
    }

    fn display_name(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Cli
    }

    fn capabilities(&self) -> ProviderCapabilities {
        self.capabilities
    }

    async fn invoke(
        &self,
        options: InvokeOptions,
        sink: Option<&mut (dyn InvokeOutputSink + Send + '_)>,
    ) -> Result<InvokeOutcome, ProviderError> {
        self.invocations.lock().push(options);
        let result = self
            .results
            .lock()
            .pop_front()
            .unwrap_or_else(|| panic!("unscripted invocation of provider '{}'", self.id));
        if let (Ok(outcome), Some(sink)) = (&result, sink) {
            sink.stdout(&outcome.stdout);
            sink.stderr(&outcome.stderr);
        }
        result
    }
}

struct SharedFactory {
    provider: Arc<ScriptedProvider>,
}

#[async_trait]
impl ProviderFactory for SharedFactory {
    async fn create(&self) -> Result<Arc<dyn Provider>, ProviderError> {
        Ok(self.provider.clone())
    }
}

/// Registration wrapping an existing scripted provider so tests can
/// keep a handle to it after registering.
pub fn scripted_registration(provider: Arc<ScriptedProvider>) -> ProviderRegistration {
    ProviderRegistration {
        info: ProviderInfo {
            id: provider.id().to_string(),
            display_name: provider.id().to_string(),
            kind: ProviderKind::Cli,
            capabilities: provider.capabilities(),
        },
        onboarding: None,
        factory: Arc::new(SharedFactory { provider }),
    }
}
