//! Provider capability contract and shared invocation helpers.

pub mod cli;
pub mod gateway;

use async_trait::async_trait;
use log::debug;
use std::collections::BTreeMap;
use std::path::PathBuf;
use switchboard_protocol::{InvokeOutcome, ProviderCapabilities, ProviderKind};
use thiserror::Error;
use tokio::io::AsyncReadExt;
use tokio::process::Command;

/// Errors raised by provider operations.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The provider's backing command does not exist on this host.
    /// This is the only error class that triggers the gateway
    /// fallback; a command that ran and failed never maps here.
    #[error("provider command not found: '{command}'")]
    CommandNotFound { command: String },
    /// The provider does not declare the requested capability.
    #[error("provider '{provider_id}' does not support {action}")]
    UnsupportedAction {
        provider_id: String,
        action: &'static str,
    },
    /// Invocation failed before producing an outcome.
    #[error("provider '{provider_id}' invocation failed: {message}")]
    Invoke {
        provider_id: String,
        message: String,
    },
    /// IO error while running the provider.
    #[error("provider io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProviderError {
    pub(crate) fn unsupported(provider_id: &str, action: &'static str) -> Self {
        Self::UnsupportedAction {
            provider_id: provider_id.to_string(),
            action,
        }
    }
}

/// Normalized request every provider variant accepts.
#[derive(Debug, Clone, Default)]
pub struct InvokeOptions {
    /// Message content to deliver.
    pub message: String,
    /// Fully resolved environment for the invocation.
    pub env: BTreeMap<String, String>,
    /// Working directory; provider default when absent.
    pub cwd: Option<PathBuf>,
    /// Provider-native session id to continue, if known.
    pub session_id: Option<String>,
    /// Agent identity; only set when the provider declares
    /// agent-style invocation.
    pub agent_id: Option<String>,
    /// Model override; only set when the provider declares model
    /// selection.
    pub model: Option<String>,
    /// Extra passthrough arguments; only set when declared.
    pub extra_args: Vec<String>,
}

/// Streaming sink for incremental provider output. Callers that do
/// not stream still receive the aggregated [`InvokeOutcome`].
pub trait InvokeOutputSink: Send {
    /// Handle a stdout chunk.
    fn stdout(&mut self, chunk: &str);
    /// Handle a stderr chunk.
    fn stderr(&mut self, chunk: &str);
}

/// Interchangeable backend servicing an agent.
///
/// Optional operations have default bodies that fail with
/// [`ProviderError::UnsupportedAction`]; callers check
/// [`Provider::capabilities`] before dispatching instead of
/// inspecting the concrete type.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Stable lowercase provider id.
    fn id(&self) -> &str;
    /// Human-readable provider name.
    fn display_name(&self) -> &str;
    /// Backend archetype.
    fn kind(&self) -> ProviderKind;
    /// Declared capability flags.
    fn capabilities(&self) -> ProviderCapabilities;

    /// Execute one invocation, streaming output into `sink` when
    /// supplied and returning the aggregated outcome either way.
    ///
    /// The sink's object lifetime is independent of the reference so
    /// callers can reborrow one sink across several invocations.
    async fn invoke(
        &self,
        options: InvokeOptions,
        sink: Option<&mut (dyn InvokeOutputSink + Send + '_)>,
    ) -> Result<InvokeOutcome, ProviderError>;

    /// Run the provider's authentication flow.
    async fn authenticate(&self, _env: &BTreeMap<String, String>) -> Result<(), ProviderError> {
        Err(ProviderError::unsupported(self.id(), "authentication"))
    }

    /// Create an agent on the remote side of this provider.
    async fn create_remote_agent(
        &self,
        _agent_id: &str,
        _env: &BTreeMap<String, String>,
    ) -> Result<(), ProviderError> {
        Err(ProviderError::unsupported(self.id(), "remote agent creation"))
    }

    /// Delete an agent on the remote side of this provider.
    async fn delete_remote_agent(
        &self,
        _agent_id: &str,
        _env: &BTreeMap<String, String>,
    ) -> Result<(), ProviderError> {
        Err(ProviderError::unsupported(self.id(), "remote agent deletion"))
    }
}

/// Sink that only aggregates, for non-streaming callers.
#[derive(Default)]
struct BufferingSink;

impl InvokeOutputSink for BufferingSink {
    fn stdout(&mut self, _chunk: &str) {}

    fn stderr(&mut self, _chunk: &str) {}
}

/// Spawn a provider command with an explicit environment and stream
/// its output, returning the aggregated outcome. A spawn failure with
/// ENOENT maps to [`ProviderError::CommandNotFound`].
pub(crate) async fn run_provider_command(
    command: &str,
    args: &[String],
    env: &BTreeMap<String, String>,
    cwd: Option<&PathBuf>,
    sink: Option<&mut (dyn InvokeOutputSink + Send + '_)>,
) -> Result<InvokeOutcome, ProviderError> {
    debug!(
        "running provider command (command={}, args_len={}, env_keys={})",
        command,
        args.len(),
        env.len()
    );
    let mut process = Command::new(command);
    process.args(args);
    process.env_clear();
    for (key, value) in env {
        process.env(key, value);
    }
    if let Some(cwd) = cwd {
        process.current_dir(cwd);
    }
    process.stdin(std::process::Stdio::null());
    process.stdout(std::process::Stdio::piped());
    process.stderr(std::process::Stdio::piped());

    let mut child = process.spawn().map_err(|err| {
        if err.kind() == std::io::ErrorKind::NotFound {
            ProviderError::CommandNotFound {
                command: command.to_string(),
            }
        } else {
            ProviderError::Io(err)
        }
    })?;

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();
    let mut buffering = BufferingSink;
    let sink: &mut (dyn InvokeOutputSink + Send) = match sink {
        Some(sink) => sink,
        None => &mut buffering,
    };
    let (stdout_buf, stderr_buf) = pump_child_output(stdout, stderr, sink).await?;

    let status = child.wait().await?;
    Ok(InvokeOutcome {
        code: status.code(),
        stdout: stdout_buf,
        stderr: stderr_buf,
        provider_session_id: None,
    })
}

/// Forward child stdout/stderr chunks to the sink while capturing
/// full buffers for the aggregated result.
async fn pump_child_output(
    stdout: Option<tokio::process::ChildStdout>,
    stderr: Option<tokio::process::ChildStderr>,
    sink: &mut (dyn InvokeOutputSink + Send),
) -> Result<(String, String), ProviderError> {
    let mut stdout_buf = String::new();
    let mut stderr_buf = String::new();

    let mut stdout_reader = stdout.map(tokio::io::BufReader::new);
    let mut stderr_reader = stderr.map(tokio::io::BufReader::new);

    let mut stdout_done = stdout_reader.is_none();
    let mut stderr_done = stderr_reader.is_none();

    let mut stdout_chunk = vec![0u8; 8192];
    let mut stderr_chunk = vec![0u8; 8192];

    while !stdout_done || !stderr_done {
        tokio::select! {
            read = async {
                if let Some(reader) = stdout_reader.as_mut() {
                    reader.read(&mut stdout_chunk).await
                } else {
                    Ok(0)
                }
            }, if !stdout_done => {
                let read = read?;
                if read == 0 {
                    stdout_done = true;
                } else {
                    let chunk = String::from_utf8_lossy(&stdout_chunk[..read]);
                    stdout_buf.push_str(&chunk);
                    sink.stdout(&chunk);
                }
            }
            read = async {
                if let Some(reader) = stderr_reader.as_mut() {
                    reader.read(&mut stderr_chunk).await
                } else {
                    Ok(0)
                }
            }, if !stderr_done => {
                let read = read?;
                if read == 0 {
                    stderr_done = true;
                } else {
                    let chunk = String::from_utf8_lossy(&stderr_chunk[..read]);
                    stderr_buf.push_str(&chunk);
                    sink.stderr(&chunk);
                }
            }
        }
    }

    Ok((stdout_buf, stderr_buf))
}

/// Capture a provider-native session id from stdout: the last line
/// starting with the given prefix wins.
pub(crate) fn capture_session_line(stdout: &str, prefix: &str) -> Option<String> {
    stdout
        .lines()
        .rev()
        .map(str::trim)
        .find_map(|line| line.strip_prefix(prefix))
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::{InvokeOutputSink, capture_session_line, run_provider_command};
    use crate::provider::ProviderError;
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;

    #[derive(Default)]
    struct RecordingSink {
        stdout: String,
        stderr: String,
    }

    impl InvokeOutputSink for RecordingSink {
        fn stdout(&mut self, chunk: &str) {
            self.stdout.push_str(chunk);
        }

        fn stderr(&mut self, chunk: &str) {
            self.stderr.push_str(chunk);
        }
    }

    #[tokio::test]
    async fn run_provider_command_streams_and_aggregates() {
        let mut sink = RecordingSink::default();
        let outcome = run_provider_command(
            "sh",
            &[
                "-c".to_string(),
                "printf 'out'; printf 'err' 1>&2".to_string(),
            ],
            &BTreeMap::new(),
            None,
            Some(&mut sink),
        )
        .await
        .expect("run");

        assert_eq!(outcome.code, Some(0));
        assert_eq!(outcome.stdout, "out");
        assert_eq!(outcome.stderr, "err");
        assert_eq!(sink.stdout, "out");
        assert_eq!(sink.stderr, "err");
    }

    #[tokio::test]
    async fn missing_command_maps_to_command_not_found() {
        let err = run_provider_command(
            "definitely-not-a-real-command-xyz",
            &[],
            &BTreeMap::new(),
            None,
            None,
        )
        .await
        .expect_err("missing command");

        match err {
            ProviderError::CommandNotFound { command } => {
                assert_eq!(command, "definitely-not-a-real-command-xyz");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn capture_session_line_takes_last_match() {
        let stdout = "hello\nsession: first\nwork\nsession: second\n";
        assert_eq!(
            capture_session_line(stdout, "session:"),
            Some("second".to_string())
        );
        assert_eq!(capture_session_line("no match", "session:"), None);
        assert_eq!(capture_session_line("session:   \n", "session:"), None);
    }
}
