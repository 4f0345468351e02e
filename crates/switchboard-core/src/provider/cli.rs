//! Generic CLI-backed provider.

use super::{
    InvokeOptions, InvokeOutputSink, Provider, ProviderError, capture_session_line,
    run_provider_command,
};
use async_trait::async_trait;
use switchboard_protocol::{InvokeOutcome, ProviderCapabilities, ProviderKind};

/// Stdout line prefix a CLI tool uses to report its native session
/// id, e.g. `session: abc-123`.
pub const DEFAULT_SESSION_PREFIX: &str = "session:";

/// Declarative description of a CLI tool behind a provider.
#[derive(Debug, Clone)]
pub struct CliProviderSpec {
    /// Stable lowercase provider id.
    pub id: String,
    /// Human-readable name.
    pub display_name: String,
    /// Executable to run.
    pub command: String,
    /// Arguments always passed before the message.
    pub base_args: Vec<String>,
    /// Flag carrying the native session id, when supported.
    pub session_flag: Option<String>,
    /// Flag carrying the model override, when supported.
    pub model_flag: Option<String>,
    /// Flag carrying the agent identity, when supported.
    pub agent_flag: Option<String>,
    /// Stdout prefix the tool uses to report a session id.
    pub session_capture_prefix: Option<String>,
    /// Declared capability flags.
    pub capabilities: ProviderCapabilities,
}

/// Provider that forwards invocations to a local CLI tool, using its
/// exit-code/stdout/stderr contract.
pub struct CliProvider {
    spec: CliProviderSpec,
}

impl CliProvider {
    pub fn new(spec: CliProviderSpec) -> Self {
        Self { spec }
    }

    fn build_args(&self, options: &InvokeOptions) -> Vec<String> {
        let mut args = self.spec.base_args.clone();
        if let (Some(flag), Some(agent_id)) = (&self.spec.agent_flag, &options.agent_id) {
            args.push(flag.clone());
            args.push(agent_id.clone());
        }
        if let (Some(flag), Some(session_id)) = (&self.spec.session_flag, &options.session_id) {
            args.push(flag.clone());
            args.push(session_id.clone());
        }
        if let (Some(flag), Some(model)) = (&self.spec.model_flag, &options.model) {
            args.push(flag.clone());
            args.push(model.clone());
        }
        args.extend(options.extra_args.iter().cloned());
        args.push(options.message.clone());
        args
    }
}

#[async_trait]
impl Provider for CliProvider {
    fn id(&self) -> &str {
        &self.spec.id
    }

    fn display_name(&self) -> &str {
        &self.spec.display_name
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Cli
    }

    fn capabilities(&self) -> ProviderCapabilities {
        self.spec.capabilities
    }

    async fn invoke(
        &self,
        options: InvokeOptions,
        sink: Option<&mut (dyn InvokeOutputSink + Send + '_)>,
    ) -> Result<InvokeOutcome, ProviderError> {
        let args = self.build_args(&options);
        let mut outcome = run_provider_command(
            &self.spec.command,
            &args,
            &options.env,
            options.cwd.as_ref(),
            sink,
        )
        .await?;
        if let Some(prefix) = &self.spec.session_capture_prefix {
            outcome.provider_session_id = capture_session_line(&outcome.stdout, prefix);
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::{CliProvider, CliProviderSpec, DEFAULT_SESSION_PREFIX};
    use crate::provider::{InvokeOptions, Provider};
    use pretty_assertions::assert_eq;
    use switchboard_protocol::ProviderCapabilities;

    fn echo_spec() -> CliProviderSpec {
        CliProviderSpec {
            id: "echo".to_string(),
            display_name: "Echo".to_string(),
            command: "sh".to_string(),
            base_args: vec!["-c".to_string(), "printf '%s' \"$0\"".to_string()],
            session_flag: None,
            model_flag: None,
            agent_flag: None,
            session_capture_prefix: Some(DEFAULT_SESSION_PREFIX.to_string()),
            capabilities: ProviderCapabilities::default(),
        }
    }

    #[test]
    fn build_args_orders_flags_before_message() {
        let provider = CliProvider::new(CliProviderSpec {
            session_flag: Some("--session".to_string()),
            model_flag: Some("--model".to_string()),
            agent_flag: Some("--agent".to_string()),
            ..echo_spec()
        });
        let options = InvokeOptions {
            message: "hello".to_string(),
            session_id: Some("native-42".to_string()),
            agent_id: Some("planner".to_string()),
            model: Some("fast".to_string()),
            extra_args: vec!["--verbose".to_string()],
            ..InvokeOptions::default()
        };

        let args = provider.build_args(&options);
        assert_eq!(
            args[2..],
            [
                "--agent",
                "planner",
                "--session",
                "native-42",
                "--model",
                "fast",
                "--verbose",
                "hello",
            ]
            .map(String::from)
        );
    }

    #[tokio::test]
    async fn invoke_captures_session_id_from_stdout() {
        let provider = CliProvider::new(CliProviderSpec {
            base_args: vec![
                "-c".to_string(),
                "printf 'work done\\nsession: native-7\\n'".to_string(),
            ],
            ..echo_spec()
        });
        let outcome = provider
            .invoke(
                InvokeOptions {
                    message: "hello".to_string(),
                    ..InvokeOptions::default()
                },
                None,
            )
            .await
            .expect("invoke");

        assert_eq!(outcome.code, Some(0));
        assert_eq!(outcome.provider_session_id, Some("native-7".to_string()));
    }
}
