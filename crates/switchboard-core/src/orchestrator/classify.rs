//! Result classification for the invocation pipeline.
//!
//! The orchestrator's retry policy is driven by this one pure
//! function instead of catch-and-redispatch blocks. The transient
//! matcher is deliberately narrow: widening it would mask real
//! failures and risk restart loops.

use switchboard_protocol::InvokeOutcome;

/// High-level marker a failing gateway process prints when it cannot
/// resolve its working directory.
pub const CWD_FAILURE_MARKER: &str = "process.cwd failed";

/// Low-level marker tying the failure to directory resolution inside
/// the gateway process.
pub const UV_CWD_MARKER: &str = "uv_cwd";

/// How the pipeline should treat a completed invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvokeDisposition {
    /// Final result; hand it back to the caller.
    Completed,
    /// Known-transient gateway environment failure: worth one local
    /// gateway restart followed by a single re-invocation.
    TransientGatewayCwd,
}

/// Classify an invocation outcome. Matches the transient signature
/// only when the run failed *and* both markers appear in the
/// combined output.
pub fn classify_outcome(outcome: &InvokeOutcome) -> InvokeDisposition {
    if outcome.succeeded() {
        return InvokeDisposition::Completed;
    }
    let combined = format!("{}\n{}", outcome.stdout, outcome.stderr);
    if combined.contains(CWD_FAILURE_MARKER) && combined.contains(UV_CWD_MARKER) {
        return InvokeDisposition::TransientGatewayCwd;
    }
    InvokeDisposition::Completed
}

#[cfg(test)]
mod tests {
    use super::{CWD_FAILURE_MARKER, InvokeDisposition, UV_CWD_MARKER, classify_outcome};
    use pretty_assertions::assert_eq;
    use switchboard_protocol::InvokeOutcome;

    fn outcome(code: Option<i32>, stdout: &str, stderr: &str) -> InvokeOutcome {
        InvokeOutcome {
            code,
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
            provider_session_id: None,
        }
    }

    #[test]
    fn failing_run_with_both_markers_is_transient() {
        let result = outcome(
            Some(1),
            "",
            &format!("boot error: {CWD_FAILURE_MARKER} ({UV_CWD_MARKER})"),
        );
        assert_eq!(
            classify_outcome(&result),
            InvokeDisposition::TransientGatewayCwd
        );
    }

    #[test]
    fn markers_may_be_split_across_streams() {
        let result = outcome(Some(1), CWD_FAILURE_MARKER, UV_CWD_MARKER);
        assert_eq!(
            classify_outcome(&result),
            InvokeDisposition::TransientGatewayCwd
        );
    }

    #[test]
    fn one_marker_alone_is_not_transient() {
        let result = outcome(Some(1), "", CWD_FAILURE_MARKER);
        assert_eq!(classify_outcome(&result), InvokeDisposition::Completed);
        let result = outcome(Some(1), "", UV_CWD_MARKER);
        assert_eq!(classify_outcome(&result), InvokeDisposition::Completed);
    }

    #[test]
    fn successful_run_with_markers_is_final() {
        let result = outcome(
            Some(0),
            &format!("{CWD_FAILURE_MARKER} {UV_CWD_MARKER}"),
            "",
        );
        assert_eq!(classify_outcome(&result), InvokeDisposition::Completed);
    }
}
