//! Caller-facing execution result.

use serde::{Deserialize, Serialize};

use crate::supervisor::{ExecutionOutcome, FALLBACK_EXIT_CODE};

/// What the caller gets back for one snippet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    /// Captured stdout.
    pub output: String,
    /// Captured stderr, including any timeout notice.
    pub error: String,
    /// Exit code of the process (0 = success).
    pub exit_code: i32,
    /// Spawn-to-termination wall time.
    pub execution_time_ms: u64,
}

impl ExecutionResult {
    pub fn from_outcome(outcome: ExecutionOutcome, elapsed_ms: u64) -> Self {
        Self {
            output: outcome.stdout,
            error: outcome.stderr,
            exit_code: outcome.exit_code,
            execution_time_ms: elapsed_ms,
        }
    }

    /// Result for a failure that happened before any process was spawned.
    pub fn engine_error(message: impl Into<String>) -> Self {
        Self {
            output: String::new(),
            error: message.into(),
            exit_code: FALLBACK_EXIT_CODE,
            execution_time_ms: 0,
        }
    }

    pub const fn is_success(&self) -> bool {
        self.exit_code == 0
    }
}
