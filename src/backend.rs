//! Execution backend trait and implementations.
//!
//! A backend takes a validated request and always produces a result:
//! engine faults are folded into the result instead of being returned as
//! errors.

mod process;

pub use process::ProcessBackend;

use async_trait::async_trait;

use crate::language::Language;
use crate::result::ExecutionResult;

/// One snippet to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionRequest {
    pub code: String,
    pub language: Language,
}

impl ExecutionRequest {
    pub fn new(language: Language, code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            language,
        }
    }
}

/// Trait for execution backends.
#[async_trait]
pub trait ExecutionBackend: Send + Sync {
    /// Execute one snippet to completion, timeout, or failure.
    async fn execute(&self, request: &ExecutionRequest) -> ExecutionResult;
}
