//! Local process backend.
//!
//! Writes the snippet to a scratch file, runs the language's launcher on it
//! and removes the file afterwards, whatever happened in between.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tracing::{debug, error, instrument};

use super::{ExecutionBackend, ExecutionRequest};
use crate::config::Config;
use crate::language::LanguageRegistry;
use crate::result::ExecutionResult;
use crate::supervisor::{self, ExecutionLimits};
use crate::workspace::ScratchRoot;

/// Backend that runs snippets as plain child processes.
///
/// There is no cap on concurrent executions and no CPU, memory, filesystem
/// or network isolation; only the wall-clock deadline is enforced.
#[derive(Debug, Clone)]
pub struct ProcessBackend {
    registry: Arc<LanguageRegistry>,
    scratch: ScratchRoot,
    limits: ExecutionLimits,
}

impl ProcessBackend {
    pub fn new(registry: LanguageRegistry, scratch: ScratchRoot, limits: ExecutionLimits) -> Self {
        Self {
            registry: Arc::new(registry),
            scratch,
            limits,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.registry(), config.scratch(), config.limits())
    }

    pub fn registry(&self) -> &LanguageRegistry {
        &self.registry
    }

    pub const fn limits(&self) -> ExecutionLimits {
        self.limits
    }
}

#[async_trait]
impl ExecutionBackend for ProcessBackend {
    #[instrument(skip_all, fields(language = %request.language, code_len = request.code.len()))]
    async fn execute(&self, request: &ExecutionRequest) -> ExecutionResult {
        let profile = self.registry.profile(request.language);

        let workspace = match self.scratch.acquire(profile, &request.code).await {
            Ok(ws) => ws,
            Err(e) => {
                error!(error = %e, "Failed to prepare scratch file");
                return ExecutionResult::engine_error(e.to_string());
            }
        };

        let args = profile.build_args(workspace.file_path());
        debug!(launcher = %profile.launcher, file = %workspace.file_name(), "Executing snippet");

        let started = Instant::now();
        let outcome = supervisor::run(&profile.launcher, &args, self.limits).await;
        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        workspace.release();

        debug!(
            exit_code = outcome.exit_code,
            timed_out = outcome.timed_out(),
            elapsed_ms,
            "Execution completed"
        );

        ExecutionResult::from_outcome(outcome, elapsed_ms)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::language::Language;
    use std::collections::HashMap;
    use std::path::Path;
    use std::time::Duration;

    /// Route every language through `sh` so snippets are plain shell scripts.
    fn sh_backend(root: &Path, deadline_ms: u64) -> ProcessBackend {
        let overrides = Language::ALL
            .into_iter()
            .map(|lang| (lang, "sh".to_string()))
            .collect::<HashMap<_, _>>();
        ProcessBackend::new(
            LanguageRegistry::new(&overrides),
            ScratchRoot::new(root),
            ExecutionLimits {
                deadline: Duration::from_millis(deadline_ms),
                kill_grace: Duration::from_millis(300),
            },
        )
    }

    fn leftover_files(root: &Path) -> usize {
        std::fs::read_dir(root).map(Iterator::count).unwrap_or(0)
    }

    fn python(code: &str) -> ExecutionRequest {
        ExecutionRequest::new(Language::Python, code)
    }

    #[tokio::test]
    async fn prints_and_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let backend = sh_backend(dir.path(), 5_000);

        let result = backend.execute(&python("echo hello")).await;
        assert_eq!(result.output, "hello\n");
        assert_eq!(result.error, "");
        assert_eq!(result.exit_code, 0);
        assert_eq!(leftover_files(dir.path()), 0);
    }

    #[tokio::test]
    async fn non_zero_exit_still_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let backend = sh_backend(dir.path(), 5_000);

        let result = backend.execute(&python("echo oops >&2; exit 3")).await;
        assert_eq!(result.exit_code, 3);
        assert_eq!(result.error, "oops\n");
        assert_eq!(leftover_files(dir.path()), 0);
    }

    #[tokio::test]
    async fn timeout_is_annotated_and_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let backend = sh_backend(dir.path(), 400);

        let result = backend.execute(&python("while true; do :; done")).await;
        assert!(result.error.contains("[Execution timed out after 400 ms]"));
        assert_ne!(result.exit_code, 0);
        assert!(result.execution_time_ms >= 400);
        assert!(result.execution_time_ms < 400 + 1_500);
        assert_eq!(leftover_files(dir.path()), 0);
    }

    #[tokio::test]
    async fn missing_launcher_is_reported_and_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let overrides = HashMap::from([(Language::Go, "/nonexistent/go".to_string())]);
        let backend = ProcessBackend::new(
            LanguageRegistry::new(&overrides),
            ScratchRoot::new(dir.path()),
            ExecutionLimits::default(),
        );

        let result = backend
            .execute(&ExecutionRequest::new(Language::Go, "package main"))
            .await;
        assert_eq!(result.exit_code, 1);
        assert!(result.output.is_empty());
        assert!(result.error.starts_with("Failed to start process:"));
        assert_eq!(leftover_files(dir.path()), 0);
    }

    #[tokio::test]
    async fn unusable_scratch_root_is_an_engine_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, b"").unwrap();
        let backend = sh_backend(&blocker.join("scratch"), 5_000);

        let result = backend.execute(&python("echo never")).await;
        assert_eq!(result.exit_code, 1);
        assert!(result.output.is_empty());
        assert!(result.error.contains("scratch directory"));
        assert_eq!(result.execution_time_ms, 0);
    }

    #[tokio::test]
    async fn concurrent_requests_do_not_mix() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(sh_backend(dir.path(), 10_000));

        let handles: Vec<_> = (0..20)
            .map(|i| {
                let backend = Arc::clone(&backend);
                tokio::spawn(async move {
                    let result = backend.execute(&python(&format!("echo snippet-{i}"))).await;
                    (i, result)
                })
            })
            .collect();

        for handle in handles {
            let (i, result) = handle.await.unwrap();
            assert_eq!(result.output, format!("snippet-{i}\n"));
            assert_eq!(result.exit_code, 0);
        }
        assert_eq!(leftover_files(dir.path()), 0);
    }

    #[tokio::test]
    async fn repeated_runs_are_identical() {
        let dir = tempfile::tempdir().unwrap();
        let backend = sh_backend(dir.path(), 5_000);
        let request = python("echo same; echo also >&2; exit 2");

        let first = backend.execute(&request).await;
        let second = backend.execute(&request).await;
        assert_eq!(first.output, second.output);
        assert_eq!(first.error, second.error);
        assert_eq!(first.exit_code, second.exit_code);
    }

    #[tokio::test]
    async fn launcher_receives_scratch_file_path() {
        let dir = tempfile::tempdir().unwrap();
        let backend = sh_backend(dir.path(), 5_000);

        let request = ExecutionRequest::new(Language::JavaScript, "echo \"$0\"");
        let result = backend.execute(&request).await;
        let path = result.output.trim_end();
        assert!(path.starts_with(dir.path().to_str().unwrap()));
        assert!(path.ends_with(".js"));
        assert!(!Path::new(path).exists());
    }
}
