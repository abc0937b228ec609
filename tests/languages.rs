//! End-to-end runs against the real interpreters.
//!
//! Needs node, npx + ts-node, python3 and go on PATH, so it only runs with
//! `SNIPPET_RUNNER_LANG_TEST=1`.

use std::time::{Duration, Instant};

use snippet_runner_mcp::backend::{ExecutionBackend, ExecutionRequest, ProcessBackend};
use snippet_runner_mcp::config::Config;
use snippet_runner_mcp::language::Language;

fn enabled() -> bool {
    std::env::var("SNIPPET_RUNNER_LANG_TEST").is_ok()
}

fn backend(scratch: &std::path::Path, timeout_ms: u64) -> ProcessBackend {
    let config = Config {
        scratch_root: scratch.to_path_buf(),
        timeout_ms,
        ..Config::default()
    };
    ProcessBackend::from_config(&config)
}

fn hello(language: Language) -> &'static str {
    match language {
        Language::JavaScript | Language::TypeScript => "console.log('hello from snippet');",
        Language::Python => "print('hello from snippet')",
        Language::Go => {
            "package main\nimport \"fmt\"\nfunc main() { fmt.Println(\"hello from snippet\") }\n"
        }
    }
}

fn leftovers(dir: &std::path::Path) -> usize {
    std::fs::read_dir(dir).map(Iterator::count).unwrap_or(0)
}

#[tokio::test]
async fn every_language_prints() {
    if !enabled() {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    // `go run` and `npx` are slow to start on a cold cache.
    let backend = backend(dir.path(), 60_000);

    for language in Language::ALL {
        let result = backend
            .execute(&ExecutionRequest::new(language, hello(language)))
            .await;
        assert_eq!(result.exit_code, 0, "{language}: {}", result.error);
        assert_eq!(result.output.trim_end(), "hello from snippet", "{language}");
    }
    assert_eq!(leftovers(dir.path()), 0);
}

#[tokio::test]
async fn python_exit_code_passes_through() {
    if !enabled() {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let backend = backend(dir.path(), 10_000);

    let result = backend
        .execute(&ExecutionRequest::new(Language::Python, "import sys\nsys.exit(3)"))
        .await;
    assert_eq!(result.exit_code, 3);
    assert_eq!(leftovers(dir.path()), 0);
}

#[tokio::test]
async fn python_infinite_loop_times_out() {
    if !enabled() {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let backend = backend(dir.path(), 1_000);

    let started = Instant::now();
    let result = backend
        .execute(&ExecutionRequest::new(Language::Python, "while True:\n    pass\n"))
        .await;

    assert!(result.error.contains("[Execution timed out after 1 seconds]"));
    assert_ne!(result.exit_code, 0);
    assert!(started.elapsed() < Duration::from_millis(1_000 + 1_500));
    assert_eq!(leftovers(dir.path()), 0);
}

#[tokio::test]
async fn javascript_runtime_error_is_passed_through() {
    if !enabled() {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let backend = backend(dir.path(), 10_000);

    let result = backend
        .execute(&ExecutionRequest::new(
            Language::JavaScript,
            "throw new Error('boom')",
        ))
        .await;
    assert_ne!(result.exit_code, 0);
    assert!(result.error.contains("boom"));
}
