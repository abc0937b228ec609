//! MCP server implementation using rmcp.
//!
//! Exposes snippet execution as MCP tools. Inputs are validated here, before
//! the backend ever sees them: empty code and unknown language ids are
//! rejected as invalid params.

use std::sync::Arc;

use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{CallToolResult, Content, Implementation, ServerCapabilities, ServerInfo};
use rmcp::schemars;
use rmcp::transport::stdio;
use rmcp::{tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler, ServiceExt};
use schemars::JsonSchema;
use serde::Deserialize;
use tracing::{info, warn};

use crate::backend::{ExecutionBackend, ExecutionRequest};
use crate::language::{Language, LanguageRegistry, UnknownLanguage};

/// MCP server for snippet execution.
#[derive(Clone)]
pub struct RunnerServer<B: Clone> {
    registry: Arc<LanguageRegistry>,
    backend: Arc<B>,
    tool_router: ToolRouter<Self>,
}

/// Parameters for the execute tool.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct ExecuteParams {
    /// Language of the snippet.
    #[schemars(description = "Snippet language: 'javascript', 'typescript', 'python' or 'go'")]
    pub language: String,

    /// The source code to run.
    #[schemars(description = "The source code to run")]
    pub code: String,
}

/// Parameters for the template tool.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct TemplateParams {
    #[schemars(description = "Snippet language: 'javascript', 'typescript', 'python' or 'go'")]
    pub language: String,
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, McpError> {
    serde_json::to_string_pretty(value)
        .map_err(|e| McpError::internal_error(format!("Failed to serialize result: {e}"), None))
}

#[tool_router]
impl<B: ExecutionBackend + Clone + Send + Sync + 'static> RunnerServer<B> {
    /// Create a new runner server.
    pub fn new(registry: LanguageRegistry, backend: B) -> Self {
        Self {
            registry: Arc::new(registry),
            backend: Arc::new(backend),
            tool_router: Self::tool_router(),
        }
    }

    fn resolve(&self, id: &str) -> Result<Language, McpError> {
        self.registry
            .resolve(id)
            .map(|profile| profile.language)
            .ok_or_else(|| McpError::invalid_params(UnknownLanguage(id.to_string()).to_string(), None))
    }

    /// Run a snippet and return its output, error text, exit code and time.
    #[tool(description = "Run a code snippet and return its output, error, exit code and execution time")]
    async fn execute(
        &self,
        Parameters(params): Parameters<ExecuteParams>,
    ) -> Result<CallToolResult, McpError> {
        if params.code.is_empty() {
            return Err(McpError::invalid_params(
                "Code is required and must be a non-empty string",
                None,
            ));
        }
        let language = self.resolve(&params.language)?;

        info!(language = %language, code_len = params.code.len(), "Executing snippet");

        let request = ExecutionRequest::new(language, params.code);
        let result = self.backend.execute(&request).await;
        if !result.is_success() {
            warn!(language = %language, exit_code = result.exit_code, "Snippet exited non-zero");
        }

        let body = to_json(&result)?;
        if result.is_success() {
            Ok(CallToolResult::success(vec![Content::text(body)]))
        } else {
            Ok(CallToolResult::error(vec![Content::text(body)]))
        }
    }

    /// List supported languages and how each is launched.
    #[tool(description = "List supported snippet languages with file extension and launcher")]
    async fn languages(&self) -> Result<CallToolResult, McpError> {
        let entries: Vec<_> = self
            .registry
            .profiles()
            .map(|p| {
                serde_json::json!({
                    "language": p.language,
                    "extension": p.extension,
                    "launcher": p.launcher,
                })
            })
            .collect();
        Ok(CallToolResult::success(vec![Content::text(to_json(&entries)?)]))
    }

    /// Return the starter snippet for a language.
    #[tool(description = "Get a starter code template for a language")]
    async fn template(
        &self,
        Parameters(params): Parameters<TemplateParams>,
    ) -> Result<CallToolResult, McpError> {
        let language = self.resolve(&params.language)?;
        Ok(CallToolResult::success(vec![Content::text(
            language.starter_template(),
        )]))
    }
}

#[tool_handler]
impl<B: ExecutionBackend + Clone + Send + Sync + 'static> ServerHandler for RunnerServer<B> {
    fn get_info(&self) -> ServerInfo {
        let langs: Vec<_> = Language::ALL.iter().map(|l| l.id()).collect();

        ServerInfo {
            protocol_version: rmcp::model::ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "snippet-runner-mcp".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                title: None,
                icons: None,
                website_url: None,
            },
            instructions: Some(format!(
                "Run short code snippets with a hard time limit.\n\
                 Supported languages: {langs:?}\n\
                 \n\
                 Use the 'execute' tool with:\n\
                 - language: one of {langs:?}\n\
                 - code: the snippet to run\n\
                 The result is JSON with output, error, exitCode and executionTimeMs."
            )),
        }
    }
}

/// Serve the runner over stdio.
pub async fn serve_stdio<B: ExecutionBackend + Clone + Send + Sync + 'static>(
    registry: LanguageRegistry,
    backend: B,
) -> anyhow::Result<()> {
    let server = RunnerServer::new(registry, backend);

    info!("Starting MCP server on stdio");

    let service = server
        .serve(stdio())
        .await
        .map_err(|e| anyhow::anyhow!("Failed to start MCP server: {e}"))?;

    service
        .waiting()
        .await
        .map_err(|e| anyhow::anyhow!("MCP server error: {e}"))?;

    Ok(())
}
