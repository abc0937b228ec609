//! snippet-runner-mcp library
//!
//! Ephemeral, deadline-bounded execution of code snippets:
//! - Language registry mapping language ids to launch profiles
//! - Scratch-file workspaces that are always cleaned up
//! - A process supervisor enforcing the deadline
//! - Backend trait and process implementation tying them together
//! - MCP server implementation using rmcp

pub mod backend;
pub mod config;
pub mod language;
pub mod mcp;
pub mod result;
pub mod supervisor;
pub mod workspace;
