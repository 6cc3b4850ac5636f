//! library-mcp - MCP server exposing a personal document library to AI agents

pub mod config;
pub mod http;
pub mod http_logger;
pub mod library;
pub mod mcp;
pub mod tools;

// Re-export commonly used types
pub use config::{Backoff, KeepAlivePolicy, ReadPolicy, ServerConfig, ServerOptions};
pub use library::Library;
pub use mcp::{Dispatcher, McpServer, ServerHandle, SessionRegistry};
pub use tools::{ToolDescriptor, ToolGateway, ToolRegistry};
