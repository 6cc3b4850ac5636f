//! MCP (Model Context Protocol) module

pub mod dispatcher;
pub mod router;
pub mod server;
pub mod session;
pub mod types;

pub use dispatcher::{Dispatch, Dispatcher};
pub use router::{is_protocol_path, Router};
pub use server::{McpServer, ServerHandle};
pub use session::{generate_session_id, Session, SessionRegistry};
