//! Tools module

pub mod gateway;
pub mod library_tools;
pub mod registry;

pub use gateway::{GatewayError, ToolGateway};
pub use registry::{RegistryError, RequiredArgument, ToolDescriptor, ToolHandler, ToolRegistry};
