//! Tool registry - static descriptors and their handlers

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// Handler for a named tool: takes the arguments object, yields a result value
/// (any JSON structure or plain string) or an error with a readable message.
pub type ToolHandler =
    Arc<dyn Fn(Value) -> BoxFuture<'static, anyhow::Result<Value>> + Send + Sync>;

/// Declarative argument requirement checked before dispatch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequiredArgument {
    /// This argument must be present
    Field(String),
    /// At least one of these must be present
    AnyOf(Vec<String>),
}

impl RequiredArgument {
    pub fn field(name: &str) -> Self {
        Self::Field(name.to_string())
    }

    pub fn any_of(names: &[&str]) -> Self {
        Self::AnyOf(names.iter().map(|n| n.to_string()).collect())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
    #[serde(skip)]
    pub required: Vec<RequiredArgument>,
}

impl ToolDescriptor {
    pub fn new(name: &str, description: &str, input_schema: Value) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            input_schema,
            required: Vec::new(),
        }
    }

    pub fn require(mut self, requirement: RequiredArgument) -> Self {
        self.required.push(requirement);
        self
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Tool already registered: {0}")]
    DuplicateTool(String),
    #[error("Alias '{alias}' points at unknown tool '{target}'")]
    UnknownAliasTarget { alias: String, target: String },
}

pub struct RegisteredTool {
    pub descriptor: ToolDescriptor,
    pub handler: ToolHandler,
}

/// Ordered set of tools; built once at startup and read-only afterwards
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<RegisteredTool>,
    index: HashMap<String, usize>,
    aliases: HashMap<String, String>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        descriptor: ToolDescriptor,
        handler: ToolHandler,
    ) -> Result<(), RegistryError> {
        if self.index.contains_key(&descriptor.name) || self.aliases.contains_key(&descriptor.name)
        {
            return Err(RegistryError::DuplicateTool(descriptor.name));
        }
        self.index
            .insert(descriptor.name.clone(), self.tools.len());
        self.tools.push(RegisteredTool {
            descriptor,
            handler,
        });
        Ok(())
    }

    /// Convenience for registering an async closure
    pub fn register_fn<F, Fut>(
        &mut self,
        descriptor: ToolDescriptor,
        handler: F,
    ) -> Result<(), RegistryError>
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        let handler: ToolHandler =
            Arc::new(move |args: Value| -> BoxFuture<'static, anyhow::Result<Value>> {
                Box::pin(handler(args))
            });
        self.register(descriptor, handler)
    }

    /// Map an alternative name onto a registered tool
    pub fn alias(&mut self, alias: &str, target: &str) -> Result<(), RegistryError> {
        if !self.index.contains_key(target) {
            return Err(RegistryError::UnknownAliasTarget {
                alias: alias.to_string(),
                target: target.to_string(),
            });
        }
        if self.index.contains_key(alias) || self.aliases.contains_key(alias) {
            return Err(RegistryError::DuplicateTool(alias.to_string()));
        }
        self.aliases.insert(alias.to_string(), target.to_string());
        Ok(())
    }

    /// Resolve aliases to canonical tool names
    pub fn canonical_name<'a>(&'a self, name: &'a str) -> &'a str {
        self.aliases.get(name).map(|s| s.as_str()).unwrap_or(name)
    }

    pub fn get(&self, name: &str) -> Option<&RegisteredTool> {
        let name = self.canonical_name(name);
        self.index.get(name).map(|&i| &self.tools[i])
    }

    pub fn descriptors(&self) -> Vec<&ToolDescriptor> {
        self.tools.iter().map(|t| &t.descriptor).collect()
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.descriptor.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
