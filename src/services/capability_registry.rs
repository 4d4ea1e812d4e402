//! Capability registry.
//!
//! Maps tool names to their descriptors and handlers. The registry is
//! assembled once through [`CapabilityRegistryBuilder`] and exposes no
//! mutation afterwards, so it can be shared behind an `Arc` and read
//! without locking.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::errors::{RegistryError, ToolError};
use crate::domain::models::{InputSchema, ToolDescriptor, ToolOutput};

/// Uniform invocation contract implemented by every capability.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// Run the capability with already-validated arguments.
    async fn invoke(&self, arguments: &Map<String, Value>) -> Result<ToolOutput, ToolError>;
}

/// A registered tool: its public descriptor and the handler behind it.
pub struct Registration {
    descriptor: ToolDescriptor,
    handler: Arc<dyn ToolHandler>,
}

impl Registration {
    /// Public descriptor.
    pub fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    /// Handler that runs the tool.
    pub fn handler(&self) -> &dyn ToolHandler {
        self.handler.as_ref()
    }
}

impl std::fmt::Debug for Registration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registration")
            .field("name", &self.descriptor.name)
            .finish_non_exhaustive()
    }
}

/// Startup-time builder for a [`CapabilityRegistry`].
#[derive(Default)]
pub struct CapabilityRegistryBuilder {
    entries: Vec<Registration>,
    index: HashMap<String, usize>,
}

impl CapabilityRegistryBuilder {
    /// Register a tool under `name`.
    pub fn register(
        self,
        name: impl Into<String>,
        input_schema: InputSchema,
        description: impl Into<String>,
        handler: Arc<dyn ToolHandler>,
    ) -> Result<Self, RegistryError> {
        self.register_descriptor(ToolDescriptor::new(name, description, input_schema), handler)
    }

    /// Register a tool from a prepared descriptor.
    pub fn register_descriptor(
        mut self,
        descriptor: ToolDescriptor,
        handler: Arc<dyn ToolHandler>,
    ) -> Result<Self, RegistryError> {
        if descriptor.name.is_empty() {
            return Err(RegistryError::EmptyName);
        }
        if self.index.contains_key(&descriptor.name) {
            return Err(RegistryError::DuplicateTool(descriptor.name));
        }

        tracing::debug!(tool = %descriptor.name, "registering tool");
        self.index.insert(descriptor.name.clone(), self.entries.len());
        self.entries.push(Registration {
            descriptor,
            handler,
        });
        Ok(self)
    }

    /// Freeze the registrations.
    pub fn build(self) -> CapabilityRegistry {
        CapabilityRegistry {
            entries: self.entries,
            index: self.index,
        }
    }
}

/// Fixed set of invocable tools, in registration order.
pub struct CapabilityRegistry {
    entries: Vec<Registration>,
    index: HashMap<String, usize>,
}

impl std::fmt::Debug for CapabilityRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapabilityRegistry")
            .field("tools", &self.names())
            .finish()
    }
}

impl CapabilityRegistry {
    /// Start an empty registry.
    pub fn builder() -> CapabilityRegistryBuilder {
        CapabilityRegistryBuilder::default()
    }

    /// Look up a tool by name.
    pub fn resolve(&self, name: &str) -> Result<&Registration, ToolError> {
        self.index
            .get(name)
            .map(|&i| &self.entries[i])
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))
    }

    /// Descriptors of every tool, in registration order.
    pub fn describe(&self) -> impl Iterator<Item = &ToolDescriptor> {
        self.entries.iter().map(Registration::descriptor)
    }

    /// Tool names, in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.entries
            .iter()
            .map(|entry| entry.descriptor.name.as_str())
            .collect()
    }

    /// Number of registered tools.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no tools are registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
