//! Manifest publisher.
//!
//! Projects the capability registry into the discovery document served at
//! the discovery path and sent as the first event of every stream.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::domain::models::ToolDescriptor;
use crate::services::capability_registry::CapabilityRegistry;

/// `{ "tools": [ {name, description, inputSchema}, ... ] }`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryDocument {
    /// Descriptors in registration order.
    pub tools: Vec<ToolDescriptor>,
}

/// Builds discovery documents from a fixed registry.
#[derive(Debug, Clone)]
pub struct ManifestPublisher {
    registry: Arc<CapabilityRegistry>,
}

impl ManifestPublisher {
    /// Publisher over `registry`.
    pub fn new(registry: Arc<CapabilityRegistry>) -> Self {
        Self { registry }
    }

    /// Every registered descriptor, in registration order.
    pub fn build(&self) -> DiscoveryDocument {
        DiscoveryDocument {
            tools: self.registry.describe().cloned().collect(),
        }
    }

    /// Compact JSON form of [`build`](Self::build).
    pub fn render(&self) -> serde_json::Result<String> {
        serde_json::to_string(&self.build())
    }
}
