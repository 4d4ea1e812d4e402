//! Bridge services: registry, manifest, dispatch, and error translation.

pub mod bridge_context;
pub mod builtin_tools;
pub mod capability_registry;
pub mod dispatch_loop;
pub mod dispatcher;
pub mod error_translator;
pub mod manifest;

pub use bridge_context::BridgeContext;
pub use builtin_tools::{builtin_registry, BuiltinTool, Providers};
pub use capability_registry::{
    CapabilityRegistry, CapabilityRegistryBuilder, Registration, ToolHandler,
};
pub use dispatch_loop::{DispatchLoop, Frame, StreamState};
pub use dispatcher::Dispatcher;
pub use error_translator::{ErrorCode, ErrorTranslator};
pub use manifest::{DiscoveryDocument, ManifestPublisher};
