//! Adapters between the bridge services and the outside world.

pub mod desktop;
pub mod mcp;
