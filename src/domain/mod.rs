//! Domain layer for the deskbridge tool bridge
//!
//! This module contains the tool, invocation, and queue models plus the
//! capability provider ports.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{DesktopError, DesktopResult, RegistryError, ToolError};
