//! MCP-style HTTP surface of the bridge.
//!
//! Discovery, submission, and the server-sent event stream share one
//! listener and one [`BridgeContext`](crate::services::BridgeContext).

pub mod bridge_http;

pub use bridge_http::{BridgeHttpConfig, BridgeHttpServer, STREAM_PATH, TOOLS_PATH};
