//! Domain models: tools, invocations, the queue, and configuration.

pub mod config;
pub mod desktop;
pub mod invocation;
pub mod queue;
pub mod tool;

pub use config::{
    CaptureConfig, Config, DisplayConfig, LoggingConfig, ServerConfig, StreamConfig, WindowSeed,
};
pub use desktop::{
    Capture, KeyChord, KeyChordError, MouseButton, Point, Rgb, TitlePattern, WindowInfo,
};
pub use invocation::{
    ContentBlock, CorrelationId, ErrorBody, InvocationEvent, InvocationRequest, ToolOutput,
    ToolResult, REQUEST_TYPE, TOOLS_CALL_METHOD,
};
pub use queue::{Claimed, Completed, ConsumerLease, InvocationQueue, QueueError};
pub use tool::{InputSchema, JsonType, PropertySchema, SchemaViolation, ToolDescriptor};
