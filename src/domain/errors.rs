//! Domain errors for the deskbridge tool bridge.

use thiserror::Error;

/// Failures raised while resolving, validating, or running a tool.
///
/// Every variant maps onto exactly one error code on the wire; see
/// [`ErrorTranslator`](crate::services::ErrorTranslator).
#[derive(Debug, Error)]
pub enum ToolError {
    /// No tool is registered under this name.
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    /// Arguments do not fit the tool's input schema or value rules.
    #[error("Invalid arguments for {tool}: {reason}")]
    InvalidArgument {
        /// Tool the arguments were meant for.
        tool: String,
        /// What was wrong with them.
        reason: String,
    },

    /// The handler ran and failed.
    #[error("{category}: {message}")]
    ExecutionFailed {
        /// Short failure kind, e.g. `WindowNotFound`.
        category: String,
        /// The underlying failure text.
        message: String,
    },
}

impl ToolError {
    /// Build a [`ToolError::InvalidArgument`].
    pub fn invalid_argument(tool: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            tool: tool.into(),
            reason: reason.into(),
        }
    }

    /// Build a [`ToolError::ExecutionFailed`].
    pub fn execution_failed(category: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ExecutionFailed {
            category: category.into(),
            message: message.into(),
        }
    }
}

impl From<DesktopError> for ToolError {
    fn from(err: DesktopError) -> Self {
        Self::ExecutionFailed {
            category: err.category().to_string(),
            message: err.to_string(),
        }
    }
}

/// Failures reported by a capability provider.
#[derive(Debug, Error)]
pub enum DesktopError {
    /// The point lies outside the screen.
    #[error("point ({x},{y}) is outside the {width}x{height} screen")]
    OutOfBounds {
        /// Requested x.
        x: i32,
        /// Requested y.
        y: i32,
        /// Screen width.
        width: u32,
        /// Screen height.
        height: u32,
    },

    /// No window title matched the pattern.
    #[error("no window matching '{0}'")]
    WindowNotFound(String),

    /// No process with this pid exists.
    #[error("process {0} not found")]
    ProcessNotFound(u32),

    /// The executable could not be started.
    #[error("failed to start '{path}': {reason}")]
    SpawnFailed {
        /// Executable that was requested.
        path: String,
        /// Why it could not be started.
        reason: String,
    },

    /// The operation is not allowed.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Filesystem or OS failure.
    #[error("{0}")]
    Io(#[from] std::io::Error),

    /// Any other provider failure.
    #[error("{0}")]
    Backend(String),
}

impl DesktopError {
    /// Short failure category carried into error events.
    pub fn category(&self) -> &'static str {
        match self {
            Self::OutOfBounds { .. } => "OutOfBounds",
            Self::WindowNotFound(_) => "WindowNotFound",
            Self::ProcessNotFound(_) => "ProcessNotFound",
            Self::SpawnFailed { .. } => "SpawnFailed",
            Self::PermissionDenied(_) => "PermissionDenied",
            Self::Io(_) => "Io",
            Self::Backend(_) => "BackendError",
        }
    }
}

/// Result type returned by capability providers.
pub type DesktopResult<T> = Result<T, DesktopError>;

/// Failures while assembling the capability registry at startup.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// A tool with this name was already registered.
    #[error("Tool already registered: {0}")]
    DuplicateTool(String),

    /// The tool name is empty.
    #[error("Tool name cannot be empty")]
    EmptyName,
}
