//! Error translator.
//!
//! Converts invocation failures into the `{code, message}` envelope carried
//! by error events. The underlying failure text is always preserved.

use crate::domain::errors::ToolError;
use crate::domain::models::ErrorBody;

/// Wire error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum ErrorCode {
    /// Arguments failed schema validation.
    InvalidArgument = 400,
    /// No tool with the requested name.
    NotFound = 404,
    /// The tool ran and failed.
    ExecutionFailed = 500,
}

impl ErrorCode {
    /// Numeric code as carried on the wire.
    pub const fn as_u16(self) -> u16 {
        self as u16
    }
}

/// Maps [`ToolError`] to [`ErrorBody`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ErrorTranslator;

impl ErrorTranslator {
    /// Wire code for a failure.
    pub fn code_for(error: &ToolError) -> ErrorCode {
        match error {
            ToolError::UnknownTool(_) => ErrorCode::NotFound,
            ToolError::InvalidArgument { .. } => ErrorCode::InvalidArgument,
            ToolError::ExecutionFailed { .. } => ErrorCode::ExecutionFailed,
        }
    }

    /// Error body for a failure, keeping its message.
    pub fn translate(&self, error: &ToolError) -> ErrorBody {
        let code = Self::code_for(error);
        let message = match error {
            ToolError::ExecutionFailed { .. } => format!("Tool execution failed: {error}"),
            _ => error.to_string(),
        };
        ErrorBody {
            code: code.as_u16(),
            message,
        }
    }
}
