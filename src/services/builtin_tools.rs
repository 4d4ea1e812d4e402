//! Built-in desktop automation tools.
//!
//! [`BuiltinTool`] is the closed set of capabilities the bridge ships
//! with. Each variant knows its descriptor and how to turn validated
//! arguments into calls on the capability provider ports.

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::domain::errors::{DesktopError, RegistryError, ToolError};
use crate::domain::models::{
    InputSchema, KeyChord, MouseButton, Point, PropertySchema, TitlePattern, ToolDescriptor,
    ToolOutput,
};
use crate::domain::ports::{Desktop, ProcessControl};
use crate::services::capability_registry::{CapabilityRegistry, ToolHandler};

/// Every tool the bridge exposes, in manifest order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinTool {
    /// `move_mouse`: move the pointer.
    MoveMouse,
    /// `click`: click a mouse button.
    Click,
    /// `pixel_color`: sample one pixel.
    PixelColor,
    /// `screenshot`: capture the screen to a file.
    Screenshot,
    /// `type_text`: type a string.
    TypeText,
    /// `press_key`: press a key chord.
    PressKey,
    /// `find_window`: look up a window by title.
    FindWindow,
    /// `focus_window`: raise a window.
    FocusWindow,
    /// `resize_window`: change a window size.
    ResizeWindow,
    /// `open_app`: launch an executable.
    OpenApp,
    /// `close_app`: terminate a process.
    CloseApp,
}

impl BuiltinTool {
    /// Every variant, in manifest order.
    pub const ALL: [Self; 11] = [
        Self::MoveMouse,
        Self::Click,
        Self::PixelColor,
        Self::Screenshot,
        Self::TypeText,
        Self::PressKey,
        Self::FindWindow,
        Self::FocusWindow,
        Self::ResizeWindow,
        Self::OpenApp,
        Self::CloseApp,
    ];

    /// Wire name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::MoveMouse => "move_mouse",
            Self::Click => "click",
            Self::PixelColor => "pixel_color",
            Self::Screenshot => "screenshot",
            Self::TypeText => "type_text",
            Self::PressKey => "press_key",
            Self::FindWindow => "find_window",
            Self::FocusWindow => "focus_window",
            Self::ResizeWindow => "resize_window",
            Self::OpenApp => "open_app",
            Self::CloseApp => "close_app",
        }
    }

    /// One-line description shown in the manifest.
    pub fn description(&self) -> &'static str {
        match self {
            Self::MoveMouse => "Move the mouse pointer to screen coordinates (X, Y).",
            Self::Click => "Perform a mouse click at the current position.",
            Self::PixelColor => "Retrieve the RGB color of a pixel at coordinates (X, Y).",
            Self::Screenshot => "Capture a full screenshot and save it locally.",
            Self::TypeText => "Type a string of text.",
            Self::PressKey => "Press and release a specific key.",
            Self::FindWindow => "Check if a window with the given title exists.",
            Self::FocusWindow => "Bring the window with the given title to the foreground.",
            Self::ResizeWindow => "Resize a window to new width & height.",
            Self::OpenApp => "Start an application using its full path.",
            Self::CloseApp => "Terminate a process using its PID.",
        }
    }

    /// Declared arguments.
    pub fn input_schema(&self) -> InputSchema {
        let schema = InputSchema::object();
        match self {
            Self::MoveMouse | Self::PixelColor => schema
                .require("x", PropertySchema::number())
                .require("y", PropertySchema::number()),
            Self::Click => schema.optional(
                "button",
                PropertySchema::string().one_of(MouseButton::NAMES),
            ),
            Self::Screenshot => schema,
            Self::TypeText => schema.require("text", PropertySchema::string()),
            Self::PressKey => schema.require("key", PropertySchema::string()),
            Self::FindWindow | Self::FocusWindow => {
                schema.require("title", PropertySchema::string())
            }
            Self::ResizeWindow => schema
                .require("title", PropertySchema::string())
                .require("width", PropertySchema::number())
                .require("height", PropertySchema::number()),
            Self::OpenApp => schema.require("path", PropertySchema::string()),
            Self::CloseApp => schema.require("pid", PropertySchema::number()),
        }
    }

    /// Full descriptor for registration.
    pub fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor::new(self.name(), self.description(), self.input_schema())
    }
}

/// Capability providers shared by all built-in tools.
pub struct Providers {
    /// Desktop input and inspection.
    pub desktop: Arc<dyn Desktop>,
    /// Launching and terminating processes.
    pub processes: Arc<dyn ProcessControl>,
    /// Where `screenshot` writes its capture.
    pub screenshot_path: PathBuf,
}

/// Binds one [`BuiltinTool`] variant to the providers it runs against.
pub struct BuiltinHandler {
    tool: BuiltinTool,
    providers: Arc<Providers>,
}

impl BuiltinHandler {
    /// Handler for `tool`.
    pub fn new(tool: BuiltinTool, providers: Arc<Providers>) -> Self {
        Self { tool, providers }
    }

    fn argument<'a>(&self, arguments: &'a Map<String, Value>, name: &str) -> Result<&'a Value, ToolError> {
        arguments.get(name).ok_or_else(|| {
            ToolError::invalid_argument(self.tool.name(), format!("missing required argument '{name}'"))
        })
    }

    fn string<'a>(&self, arguments: &'a Map<String, Value>, name: &str) -> Result<&'a str, ToolError> {
        self.argument(arguments, name)?.as_str().ok_or_else(|| {
            ToolError::invalid_argument(self.tool.name(), format!("argument '{name}' must be a string"))
        })
    }

    fn number(&self, arguments: &Map<String, Value>, name: &str) -> Result<f64, ToolError> {
        self.argument(arguments, name)?
            .as_f64()
            .filter(|n| n.is_finite())
            .ok_or_else(|| {
                ToolError::invalid_argument(self.tool.name(), format!("argument '{name}' must be a number"))
            })
    }

    /// A screen coordinate, rounded to the nearest pixel.
    #[allow(clippy::cast_possible_truncation)]
    fn coordinate(&self, arguments: &Map<String, Value>, name: &str) -> Result<i32, ToolError> {
        let value = self.number(arguments, name)?.round();
        if value < f64::from(i32::MIN) || value > f64::from(i32::MAX) {
            return Err(ToolError::invalid_argument(
                self.tool.name(),
                format!("argument '{name}' is out of range"),
            ));
        }
        Ok(value as i32)
    }

    /// A strictly positive whole number that fits in `max`.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn positive_integer(
        &self,
        arguments: &Map<String, Value>,
        name: &str,
        max: u32,
    ) -> Result<u32, ToolError> {
        let value = self.number(arguments, name)?;
        if value.fract() != 0.0 || value < 1.0 || value > f64::from(max) {
            return Err(ToolError::invalid_argument(
                self.tool.name(),
                format!("argument '{name}' must be a whole number between 1 and {max}"),
            ));
        }
        Ok(value as u32)
    }

    fn title(&self, arguments: &Map<String, Value>) -> Result<TitlePattern, ToolError> {
        let title = self.string(arguments, "title")?;
        TitlePattern::new(title).map_err(|e| {
            ToolError::invalid_argument(self.tool.name(), format!("invalid title pattern: {e}"))
        })
    }

    fn point(&self, arguments: &Map<String, Value>) -> Result<Point, ToolError> {
        Ok(Point::new(
            self.coordinate(arguments, "x")?,
            self.coordinate(arguments, "y")?,
        ))
    }
}

const MAX_WINDOW_DIMENSION: u32 = 65_535;
// Larger values wrap to negative pids on the wire.
const MAX_PID: u32 = i32::MAX as u32;

#[async_trait]
impl ToolHandler for BuiltinHandler {
    async fn invoke(&self, arguments: &Map<String, Value>) -> Result<ToolOutput, ToolError> {
        let desktop = self.providers.desktop.as_ref();
        let processes = self.providers.processes.as_ref();

        match self.tool {
            BuiltinTool::MoveMouse => {
                let point = self.point(arguments)?;
                desktop.move_pointer(point).await?;
                Ok(ToolOutput::text(format!("Moved mouse pointer to {point}")))
            }
            BuiltinTool::Click => {
                let button = match arguments.get("button") {
                    None | Some(Value::Null) => MouseButton::default(),
                    Some(_) => self
                        .string(arguments, "button")?
                        .parse::<MouseButton>()
                        .map_err(|e| ToolError::invalid_argument(self.tool.name(), e))?,
                };
                desktop.click(button).await?;
                Ok(ToolOutput::text(format!("Performed {} click", button.as_str())))
            }
            BuiltinTool::PixelColor => {
                let point = self.point(arguments)?;
                let color = desktop.pixel(point).await?;
                Ok(ToolOutput::Json(json!({
                    "r": color.r,
                    "g": color.g,
                    "b": color.b,
                })))
            }
            BuiltinTool::Screenshot => {
                let capture = desktop.capture().await?;
                let path = &self.providers.screenshot_path;
                write_capture(path, &capture.to_ppm()).await?;
                Ok(ToolOutput::text(format!(
                    "Screenshot saved to {}",
                    path.display()
                )))
            }
            BuiltinTool::TypeText => {
                let text = self.string(arguments, "text")?;
                desktop.type_text(text).await?;
                Ok(ToolOutput::text(format!("Typed text: {text}")))
            }
            BuiltinTool::PressKey => {
                let key = self.string(arguments, "key")?;
                let chord: KeyChord = key
                    .parse()
                    .map_err(|e| ToolError::invalid_argument(self.tool.name(), format!("{e}")))?;
                desktop.press_keys(&chord).await?;
                Ok(ToolOutput::text(format!("Pressed key(s): {key}")))
            }
            BuiltinTool::FindWindow => {
                let title = self.title(arguments)?;
                let found = desktop.find_window(&title).await?.is_some();
                Ok(ToolOutput::text(if found { "True" } else { "False" }))
            }
            BuiltinTool::FocusWindow => {
                let title = self.title(arguments)?;
                desktop.focus_window(&title).await?;
                Ok(ToolOutput::text(format!("Window '{title}' focused.")))
            }
            BuiltinTool::ResizeWindow => {
                let title = self.title(arguments)?;
                let width = self.positive_integer(arguments, "width", MAX_WINDOW_DIMENSION)?;
                let height = self.positive_integer(arguments, "height", MAX_WINDOW_DIMENSION)?;
                desktop.resize_window(&title, width, height).await?;
                Ok(ToolOutput::text(format!(
                    "Window '{title}' resized to {width}x{height}"
                )))
            }
            BuiltinTool::OpenApp => {
                let path = self.string(arguments, "path")?;
                if path.trim().is_empty() {
                    return Err(ToolError::invalid_argument(
                        self.tool.name(),
                        "argument 'path' cannot be empty",
                    ));
                }
                let pid = processes.start(Path::new(path)).await?;
                Ok(ToolOutput::text(format!(
                    "Application started from path: {path} (pid {pid})"
                )))
            }
            BuiltinTool::CloseApp => {
                let pid = self.positive_integer(arguments, "pid", MAX_PID)?;
                processes.terminate(pid).await?;
                Ok(ToolOutput::text(format!("Process with PID {pid} terminated")))
            }
        }
    }
}

async fn write_capture(path: &Path, bytes: &[u8]) -> Result<(), ToolError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(DesktopError::from)?;
    }
    tokio::fs::write(path, bytes)
        .await
        .map_err(DesktopError::from)?;
    Ok(())
}

/// Build a registry containing every [`BuiltinTool`].
pub fn builtin_registry(providers: Providers) -> Result<CapabilityRegistry, RegistryError> {
    let providers = Arc::new(providers);
    let mut builder = CapabilityRegistry::builder();
    for tool in BuiltinTool::ALL {
        builder = builder.register_descriptor(
            tool.descriptor(),
            Arc::new(BuiltinHandler::new(tool, Arc::clone(&providers))),
        )?;
    }
    Ok(builder.build())
}
