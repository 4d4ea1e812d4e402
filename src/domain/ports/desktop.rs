//! Capability provider ports.
//!
//! Built-in tools reach automation primitives exclusively through these
//! traits, so the bridge never depends on a particular display server or
//! operating system API.

use async_trait::async_trait;
use std::path::Path;

use crate::domain::errors::DesktopResult;
use crate::domain::models::{Capture, KeyChord, MouseButton, Point, Rgb, TitlePattern, WindowInfo};

/// Pointer, keyboard, screen, and window primitives.
#[async_trait]
pub trait Desktop: Send + Sync {
    /// Move the pointer to an absolute screen position.
    async fn move_pointer(&self, to: Point) -> DesktopResult<()>;

    /// Click at the current pointer position, returning that position.
    async fn click(&self, button: MouseButton) -> DesktopResult<Point>;

    /// Type `text` as keystrokes.
    async fn type_text(&self, text: &str) -> DesktopResult<()>;

    /// Press every key of the chord, then release them in reverse order.
    async fn press_keys(&self, chord: &KeyChord) -> DesktopResult<()>;

    /// Screen dimensions as `(width, height)`.
    fn screen_size(&self) -> (u32, u32);

    /// Color of the pixel at `at`.
    async fn pixel(&self, at: Point) -> DesktopResult<Rgb>;

    /// Capture the whole screen.
    async fn capture(&self) -> DesktopResult<Capture>;

    /// Topmost window whose title matches, if any.
    async fn find_window(&self, title: &TitlePattern) -> DesktopResult<Option<WindowInfo>>;

    /// Raise the topmost matching window and give it focus.
    async fn focus_window(&self, title: &TitlePattern) -> DesktopResult<WindowInfo>;

    /// Resize the topmost matching window.
    async fn resize_window(
        &self,
        title: &TitlePattern,
        width: u32,
        height: u32,
    ) -> DesktopResult<WindowInfo>;
}

/// Process start and termination.
#[async_trait]
pub trait ProcessControl: Send + Sync {
    /// Start the executable at `path`, returning its pid.
    async fn start(&self, path: &Path) -> DesktopResult<u32>;

    /// Ask the process to terminate.
    async fn terminate(&self, pid: u32) -> DesktopResult<()>;
}
