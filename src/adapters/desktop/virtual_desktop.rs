//! In-memory desktop.
//!
//! Keeps pointer, keyboard, and window state in process. The screen is a
//! horizontal/vertical gradient with windows painted on top in a solid
//! color derived from their title, so pixel samples and captures are
//! deterministic.

use async_trait::async_trait;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::debug;

use crate::domain::errors::{DesktopError, DesktopResult};
use crate::domain::models::{
    Capture, DisplayConfig, KeyChord, MouseButton, Point, Rgb, TitlePattern, WindowInfo,
};
use crate::domain::ports::Desktop;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Window {
    title: String,
    x: i32,
    y: i32,
    width: u32,
    height: u32,
}

impl Window {
    fn contains(&self, p: Point) -> bool {
        let (x, y) = (i64::from(p.x), i64::from(p.y));
        let (left, top) = (i64::from(self.x), i64::from(self.y));
        x >= left
            && y >= top
            && x < left + i64::from(self.width)
            && y < top + i64::from(self.height)
    }

    fn color(&self) -> Rgb {
        let mut hasher = DefaultHasher::new();
        self.title.hash(&mut hasher);
        let [r, g, b, ..] = hasher.finish().to_le_bytes();
        Rgb::new(r, g, b)
    }
}

/// A user-visible action recorded by the virtual desktop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputEvent {
    /// A mouse click.
    Click {
        /// Button pressed.
        button: MouseButton,
        /// Pointer position at the time.
        at: Point,
    },
    /// Typed text.
    Text(String),
    /// A key chord, in press order.
    Keys(Vec<String>),
}

#[derive(Debug, Default)]
struct DesktopState {
    pointer: Point,
    /// Bottom to top; the last window is focused.
    windows: Vec<Window>,
    history: Vec<InputEvent>,
}

impl DesktopState {
    fn topmost(&self, title: &TitlePattern) -> Option<usize> {
        self.windows.iter().rposition(|w| title.matches(&w.title))
    }

    fn info(&self, index: usize) -> WindowInfo {
        let window = &self.windows[index];
        WindowInfo {
            title: window.title.clone(),
            x: window.x,
            y: window.y,
            width: window.width,
            height: window.height,
            focused: index + 1 == self.windows.len(),
        }
    }
}

/// [`Desktop`] that simulates a screen in memory.
#[derive(Debug)]
pub struct VirtualDesktop {
    width: u32,
    height: u32,
    state: Mutex<DesktopState>,
}

impl VirtualDesktop {
    /// A desktop sized and seeded from `config`, pointer at the origin.
    pub fn new(config: &DisplayConfig) -> Self {
        let windows = config
            .windows
            .iter()
            .map(|seed| Window {
                title: seed.title.clone(),
                x: seed.x,
                y: seed.y,
                width: seed.width,
                height: seed.height,
            })
            .collect();

        Self {
            width: config.width,
            height: config.height,
            state: Mutex::new(DesktopState {
                windows,
                ..DesktopState::default()
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, DesktopState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current pointer position.
    pub fn pointer(&self) -> Point {
        self.state().pointer
    }

    /// Input recorded so far, oldest first.
    pub fn history(&self) -> Vec<InputEvent> {
        self.state().history.clone()
    }

    /// Open windows, topmost first.
    pub fn windows(&self) -> Vec<WindowInfo> {
        let state = self.state();
        (0..state.windows.len()).rev().map(|i| state.info(i)).collect()
    }

    fn check_bounds(&self, p: Point) -> DesktopResult<()> {
        let inside = p.x >= 0
            && p.y >= 0
            && (p.x as u32) < self.width
            && (p.y as u32) < self.height;
        if inside {
            Ok(())
        } else {
            Err(DesktopError::OutOfBounds {
                x: p.x,
                y: p.y,
                width: self.width,
                height: self.height,
            })
        }
    }

    fn background(&self, p: Point) -> Rgb {
        let scale = |v: i32, extent: u32| -> u8 {
            let span = u64::from(extent.saturating_sub(1).max(1));
            (u64::from(v.max(0) as u32) * 255 / span).min(255) as u8
        };
        Rgb::new(scale(p.x, self.width), scale(p.y, self.height), 128)
    }

    fn sample(&self, state: &DesktopState, p: Point) -> Rgb {
        state
            .windows
            .iter()
            .rev()
            .find(|w| w.contains(p))
            .map_or_else(|| self.background(p), Window::color)
    }
}

#[async_trait]
impl Desktop for VirtualDesktop {
    async fn move_pointer(&self, to: Point) -> DesktopResult<()> {
        self.check_bounds(to)?;
        self.state().pointer = to;
        debug!(%to, "pointer moved");
        Ok(())
    }

    async fn click(&self, button: MouseButton) -> DesktopResult<Point> {
        let mut state = self.state();
        let at = state.pointer;
        state.history.push(InputEvent::Click { button, at });
        Ok(at)
    }

    async fn type_text(&self, text: &str) -> DesktopResult<()> {
        self.state().history.push(InputEvent::Text(text.to_string()));
        Ok(())
    }

    async fn press_keys(&self, chord: &KeyChord) -> DesktopResult<()> {
        self.state()
            .history
            .push(InputEvent::Keys(chord.keys().to_vec()));
        Ok(())
    }

    fn screen_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    async fn pixel(&self, at: Point) -> DesktopResult<Rgb> {
        self.check_bounds(at)?;
        let state = self.state();
        Ok(self.sample(&state, at))
    }

    async fn capture(&self) -> DesktopResult<Capture> {
        let state = self.state();
        let mut rgb = Vec::with_capacity(self.width as usize * self.height as usize * 3);
        for y in 0..self.height as i32 {
            for x in 0..self.width as i32 {
                let color = self.sample(&state, Point::new(x, y));
                rgb.extend_from_slice(&[color.r, color.g, color.b]);
            }
        }
        Ok(Capture {
            width: self.width,
            height: self.height,
            rgb,
        })
    }

    async fn find_window(&self, title: &TitlePattern) -> DesktopResult<Option<WindowInfo>> {
        let state = self.state();
        Ok(state.topmost(title).map(|i| state.info(i)))
    }

    async fn focus_window(&self, title: &TitlePattern) -> DesktopResult<WindowInfo> {
        let mut state = self.state();
        let index = state
            .topmost(title)
            .ok_or_else(|| DesktopError::WindowNotFound(title.to_string()))?;
        let window = state.windows.remove(index);
        state.windows.push(window);
        Ok(state.info(state.windows.len() - 1))
    }

    async fn resize_window(
        &self,
        title: &TitlePattern,
        width: u32,
        height: u32,
    ) -> DesktopResult<WindowInfo> {
        let mut state = self.state();
        let index = state
            .topmost(title)
            .ok_or_else(|| DesktopError::WindowNotFound(title.to_string()))?;
        state.windows[index].width = width;
        state.windows[index].height = height;
        Ok(state.info(index))
    }
}
