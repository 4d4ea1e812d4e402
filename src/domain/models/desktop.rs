//! Value types exchanged with capability providers.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A screen coordinate in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Point {
    /// Pixels from the left edge.
    pub x: i32,
    /// Pixels from the top edge.
    pub y: i32,
}

impl Point {
    /// Point at `(x, y)`.
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{})", self.x, self.y)
    }
}

/// Mouse button named by the `click` tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MouseButton {
    /// Primary button.
    #[default]
    Left,
    /// Secondary button.
    Right,
    /// Wheel button.
    Middle,
}

impl MouseButton {
    /// Accepted wire names, in schema order.
    pub const NAMES: [&'static str; 3] = ["left", "right", "middle"];

    /// Wire name of the button.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Right => "right",
            Self::Middle => "middle",
        }
    }
}

impl FromStr for MouseButton {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "left" => Ok(Self::Left),
            "right" => Ok(Self::Right),
            "middle" => Ok(Self::Middle),
            other => Err(format!("unknown mouse button '{other}'")),
        }
    }
}

/// An RGB color sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Rgb {
    /// Red channel.
    pub r: u8,
    /// Green channel.
    pub g: u8,
    /// Blue channel.
    pub b: u8,
}

impl Rgb {
    /// Color from its channels.
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

/// A full-screen capture in row-major RGB order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capture {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Three bytes per pixel.
    pub rgb: Vec<u8>,
}

impl Capture {
    /// Encode as a binary PPM (P6) image.
    pub fn to_ppm(&self) -> Vec<u8> {
        let header = format!("P6\n{} {}\n255\n", self.width, self.height);
        let mut out = Vec::with_capacity(header.len() + self.rgb.len());
        out.extend_from_slice(header.as_bytes());
        out.extend_from_slice(&self.rgb);
        out
    }
}

/// Snapshot of a top-level window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowInfo {
    /// Full window title.
    pub title: String,
    /// Left edge in screen coordinates.
    pub x: i32,
    /// Top edge in screen coordinates.
    pub y: i32,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Whether the window is topmost.
    pub focused: bool,
}

/// A window title pattern, matched from the start of the title.
#[derive(Debug, Clone)]
pub struct TitlePattern {
    source: String,
    regex: Regex,
}

impl TitlePattern {
    /// Compile `pattern`, anchored at the start of the title.
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        let regex = Regex::new(&format!("^(?:{pattern})"))?;
        Ok(Self {
            source: pattern.to_string(),
            regex,
        })
    }

    /// Whether `title` starts with a match.
    pub fn matches(&self, title: &str) -> bool {
        self.regex.is_match(title)
    }

    /// The pattern as the caller wrote it.
    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl fmt::Display for TitlePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

const NAMED_KEYS: &[&str] = &[
    "ctrl", "control", "alt", "shift", "win", "windows", "cmd", "command", "super", "enter",
    "return", "esc", "escape", "tab", "space", "backspace", "delete", "del", "insert", "home",
    "end", "pageup", "page up", "pagedown", "page down", "up", "down", "left", "right",
    "capslock", "caps lock", "numlock", "printscreen", "print screen", "pause", "menu",
];

fn is_known_key(name: &str) -> bool {
    if name.chars().count() == 1 {
        return true;
    }
    if NAMED_KEYS.contains(&name) {
        return true;
    }
    name.strip_prefix('f')
        .and_then(|n| n.parse::<u8>().ok())
        .is_some_and(|n| (1..=24).contains(&n))
}

/// Why a key chord failed to parse.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyChordError {
    /// No key names at all.
    #[error("empty key combination")]
    Empty,

    /// A name that is neither a character, a named key, nor F1-F24.
    #[error("unknown key '{0}'")]
    UnknownKey(String),
}

/// Keys pressed together and released in reverse order, e.g. `ctrl+shift+esc`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyChord {
    keys: Vec<String>,
}

impl KeyChord {
    /// Key names in press order; named keys are lowercased.
    pub fn keys(&self) -> &[String] {
        &self.keys
    }
}

impl FromStr for KeyChord {
    type Err = KeyChordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(KeyChordError::Empty);
        }
        // A lone "+" is the plus key itself.
        if s == "+" {
            return Ok(Self {
                keys: vec!["+".to_string()],
            });
        }

        let mut keys = Vec::new();
        for part in s.split('+') {
            let name = part.trim();
            let name = if name.chars().count() == 1 {
                name.to_string()
            } else {
                name.to_lowercase()
            };
            if name.is_empty() {
                return Err(KeyChordError::Empty);
            }
            if !is_known_key(&name) {
                return Err(KeyChordError::UnknownKey(part.trim().to_string()));
            }
            keys.push(name);
        }
        Ok(Self { keys })
    }
}

impl fmt::Display for KeyChord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.keys.join("+"))
    }
}
