//! Port trait definitions (Hexagonal Architecture)
//!
//! - `Desktop`: pointer, keyboard, screen, and window primitives
//! - `ProcessControl`: process start and termination
//!
//! These traits define the contracts that keep the bridge independent
//! of specific capability providers.

pub mod desktop;

pub use desktop::{Desktop, ProcessControl};
