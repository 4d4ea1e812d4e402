//! Capability providers backing the built-in tools.

pub mod host_processes;
pub mod virtual_desktop;

pub use host_processes::HostProcesses;
pub use virtual_desktop::{InputEvent, VirtualDesktop};
