//! Interfaces to the operating system.
//!
//! Everything the window manager needs from the OS goes through the traits in
//! [`ax`]. The macOS backend implements them on top of the accessibility API;
//! [`fake`] implements them in memory for tests.

pub mod ax;
pub mod enhanced_ui;
#[cfg(test)]
pub mod fake;
pub mod geometry;
#[cfg(target_os = "macos")]
pub mod macos;
