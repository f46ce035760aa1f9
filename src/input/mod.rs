//! Keyboard input normalization and pointer injection

pub mod keys;

// macOS implementation
#[cfg(target_os = "macos")]
pub mod macos;

pub use keys::{Key, KeyCode, Modifiers};
