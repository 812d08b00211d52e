//! chordmap - keyboard shortcut and chord resolution
//!
//! This crate maps keystrokes to command ids: when-clause gated bindings,
//! multi-key chords with a timeout, and user overrides layered on top of an
//! embedded default keymap.

pub mod cli;
pub mod config;
pub mod config_paths;
pub mod keymap;
pub mod tracing;

// Re-export commonly used types
pub use config::EngineConfig;
pub use keymap::{BindingRegistry, ContextKeys, KeybindingResolver, Keystroke, Resolution};
