//! Keyboard command-binding resolution
//!
//! This module turns raw keystrokes into command ids:
//! - Keystrokes are normalized (`esc` → `Escape`, `K` → `k`)
//! - Bindings are single keystrokes or multi-key chords (`Ctrl+K Ctrl+S`)
//! - Each binding may be gated by a when-clause over context keys
//! - User customizations override defaults without replacing them
//!
//! # Architecture
//!
//! ```text
//! key event → Keystroke ─┐
//!                         ├→ KeybindingResolver → ChordStateMachine → BindingRegistry
//! ContextKeys snapshot ──┘                                   ↓
//!                                              Resolution { handled, command_id }
//! ```
//!
//! # Loading Keymaps
//!
//! ```ignore
//! // Embedded defaults plus ./keymap.yaml and ~/.config/chordmap/keymap.yaml
//! let mut resolver = KeybindingResolver::new(load_registry());
//!
//! let ctx = ContextKeys::new().with("editorTextFocus", true);
//! let save = Keystroke::from_event("s", true, false, false, false);
//! let result = resolver.handle_keystroke(&save, &ctx);
//! ```

mod binding;
mod chord;
mod config;
mod context;
mod defaults;
mod registry;
mod resolver;
mod types;
mod when;

pub use binding::{format_keybinding, CommandBinding, Keybinding};
pub use chord::{
    ChordBreakPolicy, ChordState, ChordStateMachine, ChordStep, TimerToken,
    DEFAULT_CHORD_TIMEOUT_MS, MAX_CHORD_TIMEOUT_MS, MIN_CHORD_TIMEOUT_MS,
};
pub use config::{
    lint_keymap, load_keymap_file, parse_key_string, parse_keybinding, parse_keymap_yaml,
    KeymapError, KeymapFile,
};
pub use context::{ContextKeys, ContextValue};
pub use defaults::{
    default_bindings, default_registry, get_default_keymap_yaml, load_registry,
    load_registry_with, merge_layer, override_paths,
};
pub use registry::{BindingOverride, BindingRegistry, KeyOverride};
pub use resolver::{KeybindingResolver, Resolution};
pub use types::{format, is_named_key, normalize_key, Keystroke, Modifiers};
pub use when::{evaluate, parse, Literal, WhenClause, WhenExpr, WhenParseError};
