//! Shared test helpers for integration tests
//!
//! Note: Functions may appear unused because each test file compiles separately.

#![allow(dead_code)]

use std::time::{Duration, Instant};

use chordmap::keymap::{
    BindingRegistry, ChordBreakPolicy, CommandBinding, ContextKeys, Keybinding,
    KeybindingResolver, Keystroke, Modifiers, Resolution,
};

pub fn ctrl(c: char) -> Keystroke {
    Keystroke::char_with_mods(c, Modifiers::CTRL)
}

pub fn key(c: char) -> Keystroke {
    Keystroke::char(c)
}

pub fn chord(first: Keystroke, second: Keystroke) -> Keybinding {
    Keybinding::new(first).then(second)
}

/// A small registry covering single keys, chords and when-clauses
///
/// - `save`            Ctrl+S
/// - `find`            Ctrl+F        when editorTextFocus && !terminalFocus
/// - `openKeybindings` Ctrl+K Ctrl+S
/// - `closeAll`        Ctrl+K Ctrl+W
/// - `zen`             Ctrl+K Z
pub fn test_registry() -> BindingRegistry {
    BindingRegistry::with_bindings(vec![
        CommandBinding::new("save", "Save", "File").keys(ctrl('s')),
        CommandBinding::new("find", "Find", "Edit")
            .keys(ctrl('f'))
            .when("editorTextFocus && !terminalFocus"),
        CommandBinding::new("openKeybindings", "Open Keyboard Shortcuts", "Preferences")
            .keys(chord(ctrl('k'), ctrl('s'))),
        CommandBinding::new("closeAll", "Close All", "View").keys(chord(ctrl('k'), ctrl('w'))),
        CommandBinding::new("zen", "Zen Mode", "View").keys(chord(ctrl('k'), key('z'))),
    ])
}

pub fn test_resolver() -> KeybindingResolver {
    KeybindingResolver::new(test_registry())
}

pub fn reevaluating_resolver() -> KeybindingResolver {
    test_resolver().with_break_policy(ChordBreakPolicy::Reevaluate)
}

pub fn editor_ctx() -> ContextKeys {
    ContextKeys::new().with("editorTextFocus", true)
}

pub fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

/// Feed keystrokes at `start + offset` and collect the resolutions
pub fn feed(
    resolver: &mut KeybindingResolver,
    ctx: &ContextKeys,
    start: Instant,
    strokes: &[(Keystroke, u64)],
) -> Vec<Resolution> {
    strokes
        .iter()
        .map(|(stroke, offset)| resolver.handle_keystroke_at(stroke, ctx, start + ms(*offset)))
        .collect()
}
