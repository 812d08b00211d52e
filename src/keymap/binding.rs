//! Keybindings (keystroke sequences) and the command records they belong to

use super::context::ContextKeys;
use super::types::Keystroke;
use super::when::WhenClause;

/// A non-empty sequence of keystrokes: length 1 is a plain shortcut, longer
/// sequences are chords
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Keybinding {
    keystrokes: Vec<Keystroke>,
}

impl Keybinding {
    /// Create a single-keystroke binding
    pub fn new(keystroke: Keystroke) -> Self {
        Self {
            keystrokes: vec![keystroke],
        }
    }

    /// Create a chord binding (multi-keystroke sequence)
    ///
    /// Returns `None` for an empty sequence.
    pub fn chord(keystrokes: Vec<Keystroke>) -> Option<Self> {
        if keystrokes.is_empty() {
            None
        } else {
            Some(Self { keystrokes })
        }
    }

    /// Append a keystroke, turning the binding into (a longer) chord
    pub fn then(mut self, keystroke: Keystroke) -> Self {
        self.keystrokes.push(keystroke);
        self
    }

    pub fn keystrokes(&self) -> &[Keystroke] {
        &self.keystrokes
    }

    pub fn len(&self) -> usize {
        self.keystrokes.len()
    }

    /// Always false; kept for API symmetry with `len`
    pub fn is_empty(&self) -> bool {
        self.keystrokes.is_empty()
    }

    /// Check if this is a chord (multi-keystroke) binding
    pub fn is_chord(&self) -> bool {
        self.keystrokes.len() > 1
    }

    pub fn first(&self) -> &Keystroke {
        &self.keystrokes[0]
    }

    /// Exactly the given sequence
    pub fn matches_exactly(&self, sequence: &[Keystroke]) -> bool {
        self.keystrokes == sequence
    }

    /// Strictly longer than `prefix` and starting with it
    pub fn extends(&self, prefix: &[Keystroke]) -> bool {
        self.keystrokes.len() > prefix.len() && self.keystrokes.starts_with(prefix)
    }

    /// Starts with the given keystroke sequence (including equality)
    pub fn starts_with(&self, prefix: &[Keystroke]) -> bool {
        self.keystrokes.starts_with(prefix)
    }

    /// Get display string for this keybinding, e.g. `Ctrl+K Ctrl+S`
    pub fn display_string(&self) -> String {
        self.keystrokes
            .iter()
            .map(|k| k.display_string())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl From<Keystroke> for Keybinding {
    fn from(keystroke: Keystroke) -> Self {
        Keybinding::new(keystroke)
    }
}

impl std::fmt::Display for Keybinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.display_string())
    }
}

/// Format a keybinding for a settings UI or status bar
pub fn format_keybinding(keybinding: &Keybinding) -> String {
    keybinding.display_string()
}

/// A registered command and the keys that trigger it
///
/// User customizations live next to the defaults; the registry always reads
/// the *effective* values.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandBinding {
    pub command_id: String,
    pub label: String,
    pub category: String,
    pub default_keybinding: Option<Keybinding>,
    pub custom_keybinding: Option<Keybinding>,
    pub when: Option<WhenClause>,
    pub custom_when: Option<WhenClause>,
    /// The user removed the binding; no keybinding is effective
    pub unbound: bool,
}

impl CommandBinding {
    pub fn new(command_id: &str, label: &str, category: &str) -> Self {
        Self {
            command_id: command_id.to_string(),
            label: label.to_string(),
            category: category.to_string(),
            default_keybinding: None,
            custom_keybinding: None,
            when: None,
            custom_when: None,
            unbound: false,
        }
    }

    /// Set the default keybinding (builder pattern)
    pub fn keys(mut self, keybinding: impl Into<Keybinding>) -> Self {
        self.default_keybinding = Some(keybinding.into());
        self
    }

    /// Set the default when-clause (builder pattern)
    pub fn when(mut self, source: &str) -> Self {
        self.when = Some(WhenClause::parse(source));
        self
    }

    /// `custom ?? default`, or nothing when the user unbound the command
    pub fn effective_keybinding(&self) -> Option<&Keybinding> {
        if self.unbound {
            return None;
        }
        self.custom_keybinding.as_ref().or(self.default_keybinding.as_ref())
    }

    /// `custom_when ?? when`
    pub fn effective_when(&self) -> Option<&WhenClause> {
        self.custom_when.as_ref().or(self.when.as_ref())
    }

    /// True when there is no effective clause, or the clause holds
    pub fn is_enabled(&self, ctx: &ContextKeys) -> bool {
        self.effective_when().map_or(true, |clause| clause.evaluate(ctx))
    }

    pub fn is_customized(&self) -> bool {
        self.unbound || self.custom_keybinding.is_some() || self.custom_when.is_some()
    }

    /// Drop every user customization
    pub fn reset_to_default(&mut self) {
        self.custom_keybinding = None;
        self.custom_when = None;
        self.unbound = false;
    }
}
