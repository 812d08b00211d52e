//! Core types for the keymap system: Modifiers and Keystroke

use std::fmt;

/// Modifier keys as a bitfield for efficient storage and comparison
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Modifiers(u8);

impl Modifiers {
    pub const NONE: Modifiers = Modifiers(0);
    pub const CTRL: Modifiers = Modifiers(0b0001);
    pub const SHIFT: Modifiers = Modifiers(0b0010);
    pub const ALT: Modifiers = Modifiers(0b0100);
    pub const META: Modifiers = Modifiers(0b1000); // Cmd on macOS, Win on Windows

    /// Create modifiers from individual flags
    pub const fn new(ctrl: bool, alt: bool, shift: bool, meta: bool) -> Self {
        let mut bits = 0u8;
        if ctrl {
            bits |= 0b0001;
        }
        if shift {
            bits |= 0b0010;
        }
        if alt {
            bits |= 0b0100;
        }
        if meta {
            bits |= 0b1000;
        }
        Modifiers(bits)
    }

    /// Check if ctrl is held
    #[inline]
    pub const fn ctrl(self) -> bool {
        self.0 & 0b0001 != 0
    }

    /// Check if shift is held
    #[inline]
    pub const fn shift(self) -> bool {
        self.0 & 0b0010 != 0
    }

    /// Check if alt/option is held
    #[inline]
    pub const fn alt(self) -> bool {
        self.0 & 0b0100 != 0
    }

    /// Check if meta (cmd/win) is held
    #[inline]
    pub const fn meta(self) -> bool {
        self.0 & 0b1000 != 0
    }

    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Combine two modifier sets
    #[inline]
    pub const fn union(self, other: Modifiers) -> Modifiers {
        Modifiers(self.0 | other.0)
    }

    /// Check if this contains all modifiers in other
    #[inline]
    pub const fn contains(self, other: Modifiers) -> bool {
        (self.0 & other.0) == other.0
    }

    /// Get the platform-specific "command" modifier (Cmd on macOS, Ctrl elsewhere)
    pub fn cmd() -> Modifiers {
        if cfg!(target_os = "macos") {
            Modifiers::META
        } else {
            Modifiers::CTRL
        }
    }

    /// Modifier labels in display order: Ctrl, Alt, Shift, Meta
    fn labels(self) -> impl Iterator<Item = &'static str> {
        [
            (self.ctrl(), "Ctrl"),
            (self.alt(), "Alt"),
            (self.shift(), "Shift"),
            (self.meta(), "Meta"),
        ]
        .into_iter()
        .filter_map(|(held, label)| held.then_some(label))
    }
}

impl std::ops::BitOr for Modifiers {
    type Output = Modifiers;

    fn bitor(self, rhs: Self) -> Self::Output {
        self.union(rhs)
    }
}

impl fmt::Display for Modifiers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.labels().collect::<Vec<_>>().join("+"))
    }
}

/// Canonical names for the non-character keys we know about.
///
/// Keys arriving from the input layer are matched case-insensitively against
/// the aliases and stored under the canonical spelling.
const KEY_ALIASES: &[(&str, &[&str])] = &[
    ("Enter", &["enter", "return"]),
    ("Escape", &["escape", "esc"]),
    ("Tab", &["tab"]),
    ("Space", &["space", "spacebar"]),
    ("Backspace", &["backspace", "back"]),
    ("Delete", &["delete", "del"]),
    ("ArrowUp", &["arrowup", "up"]),
    ("ArrowDown", &["arrowdown", "down"]),
    ("ArrowLeft", &["arrowleft", "left"]),
    ("ArrowRight", &["arrowright", "right"]),
    ("Home", &["home"]),
    ("End", &["end"]),
    ("PageUp", &["pageup", "pgup"]),
    ("PageDown", &["pagedown", "pgdown", "pgdn"]),
    ("Insert", &["insert", "ins"]),
];

/// Normalize a raw key string to the form stored in a [`Keystroke`]
///
/// - single ASCII letters are lowercased (`K` and `k` are the same key)
/// - a literal space becomes `Space`
/// - known aliases map to their canonical name (`esc` → `Escape`)
/// - function keys are spelled `F1`..`F24`
/// - anything else is kept verbatim
pub fn normalize_key(raw: &str) -> String {
    if raw == " " {
        return "Space".to_string();
    }

    let mut chars = raw.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        return c.to_ascii_lowercase().to_string();
    }

    let lower = raw.to_ascii_lowercase();
    if let Some((canonical, _)) = KEY_ALIASES
        .iter()
        .find(|(_, aliases)| aliases.contains(&lower.as_str()))
    {
        return (*canonical).to_string();
    }

    if let Some(n) = lower.strip_prefix('f').and_then(|n| n.parse::<u8>().ok()) {
        if (1..=24).contains(&n) {
            return format!("F{}", n);
        }
    }

    raw.to_string()
}

/// Returns true if `key` (already normalized) is one of the named keys
pub fn is_named_key(key: &str) -> bool {
    KEY_ALIASES.iter().any(|(canonical, _)| *canonical == key)
        || key
            .strip_prefix('F')
            .and_then(|n| n.parse::<u8>().ok())
            .is_some_and(|n| (1..=24).contains(&n))
}

/// A single keystroke: a key with modifiers
///
/// Two keystrokes are equal iff the normalized key string and all four
/// modifier flags match.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Keystroke {
    pub key: String,
    pub mods: Modifiers,
}

impl Keystroke {
    /// Create a new keystroke, normalizing the key string
    pub fn new(key: &str, mods: Modifiers) -> Self {
        Self {
            key: normalize_key(key),
            mods,
        }
    }

    /// Create a keystroke with no modifiers
    pub fn key(key: &str) -> Self {
        Self::new(key, Modifiers::NONE)
    }

    /// Create a keystroke with a character key
    pub fn char(c: char) -> Self {
        Self::new(c.encode_utf8(&mut [0; 4]), Modifiers::NONE)
    }

    /// Create a keystroke with a character and modifiers
    pub fn char_with_mods(c: char, mods: Modifiers) -> Self {
        Self::new(c.encode_utf8(&mut [0; 4]), mods)
    }

    /// Build a keystroke from the four raw modifier flags of a key event
    pub fn from_event(key: &str, ctrl: bool, alt: bool, shift: bool, meta: bool) -> Self {
        Self::new(key, Modifiers::new(ctrl, alt, shift, meta))
    }

    /// Human-readable label, e.g. `Ctrl+Shift+P` or `Alt+↑`
    ///
    /// Modifier order is fixed (Ctrl, Alt, Shift, Meta) and does not depend
    /// on the platform, so the same keystroke always formats the same way.
    pub fn display_string(&self) -> String {
        let mut parts: Vec<String> = self.mods.labels().map(str::to_string).collect();
        parts.push(key_label(&self.key));
        parts.join("+")
    }
}

/// Display label for a normalized key string
fn key_label(key: &str) -> String {
    match key {
        "ArrowUp" => "↑".to_string(),
        "ArrowDown" => "↓".to_string(),
        "ArrowLeft" => "←".to_string(),
        "ArrowRight" => "→".to_string(),
        "Enter" => "↵".to_string(),
        "Escape" => "⎋".to_string(),
        "Tab" => "⇥".to_string(),
        "Space" => "␣".to_string(),
        _ if key.chars().count() == 1 => key.to_uppercase(),
        _ => key.to_string(),
    }
}

/// Format a keystroke for display. Pure: same input, same output.
pub fn format(keystroke: &Keystroke) -> String {
    keystroke.display_string()
}

impl fmt::Display for Keystroke {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_string())
    }
}
