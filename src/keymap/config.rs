//! YAML configuration parsing for keymaps
//!
//! A keymap file has two optional sections:
//!
//! ```yaml
//! bindings:                       # command registrations (defaults)
//!   - command: openKeybindings
//!     label: Open Keyboard Shortcuts
//!     category: Preferences
//!     key: "cmd+k cmd+s"          # space-separated keystrokes form a chord
//!     when: "!inputFocus"
//!     platform: macos             # optional; entry ignored elsewhere
//!
//! overrides:                      # user customizations of existing commands
//!   - command: openKeybindings
//!     key: "ctrl+alt+k"
//!   - command: zenMode
//!     unbind: true
//! ```

use std::path::Path;

use serde::Deserialize;

use super::binding::{CommandBinding, Keybinding};
use super::registry::{BindingOverride, KeyOverride};
use super::types::{Keystroke, Modifiers};
use super::when::WhenClause;

const DEFAULT_CATEGORY: &str = "General";

/// Root structure of a keymap YAML file
#[derive(Debug, Default, Deserialize)]
pub struct KeymapConfig {
    #[serde(default)]
    pub bindings: Vec<BindingConfig>,
    #[serde(default)]
    pub overrides: Vec<OverrideConfig>,
}

/// A single binding entry from YAML
#[derive(Debug, Deserialize)]
pub struct BindingConfig {
    pub command: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub when: Option<String>,
    #[serde(default)]
    pub platform: Option<String>,
}

/// A single override entry from YAML
#[derive(Debug, Deserialize)]
pub struct OverrideConfig {
    pub command: String,
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub when: Option<String>,
    #[serde(default)]
    pub unbind: bool,
}

/// Parsed contents of a keymap file
#[derive(Debug, Default)]
pub struct KeymapFile {
    pub bindings: Vec<CommandBinding>,
    pub overrides: Vec<BindingOverride>,
}

/// Load a keymap file from disk
pub fn load_keymap_file(path: &Path) -> Result<KeymapFile, KeymapError> {
    let content = std::fs::read_to_string(path).map_err(|e| KeymapError::IoError(e.to_string()))?;

    parse_keymap_yaml(&content)
}

/// Parse a keymap from a YAML string
pub fn parse_keymap_yaml(yaml: &str) -> Result<KeymapFile, KeymapError> {
    let config: KeymapConfig = if yaml.trim().is_empty() {
        KeymapConfig::default()
    } else {
        serde_yaml::from_str(yaml).map_err(|e| KeymapError::ParseError(e.to_string()))?
    };

    let current_platform = get_current_platform();
    let mut bindings = Vec::with_capacity(config.bindings.len());

    for entry in config.bindings {
        // Skip if platform-specific and doesn't match current platform
        if let Some(ref platform) = entry.platform {
            if platform != current_platform {
                continue;
            }
        }
        bindings.push(binding_from_config(entry)?);
    }

    let overrides = config
        .overrides
        .into_iter()
        .map(override_from_config)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(KeymapFile {
        bindings,
        overrides,
    })
}

fn binding_from_config(entry: BindingConfig) -> Result<CommandBinding, KeymapError> {
    let command = parse_command_id(&entry.command)?;
    let label = entry.label.unwrap_or_else(|| command.clone());
    let category = entry
        .category
        .unwrap_or_else(|| DEFAULT_CATEGORY.to_string());

    let mut binding = CommandBinding::new(&command, &label, &category);
    binding.default_keybinding = entry.key.as_deref().map(parse_keybinding).transpose()?;
    binding.when = parse_when(entry.when.as_deref());
    Ok(binding)
}

fn override_from_config(entry: OverrideConfig) -> Result<BindingOverride, KeymapError> {
    let command_id = parse_command_id(&entry.command)?;
    let keys = match (entry.unbind, entry.key.as_deref()) {
        (true, _) => KeyOverride::Unbind,
        (false, Some(key)) => KeyOverride::Set(parse_keybinding(key)?),
        (false, None) => KeyOverride::Inherit,
    };
    Ok(BindingOverride {
        command_id,
        keys,
        when: parse_when(entry.when.as_deref()),
    })
}

fn parse_command_id(command: &str) -> Result<String, KeymapError> {
    let command = command.trim();
    if command.is_empty() {
        return Err(KeymapError::InvalidCommand("empty command id".to_string()));
    }
    Ok(command.to_string())
}

/// Blank clauses mean "no restriction"; anything else is parsed, and a
/// malformed clause becomes one that never matches.
fn parse_when(when: Option<&str>) -> Option<WhenClause> {
    when.map(str::trim)
        .filter(|w| !w.is_empty())
        .map(WhenClause::parse)
}

/// Parse a space-separated keystroke sequence like "ctrl+k ctrl+s"
pub fn parse_keybinding(text: &str) -> Result<Keybinding, KeymapError> {
    let keystrokes = text
        .split_whitespace()
        .map(parse_key_string)
        .collect::<Result<Vec<_>, _>>()?;

    Keybinding::chord(keystrokes)
        .ok_or_else(|| KeymapError::InvalidKey(format!("No keys in binding: {:?}", text)))
}

/// Parse a key string like "cmd+shift+s" into a Keystroke
pub fn parse_key_string(key_str: &str) -> Result<Keystroke, KeymapError> {
    // "+" on its own, or as the final key ("ctrl++"), is the plus key
    let (mods_part, key_part) = if key_str == "+" {
        ("", Some("+"))
    } else if let Some(prefix) = key_str.strip_suffix("++") {
        (prefix, Some("+"))
    } else {
        (key_str, None)
    };

    let mut mods = Modifiers::NONE;
    let mut key = key_part.map(str::to_string);

    for part in mods_part.split('+').filter(|p| !p.is_empty()) {
        match part.to_lowercase().as_str() {
            // Platform command key
            "cmd" | "mod" => mods = mods | Modifiers::cmd(),
            "ctrl" | "control" => mods = mods | Modifiers::CTRL,
            "shift" => mods = mods | Modifiers::SHIFT,
            "alt" | "option" | "opt" => mods = mods | Modifiers::ALT,
            "meta" | "super" | "win" => mods = mods | Modifiers::META,
            _ => {
                if key.is_some() {
                    return Err(KeymapError::InvalidKey(format!(
                        "Multiple keys in binding: {}",
                        key_str
                    )));
                }
                key = Some(part.to_string());
            }
        }
    }

    let key = key.ok_or_else(|| {
        KeymapError::InvalidKey(format!("No key found in binding: {}", key_str))
    })?;

    Ok(Keystroke::new(&key, mods))
}

/// Problems in a keymap file that do not stop it from loading
pub fn lint_keymap(file: &KeymapFile) -> Vec<String> {
    let mut warnings = Vec::new();
    let mut seen: Vec<&str> = Vec::new();

    for binding in &file.bindings {
        if seen.contains(&binding.command_id.as_str()) {
            warnings.push(format!(
                "command '{}' is registered more than once; the last entry wins",
                binding.command_id
            ));
        }
        seen.push(&binding.command_id);

        if let Some(when) = &binding.when {
            if let Err(e) = WhenClause::try_parse(when.source()) {
                warnings.push(format!(
                    "command '{}': when-clause {:?} is invalid ({}); the binding will never fire",
                    binding.command_id,
                    when.source(),
                    e
                ));
            }
        }
    }

    // Unconditional bindings that can never fire
    let unconditional: Vec<(&CommandBinding, &Keybinding)> = file
        .bindings
        .iter()
        .filter(|b| b.when.is_none())
        .filter_map(|b| b.default_keybinding.as_ref().map(|kb| (b, kb)))
        .collect();

    for (i, (first, first_keys)) in unconditional.iter().enumerate() {
        for (second, second_keys) in &unconditional[i + 1..] {
            if first_keys == second_keys {
                warnings.push(format!(
                    "command '{}' ({}) is shadowed by '{}'",
                    second.command_id, second_keys, first.command_id
                ));
            } else if second_keys.extends(first_keys.keystrokes()) {
                warnings.push(format!(
                    "command '{}' ({}) starts the chord of '{}' and will never fire",
                    first.command_id, first_keys, second.command_id
                ));
            } else if first_keys.extends(second_keys.keystrokes()) {
                warnings.push(format!(
                    "command '{}' ({}) starts the chord of '{}' and will never fire",
                    second.command_id, second_keys, first.command_id
                ));
            }
        }
    }

    for over in &file.overrides {
        if let Some(when) = &over.when {
            if let Err(e) = WhenClause::try_parse(when.source()) {
                warnings.push(format!(
                    "override for '{}': when-clause {:?} is invalid ({})",
                    over.command_id,
                    when.source(),
                    e
                ));
            }
        }
    }

    warnings
}

/// Get the current platform identifier
fn get_current_platform() -> &'static str {
    if cfg!(target_os = "macos") {
        "macos"
    } else if cfg!(target_os = "windows") {
        "windows"
    } else {
        "linux"
    }
}

/// Errors that can occur when parsing keymaps
#[derive(Debug, Clone)]
pub enum KeymapError {
    IoError(String),
    ParseError(String),
    InvalidKey(String),
    InvalidCommand(String),
}

impl std::fmt::Display for KeymapError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeymapError::IoError(e) => write!(f, "IO error: {}", e),
            KeymapError::ParseError(e) => write!(f, "Parse error: {}", e),
            KeymapError::InvalidKey(k) => write!(f, "Invalid key: {}", k),
            KeymapError::InvalidCommand(c) => write!(f, "Invalid command: {}", c),
        }
    }
}

impl std::error::Error for KeymapError {}
