//! Default keybindings and the layered keymap loader
//!
//! The embedded `keymap.yaml` is the base layer. Project-local and user files
//! may register extra commands and override existing ones.

use std::path::{Path, PathBuf};

use super::binding::{CommandBinding, Keybinding};
use super::config::{load_keymap_file, parse_keymap_yaml, KeymapFile};
use super::registry::BindingRegistry;
use super::types::{Keystroke, Modifiers};

/// Default keymap YAML embedded at compile time
const DEFAULT_KEYMAP_YAML: &str = include_str!("../../keymap.yaml");

/// Get the embedded default keymap YAML
pub fn get_default_keymap_yaml() -> &'static str {
    DEFAULT_KEYMAP_YAML
}

/// Layers applied on top of the embedded defaults, in order
///
/// 1. `keymap.yaml` in the current directory (project-local)
/// 2. `~/.config/chordmap/keymap.yaml` (user)
pub fn override_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from("keymap.yaml")];
    if let Some(user) = crate::config_paths::keymap_file() {
        paths.push(user);
    }
    paths
}

/// Build the live registry: embedded defaults plus every override layer
pub fn load_registry() -> BindingRegistry {
    load_registry_with(&override_paths())
}

/// Build a registry from the embedded defaults plus the given layers
///
/// Missing files are skipped silently; unreadable or malformed ones are
/// logged and skipped.
pub fn load_registry_with(layers: &[PathBuf]) -> BindingRegistry {
    let mut registry = default_registry();

    for path in layers {
        if !path.exists() {
            continue;
        }
        match load_keymap_file(path) {
            Ok(file) => {
                tracing::info!(
                    "Merging keymap layer {} ({} bindings, {} overrides)",
                    path.display(),
                    file.bindings.len(),
                    file.overrides.len()
                );
                merge_layer(&mut registry, file, path);
            }
            Err(e) => {
                tracing::warn!("Failed to load keymap layer {}: {}", path.display(), e);
            }
        }
    }

    registry
}

/// Registry built from the embedded keymap only
pub fn default_registry() -> BindingRegistry {
    match parse_keymap_yaml(DEFAULT_KEYMAP_YAML) {
        Ok(file) => {
            tracing::info!(
                "Loaded embedded default keymap ({} commands)",
                file.bindings.len()
            );
            BindingRegistry::with_bindings(file.bindings)
        }
        Err(e) => {
            tracing::warn!(
                "Failed to parse embedded keymap: {}, using hardcoded defaults",
                e
            );
            BindingRegistry::with_bindings(default_bindings())
        }
    }
}

/// Register a layer's commands, then apply its overrides
pub fn merge_layer(registry: &mut BindingRegistry, file: KeymapFile, source: &Path) {
    for binding in file.bindings {
        registry.register(binding);
    }

    for over in &file.overrides {
        if !registry.apply_override(over) {
            tracing::warn!(
                "{}: override for unknown command '{}' ignored",
                source.display(),
                over.command_id
            );
        }
    }
}

/// Hardcoded fallback used when the embedded keymap cannot be parsed
///
/// Uses Cmd on macOS, Ctrl on Windows/Linux for the "command" modifier.
pub fn default_bindings() -> Vec<CommandBinding> {
    let cmd = Modifiers::cmd();
    let cmd_shift = cmd | Modifiers::SHIFT;

    vec![
        CommandBinding::new("workbench.action.files.save", "Save", "File")
            .keys(Keystroke::char_with_mods('s', cmd)),
        CommandBinding::new("workbench.action.showCommands", "Show All Commands", "View")
            .keys(Keystroke::char_with_mods('p', cmd_shift)),
        CommandBinding::new("workbench.action.quickOpen", "Go to File", "Go")
            .keys(Keystroke::char_with_mods('p', cmd)),
        CommandBinding::new("actions.find", "Find", "Edit")
            .keys(Keystroke::char_with_mods('f', cmd))
            .when("editorFocus"),
        CommandBinding::new(
            "workbench.action.openGlobalKeybindings",
            "Open Keyboard Shortcuts",
            "Preferences",
        )
        .keys(Keybinding::new(cmd_key('k')).then(cmd_key('s'))),
        CommandBinding::new("workbench.action.closeAllEditors", "Close All Editors", "View")
            .keys(Keybinding::new(cmd_key('k')).then(cmd_key('w'))),
    ]
}

fn cmd_key(c: char) -> Keystroke {
    Keystroke::char_with_mods(c, Modifiers::cmd())
}
