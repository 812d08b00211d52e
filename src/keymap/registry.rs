//! Binding registry: every known command and its effective keybinding
//!
//! Iteration order is registration order and is the tie-break whenever two
//! enabled bindings match the same keys: the first registered wins.
//! Re-registering an existing command id updates it in place, so edits made
//! in a settings UI never reorder the registry.

use std::collections::HashMap;

use super::binding::{CommandBinding, Keybinding};
use super::context::ContextKeys;
use super::types::Keystroke;
use super::when::WhenClause;

/// How a user override treats the keybinding
#[derive(Debug, Clone, PartialEq)]
pub enum KeyOverride {
    /// Keep whatever is currently effective
    Inherit,
    /// Remove the binding entirely
    Unbind,
    /// Replace the default keybinding
    Set(Keybinding),
}

/// A user customization for one command, as read from an override file
#[derive(Debug, Clone, PartialEq)]
pub struct BindingOverride {
    pub command_id: String,
    pub keys: KeyOverride,
    pub when: Option<WhenClause>,
}

#[derive(Debug, Clone, Default)]
pub struct BindingRegistry {
    /// All registered bindings in registration order
    bindings: Vec<CommandBinding>,
    /// command id → index into `bindings`
    by_id: HashMap<String, usize>,
    /// First effective keystroke → indices into `bindings`, ascending
    by_first_stroke: HashMap<Keystroke, Vec<usize>>,
}

impl BindingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the given bindings, in order
    pub fn with_bindings(bindings: Vec<CommandBinding>) -> Self {
        let mut registry = Self::new();
        for binding in bindings {
            registry.register(binding);
        }
        registry
    }

    /// Register a command, or update it in place if the id is already known
    pub fn register(&mut self, binding: CommandBinding) {
        if let Some(&idx) = self.by_id.get(&binding.command_id) {
            tracing::debug!(command = %binding.command_id, "Updating binding");
            self.bindings[idx] = binding;
        } else {
            self.by_id.insert(binding.command_id.clone(), self.bindings.len());
            self.bindings.push(binding);
        }
        self.rebuild_index();
    }

    /// Remove a command; returns the removed binding
    pub fn unregister(&mut self, command_id: &str) -> Option<CommandBinding> {
        let idx = self.by_id.remove(command_id)?;
        let removed = self.bindings.remove(idx);
        self.by_id = self
            .bindings
            .iter()
            .enumerate()
            .map(|(i, b)| (b.command_id.clone(), i))
            .collect();
        self.rebuild_index();
        Some(removed)
    }

    fn rebuild_index(&mut self) {
        self.by_first_stroke.clear();
        for (idx, binding) in self.bindings.iter().enumerate() {
            if let Some(keybinding) = binding.effective_keybinding() {
                self.by_first_stroke
                    .entry(keybinding.first().clone())
                    .or_default()
                    .push(idx);
            }
        }
    }

    /// Apply a mutation to one binding and keep the index current
    fn modify(&mut self, command_id: &str, f: impl FnOnce(&mut CommandBinding)) -> bool {
        let Some(&idx) = self.by_id.get(command_id) else {
            tracing::warn!(command = command_id, "No such command in registry");
            return false;
        };
        f(&mut self.bindings[idx]);
        self.rebuild_index();
        true
    }

    pub fn set_custom_keybinding(
        &mut self,
        command_id: &str,
        keybinding: Option<Keybinding>,
    ) -> bool {
        self.modify(command_id, |b| {
            b.custom_keybinding = keybinding;
            b.unbound = false;
        })
    }

    pub fn set_custom_when(&mut self, command_id: &str, when: Option<WhenClause>) -> bool {
        self.modify(command_id, |b| b.custom_when = when)
    }

    /// Remove every keybinding from a command without forgetting the command
    pub fn unbind(&mut self, command_id: &str) -> bool {
        self.modify(command_id, |b| {
            b.custom_keybinding = None;
            b.unbound = true;
        })
    }

    pub fn reset_to_default(&mut self, command_id: &str) -> bool {
        self.modify(command_id, CommandBinding::reset_to_default)
    }

    /// Apply one user override; unknown command ids are ignored with a warning
    pub fn apply_override(&mut self, over: &BindingOverride) -> bool {
        self.modify(&over.command_id, |b| {
            match &over.keys {
                KeyOverride::Inherit => {}
                KeyOverride::Unbind => {
                    b.custom_keybinding = None;
                    b.unbound = true;
                }
                KeyOverride::Set(keybinding) => {
                    b.custom_keybinding = Some(keybinding.clone());
                    b.unbound = false;
                }
            }
            if let Some(when) = &over.when {
                b.custom_when = Some(when.clone());
            }
        })
    }

    /// Apply a list of overrides in order; returns how many applied
    pub fn apply_overrides(&mut self, overrides: &[BindingOverride]) -> usize {
        overrides
            .iter()
            .filter(|over| self.apply_override(over))
            .count()
    }

    pub fn get(&self, command_id: &str) -> Option<&CommandBinding> {
        self.by_id.get(command_id).map(|&idx| &self.bindings[idx])
    }

    pub fn contains(&self, command_id: &str) -> bool {
        self.by_id.contains_key(command_id)
    }

    /// All bindings in registration order
    pub fn iter(&self) -> impl Iterator<Item = &CommandBinding> {
        self.bindings.iter()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Distinct categories in first-seen order
    pub fn categories(&self) -> Vec<&str> {
        let mut seen: Vec<&str> = Vec::new();
        for binding in &self.bindings {
            if !seen.contains(&binding.category.as_str()) {
                seen.push(&binding.category);
            }
        }
        seen
    }

    pub fn by_category<'a>(
        &'a self,
        category: &'a str,
    ) -> impl Iterator<Item = &'a CommandBinding> {
        self.bindings.iter().filter(move |b| b.category == category)
    }

    /// Bindings whose effective keybinding starts with `sequence[0]`
    fn candidates(&self, sequence: &[Keystroke]) -> impl Iterator<Item = &CommandBinding> {
        sequence
            .first()
            .and_then(|first| self.by_first_stroke.get(first))
            .into_iter()
            .flatten()
            .map(|&idx| &self.bindings[idx])
    }

    /// Enabled bindings whose effective keybinding is exactly `sequence`
    pub fn exact_matches<'a>(
        &'a self,
        sequence: &'a [Keystroke],
        ctx: &'a ContextKeys,
    ) -> impl Iterator<Item = &'a CommandBinding> {
        self.candidates(sequence).filter(move |b| {
            b.effective_keybinding()
                .is_some_and(|kb| kb.matches_exactly(sequence))
                && b.is_enabled(ctx)
        })
    }

    /// Enabled bindings whose effective keybinding strictly extends `prefix`
    pub fn prefix_matches<'a>(
        &'a self,
        prefix: &'a [Keystroke],
        ctx: &'a ContextKeys,
    ) -> impl Iterator<Item = &'a CommandBinding> {
        self.candidates(prefix).filter(move |b| {
            b.effective_keybinding().is_some_and(|kb| kb.extends(prefix)) && b.is_enabled(ctx)
        })
    }

    /// First enabled exact match, by registration order
    ///
    /// The result borrows only the registry, not `sequence` or `ctx`.
    pub fn first_exact(
        &self,
        sequence: &[Keystroke],
        ctx: &ContextKeys,
    ) -> Option<&CommandBinding> {
        self.candidates(sequence).find(|b| {
            b.effective_keybinding()
                .is_some_and(|kb| kb.matches_exactly(sequence))
                && b.is_enabled(ctx)
        })
    }

    pub fn has_prefix_match(&self, prefix: &[Keystroke], ctx: &ContextKeys) -> bool {
        self.prefix_matches(prefix, ctx).next().is_some()
    }

    /// Bindings that would collide with `keybinding`, ignoring when-clauses
    ///
    /// A collision is an identical sequence, or one sequence being a prefix
    /// of the other (the shorter one then starts a chord instead of firing).
    pub fn conflicts<'a>(
        &'a self,
        keybinding: &'a Keybinding,
    ) -> impl Iterator<Item = &'a CommandBinding> {
        self.candidates(keybinding.keystrokes()).filter(move |b| {
            b.effective_keybinding().is_some_and(|kb| {
                kb.starts_with(keybinding.keystrokes()) || keybinding.starts_with(kb.keystrokes())
            })
        })
    }

    /// The effective keybinding for a command
    pub fn binding_for(&self, command_id: &str) -> Option<&Keybinding> {
        self.get(command_id)?.effective_keybinding()
    }

    /// Display string for a command's effective keybinding
    pub fn display_for(&self, command_id: &str) -> Option<String> {
        self.binding_for(command_id).map(|kb| kb.display_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keymap::types::Modifiers;

    fn ctrl(c: char) -> Keystroke {
        Keystroke::char_with_mods(c, Modifiers::CTRL)
    }

    fn chord(a: char, b: char) -> Keybinding {
        Keybinding::chord(vec![ctrl(a), ctrl(b)]).unwrap()
    }

    fn ids<'a>(it: impl Iterator<Item = &'a CommandBinding>) -> Vec<&'a str> {
        it.map(|b| b.command_id.as_str()).collect()
    }

    fn sample() -> BindingRegistry {
        BindingRegistry::with_bindings(vec![
            CommandBinding::new("save", "Save", "File").keys(ctrl('s')),
            CommandBinding::new("openKeybindings", "Keyboard Shortcuts", "Preferences")
                .keys(chord('k', 's')),
            CommandBinding::new("zenMode", "Zen Mode", "View").keys(chord('k', 'z')),
            CommandBinding::new("copy", "Copy", "Edit")
                .keys(ctrl('c'))
                .when("editorTextFocus"),
            CommandBinding::new("closeAll", "Close All", "File"),
        ])
    }

    #[test]
    fn test_exact_lookup() {
        let registry = sample();
        let ctx = ContextKeys::new();
        assert_eq!(ids(registry.exact_matches(&[ctrl('s')], &ctx)), vec!["save"]);
        assert_eq!(
            ids(registry.exact_matches(&[ctrl('k'), ctrl('s')], &ctx)),
            vec!["openKeybindings"]
        );
        assert!(registry.first_exact(&[ctrl('k')], &ctx).is_none());
    }

    #[test]
    fn test_first_exact_outlives_sequence_and_context() {
        let registry = sample();
        let found = {
            let sequence = vec![ctrl('c')];
            let ctx = ContextKeys::new().with("editorTextFocus", true);
            registry.first_exact(&sequence, &ctx)
        };
        assert_eq!(found.map(|b| b.command_id.as_str()), Some("copy"));
    }

    #[test]
    fn test_prefix_lookup_is_strict() {
        let registry = sample();
        let ctx = ContextKeys::new();
        assert_eq!(
            ids(registry.prefix_matches(&[ctrl('k')], &ctx)),
            vec!["openKeybindings", "zenMode"]
        );
        assert!(!registry.has_prefix_match(&[ctrl('k'), ctrl('s')], &ctx));
        assert!(!registry.has_prefix_match(&[ctrl('s')], &ctx));
    }

    #[test]
    fn test_when_filter() {
        let registry = sample();
        let unfocused = ContextKeys::new();
        let focused = ContextKeys::new().with("editorTextFocus", true);

        assert!(registry.first_exact(&[ctrl('c')], &unfocused).is_none());
        assert_eq!(
            registry.first_exact(&[ctrl('c')], &focused).map(|b| b.command_id.as_str()),
            Some("copy")
        );
    }

    #[test]
    fn test_unbound_never_matches() {
        let mut registry = sample();
        let ctx = ContextKeys::new();
        assert!(registry.unbind("save"));
        assert!(registry.first_exact(&[ctrl('s')], &ctx).is_none());
        assert!(registry.get("save").is_some());
        assert_eq!(registry.binding_for("closeAll"), None);
    }

    #[test]
    fn test_duplicates_resolve_by_registration_order() {
        let registry = BindingRegistry::with_bindings(vec![
            CommandBinding::new("first", "First", "Misc").keys(ctrl('d')),
            CommandBinding::new("second", "Second", "Misc").keys(ctrl('d')),
        ]);
        let ctx = ContextKeys::new();
        assert_eq!(ids(registry.exact_matches(&[ctrl('d')], &ctx)), vec!["first", "second"]);
        assert_eq!(
            registry.first_exact(&[ctrl('d')], &ctx).map(|b| b.command_id.as_str()),
            Some("first")
        );
    }

    #[test]
    fn test_reregister_keeps_position() {
        let mut registry = BindingRegistry::with_bindings(vec![
            CommandBinding::new("first", "First", "Misc").keys(ctrl('d')),
            CommandBinding::new("second", "Second", "Misc").keys(ctrl('d')),
        ]);
        registry.register(CommandBinding::new("first", "First (renamed)", "Misc").keys(ctrl('d')));

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.get("first").unwrap().label, "First (renamed)");
        let ctx = ContextKeys::new();
        assert_eq!(
            registry.first_exact(&[ctrl('d')], &ctx).map(|b| b.command_id.as_str()),
            Some("first")
        );
    }

    #[test]
    fn test_custom_keybinding_moves_lookup() {
        let mut registry = sample();
        let ctx = ContextKeys::new();
        assert!(registry.set_custom_keybinding("save", Some(Keybinding::new(ctrl('w')))));

        assert!(registry.first_exact(&[ctrl('s')], &ctx).is_none());
        assert_eq!(
            registry.first_exact(&[ctrl('w')], &ctx).map(|b| b.command_id.as_str()),
            Some("save")
        );

        assert!(registry.reset_to_default("save"));
        assert!(registry.first_exact(&[ctrl('s')], &ctx).is_some());
    }

    #[test]
    fn test_apply_override() {
        let mut registry = sample();
        let applied = registry.apply_overrides(&[
            BindingOverride {
                command_id: "zenMode".to_string(),
                keys: KeyOverride::Unbind,
                when: None,
            },
            BindingOverride {
                command_id: "copy".to_string(),
                keys: KeyOverride::Inherit,
                when: Some(WhenClause::parse("terminalFocus")),
            },
            BindingOverride {
                command_id: "doesNotExist".to_string(),
                keys: KeyOverride::Unbind,
                when: None,
            },
        ]);
        assert_eq!(applied, 2);

        let ctx = ContextKeys::new().with("terminalFocus", true);
        assert_eq!(
            ids(registry.prefix_matches(&[ctrl('k')], &ctx)),
            vec!["openKeybindings"]
        );
        assert!(registry.first_exact(&[ctrl('c')], &ctx).is_some());
    }

    #[test]
    fn test_unregister_reindexes() {
        let mut registry = sample();
        assert!(registry.unregister("save").is_some());
        assert!(registry.unregister("save").is_none());
        assert!(!registry.contains("save"));

        let ctx = ContextKeys::new();
        assert_eq!(
            ids(registry.exact_matches(&[ctrl('k'), ctrl('z')], &ctx)),
            vec!["zenMode"]
        );
    }

    #[test]
    fn test_conflicts() {
        let registry = sample();
        let ctrl_k = Keybinding::new(ctrl('k'));
        assert_eq!(
            ids(registry.conflicts(&ctrl_k)),
            vec!["openKeybindings", "zenMode"]
        );
        assert_eq!(ids(registry.conflicts(&chord('k', 'z'))), vec!["zenMode"]);
        assert!(registry.conflicts(&chord('s', 'x')).next().is_some());
        assert!(registry.conflicts(&Keybinding::new(ctrl('q'))).next().is_none());
    }

    #[test]
    fn test_categories() {
        let registry = sample();
        assert_eq!(registry.categories(), vec!["File", "Preferences", "View", "Edit"]);
        assert_eq!(ids(registry.by_category("File")), vec!["save", "closeAll"]);
    }

    #[test]
    fn test_display_for() {
        let registry = sample();
        assert_eq!(registry.display_for("openKeybindings").as_deref(), Some("Ctrl+K Ctrl+S"));
        assert_eq!(registry.display_for("missing"), None);
    }
}
