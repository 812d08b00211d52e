//! Resolution facade: keystroke + context in, command id out
//!
//! [`KeybindingResolver`] owns the binding registry and the chord state
//! machine. The host feeds it every key-down together with a snapshot of its
//! context keys and dispatches whatever command id comes back. Nothing here
//! executes commands, and nothing here fails: bad configuration shows up as
//! "not handled" rather than as an error.

use std::time::{Duration, Instant};

use serde::Serialize;

use super::binding::{format_keybinding, Keybinding};
use super::chord::{ChordBreakPolicy, ChordStateMachine, ChordStep, TimerToken};
use super::context::ContextKeys;
use super::registry::BindingRegistry;
use super::types::Keystroke;

/// Result of handling one keystroke
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Resolution {
    /// The keystroke was consumed and must not reach text input
    pub handled: bool,
    /// Command to dispatch, if the keystroke completed a binding
    pub command_id: Option<String>,
}

impl Resolution {
    pub fn unhandled() -> Self {
        Self {
            handled: false,
            command_id: None,
        }
    }

    /// Consumed without a command (chord pending or broken)
    pub fn consumed() -> Self {
        Self {
            handled: true,
            command_id: None,
        }
    }

    pub fn command(command_id: impl Into<String>) -> Self {
        Self {
            handled: true,
            command_id: Some(command_id.into()),
        }
    }
}

impl From<ChordStep> for Resolution {
    fn from(step: ChordStep) -> Self {
        match step {
            ChordStep::Unhandled => Resolution::unhandled(),
            ChordStep::Pending | ChordStep::Swallowed => Resolution::consumed(),
            ChordStep::Fire(command_id) => Resolution::command(command_id),
        }
    }
}

#[derive(Debug)]
pub struct KeybindingResolver {
    registry: BindingRegistry,
    chords: ChordStateMachine,
}

impl KeybindingResolver {
    pub fn new(registry: BindingRegistry) -> Self {
        Self {
            registry,
            chords: ChordStateMachine::default(),
        }
    }

    pub fn with_chord_timeout(mut self, timeout: Duration) -> Self {
        self.chords.set_timeout(timeout);
        self
    }

    pub fn with_break_policy(mut self, policy: ChordBreakPolicy) -> Self {
        self.chords.set_break_policy(policy);
        self
    }

    /// Build a resolver configured from the engine config
    pub fn from_config(registry: BindingRegistry, config: &crate::config::EngineConfig) -> Self {
        Self::new(registry)
            .with_chord_timeout(config.chord_timeout())
            .with_break_policy(config.chord_break)
    }

    /// Handle a keystroke using the wall clock
    pub fn handle_keystroke(&mut self, keystroke: &Keystroke, ctx: &ContextKeys) -> Resolution {
        self.handle_keystroke_at(keystroke, ctx, Instant::now())
    }

    /// Handle a keystroke at an explicit point in time
    pub fn handle_keystroke_at(
        &mut self,
        keystroke: &Keystroke,
        ctx: &ContextKeys,
        now: Instant,
    ) -> Resolution {
        self.chords
            .handle(keystroke, &self.registry, ctx, now)
            .into()
    }

    /// Expire a pending chord whose deadline has passed
    pub fn tick(&mut self, now: Instant) -> bool {
        self.chords.expire_if_due(now)
    }

    pub fn on_timer_fired(&mut self, token: TimerToken) -> bool {
        self.chords.on_timer_fired(token)
    }

    /// Escape, focus loss, window deactivation, ...
    pub fn cancel_chord(&mut self) {
        self.chords.cancel();
    }

    pub fn set_recording(&mut self, recording: bool) {
        self.chords.set_recording(recording);
    }

    pub fn is_recording(&self) -> bool {
        self.chords.is_recording()
    }

    pub fn is_chord_active(&self) -> bool {
        self.chords.is_active()
    }

    pub fn chord_indicator(&self) -> Option<String> {
        self.chords.indicator()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.chords.next_deadline()
    }

    pub fn timer_token(&self) -> Option<TimerToken> {
        self.chords.timer_token()
    }

    pub fn chords(&self) -> &ChordStateMachine {
        &self.chords
    }

    pub fn registry(&self) -> &BindingRegistry {
        &self.registry
    }

    /// Mutable registry access; any pending chord is cancelled first
    pub fn registry_mut(&mut self) -> &mut BindingRegistry {
        self.chords.cancel();
        &mut self.registry
    }

    pub fn format_keybinding(&self, keybinding: &Keybinding) -> String {
        format_keybinding(keybinding)
    }

    pub fn display_for(&self, command_id: &str) -> Option<String> {
        self.registry.display_for(command_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keymap::binding::CommandBinding;
    use crate::keymap::types::Modifiers;

    fn ctrl(c: char) -> Keystroke {
        Keystroke::char_with_mods(c, Modifiers::CTRL)
    }

    fn resolver() -> KeybindingResolver {
        KeybindingResolver::new(BindingRegistry::with_bindings(vec![
            CommandBinding::new("save", "Save", "File").keys(ctrl('s')),
            CommandBinding::new("openKeybindings", "Keyboard Shortcuts", "Preferences")
                .keys(Keybinding::chord(vec![ctrl('k'), ctrl('s')]).unwrap()),
        ]))
    }

    #[test]
    fn test_resolution_from_steps() {
        assert_eq!(Resolution::from(ChordStep::Unhandled), Resolution::unhandled());
        assert_eq!(Resolution::from(ChordStep::Pending), Resolution::consumed());
        assert_eq!(Resolution::from(ChordStep::Swallowed), Resolution::consumed());
        assert_eq!(
            Resolution::from(ChordStep::Fire("x".to_string())),
            Resolution::command("x")
        );
    }

    #[test]
    fn test_handle_keystroke_wall_clock() {
        let mut resolver = resolver();
        let ctx = ContextKeys::new();
        assert_eq!(resolver.handle_keystroke(&ctrl('s'), &ctx), Resolution::command("save"));
    }

    #[test]
    fn test_registry_mut_cancels_chord() {
        let mut resolver = resolver();
        let ctx = ContextKeys::new();
        let t = Instant::now();

        resolver.handle_keystroke_at(&ctrl('k'), &ctx, t);
        assert!(resolver.is_chord_active());

        resolver.registry_mut().unbind("openKeybindings");
        assert!(!resolver.is_chord_active());
        assert_eq!(resolver.handle_keystroke_at(&ctrl('k'), &ctx, t), Resolution::unhandled());
    }

    #[test]
    fn test_serialize_resolution() {
        let json = serde_json::to_string(&Resolution::command("save")).unwrap();
        assert_eq!(json, r#"{"handled":true,"commandId":"save"}"#);
        let json = serde_json::to_string(&Resolution::consumed()).unwrap();
        assert_eq!(json, r#"{"handled":true,"commandId":null}"#);
    }
}
