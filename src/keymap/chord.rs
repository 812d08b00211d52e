//! Chord state machine
//!
//! Tracks in-progress multi-key sequences against a [`BindingRegistry`].
//!
//! ```text
//!            prefix match                     exact match
//!   ┌──────┐ ───────────▶ ┌─────────────────┐ ───────────▶ fire, Idle
//!   │ Idle │              │ Pending(keys)   │
//!   └──────┘ ◀─────────── └─────────────────┘ ──┐ longer prefix:
//!       ▲      timeout /         ▲              │ stay pending,
//!       │      cancel /          └──────────────┘ re-arm timer
//!       │      no match (key swallowed)
//! ```
//!
//! Time is passed in explicitly so the machine is deterministic under test.
//! The pending-chord timeout is a [`TimerToken`] plus a deadline owned by the
//! machine: arming a new timer always retires the previous token, so a stale
//! timer can never cancel a newer chord. Hosts either poll
//! [`ChordStateMachine::expire_if_due`] when their event loop wakes at
//! [`ChordStateMachine::next_deadline`], or schedule a callback and hand the
//! token back through [`ChordStateMachine::on_timer_fired`].

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use super::context::ContextKeys;
use super::registry::BindingRegistry;
use super::types::Keystroke;

/// Default window for the next keystroke of a chord.
pub const DEFAULT_CHORD_TIMEOUT_MS: u64 = 750;

/// Minimum allowed chord timeout.
pub const MIN_CHORD_TIMEOUT_MS: u64 = 100;

/// Maximum allowed chord timeout.
pub const MAX_CHORD_TIMEOUT_MS: u64 = 10_000;

/// What to do with a keystroke that breaks a pending chord
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChordBreakPolicy {
    /// Cancel the chord and consume the key
    #[default]
    Swallow,
    /// Cancel the chord, then look the key up again as if nothing was pending
    Reevaluate,
}

/// Identifies one armed timer. Tokens from cancelled timers are stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerToken(u64);

/// The single chord timer, owned by the state machine
#[derive(Debug, Default)]
struct ChordTimer {
    generation: u64,
    armed: Option<(TimerToken, Instant)>,
}

impl ChordTimer {
    /// Cancel any live timer and arm a new one
    fn arm(&mut self, deadline: Instant) -> TimerToken {
        self.generation += 1;
        let token = TimerToken(self.generation);
        self.armed = Some((token, deadline));
        token
    }

    fn cancel(&mut self) {
        self.armed = None;
    }

    fn is_live(&self, token: TimerToken) -> bool {
        self.armed.is_some_and(|(live, _)| live == token)
    }

    fn deadline(&self) -> Option<Instant> {
        self.armed.map(|(_, deadline)| deadline)
    }

    fn token(&self) -> Option<TimerToken> {
        self.armed.map(|(token, _)| token)
    }
}

/// Chord state: idle, or waiting for the next keystroke of a sequence
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ChordState {
    #[default]
    Idle,
    Pending { keystrokes: Vec<Keystroke> },
}

/// Outcome of feeding one keystroke to the machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChordStep {
    /// The machine did not consume the key
    Unhandled,
    /// The key started or continued a chord
    Pending,
    /// The key completed a binding
    Fire(String),
    /// The key broke a pending chord and was consumed
    Swallowed,
}

#[derive(Debug)]
pub struct ChordStateMachine {
    state: ChordState,
    timer: ChordTimer,
    timeout: Duration,
    break_policy: ChordBreakPolicy,
    recording: bool,
}

impl ChordStateMachine {
    pub fn new(timeout: Duration) -> Self {
        Self {
            state: ChordState::Idle,
            timer: ChordTimer::default(),
            timeout: clamp_timeout(timeout),
            break_policy: ChordBreakPolicy::default(),
            recording: false,
        }
    }

    pub fn with_break_policy(mut self, policy: ChordBreakPolicy) -> Self {
        self.break_policy = policy;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = clamp_timeout(timeout);
    }

    pub fn break_policy(&self) -> ChordBreakPolicy {
        self.break_policy
    }

    pub fn set_break_policy(&mut self, policy: ChordBreakPolicy) {
        self.break_policy = policy;
    }

    /// While recording, the machine ignores every keystroke so a
    /// shortcut-capture UI sees them first. Starting to record drops any
    /// pending chord.
    pub fn set_recording(&mut self, recording: bool) {
        if recording {
            self.cancel();
        }
        self.recording = recording;
    }

    pub fn is_recording(&self) -> bool {
        self.recording
    }

    /// Feed one keystroke
    pub fn handle(
        &mut self,
        keystroke: &Keystroke,
        registry: &BindingRegistry,
        ctx: &ContextKeys,
        now: Instant,
    ) -> ChordStep {
        if self.recording {
            return ChordStep::Unhandled;
        }

        // A key arriving at or after the deadline finds the chord already
        // expired, even if the host has not delivered the timeout yet.
        self.expire_if_due(now);

        match std::mem::take(&mut self.state) {
            ChordState::Idle => self.handle_idle(keystroke, registry, ctx, now),
            ChordState::Pending { keystrokes } => {
                self.handle_pending(keystrokes, keystroke, registry, ctx, now)
            }
        }
    }

    fn handle_idle(
        &mut self,
        keystroke: &Keystroke,
        registry: &BindingRegistry,
        ctx: &ContextKeys,
        now: Instant,
    ) -> ChordStep {
        let sequence = std::slice::from_ref(keystroke);

        // A key that both completes a single binding and starts a chord
        // starts the chord.
        if registry.has_prefix_match(sequence, ctx) {
            self.enter_pending(vec![keystroke.clone()], now);
            return ChordStep::Pending;
        }

        match registry.first_exact(sequence, ctx) {
            Some(binding) => {
                tracing::debug!(
                    key = %keystroke,
                    command = %binding.command_id,
                    "Keystroke resolved"
                );
                ChordStep::Fire(binding.command_id.clone())
            }
            None => ChordStep::Unhandled,
        }
    }

    fn handle_pending(
        &mut self,
        mut keystrokes: Vec<Keystroke>,
        keystroke: &Keystroke,
        registry: &BindingRegistry,
        ctx: &ContextKeys,
        now: Instant,
    ) -> ChordStep {
        self.timer.cancel();
        keystrokes.push(keystroke.clone());

        if let Some(binding) = registry.first_exact(&keystrokes, ctx) {
            tracing::debug!(
                chord = %display_sequence(&keystrokes),
                command = %binding.command_id,
                "Chord completed"
            );
            return ChordStep::Fire(binding.command_id.clone());
        }

        if registry.has_prefix_match(&keystrokes, ctx) {
            self.enter_pending(keystrokes, now);
            return ChordStep::Pending;
        }

        tracing::debug!(chord = %display_sequence(&keystrokes), "Chord broken");
        match self.break_policy {
            ChordBreakPolicy::Swallow => ChordStep::Swallowed,
            ChordBreakPolicy::Reevaluate => self.handle_idle(keystroke, registry, ctx, now),
        }
    }

    fn enter_pending(&mut self, keystrokes: Vec<Keystroke>, now: Instant) {
        let token = self.timer.arm(now + self.timeout);
        tracing::debug!(
            chord = %display_sequence(&keystrokes),
            timer = token.0,
            "Chord pending"
        );
        self.state = ChordState::Pending { keystrokes };
    }

    /// Return to Idle if the pending chord's deadline has passed
    ///
    /// Returns true if a chord was cancelled.
    pub fn expire_if_due(&mut self, now: Instant) -> bool {
        match self.timer.deadline() {
            Some(deadline) if now >= deadline => {
                tracing::debug!("Chord timed out");
                self.cancel();
                true
            }
            _ => false,
        }
    }

    /// Deliver a scheduled timer callback; stale tokens are ignored
    ///
    /// Returns true if the callback cancelled the pending chord.
    pub fn on_timer_fired(&mut self, token: TimerToken) -> bool {
        if !self.timer.is_live(token) {
            tracing::trace!(timer = token.0, "Ignoring stale chord timer");
            return false;
        }
        tracing::debug!(timer = token.0, "Chord timer fired");
        self.cancel();
        true
    }

    /// Clear any pending chord and its timer. Idempotent.
    pub fn cancel(&mut self) {
        self.timer.cancel();
        self.state = ChordState::Idle;
    }

    pub fn state(&self) -> &ChordState {
        &self.state
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, ChordState::Pending { .. })
    }

    pub fn pending_keystrokes(&self) -> &[Keystroke] {
        match &self.state {
            ChordState::Idle => &[],
            ChordState::Pending { keystrokes } => keystrokes,
        }
    }

    /// Pending keystrokes for the status bar, e.g. `Ctrl+K`
    pub fn indicator(&self) -> Option<String> {
        match &self.state {
            ChordState::Idle => None,
            ChordState::Pending { keystrokes } => Some(display_sequence(keystrokes)),
        }
    }

    /// When the host should wake up to expire the pending chord
    pub fn next_deadline(&self) -> Option<Instant> {
        self.timer.deadline()
    }

    /// Token of the live timer, for hosts that schedule callbacks
    pub fn timer_token(&self) -> Option<TimerToken> {
        self.timer.token()
    }
}

impl Default for ChordStateMachine {
    fn default() -> Self {
        Self::new(Duration::from_millis(DEFAULT_CHORD_TIMEOUT_MS))
    }
}

fn clamp_timeout(timeout: Duration) -> Duration {
    timeout.clamp(
        Duration::from_millis(MIN_CHORD_TIMEOUT_MS),
        Duration::from_millis(MAX_CHORD_TIMEOUT_MS),
    )
}

fn display_sequence(keystrokes: &[Keystroke]) -> String {
    keystrokes
        .iter()
        .map(Keystroke::display_string)
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keymap::binding::{CommandBinding, Keybinding};
    use crate::keymap::types::Modifiers;

    fn ctrl(c: char) -> Keystroke {
        Keystroke::char_with_mods(c, Modifiers::CTRL)
    }

    fn registry() -> BindingRegistry {
        BindingRegistry::with_bindings(vec![
            CommandBinding::new("save", "Save", "File").keys(ctrl('s')),
            CommandBinding::new("openKeybindings", "Keyboard Shortcuts", "Preferences")
                .keys(Keybinding::chord(vec![ctrl('k'), ctrl('s')]).unwrap()),
            CommandBinding::new("foldAll", "Fold All", "View")
                .keys(Keybinding::chord(vec![ctrl('k'), ctrl('j'), ctrl('0')]).unwrap()),
        ])
    }

    #[test]
    fn test_idle_single_key() {
        let mut machine = ChordStateMachine::default();
        let registry = registry();
        let ctx = ContextKeys::new();
        let t = Instant::now();

        assert_eq!(
            machine.handle(&ctrl('s'), &registry, &ctx, t),
            ChordStep::Fire("save".to_string())
        );
        assert!(!machine.is_active());
        assert_eq!(machine.handle(&ctrl('q'), &registry, &ctx, t), ChordStep::Unhandled);
    }

    #[test]
    fn test_chord_pending_then_fire() {
        let mut machine = ChordStateMachine::default();
        let registry = registry();
        let ctx = ContextKeys::new();
        let t = Instant::now();

        assert_eq!(machine.handle(&ctrl('k'), &registry, &ctx, t), ChordStep::Pending);
        assert!(machine.is_active());
        assert_eq!(machine.indicator().as_deref(), Some("Ctrl+K"));
        assert!(machine.timer_token().is_some());

        let step = machine.handle(&ctrl('s'), &registry, &ctx, t + Duration::from_millis(100));
        assert_eq!(step, ChordStep::Fire("openKeybindings".to_string()));
        assert!(!machine.is_active());
        assert!(machine.next_deadline().is_none());
    }

    #[test]
    fn test_three_key_chord_rearms_timer() {
        let mut machine = ChordStateMachine::default();
        let registry = registry();
        let ctx = ContextKeys::new();
        let t = Instant::now();

        machine.handle(&ctrl('k'), &registry, &ctx, t);
        let first_deadline = machine.next_deadline().unwrap();

        let t2 = t + Duration::from_millis(500);
        assert_eq!(machine.handle(&ctrl('j'), &registry, &ctx, t2), ChordStep::Pending);
        assert_eq!(machine.indicator().as_deref(), Some("Ctrl+K Ctrl+J"));
        let second_deadline = machine.next_deadline().unwrap();
        assert!(second_deadline > first_deadline);

        // Past the first deadline but within the re-armed one
        let t3 = t + Duration::from_millis(1000);
        assert_eq!(
            machine.handle(&ctrl('0'), &registry, &ctx, t3),
            ChordStep::Fire("foldAll".to_string())
        );
    }

    #[test]
    fn test_breaking_key_is_swallowed() {
        let mut machine = ChordStateMachine::default();
        let registry = registry();
        let ctx = ContextKeys::new();
        let t = Instant::now();

        machine.handle(&ctrl('k'), &registry, &ctx, t);
        assert_eq!(machine.handle(&ctrl('q'), &registry, &ctx, t), ChordStep::Swallowed);
        assert!(!machine.is_active());
        assert!(machine.timer_token().is_none());

        // Even a key with its own binding is swallowed when it breaks a chord
        let registry = BindingRegistry::with_bindings(vec![
            CommandBinding::new("save", "Save", "File").keys(ctrl('s')),
            CommandBinding::new("zen", "Zen", "View")
                .keys(Keybinding::chord(vec![ctrl('k'), ctrl('z')]).unwrap()),
        ]);
        machine.handle(&ctrl('k'), &registry, &ctx, t);
        assert_eq!(machine.handle(&ctrl('s'), &registry, &ctx, t), ChordStep::Swallowed);
        assert_eq!(
            machine.handle(&ctrl('s'), &registry, &ctx, t),
            ChordStep::Fire("save".to_string())
        );
    }

    #[test]
    fn test_reevaluate_policy_replays_breaking_key() {
        let mut machine =
            ChordStateMachine::default().with_break_policy(ChordBreakPolicy::Reevaluate);
        let registry = BindingRegistry::with_bindings(vec![
            CommandBinding::new("save", "Save", "File").keys(ctrl('s')),
            CommandBinding::new("zen", "Zen", "View")
                .keys(Keybinding::chord(vec![ctrl('k'), ctrl('z')]).unwrap()),
        ]);
        let ctx = ContextKeys::new();
        let t = Instant::now();

        machine.handle(&ctrl('k'), &registry, &ctx, t);
        assert_eq!(
            machine.handle(&ctrl('s'), &registry, &ctx, t),
            ChordStep::Fire("save".to_string())
        );

        machine.handle(&ctrl('k'), &registry, &ctx, t);
        assert_eq!(machine.handle(&ctrl('q'), &registry, &ctx, t), ChordStep::Unhandled);
        assert!(!machine.is_active());
    }

    #[test]
    fn test_poll_timeout() {
        let mut machine = ChordStateMachine::default();
        let registry = registry();
        let ctx = ContextKeys::new();
        let t = Instant::now();

        machine.handle(&ctrl('k'), &registry, &ctx, t);
        assert!(!machine.expire_if_due(t + Duration::from_millis(DEFAULT_CHORD_TIMEOUT_MS - 1)));
        assert!(machine.is_active());
        assert!(machine.expire_if_due(t + Duration::from_millis(DEFAULT_CHORD_TIMEOUT_MS)));
        assert!(!machine.is_active());
        assert!(!machine.expire_if_due(t + Duration::from_secs(60)));
    }

    #[test]
    fn test_stale_timer_token_is_ignored() {
        let mut machine = ChordStateMachine::default();
        let registry = registry();
        let ctx = ContextKeys::new();
        let t = Instant::now();

        machine.handle(&ctrl('k'), &registry, &ctx, t);
        let old_token = machine.timer_token().unwrap();
        machine.cancel();

        machine.handle(&ctrl('k'), &registry, &ctx, t);
        let new_token = machine.timer_token().unwrap();
        assert_ne!(old_token, new_token);

        assert!(!machine.on_timer_fired(old_token));
        assert!(machine.is_active());

        assert!(machine.on_timer_fired(new_token));
        assert!(!machine.is_active());
        assert!(!machine.on_timer_fired(new_token));
    }

    #[test]
    fn test_recording_mode_bypasses_machine() {
        let mut machine = ChordStateMachine::default();
        let registry = registry();
        let ctx = ContextKeys::new();
        let t = Instant::now();

        machine.handle(&ctrl('k'), &registry, &ctx, t);
        machine.set_recording(true);
        assert!(!machine.is_active());
        assert_eq!(machine.handle(&ctrl('s'), &registry, &ctx, t), ChordStep::Unhandled);

        machine.set_recording(false);
        assert_eq!(
            machine.handle(&ctrl('s'), &registry, &ctx, t),
            ChordStep::Fire("save".to_string())
        );
    }

    #[test]
    fn test_cancel_is_idempotent() {
        let mut machine = ChordStateMachine::default();
        machine.cancel();
        machine.cancel();
        assert_eq!(machine.state(), &ChordState::Idle);
        assert!(machine.pending_keystrokes().is_empty());
        assert!(machine.indicator().is_none());
    }

    #[test]
    fn test_timeout_is_clamped() {
        let machine = ChordStateMachine::new(Duration::from_millis(1));
        assert_eq!(machine.timeout(), Duration::from_millis(MIN_CHORD_TIMEOUT_MS));

        let machine = ChordStateMachine::new(Duration::from_secs(3600));
        assert_eq!(machine.timeout(), Duration::from_millis(MAX_CHORD_TIMEOUT_MS));
    }
}
