//! Command-line interface for the `chordmap` binary
//!
//! Supports:
//! - Resolving keystroke sequences against the effective keymap
//! - Evaluating when-clauses against a context
//! - Listing the effective keymap
//! - Checking keymap and override files

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use clap::{Args, Parser, Subcommand};
use serde::Serialize;

use crate::keymap::{parse_keybinding, ContextKeys, KeybindingResolver, Keystroke, Resolution};

/// Resolve keyboard shortcuts and chords to command ids
#[derive(Parser, Debug)]
#[command(
    name = "chordmap",
    version,
    about = "Resolve keyboard shortcuts and chords to command ids"
)]
pub struct CliArgs {
    /// Extra keymap layer applied after the defaults and user overrides
    #[arg(long, global = true, value_name = "FILE")]
    pub keymap: Option<PathBuf>,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Subcommand, Debug)]
pub enum CliCommand {
    /// Feed keystrokes through the resolver and print each result
    Resolve(ResolveArgs),
    /// Evaluate a when-clause against a context
    Eval(EvalArgs),
    /// Print the effective keymap
    List(ListArgs),
    /// Validate a keymap or override file
    Check(CheckArgs),
}

/// Context keys given on the command line
#[derive(Args, Debug, Default, Clone)]
pub struct ContextArgs {
    /// Context key, as `key=value` or a bare `key` for true (repeatable)
    #[arg(short = 'c', long = "context", value_name = "KEY=VALUE")]
    pub context: Vec<String>,

    /// JSON object of context keys, applied before --context
    #[arg(long, value_name = "FILE")]
    pub context_file: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct ResolveArgs {
    /// Keystrokes such as `ctrl+k`; a quoted "ctrl+k ctrl+s" is split into both
    #[arg(value_name = "KEYS", required = true)]
    pub keys: Vec<String>,

    #[command(flatten)]
    pub context: ContextArgs,

    /// Simulated delay between keystrokes, in milliseconds
    #[arg(long, value_name = "MS", default_value_t = 0)]
    pub delay_ms: u64,

    /// Print results as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct EvalArgs {
    /// When-clause expression, e.g. "editorTextFocus && !terminalFocus"
    #[arg(value_name = "EXPR")]
    pub expr: String,

    #[command(flatten)]
    pub context: ContextArgs,
}

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Only show commands in this category
    #[arg(long)]
    pub category: Option<String>,
}

#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Keymap file to validate
    #[arg(value_name = "FILE")]
    pub file: PathBuf,
}

impl ContextArgs {
    /// Build the context: file first, then `--context` assignments on top
    pub fn into_context(self) -> Result<ContextKeys, String> {
        let mut ctx = match &self.context_file {
            Some(path) => read_context_file(path)?,
            None => ContextKeys::new(),
        };

        for assignment in &self.context {
            let (key, value) = ContextKeys::parse_assignment(assignment)
                .ok_or_else(|| format!("Invalid context assignment: {:?}", assignment))?;
            ctx.set(&key, value);
        }

        Ok(ctx)
    }
}

fn read_context_file(path: &Path) -> Result<ContextKeys, String> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read context file {}: {}", path.display(), e))?;
    serde_json::from_str(&content)
        .map_err(|e| format!("Failed to parse context file {}: {}", path.display(), e))
}

/// Parse the KEYS arguments into a flat keystroke sequence
pub fn parse_keys(keys: &[String]) -> Result<Vec<Keystroke>, String> {
    let mut keystrokes = Vec::new();
    for arg in keys {
        let binding = parse_keybinding(arg).map_err(|e| e.to_string())?;
        keystrokes.extend(binding.keystrokes().iter().cloned());
    }
    Ok(keystrokes)
}

/// One keystroke's outcome, as printed by `resolve`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveStep {
    pub keystroke: String,
    #[serde(flatten)]
    pub resolution: Resolution,
    /// Chord indicator after this keystroke, if a chord is pending
    pub pending: Option<String>,
}

impl std::fmt::Display for ResolveStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let outcome = match (&self.resolution.command_id, &self.pending) {
            (Some(command), _) => format!("-> {}", command),
            (None, Some(pending)) => format!("pending ({})", pending),
            (None, None) if self.resolution.handled => "swallowed".to_string(),
            (None, None) => "unhandled".to_string(),
        };
        write!(f, "{:<20} {}", self.keystroke, outcome)
    }
}

/// Feed keystrokes through the resolver on virtual time
///
/// Keystroke `i` arrives at `start + i * delay`, so a delay longer than the
/// chord timeout expires pending chords between keys.
pub fn resolve_sequence(
    resolver: &mut KeybindingResolver,
    keystrokes: &[Keystroke],
    ctx: &ContextKeys,
    delay: Duration,
    start: Instant,
) -> Vec<ResolveStep> {
    let mut now = start;
    let mut steps = Vec::with_capacity(keystrokes.len());

    for keystroke in keystrokes {
        let resolution = resolver.handle_keystroke_at(keystroke, ctx, now);
        steps.push(ResolveStep {
            keystroke: keystroke.display_string(),
            resolution,
            pending: resolver.chord_indicator(),
        });
        now += delay;
    }

    steps
}
