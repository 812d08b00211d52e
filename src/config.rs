//! Engine configuration persistence
//!
//! Stores resolver settings in `~/.config/chordmap/config.yaml`

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::keymap::{ChordBreakPolicy, DEFAULT_CHORD_TIMEOUT_MS};

/// Resolver configuration that persists across sessions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// How long a pending chord waits for its next keystroke
    #[serde(default = "default_chord_timeout_ms")]
    pub chord_timeout_ms: u64,

    /// What happens to a keystroke that breaks a pending chord
    #[serde(default)]
    pub chord_break: ChordBreakPolicy,
}

fn default_chord_timeout_ms() -> u64 {
    DEFAULT_CHORD_TIMEOUT_MS
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            chord_timeout_ms: default_chord_timeout_ms(),
            chord_break: ChordBreakPolicy::default(),
        }
    }
}

impl EngineConfig {
    /// Chord timeout as a `Duration`; the state machine clamps it to its
    /// supported range
    pub fn chord_timeout(&self) -> Duration {
        Duration::from_millis(self.chord_timeout_ms)
    }

    /// Load config from disk, or return defaults if not found
    pub fn load() -> Self {
        let Some(path) = crate::config_paths::config_file() else {
            tracing::debug!("No config directory available, using defaults");
            return Self::default();
        };

        Self::load_from(&path)
    }

    /// Load config from a specific file, or return defaults on any failure
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            tracing::debug!(
                "Config file not found at {}, using defaults",
                path.display()
            );
            return Self::default();
        }

        match std::fs::read_to_string(path) {
            Ok(content) => match serde_yaml::from_str(&content) {
                Ok(config) => {
                    tracing::info!("Loaded config from {}", path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!("Failed to parse config at {}: {}", path.display(), e);
                    Self::default()
                }
            },
            Err(e) => {
                tracing::warn!("Failed to read config at {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Save config to disk
    ///
    /// Creates the config directory if it doesn't exist.
    pub fn save(&self) -> Result<(), String> {
        let path = crate::config_paths::config_file()
            .ok_or_else(|| "No config directory available".to_string())?;

        self.save_to(&path)
    }

    /// Save config to a specific file
    pub fn save_to(&self, path: &Path) -> Result<(), String> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create config directory: {}", e))?;
        }

        let content = serde_yaml::to_string(self)
            .map_err(|e| format!("Failed to serialize config: {}", e))?;

        std::fs::write(path, content)
            .map_err(|e| format!("Failed to write config to {}: {}", path.display(), e))?;

        tracing::info!("Saved config to {}", path.display());
        Ok(())
    }
}
