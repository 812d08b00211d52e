//! Context keys for conditional keybindings
//!
//! The host application publishes named facts about its UI state
//! (`editorTextFocus`, `resourceExtname == '.rs'`, ...) and hands a snapshot
//! to the resolver on every keystroke. The keymap only ever reads it.

use std::collections::HashMap;
use std::fmt;

use serde::Deserialize;

/// Value of a single context key
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ContextValue {
    Bool(bool),
    Number(f64),
    String(String),
}

impl ContextValue {
    /// Truthiness used when a key appears bare in a when-clause
    ///
    /// `true`, any non-zero number and any non-empty string are truthy.
    pub fn is_truthy(&self) -> bool {
        match self {
            ContextValue::Bool(b) => *b,
            ContextValue::Number(n) => *n != 0.0 && !n.is_nan(),
            ContextValue::String(s) => !s.is_empty(),
        }
    }

    /// Parse a value from its textual form (`true`, `3`, `'.rs'`, `markdown`)
    pub fn parse(text: &str) -> Self {
        let text = text.trim();
        match text {
            "true" => return ContextValue::Bool(true),
            "false" => return ContextValue::Bool(false),
            _ => {}
        }
        if let Ok(n) = text.parse::<f64>() {
            return ContextValue::Number(n);
        }
        let unquoted = text
            .strip_prefix('\'')
            .and_then(|t| t.strip_suffix('\''))
            .or_else(|| text.strip_prefix('"').and_then(|t| t.strip_suffix('"')))
            .unwrap_or(text);
        ContextValue::String(unquoted.to_string())
    }
}

impl From<bool> for ContextValue {
    fn from(value: bool) -> Self {
        ContextValue::Bool(value)
    }
}

impl From<f64> for ContextValue {
    fn from(value: f64) -> Self {
        ContextValue::Number(value)
    }
}

impl From<i64> for ContextValue {
    fn from(value: i64) -> Self {
        ContextValue::Number(value as f64)
    }
}

impl From<&str> for ContextValue {
    fn from(value: &str) -> Self {
        ContextValue::String(value.to_string())
    }
}

impl From<String> for ContextValue {
    fn from(value: String) -> Self {
        ContextValue::String(value)
    }
}

impl fmt::Display for ContextValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContextValue::Bool(b) => write!(f, "{}", b),
            ContextValue::Number(n) => write!(f, "{}", n),
            ContextValue::String(s) => write!(f, "'{}'", s),
        }
    }
}

/// Snapshot of context keys taken when a keystroke is evaluated
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct ContextKeys {
    values: HashMap<String, ContextValue>,
}

impl ContextKeys {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, key: &str, value: impl Into<ContextValue>) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&mut self, key: &str, value: impl Into<ContextValue>) {
        self.values.insert(key.to_string(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<ContextValue> {
        self.values.remove(key)
    }

    pub fn get(&self, key: &str) -> Option<&ContextValue> {
        self.values.get(key)
    }

    /// Missing keys are falsy
    pub fn is_truthy(&self, key: &str) -> bool {
        self.values.get(key).is_some_and(ContextValue::is_truthy)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ContextValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Parse a `key=value` assignment, or a bare `key` meaning `key=true`
    pub fn parse_assignment(text: &str) -> Option<(String, ContextValue)> {
        let (key, value) = match text.split_once('=') {
            Some((key, value)) => (key.trim(), ContextValue::parse(value)),
            None => (text.trim(), ContextValue::Bool(true)),
        };
        if key.is_empty() {
            return None;
        }
        Some((key.to_string(), value))
    }
}

impl<K: Into<String>, V: Into<ContextValue>> FromIterator<(K, V)> for ContextKeys {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}
