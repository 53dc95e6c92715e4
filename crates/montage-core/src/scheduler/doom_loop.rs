//! Doom-loop detection
//!
//! Tracks recent tool invocations as `(tool, canonical args)` signatures and
//! refuses the Nth consecutive identical one.

use serde_json::Value;
use std::collections::VecDeque;

/// Detects repeated identical tool invocations
#[derive(Debug, Clone)]
pub struct DoomLoopDetector {
    threshold: usize,
    history: VecDeque<String>,
}

impl DoomLoopDetector {
    /// Create a detector; thresholds below 2 disable detection
    #[must_use]
    pub fn new(threshold: usize) -> Self {
        Self {
            threshold,
            history: VecDeque::with_capacity(threshold),
        }
    }

    /// Configured threshold
    #[must_use]
    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// Whether calling `tool` with `args` now would complete a loop.
    ///
    /// Returns the repetition count that would be reached.
    #[must_use]
    pub fn check(&self, tool: &str, args: &Value) -> Option<usize> {
        if self.threshold < 2 || self.history.len() < self.threshold - 1 {
            return None;
        }
        let signature = signature(tool, args);
        self.history
            .iter()
            .rev()
            .take(self.threshold - 1)
            .all(|previous| *previous == signature)
            .then_some(self.threshold)
    }

    /// Remember an invocation that is about to be made
    pub fn record(&mut self, tool: &str, args: &Value) {
        if self.threshold < 2 {
            return;
        }
        if self.history.len() == self.threshold - 1 {
            self.history.pop_front();
        }
        self.history.push_back(signature(tool, args));
    }

    /// Forget all recorded invocations
    pub fn reset(&mut self) {
        self.history.clear();
    }
}

/// `tool` plus the arguments serialized with sorted keys
#[must_use]
pub fn signature(tool: &str, args: &Value) -> String {
    let mut out = String::with_capacity(tool.len() + 32);
    out.push_str(tool);
    out.push(':');
    write_canonical(args, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                if let Some(child) = map.get(key) {
                    write_canonical(child, out);
                }
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}
