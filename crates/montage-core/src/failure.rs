//! Failure classification heuristics
//!
//! Pure functions over tool error messages. The scheduler uses
//! [`is_transient`] to decide whether a failed attempt is worth repeating;
//! the iteration controller uses the terminal-failure detectors to stop
//! re-planning when nothing is changing.

use crate::scheduler::{ExecutionResult, StepExecutionRecord};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::LazyLock;

/// Keywords marking a failure as temporary (matched lowercase)
const TRANSIENT_KEYWORDS: &[&str] = &[
    "timeout",
    "timed out",
    "deadline",
    "temporary",
    "temporarily",
    "transient",
    "try again",
    "rate limit",
    "rate-limit",
    "ratelimit",
    "too many requests",
    "network",
    "connection reset",
    "connection refused",
    "connection closed",
    "connection lost",
    "econnreset",
    "econnrefused",
    "etimedout",
    "socket hang up",
    "service unavailable",
    "bad gateway",
    "overloaded",
];

/// Tool name prefixes that only read state
const READ_ONLY_PREFIXES: &[&str] = &[
    "get_", "list_", "find_", "search_", "analyze_", "inspect_", "query_", "read_",
];

/// Signature prefix for failures that used up their retries
pub const EXHAUSTED_PREFIX: &str = "exhausted:";

static NOT_FOUND_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(clip|track|sequence|asset)s?\b[^.;]{0,80}?\b(not found|does not exist|doesn't exist|no longer exists|is missing)\b|\bno (clip|track|sequence|asset)s? (found|with|matching)\b",
    )
    .expect("NOT_FOUND_RE is a compile-time constant")
});

/// Status codes and short words that only count as whole words
static TRANSIENT_WORD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(429|502|503|busy|unavailable)\b")
        .expect("TRANSIENT_WORD_RE is a compile-time constant")
});

static QUOTED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""[^"]*"|'[^']*'|`[^`]*`"#).expect("QUOTED_RE is a compile-time constant")
});

static NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+").expect("NUMBER_RE is a compile-time constant"));

static WHITESPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("WHITESPACE_RE is a compile-time constant"));

/// Whether a failure message describes a temporary condition.
///
/// A missing clip, track, sequence or asset is never temporary.
#[must_use]
pub fn is_transient(message: &str) -> bool {
    if classify_not_found(message).is_some() {
        return false;
    }
    let lower = message.to_lowercase();
    TRANSIENT_KEYWORDS.iter().any(|k| lower.contains(k)) || TRANSIENT_WORD_RE.is_match(message)
}

/// Entity a "not found" failure refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminalKind {
    /// A clip id did not resolve
    ClipNotFound,
    /// A track id did not resolve
    TrackNotFound,
    /// A sequence id did not resolve
    SequenceNotFound,
    /// An asset id did not resolve
    AssetNotFound,
}

impl TerminalKind {
    fn from_entity(entity: &str) -> Option<Self> {
        match entity.to_lowercase().as_str() {
            "clip" => Some(Self::ClipNotFound),
            "track" => Some(Self::TrackNotFound),
            "sequence" => Some(Self::SequenceNotFound),
            "asset" => Some(Self::AssetNotFound),
            _ => None,
        }
    }

    /// Why the run cannot succeed as planned
    #[must_use]
    pub fn reason(&self) -> &'static str {
        match self {
            Self::ClipNotFound => "The referenced clip does not exist on the timeline.",
            Self::TrackNotFound => "The referenced track does not exist in the sequence.",
            Self::SequenceNotFound => "The referenced sequence does not exist in the project.",
            Self::AssetNotFound => "The referenced asset is not in the project library.",
        }
    }

    /// What to do instead of repeating the plan
    #[must_use]
    pub fn suggested_action(&self) -> &'static str {
        match self {
            Self::ClipNotFound => {
                "List the clips on the timeline and use an exact clip id from the result."
            }
            Self::TrackNotFound => "List the sequence tracks and pick an existing track id.",
            Self::SequenceNotFound => "Use the active sequence id from the editing context.",
            Self::AssetNotFound => "Import the asset first or choose one already in the project.",
        }
    }
}

/// A terminal "not found" classification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotFoundFailure {
    /// Which entity was missing
    pub kind: TerminalKind,
    /// Human-readable reason
    pub reason: String,
    /// Suggested remediation
    pub suggested_action: String,
}

/// Classify clip/track/sequence/asset "not found" messages
#[must_use]
pub fn classify_not_found(message: &str) -> Option<NotFoundFailure> {
    let caps = NOT_FOUND_RE.captures(message)?;
    let entity = caps.get(1).or_else(|| caps.get(3))?.as_str();
    let kind = TerminalKind::from_entity(entity)?;
    Some(NotFoundFailure {
        kind,
        reason: kind.reason().to_string(),
        suggested_action: kind.suggested_action().to_string(),
    })
}

/// Normalized signature for comparing failures across attempts.
///
/// Lowercased, quoted literals become `"*"`, numbers become `#`,
/// whitespace collapses, prefixed with the tool name.
#[must_use]
pub fn failure_signature(tool: &str, message: &str) -> String {
    let lower = message.to_lowercase();
    let unquoted = QUOTED_RE.replace_all(&lower, "\"*\"");
    let numberless = NUMBER_RE.replace_all(&unquoted, "#");
    let collapsed = WHITESPACE_RE.replace_all(numberless.trim(), " ");
    format!("{}:{}", tool, collapsed)
}

/// Signature of a failed record, marking exhausted retries
#[must_use]
pub fn record_signature(record: &StepExecutionRecord) -> String {
    let signature = failure_signature(&record.tool, record.error().unwrap_or("unknown error"));
    if record.retries_exhausted {
        format!("{}{}", EXHAUSTED_PREFIX, signature)
    } else {
        signature
    }
}

/// Whether a tool name only reads project state
#[must_use]
pub fn is_read_only_tool(tool: &str) -> bool {
    READ_ONLY_PREFIXES.iter().any(|p| tool.starts_with(p))
}

/// Whether any completed step may have changed project state
#[must_use]
pub fn mutated_state(result: &ExecutionResult) -> bool {
    result.completed_steps.iter().any(|record| {
        record.result.side_effects || record.result.undoable || !is_read_only_tool(&record.tool)
    })
}

/// Advice for the iteration logic to stop looping
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TerminalGuidance {
    /// Why another cycle would not help
    pub reason: String,
    /// What to do instead
    pub suggested_action: String,
    /// Signature of the failure that triggered it
    pub failure_signature: String,
}

fn guidance_for(record: &StepExecutionRecord, signature: String, repeated: bool) -> TerminalGuidance {
    let message = record.error().unwrap_or("unknown error");
    match classify_not_found(message) {
        Some(not_found) => TerminalGuidance {
            reason: not_found.reason,
            suggested_action: not_found.suggested_action,
            failure_signature: signature,
        },
        None if repeated => TerminalGuidance {
            reason: format!(
                "Step '{}' ({}) failed the same way twice in a row: {}",
                record.step_id, record.tool, message
            ),
            suggested_action: "Change the approach or ask the user for the missing information."
                .to_string(),
            failure_signature: signature,
        },
        None => TerminalGuidance {
            reason: format!(
                "Step '{}' ({}) failed with a non-retryable error: {}",
                record.step_id, record.tool, message
            ),
            suggested_action: "Fix the plan inputs instead of repeating the same plan.".to_string(),
            failure_signature: signature,
        },
    }
}

fn inconclusive(result: &ExecutionResult) -> bool {
    result.success || result.aborted || mutated_state(result)
}

/// Terminal records: deterministic failures and exhausted retries
fn terminal_records(result: &ExecutionResult) -> impl Iterator<Item = &StepExecutionRecord> {
    result.failed_steps.iter().filter(|record| {
        record.retries_exhausted || record.error().is_some_and(|e| !is_transient(e))
    })
}

/// Detect a single run that failed deterministically without changing anything.
///
/// Exhausted transient failures are left to the repeated detector.
#[must_use]
pub fn detect_immediate_terminal_failure(result: &ExecutionResult) -> Option<TerminalGuidance> {
    if inconclusive(result) {
        return None;
    }
    let record = terminal_records(result).find(|r| !r.retries_exhausted)?;
    Some(guidance_for(record, record_signature(record), false))
}

/// Detect the same terminal failure in two consecutive runs that changed nothing
#[must_use]
pub fn detect_repeated_terminal_failure(
    previous: &ExecutionResult,
    current: &ExecutionResult,
) -> Option<TerminalGuidance> {
    if inconclusive(previous) || inconclusive(current) {
        return None;
    }
    let seen: HashSet<String> = terminal_records(previous).map(record_signature).collect();
    terminal_records(current).find_map(|record| {
        let signature = record_signature(record);
        seen.contains(&signature)
            .then(|| guidance_for(record, signature, true))
    })
}
