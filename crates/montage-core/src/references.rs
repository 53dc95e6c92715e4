//! Step references
//!
//! A step argument may hold `{"fromStep": "s1", "path": "data.assetId"}`
//! instead of a literal. The scheduler replaces such placeholders with the
//! referenced step's output right before the call; the validator swaps them
//! for schema-shaped dummies so argument schemas can be checked up front.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A placeholder that reads from a prior step's output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepValueReference {
    /// Step whose output is read
    pub from_step: String,
    /// Dot/bracket path into `{"data": <output>}`
    pub path: String,
    /// Used when the path cannot be read
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl StepValueReference {
    /// Create a reference without a default
    pub fn new(from_step: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            from_step: from_step.into(),
            path: path.into(),
            default: None,
        }
    }

    /// Attach a fallback value
    #[must_use]
    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    /// Whether the path starts at the `data` segment
    #[must_use]
    pub fn reads_data(&self) -> bool {
        matches!(
            parse_path(&self.path).as_deref(),
            Some([Segment::Key(first), ..]) if first == "data"
        )
    }

    /// Placeholder string used during offline validation
    #[must_use]
    pub fn placeholder(&self) -> String {
        format!("ref:{}.{}", self.from_step, self.path)
    }
}

/// Interpret a value as a step reference.
///
/// Only objects with a non-empty string `fromStep` and a string `path`
/// qualify; everything else is a plain value.
#[must_use]
pub fn as_reference(value: &Value) -> Option<StepValueReference> {
    let obj = value.as_object()?;
    let from_step = obj.get("fromStep")?.as_str()?;
    let path = obj.get("path")?.as_str()?;
    if from_step.is_empty() {
        return None;
    }
    Some(StepValueReference {
        from_step: from_step.to_string(),
        path: path.to_string(),
        default: obj.get("default").cloned(),
    })
}

/// A reference together with where it sits inside the args
#[derive(Debug, Clone, PartialEq)]
pub struct FoundReference {
    /// Location such as `$.style.fallbackClipId` or `$.clips[0].id`
    pub location: String,
    /// The reference itself
    pub reference: StepValueReference,
}

/// Every reference embedded in `args`, depth first, in document order
#[must_use]
pub fn collect(args: &Value) -> Vec<FoundReference> {
    let mut found = Vec::new();
    collect_into(args, "$".to_string(), &mut found);
    found
}

fn collect_into(value: &Value, location: String, found: &mut Vec<FoundReference>) {
    if let Some(reference) = as_reference(value) {
        found.push(FoundReference {
            location,
            reference,
        });
        return;
    }
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                collect_into(child, format!("{}.{}", location, key), found);
            }
        }
        Value::Array(items) => {
            for (index, child) in items.iter().enumerate() {
                collect_into(child, format!("{}[{}]", location, index), found);
            }
        }
        _ => {}
    }
}

/// Outcome of reading a path
#[derive(Debug, Clone, PartialEq)]
pub enum PathLookup {
    /// The value at the path
    Found(Value),
    /// Why the path could not be read
    NotFound {
        /// Explanation
        reason: String,
    },
}

impl PathLookup {
    fn not_found(reason: impl Into<String>) -> Self {
        Self::NotFound {
            reason: reason.into(),
        }
    }
}

/// A reference that could not be resolved
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionFailure {
    /// Location of the reference in the args
    pub path: String,
    /// Why it failed
    pub reason: String,
}

/// Arguments with every reference replaced
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedArgs {
    /// Rebuilt arguments; unresolved slots hold `null`
    pub args: Value,
    /// Every failed reference
    pub failures: Vec<ResolutionFailure>,
    /// Steps whose output was actually read, first use first
    pub referenced_steps: Vec<String>,
}

impl ResolvedArgs {
    /// Whether every reference resolved
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Replace every reference in `args` with what `lookup` returns for it.
///
/// A failed lookup falls back to the reference's default; without one the
/// failure is recorded and resolution continues.
pub fn resolve<F>(args: &Value, mut lookup: F) -> ResolvedArgs
where
    F: FnMut(&StepValueReference) -> PathLookup,
{
    let mut failures = Vec::new();
    let mut referenced_steps = Vec::new();
    let args = resolve_value(
        args,
        "$".to_string(),
        &mut lookup,
        &mut failures,
        &mut referenced_steps,
    );
    ResolvedArgs {
        args,
        failures,
        referenced_steps,
    }
}

fn resolve_value<F>(
    value: &Value,
    location: String,
    lookup: &mut F,
    failures: &mut Vec<ResolutionFailure>,
    referenced: &mut Vec<String>,
) -> Value
where
    F: FnMut(&StepValueReference) -> PathLookup,
{
    if let Some(reference) = as_reference(value) {
        return match lookup(&reference) {
            PathLookup::Found(found) => {
                if !referenced.contains(&reference.from_step) {
                    referenced.push(reference.from_step.clone());
                }
                found
            }
            PathLookup::NotFound { reason } => match reference.default {
                Some(default) => default,
                None => {
                    failures.push(ResolutionFailure {
                        path: location,
                        reason,
                    });
                    Value::Null
                }
            },
        };
    }
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, child)| {
                    let child_location = format!("{}.{}", location, key);
                    let resolved = resolve_value(child, child_location, lookup, failures, referenced);
                    (key.clone(), resolved)
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(
            items
                .iter()
                .enumerate()
                .map(|(index, child)| {
                    let child_location = format!("{}[{}]", location, index);
                    resolve_value(child, child_location, lookup, failures, referenced)
                })
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Replace references with dummies shaped like the schema expects.
///
/// Strings become `"ref:<fromStep>.<path>"`, numbers `0`, booleans
/// `false`, anything else `null`.
#[must_use]
pub fn normalize_for_validation(args: &Value, schema: &Value) -> Value {
    normalize_value(args, Some(schema))
}

fn normalize_value(value: &Value, schema: Option<&Value>) -> Value {
    if let Some(reference) = as_reference(value) {
        return match schema.and_then(schema_type) {
            Some("string") => Value::String(reference.placeholder()),
            Some("number") | Some("integer") => Value::from(0),
            Some("boolean") => Value::Bool(false),
            _ => Value::Null,
        };
    }
    match value {
        Value::Object(map) => {
            let properties = schema.and_then(|s| s.get("properties"));
            let normalized: Map<String, Value> = map
                .iter()
                .map(|(key, child)| {
                    let child_schema = properties.and_then(|p| p.get(key));
                    (key.clone(), normalize_value(child, child_schema))
                })
                .collect();
            Value::Object(normalized)
        }
        Value::Array(items) => {
            let item_schema = schema.and_then(|s| s.get("items"));
            Value::Array(
                items
                    .iter()
                    .enumerate()
                    .map(|(index, child)| {
                        // tuple-style `items` arrays are positional
                        let child_schema = match item_schema {
                            Some(Value::Array(tuple)) => tuple.get(index),
                            other => other,
                        };
                        normalize_value(child, child_schema)
                    })
                    .collect(),
            )
        }
        other => other.clone(),
    }
}

fn schema_type(schema: &Value) -> Option<&str> {
    match schema.get("type")? {
        Value::String(t) => Some(t.as_str()),
        Value::Array(types) => types
            .iter()
            .filter_map(Value::as_str)
            .find(|t| *t != "null"),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Key(String),
    Index(usize),
}

/// Split `data.clips[0].id` into segments; `None` on malformed input
fn parse_path(path: &str) -> Option<Vec<Segment>> {
    let path = path.strip_prefix('$').unwrap_or(path);
    let mut segments = Vec::new();
    let mut key = String::new();
    let mut chars = path.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '.' => {
                if !key.is_empty() {
                    segments.push(Segment::Key(std::mem::take(&mut key)));
                }
            }
            '[' => {
                if !key.is_empty() {
                    segments.push(Segment::Key(std::mem::take(&mut key)));
                }
                let mut digits = String::new();
                loop {
                    match chars.next() {
                        Some(']') => break,
                        Some(d) if d.is_ascii_digit() => digits.push(d),
                        _ => return None,
                    }
                }
                segments.push(Segment::Index(digits.parse().ok()?));
            }
            ']' => return None,
            other => key.push(other),
        }
    }
    if !key.is_empty() {
        segments.push(Segment::Key(key));
    }
    Some(segments)
}

/// Read a nested value using dot and `[index]` notation.
///
/// A leading `$` is ignored. Missing keys, out-of-range indexes and
/// malformed paths all come back as [`PathLookup::NotFound`].
#[must_use]
pub fn get_at_path(source: &Value, path: &str) -> PathLookup {
    let Some(segments) = parse_path(path) else {
        return PathLookup::not_found(format!("malformed path '{}'", path));
    };

    let mut current = source;
    let mut walked = String::new();
    for segment in &segments {
        match segment {
            Segment::Key(key) => {
                let next = match current {
                    Value::Object(map) => map.get(key),
                    _ => {
                        return PathLookup::not_found(format!(
                            "cannot read '{}' from {} at '{}'",
                            key,
                            type_name(current),
                            display_walked(&walked)
                        ))
                    }
                };
                let Some(next) = next else {
                    return PathLookup::not_found(format!(
                        "key '{}' not found at '{}'",
                        key,
                        display_walked(&walked)
                    ));
                };
                if !walked.is_empty() {
                    walked.push('.');
                }
                walked.push_str(key);
                current = next;
            }
            Segment::Index(index) => {
                let Value::Array(items) = current else {
                    return PathLookup::not_found(format!(
                        "cannot index {} at '{}'",
                        type_name(current),
                        display_walked(&walked)
                    ));
                };
                let Some(next) = items.get(*index) else {
                    return PathLookup::not_found(format!(
                        "index {} out of bounds (length {}) at '{}'",
                        index,
                        items.len(),
                        display_walked(&walked)
                    ));
                };
                walked.push_str(&format!("[{}]", index));
                current = next;
            }
        }
    }
    PathLookup::Found(current.clone())
}

fn display_walked(walked: &str) -> &str {
    if walked.is_empty() {
        "$"
    } else {
        walked
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
