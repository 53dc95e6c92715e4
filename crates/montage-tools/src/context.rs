//! Editing context shared with planners, validators and tools
//!
//! The context is a snapshot of the ids that actually exist in the user's
//! project at planning time. Validators use it to reject invented ids and
//! tools receive it alongside their arguments.

use serde::{Deserialize, Serialize};

/// Kinds of project entities a plan argument can point at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    /// Timeline sequence
    Sequence,
    /// Track inside a sequence
    Track,
    /// Media asset in the project bin
    Asset,
    /// Clip placed on a track
    Clip,
}

impl EntityKind {
    /// Map a well-known argument key (`trackId`, `assetId`, ...) to its kind
    #[must_use]
    pub fn from_arg_key(key: &str) -> Option<Self> {
        match key {
            "sequenceId" => Some(Self::Sequence),
            "trackId" => Some(Self::Track),
            "assetId" => Some(Self::Asset),
            "clipId" => Some(Self::Clip),
            _ => None,
        }
    }

    /// Returns the string representation
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sequence => "sequence",
            Self::Track => "track",
            Self::Asset => "asset",
            Self::Clip => "clip",
        }
    }
}

/// Snapshot of the current editing state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditingContext {
    /// Active session identifier, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    /// Sequences in the project
    #[serde(default)]
    pub sequence_ids: Vec<String>,
    /// Tracks of the active sequence
    #[serde(default)]
    pub track_ids: Vec<String>,
    /// Assets in the project bin
    #[serde(default)]
    pub asset_ids: Vec<String>,
    /// Clips on the active sequence
    #[serde(default)]
    pub clip_ids: Vec<String>,
}

impl EditingContext {
    /// Create an empty context
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the session id
    #[must_use]
    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Add a sequence id
    #[must_use]
    pub fn with_sequence(mut self, id: impl Into<String>) -> Self {
        self.sequence_ids.push(id.into());
        self
    }

    /// Add a track id
    #[must_use]
    pub fn with_track(mut self, id: impl Into<String>) -> Self {
        self.track_ids.push(id.into());
        self
    }

    /// Add an asset id
    #[must_use]
    pub fn with_asset(mut self, id: impl Into<String>) -> Self {
        self.asset_ids.push(id.into());
        self
    }

    /// Add a clip id
    #[must_use]
    pub fn with_clip(mut self, id: impl Into<String>) -> Self {
        self.clip_ids.push(id.into());
        self
    }

    /// Ids known for an entity kind
    #[must_use]
    pub fn ids(&self, kind: EntityKind) -> &[String] {
        match kind {
            EntityKind::Sequence => &self.sequence_ids,
            EntityKind::Track => &self.track_ids,
            EntityKind::Asset => &self.asset_ids,
            EntityKind::Clip => &self.clip_ids,
        }
    }

    /// True when no entity ids are known at all
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sequence_ids.is_empty()
            && self.track_ids.is_empty()
            && self.asset_ids.is_empty()
            && self.clip_ids.is_empty()
    }

    /// Check whether an id exists for the given kind.
    ///
    /// Returns `None` when the context has no ids of that kind, so callers
    /// cannot tell either way.
    #[must_use]
    pub fn contains(&self, kind: EntityKind, id: &str) -> Option<bool> {
        let ids = self.ids(kind);
        if ids.is_empty() {
            None
        } else {
            Some(ids.iter().any(|known| known == id))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_kind_from_arg_key() {
        assert_eq!(EntityKind::from_arg_key("trackId"), Some(EntityKind::Track));
        assert_eq!(EntityKind::from_arg_key("clipId"), Some(EntityKind::Clip));
        assert_eq!(EntityKind::from_arg_key("effectId"), None);
    }

    #[test]
    fn test_contains_unknown_when_empty() {
        let ctx = EditingContext::new().with_track("t1");
        assert_eq!(ctx.contains(EntityKind::Track, "t1"), Some(true));
        assert_eq!(ctx.contains(EntityKind::Track, "t2"), Some(false));
        assert_eq!(ctx.contains(EntityKind::Asset, "a1"), None);
        assert!(!ctx.is_empty());
        assert!(EditingContext::default().is_empty());
    }

    #[test]
    fn test_context_deserializes_camel_case() {
        let ctx: EditingContext = serde_json::from_value(serde_json::json!({
            "sessionId": "s1",
            "trackIds": ["v1"],
        }))
        .unwrap();
        assert_eq!(ctx.session_id.as_deref(), Some("s1"));
        assert_eq!(ctx.track_ids, vec!["v1".to_string()]);
        assert!(ctx.clip_ids.is_empty());
    }
}
