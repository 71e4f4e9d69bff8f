//! Draft types for Postmind.
//!
//! A draft is the in-progress, unsent email tuple (recipient/subject/body)
//! the assistant is composing for a session. Every save or update produces a
//! new strictly-increasing version; the store keeps a bounded history of
//! snapshots per session.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A versioned draft snapshot tied to a session.
///
/// `version` starts at 1 and increases by exactly 1 on every save/update for
/// the same session. `provider_draft_id` is the mail provider's handle once
/// the draft has been synced upstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DraftRecord {
    pub session_token: String,
    pub to: String,
    pub subject: String,
    pub body: String,
    pub provider_draft_id: Option<String>,
    pub version: u32,
    pub saved_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Caller-supplied content for a full draft save.
///
/// All fields are defaultable so a save can start from as little as a
/// recipient; missing pieces are empty, not absent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DraftContent {
    pub to: String,
    pub subject: String,
    pub body: String,
    pub provider_draft_id: Option<String>,
}

/// Partial fields for an in-place draft update.
///
/// Only set fields are merged; `None` leaves the current value untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DraftPatch {
    pub to: Option<String>,
    pub subject: Option<String>,
    pub body: Option<String>,
    pub provider_draft_id: Option<String>,
}

impl DraftPatch {
    /// Whether the patch carries no changes at all.
    pub fn is_empty(&self) -> bool {
        self.to.is_none()
            && self.subject.is_none()
            && self.body.is_none()
            && self.provider_draft_id.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_defaults_are_empty() {
        let content = DraftContent::default();
        assert!(content.to.is_empty());
        assert!(content.subject.is_empty());
        assert!(content.body.is_empty());
        assert!(content.provider_draft_id.is_none());
    }

    #[test]
    fn test_content_partial_deserialize() {
        let content: DraftContent =
            serde_json::from_str(r#"{"to":"a@x.com","subject":"Hi"}"#).unwrap();
        assert_eq!(content.to, "a@x.com");
        assert_eq!(content.subject, "Hi");
        assert!(content.body.is_empty());
    }

    #[test]
    fn test_patch_is_empty() {
        assert!(DraftPatch::default().is_empty());
        let patch = DraftPatch {
            subject: Some("Hi there".to_string()),
            ..Default::default()
        };
        assert!(!patch.is_empty());
    }

    #[test]
    fn test_record_serialize() {
        let record = DraftRecord {
            session_token: "tok-1".to_string(),
            to: "a@x.com".to_string(),
            subject: "Hi".to_string(),
            body: String::new(),
            provider_draft_id: None,
            version: 1,
            saved_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"version\":1"));
    }
}
