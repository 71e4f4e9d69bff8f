//! Outbound wire events sent to connected clients.
//!
//! This is the only wire-format concern the session core owns: the shape of
//! the structured messages pushed over a connection transport. Clients
//! receive JSON text frames tagged by `type`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::session::{ChatMessageRecord, MessageSender};

/// An event pushed to a client over its connection.
///
/// Serialized as `{"type": "...", ..., "timestamp": "..."}` with snake_case
/// type tags. Every variant carries a timestamp so clients can order events
/// without trusting arrival order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundEvent {
    /// Connection-level notice (connected, session expiring, slow down).
    System {
        message: String,
        timestamp: DateTime<Utc>,
    },
    /// History replay on (re)connect, chronological order.
    History {
        messages: Vec<ChatMessageRecord>,
        timestamp: DateTime<Utc>,
    },
    /// Typing indicator state change.
    Typing {
        is_typing: bool,
        timestamp: DateTime<Utc>,
    },
    /// A chat message delivered live.
    Message {
        message: String,
        sender: MessageSender,
        timestamp: DateTime<Utc>,
    },
    /// A structured action completed (e.g. a draft was composed).
    ActionResult {
        action: String,
        result: Value,
        timestamp: DateTime<Utc>,
    },
    /// A structured action failed.
    ActionError {
        message: String,
        timestamp: DateTime<Utc>,
    },
    /// Keep-alive reply.
    Pong { timestamp: DateTime<Utc> },
}

impl OutboundEvent {
    pub fn system(message: impl Into<String>) -> Self {
        OutboundEvent::System {
            message: message.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn history(messages: Vec<ChatMessageRecord>) -> Self {
        OutboundEvent::History {
            messages,
            timestamp: Utc::now(),
        }
    }

    pub fn typing(is_typing: bool) -> Self {
        OutboundEvent::Typing {
            is_typing,
            timestamp: Utc::now(),
        }
    }

    pub fn message(message: impl Into<String>, sender: MessageSender) -> Self {
        OutboundEvent::Message {
            message: message.into(),
            sender,
            timestamp: Utc::now(),
        }
    }

    pub fn action_result(action: impl Into<String>, result: Value) -> Self {
        OutboundEvent::ActionResult {
            action: action.into(),
            result,
            timestamp: Utc::now(),
        }
    }

    pub fn action_error(message: impl Into<String>) -> Self {
        OutboundEvent::ActionError {
            message: message.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn pong() -> Self {
        OutboundEvent::Pong {
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_type_tags() {
        let cases = [
            (OutboundEvent::system("hello"), "system"),
            (OutboundEvent::history(Vec::new()), "history"),
            (OutboundEvent::typing(true), "typing"),
            (
                OutboundEvent::message("hi", MessageSender::Assistant),
                "message",
            ),
            (
                OutboundEvent::action_result("draft_created", json!({"id": "d1"})),
                "action_result",
            ),
            (OutboundEvent::action_error("boom"), "action_error"),
            (OutboundEvent::pong(), "pong"),
        ];
        for (event, tag) in cases {
            let value: Value = serde_json::to_value(&event).unwrap();
            assert_eq!(value["type"], tag);
            assert!(value["timestamp"].is_string());
        }
    }

    #[test]
    fn test_typing_carries_flag() {
        let value: Value = serde_json::to_value(OutboundEvent::typing(false)).unwrap();
        assert_eq!(value["is_typing"], false);
    }

    #[test]
    fn test_roundtrip() {
        let event = OutboundEvent::message("drafted it", MessageSender::Assistant);
        let json = serde_json::to_string(&event).unwrap();
        let parsed: OutboundEvent = serde_json::from_str(&json).unwrap();
        assert!(matches!(
            parsed,
            OutboundEvent::Message {
                sender: MessageSender::Assistant,
                ..
            }
        ));
    }
}
