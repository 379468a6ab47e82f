// crates/live/src/protocol.rs
//! JSON frames exchanged with the ticket hub.
//!
//! Client→server: join/leave invocations. Server→client: the three ticket
//! events, fanned out to every subscribed session — the hub does no
//! per-ticket partitioning, so sessions filter on their own ticket id.

use serde::{Deserialize, Serialize};
use ticketflow_types::{Attachment, Comment};

/// Invocations the client sends to the hub.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    JoinTicket { ticket_id: i64 },
    LeaveTicket { ticket_id: i64 },
}

/// Events pushed by the hub.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum TicketEvent {
    CommentAdded(Comment),
    AttachmentAdded(Attachment),
    AttachmentDeleted(i64),
}

impl TicketEvent {
    /// The ticket this event belongs to, when the payload carries one.
    /// `AttachmentDeleted` only names the attachment id.
    pub fn ticket_id(&self) -> Option<i64> {
        match self {
            TicketEvent::CommentAdded(comment) => Some(comment.ticket_id),
            TicketEvent::AttachmentAdded(attachment) => Some(attachment.ticket_id),
            TicketEvent::AttachmentDeleted(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_wire_shape() {
        let json = serde_json::to_string(&ClientMessage::JoinTicket { ticket_id: 8 }).unwrap();
        assert_eq!(json, r#"{"type":"joinTicket","ticketId":8}"#);
    }

    #[test]
    fn test_attachment_deleted_parses() {
        let event: TicketEvent =
            serde_json::from_str(r#"{"type":"attachmentDeleted","data":42}"#).unwrap();
        assert_eq!(event, TicketEvent::AttachmentDeleted(42));
        assert_eq!(event.ticket_id(), None);
    }

    #[test]
    fn test_comment_added_parses() {
        let event: TicketEvent = serde_json::from_str(
            r#"{
                "type": "commentAdded",
                "data": {
                    "id": 3,
                    "ticketId": 7,
                    "text": "looking into it",
                    "authorName": "Dana",
                    "createdAt": "2026-03-01T12:00:00Z"
                }
            }"#,
        )
        .unwrap();

        assert_eq!(event.ticket_id(), Some(7));
        match event {
            TicketEvent::CommentAdded(comment) => assert_eq!(comment.id, 3),
            other => panic!("expected CommentAdded, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_type_is_error() {
        let parsed = serde_json::from_str::<TicketEvent>(r#"{"type":"ticketReindexed","data":1}"#);
        assert!(parsed.is_err());
    }
}
