//! Typed view of the socket event contract.
//!
//! Inbound events are parsed from [`packets::Event`] into [`ServerEvent`];
//! outbound events are built by the small constructors at the bottom so
//! event names and payload keys live in one place.

#[cfg(test)]
#[path = "events_test.rs"]
mod events_test;

use packets::Event;
use serde_json::{Value, json};
use time::OffsetDateTime;

use super::parse::{id_of, parse_message, parse_notification, parse_timestamp, parse_user, pick_str};
use super::types::{Message, Notification, UserSummary};

/// Kind of call requested over the socket.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CallKind {
    Audio,
    Video,
}

impl CallKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Audio => "audio",
            Self::Video => "video",
        }
    }

    fn from_wire(raw: &str) -> Self {
        if raw == "video" { Self::Video } else { Self::Audio }
    }
}

/// Call offer pushed to the callee (`incoming_call`).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CallOffer {
    pub call_id: String,
    pub caller_id: String,
    pub conversation_id: String,
    pub kind: CallKind,
    pub caller: Option<UserSummary>,
}

/// Every server-pushed event the sync layer understands.
#[derive(Clone, Debug, PartialEq)]
pub enum ServerEvent {
    NewMessage { conversation_id: String, message: Message },
    MessagesRead { conversation_id: String, read_by: String },
    NewNotification(Notification),
    UnreadCountUpdated(u32),
    UserTyping { conversation_id: String, user_id: String, is_typing: bool },
    UserStatusChange { user_id: String, is_online: bool, last_seen: Option<OffsetDateTime> },
    NotificationMarkedRead { notification_id: Option<String> },
    AllNotificationsMarkedRead,
    NotificationDeleted { notification_id: Option<String> },
    IncomingCall(CallOffer),
    CallInitiated { call_id: String },
    CallAccepted { call_id: Option<String> },
    CallRejected { reason: Option<String> },
    CallEnded { reason: Option<String> },
    CallFailed { message: Option<String> },
    /// Known name with a payload missing required fields, or an unknown name.
    Unrecognized(Event),
}

impl ServerEvent {
    /// Parse a decoded socket event. `self_id` is needed to derive message read state.
    #[must_use]
    pub fn parse(event: &Event, self_id: &str) -> Self {
        parse_known(event, self_id).unwrap_or_else(|| Self::Unrecognized(event.clone()))
    }
}

fn parse_known(event: &Event, self_id: &str) -> Option<ServerEvent> {
    let data = &event.data;
    let parsed = match event.name.as_str() {
        "new_message" => {
            let message = parse_message(data.get("message")?, self_id)?;
            let conversation_id = data
                .get("conversationId")
                .and_then(id_of)
                .or_else(|| message.conversation_id.clone())?;
            ServerEvent::NewMessage { conversation_id, message }
        }
        "messages_read" => ServerEvent::MessagesRead {
            conversation_id: data.get("conversationId").and_then(id_of)?,
            read_by: data.get("readBy").and_then(id_of)?,
        },
        "new_notification" => {
            ServerEvent::NewNotification(parse_notification(data.get("notification").unwrap_or(data))?)
        }
        "unread_count_updated" => {
            let count = data.get("unreadCount").and_then(Value::as_u64)?;
            ServerEvent::UnreadCountUpdated(u32::try_from(count).unwrap_or(u32::MAX))
        }
        "user_typing" => ServerEvent::UserTyping {
            conversation_id: data.get("conversationId").and_then(id_of)?,
            user_id: data.get("userId").and_then(id_of)?,
            is_typing: data.get("isTyping").and_then(Value::as_bool).unwrap_or(false),
        },
        "user_status_change" => ServerEvent::UserStatusChange {
            user_id: data.get("userId").and_then(id_of)?,
            is_online: data.get("isOnline").and_then(Value::as_bool).unwrap_or(false),
            last_seen: parse_timestamp(data.get("lastSeen")),
        },
        "notification_marked_read" => ServerEvent::NotificationMarkedRead {
            notification_id: data.get("notificationId").and_then(id_of),
        },
        "all_notifications_marked_read" => ServerEvent::AllNotificationsMarkedRead,
        "notification_deleted" => ServerEvent::NotificationDeleted {
            notification_id: data.get("notificationId").and_then(id_of),
        },
        "incoming_call" => ServerEvent::IncomingCall(CallOffer {
            call_id: data.get("callId").and_then(id_of)?,
            caller_id: data.get("callerId").and_then(id_of).unwrap_or_default(),
            conversation_id: data.get("conversationId").and_then(id_of).unwrap_or_default(),
            kind: CallKind::from_wire(pick_str(data, &["callType"]).unwrap_or("audio")),
            caller: data.get("callerInfo").and_then(parse_user),
        }),
        "call_initiated" => ServerEvent::CallInitiated { call_id: data.get("callId").and_then(id_of)? },
        "call_accepted" => ServerEvent::CallAccepted { call_id: data.get("callId").and_then(id_of) },
        "call_rejected" => ServerEvent::CallRejected { reason: reason_of(data, "reason") },
        "call_ended" => ServerEvent::CallEnded { reason: reason_of(data, "reason") },
        "call_failed" => ServerEvent::CallFailed { message: reason_of(data, "message") },
        _ => return None,
    };
    Some(parsed)
}

fn reason_of(data: &Value, key: &str) -> Option<String> {
    pick_str(data, &[key]).map(str::to_owned)
}

// =============================================================================
// OUTBOUND
// =============================================================================

pub fn subscribe_notifications() -> Event {
    Event::bare("subscribe_notifications")
}

pub fn get_unread_count() -> Event {
    Event::bare("get_unread_count")
}

pub fn mark_messages_read(conversation_id: &str) -> Event {
    Event::new("mark_messages_read", json!({ "conversationId": conversation_id }))
}

pub fn typing_start(conversation_id: &str) -> Event {
    Event::new("typing_start", json!({ "conversationId": conversation_id }))
}

pub fn typing_stop(conversation_id: &str) -> Event {
    Event::new("typing_stop", json!({ "conversationId": conversation_id }))
}

pub fn mark_notification_read(notification_id: &str) -> Event {
    Event::new("mark_notification_read", json!({ "notificationId": notification_id }))
}

pub fn mark_all_notifications_read() -> Event {
    Event::bare("mark_all_notifications_read")
}

pub fn delete_notification(notification_id: &str) -> Event {
    Event::new("delete_notification", json!({ "notificationId": notification_id }))
}

pub fn call_initiate(conversation_id: &str, recipient_id: &str, kind: CallKind) -> Event {
    Event::new(
        "call_initiate",
        json!({
            "conversationId": conversation_id,
            "recipientId": recipient_id,
            "callType": kind.as_str(),
        }),
    )
}

pub fn call_accept(call_id: &str) -> Event {
    Event::new("call_accept", json!({ "callId": call_id }))
}

pub fn call_reject(call_id: &str) -> Event {
    Event::new("call_reject", json!({ "callId": call_id, "reason": "Declined" }))
}

pub fn call_end(call_id: &str) -> Event {
    Event::new("call_end", json!({ "callId": call_id }))
}
