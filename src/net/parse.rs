//! Normalization of loose backend JSON into domain records.
//!
//! The backend mixes `_id`/`id`, sends senders either as bare ids or as
//! populated user objects, and leaves timestamps out of some payloads. Every
//! `parse_*` function here returns `None` for records missing their identity
//! and fills the remaining gaps with the same defaults the mobile client used.

#[cfg(test)]
#[path = "parse_test.rs"]
mod parse_test;

use serde_json::Value;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use super::types::{
    AuthUser, Conversation, ConversationPage, DeliveryStatus, FriendRequest, LastMessage, Message, MessageKind,
    Notification, NotificationKind, Pagination, UserSummary,
};

pub(crate) fn pick_str<'a>(data: &'a Value, keys: &[&str]) -> Option<&'a str> {
    for key in keys {
        if let Some(value) = data.get(key).and_then(Value::as_str) {
            return Some(value);
        }
    }
    None
}

/// Extract an id from either a bare string or an object carrying `_id`/`id`.
pub(crate) fn id_of(value: &Value) -> Option<String> {
    match value {
        Value::String(id) if !id.is_empty() => Some(id.clone()),
        Value::Object(_) => pick_str(value, &["_id", "id"])
            .filter(|id| !id.is_empty())
            .map(str::to_owned),
        _ => None,
    }
}

pub(crate) fn parse_timestamp(value: Option<&Value>) -> Option<OffsetDateTime> {
    let raw = value?.as_str()?;
    match OffsetDateTime::parse(raw, &Rfc3339) {
        Ok(ts) => Some(ts),
        Err(error) => {
            tracing::debug!(%raw, %error, "ignoring unparsable timestamp");
            None
        }
    }
}

fn first_timestamp(data: &Value, keys: &[&str]) -> Option<OffsetDateTime> {
    keys.iter().find_map(|key| parse_timestamp(data.get(key)))
}

pub(crate) fn count_of(value: Option<&Value>) -> u32 {
    value
        .and_then(Value::as_u64)
        .map_or(0, |n| u32::try_from(n).unwrap_or(u32::MAX))
}

pub fn parse_user(data: &Value) -> Option<UserSummary> {
    let id = id_of(data)?;
    Some(UserSummary {
        id,
        name: pick_str(data, &["name", "fullName"]).unwrap_or("Unknown User").to_owned(),
        username: pick_str(data, &["username"]).unwrap_or("unknown").to_owned(),
        profile_picture: pick_str(data, &["profilePicture", "avatar"]).map(str::to_owned),
        is_online: data.get("isOnline").and_then(Value::as_bool).unwrap_or(false),
        last_seen: parse_timestamp(data.get("lastSeen")),
    })
}

/// Parse a message record. `self_id` decides whether it already counts as read.
pub fn parse_message(data: &Value, self_id: &str) -> Option<Message> {
    let id = id_of(data)?;
    let sender_id = data
        .get("senderId")
        .or_else(|| data.get("sender"))
        .and_then(id_of)
        .unwrap_or_default();
    let read_by = data
        .get("readBy")
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(id_of).collect::<Vec<_>>())
        .unwrap_or_default();
    let status = if read_by.iter().any(|reader| reader == self_id) {
        DeliveryStatus::Read
    } else {
        DeliveryStatus::Delivered
    };

    Some(Message {
        id,
        conversation_id: data.get("conversationId").and_then(id_of),
        sender_id,
        content: pick_str(data, &["content"]).unwrap_or_default().to_owned(),
        kind: MessageKind::from_wire(pick_str(data, &["type"]).unwrap_or("text")),
        created_at: first_timestamp(data, &["createdAt"]).unwrap_or_else(OffsetDateTime::now_utc),
        status,
        read_by,
    })
}

/// Parse `lastMessage`, which the backend sends either populated or as a bare string.
fn parse_last_message(conversation: &Value, fallback_ts: OffsetDateTime) -> Option<LastMessage> {
    let conversation_id = id_of(conversation).unwrap_or_default();
    match conversation.get("lastMessage")? {
        Value::String(content) => Some(LastMessage {
            id: format!("{conversation_id}_msg"),
            content: content.clone(),
            sender_id: String::new(),
            created_at: fallback_ts,
            kind: MessageKind::Text,
        }),
        last @ Value::Object(_) => Some(LastMessage {
            id: id_of(last).unwrap_or_else(|| format!("{conversation_id}_msg")),
            content: pick_str(last, &["content"]).unwrap_or_default().to_owned(),
            sender_id: last.get("senderId").and_then(id_of).unwrap_or_default(),
            created_at: first_timestamp(last, &["createdAt"]).unwrap_or(fallback_ts),
            kind: MessageKind::from_wire(pick_str(last, &["type"]).unwrap_or("text")),
        }),
        _ => None,
    }
}

/// Parse a conversation row. Rows without a participant id are skipped.
pub fn parse_conversation(data: &Value, self_id: &str) -> Option<Conversation> {
    let id = id_of(data)?;
    let Some(participant) = data.get("participant").and_then(parse_user) else {
        tracing::warn!(conversation_id = %id, "skipping conversation without participant");
        return None;
    };

    let created_at = first_timestamp(data, &["createdAt"]).unwrap_or_else(OffsetDateTime::now_utc);
    let updated_at = first_timestamp(data, &["updatedAt", "createdAt"]).unwrap_or(created_at);

    let unread_count = match data.get("unreadCounts").and_then(Value::as_array) {
        Some(counts) => counts
            .iter()
            .find(|entry| entry.get("userId").and_then(id_of).as_deref() == Some(self_id))
            .map_or(0, |entry| count_of(entry.get("count"))),
        None => count_of(data.get("unreadCount")),
    };

    Some(Conversation {
        last_message: parse_last_message(data, updated_at),
        id,
        participant,
        unread_count,
        updated_at,
        created_at,
    })
}

pub fn parse_pagination(data: Option<&Value>, page: u32, fetched: usize) -> Pagination {
    let fallback = Pagination {
        current_page: page,
        total_pages: 1,
        total_count: u32::try_from(fetched).unwrap_or(u32::MAX),
        has_more: false,
    };
    let Some(data) = data.filter(|value| value.is_object()) else {
        return fallback;
    };
    Pagination {
        current_page: data
            .get("currentPage")
            .and_then(Value::as_u64)
            .map_or(page, |n| u32::try_from(n).unwrap_or(u32::MAX)),
        total_pages: count_of(data.get("totalPages")).max(1),
        total_count: count_of(data.get("totalCount")),
        has_more: data.get("hasMore").and_then(Value::as_bool).unwrap_or(false),
    }
}

/// Parse a `GET /conversations` body into a normalized page (not yet de-duplicated).
pub fn parse_conversation_page(body: &Value, self_id: &str, page: u32) -> ConversationPage {
    let conversations = body
        .get("conversations")
        .and_then(Value::as_array)
        .map(|rows| {
            rows.iter()
                .filter_map(|row| parse_conversation(row, self_id))
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();
    let pagination = parse_pagination(body.get("pagination"), page, conversations.len());
    ConversationPage { conversations, pagination }
}

pub fn parse_notification(data: &Value) -> Option<Notification> {
    let id = id_of(data)?;
    let sender = data.get("sender").and_then(parse_user);
    Some(Notification {
        id,
        kind: NotificationKind::from_wire(pick_str(data, &["type"]).unwrap_or_default()),
        sender,
        message: pick_str(data, &["message", "content"]).unwrap_or_default().to_owned(),
        post_id: data.get("postId").and_then(id_of),
        is_read: data
            .get("isRead")
            .or_else(|| data.get("read"))
            .and_then(Value::as_bool)
            .unwrap_or(false),
        created_at: first_timestamp(data, &["createdAt"]).unwrap_or_else(OffsetDateTime::now_utc),
        metadata: data.get("metadata").cloned().unwrap_or(Value::Null),
    })
}

pub fn parse_notifications(items: Option<&Value>) -> Vec<Notification> {
    items
        .and_then(Value::as_array)
        .map(|rows| rows.iter().filter_map(parse_notification).collect())
        .unwrap_or_default()
}

/// Parse the signed-in user. The backend only sends a display name, so a
/// missing username is derived from it (`"Ann Lee"` becomes `ann_lee`).
pub fn parse_auth_user(data: &Value) -> Option<AuthUser> {
    let id = id_of(data)?;
    let full_name = pick_str(data, &["name", "fullName"]).unwrap_or_default().to_owned();
    let username = pick_str(data, &["username"])
        .map(str::to_owned)
        .unwrap_or_else(|| full_name.to_lowercase().split_whitespace().collect::<Vec<_>>().join("_"));
    Some(AuthUser {
        id,
        email: pick_str(data, &["email"]).unwrap_or_default().to_owned(),
        username,
        full_name,
        profile_picture: pick_str(data, &["profilePicture"]).map(str::to_owned),
        bio: pick_str(data, &["bio"]).map(str::to_owned),
    })
}

pub fn parse_friend_request(data: &Value) -> Option<FriendRequest> {
    Some(FriendRequest {
        id: id_of(data)?,
        sender: data.get("sender").or_else(|| data.get("from")).and_then(parse_user),
        created_at: parse_timestamp(data.get("createdAt")),
    })
}
