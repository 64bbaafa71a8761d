//! Domain records for conversations, messages and notifications.
//!
//! DESIGN
//! ======
//! These are the normalized shapes the reconcilers work on. The backend's raw
//! JSON is loose (`_id` vs `id`, populated vs bare sender ids, optional
//! timestamps), so conversion happens once in `net::parse` and everything past
//! that boundary can rely on these invariants.

#[cfg(test)]
#[path = "types_test.rs"]
mod types_test;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Prefix marking a client-generated id for a message still in flight.
pub const TEMP_ID_PREFIX: &str = "temp-";

/// Longest last-message preview before it is cut with `...`.
pub const PREVIEW_MAX_CHARS: usize = 50;

/// A user as embedded in conversations, messages and notifications.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: String,
    pub name: String,
    pub username: String,
    pub profile_picture: Option<String>,
    #[serde(default)]
    pub is_online: bool,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub last_seen: Option<OffsetDateTime>,
}

/// Content type of a message.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    #[default]
    Text,
    Image,
    Video,
    File,
    #[serde(untagged)]
    Other(String),
}

impl MessageKind {
    #[must_use]
    pub fn from_wire(raw: &str) -> Self {
        match raw {
            "text" => Self::Text,
            "image" => Self::Image,
            "video" => Self::Video,
            "file" => Self::File,
            other => Self::Other(other.to_owned()),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Text => "text",
            Self::Image => "image",
            Self::Video => "video",
            Self::File => "file",
            Self::Other(raw) => raw,
        }
    }

    /// Label shown in previews when a message has no text content.
    #[must_use]
    pub fn placeholder(&self) -> &'static str {
        match self {
            Self::Image => "[image]",
            Self::Video => "[video]",
            Self::File => "[file]",
            Self::Text | Self::Other(_) => "Message",
        }
    }
}

/// Delivery state of a message as seen by the local user.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    /// Optimistically inserted; the server has not confirmed it yet.
    #[default]
    Sent,
    Delivered,
    Read,
}

/// One chat message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Server id, or `temp-<uuid>` while the send is in flight.
    pub id: String,
    pub conversation_id: Option<String>,
    pub sender_id: String,
    pub content: String,
    pub kind: MessageKind,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub status: DeliveryStatus,
    #[serde(default)]
    pub read_by: Vec<String>,
}

impl Message {
    /// True while this record carries a client-generated id.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.id.starts_with(TEMP_ID_PREFIX)
    }
}

/// Summary of the newest message in a conversation, used for list previews.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastMessage {
    pub id: String,
    pub content: String,
    pub sender_id: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub kind: MessageKind,
}

impl LastMessage {
    /// Short preview text for the conversation list.
    #[must_use]
    pub fn preview(&self) -> String {
        if self.content.is_empty() {
            return self.kind.placeholder().to_owned();
        }
        if self.content.chars().count() > PREVIEW_MAX_CHARS {
            let cut: String = self.content.chars().take(PREVIEW_MAX_CHARS).collect();
            return format!("{cut}...");
        }
        self.content.clone()
    }
}

impl From<&Message> for LastMessage {
    fn from(message: &Message) -> Self {
        Self {
            id: message.id.clone(),
            content: message.content.clone(),
            sender_id: message.sender_id.clone(),
            created_at: message.created_at,
            kind: message.kind.clone(),
        }
    }
}

/// A one-to-one conversation as listed in the inbox.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: String,
    pub participant: UserSummary,
    pub last_message: Option<LastMessage>,
    pub unread_count: u32,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Server pagination cursor for the conversation list.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub current_page: u32,
    pub total_pages: u32,
    pub total_count: u32,
    pub has_more: bool,
}

impl Default for Pagination {
    fn default() -> Self {
        Self { current_page: 1, total_pages: 1, total_count: 0, has_more: false }
    }
}

/// One fetched page of conversations, already normalized.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConversationPage {
    pub conversations: Vec<Conversation>,
    pub pagination: Pagination,
}

/// Notification categories pushed by the backend.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    FriendRequest,
    PostLike,
    PostComment,
    FriendRequestAccepted,
    PostShare,
    Mention,
    #[serde(untagged)]
    Other(String),
}

impl NotificationKind {
    #[must_use]
    pub fn from_wire(raw: &str) -> Self {
        match raw {
            "friend_request" => Self::FriendRequest,
            "post_like" | "like" => Self::PostLike,
            "post_comment" | "comment" => Self::PostComment,
            "friend_request_accepted" => Self::FriendRequestAccepted,
            "post_share" => Self::PostShare,
            "mention" => Self::Mention,
            other => Self::Other(other.to_owned()),
        }
    }
}

/// One entry in the notification feed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    pub kind: NotificationKind,
    pub sender: Option<UserSummary>,
    pub message: String,
    pub post_id: Option<String>,
    pub is_read: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl Notification {
    /// Friend-request id carried in `metadata.requestId`, for actionable requests.
    #[must_use]
    pub fn friend_request_id(&self) -> Option<&str> {
        if self.kind != NotificationKind::FriendRequest {
            return None;
        }
        self.metadata.get("requestId").and_then(serde_json::Value::as_str)
    }
}

/// The authenticated user, as returned by sign-in.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthUser {
    pub id: String,
    pub email: String,
    pub username: String,
    pub full_name: String,
    pub profile_picture: Option<String>,
    pub bio: Option<String>,
}

/// Answer to a pending friend request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FriendAction {
    Accept,
    Reject,
}

impl FriendAction {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Accept => "accept",
            Self::Reject => "reject",
        }
    }
}

/// A pending incoming friend request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FriendRequest {
    pub id: String,
    pub sender: Option<UserSummary>,
    pub created_at: Option<OffsetDateTime>,
}

/// Result of `GET /notifications`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NotificationSnapshot {
    pub notifications: Vec<Notification>,
    pub unread_count: u32,
}
