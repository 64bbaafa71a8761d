//! Chat transcript reconciler for the open conversation.
//!
//! SYSTEM CONTEXT
//! ==============
//! The transcript merges three sources: fetched history, live
//! `new_message` pushes, and optimistic local sends. An optimistic send
//! lives under a `temp-<uuid>` id until the server confirms it.
//!
//! Confirmation and the sender's own live echo race each other. Whichever
//! arrives second must not leave two records with the same server id, so
//! `confirm_send` drops the temporary record when the echo already landed.

#[cfg(test)]
#[path = "chat_test.rs"]
mod chat_test;

use time::OffsetDateTime;
use uuid::Uuid;

use crate::net::types::{DeliveryStatus, Message, MessageKind, TEMP_ID_PREFIX, UserSummary};

#[derive(Clone, Debug)]
pub struct Transcript {
    conversation_id: String,
    self_id: String,
    participant: Option<UserSummary>,
    messages: Vec<Message>,
    peer_typing: bool,
}

fn temp_id() -> String {
    format!("{TEMP_ID_PREFIX}{}", Uuid::new_v4())
}

impl Transcript {
    #[must_use]
    pub fn new(
        conversation_id: impl Into<String>,
        self_id: impl Into<String>,
        participant: Option<UserSummary>,
    ) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            self_id: self_id.into(),
            participant,
            messages: Vec::new(),
            peer_typing: false,
        }
    }

    #[must_use]
    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    #[must_use]
    pub fn participant(&self) -> Option<&UserSummary> {
        self.participant.as_ref()
    }

    /// Messages in display order (oldest first).
    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    #[must_use]
    pub fn peer_typing(&self) -> bool {
        self.peer_typing
    }

    fn contains(&self, message_id: &str) -> bool {
        self.messages.iter().any(|m| m.id == message_id)
    }

    fn is_peer(&self, user_id: &str) -> bool {
        match &self.participant {
            Some(participant) => participant.id == user_id,
            None => user_id != self.self_id,
        }
    }

    /// Replace the transcript with fetched history, oldest first.
    pub fn load_history(&mut self, mut history: Vec<Message>) {
        history.sort_by_key(|m| m.created_at);
        let mut seen = std::collections::HashSet::new();
        history.retain(|m| seen.insert(m.id.clone()));
        self.messages = history;
    }

    /// Insert an optimistic message. Returns `None` for blank content.
    pub fn begin_send(&mut self, content: &str, kind: MessageKind) -> Option<Message> {
        let content = content.trim();
        if content.is_empty() && kind == MessageKind::Text {
            return None;
        }
        let message = Message {
            id: temp_id(),
            conversation_id: Some(self.conversation_id.clone()),
            sender_id: self.self_id.clone(),
            content: content.to_owned(),
            kind,
            created_at: OffsetDateTime::now_utc(),
            status: DeliveryStatus::Sent,
            read_by: Vec::new(),
        };
        self.messages.push(message.clone());
        Some(message)
    }

    /// Swap the temporary record for the server-confirmed one.
    ///
    /// When the live echo already inserted the server id, the temporary
    /// record is removed instead. Returns `false` when `temp_id` is unknown.
    pub fn confirm_send(&mut self, temp_id: &str, mut confirmed: Message) -> bool {
        let Some(index) = self.messages.iter().position(|m| m.id == temp_id) else {
            tracing::debug!(%temp_id, "confirmation for unknown temporary message");
            return false;
        };
        if self.contains(&confirmed.id) {
            tracing::debug!(%temp_id, message_id = %confirmed.id, "echo arrived first; dropping temporary message");
            self.messages.remove(index);
            return true;
        }
        if confirmed.status != DeliveryStatus::Read {
            confirmed.status = DeliveryStatus::Delivered;
        }
        confirmed.conversation_id.get_or_insert_with(|| self.conversation_id.clone());
        self.messages[index] = confirmed;
        true
    }

    /// Roll back a failed send. Only the given temporary record is removed.
    pub fn fail_send(&mut self, temp_id: &str) -> Option<Message> {
        let index = self.messages.iter().position(|m| m.id == temp_id && m.is_pending())?;
        Some(self.messages.remove(index))
    }

    /// Append a pushed message unless its id is already present.
    pub fn apply_live_message(&mut self, message: Message) -> bool {
        if self.contains(&message.id) {
            return false;
        }
        if self.is_peer(&message.sender_id) {
            self.peer_typing = false;
        }
        self.messages.push(message);
        true
    }

    /// The other side read the conversation: the local user's messages gain
    /// `reader` and become `Read`. Returns how many messages changed.
    pub fn apply_messages_read(&mut self, reader: &str) -> usize {
        if reader == self.self_id {
            return self.mark_read_locally();
        }
        let self_id = self.self_id.clone();
        mark_read_by(&mut self.messages, reader, |m| m.sender_id == self_id && !m.is_pending())
    }

    /// The local user read the conversation: the peer's messages gain the
    /// local user and become `Read`. Returns how many messages changed.
    pub fn mark_read_locally(&mut self) -> usize {
        let self_id = self.self_id.clone();
        mark_read_by(&mut self.messages, &self_id, |m| m.sender_id != self_id)
    }

    /// True when a message from the peer has not been read locally.
    #[must_use]
    pub fn has_unread_from_peer(&self) -> bool {
        self.messages
            .iter()
            .any(|m| m.sender_id != self.self_id && m.status != DeliveryStatus::Read)
    }

    /// Apply `user_typing`. Typing by anyone other than the peer is ignored.
    pub fn set_peer_typing(&mut self, user_id: &str, is_typing: bool) -> bool {
        if !self.is_peer(user_id) {
            return false;
        }
        self.peer_typing = is_typing;
        true
    }

    /// Apply `user_status_change` when it concerns the peer.
    pub fn set_presence(&mut self, user_id: &str, is_online: bool, last_seen: Option<OffsetDateTime>) -> bool {
        let Some(participant) = self.participant.as_mut().filter(|p| p.id == user_id) else {
            return false;
        };
        participant.is_online = is_online;
        if last_seen.is_some() {
            participant.last_seen = last_seen;
        }
        true
    }
}

fn mark_read_by(messages: &mut [Message], reader: &str, select: impl Fn(&Message) -> bool) -> usize {
    let mut changed = 0;
    for message in messages.iter_mut().filter(|m| select(m)) {
        let already = message.status == DeliveryStatus::Read && message.read_by.iter().any(|r| r == reader);
        if already {
            continue;
        }
        if !message.read_by.iter().any(|r| r == reader) {
            message.read_by.push(reader.to_owned());
        }
        message.status = DeliveryStatus::Read;
        changed += 1;
    }
    changed
}
