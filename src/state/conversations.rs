//! Conversation list reconciler.
//!
//! SYSTEM CONTEXT
//! ==============
//! Holds the inbox as the user sees it: fetched pages merged with live
//! `new_message` pushes, most recently active conversation first. Ids are
//! unique across the list at all times.

#[cfg(test)]
#[path = "conversations_test.rs"]
mod conversations_test;

use std::collections::HashSet;

use time::OffsetDateTime;

use crate::net::types::{Conversation, ConversationPage, LastMessage, Message, Pagination};

/// How a fetched page combines with the current list.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PageMode {
    /// Initial load or pull-to-refresh: the page becomes the list.
    Replace,
    /// Load more: unseen conversations are appended.
    Append,
}

/// What a live message did to the list.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LiveOutcome {
    /// The conversation was updated and moved to the head.
    Promoted,
    /// No conversation with that id is loaded; nothing changed.
    Unknown,
}

#[derive(Clone, Debug, Default)]
pub struct ConversationList {
    items: Vec<Conversation>,
    pagination: Pagination,
}

/// Drop repeated ids, keeping the first occurrence.
fn dedupe(conversations: Vec<Conversation>) -> Vec<Conversation> {
    let mut seen = HashSet::new();
    conversations
        .into_iter()
        .filter(|conversation| {
            if seen.insert(conversation.id.clone()) {
                return true;
            }
            tracing::warn!(conversation_id = %conversation.id, "dropping duplicate conversation");
            false
        })
        .collect()
}

impl ConversationList {
    #[must_use]
    pub fn items(&self) -> &[Conversation] {
        &self.items
    }

    #[must_use]
    pub fn get(&self, conversation_id: &str) -> Option<&Conversation> {
        self.items.iter().find(|c| c.id == conversation_id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[must_use]
    pub fn pagination(&self) -> Pagination {
        self.pagination
    }

    /// Page to request for "load more", or `None` when the server has no more.
    #[must_use]
    pub fn next_page(&self) -> Option<u32> {
        self.pagination.has_more.then(|| self.pagination.current_page.saturating_add(1))
    }

    /// Merge a fetched page. Returns how many conversations were added.
    pub fn apply_page(&mut self, page: ConversationPage, mode: PageMode) -> usize {
        let mut incoming = dedupe(page.conversations);
        incoming.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        self.pagination = page.pagination;

        match mode {
            PageMode::Replace => {
                self.items = incoming;
                self.items.len()
            }
            PageMode::Append => {
                let known: HashSet<&str> = self.items.iter().map(|c| c.id.as_str()).collect();
                let fresh: Vec<Conversation> =
                    incoming.into_iter().filter(|c| !known.contains(c.id.as_str())).collect();
                let added = fresh.len();
                self.items.extend(fresh);
                added
            }
        }
    }

    /// Apply a live `new_message`: refresh the preview, bump the unread
    /// count by one and move the conversation to the head.
    pub fn apply_live_message(&mut self, conversation_id: &str, message: &Message) -> LiveOutcome {
        let Some(index) = self.items.iter().position(|c| c.id == conversation_id) else {
            tracing::debug!(%conversation_id, message_id = %message.id, "live message for unknown conversation");
            return LiveOutcome::Unknown;
        };
        let mut conversation = self.items.remove(index);
        conversation.last_message = Some(LastMessage::from(message));
        conversation.unread_count = conversation.unread_count.saturating_add(1);
        conversation.updated_at = OffsetDateTime::now_utc().max(message.created_at);
        self.items.insert(0, conversation);
        LiveOutcome::Promoted
    }

    /// Record a message the local user just sent: refresh the preview and
    /// move the conversation to the head without touching the unread count.
    pub fn apply_sent_message(&mut self, conversation_id: &str, message: &Message) -> LiveOutcome {
        let Some(index) = self.items.iter().position(|c| c.id == conversation_id) else {
            return LiveOutcome::Unknown;
        };
        let mut conversation = self.items.remove(index);
        conversation.last_message = Some(LastMessage::from(message));
        conversation.updated_at = conversation.updated_at.max(message.created_at);
        self.items.insert(0, conversation);
        LiveOutcome::Promoted
    }

    /// Insert a conversation obtained outside the page flow (get-or-create)
    /// at the head, unless it is already listed.
    pub fn upsert_front(&mut self, conversation: Conversation) {
        if self.get(&conversation.id).is_some() {
            return;
        }
        self.items.insert(0, conversation);
    }

    /// Zero the unread count. Returns `false` for an unknown id.
    pub fn mark_read(&mut self, conversation_id: &str) -> bool {
        match self.items.iter_mut().find(|c| c.id == conversation_id) {
            Some(conversation) => {
                conversation.unread_count = 0;
                true
            }
            None => false,
        }
    }

    /// Conversations whose participant name, username or last message
    /// contains `query`, case-insensitively. A blank query matches all.
    #[must_use]
    pub fn filter(&self, query: &str) -> Vec<&Conversation> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return self.items.iter().collect();
        }
        self.items
            .iter()
            .filter(|c| {
                c.participant.name.to_lowercase().contains(&needle)
                    || c.participant.username.to_lowercase().contains(&needle)
                    || c.last_message
                        .as_ref()
                        .is_some_and(|m| m.content.to_lowercase().contains(&needle))
            })
            .collect()
    }

    #[must_use]
    pub fn total_unread(&self) -> u32 {
        self.items.iter().map(|c| c.unread_count).fold(0, u32::saturating_add)
    }

    /// Update the participant's presence in every conversation with them.
    pub fn set_presence(&mut self, user_id: &str, is_online: bool, last_seen: Option<OffsetDateTime>) {
        for conversation in self.items.iter_mut().filter(|c| c.participant.id == user_id) {
            conversation.participant.is_online = is_online;
            if last_seen.is_some() {
                conversation.participant.last_seen = last_seen;
            }
        }
    }
}
