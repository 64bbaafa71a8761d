//! Session orchestrator.
//!
//! Owns the sync state, the backend and the realtime connection, and exposes
//! the user-level operations. Every mutation takes `&mut self`, so state
//! changes are serialized without locks; the only concurrent piece is the
//! connection's socket task, reached through channels.
//!
//! Reconcilers never do I/O. The session applies a local change first
//! (optimistic), then talks to the server, then reconciles or rolls back.

#[cfg(test)]
#[path = "session_test.rs"]
mod session_test;

use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::net::api::{ApiError, Backend};
use crate::net::connection::{Connection, ConnectionError, ConnectionStatus};
use crate::net::dispatch::{Outcome, dispatch_event};
use crate::net::events::{self, CallKind, ServerEvent};
use crate::net::retry::retry_with_backoff;
use crate::net::types::{Conversation, FriendAction, Message, MessageKind};
use crate::state::{CallError, PageMode, SyncState, Transcript};

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Connection(#[from] ConnectionError),
    #[error(transparent)]
    Call(#[from] CallError),
    #[error("no chat is open")]
    NoChatOpen,
    #[error("message is empty")]
    EmptyMessage,
    #[error("conversation not found: {0}")]
    UnknownConversation(String),
    #[error("notification not found: {0}")]
    UnknownNotification(String),
    #[error("notification {0} is not a friend request")]
    NotFriendRequest(String),
}

pub struct Session<B> {
    backend: B,
    config: ClientConfig,
    state: SyncState,
    connection: Option<Connection>,
}

impl<B: Backend> Session<B> {
    #[must_use]
    pub fn new(backend: B, config: ClientConfig, self_id: impl Into<String>) -> Self {
        Self { backend, config, state: SyncState::new(self_id), connection: None }
    }

    #[must_use]
    pub fn state(&self) -> &SyncState {
        &self.state
    }

    #[must_use]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    // =========================================================================
    // CONNECTION
    // =========================================================================

    /// Open the realtime socket and subscribe to notifications.
    ///
    /// Any previous connection is closed first; a new token always means a
    /// new connection.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Connection`] when the socket cannot be opened.
    /// The session stays usable over HTTP.
    pub async fn connect(&mut self, token: &str) -> Result<(), SessionError> {
        self.disconnect().await;
        self.state.connection = ConnectionStatus::Connecting;
        match Connection::connect(&self.config, token).await {
            Ok(connection) => {
                self.state.connection = connection.status();
                self.connection = Some(connection);
                self.emit(events::subscribe_notifications());
                self.emit(events::get_unread_count());
                Ok(())
            }
            Err(error) => {
                warn!(%error, "socket connect failed");
                self.state.connection = ConnectionStatus::Disconnected;
                Err(error.into())
            }
        }
    }

    pub async fn disconnect(&mut self) {
        if let Some(mut connection) = self.connection.take() {
            connection.disconnect().await;
        }
        self.state.connection = ConnectionStatus::Disconnected;
    }

    /// Fire-and-forget emit. Returns `false` when no socket is open.
    fn emit(&self, event: packets::Event) -> bool {
        match &self.connection {
            Some(connection) => connection.emit(event),
            None => {
                debug!(event = %event.name, "not connected; event dropped");
                false
            }
        }
    }

    /// Wait for the next server event, apply it and run its follow-up.
    /// Returns `None` once the socket has closed.
    pub async fn next_update(&mut self) -> Option<(ServerEvent, Outcome)> {
        let connection = self.connection.as_mut()?;
        let Some(raw) = connection.next_event().await else {
            info!("socket closed");
            self.connection = None;
            self.state.connection = ConnectionStatus::Disconnected;
            return None;
        };
        self.state.connection = connection.status();
        let event = ServerEvent::parse(&raw, &self.state.self_id);
        let outcome = self.handle_event(event.clone()).await;
        Some((event, outcome))
    }

    /// Apply one server event and run the follow-up its outcome asks for.
    pub async fn handle_event(&mut self, event: ServerEvent) -> Outcome {
        let outcome = dispatch_event(event, &mut self.state);
        match &outcome {
            Outcome::MarkChatRead(conversation_id) => {
                if let Err(error) = self.mark_chat_read().await {
                    warn!(%conversation_id, %error, "mirroring read failed");
                }
            }
            Outcome::UnknownConversation(conversation_id) => {
                if let Err(error) = self.discover_conversation(conversation_id).await {
                    warn!(%conversation_id, %error, "refetch for unknown conversation failed");
                }
            }
            Outcome::Applied | Outcome::Ignored => {}
        }
        outcome
    }

    /// Look for a conversation that a live message referenced but the list
    /// lacks, on the first page, and put it at the head if found.
    async fn discover_conversation(&mut self, conversation_id: &str) -> Result<bool, SessionError> {
        let page = self.backend.list_conversations(1).await?;
        let Some(found) = page.conversations.into_iter().find(|c| c.id == conversation_id) else {
            debug!(%conversation_id, "conversation still unknown after refetch");
            return Ok(false);
        };
        self.state.conversations.upsert_front(found);
        Ok(true)
    }

    // =========================================================================
    // CONVERSATIONS
    // =========================================================================

    /// Initial load or refresh of the conversation list (with retry).
    ///
    /// # Errors
    ///
    /// Returns the last [`ApiError`] once the retries are used up.
    pub async fn load_conversations(&mut self) -> Result<usize, SessionError> {
        let backend = &self.backend;
        let page = retry_with_backoff(self.config.retry, "conversations", || backend.list_conversations(1)).await?;
        let added = self.state.conversations.apply_page(page, PageMode::Replace);
        info!(count = added, "conversations loaded");
        Ok(added)
    }

    /// Fetch the next page, if the server has more. Returns how many were added.
    ///
    /// # Errors
    ///
    /// Returns the last [`ApiError`] once the retries are used up.
    pub async fn load_more_conversations(&mut self) -> Result<usize, SessionError> {
        let Some(page_number) = self.state.conversations.next_page() else {
            return Ok(0);
        };
        let backend = &self.backend;
        let page =
            retry_with_backoff(self.config.retry, "conversations", || backend.list_conversations(page_number)).await?;
        Ok(self.state.conversations.apply_page(page, PageMode::Append))
    }

    /// Load every page of the conversation list.
    ///
    /// # Errors
    ///
    /// Stops at the first page that fails after retries.
    pub async fn load_all_conversations(&mut self) -> Result<usize, SessionError> {
        let mut total = self.load_conversations().await?;
        while self.state.conversations.next_page().is_some() {
            let before = self.state.conversations.pagination().current_page;
            total += self.load_more_conversations().await?;
            if self.state.conversations.pagination().current_page <= before {
                warn!(page = before, "server did not advance pagination; stopping");
                break;
            }
        }
        Ok(total)
    }

    // =========================================================================
    // CHAT
    // =========================================================================

    /// Get or create the conversation with `participant_id` and open it.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] when the lookup, creation or history fetch fails.
    pub async fn open_chat_with(&mut self, participant_id: &str) -> Result<&Transcript, SessionError> {
        let conversation = match self.backend.conversation_with(participant_id).await {
            Ok(Some(conversation)) => conversation,
            Ok(None) => self.backend.create_conversation(participant_id).await?,
            Err(error) => {
                warn!(%participant_id, %error, "conversation lookup failed; creating");
                self.backend.create_conversation(participant_id).await?
            }
        };
        self.state.conversations.upsert_front(conversation.clone());
        self.open(conversation).await
    }

    /// Open a conversation already in the list.
    ///
    /// # Errors
    ///
    /// [`SessionError::UnknownConversation`] when it is not loaded, or
    /// [`ApiError`] when the history fetch fails.
    pub async fn open_conversation(&mut self, conversation_id: &str) -> Result<&Transcript, SessionError> {
        let conversation = self
            .state
            .conversations
            .get(conversation_id)
            .cloned()
            .ok_or_else(|| SessionError::UnknownConversation(conversation_id.to_owned()))?;
        self.open(conversation).await
    }

    async fn open(&mut self, conversation: Conversation) -> Result<&Transcript, SessionError> {
        let history = self.backend.list_messages(&conversation.id).await?;
        let mut transcript = Transcript::new(&conversation.id, &self.state.self_id, Some(conversation.participant));
        transcript.load_history(history);
        let needs_read = transcript.has_unread_from_peer() || conversation.unread_count > 0;
        self.state.chat = Some(transcript);
        if needs_read {
            if let Err(error) = self.mark_chat_read().await {
                warn!(conversation_id = %conversation.id, %error, "marking read on open failed");
            }
        }
        self.state.chat.as_ref().ok_or(SessionError::NoChatOpen)
    }

    pub fn close_chat(&mut self) {
        if let Some(chat) = self.state.chat.take() {
            self.emit(events::typing_stop(chat.conversation_id()));
        }
    }

    /// Send a message in the open chat, optimistically.
    ///
    /// The message shows up at once under a temporary id. On success it is
    /// swapped for the server record; on failure it is removed again and the
    /// error is returned.
    ///
    /// # Errors
    ///
    /// [`SessionError::NoChatOpen`], [`SessionError::EmptyMessage`], or the
    /// [`ApiError`] from the failed send.
    pub async fn send_message(&mut self, content: &str, kind: MessageKind) -> Result<Message, SessionError> {
        let chat = self.state.chat.as_mut().ok_or(SessionError::NoChatOpen)?;
        let conversation_id = chat.conversation_id().to_owned();
        let temp = chat.begin_send(content, kind).ok_or(SessionError::EmptyMessage)?;
        self.emit(events::typing_stop(&conversation_id));

        match self.backend.send_message(&conversation_id, &temp.content, &temp.kind).await {
            Ok(confirmed) => {
                if let Some(chat) = self.state.chat_for(&conversation_id) {
                    chat.confirm_send(&temp.id, confirmed.clone());
                }
                self.state.conversations.apply_sent_message(&conversation_id, &confirmed);
                debug!(%conversation_id, message_id = %confirmed.id, "message sent");
                Ok(confirmed)
            }
            Err(error) => {
                warn!(%conversation_id, %error, "send failed; rolling back");
                if let Some(chat) = self.state.chat_for(&conversation_id) {
                    chat.fail_send(&temp.id);
                }
                Err(error.into())
            }
        }
    }

    /// Mark the open chat read locally, then mirror it over the socket and HTTP.
    ///
    /// # Errors
    ///
    /// [`SessionError::NoChatOpen`], or the [`ApiError`] from the HTTP call
    /// (local state stays read).
    pub async fn mark_chat_read(&mut self) -> Result<(), SessionError> {
        let chat = self.state.chat.as_mut().ok_or(SessionError::NoChatOpen)?;
        chat.mark_read_locally();
        let conversation_id = chat.conversation_id().to_owned();
        self.mark_conversation_read(&conversation_id).await
    }

    /// Zero a conversation's unread count and tell the server.
    ///
    /// # Errors
    ///
    /// Returns the [`ApiError`] from `PUT /conversations/{id}/read`.
    pub async fn mark_conversation_read(&mut self, conversation_id: &str) -> Result<(), SessionError> {
        self.state.conversations.mark_read(conversation_id);
        self.emit(events::mark_messages_read(conversation_id));
        self.backend.mark_conversation_read(conversation_id).await?;
        Ok(())
    }

    /// Emit `typing_start` / `typing_stop` for the open chat.
    pub fn set_typing(&self, active: bool) -> bool {
        let Some(chat) = self.state.chat.as_ref() else {
            return false;
        };
        let event = if active {
            events::typing_start(chat.conversation_id())
        } else {
            events::typing_stop(chat.conversation_id())
        };
        self.emit(event)
    }

    // =========================================================================
    // NOTIFICATIONS
    // =========================================================================

    /// Replace the notification feed with a fresh fetch.
    ///
    /// # Errors
    ///
    /// Returns the [`ApiError`] from `GET /notifications`.
    pub async fn load_notifications(&mut self) -> Result<usize, SessionError> {
        let snapshot = self.backend.list_notifications().await?;
        self.state.notifications.load(snapshot);
        Ok(self.state.notifications.items().len())
    }

    /// Re-read the unread badge over HTTP, for when the socket is down.
    ///
    /// # Errors
    ///
    /// Returns the [`ApiError`] from `GET /notifications/unread-count`.
    pub async fn refresh_unread_count(&mut self) -> Result<u32, SessionError> {
        let count = self.backend.unread_count().await?;
        self.state.notifications.set_unread_count(count);
        Ok(count)
    }

    /// Optimistically mark one notification read and mirror it.
    ///
    /// # Errors
    ///
    /// [`SessionError::UnknownNotification`] when it is not in the feed.
    pub fn mark_notification_read(&mut self, notification_id: &str) -> Result<bool, SessionError> {
        if self.state.notifications.get(notification_id).is_none() {
            return Err(SessionError::UnknownNotification(notification_id.to_owned()));
        }
        let changed = self.state.notifications.mark_read(notification_id);
        self.emit(events::mark_notification_read(notification_id));
        Ok(changed)
    }

    pub fn mark_all_notifications_read(&mut self) {
        self.state.notifications.mark_all_read();
        self.emit(events::mark_all_notifications_read());
    }

    /// Optimistically delete a notification and mirror it.
    ///
    /// # Errors
    ///
    /// [`SessionError::UnknownNotification`] when it is not in the feed.
    pub fn delete_notification(&mut self, notification_id: &str) -> Result<(), SessionError> {
        self.state
            .notifications
            .delete(notification_id)
            .ok_or_else(|| SessionError::UnknownNotification(notification_id.to_owned()))?;
        self.emit(events::delete_notification(notification_id));
        Ok(())
    }

    /// Accept or reject the friend request behind a notification. The
    /// notification is removed only after the server agreed.
    ///
    /// # Errors
    ///
    /// [`SessionError::UnknownNotification`], [`SessionError::NotFriendRequest`],
    /// or the [`ApiError`] from `PUT /friends/{requestId}`.
    pub async fn resolve_friend_request(
        &mut self,
        notification_id: &str,
        action: FriendAction,
    ) -> Result<(), SessionError> {
        let notification = self
            .state
            .notifications
            .get(notification_id)
            .ok_or_else(|| SessionError::UnknownNotification(notification_id.to_owned()))?;
        let request_id = notification
            .friend_request_id()
            .ok_or_else(|| SessionError::NotFriendRequest(notification_id.to_owned()))?
            .to_owned();
        self.backend.respond_friend_request(&request_id, action).await?;
        self.state.notifications.delete(notification_id);
        Ok(())
    }

    // =========================================================================
    // CALLS
    // =========================================================================

    /// Call the participant of the open chat.
    ///
    /// # Errors
    ///
    /// [`SessionError::NoChatOpen`] or [`CallError::Busy`].
    pub fn start_call(&mut self, kind: CallKind) -> Result<(), SessionError> {
        let chat = self.state.chat.as_ref().ok_or(SessionError::NoChatOpen)?;
        let recipient = chat.participant().map(|p| p.id.clone()).unwrap_or_default();
        let conversation_id = chat.conversation_id().to_owned();
        let event = self.state.call.initiate(&conversation_id, &recipient, kind)?;
        self.emit(event);
        Ok(())
    }

    /// # Errors
    ///
    /// [`CallError::NoIncomingCall`] when nothing is ringing.
    pub fn accept_call(&mut self) -> Result<(), SessionError> {
        let event = self.state.call.accept()?;
        self.emit(event);
        Ok(())
    }

    /// # Errors
    ///
    /// [`CallError::NoIncomingCall`] when nothing is ringing.
    pub fn reject_call(&mut self) -> Result<(), SessionError> {
        let event = self.state.call.reject()?;
        self.emit(event);
        Ok(())
    }

    /// # Errors
    ///
    /// [`CallError::NoCall`] when no call is running.
    pub fn hang_up(&mut self) -> Result<(), SessionError> {
        if let Some(event) = self.state.call.hang_up()? {
            self.emit(event);
        }
        Ok(())
    }
}
