//! Route typed server events into the reconcilers.
//!
//! `dispatch_event` is pure state mutation. It never touches the network;
//! follow-up work (mirroring a read, refetching the list) is reported as an
//! [`Outcome`] for the session to act on.

#[cfg(test)]
#[path = "dispatch_test.rs"]
mod dispatch_test;

use tracing::debug;

use super::events::ServerEvent;
use crate::state::{LiveOutcome, SyncState};

/// What the session should do after an event was applied.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// State changed; nothing else to do.
    Applied,
    /// Nothing changed (duplicate, stale or unrecognized event).
    Ignored,
    /// A live message named a conversation that is not loaded. It was
    /// dropped; the session may refetch the list.
    UnknownConversation(String),
    /// A peer message landed in the open chat. The session mirrors the read
    /// to the server for this conversation.
    MarkChatRead(String),
}

fn applied(changed: bool) -> Outcome {
    if changed { Outcome::Applied } else { Outcome::Ignored }
}

/// Apply one server event to `state`.
///
/// A live message always adds one unread to its listed conversation. When
/// that conversation is the open chat the count is then zeroed again, since
/// the message is already on screen.
pub fn dispatch_event(event: ServerEvent, state: &mut SyncState) -> Outcome {
    match event {
        ServerEvent::NewMessage { conversation_id, message } => {
            let listed = state.conversations.apply_live_message(&conversation_id, &message);
            let from_peer = message.sender_id != state.self_id;
            let in_open_chat = match state.chat_for(&conversation_id) {
                Some(chat) => {
                    chat.apply_live_message(message);
                    true
                }
                None => false,
            };
            if in_open_chat {
                state.conversations.mark_read(&conversation_id);
                if from_peer {
                    return Outcome::MarkChatRead(conversation_id);
                }
                return Outcome::Applied;
            }
            match listed {
                LiveOutcome::Promoted => Outcome::Applied,
                LiveOutcome::Unknown => Outcome::UnknownConversation(conversation_id),
            }
        }
        ServerEvent::MessagesRead { conversation_id, read_by } => {
            if read_by == state.self_id {
                state.conversations.mark_read(&conversation_id);
            }
            let changed = state.chat_for(&conversation_id).map_or(0, |chat| chat.apply_messages_read(&read_by));
            applied(changed > 0 || read_by == state.self_id)
        }
        ServerEvent::NewNotification(notification) => applied(state.notifications.apply_new(notification)),
        ServerEvent::UnreadCountUpdated(count) => {
            state.notifications.set_unread_count(count);
            Outcome::Applied
        }
        ServerEvent::UserTyping { conversation_id, user_id, is_typing } => applied(
            state
                .chat_for(&conversation_id)
                .is_some_and(|chat| chat.set_peer_typing(&user_id, is_typing)),
        ),
        ServerEvent::UserStatusChange { user_id, is_online, last_seen } => {
            state.conversations.set_presence(&user_id, is_online, last_seen);
            if let Some(chat) = state.chat.as_mut() {
                chat.set_presence(&user_id, is_online, last_seen);
            }
            Outcome::Applied
        }
        ServerEvent::NotificationMarkedRead { notification_id } => {
            applied(notification_id.is_some_and(|id| state.notifications.mark_read(&id)))
        }
        ServerEvent::AllNotificationsMarkedRead => {
            state.notifications.mark_all_read();
            Outcome::Applied
        }
        ServerEvent::NotificationDeleted { notification_id } => {
            applied(notification_id.is_some_and(|id| state.notifications.delete(&id).is_some()))
        }
        ServerEvent::IncomingCall(offer) => applied(state.call.on_incoming(offer)),
        ServerEvent::CallInitiated { call_id } => {
            state.call.on_initiated(&call_id);
            Outcome::Applied
        }
        ServerEvent::CallAccepted { call_id } => {
            state.call.on_accepted(call_id.as_deref());
            Outcome::Applied
        }
        ServerEvent::CallRejected { reason } | ServerEvent::CallEnded { reason } => {
            state.call.on_remote_end(reason);
            Outcome::Applied
        }
        ServerEvent::CallFailed { message } => {
            state.call.on_remote_end(message);
            Outcome::Applied
        }
        ServerEvent::Unrecognized(event) => {
            debug!(event = %event.name, "ignoring unrecognized event");
            Outcome::Ignored
        }
    }
}
