//! In-memory sync state, one reconciler per surface.
//!
//! Nothing here is persisted; a restart re-fetches everything from the
//! server. All mutation goes through `&mut` so a single owner (the session)
//! serializes it without locks.

pub mod call;
pub mod chat;
pub mod conversations;
pub mod notifications;

pub use call::{CallError, CallPhase, CallState};
pub use chat::Transcript;
pub use conversations::{ConversationList, LiveOutcome, PageMode};
pub use notifications::NotificationFeed;

use crate::net::connection::ConnectionStatus;

#[derive(Clone, Debug)]
pub struct SyncState {
    /// Id of the signed-in user.
    pub self_id: String,
    pub connection: ConnectionStatus,
    pub conversations: ConversationList,
    /// Transcript of the conversation currently open, if any.
    pub chat: Option<Transcript>,
    pub notifications: NotificationFeed,
    pub call: CallState,
}

impl SyncState {
    #[must_use]
    pub fn new(self_id: impl Into<String>) -> Self {
        Self {
            self_id: self_id.into(),
            connection: ConnectionStatus::Disconnected,
            conversations: ConversationList::default(),
            chat: None,
            notifications: NotificationFeed::default(),
            call: CallState::default(),
        }
    }

    /// Open transcript for `conversation_id`, if that is the one on screen.
    pub fn chat_for(&mut self, conversation_id: &str) -> Option<&mut Transcript> {
        self.chat.as_mut().filter(|chat| chat.conversation_id() == conversation_id)
    }
}
