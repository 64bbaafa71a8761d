use serde_json::json;
use time::OffsetDateTime;

use super::*;
use crate::net::events::{CallKind, CallOffer};
use crate::net::types::{
    Conversation, ConversationPage, DeliveryStatus, Message, MessageKind, Notification, NotificationKind,
    NotificationSnapshot, Pagination, UserSummary,
};
use crate::state::{CallPhase, PageMode, Transcript};

fn user(id: &str) -> UserSummary {
    UserSummary {
        id: id.to_owned(),
        name: id.to_uppercase(),
        username: id.to_owned(),
        profile_picture: None,
        is_online: false,
        last_seen: None,
    }
}

fn conversation(id: &str, peer: &str) -> Conversation {
    Conversation {
        id: id.to_owned(),
        participant: user(peer),
        last_message: None,
        unread_count: 0,
        updated_at: OffsetDateTime::UNIX_EPOCH,
        created_at: OffsetDateTime::UNIX_EPOCH,
    }
}

fn message(id: &str, sender: &str) -> Message {
    Message {
        id: id.to_owned(),
        conversation_id: None,
        sender_id: sender.to_owned(),
        content: "hey".to_owned(),
        kind: MessageKind::Text,
        created_at: OffsetDateTime::UNIX_EPOCH,
        status: DeliveryStatus::Delivered,
        read_by: Vec::new(),
    }
}

fn notification(id: &str, is_read: bool) -> Notification {
    Notification {
        id: id.to_owned(),
        kind: NotificationKind::Mention,
        sender: None,
        message: String::new(),
        post_id: None,
        is_read,
        created_at: OffsetDateTime::UNIX_EPOCH,
        metadata: json!(null),
    }
}

fn state() -> SyncState {
    let mut state = SyncState::new("me");
    state.conversations.apply_page(
        ConversationPage {
            conversations: vec![conversation("c1", "bo"), conversation("c2", "cy")],
            pagination: Pagination::default(),
        },
        PageMode::Replace,
    );
    state
}

fn new_message(conversation_id: &str, message: Message) -> ServerEvent {
    ServerEvent::NewMessage { conversation_id: conversation_id.to_owned(), message }
}

// =============================================================
// messages
// =============================================================

#[test]
fn new_message_promotes_listed_conversation() {
    let mut state = state();
    assert_eq!(dispatch_event(new_message("c2", message("m1", "cy")), &mut state), Outcome::Applied);
    assert_eq!(state.conversations.items()[0].id, "c2");
    assert_eq!(state.conversations.items()[0].unread_count, 1);
}

#[test]
fn new_message_for_unknown_conversation_is_reported() {
    let mut state = state();
    let outcome = dispatch_event(new_message("c9", message("m1", "zed")), &mut state);
    assert_eq!(outcome, Outcome::UnknownConversation("c9".into()));
    assert_eq!(state.conversations.len(), 2);
}

#[test]
fn peer_message_in_open_chat_requests_read() {
    let mut state = state();
    state.chat = Some(Transcript::new("c1", "me", Some(user("bo"))));

    let outcome = dispatch_event(new_message("c1", message("m1", "bo")), &mut state);
    assert_eq!(outcome, Outcome::MarkChatRead("c1".into()));
    assert_eq!(state.chat.as_ref().map(|c| c.messages().len()), Some(1));
    assert_eq!(state.conversations.get("c1").map(|c| c.unread_count), Some(0));
}

#[test]
fn own_echo_in_open_chat_is_applied_once() {
    let mut state = state();
    state.chat = Some(Transcript::new("c1", "me", Some(user("bo"))));
    dispatch_event(new_message("c1", message("m1", "me")), &mut state);
    let outcome = dispatch_event(new_message("c1", message("m1", "me")), &mut state);
    assert_eq!(outcome, Outcome::Applied);
    assert_eq!(state.chat.as_ref().map(|c| c.messages().len()), Some(1));
}

#[test]
fn messages_read_by_peer_updates_open_chat() {
    let mut state = state();
    let mut chat = Transcript::new("c1", "me", Some(user("bo")));
    chat.load_history(vec![message("m1", "me")]);
    state.chat = Some(chat);

    let outcome = dispatch_event(
        ServerEvent::MessagesRead { conversation_id: "c1".into(), read_by: "bo".into() },
        &mut state,
    );
    assert_eq!(outcome, Outcome::Applied);
    let status = state.chat.as_ref().map(|c| c.messages()[0].status);
    assert_eq!(status, Some(DeliveryStatus::Read));
}

#[test]
fn typing_in_other_conversation_is_ignored() {
    let mut state = state();
    state.chat = Some(Transcript::new("c1", "me", Some(user("bo"))));
    let event = ServerEvent::UserTyping { conversation_id: "c2".into(), user_id: "cy".into(), is_typing: true };
    assert_eq!(dispatch_event(event, &mut state), Outcome::Ignored);
}

// =============================================================
// notifications
// =============================================================

#[test]
fn notification_events_update_feed() {
    let mut state = state();
    state.notifications.load(NotificationSnapshot {
        notifications: vec![notification("n1", false), notification("n2", false)],
        unread_count: 2,
    });

    dispatch_event(ServerEvent::NewNotification(notification("n3", false)), &mut state);
    assert_eq!(state.notifications.unread_count(), 3);

    dispatch_event(ServerEvent::NotificationDeleted { notification_id: Some("n1".into()) }, &mut state);
    assert_eq!(state.notifications.unread_count(), 2);

    dispatch_event(ServerEvent::AllNotificationsMarkedRead, &mut state);
    assert_eq!(state.notifications.unread_count(), 0);
    assert!(state.notifications.items().iter().all(|n| n.is_read));

    dispatch_event(ServerEvent::UnreadCountUpdated(5), &mut state);
    assert_eq!(state.notifications.unread_count(), 5);
}

// =============================================================
// calls
// =============================================================

#[test]
fn call_events_drive_call_state() {
    let mut state = state();
    let offer = CallOffer {
        call_id: "call-1".into(),
        caller_id: "bo".into(),
        conversation_id: "c1".into(),
        kind: CallKind::Audio,
        caller: None,
    };
    dispatch_event(ServerEvent::IncomingCall(offer), &mut state);
    assert_eq!(state.call.phase(), CallPhase::Ringing);

    dispatch_event(ServerEvent::CallEnded { reason: Some("hung up".into()) }, &mut state);
    assert_eq!(state.call.phase(), CallPhase::Ended);
    assert_eq!(state.call.end_reason(), Some("hung up"));
}

#[test]
fn unrecognized_event_is_ignored() {
    let mut state = state();
    let event = ServerEvent::Unrecognized(packets::Event::bare("story_viewed"));
    assert_eq!(dispatch_event(event, &mut state), Outcome::Ignored);
}
