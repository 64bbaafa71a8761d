use super::*;
use serde_json::json;

fn event(name: &str, data: Value) -> Event {
    Event::new(name, data)
}

#[test]
fn new_message_uses_payload_conversation_id() {
    let parsed = ServerEvent::parse(
        &event(
            "new_message",
            json!({
                "conversationId": "c1",
                "message": {"_id": "m1", "senderId": {"_id": "u2"}, "content": "yo"}
            }),
        ),
        "me",
    );
    let ServerEvent::NewMessage { conversation_id, message } = parsed else {
        panic!("expected NewMessage, got {parsed:?}");
    };
    assert_eq!(conversation_id, "c1");
    assert_eq!(message.sender_id, "u2");
    assert_eq!(message.content, "yo");
}

#[test]
fn new_message_falls_back_to_message_conversation_id() {
    let parsed = ServerEvent::parse(
        &event("new_message", json!({"message": {"_id": "m1", "conversationId": "c9"}})),
        "me",
    );
    assert!(matches!(parsed, ServerEvent::NewMessage { ref conversation_id, .. } if conversation_id == "c9"));
}

#[test]
fn new_message_without_conversation_is_unrecognized() {
    let raw = event("new_message", json!({"message": {"_id": "m1"}}));
    assert_eq!(ServerEvent::parse(&raw, "me"), ServerEvent::Unrecognized(raw));
}

#[test]
fn unknown_event_name_is_unrecognized() {
    let raw = event("story_viewed", json!({"storyId": "s1"}));
    assert!(matches!(ServerEvent::parse(&raw, "me"), ServerEvent::Unrecognized(_)));
}

#[test]
fn unread_count_updated_reads_count() {
    let parsed = ServerEvent::parse(&event("unread_count_updated", json!({"unreadCount": 7})), "me");
    assert_eq!(parsed, ServerEvent::UnreadCountUpdated(7));
}

#[test]
fn new_notification_accepts_wrapped_and_bare_payloads() {
    let payload = json!({"_id": "n1", "type": "mention", "createdAt": "2024-03-01T10:00:00.000Z"});
    let wrapped = ServerEvent::parse(&event("new_notification", json!({ "notification": payload.clone() })), "me");
    let bare = ServerEvent::parse(&event("new_notification", payload), "me");
    assert!(matches!(wrapped, ServerEvent::NewNotification(ref n) if n.id == "n1"));
    assert_eq!(wrapped, bare);
}

#[test]
fn user_typing_defaults_to_not_typing() {
    let parsed = ServerEvent::parse(&event("user_typing", json!({"conversationId": "c1", "userId": "u2"})), "me");
    assert_eq!(
        parsed,
        ServerEvent::UserTyping { conversation_id: "c1".into(), user_id: "u2".into(), is_typing: false }
    );
}

#[test]
fn incoming_call_carries_caller_info() {
    let parsed = ServerEvent::parse(
        &event(
            "incoming_call",
            json!({
                "callId": "call-1",
                "callerId": "u2",
                "conversationId": "c1",
                "callType": "video",
                "callerInfo": {"_id": "u2", "name": "Bo"}
            }),
        ),
        "me",
    );
    let ServerEvent::IncomingCall(offer) = parsed else {
        panic!("expected IncomingCall, got {parsed:?}");
    };
    assert_eq!(offer.call_id, "call-1");
    assert_eq!(offer.kind, CallKind::Video);
    assert_eq!(offer.caller.map(|u| u.name).as_deref(), Some("Bo"));
}

#[test]
fn call_ended_keeps_reason() {
    let parsed = ServerEvent::parse(&event("call_ended", json!({"reason": "hangup"})), "me");
    assert_eq!(parsed, ServerEvent::CallEnded { reason: Some("hangup".into()) });
}

#[test]
fn outbound_builders_use_wire_keys() {
    assert_eq!(mark_messages_read("c1").data, json!({"conversationId": "c1"}));
    assert_eq!(delete_notification("n1").data, json!({"notificationId": "n1"}));
    assert_eq!(subscribe_notifications().name, "subscribe_notifications");
    assert_eq!(
        call_initiate("c1", "u2", CallKind::Audio).data,
        json!({"conversationId": "c1", "recipientId": "u2", "callType": "audio"})
    );
    assert_eq!(call_reject("call-1").data, json!({"callId": "call-1", "reason": "Declined"}));
}
