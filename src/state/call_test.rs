use serde_json::json;

use super::*;

fn offer(call_id: &str) -> CallOffer {
    CallOffer {
        call_id: call_id.to_owned(),
        caller_id: "bo".to_owned(),
        conversation_id: "c1".to_owned(),
        kind: CallKind::Video,
        caller: None,
    }
}

#[test]
fn outgoing_call_walks_connecting_ringing_active() {
    let mut call = CallState::default();
    let event = call.initiate("c1", "bo", CallKind::Audio).unwrap();
    assert_eq!(event.name, "call_initiate");
    assert_eq!(call.phase(), CallPhase::Connecting);
    assert_eq!(call.call_id(), None);

    call.on_initiated("call-1");
    assert_eq!(call.phase(), CallPhase::Ringing);
    assert_eq!(call.call_id(), Some("call-1"));

    call.on_accepted(Some("call-1"));
    assert_eq!(call.phase(), CallPhase::Active);
    assert!(call.started_at().is_some());

    let end = call.hang_up().unwrap().unwrap();
    assert_eq!(end.data, json!({"callId": "call-1"}));
    assert_eq!(call.phase(), CallPhase::Ended);
}

#[test]
fn cannot_initiate_while_busy() {
    let mut call = CallState::default();
    call.initiate("c1", "bo", CallKind::Audio).unwrap();
    assert_eq!(call.initiate("c2", "cy", CallKind::Video).unwrap_err(), CallError::Busy);
}

#[test]
fn can_initiate_again_after_end() {
    let mut call = CallState::default();
    call.initiate("c1", "bo", CallKind::Audio).unwrap();
    call.on_remote_end(Some("busy".into()));
    assert_eq!(call.phase(), CallPhase::Ended);
    assert_eq!(call.end_reason(), Some("busy"));
    assert!(call.initiate("c1", "bo", CallKind::Audio).is_ok());
    assert_eq!(call.end_reason(), None);
}

#[test]
fn hang_up_before_call_id_emits_nothing() {
    let mut call = CallState::default();
    call.initiate("c1", "bo", CallKind::Audio).unwrap();
    assert_eq!(call.hang_up().unwrap(), None);
    assert_eq!(call.hang_up().unwrap_err(), CallError::NoCall);
}

#[test]
fn incoming_call_can_be_accepted() {
    let mut call = CallState::default();
    assert!(call.on_incoming(offer("call-7")));
    assert_eq!(call.phase(), CallPhase::Ringing);
    assert_eq!(call.kind(), Some(CallKind::Video));

    let event = call.accept().unwrap();
    assert_eq!(event.name, "call_accept");
    assert_eq!(call.phase(), CallPhase::Active);
    assert!(call.incoming().is_none());
}

#[test]
fn incoming_call_can_be_rejected() {
    let mut call = CallState::default();
    call.on_incoming(offer("call-7"));
    let event = call.reject().unwrap();
    assert_eq!(event.data, json!({"callId": "call-7", "reason": "Declined"}));
    assert_eq!(call.phase(), CallPhase::Idle);
    assert_eq!(call.reject().unwrap_err(), CallError::NoIncomingCall);
}

#[test]
fn second_offer_while_busy_is_ignored() {
    let mut call = CallState::default();
    call.on_incoming(offer("call-1"));
    assert!(!call.on_incoming(offer("call-2")));
    assert_eq!(call.call_id(), Some("call-1"));
}

#[test]
fn remote_end_while_idle_is_noop() {
    let mut call = CallState::default();
    call.on_remote_end(Some("late".into()));
    assert_eq!(call.phase(), CallPhase::Idle);
}
