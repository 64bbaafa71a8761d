use super::*;
use serde_json::json;

#[test]
fn decode_open_parses_handshake_fields() {
    let packet = decode_packet(
        r#"0{"sid":"s1","upgrades":[],"pingInterval":25000,"pingTimeout":20000,"maxPayload":1000000}"#,
    )
    .expect("open should decode");
    let Packet::Open(handshake) = packet else {
        panic!("expected open packet");
    };
    assert_eq!(handshake.sid, "s1");
    assert_eq!(handshake.ping_interval, 25_000);
    assert_eq!(handshake.ping_timeout, 20_000);
    assert_eq!(handshake.max_payload, 1_000_000);
}

#[test]
fn decode_heartbeat_and_control_packets() {
    assert_eq!(decode_packet("1").expect("close"), Packet::Close);
    assert_eq!(decode_packet("2").expect("ping"), Packet::Ping);
    assert_eq!(decode_packet("2probe").expect("probe ping"), Packet::Ping);
    assert_eq!(decode_packet("3").expect("pong"), Packet::Pong);
    assert_eq!(decode_packet("6").expect("noop"), Packet::Noop);
    assert_eq!(decode_packet("41").expect("disconnect"), Packet::Disconnect);
}

#[test]
fn decode_connect_ack_carries_sid() {
    let packet = decode_packet(r#"40{"sid":"abc"}"#).expect("connect should decode");
    assert_eq!(packet, Packet::Connect(Some(json!({"sid": "abc"}))));
}

#[test]
fn decode_connect_without_payload() {
    assert_eq!(decode_packet("40").expect("connect"), Packet::Connect(None));
}

#[test]
fn decode_event_with_payload() {
    let packet = decode_packet(r#"42["new_message",{"conversationId":"c1"}]"#).expect("event");
    let Packet::Event(event) = packet else {
        panic!("expected event packet");
    };
    assert_eq!(event.name, "new_message");
    assert_eq!(event.data, json!({"conversationId": "c1"}));
    assert_eq!(event.ack_id, None);
}

#[test]
fn decode_event_without_arguments_has_null_data() {
    let packet = decode_packet(r#"42["get_unread_count"]"#).expect("event");
    assert_eq!(packet, Packet::Event(Event::bare("get_unread_count")));
}

#[test]
fn decode_event_strips_namespace_and_reads_ack_id() {
    let packet = decode_packet(r#"42/chat,17["user_typing",{"isTyping":true}]"#).expect("event");
    let Packet::Event(event) = packet else {
        panic!("expected event packet");
    };
    assert_eq!(event.name, "user_typing");
    assert_eq!(event.ack_id, Some(17));
}

#[test]
fn decode_ack_collects_arguments() {
    let packet = decode_packet(r#"435[{"ok":true},2]"#).expect("ack");
    assert_eq!(packet, Packet::Ack { id: 5, args: vec![json!({"ok": true}), json!(2)] });
}

#[test]
fn decode_connect_error_keeps_payload() {
    let packet = decode_packet(r#"44{"message":"Authentication error"}"#).expect("connect error");
    assert_eq!(packet, Packet::ConnectError(json!({"message": "Authentication error"})));
}

#[test]
fn decode_rejects_empty_and_unknown_types() {
    assert!(matches!(decode_packet(""), Err(CodecError::Empty)));
    assert!(matches!(decode_packet("9"), Err(CodecError::UnknownEngineType('9'))));
    assert!(matches!(decode_packet("4"), Err(CodecError::Empty)));
    assert!(matches!(decode_packet("49"), Err(CodecError::UnknownSocketType('9'))));
}

#[test]
fn decode_rejects_binary_packets() {
    assert!(matches!(
        decode_packet(r#"451-["upload",{"_placeholder":true,"num":0}]"#),
        Err(CodecError::BinaryUnsupported)
    ));
}

#[test]
fn decode_rejects_event_without_string_name() {
    assert!(matches!(decode_packet("42[1,2]"), Err(CodecError::InvalidEvent(_))));
    assert!(matches!(decode_packet("42[]"), Err(CodecError::InvalidEvent(_))));
    assert!(matches!(decode_packet(r#"42{"a":1}"#), Err(CodecError::InvalidEvent(_))));
}

#[test]
fn decode_rejects_malformed_json() {
    assert!(matches!(decode_packet("42[\"x\","), Err(CodecError::Json(_))));
}

#[test]
fn encode_event_matches_socket_io_wire_form() {
    let event = Event::new("mark_notification_read", json!({"notificationId": "n1"}));
    assert_eq!(
        encode_packet(&Packet::Event(event)),
        r#"42["mark_notification_read",{"notificationId":"n1"}]"#
    );
}

#[test]
fn encode_bare_event_omits_data_argument() {
    assert_eq!(
        encode_packet(&Packet::Event(Event::bare("subscribe_notifications"))),
        r#"42["subscribe_notifications"]"#
    );
}

#[test]
fn encode_connect_with_auth_and_control_packets() {
    assert_eq!(encode_packet(&Packet::Connect(Some(json!({"token": "t"})))), r#"40{"token":"t"}"#);
    assert_eq!(encode_packet(&Packet::Pong), "3");
    assert_eq!(encode_packet(&Packet::Disconnect), "41");
}

#[test]
fn encoded_event_with_ack_decodes_back() {
    let mut event = Event::new("call_initiate", json!({"callType": "audio"}));
    event.ack_id = Some(3);
    let wire = encode_packet(&Packet::Event(event.clone()));
    assert!(wire.starts_with("423["));
    assert_eq!(decode_packet(&wire).expect("decode"), Packet::Event(event));
}
