use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::*;

fn client(server: &MockServer) -> ApiClient {
    let config = ClientConfig { base_url: server.uri(), ..ClientConfig::default() };
    ApiClient::new(&config).unwrap().with_session("tok-1", "me")
}

#[test]
fn endpoints_format_expected_paths() {
    assert_eq!(conversations_endpoint(2), "/conversations?page=2");
    assert_eq!(participant_conversation_endpoint("u2"), "/conversations/participant/u2");
    assert_eq!(messages_endpoint("c1"), "/conversations/c1/messages");
    assert_eq!(read_endpoint("c1"), "/conversations/c1/read");
    assert_eq!(friend_request_endpoint("fr1"), "/friends/fr1");
    assert_eq!(online_status_endpoint("u2"), "/users/online-status/u2");
}

#[test]
fn envelope_with_success_false_is_rejected() {
    let err = check_envelope(json!({"success": false, "message": "nope"})).unwrap_err();
    assert!(matches!(err, ApiError::Rejected(ref m) if m == "nope"));
    assert!(check_envelope(json!({"conversations": []})).is_ok());
}

#[test]
fn auth_session_requires_token_and_user() {
    let session = parse_auth_session(&json!({"token": "t", "user": {"id": "u1", "name": "Ann"}})).unwrap();
    assert_eq!(session.token, "t");
    assert_eq!(session.user.username, "ann");
    assert!(matches!(parse_auth_session(&json!({"user": {"id": "u1"}})), Err(ApiError::MissingField("token"))));
}

#[tokio::test]
async fn requests_without_token_fail_locally() {
    let api = ApiClient::new(&ClientConfig::default()).unwrap();
    assert!(matches!(api.list_conversations(1).await, Err(ApiError::MissingToken)));
}

#[tokio::test]
async fn list_conversations_sends_bearer_and_parses_page() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/conversations"))
        .and(query_param("page", "1"))
        .and(header("authorization", "Bearer tok-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "conversations": [{
                "_id": "c1",
                "participant": {"_id": "u2"},
                "unreadCounts": [{"userId": "me", "count": 2}]
            }],
            "pagination": {"currentPage": 1, "totalPages": 3, "totalCount": 41, "hasMore": true}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let page = client(&server).list_conversations(1).await.unwrap();

    assert_eq!(page.conversations.len(), 1);
    assert_eq!(page.conversations[0].unread_count, 2);
    assert!(page.pagination.has_more);
}

#[tokio::test]
async fn list_messages_treats_404_as_empty() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/conversations/c1/messages"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"message": "Conversation not found"})))
        .expect(1)
        .mount(&server)
        .await;

    let messages = client(&server).list_messages("c1").await.unwrap();
    assert!(messages.is_empty());
}

#[tokio::test]
async fn conversation_with_missing_participant_is_none() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/conversations/participant/u9"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"message": "not found"})))
        .mount(&server)
        .await;

    assert_eq!(client(&server).conversation_with("u9").await.unwrap(), None);
}

#[tokio::test]
async fn send_message_posts_payload_and_fills_conversation_id() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/messages"))
        .and(header("authorization", "Bearer tok-1"))
        .and(body_json(json!({"conversationId": "c1", "content": "hi", "type": "text"})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "success": true,
            "message": {"_id": "m1", "senderId": {"_id": "me"}, "content": "hi"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let message = client(&server).send_message("c1", "hi", &MessageKind::Text).await.unwrap();

    assert_eq!(message.id, "m1");
    assert_eq!(message.conversation_id.as_deref(), Some("c1"));
}

#[tokio::test]
async fn server_error_carries_message() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/notifications/unread-count"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({"success": false, "message": "db down"})))
        .mount(&server)
        .await;

    let err = client(&server).unread_count().await.unwrap_err();
    assert!(matches!(err, ApiError::Status { status: 500, ref message } if message == "db down"));
}

#[tokio::test]
async fn ok_status_with_success_false_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/conversations/c1/read"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": false, "message": "not a member"})))
        .mount(&server)
        .await;

    let err = client(&server).mark_conversation_read("c1").await.unwrap_err();
    assert!(matches!(err, ApiError::Rejected(ref m) if m == "not a member"));
}

#[tokio::test]
async fn respond_friend_request_sends_action() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/friends/fr1"))
        .and(body_json(json!({"action": "reject"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
        .expect(1)
        .mount(&server)
        .await;

    client(&server).respond_friend_request("fr1", FriendAction::Reject).await.unwrap();
}

#[tokio::test]
async fn list_notifications_reads_unread_count() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/notifications"))
        .respond_with(ResponseTemplate::new(200).set_body_json(
            json!({"success": true, "notifications": [{"_id": "n1", "type": "mention"}], "unreadCount": 4}),
        ))
        .mount(&server)
        .await;

    let feed = client(&server).list_notifications().await.unwrap();
    assert_eq!(feed.notifications.len(), 1);
    assert_eq!(feed.unread_count, 4);
}

#[tokio::test]
async fn signin_posts_credentials_without_bearer() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/signin"))
        .and(body_json(json!({"email": "ann@example.test", "password": "pw"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "token": "tok-9",
            "user": {"id": "u1", "email": "ann@example.test", "name": "Ann Lee"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let config = ClientConfig { base_url: server.uri(), ..ClientConfig::default() };
    let auth = ApiClient::new(&config).unwrap().signin("ann@example.test", "pw").await.unwrap();
    assert_eq!(auth.token, "tok-9");
    assert_eq!(auth.user.username, "ann_lee");

    let requests = server.received_requests().await.unwrap();
    assert!(requests[0].headers.get("authorization").is_none());
}

#[tokio::test]
async fn signup_sends_name_email_password() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/signup"))
        .and(body_json(json!({"name": "Bo", "email": "bo@example.test", "password": "pw"})))
        .respond_with(
            ResponseTemplate::new(201).set_body_json(json!({"token": "tok-2", "user": {"_id": "u2", "name": "Bo"}})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let config = ClientConfig { base_url: server.uri(), ..ClientConfig::default() };
    let auth = ApiClient::new(&config).unwrap().signup("Bo", "bo@example.test", "pw").await.unwrap();
    assert_eq!(auth.user.id, "u2");
}

#[tokio::test]
async fn search_users_sends_query_and_skips_blank() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users/search"))
        .and(query_param("q", "bo"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"users": [{"_id": "u2", "name": "Bo"}, {"name": "ghost"}]})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let api = client(&server);
    let users = api.search_users(" bo ").await.unwrap();
    assert_eq!(users.len(), 1);
    assert!(api.search_users("   ").await.unwrap().is_empty());
}
