//! REST client for the backend HTTP API.
//!
//! ERROR HANDLING
//! ==============
//! Every endpoint answers with a JSON envelope `{ success, message?, ... }`.
//! Non-2xx statuses become [`ApiError::Status`] carrying the server message;
//! a 2xx body with `success: false` becomes [`ApiError::Rejected`]. The only
//! status treated as data is 404 on the message list (a brand-new
//! conversation has no messages yet) and on the participant lookup.

#[cfg(test)]
#[path = "api_test.rs"]
mod api_test;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, HeaderValue};
use reqwest::{Method, RequestBuilder, StatusCode};
use serde_json::{Value, json};

use super::parse::{
    count_of, parse_auth_user, parse_conversation, parse_conversation_page, parse_friend_request, parse_message,
    parse_notifications, parse_timestamp, parse_user, pick_str,
};
use super::types::{
    AuthUser, Conversation, ConversationPage, FriendAction, FriendRequest, Message, MessageKind, NotificationSnapshot,
    UserSummary,
};
use crate::config::ClientConfig;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("http transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },
    #[error("request rejected: {0}")]
    Rejected(String),
    #[error("response missing field: {0}")]
    MissingField(&'static str),
    #[error("not signed in")]
    MissingToken,
    #[error("invalid authorization header: {0}")]
    InvalidHeader(#[from] reqwest::header::InvalidHeaderValue),
}

impl ApiError {
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Status { status: 404, .. })
    }
}

/// Backend operations the sync session depends on.
///
/// [`ApiClient`] is the HTTP implementation; tests substitute a mock.
#[async_trait]
pub trait Backend: Send + Sync {
    async fn list_conversations(&self, page: u32) -> Result<ConversationPage, ApiError>;
    /// Existing conversation with `participant_id`, if any.
    async fn conversation_with(&self, participant_id: &str) -> Result<Option<Conversation>, ApiError>;
    async fn create_conversation(&self, participant_id: &str) -> Result<Conversation, ApiError>;
    /// Messages of a conversation. A conversation with no messages yields an empty list.
    async fn list_messages(&self, conversation_id: &str) -> Result<Vec<Message>, ApiError>;
    async fn send_message(&self, conversation_id: &str, content: &str, kind: &MessageKind)
    -> Result<Message, ApiError>;
    async fn mark_conversation_read(&self, conversation_id: &str) -> Result<(), ApiError>;
    async fn list_notifications(&self) -> Result<NotificationSnapshot, ApiError>;
    async fn unread_count(&self) -> Result<u32, ApiError>;
    async fn respond_friend_request(&self, request_id: &str, action: FriendAction) -> Result<(), ApiError>;
}

// =============================================================================
// ENDPOINTS
// =============================================================================

fn conversations_endpoint(page: u32) -> String {
    format!("/conversations?page={page}")
}

fn participant_conversation_endpoint(participant_id: &str) -> String {
    format!("/conversations/participant/{participant_id}")
}

fn messages_endpoint(conversation_id: &str) -> String {
    format!("/conversations/{conversation_id}/messages")
}

fn read_endpoint(conversation_id: &str) -> String {
    format!("/conversations/{conversation_id}/read")
}

fn friend_request_endpoint(request_id: &str) -> String {
    format!("/friends/{request_id}")
}

fn online_status_endpoint(user_id: &str) -> String {
    format!("/users/online-status/{user_id}")
}

/// Server-provided failure text, falling back to the raw body.
fn failure_message(body: &Value) -> String {
    pick_str(body, &["message", "error"]).map_or_else(|| body.to_string(), str::to_owned)
}

/// Reject 2xx envelopes that carry `success: false`.
fn check_envelope(body: Value) -> Result<Value, ApiError> {
    if body.get("success").and_then(Value::as_bool) == Some(false) {
        return Err(ApiError::Rejected(failure_message(&body)));
    }
    Ok(body)
}

/// Token plus signed-in user returned by sign-in and sign-up.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthSession {
    pub token: String,
    pub user: AuthUser,
}

fn parse_auth_session(body: &Value) -> Result<AuthSession, ApiError> {
    let token = pick_str(body, &["token"]).ok_or(ApiError::MissingField("token"))?.to_owned();
    let user = body.get("user").and_then(parse_auth_user).ok_or(ApiError::MissingField("user"))?;
    Ok(AuthSession { token, user })
}

/// Online flag and last-seen time from `GET /users/online-status/{id}`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OnlineStatus {
    pub is_online: bool,
    pub last_seen: Option<time::OffsetDateTime>,
}

// =============================================================================
// CLIENT
// =============================================================================

/// HTTP implementation of [`Backend`] plus the account endpoints.
#[derive(Clone, Debug)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
    /// Signed-in user id; decides per-user unread counts and read state.
    user_id: String,
}

impl ApiClient {
    /// Build an unauthenticated client with the configured timeouts.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Transport`] when the HTTP client cannot be built.
    pub fn new(config: &ClientConfig) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeouts.request())
            .connect_timeout(config.timeouts.connect())
            .build()?;
        Ok(Self { http, base_url: config.base_url.clone(), token: None, user_id: String::new() })
    }

    /// Attach a bearer token and the id of the user it belongs to.
    #[must_use]
    pub fn with_session(mut self, token: impl Into<String>, user_id: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self.user_id = user_id.into();
        self
    }

    #[must_use]
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, ApiError> {
        let token = self.token.as_deref().ok_or(ApiError::MissingToken)?;
        let bearer = HeaderValue::from_str(&format!("Bearer {token}"))?;
        Ok(self.anonymous(method, path).header(AUTHORIZATION, bearer))
    }

    fn anonymous(&self, method: Method, path: &str) -> RequestBuilder {
        self.http.request(method, format!("{}{path}", self.base_url))
    }

    /// Send and return the status with the JSON body (`Null` when the body is not JSON).
    async fn execute(request: RequestBuilder) -> Result<(StatusCode, Value), ApiError> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.json::<Value>().await.unwrap_or(Value::Null);
        Ok((status, body))
    }

    async fn call(request: RequestBuilder) -> Result<Value, ApiError> {
        let (status, body) = Self::execute(request).await?;
        if !status.is_success() {
            return Err(ApiError::Status { status: status.as_u16(), message: failure_message(&body) });
        }
        check_envelope(body)
    }

    /// `POST /signin`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] on transport failure, bad credentials, or a body
    /// without `token`/`user`.
    pub async fn signin(&self, email: &str, password: &str) -> Result<AuthSession, ApiError> {
        tracing::info!(%email, "signing in");
        let body = Self::call(
            self.anonymous(Method::POST, "/signin")
                .json(&json!({ "email": email, "password": password })),
        )
        .await?;
        parse_auth_session(&body)
    }

    /// `POST /signup`.
    ///
    /// # Errors
    ///
    /// Same as [`ApiClient::signin`].
    pub async fn signup(&self, full_name: &str, email: &str, password: &str) -> Result<AuthSession, ApiError> {
        tracing::info!(%email, "signing up");
        let body = Self::call(
            self.anonymous(Method::POST, "/signup")
                .json(&json!({ "name": full_name, "email": email, "password": password })),
        )
        .await?;
        parse_auth_session(&body)
    }

    /// `POST /logout`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] when the request fails or no token is attached.
    pub async fn logout(&self) -> Result<(), ApiError> {
        Self::call(self.request(Method::POST, "/logout")?).await?;
        Ok(())
    }

    /// `GET /profile`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] when the request fails or the body has no user.
    pub async fn profile(&self) -> Result<AuthUser, ApiError> {
        let body = Self::call(self.request(Method::GET, "/profile")?).await?;
        body.get("user")
            .and_then(parse_auth_user)
            .or_else(|| parse_auth_user(&body))
            .ok_or(ApiError::MissingField("user"))
    }

    /// `GET /users/search?q=`. A blank query returns nothing without a request.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] when the request fails.
    pub async fn search_users(&self, query: &str) -> Result<Vec<UserSummary>, ApiError> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }
        let body = Self::call(self.request(Method::GET, "/users/search")?.query(&[("q", query)])).await?;
        Ok(body
            .get("users")
            .and_then(Value::as_array)
            .map(|users| users.iter().filter_map(parse_user).collect())
            .unwrap_or_default())
    }

    /// `GET /friends/requests`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] when the request fails.
    pub async fn friend_requests(&self) -> Result<Vec<FriendRequest>, ApiError> {
        let body = Self::call(self.request(Method::GET, "/friends/requests")?).await?;
        Ok(body
            .get("requests")
            .and_then(Value::as_array)
            .map(|rows| rows.iter().filter_map(parse_friend_request).collect())
            .unwrap_or_default())
    }

    /// `GET /users/online-status/{id}`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] when the request fails.
    pub async fn online_status(&self, user_id: &str) -> Result<OnlineStatus, ApiError> {
        let body = Self::call(self.request(Method::GET, &online_status_endpoint(user_id))?).await?;
        Ok(OnlineStatus {
            is_online: body.get("isOnline").and_then(Value::as_bool).unwrap_or(false),
            last_seen: parse_timestamp(body.get("lastSeen")),
        })
    }
}

#[async_trait]
impl Backend for ApiClient {
    async fn list_conversations(&self, page: u32) -> Result<ConversationPage, ApiError> {
        tracing::debug!(page, "fetching conversations");
        let body = Self::call(self.request(Method::GET, &conversations_endpoint(page))?).await?;
        Ok(parse_conversation_page(&body, &self.user_id, page))
    }

    async fn conversation_with(&self, participant_id: &str) -> Result<Option<Conversation>, ApiError> {
        let request = self.request(Method::GET, &participant_conversation_endpoint(participant_id))?;
        match Self::call(request).await {
            Ok(body) => Ok(body.get("conversation").and_then(|c| parse_conversation(c, &self.user_id))),
            Err(error) if error.is_not_found() => Ok(None),
            Err(error) => Err(error),
        }
    }

    async fn create_conversation(&self, participant_id: &str) -> Result<Conversation, ApiError> {
        tracing::info!(%participant_id, "creating conversation");
        let body = Self::call(
            self.request(Method::POST, "/conversations")?
                .json(&json!({ "participantId": participant_id })),
        )
        .await?;
        body.get("conversation")
            .and_then(|c| parse_conversation(c, &self.user_id))
            .ok_or(ApiError::MissingField("conversation"))
    }

    async fn list_messages(&self, conversation_id: &str) -> Result<Vec<Message>, ApiError> {
        let body = match Self::call(self.request(Method::GET, &messages_endpoint(conversation_id))?).await {
            Ok(body) => body,
            Err(error) if error.is_not_found() => {
                tracing::debug!(%conversation_id, "no messages yet");
                return Ok(Vec::new());
            }
            Err(error) => return Err(error),
        };
        Ok(body
            .get("messages")
            .and_then(Value::as_array)
            .map(|rows| rows.iter().filter_map(|row| parse_message(row, &self.user_id)).collect())
            .unwrap_or_default())
    }

    async fn send_message(
        &self,
        conversation_id: &str,
        content: &str,
        kind: &MessageKind,
    ) -> Result<Message, ApiError> {
        let body = Self::call(self.request(Method::POST, "/messages")?.json(&json!({
            "conversationId": conversation_id,
            "content": content,
            "type": kind.as_str(),
        })))
        .await?;
        let mut message = body
            .get("message")
            .and_then(|m| parse_message(m, &self.user_id))
            .ok_or(ApiError::MissingField("message"))?;
        message.conversation_id.get_or_insert_with(|| conversation_id.to_owned());
        Ok(message)
    }

    async fn mark_conversation_read(&self, conversation_id: &str) -> Result<(), ApiError> {
        Self::call(self.request(Method::PUT, &read_endpoint(conversation_id))?).await?;
        Ok(())
    }

    async fn list_notifications(&self) -> Result<NotificationSnapshot, ApiError> {
        let body = Self::call(self.request(Method::GET, "/notifications")?).await?;
        Ok(NotificationSnapshot {
            notifications: parse_notifications(body.get("notifications")),
            unread_count: count_of(body.get("unreadCount")),
        })
    }

    async fn unread_count(&self) -> Result<u32, ApiError> {
        let body = Self::call(self.request(Method::GET, "/notifications/unread-count")?).await?;
        Ok(count_of(body.get("unreadCount")))
    }

    async fn respond_friend_request(&self, request_id: &str, action: FriendAction) -> Result<(), ApiError> {
        tracing::info!(%request_id, action = action.as_str(), "answering friend request");
        Self::call(
            self.request(Method::PUT, &friend_request_endpoint(request_id))?
                .json(&json!({ "action": action.as_str() })),
        )
        .await?;
        Ok(())
    }
}
