use clap::{Args, Parser, Subcommand, ValueEnum};
use serde_json::Value;
use social_sync::net::types::{AuthUser, FriendAction, MessageKind};
use social_sync::{
    ApiClient, ApiError, ClientConfig, ConfigError, Outcome, ServerEvent, Session, SessionError, StoreError,
    StoredSession, TokenStore,
};
use tracing_subscriber::EnvFilter;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("not signed in; run `social-cli login` or set SOCIAL_TOKEN")]
    NotSignedIn,
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("invalid JSON output: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Parser, Debug)]
#[command(name = "social-cli", about = "Conversation and notification sync CLI")]
struct Cli {
    #[arg(long, env = "SOCIAL_BASE_URL")]
    base_url: Option<String>,

    #[arg(long, env = "SOCIAL_TOKEN")]
    token: Option<String>,

    #[arg(long, env = "SOCIAL_TOKEN_FILE")]
    token_file: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "SOCIAL_PASSWORD")]
        password: String,
    },
    Signup {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long, env = "SOCIAL_PASSWORD")]
        password: String,
    },
    Logout,
    Whoami,
    /// Search users by name or username.
    Search {
        query: String,
    },
    /// Online flag and last-seen time of a user.
    Status {
        user_id: String,
    },
    /// List pending incoming friend requests.
    FriendRequests,
    Conversations {
        #[arg(long)]
        search: Option<String>,
        #[arg(long)]
        all_pages: bool,
    },
    /// Get or create the conversation with a user and print its transcript.
    Chat {
        participant_id: String,
    },
    Send {
        conversation_id: String,
        text: String,
    },
    Read {
        conversation_id: String,
    },
    Notifications(NotificationsCommand),
    FriendRequest {
        notification_id: String,
        action: Decision,
    },
    /// Connect and print every reconciled update until Ctrl-C.
    Watch,
}

#[derive(Args, Debug)]
struct NotificationsCommand {
    #[arg(long)]
    unread: bool,

    #[command(subcommand)]
    command: Option<NotificationsSubcommand>,
}

#[derive(Subcommand, Debug)]
enum NotificationsSubcommand {
    Read { notification_id: String },
    ReadAll,
    Delete { notification_id: String },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Decision {
    Accept,
    Reject,
}

impl From<Decision> for FriendAction {
    fn from(decision: Decision) -> Self {
        match decision {
            Decision::Accept => Self::Accept,
            Decision::Reject => Self::Reject,
        }
    }
}

/// A signed-in client plus the token the socket needs.
struct Signed {
    api: ApiClient,
    token: String,
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let dotenv = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    if let Err(error) = dotenv {
        tracing::debug!(%error, "no .env file loaded");
    }

    let cli = Cli::parse();
    let config = resolve_config(&cli)?;
    let store = TokenStore::new(config.token_file.clone());

    match cli.command {
        Command::Login { email, password } => {
            let auth = ApiClient::new(&config)?.signin(&email, &password).await?;
            store.save(&StoredSession { token: auth.token, user: auth.user.clone() }).await?;
            eprintln!("signed in as {} ({})", auth.user.username, store.path().display());
            Ok(())
        }
        Command::Signup { name, email, password } => {
            let auth = ApiClient::new(&config)?.signup(&name, &email, &password).await?;
            store.save(&StoredSession { token: auth.token, user: auth.user.clone() }).await?;
            eprintln!("signed up as {}", auth.user.username);
            Ok(())
        }
        Command::Logout => run_logout(&config, &store).await,
        Command::Whoami => {
            let signed = sign_in(&config, &store).await?;
            let user = signed.api.profile().await?;
            print_json(&serde_json::to_value(&user)?)
        }
        Command::Search { query } => {
            let signed = sign_in(&config, &store).await?;
            let users = signed.api.search_users(&query).await?;
            print_json(&serde_json::to_value(users)?)
        }
        Command::Status { user_id } => {
            let signed = sign_in(&config, &store).await?;
            let status = signed.api.online_status(&user_id).await?;
            let last_seen = status.last_seen.map(|ts| ts.to_string()).unwrap_or_else(|| "-".to_owned());
            println!("{user_id}  online={}  last_seen={last_seen}", status.is_online);
            Ok(())
        }
        Command::FriendRequests => {
            let signed = sign_in(&config, &store).await?;
            for request in signed.api.friend_requests().await? {
                let from = request.sender.map_or_else(|| "unknown".to_owned(), |sender| sender.name);
                println!("{}  from {from}", request.id);
            }
            Ok(())
        }
        Command::Conversations { search, all_pages } => {
            let mut session = open_session(&config, &store).await?.0;
            if all_pages {
                session.load_all_conversations().await?;
            } else {
                session.load_conversations().await?;
            }
            let list = &session.state().conversations;
            let rows = match search.as_deref() {
                Some(query) => list.filter(query),
                None => list.items().iter().collect(),
            };
            for conversation in rows {
                let preview = conversation.last_message.as_ref().map(|m| m.preview()).unwrap_or_default();
                println!(
                    "{}  {} (@{})  unread={}  {preview}",
                    conversation.id,
                    conversation.participant.name,
                    conversation.participant.username,
                    conversation.unread_count,
                );
            }
            let pagination = list.pagination();
            eprintln!(
                "page {}/{} ({} total)",
                pagination.current_page, pagination.total_pages, pagination.total_count
            );
            Ok(())
        }
        Command::Chat { participant_id } => {
            let mut session = open_session(&config, &store).await?.0;
            let transcript = session.open_chat_with(&participant_id).await?;
            eprintln!("conversation {}", transcript.conversation_id());
            print_json(&serde_json::to_value(transcript.messages())?)
        }
        Command::Send { conversation_id, text } => {
            let mut session = open_session(&config, &store).await?.0;
            session.load_all_conversations().await?;
            session.open_conversation(&conversation_id).await?;
            let sent = session.send_message(&text, MessageKind::Text).await?;
            print_json(&serde_json::to_value(&sent)?)
        }
        Command::Read { conversation_id } => {
            let mut session = open_session(&config, &store).await?.0;
            session.mark_conversation_read(&conversation_id).await?;
            eprintln!("marked {conversation_id} read");
            Ok(())
        }
        Command::Notifications(command) => run_notifications(&config, &store, command).await,
        Command::FriendRequest { notification_id, action } => {
            let mut session = open_session(&config, &store).await?.0;
            session.load_notifications().await?;
            session.resolve_friend_request(&notification_id, action.into()).await?;
            eprintln!("friend request {}", FriendAction::from(action).as_str());
            Ok(())
        }
        Command::Watch => run_watch(&config, &store).await,
    }
}

/// Environment config with command-line flags layered on top.
fn resolve_config(cli: &Cli) -> Result<ClientConfig, CliError> {
    let mut config = ClientConfig::from_env()?;
    if let Some(base_url) = &cli.base_url {
        config.base_url = base_url.trim_end_matches('/').to_owned();
    }
    if let Some(token) = &cli.token {
        config.token = Some(token.clone());
    }
    if let Some(token_file) = &cli.token_file {
        config.token_file = token_file.into();
    }
    Ok(config)
}

/// Token from the config override, else from the token file.
async fn sign_in(config: &ClientConfig, store: &TokenStore) -> Result<Signed, CliError> {
    if let Some(token) = config.token.clone() {
        let lookup = ApiClient::new(config)?.with_session(&token, "");
        let user: AuthUser = lookup.profile().await?;
        return Ok(Signed { api: lookup.with_session(&token, &user.id), token });
    }
    let stored = store.load().await?.ok_or(CliError::NotSignedIn)?;
    let api = ApiClient::new(config)?.with_session(&stored.token, &stored.user.id);
    Ok(Signed { api, token: stored.token })
}

async fn open_session(config: &ClientConfig, store: &TokenStore) -> Result<(Session<ApiClient>, String), CliError> {
    let signed = sign_in(config, store).await?;
    let user_id = signed.api.user_id().to_owned();
    let session = Session::new(signed.api, config.clone(), user_id);
    Ok((session, signed.token))
}

async fn run_logout(config: &ClientConfig, store: &TokenStore) -> Result<(), CliError> {
    let Some(stored) = store.load().await? else {
        eprintln!("not signed in");
        return Ok(());
    };
    let api = ApiClient::new(config)?.with_session(&stored.token, &stored.user.id);
    if let Err(error) = api.logout().await {
        tracing::warn!(%error, "server logout failed; clearing local session anyway");
    }
    store.clear().await?;
    eprintln!("signed out");
    Ok(())
}

async fn run_notifications(
    config: &ClientConfig,
    store: &TokenStore,
    command: NotificationsCommand,
) -> Result<(), CliError> {
    let (mut session, token) = open_session(config, store).await?;
    session.load_notifications().await?;

    let Some(action) = command.command else {
        let feed = &session.state().notifications;
        let items: Vec<_> = if command.unread { feed.unread() } else { feed.items().iter().collect() };
        print_json(&serde_json::to_value(items)?)?;
        eprintln!("{} unread", feed.unread_count());
        return Ok(());
    };

    // Read and delete are mirrored over the socket only.
    session.connect(&token).await?;
    match action {
        NotificationsSubcommand::Read { notification_id } => {
            if !session.mark_notification_read(&notification_id)? {
                eprintln!("{notification_id} was already read");
            }
        }
        NotificationsSubcommand::ReadAll => session.mark_all_notifications_read(),
        NotificationsSubcommand::Delete { notification_id } => session.delete_notification(&notification_id)?,
    }
    eprintln!("{} unread", session.state().notifications.unread_count());
    session.disconnect().await;
    Ok(())
}

async fn run_watch(config: &ClientConfig, store: &TokenStore) -> Result<(), CliError> {
    let (mut session, token) = open_session(config, store).await?;
    session.load_conversations().await?;
    session.load_notifications().await?;
    session.connect(&token).await?;
    eprintln!(
        "watching {} conversations, {} unread notifications; Ctrl-C to stop",
        session.state().conversations.len(),
        session.state().notifications.unread_count()
    );

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            result = &mut shutdown => {
                if let Err(error) = result {
                    tracing::warn!(%error, "ctrl-c handler failed");
                }
                break;
            }
            update = session.next_update() => {
                let Some((event, outcome)) = update else {
                    eprintln!("connection closed");
                    break;
                };
                if outcome != Outcome::Ignored {
                    println!("{}", describe(&event));
                }
            }
        }
    }
    session.disconnect().await;
    Ok(())
}

fn describe(event: &ServerEvent) -> String {
    match event {
        ServerEvent::NewMessage { conversation_id, message } => {
            format!("message  {conversation_id}  {}: {}", message.sender_id, message.content)
        }
        ServerEvent::MessagesRead { conversation_id, read_by } => format!("read     {conversation_id}  by {read_by}"),
        ServerEvent::NewNotification(notification) => format!("notify   {}  {}", notification.id, notification.message),
        ServerEvent::UnreadCountUpdated(count) => format!("unread   {count}"),
        ServerEvent::UserTyping { conversation_id, user_id, is_typing } => {
            format!("typing   {conversation_id}  {user_id}={is_typing}")
        }
        ServerEvent::UserStatusChange { user_id, is_online, .. } => format!("presence {user_id} online={is_online}"),
        ServerEvent::IncomingCall(offer) => {
            format!("call     {} from {} ({})", offer.call_id, offer.caller_id, offer.kind.as_str())
        }
        ServerEvent::CallEnded { reason } | ServerEvent::CallRejected { reason } => {
            format!("call     ended: {}", reason.as_deref().unwrap_or("-"))
        }
        other => format!("event    {other:?}"),
    }
}

fn print_json(value: &Value) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(value)?;
    println!("{rendered}");
    Ok(())
}
