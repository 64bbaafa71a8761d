//! Client-side sync layer for the social app's conversations and notifications.
//!
//! SYSTEM CONTEXT
//! ==============
//! The backend exposes a REST API and a Socket.IO server. This crate keeps a
//! consistent in-memory view of the user's inbox, the open chat and the
//! notification feed by merging three inputs:
//!
//! - fetched snapshots (`net::api`)
//! - live pushes over the socket (`net::connection`, `net::events`)
//! - local optimistic mutations (`state`)
//!
//! `Session` ties them together. It is the only type most callers need.
//!
//! The library logs through `tracing` and never installs a subscriber.

pub mod config;
pub mod net;
pub mod session;
pub mod state;
pub mod store;

pub use config::{ClientConfig, ConfigError};
pub use net::api::{ApiClient, ApiError, AuthSession, Backend};
pub use net::connection::{Connection, ConnectionError, ConnectionStatus};
pub use net::dispatch::Outcome;
pub use net::events::{CallKind, ServerEvent};
pub use session::{Session, SessionError};
pub use store::{StoreError, StoredSession, TokenStore};
