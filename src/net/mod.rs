//! Network layer: REST client, realtime socket, and the event contract.

pub mod api;
pub mod connection;
pub mod dispatch;
pub mod events;
pub mod parse;
pub mod retry;
pub mod types;

#[cfg(test)]
#[path = "fake_socket_test.rs"]
pub(crate) mod fake_socket;
