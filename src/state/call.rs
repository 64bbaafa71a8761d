//! Call signaling state.
//!
//! Only the signaling handshake is tracked here; media is out of scope.
//! User actions return the socket event to emit so the caller decides when
//! and how to send it.

#[cfg(test)]
#[path = "call_test.rs"]
mod call_test;

use packets::Event;
use time::OffsetDateTime;

use crate::net::events::{self, CallKind, CallOffer};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CallPhase {
    #[default]
    Idle,
    /// Incoming offer waiting for an answer, or outgoing call ringing the peer.
    Ringing,
    /// Outgoing call sent; waiting for the server to assign a call id.
    Connecting,
    Active,
    Ended,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CallError {
    #[error("a call is already in progress")]
    Busy,
    #[error("no incoming call to answer")]
    NoIncomingCall,
    #[error("no call in progress")]
    NoCall,
}

#[derive(Clone, Debug, Default)]
pub struct CallState {
    phase: CallPhase,
    call_id: Option<String>,
    conversation_id: Option<String>,
    kind: Option<CallKind>,
    incoming: Option<CallOffer>,
    started_at: Option<OffsetDateTime>,
    end_reason: Option<String>,
}

impl CallState {
    #[must_use]
    pub fn phase(&self) -> CallPhase {
        self.phase
    }

    #[must_use]
    pub fn call_id(&self) -> Option<&str> {
        self.call_id.as_deref()
    }

    #[must_use]
    pub fn conversation_id(&self) -> Option<&str> {
        self.conversation_id.as_deref()
    }

    #[must_use]
    pub fn kind(&self) -> Option<CallKind> {
        self.kind
    }

    #[must_use]
    pub fn incoming(&self) -> Option<&CallOffer> {
        self.incoming.as_ref()
    }

    /// When the call became active.
    #[must_use]
    pub fn started_at(&self) -> Option<OffsetDateTime> {
        self.started_at
    }

    #[must_use]
    pub fn end_reason(&self) -> Option<&str> {
        self.end_reason.as_deref()
    }

    fn is_free(&self) -> bool {
        matches!(self.phase, CallPhase::Idle | CallPhase::Ended)
    }

    /// Start an outgoing call.
    ///
    /// # Errors
    ///
    /// [`CallError::Busy`] unless the state is `Idle` or `Ended`.
    pub fn initiate(&mut self, conversation_id: &str, recipient_id: &str, kind: CallKind) -> Result<Event, CallError> {
        if !self.is_free() {
            return Err(CallError::Busy);
        }
        *self = Self {
            phase: CallPhase::Connecting,
            conversation_id: Some(conversation_id.to_owned()),
            kind: Some(kind),
            ..Self::default()
        };
        Ok(events::call_initiate(conversation_id, recipient_id, kind))
    }

    /// `incoming_call`. An offer while another call is running is ignored.
    pub fn on_incoming(&mut self, offer: CallOffer) -> bool {
        if !self.is_free() {
            tracing::info!(call_id = %offer.call_id, "ignoring incoming call while busy");
            return false;
        }
        *self = Self {
            phase: CallPhase::Ringing,
            call_id: Some(offer.call_id.clone()),
            conversation_id: Some(offer.conversation_id.clone()),
            kind: Some(offer.kind),
            incoming: Some(offer),
            ..Self::default()
        };
        true
    }

    /// `call_initiated`: the server assigned an id to our outgoing call.
    pub fn on_initiated(&mut self, call_id: &str) {
        if self.phase != CallPhase::Connecting {
            return;
        }
        self.call_id = Some(call_id.to_owned());
        self.phase = CallPhase::Ringing;
    }

    /// `call_accepted`: the peer answered our call.
    pub fn on_accepted(&mut self, call_id: Option<&str>) {
        if !matches!(self.phase, CallPhase::Ringing | CallPhase::Connecting) {
            return;
        }
        if let Some(call_id) = call_id {
            self.call_id = Some(call_id.to_owned());
        }
        self.incoming = None;
        self.phase = CallPhase::Active;
        self.started_at = Some(OffsetDateTime::now_utc());
    }

    /// Answer the ringing incoming call.
    ///
    /// # Errors
    ///
    /// [`CallError::NoIncomingCall`] when nothing is ringing.
    pub fn accept(&mut self) -> Result<Event, CallError> {
        let offer = self.incoming.take().ok_or(CallError::NoIncomingCall)?;
        self.phase = CallPhase::Active;
        self.started_at = Some(OffsetDateTime::now_utc());
        Ok(events::call_accept(&offer.call_id))
    }

    /// Decline the ringing incoming call and return to idle.
    ///
    /// # Errors
    ///
    /// [`CallError::NoIncomingCall`] when nothing is ringing.
    pub fn reject(&mut self) -> Result<Event, CallError> {
        let offer = self.incoming.take().ok_or(CallError::NoIncomingCall)?;
        *self = Self::default();
        Ok(events::call_reject(&offer.call_id))
    }

    /// Hang up locally. Returns `call_end` when the server knows the call id.
    ///
    /// # Errors
    ///
    /// [`CallError::NoCall`] when idle or already ended.
    pub fn hang_up(&mut self) -> Result<Option<Event>, CallError> {
        if self.is_free() {
            return Err(CallError::NoCall);
        }
        let event = self.call_id.as_deref().map(events::call_end);
        self.finish(None);
        Ok(event)
    }

    /// `call_rejected`, `call_ended` or `call_failed` from the server.
    pub fn on_remote_end(&mut self, reason: Option<String>) {
        if self.is_free() {
            return;
        }
        self.finish(reason);
    }

    fn finish(&mut self, reason: Option<String>) {
        self.phase = CallPhase::Ended;
        self.incoming = None;
        self.end_reason = reason;
    }
}
