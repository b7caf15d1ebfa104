//! Transport contract between coordinator and providers
//!
//! Two independent channels compose the bus: a fan-out broadcast channel
//! carrying the command token with no acknowledgment, and a directed
//! reply channel carrying one [`ProviderReply`] out and the `ACK` token
//! back. Endpoints are explicitly constructed and owned by the role that
//! uses them - there is no ambient global context.
//!
//! Bounded waits return tagged results ([`ReplyWait`], [`AckWait`])
//! rather than surfacing transport error codes: a timeout is protocol
//! data, not a failure. Only resource-level problems become [`BusError`].

mod local;
mod tcp;

pub use local::{LocalBus, LocalCoordinatorBus, LocalProviderBus};
pub use tcp::{TcpCoordinatorBus, TcpProviderBus};

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::protocol::ProviderReply;

/// Maximum size of one reply frame on a byte-stream transport
pub const MAX_FRAME_SIZE: usize = 64 * 1024;

/// Transport-level failures
///
/// Protocol-level conditions (reply timeout, malformed reply) are not
/// errors and never appear here.
#[derive(Debug, Error)]
pub enum BusError {
    #[error("Failed to bind {addr}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to connect to {addr}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Bus channel closed")]
    Closed,

    #[error("No reply exchange in progress")]
    NoExchange,

    #[error("Frame of {size} bytes exceeds limit of {max}")]
    FrameTooLarge { size: usize, max: usize },

    #[error("Frame codec error: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Outcome of one bounded wait on the directed reply channel
#[derive(Debug)]
pub enum ReplyWait {
    /// A reply arrived within the deadline
    Delivered(ReplyDelivery),
    /// The deadline elapsed with no reply
    TimedOut,
}

/// Outcome of a provider's bounded wait for the acknowledgment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckWait {
    /// The handshake completed
    Confirmed,
    /// The wait elapsed; the reply is sent but unconfirmed
    TimedOut,
}

/// Completes one directed round-trip by sending `ACK` to the sender
#[async_trait]
pub trait Ack: Send {
    async fn ack(self: Box<Self>) -> Result<(), BusError>;
}

/// One reply taken off the directed channel, plus its pending ack
///
/// The ack targets exactly the provider that sent this reply. Dropping a
/// delivery without acking leaves that provider waiting out its own ack
/// timeout, so the coordinator acks even replies it discards.
pub struct ReplyDelivery {
    /// The received reply record
    pub reply: ProviderReply,
    acker: Box<dyn Ack>,
}

impl ReplyDelivery {
    /// Pair a received reply with its ack path
    pub fn new(reply: ProviderReply, acker: Box<dyn Ack>) -> Self {
        Self { reply, acker }
    }

    /// Send the acknowledgment token back to the sender
    pub async fn ack(self) -> Result<(), BusError> {
        self.acker.ack().await
    }
}

impl std::fmt::Debug for ReplyDelivery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplyDelivery").field("reply", &self.reply).finish()
    }
}

/// Coordinator-side bus endpoint
#[async_trait]
pub trait CoordinatorBus: Send {
    /// Fan the command token out to all currently connected providers
    async fn broadcast(&mut self, command: &str) -> Result<(), BusError>;

    /// Wait up to `wait` for the next directed reply
    async fn next_reply(&mut self, wait: Duration) -> Result<ReplyWait, BusError>;
}

/// Provider-side bus endpoint
#[async_trait]
pub trait ProviderBus: Send {
    /// Block until one broadcast command arrives
    async fn next_command(&mut self) -> Result<String, BusError>;

    /// Send one directed reply to the coordinator
    async fn send_reply(&mut self, reply: &ProviderReply) -> Result<(), BusError>;

    /// Wait for the acknowledgment, bounded when `wait` is `Some`
    async fn await_ack(&mut self, wait: Option<Duration>) -> Result<AckWait, BusError>;
}
