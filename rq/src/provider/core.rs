//! Provider role: answer broadcast availability queries
//!
//! The protocol unit is one request/response cycle: wait for a broadcast
//! command, snapshot the fleet, reply once, wait (bounded) for the
//! acknowledgment. A long-lived service loops cycles until interrupted.

use std::time::Duration;

use eyre::Result;
use tracing::{debug, info, warn};

use super::fleet::Fleet;
use crate::bus::{AckWait, ProviderBus};
use crate::protocol::{ProviderReply, QUERY_COMMAND};

/// How one request/response cycle ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// A reply was sent; `confirmed` is false when the ack wait timed
    /// out and the reply is sent but unconfirmed
    Answered { confirmed: bool },
    /// The command was not recognized; no reply was sent
    Ignored(String),
}

/// One rental provider: identity plus fleet
pub struct Provider {
    name: String,
    contact_uri: String,
    fleet: Fleet,
}

impl Provider {
    /// Create a provider with a fixed identity and fleet
    pub fn new(name: impl Into<String>, contact_uri: impl Into<String>, fleet: Fleet) -> Self {
        Self {
            name: name.into(),
            contact_uri: contact_uri.into(),
            fleet,
        }
    }

    /// Provider identity
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The fleet backing this provider
    pub fn fleet(&self) -> &Fleet {
        &self.fleet
    }

    /// Build the reply for one query from a fresh fleet snapshot
    pub fn build_reply(&self) -> ProviderReply {
        ProviderReply::new(self.name.clone(), self.contact_uri.clone(), self.fleet.available_offers())
    }

    /// Run one request/response cycle
    ///
    /// Blocks until a broadcast command arrives. A recognized query gets
    /// exactly one directed reply followed by a wait for the ack token,
    /// bounded when `ack_wait` is `Some`. The query path never mutates
    /// the fleet.
    pub async fn await_and_respond<B: ProviderBus>(
        &self,
        bus: &mut B,
        ack_wait: Option<Duration>,
    ) -> Result<CycleOutcome> {
        let command = bus.next_command().await?;

        if command != QUERY_COMMAND {
            warn!(provider = %self.name, %command, "await_and_respond: unrecognized command, no reply sent");
            return Ok(CycleOutcome::Ignored(command));
        }

        let reply = self.build_reply();
        info!(
            provider = %self.name,
            available = reply.count,
            "Answering availability query"
        );

        bus.send_reply(&reply).await?;

        match bus.await_ack(ack_wait).await? {
            AckWait::Confirmed => {
                debug!(provider = %self.name, "await_and_respond: handshake complete");
                Ok(CycleOutcome::Answered { confirmed: true })
            }
            AckWait::TimedOut => {
                warn!(provider = %self.name, "await_and_respond: ack wait timed out, reply sent but unconfirmed");
                Ok(CycleOutcome::Answered { confirmed: false })
            }
        }
    }

    /// Serve query cycles until interrupted
    ///
    /// On ctrl-c the in-flight cycle is abandoned and the bus endpoint
    /// is released by dropping.
    pub async fn serve<B: ProviderBus>(&self, bus: &mut B, ack_wait: Option<Duration>) -> Result<()> {
        info!(provider = %self.name, "Provider serving availability queries");

        loop {
            tokio::select! {
                outcome = self.await_and_respond(bus, ack_wait) => {
                    match outcome? {
                        CycleOutcome::Answered { confirmed } => {
                            debug!(provider = %self.name, confirmed, "serve: cycle complete");
                        }
                        CycleOutcome::Ignored(command) => {
                            debug!(provider = %self.name, %command, "serve: cycle ignored");
                        }
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    info!(provider = %self.name, "Interrupt received, shutting down");
                    return Ok(());
                }
            }
        }
    }
}
