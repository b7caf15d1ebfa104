//! In-process bus over tokio channels
//!
//! Commands fan out on a `broadcast` channel; each directed reply rides
//! an `mpsc` channel paired with a `oneshot` sender that carries the ack
//! back to exactly the provider that replied. Used by the demo runner
//! and tests; the roles themselves only see the bus traits.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::timeout;
use tracing::{debug, warn};

use super::{Ack, AckWait, BusError, CoordinatorBus, ProviderBus, ReplyDelivery, ReplyWait};
use crate::protocol::{ACK_TOKEN, ProviderReply};

/// Default channel capacity for commands and replies
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

type ReplyEnvelope = (ProviderReply, oneshot::Sender<String>);

/// In-process bus hub
///
/// Hand out provider endpoints first, then consume the hub to obtain the
/// coordinator endpoint. Each endpoint owns its own channel halves.
pub struct LocalBus {
    cmd_tx: broadcast::Sender<String>,
    reply_tx: mpsc::Sender<ReplyEnvelope>,
    reply_rx: mpsc::Receiver<ReplyEnvelope>,
}

impl LocalBus {
    /// Create a hub with the given channel capacity
    pub fn new(capacity: usize) -> Self {
        debug!(capacity, "LocalBus::new: creating in-process bus");
        let (cmd_tx, _) = broadcast::channel(capacity);
        let (reply_tx, reply_rx) = mpsc::channel(capacity);
        Self {
            cmd_tx,
            reply_tx,
            reply_rx,
        }
    }

    /// Create an endpoint for one provider
    pub fn provider_side(&self) -> LocalProviderBus {
        debug!("LocalBus::provider_side: new provider endpoint");
        LocalProviderBus {
            cmd_rx: self.cmd_tx.subscribe(),
            reply_tx: self.reply_tx.clone(),
            pending_ack: None,
        }
    }

    /// Consume the hub into the coordinator endpoint
    pub fn into_coordinator_side(self) -> LocalCoordinatorBus {
        debug!("LocalBus::into_coordinator_side: coordinator endpoint");
        LocalCoordinatorBus {
            cmd_tx: self.cmd_tx,
            reply_rx: self.reply_rx,
            // Keeps the reply channel open with zero providers so a wait
            // runs out its deadline instead of observing a closed channel
            _keepalive: self.reply_tx,
        }
    }
}

impl Default for LocalBus {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }
}

/// Coordinator endpoint of a [`LocalBus`]
pub struct LocalCoordinatorBus {
    cmd_tx: broadcast::Sender<String>,
    reply_rx: mpsc::Receiver<ReplyEnvelope>,
    _keepalive: mpsc::Sender<ReplyEnvelope>,
}

/// Ack path back to one local provider
struct LocalAck {
    tx: oneshot::Sender<String>,
}

#[async_trait]
impl Ack for LocalAck {
    async fn ack(self: Box<Self>) -> Result<(), BusError> {
        self.tx.send(ACK_TOKEN.to_string()).map_err(|_| BusError::Closed)
    }
}

#[async_trait]
impl CoordinatorBus for LocalCoordinatorBus {
    async fn broadcast(&mut self, command: &str) -> Result<(), BusError> {
        // No subscribers is not an error: the round degrades to a timeout
        let receivers = self.cmd_tx.send(command.to_string()).unwrap_or(0);
        debug!(command, receivers, "LocalCoordinatorBus::broadcast");
        Ok(())
    }

    async fn next_reply(&mut self, wait: Duration) -> Result<ReplyWait, BusError> {
        debug!(?wait, "LocalCoordinatorBus::next_reply: waiting");
        match timeout(wait, self.reply_rx.recv()).await {
            Ok(Some((reply, ack_tx))) => {
                debug!(provider = %reply.provider_name, "LocalCoordinatorBus::next_reply: delivered");
                Ok(ReplyWait::Delivered(ReplyDelivery::new(
                    reply,
                    Box::new(LocalAck { tx: ack_tx }),
                )))
            }
            Ok(None) => Err(BusError::Closed),
            Err(_) => Ok(ReplyWait::TimedOut),
        }
    }
}

/// Provider endpoint of a [`LocalBus`]
pub struct LocalProviderBus {
    cmd_rx: broadcast::Receiver<String>,
    reply_tx: mpsc::Sender<ReplyEnvelope>,
    pending_ack: Option<oneshot::Receiver<String>>,
}

#[async_trait]
impl ProviderBus for LocalProviderBus {
    async fn next_command(&mut self) -> Result<String, BusError> {
        loop {
            match self.cmd_rx.recv().await {
                Ok(command) => {
                    debug!(%command, "LocalProviderBus::next_command: received");
                    return Ok(command);
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "LocalProviderBus::next_command: lagged, commands dropped");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return Err(BusError::Closed),
            }
        }
    }

    async fn send_reply(&mut self, reply: &ProviderReply) -> Result<(), BusError> {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.reply_tx
            .send((reply.clone(), ack_tx))
            .await
            .map_err(|_| BusError::Closed)?;
        self.pending_ack = Some(ack_rx);
        debug!(provider = %reply.provider_name, count = reply.count, "LocalProviderBus::send_reply: sent");
        Ok(())
    }

    async fn await_ack(&mut self, wait: Option<Duration>) -> Result<AckWait, BusError> {
        let ack_rx = self.pending_ack.take().ok_or(BusError::NoExchange)?;

        match wait {
            Some(wait) => match timeout(wait, ack_rx).await {
                Ok(Ok(token)) => {
                    debug!(%token, "LocalProviderBus::await_ack: confirmed");
                    Ok(AckWait::Confirmed)
                }
                Ok(Err(_)) => Err(BusError::Closed),
                Err(_) => Ok(AckWait::TimedOut),
            },
            None => match ack_rx.await {
                Ok(token) => {
                    debug!(%token, "LocalProviderBus::await_ack: confirmed");
                    Ok(AckWait::Confirmed)
                }
                Err(_) => Err(BusError::Closed),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{Offer, QUERY_COMMAND};
    use rust_decimal::Decimal;

    #[tokio::test]
    async fn test_broadcast_reaches_all_providers() {
        let bus = LocalBus::default();
        let mut provider_a = bus.provider_side();
        let mut provider_b = bus.provider_side();
        let mut coordinator = bus.into_coordinator_side();

        coordinator.broadcast(QUERY_COMMAND).await.unwrap();

        assert_eq!(provider_a.next_command().await.unwrap(), QUERY_COMMAND);
        assert_eq!(provider_b.next_command().await.unwrap(), QUERY_COMMAND);
    }

    #[tokio::test]
    async fn test_reply_ack_round_trip() {
        let bus = LocalBus::default();
        let mut provider = bus.provider_side();
        let mut coordinator = bus.into_coordinator_side();

        let reply = ProviderReply::new("a", "uri://a", vec![Offer::new("X", Decimal::new(100, 0))]);
        provider.send_reply(&reply).await.unwrap();

        let wait = coordinator.next_reply(Duration::from_secs(1)).await.unwrap();
        match wait {
            ReplyWait::Delivered(delivery) => {
                assert_eq!(delivery.reply.provider_name, "a");
                delivery.ack().await.unwrap();
            }
            ReplyWait::TimedOut => panic!("expected delivery"),
        }

        let ack = provider.await_ack(Some(Duration::from_secs(1))).await.unwrap();
        assert_eq!(ack, AckWait::Confirmed);
    }

    #[tokio::test]
    async fn test_no_providers_waits_out_the_deadline() {
        let bus = LocalBus::default();
        let mut coordinator = bus.into_coordinator_side();

        coordinator.broadcast(QUERY_COMMAND).await.unwrap();

        let started = std::time::Instant::now();
        let wait = coordinator.next_reply(Duration::from_millis(50)).await.unwrap();
        assert!(matches!(wait, ReplyWait::TimedOut));
        assert!(started.elapsed() >= Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_await_ack_without_exchange_is_an_error() {
        let bus = LocalBus::default();
        let mut provider = bus.provider_side();
        drop(bus);

        let err = provider.await_ack(Some(Duration::from_millis(10))).await.unwrap_err();
        assert!(matches!(err, BusError::NoExchange));
    }

    #[tokio::test]
    async fn test_unacked_discarded_delivery_surfaces_as_closed() {
        let bus = LocalBus::default();
        let mut provider = bus.provider_side();
        let mut coordinator = bus.into_coordinator_side();

        let reply = ProviderReply::new("a", "uri://a", vec![]);
        provider.send_reply(&reply).await.unwrap();

        // Drop the delivery without acking
        let wait = coordinator.next_reply(Duration::from_secs(1)).await.unwrap();
        drop(wait);

        let err = provider.await_ack(Some(Duration::from_secs(1))).await.unwrap_err();
        assert!(matches!(err, BusError::Closed));
    }
}
