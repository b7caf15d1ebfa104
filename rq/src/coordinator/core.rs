//! Broadcast-and-collect loop
//!
//! One collection round: broadcast the query command once, then gather up
//! to `expected_replies` directed replies, each with its own fresh
//! timeout budget. The loop is strictly sequential - every iteration
//! finishes its receive/validate/ack before the next wait starts.

use std::time::Duration;

use eyre::Result;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::bus::{CoordinatorBus, ReplyWait};
use crate::protocol::{CollectionResult, QUERY_COMMAND, summarize};

/// Runs collection rounds over an owned bus endpoint
pub struct Coordinator<B: CoordinatorBus> {
    bus: B,
}

impl<B: CoordinatorBus> Coordinator<B> {
    /// Create a coordinator over the given bus endpoint
    pub fn new(bus: B) -> Self {
        Self { bus }
    }

    /// Broadcast the query and collect up to `expected_replies` replies
    ///
    /// Each reply gets a fresh `per_reply_timeout` budget, so the call
    /// returns within `expected_replies * per_reply_timeout` worst case.
    /// A timeout truncates the round and keeps what was collected; a
    /// malformed reply is discarded but still acknowledged so its sender
    /// never hangs on the handshake. Only transport failures are errors -
    /// zero connected providers degrades to one full-timeout wait and an
    /// empty result.
    pub async fn request_availability(
        &mut self,
        expected_replies: usize,
        per_reply_timeout: Duration,
    ) -> Result<CollectionResult> {
        if per_reply_timeout.is_zero() {
            eyre::bail!("per-reply timeout must be positive");
        }

        let round_id = Uuid::now_v7();
        info!(%round_id, expected_replies, ?per_reply_timeout, "Starting collection round");

        self.bus.broadcast(QUERY_COMMAND).await?;
        debug!(%round_id, command = QUERY_COMMAND, "request_availability: broadcast sent");

        let mut replies = Vec::with_capacity(expected_replies);
        let mut discarded = 0usize;

        for slot in 0..expected_replies {
            match self.bus.next_reply(per_reply_timeout).await? {
                ReplyWait::Delivered(delivery) => {
                    let reply = delivery.reply.clone();

                    if reply.is_consistent() {
                        debug!(
                            %round_id,
                            slot,
                            provider = %reply.provider_name,
                            offers = reply.count,
                            "request_availability: reply accepted"
                        );
                        replies.push(reply);
                    } else {
                        warn!(
                            %round_id,
                            slot,
                            provider = %reply.provider_name,
                            declared = reply.count,
                            actual = reply.offers.len(),
                            "request_availability: count mismatch, reply discarded"
                        );
                        discarded += 1;
                    }

                    // Ack regardless of validity; a malformed reply must
                    // not leave its sender hanging on the handshake
                    if let Err(e) = delivery.ack().await {
                        warn!(%round_id, slot, error = %e, "request_availability: ack delivery failed");
                    }
                }
                ReplyWait::TimedOut => {
                    warn!(
                        %round_id,
                        received = replies.len(),
                        expected_replies,
                        "request_availability: timed out, truncating round"
                    );
                    break;
                }
            }
        }

        let mut result = summarize(replies);
        result.discarded = discarded;

        info!(
            %round_id,
            replies = result.reply_count(),
            total_offers = result.total_offers,
            discarded = result.discarded,
            "Collection round complete"
        );

        Ok(result)
    }
}
