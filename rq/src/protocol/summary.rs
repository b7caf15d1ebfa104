//! Aggregation and ranking over collected replies
//!
//! [`summarize`] is a pure function: no I/O, no shared state, total over
//! every input. Protocol handling stays in the coordinator; this module
//! only folds already-collected replies into a consolidated view.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::wire::{Offer, ProviderReply};

/// The globally cheapest offer across one collection round
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BestOffer {
    /// Provider that advertised the winning offer
    #[serde(rename = "provider-name")]
    pub provider_name: String,

    /// The winning offer itself
    pub offer: Offer,
}

/// Coordinator-side aggregate over a single collection round
///
/// Created fresh per round, reported, and discarded - never persisted.
/// `replies` preserves arrival order, which is also the tie-break order
/// for ranking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionResult {
    /// Valid replies in arrival order
    pub replies: Vec<ProviderReply>,

    /// Sum of the per-reply offer counts
    #[serde(rename = "total-offers")]
    pub total_offers: usize,

    /// Malformed replies dropped during the round
    pub discarded: usize,

    /// Minimum-rate offer across all replies; `None` when no offers
    pub cheapest: Option<BestOffer>,
}

impl CollectionResult {
    /// Number of replies gathered this round
    pub fn reply_count(&self) -> usize {
        self.replies.len()
    }
}

/// Fold replies into a [`CollectionResult`]
///
/// `total_offers` is the sum of the declared counts. `cheapest` is the
/// first strict minimum by daily rate over the flattened
/// (arrival-order, then within-reply order) sequence, so the earliest
/// occurrence wins ties. Callers must check `total_offers` before
/// assuming a meaningful `cheapest`.
pub fn summarize(replies: Vec<ProviderReply>) -> CollectionResult {
    let total_offers: usize = replies.iter().map(|r| r.count).sum();

    let mut cheapest: Option<BestOffer> = None;
    let mut best_rate: Option<Decimal> = None;

    for reply in &replies {
        for offer in &reply.offers {
            let better = match best_rate {
                None => true,
                Some(rate) => offer.daily_rate < rate,
            };
            if better {
                best_rate = Some(offer.daily_rate);
                cheapest = Some(BestOffer {
                    provider_name: reply.provider_name.clone(),
                    offer: offer.clone(),
                });
            }
        }
    }

    CollectionResult {
        replies,
        total_offers,
        discarded: 0,
        cheapest,
    }
}
