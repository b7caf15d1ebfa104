//! Availability protocol: wire records and aggregation
//!
//! One collection round is a broadcast `QTY` command followed by up to N
//! directed reply/ack round-trips:
//! - **wire:** the versioned records and literal tokens that cross the bus
//! - **summary:** the pure aggregation/ranking over collected replies

mod summary;
mod wire;

pub use summary::{BestOffer, CollectionResult, summarize};
pub use wire::{ACK_TOKEN, Offer, ProviderReply, QUERY_COMMAND, WIRE_VERSION};
