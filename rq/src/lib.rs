//! rentquery - broadcast availability aggregation for rental providers
//!
//! A coordinator fans one `QTY` command out to every connected provider,
//! then synchronously collects up to N directed replies with a fresh
//! timeout per reply, acknowledging each, and folds the inventories into
//! one ranked consolidated view.
//!
//! # Core Concepts
//!
//! - **Two independent channels**: broadcast fan-out for the command, a
//!   directed reply channel for the reply/ack round-trip
//! - **Partial failure is data**: timeouts truncate a round and malformed
//!   replies are skipped-and-acked; neither is an error
//! - **Owned endpoints**: bus endpoints are constructed explicitly and
//!   owned by their role - no ambient transport context
//! - **Pure ranking**: aggregation is a total function over collected
//!   replies with arrival-order tie-breaks
//!
//! # Modules
//!
//! - [`protocol`] - wire records and the aggregation/ranking function
//! - [`bus`] - transport contract plus in-process and TCP buses
//! - [`coordinator`] - broadcast-and-collect loop
//! - [`provider`] - fleet inventory and the query responder
//! - [`config`] - configuration types and loading
//! - [`cli`] - command-line interface

pub mod bus;
pub mod cli;
pub mod config;
pub mod coordinator;
pub mod protocol;
pub mod provider;

// Re-export commonly used types
pub use bus::{
    Ack, AckWait, BusError, CoordinatorBus, LocalBus, LocalCoordinatorBus, LocalProviderBus, ProviderBus,
    ReplyDelivery, ReplyWait, TcpCoordinatorBus, TcpProviderBus,
};
pub use config::{BusConfig, CollectConfig, Config, ProviderConfig};
pub use coordinator::Coordinator;
pub use protocol::{ACK_TOKEN, BestOffer, CollectionResult, Offer, ProviderReply, QUERY_COMMAND, summarize};
pub use provider::{CycleOutcome, Fleet, Provider, RentalUnit, sample_fleet_airport, sample_fleet_downtown};
