//! Provider role: fleet inventory and the query responder
//!
//! A provider listens for broadcast commands, snapshots its fleet on
//! demand, and answers each recognized query with one directed reply.

mod core;
mod fleet;

pub use core::{CycleOutcome, Provider};
pub use fleet::{Fleet, RentalUnit, sample_fleet_airport, sample_fleet_downtown};
