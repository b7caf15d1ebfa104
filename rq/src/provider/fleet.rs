//! Provider inventory: rental units and the availability snapshot
//!
//! The query path only ever reads the fleet. A unit is available when it
//! has no active rental, and the offer snapshot preserves declaration
//! order.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::protocol::Offer;

/// One unit in a provider's fleet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RentalUnit {
    /// Provider-local unit id
    pub id: u32,

    /// Display name, e.g. `2023/Ferrari/F8 Tributo`
    pub name: String,

    /// Rate per day
    #[serde(rename = "daily-rate")]
    pub daily_rate: Decimal,

    /// When the current rental started; `None` means available
    #[serde(default, rename = "rented-since")]
    pub rented_since: Option<DateTime<Utc>>,

    /// Length of the current rental in days
    #[serde(default, rename = "rental-days")]
    pub rental_days: u32,
}

impl RentalUnit {
    /// An available unit with no rental history
    pub fn available(id: u32, name: impl Into<String>, daily_rate: Decimal) -> Self {
        Self {
            id,
            name: name.into(),
            daily_rate,
            rented_since: None,
            rental_days: 0,
        }
    }

    /// A unit currently out on rental
    pub fn rented(id: u32, name: impl Into<String>, daily_rate: Decimal, since: DateTime<Utc>, days: u32) -> Self {
        Self {
            id,
            name: name.into(),
            daily_rate,
            rented_since: Some(since),
            rental_days: days,
        }
    }

    /// Whether the unit can be offered right now
    pub fn is_available(&self) -> bool {
        self.rented_since.is_none()
    }
}

/// A provider's fleet of rental units
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fleet {
    units: Vec<RentalUnit>,
}

impl Fleet {
    /// Build a fleet from its units
    pub fn new(units: Vec<RentalUnit>) -> Self {
        Self { units }
    }

    /// All units, rented or not
    pub fn units(&self) -> &[RentalUnit] {
        &self.units
    }

    /// Number of currently available units
    pub fn available_count(&self) -> usize {
        self.units.iter().filter(|u| u.is_available()).count()
    }

    /// Read-only offer snapshot of the available units, in declaration order
    pub fn available_offers(&self) -> Vec<Offer> {
        self.units
            .iter()
            .filter(|u| u.is_available())
            .map(|u| Offer::new(u.name.clone(), u.daily_rate))
            .collect()
    }
}

/// Sample fleet for the first demo provider (three available, one rented)
pub fn sample_fleet_downtown() -> Fleet {
    Fleet::new(vec![
        RentalUnit::available(1, "2023/Ferrari/F8 Tributo", Decimal::new(350000, 2)),
        RentalUnit::available(2, "2024/McLaren/720S", Decimal::new(320000, 2)),
        RentalUnit::rented(3, "2022/Lamborghini/Huracan", Decimal::new(400000, 2), Utc::now(), 3),
        RentalUnit::available(4, "2023/Porsche/911 Turbo S", Decimal::new(280000, 2)),
    ])
}

/// Sample fleet for the second demo provider (four available, one rented)
pub fn sample_fleet_airport() -> Fleet {
    Fleet::new(vec![
        RentalUnit::available(1, "2024/Aston Martin/DB11", Decimal::new(380000, 2)),
        RentalUnit::rented(2, "2023/Corvette/C8 Stingray", Decimal::new(250000, 2), Utc::now(), 7),
        RentalUnit::available(3, "2022/Nissan/GT-R", Decimal::new(220000, 2)),
        RentalUnit::available(4, "2023/Audi/R8 V10", Decimal::new(330000, 2)),
        RentalUnit::available(5, "2024/BMW/M4 Competition", Decimal::new(180000, 2)),
    ])
}
