//! Wire records for the availability protocol
//!
//! The broadcast channel carries a bare command token; the directed reply
//! channel carries a [`ProviderReply`] record out and the acknowledgment
//! token back. Replies are explicit versioned structures so that peers
//! written against other runtimes can interoperate - nothing opaque goes
//! over the wire.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Command token broadcast to all providers to request availability.
pub const QUERY_COMMAND: &str = "QTY";

/// Acknowledgment token sent back to a provider after its reply is taken.
pub const ACK_TOKEN: &str = "ACK";

/// Current wire schema version for [`ProviderReply`].
pub const WIRE_VERSION: u32 = 1;

fn default_wire_version() -> u32 {
    WIRE_VERSION
}

/// One rentable unit advertised by a provider at query time
///
/// Immutable once produced; derived fresh from the provider's fleet on
/// every query. Names are provider-defined and not globally unique.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Offer {
    /// Provider-defined unit name (non-empty)
    pub name: String,

    /// Rate per day, currency-agnostic, `>= 0`
    #[serde(rename = "daily-rate")]
    pub daily_rate: Decimal,
}

impl Offer {
    /// Create a new offer
    pub fn new(name: impl Into<String>, daily_rate: Decimal) -> Self {
        Self {
            name: name.into(),
            daily_rate,
        }
    }
}

/// A provider's answer to one broadcast availability query
///
/// Constructed by a provider in response to exactly one command,
/// transmitted once, and owned by the coordinator after receipt. The
/// `count` field is an explicit integrity check - the coordinator
/// validates it against the offer list instead of trusting it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderReply {
    /// Wire schema version; absent in a frame means version 1
    #[serde(default = "default_wire_version")]
    pub version: u32,

    /// Provider identity, unique per instance for the session
    #[serde(rename = "provider-name")]
    pub provider_name: String,

    /// Opaque contact endpoint, informational only
    #[serde(rename = "contact-uri")]
    pub contact_uri: String,

    /// Declared number of offers; must equal `offers.len()`
    pub count: usize,

    /// Available offers in the provider's own order (may be empty)
    pub offers: Vec<Offer>,
}

impl ProviderReply {
    /// Build a reply from an offer snapshot, deriving `count`
    pub fn new(provider_name: impl Into<String>, contact_uri: impl Into<String>, offers: Vec<Offer>) -> Self {
        Self {
            version: WIRE_VERSION,
            provider_name: provider_name.into(),
            contact_uri: contact_uri.into(),
            count: offers.len(),
            offers,
        }
    }

    /// Check the count/offers integrity invariant
    ///
    /// A reply that fails this check is discarded by the coordinator but
    /// still acknowledged, so the sender never hangs on the handshake.
    pub fn is_consistent(&self) -> bool {
        self.count == self.offers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reply_derives_count() {
        let reply = ProviderReply::new(
            "downtown-rentals",
            "http://api.downtown.example/rental",
            vec![
                Offer::new("2023/Ferrari/F8 Tributo", Decimal::new(350000, 2)),
                Offer::new("2024/McLaren/720S", Decimal::new(320000, 2)),
            ],
        );

        assert_eq!(reply.version, WIRE_VERSION);
        assert_eq!(reply.count, 2);
        assert!(reply.is_consistent());
    }

    #[test]
    fn test_reply_serialization_uses_kebab_fields() {
        let reply = ProviderReply::new("a", "uri://a", vec![Offer::new("X", Decimal::new(10000, 2))]);

        let json = serde_json::to_string(&reply).unwrap();
        assert!(json.contains("provider-name"));
        assert!(json.contains("contact-uri"));
        assert!(json.contains("daily-rate"));

        let back: ProviderReply = serde_json::from_str(&json).unwrap();
        assert_eq!(back, reply);
    }

    #[test]
    fn test_missing_version_decodes_as_v1() {
        let json = r#"{"provider-name":"a","contact-uri":"uri://a","count":0,"offers":[]}"#;
        let reply: ProviderReply = serde_json::from_str(json).unwrap();
        assert_eq!(reply.version, 1);
        assert!(reply.is_consistent());
    }

    #[test]
    fn test_count_mismatch_detected() {
        let mut reply = ProviderReply::new("a", "uri://a", vec![Offer::new("X", Decimal::new(10000, 2))]);
        reply.count = 3;
        assert!(!reply.is_consistent());
    }

    #[test]
    fn test_decimal_rate_roundtrip() {
        let offer = Offer::new("2022/Lamborghini/Huracan", Decimal::new(400000, 2));
        let json = serde_json::to_string(&offer).unwrap();
        let back: Offer = serde_json::from_str(&json).unwrap();
        assert_eq!(back.daily_rate, Decimal::new(400000, 2));
    }
}
