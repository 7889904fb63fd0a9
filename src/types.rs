use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// upper-case token carrying the full 128 bits of a fresh v4 uuid
fn unique_token() -> String {
    Uuid::new_v4().simple().to_string().to_uppercase()
}

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

string_id!(
    /// business identifier of an order, independent of the storage key
    OrderId
);
string_id!(
    /// business identifier of a product
    ProductId
);
string_id!(
    /// identity uid, also the key of the user record
    UserId
);
string_id!(
    /// storage-internal document key
    DocKey
);

impl OrderId {
    pub fn generate() -> Self {
        Self(format!("ORD-{}", unique_token()))
    }
}

impl ProductId {
    pub fn generate() -> Self {
        Self(format!("PRD-{}", unique_token()))
    }
}

/// generate a promo identifier
pub fn generate_promo_id() -> String {
    format!("PROMO-{}", unique_token())
}

/// order status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// order placed, waiting for dispatch
    Processing,
    /// goods on the way
    Shipping,
    /// goods received, installments being collected
    Delivered,
    /// all installments collected
    PaidOff,
}

impl OrderStatus {
    /// the single state that may follow this one
    pub fn next(&self) -> Option<OrderStatus> {
        match self {
            OrderStatus::Processing => Some(OrderStatus::Shipping),
            OrderStatus::Shipping => Some(OrderStatus::Delivered),
            OrderStatus::Delivered => Some(OrderStatus::PaidOff),
            OrderStatus::PaidOff => None,
        }
    }

    /// persisted tag, as written to the store
    pub fn as_tag(&self) -> &'static str {
        match self {
            OrderStatus::Processing => "processing",
            OrderStatus::Shipping => "shipping",
            OrderStatus::Delivered => "delivered",
            OrderStatus::PaidOff => "paid_off",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_tag())
    }
}

/// how often an installment is collected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentFrequency {
    #[default]
    Daily,
    /// billed as a multi-day unit (six days in the standard configuration)
    Weekly,
}

/// user role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Collector,
    Consumer,
}

/// which profile address an order ships to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AddressChoice {
    #[default]
    Home,
    Business,
}

/// point in time as persisted: a real timestamp, or a legacy display string
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Stamp {
    At(DateTime<Utc>),
    Text(String),
}

impl Stamp {
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            Stamp::At(at) => Some(*at),
            Stamp::Text(_) => None,
        }
    }
}

impl From<DateTime<Utc>> for Stamp {
    fn from(at: DateTime<Utc>) -> Self {
        Stamp::At(at)
    }
}

/// collector reference copied onto an order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectorRef {
    pub uid: UserId,
    pub name: String,
}

/// consumer snapshot copied onto an order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumerRef {
    #[serde(rename = "user_id")]
    pub uid: UserId,
    #[serde(rename = "consumer_name")]
    pub name: String,
    #[serde(rename = "consumer_email")]
    pub email: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::collections::HashSet;

    #[test]
    fn test_status_progression() {
        let mut status = OrderStatus::Processing;
        let mut seen = vec![status];
        while let Some(next) = status.next() {
            assert!(!seen.contains(&next));
            status = next;
            seen.push(status);
        }
        assert_eq!(
            seen,
            vec![
                OrderStatus::Processing,
                OrderStatus::Shipping,
                OrderStatus::Delivered,
                OrderStatus::PaidOff
            ]
        );
    }

    #[test]
    fn test_generated_ids_are_prefixed_and_distinct() {
        let a = OrderId::generate();
        let b = OrderId::generate();
        assert!(a.as_str().starts_with("ORD-"));
        assert_eq!(a.as_str().len(), 4 + 32);
        assert_ne!(a, b);
        assert!(ProductId::generate().as_str().starts_with("PRD-"));
    }

    #[test]
    fn test_order_ids_carry_a_full_uuid() {
        let ids: HashSet<OrderId> = (0..20_000).map(|_| OrderId::generate()).collect();
        assert_eq!(ids.len(), 20_000);
        for id in ids.iter().take(100) {
            let token = id.as_str().trim_start_matches("ORD-");
            assert_eq!(token.len(), 32);
            let parsed = Uuid::parse_str(token).unwrap();
            assert_eq!(parsed.get_version_num(), 4);
        }
    }

    #[test]
    fn test_stamp_accepts_timestamps_and_legacy_text() {
        let at = Utc.with_ymd_and_hms(2024, 11, 14, 3, 0, 0).unwrap();
        let json = serde_json::to_string(&Stamp::At(at)).unwrap();
        let back: Stamp = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Stamp::At(at));

        let legacy: Stamp = serde_json::from_str("\"14 November 2024\"").unwrap();
        assert_eq!(legacy, Stamp::Text("14 November 2024".to_string()));
        assert!(legacy.timestamp().is_none());
    }

    #[test]
    fn test_status_tags() {
        let json = serde_json::to_string(&OrderStatus::PaidOff).unwrap();
        assert_eq!(json, "\"paid_off\"");
        assert_eq!(OrderStatus::PaidOff.as_tag(), "paid_off");
    }
}
