//! Order status.

use serde::{Deserialize, Serialize};

use crate::DomainError;

/// The status of an order as reported by the command side.
///
/// ```text
/// Registered ──┬──► Shipped ──────────► Delivered
///              ├──► PartiallyShipped ─► PartiallyDelivered
///              └──► Cancelled
/// ```
///
/// The read side does not enforce these transitions; it records whatever
/// status the stream reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    #[default]
    Registered,
    Cancelled,
    Shipped,
    PartiallyShipped,
    Delivered,
    PartiallyDelivered,
}

impl OrderStatus {
    /// Returns the wire name of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Registered => "REGISTERED",
            OrderStatus::Cancelled => "CANCELLED",
            OrderStatus::Shipped => "SHIPPED",
            OrderStatus::PartiallyShipped => "PARTIALLY_SHIPPED",
            OrderStatus::Delivered => "DELIVERED",
            OrderStatus::PartiallyDelivered => "PARTIALLY_DELIVERED",
        }
    }

    /// Returns true if no further status is expected.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Cancelled | OrderStatus::Delivered | OrderStatus::PartiallyDelivered
        )
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "REGISTERED" => Ok(OrderStatus::Registered),
            "CANCELLED" => Ok(OrderStatus::Cancelled),
            "SHIPPED" => Ok(OrderStatus::Shipped),
            "PARTIALLY_SHIPPED" => Ok(OrderStatus::PartiallyShipped),
            "DELIVERED" => Ok(OrderStatus::Delivered),
            "PARTIALLY_DELIVERED" => Ok(OrderStatus::PartiallyDelivered),
            other => Err(DomainError::InvalidStatus {
                kind: "order",
                value: other.to_string(),
            }),
        }
    }
}
