use chrono::{DateTime, Utc};
use common::{CustomerId, OrderId, ProductId};
use serde::{Deserialize, Serialize};

use super::{Address, Money, OrderStatus};
use crate::{DomainError, Result};

/// A line item in an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub product_id: ProductId,
    pub quantity: i64,
    pub price: Money,
}

impl OrderItem {
    /// Creates a line item; the quantity must be positive.
    pub fn new(product_id: impl Into<ProductId>, quantity: i64, price: Money) -> Result<Self> {
        if quantity <= 0 {
            return Err(DomainError::InvalidQuantity {
                quantity,
                reason: "quantity must be greater than zero",
            });
        }

        Ok(Self {
            product_id: product_id.into(),
            quantity,
            price,
        })
    }

    /// Price times quantity.
    pub fn line_total(&self) -> Result<Money> {
        self.price.multiply(self.quantity)
    }
}

/// Denormalized view of an order.
///
/// Keyed by the business `order_id`; any storage id is the store's concern.
/// Line items are fixed at creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub order_id: OrderId,
    pub customer_id: CustomerId,
    pub items: Vec<OrderItem>,
    pub status: OrderStatus,
    pub shipping_address: Address,
    pub billing_address: Address,
    pub total_cost: Money,
    pub issued_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Creates a registered order.
    pub fn new(
        order_id: impl Into<OrderId>,
        customer_id: impl Into<CustomerId>,
        items: Vec<OrderItem>,
        shipping_address: Address,
        billing_address: Address,
        total_cost: Money,
        issued_at: DateTime<Utc>,
    ) -> Self {
        let now = Utc::now();
        Self {
            order_id: order_id.into(),
            customer_id: customer_id.into(),
            items,
            status: OrderStatus::Registered,
            shipping_address,
            billing_address,
            total_cost,
            issued_at,
            created_at: now,
            updated_at: now,
        }
    }

    /// Sets the status reported by the stream.
    pub fn set_status(&mut self, status: OrderStatus) {
        self.status = status;
        self.updated_at = Utc::now();
    }

    /// Forces the order into `Cancelled`, whatever its current status.
    pub fn cancel(&mut self) {
        self.set_status(OrderStatus::Cancelled);
    }

    pub fn can_be_cancelled(&self) -> bool {
        self.status == OrderStatus::Registered
    }

    pub fn can_be_shipped(&self) -> bool {
        self.status == OrderStatus::Registered
    }

    pub fn can_be_delivered(&self) -> bool {
        matches!(
            self.status,
            OrderStatus::Shipped | OrderStatus::PartiallyShipped
        )
    }

    /// Sum of line totals, in the currency of `total_cost`.
    pub fn items_total(&self) -> Result<Money> {
        self.items
            .iter()
            .try_fold(Money::zero(self.total_cost.currency.clone()), |acc, item| {
                acc.add(&item.line_total()?)
            })
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    fn usd(value: &str) -> Money {
        Money::new("USD", Decimal::from_str(value).unwrap())
    }

    fn sample_order() -> Order {
        Order::new(
            "o1",
            "c1",
            vec![
                OrderItem::new("p1", 2, usd("19.99")).unwrap(),
                OrderItem::new("p2", 1, usd("5.00")).unwrap(),
            ],
            Address::new("1 Main St", "Springfield", "IL", "62701", "US"),
            Address::default(),
            usd("44.98"),
            Utc::now(),
        )
    }

    #[test]
    fn new_order_is_registered() {
        let order = sample_order();
        assert_eq!(order.status, OrderStatus::Registered);
        assert_eq!(order.item_count(), 2);
        assert_eq!(order.created_at, order.updated_at);
    }

    #[test]
    fn order_item_requires_positive_quantity() {
        assert!(matches!(
            OrderItem::new("p1", 0, usd("1")),
            Err(DomainError::InvalidQuantity { quantity: 0, .. })
        ));
        assert!(OrderItem::new("p1", -2, usd("1")).is_err());
    }

    #[test]
    fn items_total_sums_line_totals() {
        let order = sample_order();
        assert_eq!(order.items_total().unwrap(), order.total_cost);
    }

    #[test]
    fn items_total_rejects_mixed_currencies() {
        let mut order = sample_order();
        order.items.push(OrderItem::new("p3", 1, Money::new("EUR", Decimal::ONE)).unwrap());
        assert!(matches!(
            order.items_total(),
            Err(DomainError::CurrencyMismatch { .. })
        ));
    }

    #[test]
    fn items_total_reports_overflow() {
        let mut order = sample_order();
        order.items = vec![OrderItem::new("p1", 2, Money::new("USD", Decimal::MAX)).unwrap()];
        assert!(matches!(
            order.items_total(),
            Err(DomainError::AmountOverflow { .. })
        ));
    }

    #[test]
    fn transition_predicates_follow_status() {
        let mut order = sample_order();
        assert!(order.can_be_cancelled());
        assert!(order.can_be_shipped());
        assert!(!order.can_be_delivered());

        order.set_status(OrderStatus::PartiallyShipped);
        assert!(!order.can_be_cancelled());
        assert!(order.can_be_delivered());

        order.cancel();
        assert_eq!(order.status, OrderStatus::Cancelled);
        assert!(!order.can_be_shipped());
    }

    #[test]
    fn order_serializes_with_business_id() {
        let json = serde_json::to_value(sample_order()).unwrap();
        assert_eq!(json["orderId"], "o1");
        assert_eq!(json["customerId"], "c1");
        assert_eq!(json["status"], "REGISTERED");
        assert_eq!(json["items"][0]["price"]["value"], "19.99");
        assert_eq!(json["shippingAddress"]["zipCode"], "62701");
    }
}
