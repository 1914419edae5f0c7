//! Order projection: one denormalized document per order.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use domain::{Address, DomainError, Money, Order, OrderItem, OrderStatus};
use event_stream::{
    AddressData, MoneyData, OrderCanceledData, OrderCreatedData, OrderEvent,
    OrderStatusUpdatedData, TypedEvent,
};
use read_store::OrderStore;

use crate::Result;
use crate::projection::Projection;

/// Applies order events to the order read store.
///
/// Creation is a full overwrite keyed by order id, so redelivery is safe.
/// Status changes for unknown orders are ignored.
#[derive(Clone)]
pub struct OrderProjection {
    store: Arc<dyn OrderStore>,
}

impl OrderProjection {
    pub fn new(store: Arc<dyn OrderStore>) -> Self {
        Self { store }
    }

    #[tracing::instrument(
        skip(self, event),
        fields(order_id = %event.payload.order_id, customer_id = %event.payload.customer_id)
    )]
    pub async fn handle_order_created(&self, event: &TypedEvent<OrderCreatedData>) -> Result<()> {
        let order = build_order(&event.payload)?;

        match order.items_total() {
            Ok(total) if total.value != order.total_cost.value => {
                tracing::warn!(
                    total_cost = %order.total_cost,
                    items_total = %total,
                    "Order total does not match its line items"
                );
            }
            Err(e) => tracing::warn!(error = %e, "Could not total order line items"),
            Ok(_) => {}
        }

        self.store.upsert(&order).await?;
        tracing::info!(status = %order.status, items = order.item_count(), "Order projected");
        Ok(())
    }

    #[tracing::instrument(
        skip(self, event),
        fields(order_id = %event.payload.order_id, status = %event.payload.status)
    )]
    pub async fn handle_order_status_updated(
        &self,
        event: &TypedEvent<OrderStatusUpdatedData>,
    ) -> Result<()> {
        let data = &event.payload;
        let Some(mut order) = self.store.find_by_order_id(&data.order_id).await? else {
            tracing::debug!("Order not found, status update ignored");
            return Ok(());
        };

        let status: OrderStatus = data.status.parse()?;
        order.set_status(status);
        self.store.upsert(&order).await?;
        Ok(())
    }

    #[tracing::instrument(skip(self, event), fields(order_id = %event.payload.order_id))]
    pub async fn handle_order_cancelled(
        &self,
        event: &TypedEvent<OrderCanceledData>,
    ) -> Result<()> {
        let Some(mut order) = self.store.find_by_order_id(&event.payload.order_id).await? else {
            tracing::debug!("Order not found, cancellation ignored");
            return Ok(());
        };

        order.cancel();
        self.store.upsert(&order).await?;
        Ok(())
    }
}

fn build_order(data: &OrderCreatedData) -> std::result::Result<Order, DomainError> {
    let items = data
        .items
        .iter()
        .map(|item| OrderItem::new(item.product_id.clone(), item.quantity, money(&item.price)))
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let issued_at = common::parse_timestamp(&data.issued_at).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Unparsable issuedAt, using current time");
        Utc::now()
    });

    let status = data.status.parse::<OrderStatus>().unwrap_or_else(|_| {
        tracing::warn!(status = %data.status, "Unrecognized order status, using REGISTERED");
        OrderStatus::Registered
    });

    let mut order = Order::new(
        data.order_id.clone(),
        data.customer_id.clone(),
        items,
        address(&data.shipping_address),
        address(&data.billing_address),
        money(&data.total_cost),
        issued_at,
    );
    order.status = status;
    Ok(order)
}

fn money(data: &MoneyData) -> Money {
    Money::new(data.currency.clone(), data.value)
}

fn address(data: &AddressData) -> Address {
    Address::new(
        data.street.clone(),
        data.city.clone(),
        data.state.clone(),
        data.zip_code.clone(),
        data.country.clone(),
    )
}

#[async_trait]
impl Projection for OrderProjection {
    type Event = OrderEvent;

    fn name(&self) -> &'static str {
        "OrderProjection"
    }

    async fn apply(&self, event: OrderEvent) -> Result<()> {
        match event {
            OrderEvent::OrderCreated(e) => self.handle_order_created(&e).await,
            OrderEvent::OrderStatusUpdated(e) => self.handle_order_status_updated(&e).await,
            OrderEvent::OrderCanceled(e) => self.handle_order_cancelled(&e).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ProjectionError, dispatch};
    use chrono::{Datelike, Timelike};
    use common::OrderId;
    use event_stream::EventEnvelope;
    use read_store::InMemoryOrderStore;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    fn envelope(event_type: &str, payload: serde_json::Value) -> EventEnvelope {
        EventEnvelope::builder()
            .event_type(event_type)
            .aggregate_id("o1")
            .aggregate_type("Order")
            .payload_raw(payload)
            .build()
    }

    fn created(order_id: &str, status: &str, issued_at: &str) -> EventEnvelope {
        envelope(
            "OrderCreated",
            serde_json::json!({
                "orderId": order_id,
                "customerId": "c1",
                "items": [
                    {"productId": "p1", "quantity": 2, "price": {"currency": "USD", "value": "10.00"}},
                    {"productId": "p2", "quantity": 1, "price": {"currency": "USD", "value": 4.5}}
                ],
                "status": status,
                "shippingAddress": {"street": "1 Main St", "city": "Springfield", "state": "IL", "zipCode": "62701", "country": "US"},
                "billingAddress": {"street": "1 Main St", "city": "Springfield", "state": "IL", "zipCode": "62701", "country": "US"},
                "totalCost": {"currency": "USD", "value": "24.50"},
                "issuedAt": issued_at
            }),
        )
    }

    fn status_updated(order_id: &str, status: &str) -> EventEnvelope {
        envelope(
            "OrderStatusUpdated",
            serde_json::json!({"orderId": order_id, "status": status}),
        )
    }

    fn canceled(order_id: &str) -> EventEnvelope {
        envelope("OrderCanceled", serde_json::json!({"orderId": order_id}))
    }

    fn setup() -> (OrderProjection, InMemoryOrderStore) {
        let store = InMemoryOrderStore::new();
        (OrderProjection::new(Arc::new(store.clone())), store)
    }

    async fn stored(store: &InMemoryOrderStore, id: &str) -> Option<Order> {
        store.find_by_order_id(&OrderId::new(id)).await.unwrap()
    }

    #[tokio::test]
    async fn created_order_is_fully_projected() {
        let (projection, store) = setup();
        dispatch(
            &created("o1", "REGISTERED", "2024-05-01T10:30:00Z"),
            &projection,
        )
        .await
        .unwrap();

        let order = stored(&store, "o1").await.unwrap();
        assert_eq!(order.status, OrderStatus::Registered);
        assert_eq!(order.items.len(), 2);
        assert_eq!(order.items[1].price.value, Decimal::from_str("4.5").unwrap());
        assert_eq!(order.total_cost.value, Decimal::from_str("24.50").unwrap());
        assert_eq!(order.shipping_address.zip_code, "62701");
        assert_eq!(order.issued_at.year(), 2024);
        assert_eq!(order.issued_at.hour(), 10);
    }

    #[tokio::test]
    async fn issued_at_without_zone_is_accepted() {
        let (projection, store) = setup();
        dispatch(
            &created("o1", "REGISTERED", "2024-05-01T10:30:00.123456"),
            &projection,
        )
        .await
        .unwrap();
        assert_eq!(stored(&store, "o1").await.unwrap().issued_at.minute(), 30);
    }

    #[tokio::test]
    async fn unparsable_issued_at_falls_back_to_now() {
        let (projection, store) = setup();
        let before = Utc::now();
        dispatch(&created("o1", "REGISTERED", "soon"), &projection)
            .await
            .unwrap();
        assert!(stored(&store, "o1").await.unwrap().issued_at >= before);
    }

    #[tokio::test]
    async fn unrecognized_status_falls_back_to_registered() {
        let (projection, store) = setup();
        dispatch(&created("o1", "PENDING", "2024-05-01T10:30:00Z"), &projection)
            .await
            .unwrap();
        assert_eq!(
            stored(&store, "o1").await.unwrap().status,
            OrderStatus::Registered
        );
    }

    #[tokio::test]
    async fn created_status_is_kept_when_valid() {
        let (projection, store) = setup();
        dispatch(&created("o1", "SHIPPED", "2024-05-01T10:30:00Z"), &projection)
            .await
            .unwrap();
        assert_eq!(
            stored(&store, "o1").await.unwrap().status,
            OrderStatus::Shipped
        );
    }

    #[tokio::test]
    async fn duplicate_creation_yields_single_row() {
        let (projection, store) = setup();
        let event = created("o1", "REGISTERED", "2024-05-01T10:30:00Z");

        dispatch(&event, &projection).await.unwrap();
        let once = stored(&store, "o1").await.unwrap();
        dispatch(&event, &projection).await.unwrap();
        let twice = stored(&store, "o1").await.unwrap();

        assert_eq!(store.len().await, 1);
        assert_eq!(twice.items, once.items);
        assert_eq!(twice.status, once.status);
        assert_eq!(twice.total_cost, once.total_cost);
        assert_eq!(twice.issued_at, once.issued_at);
        assert_eq!(twice.created_at, once.created_at);
    }

    #[tokio::test]
    async fn non_positive_item_quantity_is_rejected() {
        let (projection, store) = setup();
        let event = envelope(
            "OrderCreated",
            serde_json::json!({
                "orderId": "o1",
                "customerId": "c1",
                "items": [{"productId": "p1", "quantity": 0, "price": {"currency": "USD", "value": "1"}}],
                "status": "REGISTERED",
                "totalCost": {"currency": "USD", "value": "0"},
                "issuedAt": "2024-05-01T10:30:00Z"
            }),
        );

        let err = dispatch(&event, &projection).await.unwrap_err();
        assert!(matches!(err, ProjectionError::Validation(_)));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn line_total_overflow_still_projects_order() {
        let (projection, store) = setup();
        let event = envelope(
            "OrderCreated",
            serde_json::json!({
                "orderId": "o1",
                "customerId": "c1",
                "items": [{"productId": "p1", "quantity": 2, "price": {"currency": "USD", "value": "79228162514264337593543950335"}}],
                "status": "REGISTERED",
                "totalCost": {"currency": "USD", "value": "1"},
                "issuedAt": "2024-05-01T10:30:00Z"
            }),
        );

        dispatch(&event, &projection).await.unwrap();
        let order = stored(&store, "o1").await.unwrap();
        assert_eq!(order.items[0].price.value, Decimal::MAX);
    }

    #[tokio::test]
    async fn status_update_for_unknown_order_is_a_no_op() {
        let (projection, store) = setup();
        dispatch(&status_updated("nope", "SHIPPED"), &projection)
            .await
            .unwrap();
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn status_update_sets_status() {
        let (projection, store) = setup();
        dispatch(&created("o1", "REGISTERED", "2024-05-01T10:30:00Z"), &projection)
            .await
            .unwrap();
        dispatch(&status_updated("o1", "PARTIALLY_SHIPPED"), &projection)
            .await
            .unwrap();
        assert_eq!(
            stored(&store, "o1").await.unwrap().status,
            OrderStatus::PartiallyShipped
        );
    }

    #[tokio::test]
    async fn invalid_status_update_is_a_validation_error() {
        let (projection, store) = setup();
        dispatch(&created("o1", "REGISTERED", "2024-05-01T10:30:00Z"), &projection)
            .await
            .unwrap();

        let err = dispatch(&status_updated("o1", "LOST"), &projection)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ProjectionError::Validation(DomainError::InvalidStatus { .. })
        ));
        assert_eq!(
            stored(&store, "o1").await.unwrap().status,
            OrderStatus::Registered
        );
    }

    #[tokio::test]
    async fn cancel_forces_cancelled_from_any_status() {
        let (projection, store) = setup();
        dispatch(&created("o1", "DELIVERED", "2024-05-01T10:30:00Z"), &projection)
            .await
            .unwrap();
        dispatch(&canceled("o1"), &projection).await.unwrap();
        assert_eq!(
            stored(&store, "o1").await.unwrap().status,
            OrderStatus::Cancelled
        );
    }

    #[tokio::test]
    async fn cancel_for_unknown_order_is_a_no_op() {
        let (projection, store) = setup();
        dispatch(&canceled("ghost"), &projection).await.unwrap();
        assert!(store.is_empty().await);
    }
}
