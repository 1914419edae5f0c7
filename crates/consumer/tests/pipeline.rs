//! End-to-end: in-memory broker → consumer runtimes → projections → read stores.

use std::sync::Arc;
use std::time::Duration;

use common::{OrderId, ProductId};
use consumer::{
    ConsumerRuntime, INVENTORY_GROUP, INVENTORY_TOPIC, ORDER_GROUP, ORDER_TOPIC,
    ProjectionHandler, RuntimeState, shutdown,
};
use domain::{InventoryStatus, OrderStatus};
use event_stream::{EventEnvelope, InMemoryBroker};
use projections::{InventoryProjection, OrderProjection};
use read_store::{InMemoryInventoryStore, InMemoryOrderStore, InventoryStore, OrderStore};

fn envelope(
    event_type: &str,
    aggregate_type: &str,
    key: &str,
    payload: serde_json::Value,
) -> EventEnvelope {
    EventEnvelope::builder()
        .event_type(event_type)
        .aggregate_id(key)
        .aggregate_type(aggregate_type)
        .payload_raw(payload)
        .build()
}

struct Pipeline {
    broker: InMemoryBroker,
    inventory_store: InMemoryInventoryStore,
    order_store: InMemoryOrderStore,
    inventory: Arc<ConsumerRuntime>,
    orders: Arc<ConsumerRuntime>,
}

fn pipeline() -> Pipeline {
    let broker = InMemoryBroker::new(3);
    let inventory_store = InMemoryInventoryStore::new();
    let order_store = InMemoryOrderStore::new();

    let inventory = ConsumerRuntime::new(
        "inventory",
        INVENTORY_TOPIC,
        Arc::new(broker.consumer_group(INVENTORY_GROUP)),
        Arc::new(ProjectionHandler::new(InventoryProjection::new(Arc::new(
            inventory_store.clone(),
        )))),
    )
    .with_retry_backoff(Duration::from_millis(10));

    let orders = ConsumerRuntime::new(
        "orders",
        ORDER_TOPIC,
        Arc::new(broker.consumer_group(ORDER_GROUP)),
        Arc::new(ProjectionHandler::new(OrderProjection::new(Arc::new(
            order_store.clone(),
        )))),
    )
    .with_retry_backoff(Duration::from_millis(10));

    Pipeline {
        broker,
        inventory_store,
        order_store,
        inventory: Arc::new(inventory),
        orders: Arc::new(orders),
    }
}

async fn wait_for_offset(broker: &InMemoryBroker, group: &str, topic: &str, key: &str, next: i64) {
    let partition = broker.partition_for(key);
    tokio::time::timeout(Duration::from_secs(5), async {
        while broker.committed_offset(group, topic, partition).await < Some(next) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("offset never committed");
}

#[tokio::test]
async fn test_inventory_scenario_through_the_stream() {
    let p = pipeline();
    let (trigger, token) = shutdown::channel();
    let runtime = p.inventory.clone();
    let task = tokio::spawn(async move { runtime.run(token).await });

    let events = [
        ("InventoryUpdated", serde_json::json!({"productId": "p1", "quantity": 10})),
        ("InventoryAllocated", serde_json::json!({"productId": "p1", "orderId": "o1", "quantity": 10})),
        ("InventoryReturned", serde_json::json!({"productId": "p1", "orderId": "o1", "quantity": 4})),
    ];
    for (event_type, payload) in events {
        p.broker
            .publish_envelope(INVENTORY_TOPIC, &envelope(event_type, "Inventory", "p1", payload))
            .await
            .unwrap();
    }

    wait_for_offset(&p.broker, INVENTORY_GROUP, INVENTORY_TOPIC, "p1", 3).await;

    let item = p
        .inventory_store
        .find_by_product_id(&ProductId::new("p1"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        (item.available_quantity, item.allocated_quantity, item.status),
        (4, 6, InventoryStatus::Available)
    );

    trigger.trigger();
    task.await.unwrap().unwrap();
    assert_eq!(p.inventory.state(), RuntimeState::Closed);
}

#[tokio::test]
async fn test_failing_event_does_not_block_the_partition() {
    let p = pipeline();
    let (trigger, token) = shutdown::channel();
    let runtime = p.inventory.clone();
    let task = tokio::spawn(async move { runtime.run(token).await });

    // Allocation before the item exists fails with NotFound and is skipped.
    p.broker
        .publish_envelope(
            INVENTORY_TOPIC,
            &envelope(
                "InventoryAllocated",
                "Inventory",
                "p9",
                serde_json::json!({"productId": "p9", "orderId": "o1", "quantity": 1}),
            ),
        )
        .await
        .unwrap();
    p.broker
        .publish(INVENTORY_TOPIC, Some("p9"), b"{ not an envelope".to_vec())
        .await;
    p.broker
        .publish_envelope(
            INVENTORY_TOPIC,
            &envelope(
                "InventoryUpdated",
                "Inventory",
                "p9",
                serde_json::json!({"productId": "p9", "quantity": 2}),
            ),
        )
        .await
        .unwrap();

    wait_for_offset(&p.broker, INVENTORY_GROUP, INVENTORY_TOPIC, "p9", 3).await;

    let item = p
        .inventory_store
        .find_by_product_id(&ProductId::new("p9"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(item.available_quantity, 2);
    assert_eq!(item.allocated_quantity, 0);

    trigger.trigger();
    task.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_both_runtimes_share_one_shutdown() {
    let p = pipeline();
    let (trigger, token) = shutdown::channel();

    let inventory = p.inventory.clone();
    let inventory_token = token.clone();
    let inventory_task = tokio::spawn(async move { inventory.run(inventory_token).await });
    let orders = p.orders.clone();
    let orders_task = tokio::spawn(async move { orders.run(token).await });

    for handle in [p.inventory.handle(), p.orders.handle()] {
        tokio::time::timeout(Duration::from_secs(5), handle.ready())
            .await
            .unwrap()
            .unwrap();
    }

    p.broker
        .publish_envelope(
            ORDER_TOPIC,
            &envelope(
                "OrderCreated",
                "Order",
                "o1",
                serde_json::json!({
                    "orderId": "o1",
                    "customerId": "c1",
                    "items": [{"productId": "p1", "quantity": 1, "price": {"currency": "USD", "value": "5.00"}}],
                    "status": "REGISTERED",
                    "totalCost": {"currency": "USD", "value": "5.00"},
                    "issuedAt": "2024-05-01T10:30:00Z"
                }),
            ),
        )
        .await
        .unwrap();
    p.broker
        .publish_envelope(
            ORDER_TOPIC,
            &envelope("OrderCanceled", "Order", "o1", serde_json::json!({"orderId": "o1"})),
        )
        .await
        .unwrap();

    wait_for_offset(&p.broker, ORDER_GROUP, ORDER_TOPIC, "o1", 2).await;

    let order = p
        .order_store
        .find_by_order_id(&OrderId::new("o1"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(order.status, OrderStatus::Cancelled);
    assert!(p.inventory_store.is_empty().await);

    trigger.trigger();
    inventory_task.await.unwrap().unwrap();
    orders_task.await.unwrap().unwrap();
    assert_eq!(p.inventory.state(), RuntimeState::Closed);
    assert_eq!(p.orders.state(), RuntimeState::Closed);
}

#[tokio::test]
async fn test_order_with_overflowing_line_total_keeps_partition_moving() {
    let p = pipeline();
    let (trigger, token) = shutdown::channel();
    let runtime = p.orders.clone();
    let task = tokio::spawn(async move { runtime.run(token).await });

    p.broker
        .publish_envelope(
            ORDER_TOPIC,
            &envelope(
                "OrderCreated",
                "Order",
                "o1",
                serde_json::json!({
                    "orderId": "o1",
                    "customerId": "c1",
                    "items": [{"productId": "p1", "quantity": 2, "price": {"currency": "USD", "value": "79228162514264337593543950335"}}],
                    "status": "REGISTERED",
                    "totalCost": {"currency": "USD", "value": "1"},
                    "issuedAt": "2024-05-01T10:30:00Z"
                }),
            ),
        )
        .await
        .unwrap();
    p.broker
        .publish_envelope(
            ORDER_TOPIC,
            &envelope(
                "OrderStatusUpdated",
                "Order",
                "o1",
                serde_json::json!({"orderId": "o1", "status": "SHIPPED"}),
            ),
        )
        .await
        .unwrap();

    wait_for_offset(&p.broker, ORDER_GROUP, ORDER_TOPIC, "o1", 2).await;

    let order = p
        .order_store
        .find_by_order_id(&OrderId::new("o1"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(order.status, OrderStatus::Shipped);

    trigger.trigger();
    task.await.unwrap().unwrap();
}
