use std::sync::Arc;

use criterion::{Criterion, criterion_group, criterion_main};
use event_stream::EventEnvelope;
use projections::{InventoryProjection, OrderProjection, dispatch};
use read_store::{InMemoryInventoryStore, InMemoryOrderStore, OrderStore};

fn envelope(event_type: &str, aggregate_id: &str, payload: serde_json::Value) -> EventEnvelope {
    EventEnvelope::builder()
        .event_type(event_type)
        .aggregate_id(aggregate_id)
        .aggregate_type("Bench")
        .payload_raw(payload)
        .build()
}

fn order_created(order_id: &str, customer_id: &str) -> EventEnvelope {
    envelope(
        "OrderCreated",
        order_id,
        serde_json::json!({
            "orderId": order_id,
            "customerId": customer_id,
            "items": [
                {"productId": "SKU-001", "quantity": 3, "price": {"currency": "USD", "value": "10.00"}},
                {"productId": "SKU-002", "quantity": 1, "price": {"currency": "USD", "value": "25.00"}}
            ],
            "status": "REGISTERED",
            "totalCost": {"currency": "USD", "value": "55.00"},
            "issuedAt": "2024-05-01T10:30:00Z"
        }),
    )
}

/// Populates the order projection with `n` orders spread over 20 customers.
async fn populate_orders(projection: &OrderProjection, n: usize) {
    for i in 0..n {
        let event = order_created(&format!("order-{i}"), &format!("customer-{}", i % 20));
        dispatch(&event, projection).await.unwrap();
    }
}

fn bench_order_created(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let projection = OrderProjection::new(Arc::new(InMemoryOrderStore::new()));
    let event = order_created("order-1", "customer-1");

    c.bench_function("projections/order_created", |b| {
        b.iter(|| {
            rt.block_on(async {
                dispatch(&event, &projection).await.unwrap();
            });
        });
    });
}

fn bench_order_lifecycle_100(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("projections/order_lifecycle_300_events", |b| {
        b.iter(|| {
            rt.block_on(async {
                let projection = OrderProjection::new(Arc::new(InMemoryOrderStore::new()));
                for i in 0..100 {
                    let id = format!("order-{i}");
                    dispatch(&order_created(&id, "customer-1"), &projection)
                        .await
                        .unwrap();
                    let shipped = envelope(
                        "OrderStatusUpdated",
                        &id,
                        serde_json::json!({"orderId": id, "status": "SHIPPED"}),
                    );
                    dispatch(&shipped, &projection).await.unwrap();
                    let delivered = envelope(
                        "OrderStatusUpdated",
                        &id,
                        serde_json::json!({"orderId": id, "status": "DELIVERED"}),
                    );
                    dispatch(&delivered, &projection).await.unwrap();
                }
            });
        });
    });
}

fn bench_inventory_allocate_return(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let projection = InventoryProjection::new(Arc::new(InMemoryInventoryStore::new()));

    rt.block_on(async {
        let seed = envelope(
            "InventoryUpdated",
            "SKU-001",
            serde_json::json!({"productId": "SKU-001", "quantity": 1_000_000}),
        );
        dispatch(&seed, &projection).await.unwrap();
    });

    let allocated = envelope(
        "InventoryAllocated",
        "SKU-001",
        serde_json::json!({"productId": "SKU-001", "orderId": "o1", "quantity": 2}),
    );
    let returned = envelope(
        "InventoryReturned",
        "SKU-001",
        serde_json::json!({"productId": "SKU-001", "orderId": "o1", "quantity": 2}),
    );

    c.bench_function("projections/inventory_allocate_return", |b| {
        b.iter(|| {
            rt.block_on(async {
                dispatch(&allocated, &projection).await.unwrap();
                dispatch(&returned, &projection).await.unwrap();
            });
        });
    });
}

fn bench_query_orders_by_customer(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = InMemoryOrderStore::new();
    let projection = OrderProjection::new(Arc::new(store.clone()));

    rt.block_on(populate_orders(&projection, 1000));
    let customer = common::CustomerId::new("customer-7");

    c.bench_function("projections/query_by_customer_1000_orders", |b| {
        b.iter(|| {
            rt.block_on(async {
                store.find_by_customer_id(&customer).await.unwrap();
            });
        });
    });
}

criterion_group!(
    benches,
    bench_order_created,
    bench_order_lifecycle_100,
    bench_inventory_allocate_return,
    bench_query_orders_by_customer,
);
criterion_main!(benches);
