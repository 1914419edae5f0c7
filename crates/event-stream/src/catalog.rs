//! Event catalog: type tag → payload schema → typed event.
//!
//! Each aggregate has a closed sum type ([`InventoryEvent`], [`OrderEvent`])
//! and a static registry of `(tag, decode fn)` entries. The payload is only
//! decoded after the tag has selected an entry.

use common::{CustomerId, OrderId, ProductId};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::{DecodeError, EventEnvelope};

/// An envelope together with its decoded payload.
#[derive(Debug, Clone)]
pub struct TypedEvent<P> {
    pub envelope: EventEnvelope,
    pub payload: P,
}

impl<P: DeserializeOwned> TypedEvent<P> {
    fn decode(envelope: &EventEnvelope) -> Result<Self, DecodeError> {
        Ok(Self {
            payload: envelope.decode_payload()?,
            envelope: envelope.clone(),
        })
    }
}

/// A registry entry binding a type tag to its decode function.
pub struct CatalogEntry<E> {
    pub event_type: &'static str,
    pub decode: fn(&EventEnvelope) -> Result<E, DecodeError>,
}

/// A closed family of events belonging to one aggregate type.
pub trait EventFamily: Sized + Send + 'static {
    /// Aggregate type the family describes.
    const AGGREGATE_TYPE: &'static str;

    /// The fixed tag → decoder registry.
    fn catalog() -> &'static [CatalogEntry<Self>];

    /// Type tag of this event.
    fn event_type(&self) -> &'static str;

    /// Looks up the envelope's tag and decodes the payload.
    fn from_envelope(envelope: &EventEnvelope) -> Result<Self, DecodeError> {
        let entry = Self::catalog()
            .iter()
            .find(|entry| entry.event_type == envelope.event_type)
            .ok_or_else(|| DecodeError::UnknownEventType(envelope.event_type.clone()))?;
        (entry.decode)(envelope)
    }

    /// Returns true if the tag belongs to this family.
    fn is_known(event_type: &str) -> bool {
        Self::catalog()
            .iter()
            .any(|entry| entry.event_type == event_type)
    }
}

// -- Inventory --

/// Data for InventoryUpdated: absolute available quantity for a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryUpdatedData {
    #[serde(default)]
    pub product_id: ProductId,
    pub quantity: i64,
}

/// Data for InventoryAllocated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryAllocatedData {
    #[serde(default)]
    pub product_id: ProductId,
    #[serde(default)]
    pub order_id: OrderId,
    pub quantity: i64,
}

/// Data for InventoryReturned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryReturnedData {
    #[serde(default)]
    pub product_id: ProductId,
    #[serde(default)]
    pub order_id: OrderId,
    pub quantity: i64,
}

/// Events published on the inventory stream.
#[derive(Debug, Clone)]
pub enum InventoryEvent {
    InventoryUpdated(TypedEvent<InventoryUpdatedData>),
    InventoryAllocated(TypedEvent<InventoryAllocatedData>),
    InventoryReturned(TypedEvent<InventoryReturnedData>),
}

fn decode_inventory_updated(envelope: &EventEnvelope) -> Result<InventoryEvent, DecodeError> {
    let mut event = TypedEvent::<InventoryUpdatedData>::decode(envelope)?;
    default_key(&mut event.payload.product_id, envelope);
    Ok(InventoryEvent::InventoryUpdated(event))
}

fn decode_inventory_allocated(envelope: &EventEnvelope) -> Result<InventoryEvent, DecodeError> {
    let mut event = TypedEvent::<InventoryAllocatedData>::decode(envelope)?;
    default_key(&mut event.payload.product_id, envelope);
    Ok(InventoryEvent::InventoryAllocated(event))
}

fn decode_inventory_returned(envelope: &EventEnvelope) -> Result<InventoryEvent, DecodeError> {
    let mut event = TypedEvent::<InventoryReturnedData>::decode(envelope)?;
    default_key(&mut event.payload.product_id, envelope);
    Ok(InventoryEvent::InventoryReturned(event))
}

static INVENTORY_CATALOG: &[CatalogEntry<InventoryEvent>] = &[
    CatalogEntry {
        event_type: "InventoryUpdated",
        decode: decode_inventory_updated,
    },
    CatalogEntry {
        event_type: "InventoryAllocated",
        decode: decode_inventory_allocated,
    },
    CatalogEntry {
        event_type: "InventoryReturned",
        decode: decode_inventory_returned,
    },
];

impl EventFamily for InventoryEvent {
    const AGGREGATE_TYPE: &'static str = "Inventory";

    fn catalog() -> &'static [CatalogEntry<Self>] {
        INVENTORY_CATALOG
    }

    fn event_type(&self) -> &'static str {
        match self {
            InventoryEvent::InventoryUpdated(_) => "InventoryUpdated",
            InventoryEvent::InventoryAllocated(_) => "InventoryAllocated",
            InventoryEvent::InventoryReturned(_) => "InventoryReturned",
        }
    }
}

// -- Order --

/// Monetary amount as carried on the wire. The value may be a JSON string or
/// number; it is held as a decimal, never a float.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MoneyData {
    #[serde(default)]
    pub currency: String,
    #[serde(default)]
    pub value: Decimal,
}

/// Postal address as carried on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AddressData {
    pub street: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    pub country: String,
}

/// A line item inside OrderCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemData {
    pub product_id: ProductId,
    pub quantity: i64,
    pub price: MoneyData,
}

/// Data for OrderCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderCreatedData {
    #[serde(default)]
    pub order_id: OrderId,
    pub customer_id: CustomerId,
    #[serde(default)]
    pub items: Vec<OrderItemData>,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub shipping_address: AddressData,
    #[serde(default)]
    pub billing_address: AddressData,
    #[serde(default)]
    pub total_cost: MoneyData,
    #[serde(default)]
    pub issued_at: String,
}

/// Data for OrderStatusUpdated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderStatusUpdatedData {
    #[serde(default)]
    pub order_id: OrderId,
    pub status: String,
}

/// Data for OrderCanceled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderCanceledData {
    #[serde(default)]
    pub order_id: OrderId,
}

/// Events published on the order stream.
#[derive(Debug, Clone)]
pub enum OrderEvent {
    OrderCreated(TypedEvent<OrderCreatedData>),
    OrderStatusUpdated(TypedEvent<OrderStatusUpdatedData>),
    OrderCanceled(TypedEvent<OrderCanceledData>),
}

fn decode_order_created(envelope: &EventEnvelope) -> Result<OrderEvent, DecodeError> {
    let mut event = TypedEvent::<OrderCreatedData>::decode(envelope)?;
    default_key(&mut event.payload.order_id, envelope);
    Ok(OrderEvent::OrderCreated(event))
}

fn decode_order_status_updated(envelope: &EventEnvelope) -> Result<OrderEvent, DecodeError> {
    let mut event = TypedEvent::<OrderStatusUpdatedData>::decode(envelope)?;
    default_key(&mut event.payload.order_id, envelope);
    Ok(OrderEvent::OrderStatusUpdated(event))
}

fn decode_order_canceled(envelope: &EventEnvelope) -> Result<OrderEvent, DecodeError> {
    let mut event = TypedEvent::<OrderCanceledData>::decode(envelope)?;
    default_key(&mut event.payload.order_id, envelope);
    Ok(OrderEvent::OrderCanceled(event))
}

static ORDER_CATALOG: &[CatalogEntry<OrderEvent>] = &[
    CatalogEntry {
        event_type: "OrderCreated",
        decode: decode_order_created,
    },
    CatalogEntry {
        event_type: "OrderStatusUpdated",
        decode: decode_order_status_updated,
    },
    CatalogEntry {
        event_type: "OrderCanceled",
        decode: decode_order_canceled,
    },
];

impl EventFamily for OrderEvent {
    const AGGREGATE_TYPE: &'static str = "Order";

    fn catalog() -> &'static [CatalogEntry<Self>] {
        ORDER_CATALOG
    }

    fn event_type(&self) -> &'static str {
        match self {
            OrderEvent::OrderCreated(_) => "OrderCreated",
            OrderEvent::OrderStatusUpdated(_) => "OrderStatusUpdated",
            OrderEvent::OrderCanceled(_) => "OrderCanceled",
        }
    }
}

/// Some producers leave the natural key out of the payload and only send it
/// as the aggregate id.
fn default_key<K: From<String> + AsRef<str>>(key: &mut K, envelope: &EventEnvelope) {
    if key.as_ref().is_empty() {
        *key = K::from(envelope.aggregate_id.clone());
    }
}
