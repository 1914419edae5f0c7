use serde::{Deserialize, Serialize};

/// Declares a string-backed business identifier.
///
/// Identifiers arrive from the command side as opaque strings, so they are
/// never parsed into UUIDs here; the newtype only keeps product, order and
/// customer identifiers from being mixed up.
macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates an identifier from any string-like value.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Returns the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Returns true if the identifier is the empty string.
            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id!(
    /// Product identifier (SKU), the natural key of an inventory item.
    ProductId
);

string_id!(
    /// Business identifier of an order, distinct from any storage id.
    OrderId
);

string_id!(
    /// Identifier of the customer who placed an order.
    CustomerId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn product_id_string_conversion() {
        let id = ProductId::new("SKU-001");
        assert_eq!(id.as_str(), "SKU-001");

        let id2: ProductId = "SKU-002".into();
        assert_eq!(id2.as_str(), "SKU-002");
        assert_eq!(id2.to_string(), "SKU-002");
    }

    #[test]
    fn ids_serialize_transparently() {
        let id = OrderId::new("o-42");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"o-42\"");

        let back: OrderId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn empty_id_is_detected() {
        assert!(CustomerId::new("").is_empty());
        assert!(!CustomerId::new("c1").is_empty());
    }
}
