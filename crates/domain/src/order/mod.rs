//! Order read model and related types.

mod model;
mod status;
mod value_objects;

pub use model::{Order, OrderItem};
pub use status::OrderStatus;
pub use value_objects::{Address, Money};
