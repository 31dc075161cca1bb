//! Order Execution Bounded Context
//!
//! Order records, their broker lifecycle, and deterministic client ids.

pub mod client_order_id;
pub mod order;
pub mod value_objects;

pub use client_order_id::ClientOrderIdFactory;
pub use order::{Order, OrderPatch, OrderUpdate};
pub use value_objects::{OrderSide, OrderStatus, OrderType, TimeInForce};
