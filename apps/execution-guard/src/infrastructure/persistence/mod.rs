//! Persistence Adapters
//!
//! Order ledger implementations.

pub mod in_memory;

pub use in_memory::InMemoryOrderLedger;
