//! Shared trading state.

mod trading_state;

pub use trading_state::{StateUpdate, TradingSnapshot, TradingStateStore};
