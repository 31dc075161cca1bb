//! Portfolio Bounded Context
//!
//! Positions, the account snapshot, and the market clock.

pub mod account;
pub mod position;

pub use account::{AccountSnapshot, MarketClock};
pub use position::{Position, PositionSide};
