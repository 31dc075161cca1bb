//! Stop Enforcement Bounded Context
//!
//! Rules that keep every open position behind a live protective stop:
//! detecting protection in brokerage state, choosing repair levels, and the
//! trailing and partial-exit adjustments measured in R.

pub mod profit_taking;
pub mod protection;
pub mod r_multiple;
pub mod trailing;

pub use profit_taking::{PartialExitDecision, ProfitTakingPolicy};
pub use protection::{
    LevelSource, ProtectionCheck, ProtectionRecord, ProtectionStatus, RepairLevel, StopPolicy,
    find_protection, is_safe_tightening, live_exit_orders, live_protective_orders, round_stop,
};
pub use r_multiple::{r_multiple, risk_per_share};
pub use trailing::{TrailingDecision, TrailingPolicy};
