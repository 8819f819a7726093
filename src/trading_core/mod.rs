//! Trading core - the decision-and-stake state machine
//!
//! This module contains the strategy components:
//! - SMA/RSI indicator engine over the rolling tick window
//! - Ordered ten-rule signal bank (first match wins)
//! - Session state machine with single-flight gating and profit targets
//! - Martingale stake controller

pub mod indicators;
pub mod session;
pub mod signals;
pub mod stake;

// Re-export commonly used types
pub use session::{
    SessionPolicy, SessionStatus, SessionSummary, Settled, TickCommand, TradeState, TradingSession,
};
pub use signals::{default_bank, scan, Rule};
pub use stake::{CeilingPolicy, StakeAdjust, StakeController};
