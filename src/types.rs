//! Shared types for the trading bot

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single price update from the market feed
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Tick {
    pub quote: f64,
    pub epoch: DateTime<Utc>,
}

/// Contract direction for a binary option
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Call,
    Put,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Call => write!(f, "CALL"),
            Self::Put => write!(f, "PUT"),
        }
    }
}

/// A directional signal produced by the rule bank, tagged with the rule
/// that fired it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Signal {
    pub direction: Direction,
    pub rule: &'static str,
}

/// Order submit request handed to the broker connector
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRequest {
    pub direction: Direction,
    pub stake: f64,
    pub duration_ticks: u32,
    pub symbol: String,
}

/// Acknowledgement returned by the connector after submission
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct OrderAck {
    pub contract_id: Uuid,
    pub submitted_at: DateTime<Utc>,
}

/// A settled (or updated) contract reported by the broker
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ContractResult {
    pub contract_id: Uuid,
    pub profit: f64,
    /// False while the contract is still open; settlements carry true
    pub is_sold: bool,
}

/// Outcome classification of a settled trade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeOutcome {
    Win,
    Loss,
    /// Exactly zero profit: neither resets nor escalates the stake
    Breakeven,
}

impl std::fmt::Display for TradeOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Win => write!(f, "WIN"),
            Self::Loss => write!(f, "LOSS"),
            Self::Breakeven => write!(f, "BREAKEVEN"),
        }
    }
}

/// Why a session reached its terminal state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    TargetReached,
    StopLossReached,
    /// The martingale ladder ran out of headroom below the stake ceiling
    StakeCeiling,
    UserStop,
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TargetReached => write!(f, "target reached"),
            Self::StopLossReached => write!(f, "stop-loss reached"),
            Self::StakeCeiling => write!(f, "stake ceiling"),
            Self::UserStop => write!(f, "user stop"),
        }
    }
}

/// Lifecycle events broadcast for UI, logging and persistence consumers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum BotEvent {
    SignalFired {
        rule: String,
        direction: Direction,
    },
    OrderRequested {
        direction: Direction,
        stake: f64,
    },
    OrderRejected {
        reason: String,
    },
    TradeSettled {
        profit: f64,
        new_stake: f64,
        session_profit: f64,
    },
    SettlementStalled {
        ticks_waited: u32,
    },
    SessionStopped {
        reason: StopReason,
    },
    FeedError {
        message: String,
    },
}
