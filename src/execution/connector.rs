//! Broker connector seam
//!
//! The engine talks to the brokerage through `OrderConnector`; the wire
//! protocol is the implementation's business and the core only ever sees
//! the request/ack/result types. `SimulatedConnector` is the built-in paper
//! implementation: it tracks the live tick path and settles each contract
//! off the entry/exit spot comparison, paying `stake * payout_ratio` on a
//! win and the full stake on a loss.

use async_trait::async_trait;
use chrono::Utc;
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::trading_core::stake::round2;
use crate::types::{ContractResult, Direction, OrderAck, OrderRequest, Tick};

/// Errors surfaced by a broker connector.
#[derive(Debug, Error)]
pub enum ConnectorError {
    /// The broker refused the order (insufficient balance, closed market,
    /// duplicate contract...). Non-fatal: scanning may resume.
    #[error("order rejected: {0}")]
    Rejected(String),
    /// Transport-level failure talking to the broker.
    #[error("connector transport error: {0}")]
    Transport(String),
}

/// Async seam to the brokerage.
#[async_trait]
pub trait OrderConnector: Send {
    /// Submit a binary contract order.
    async fn submit_order(&mut self, request: &OrderRequest) -> Result<OrderAck, ConnectorError>;

    /// Feed a market tick. Simulated connectors settle contracts from the
    /// tick path; live connectors typically ignore this and deliver
    /// settlements from their own stream.
    fn on_tick(&mut self, tick: &Tick) -> Option<ContractResult>;
}

/// A contract the simulated broker is carrying.
struct SimContract {
    id: Uuid,
    direction: Direction,
    stake: f64,
    /// Fixed by the first tick after submission.
    entry_spot: Option<f64>,
    ticks_remaining: u32,
}

/// Paper broker: a contract wins when the exit spot beats the entry spot in
/// the predicted direction after `duration_ticks` ticks.
pub struct SimulatedConnector {
    payout_ratio: f64,
    open: Option<SimContract>,
}

impl SimulatedConnector {
    pub fn new(payout_ratio: f64) -> Self {
        Self {
            payout_ratio,
            open: None,
        }
    }
}

#[async_trait]
impl OrderConnector for SimulatedConnector {
    async fn submit_order(&mut self, request: &OrderRequest) -> Result<OrderAck, ConnectorError> {
        if self.open.is_some() {
            return Err(ConnectorError::Rejected("contract already open".into()));
        }
        if request.stake <= 0.0 {
            return Err(ConnectorError::Rejected("non-positive stake".into()));
        }
        if request.duration_ticks == 0 {
            return Err(ConnectorError::Rejected("zero-length contract".into()));
        }

        let id = Uuid::new_v4();
        self.open = Some(SimContract {
            id,
            direction: request.direction,
            stake: request.stake,
            entry_spot: None,
            ticks_remaining: request.duration_ticks,
        });
        debug!(
            "sim contract {} opened: {} {:.2} on {} for {} ticks",
            id, request.direction, request.stake, request.symbol, request.duration_ticks
        );
        Ok(OrderAck {
            contract_id: id,
            submitted_at: Utc::now(),
        })
    }

    fn on_tick(&mut self, tick: &Tick) -> Option<ContractResult> {
        let due = match self.open.as_mut() {
            Some(contract) => {
                if contract.entry_spot.is_none() {
                    contract.entry_spot = Some(tick.quote);
                    false
                } else {
                    contract.ticks_remaining = contract.ticks_remaining.saturating_sub(1);
                    contract.ticks_remaining == 0
                }
            }
            None => false,
        };
        if !due {
            return None;
        }

        let contract = self.open.take()?;
        let entry = contract.entry_spot?;
        let exit = tick.quote;
        let won = match contract.direction {
            Direction::Call => exit > entry,
            Direction::Put => exit < entry,
        };
        let profit = if won {
            round2(contract.stake * self.payout_ratio)
        } else {
            -contract.stake
        };
        info!(
            "sim contract {} settled: entry {:.4} -> exit {:.4} | {:+.2}",
            contract.id, entry, exit, profit
        );
        Some(ContractResult {
            contract_id: contract.id,
            profit,
            is_sold: true,
        })
    }
}
