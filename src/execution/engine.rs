//! Trade lifecycle coordination
//!
//! Sequences signal -> entry delay -> order submit -> settlement, owns the
//! broker connector, and broadcasts lifecycle events for UI and logging
//! consumers. The entry delay runs as an abortable deferred task so tick
//! ingestion never blocks; a session stop cancels it.

use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::execution::connector::OrderConnector;
use crate::types::{BotEvent, ContractResult, Direction, OrderRequest, Signal, Tick};

/// Configuration for the execution engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Contract symbol (e.g. "R_100" for the Volatility 100 index).
    pub symbol: String,
    /// Contract length in ticks.
    pub duration_ticks: u32,
    /// Buffer between signal and submission. A tunable, not a correctness
    /// requirement.
    pub entry_delay: Duration,
    /// Ticks to wait for a settlement before flagging a stall.
    pub settlement_timeout_ticks: u32,
    /// Whether a stall releases the single-flight latch.
    pub force_clear_on_stall: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            symbol: "R_100".to_string(),
            duration_ticks: 5,
            entry_delay: Duration::from_millis(500),
            settlement_timeout_ticks: 60,
            force_clear_on_stall: false,
        }
    }
}

/// An entry whose delay timer is running.
struct PendingEntry {
    signal: Signal,
    stake: f64,
    timer: JoinHandle<()>,
}

/// A submitted contract awaiting settlement.
struct OpenTrade {
    signal: Signal,
    ticks_waited: u32,
    stall_flagged: bool,
}

/// Outcome of submitting a due entry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SubmitOutcome {
    /// Order acked; contract open and awaiting settlement.
    Submitted { direction: Direction, stake: f64 },
    /// Broker rejected the order; the caller should release the latch.
    Rejected,
    /// No entry was pending (stale timer after a cancel).
    NotPending,
}

/// Outcome of feeding one tick through the engine.
#[derive(Debug, Clone, Copy)]
pub enum TickEvent {
    /// Nothing due.
    None,
    /// A contract settled.
    Settled(ContractResult),
    /// The stall watchdog force-released the in-flight latch.
    StallReleased,
}

/// Coordinates the life of one trade at a time.
pub struct ExecutionEngine {
    config: EngineConfig,
    connector: Box<dyn OrderConnector>,
    event_tx: broadcast::Sender<BotEvent>,
    entry_due_tx: mpsc::Sender<()>,
    entry_due_rx: Option<mpsc::Receiver<()>>,
    pending: Option<PendingEntry>,
    open: Option<OpenTrade>,
}

impl ExecutionEngine {
    pub fn new(config: EngineConfig, connector: Box<dyn OrderConnector>) -> Self {
        let (event_tx, _) = broadcast::channel(256);
        let (entry_due_tx, entry_due_rx) = mpsc::channel(4);
        Self {
            config,
            connector,
            event_tx,
            entry_due_tx,
            entry_due_rx: Some(entry_due_rx),
            pending: None,
            open: None,
        }
    }

    /// Subscribe to lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<BotEvent> {
        self.event_tx.subscribe()
    }

    /// Take the entry-due receiver (can only be called once). The run loop
    /// listens on it and calls `submit_pending` when a timer fires.
    pub fn take_entry_rx(&mut self) -> Option<mpsc::Receiver<()>> {
        self.entry_due_rx.take()
    }

    /// Emit an event on behalf of the run loop (session stops, feed errors).
    pub fn emit(&self, event: BotEvent) {
        let _ = self.event_tx.send(event);
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn has_open_trade(&self) -> bool {
        self.open.is_some()
    }

    /// Schedule a signalled trade: start the entry-delay timer. A second
    /// schedule while a trade is pending or in flight is a warned no-op;
    /// this is the single-flight guarantee.
    pub fn schedule_entry(&mut self, signal: Signal, stake: f64) {
        if self.pending.is_some() || self.open.is_some() {
            warn!(
                "signal {} ignored: a trade is already pending or in flight",
                signal.rule
            );
            return;
        }

        let _ = self.event_tx.send(BotEvent::SignalFired {
            rule: signal.rule.to_string(),
            direction: signal.direction,
        });
        info!(
            "PREDICTION: {} via {}, entering in {:?}",
            signal.direction, signal.rule, self.config.entry_delay
        );

        let delay = self.config.entry_delay;
        let due_tx = self.entry_due_tx.clone();
        let timer = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = due_tx.send(()).await;
        });
        self.pending = Some(PendingEntry {
            signal,
            stake,
            timer,
        });
    }

    /// Cancel a pending deferred entry (session stop). Safe when none.
    pub fn cancel_pending(&mut self) {
        if let Some(entry) = self.pending.take() {
            entry.timer.abort();
            info!("pending {} entry cancelled", entry.signal.rule);
        }
    }

    /// The entry delay elapsed: submit the order through the connector.
    pub async fn submit_pending(&mut self) -> SubmitOutcome {
        let Some(entry) = self.pending.take() else {
            return SubmitOutcome::NotPending;
        };

        let request = OrderRequest {
            direction: entry.signal.direction,
            stake: entry.stake,
            duration_ticks: self.config.duration_ticks,
            symbol: self.config.symbol.clone(),
        };
        match self.connector.submit_order(&request).await {
            Ok(ack) => {
                info!(
                    "EXECUTE: {} {:.2} on {} ({} ticks) | contract {}",
                    request.direction,
                    request.stake,
                    request.symbol,
                    request.duration_ticks,
                    ack.contract_id
                );
                let _ = self.event_tx.send(BotEvent::OrderRequested {
                    direction: request.direction,
                    stake: request.stake,
                });
                self.open = Some(OpenTrade {
                    signal: entry.signal,
                    ticks_waited: 0,
                    stall_flagged: false,
                });
                SubmitOutcome::Submitted {
                    direction: request.direction,
                    stake: request.stake,
                }
            }
            Err(err) => {
                warn!("order rejected: {err}");
                let _ = self.event_tx.send(BotEvent::OrderRejected {
                    reason: err.to_string(),
                });
                SubmitOutcome::Rejected
            }
        }
    }

    /// Feed a tick to the connector (simulated settlement path) and run the
    /// settlement-stall watchdog.
    pub fn on_tick(&mut self, tick: &Tick) -> TickEvent {
        if let Some(result) = self.connector.on_tick(tick) {
            if !result.is_sold {
                debug!("contract {} update before close, ignoring", result.contract_id);
            } else if self.open.take().is_some() {
                return TickEvent::Settled(result);
            } else {
                warn!("settlement for unknown contract {}", result.contract_id);
            }
        }

        if let Some(open) = self.open.as_mut() {
            open.ticks_waited += 1;
            if !open.stall_flagged && open.ticks_waited >= self.config.settlement_timeout_ticks {
                open.stall_flagged = true;
                warn!(
                    "SETTLEMENT STALL: no result for {} after {} ticks",
                    open.signal.rule, open.ticks_waited
                );
                let _ = self.event_tx.send(BotEvent::SettlementStalled {
                    ticks_waited: open.ticks_waited,
                });
                if self.config.force_clear_on_stall {
                    self.open = None;
                    return TickEvent::StallReleased;
                }
            }
        }
        TickEvent::None
    }
}
