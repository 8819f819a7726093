//! Session state machine: window ingestion, rule scanning, single-flight
//! gating, and profit accounting
//!
//! `TradingSession` is synchronous and broker-agnostic. Each tick is one
//! atomic step that returns at most one command for the execution layer;
//! settlements are applied through `on_settlement`. All mutable session
//! state lives here under a single owner; nothing is shared.

use std::collections::VecDeque;

use tracing::{debug, info, warn};

use crate::trading_core::indicators;
use crate::trading_core::signals::{self, Rule};
use crate::trading_core::stake::{CeilingPolicy, StakeAdjust, StakeController};
use crate::types::{ContractResult, Signal, StopReason, Tick, TradeOutcome};

/// Immutable per-session policy, supplied once at start.
#[derive(Debug, Clone)]
pub struct SessionPolicy {
    pub base_stake: f64,
    pub max_stake: f64,
    pub target_profit: f64,
    pub stop_loss: f64,
    pub martingale_multiplier: f64,
    /// Rules are not evaluated until the window holds this many samples.
    pub min_window: usize,
    /// Oldest quotes are evicted past this length.
    pub max_window: usize,
    pub rsi_period: usize,
    pub sma_period: usize,
    pub ceiling_policy: CeilingPolicy,
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self {
            base_stake: 0.35,
            max_stake: 10.0,
            target_profit: 0.5,
            stop_loss: 2.6,
            martingale_multiplier: 1.4,
            min_window: 20,
            max_window: 50,
            rsi_period: 14,
            sma_period: 20,
            ceiling_policy: CeilingPolicy::StopSession,
        }
    }
}

/// Lifecycle of the decision loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    /// Created, not yet started.
    Idle,
    /// Scanning incoming ticks for a signal.
    Scanning,
    /// A rule fired; the entry delay is pending.
    Signaled,
    /// Order submitted, awaiting the broker ack.
    Executing,
    /// Contract open, awaiting settlement.
    Settling,
    /// Terminal: target, stop-loss, stake ceiling, or user stop.
    Stopped,
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "IDLE"),
            Self::Scanning => write!(f, "SCANNING"),
            Self::Signaled => write!(f, "SIGNALED"),
            Self::Executing => write!(f, "EXECUTING"),
            Self::Settling => write!(f, "SETTLING"),
            Self::Stopped => write!(f, "STOPPED"),
        }
    }
}

/// Mutable trade-side state of one session.
#[derive(Debug, Clone, Default)]
pub struct TradeState {
    /// Mutual-exclusion latch: true from signal until settlement (or an
    /// explicit release on rejection/stall).
    pub in_flight: bool,
    pub last_outcome: Option<TradeOutcome>,
    pub session_profit: f64,
    pub trade_count: u32,
    pub wins: u32,
    pub losses: u32,
    pub breakevens: u32,
}

/// Command for the execution layer produced by one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TickCommand {
    /// A rule fired: schedule the trade at the current stake.
    Fire { signal: Signal, stake: f64 },
    /// A termination condition holds: stop the session.
    Stop { reason: StopReason },
}

/// What a settlement did to the session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Settled {
    pub outcome: TradeOutcome,
    pub profit: f64,
    pub new_stake: f64,
    pub session_profit: f64,
    /// Termination triggered by this settlement, if any.
    pub stop: Option<StopReason>,
}

/// One trading session: rolling window, rule bank, stake ladder, accounting.
pub struct TradingSession {
    policy: SessionPolicy,
    bank: Vec<Rule>,
    window: VecDeque<f64>,
    stake: StakeController,
    state: TradeState,
    status: SessionStatus,
    ticks_seen: u64,
}

impl TradingSession {
    pub fn new(policy: SessionPolicy) -> Self {
        let stake = StakeController::new(
            policy.base_stake,
            policy.max_stake,
            policy.martingale_multiplier,
            policy.ceiling_policy,
        );
        let window = VecDeque::with_capacity(policy.max_window);
        Self {
            policy,
            bank: signals::default_bank(),
            window,
            stake,
            state: TradeState::default(),
            status: SessionStatus::Idle,
            ticks_seen: 0,
        }
    }

    /// Begin scanning. Sessions are single-use: once stopped they stay
    /// stopped.
    pub fn start(&mut self) {
        if self.status == SessionStatus::Idle {
            self.status = SessionStatus::Scanning;
            info!(
                "session started: base {:.2} | target {:.2} | stop-loss {:.2} | x{} up to {:.2}",
                self.policy.base_stake,
                self.policy.target_profit,
                self.policy.stop_loss,
                self.policy.martingale_multiplier,
                self.policy.max_stake
            );
        }
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn state(&self) -> &TradeState {
        &self.state
    }

    /// Stake the next order will carry.
    pub fn stake(&self) -> f64 {
        self.stake.stake()
    }

    pub fn window_len(&self) -> usize {
        self.window.len()
    }

    /// One atomic decision step. The quote is always ingested, even while
    /// a trade is in flight, but a command is produced only when a rule
    /// fires or a termination condition holds.
    pub fn on_tick(&mut self, tick: &Tick) -> Option<TickCommand> {
        if self.status == SessionStatus::Stopped {
            return None;
        }
        self.ticks_seen += 1;
        self.push_quote(tick.quote);

        if self.status == SessionStatus::Idle {
            return None;
        }

        // Termination gates every evaluation.
        if let Some(reason) = self.termination() {
            self.stop(reason);
            return Some(TickCommand::Stop { reason });
        }

        if self.state.in_flight || self.window.len() < self.policy.min_window {
            return None;
        }

        let window = self.window.make_contiguous();
        let rsi = indicators::rsi(window, self.policy.rsi_period);
        let sma = indicators::sma(window, self.policy.sma_period);
        debug!(
            "tick {}: quote {:.4} | rsi {:.1} | sma {:.4}",
            self.ticks_seen, tick.quote, rsi, sma
        );

        if let Some(signal) = signals::scan(&self.bank, window, rsi, sma) {
            self.state.in_flight = true;
            self.status = SessionStatus::Signaled;
            info!(
                "SIGNAL: {} via {} @ stake {:.2} (rsi {:.1}, sma {:.4})",
                signal.direction,
                signal.rule,
                self.stake.stake(),
                rsi,
                sma
            );
            return Some(TickCommand::Fire {
                signal,
                stake: self.stake.stake(),
            });
        }
        None
    }

    /// The execution layer submitted the order.
    pub fn note_submitted(&mut self) {
        if self.status == SessionStatus::Signaled {
            self.status = SessionStatus::Executing;
            debug!("status -> {}", self.status);
        }
    }

    /// The broker acked: the contract is open.
    pub fn note_contract_open(&mut self) {
        if self.status == SessionStatus::Executing {
            self.status = SessionStatus::Settling;
            debug!("status -> {}", self.status);
        }
    }

    /// Release the single-flight latch without accounting (order rejected,
    /// or a stalled settlement force-cleared by policy). The attempt never
    /// touches the session profit.
    pub fn release_in_flight(&mut self) {
        if self.state.in_flight {
            self.state.in_flight = false;
            if self.status != SessionStatus::Stopped {
                self.status = SessionStatus::Scanning;
            }
        }
    }

    /// Apply a settled contract: outcome classification, accounting, stake
    /// adjustment, and the post-settlement termination check. Exactly one
    /// settlement is expected per submitted trade; anything else is ignored
    /// with a warning.
    pub fn on_settlement(&mut self, result: &ContractResult) -> Option<Settled> {
        if !self.state.in_flight {
            warn!(
                "settlement for contract {} with no trade in flight, ignoring",
                result.contract_id
            );
            return None;
        }

        let profit = result.profit;
        let outcome = if profit > 0.0 {
            TradeOutcome::Win
        } else if profit < 0.0 {
            TradeOutcome::Loss
        } else {
            TradeOutcome::Breakeven
        };

        self.state.trade_count += 1;
        self.state.session_profit += profit;
        self.state.last_outcome = Some(outcome);
        self.state.in_flight = false;

        let mut stop = None;
        match outcome {
            TradeOutcome::Win => {
                self.state.wins += 1;
                let new_stake = self.stake.on_win();
                info!(
                    "WIN: {:+.2} | total {:+.2} | stake reset to {:.2}",
                    profit, self.state.session_profit, new_stake
                );
            }
            TradeOutcome::Breakeven => {
                self.state.breakevens += 1;
                info!("BREAKEVEN: stake unchanged at {:.2}", self.stake.stake());
            }
            TradeOutcome::Loss => {
                self.state.losses += 1;
                match self.stake.on_loss() {
                    StakeAdjust::Raised(new_stake) => info!(
                        "LOSS: {:+.2} | total {:+.2} | martingale x{} -> stake {:.2}",
                        profit,
                        self.state.session_profit,
                        self.policy.martingale_multiplier,
                        new_stake
                    ),
                    StakeAdjust::Clamped(new_stake) => warn!(
                        "LOSS: {:+.2} | stake clamped at ceiling {:.2}",
                        profit, new_stake
                    ),
                    StakeAdjust::CeilingExceeded => {
                        warn!(
                            "LOSS: {:+.2} | next martingale step would pierce the {:.2} ceiling",
                            profit, self.policy.max_stake
                        );
                        stop = Some(StopReason::StakeCeiling);
                    }
                }
            }
        }

        if stop.is_none() {
            stop = self.termination();
        }
        match stop {
            Some(reason) => self.stop(reason),
            None => self.status = SessionStatus::Scanning,
        }

        Some(Settled {
            outcome,
            profit,
            new_stake: self.stake.stake(),
            session_profit: self.state.session_profit,
            stop,
        })
    }

    /// Force the terminal state. Idempotent.
    pub fn stop(&mut self, reason: StopReason) {
        if self.status != SessionStatus::Stopped {
            self.status = SessionStatus::Stopped;
            info!("STOPPED: {}", reason);
        }
    }

    /// End-of-session statistics for shutdown reporting.
    pub fn summary(&self) -> SessionSummary {
        let trades = self.state.trade_count;
        let win_rate = if trades > 0 {
            self.state.wins as f64 / trades as f64 * 100.0
        } else {
            0.0
        };
        SessionSummary {
            trades,
            wins: self.state.wins,
            losses: self.state.losses,
            breakevens: self.state.breakevens,
            win_rate,
            session_profit: self.state.session_profit,
            final_stake: self.stake.stake(),
        }
    }

    fn push_quote(&mut self, quote: f64) {
        if self.window.len() == self.policy.max_window {
            self.window.pop_front();
        }
        self.window.push_back(quote);
    }

    fn termination(&self) -> Option<StopReason> {
        if self.state.session_profit >= self.policy.target_profit {
            return Some(StopReason::TargetReached);
        }
        if self.state.session_profit <= -self.policy.stop_loss {
            return Some(StopReason::StopLossReached);
        }
        None
    }
}

/// Summary of a finished (or running) session
#[derive(Debug, Clone)]
pub struct SessionSummary {
    pub trades: u32,
    pub wins: u32,
    pub losses: u32,
    pub breakevens: u32,
    pub win_rate: f64,
    pub session_profit: f64,
    pub final_stake: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Direction;
    use chrono::Utc;
    use uuid::Uuid;

    fn tick(quote: f64) -> Tick {
        Tick {
            quote,
            epoch: Utc::now(),
        }
    }

    fn settled(profit: f64) -> ContractResult {
        ContractResult {
            contract_id: Uuid::new_v4(),
            profit,
            is_sold: true,
        }
    }

    /// Feed descending quotes until a rule fires. A falling window drives
    /// RSI to the floor, so the oversold rule fires as soon as the window
    /// is warm.
    fn fire_signal(session: &mut TradingSession, start: f64) -> TickCommand {
        let mut quote = start;
        for _ in 0..60 {
            quote -= 0.1;
            if let Some(cmd) = session.on_tick(&tick(quote)) {
                return cmd;
            }
        }
        panic!("no signal fired on a falling window");
    }

    #[test]
    fn no_signal_below_min_window() {
        let mut session = TradingSession::new(SessionPolicy::default());
        session.start();
        for i in 0..19 {
            let cmd = session.on_tick(&tick(100.0 - i as f64 * 0.1));
            assert!(cmd.is_none(), "fired with only {} samples", i + 1);
        }
        assert_eq!(session.window_len(), 19);
        // The twentieth sample warms the window; the falling tape fires.
        let cmd = session.on_tick(&tick(98.0));
        assert!(matches!(cmd, Some(TickCommand::Fire { .. })));
    }

    #[test]
    fn falling_tape_fires_oversold_call_and_latches() {
        let mut session = TradingSession::new(SessionPolicy::default());
        session.start();
        match fire_signal(&mut session, 100.0) {
            TickCommand::Fire { signal, stake } => {
                assert_eq!(signal.rule, "RSI_OVERSOLD");
                assert_eq!(signal.direction, Direction::Call);
                assert_eq!(stake, 0.35);
            }
            other => panic!("expected a signal, got {other:?}"),
        }
        assert_eq!(session.status(), SessionStatus::Signaled);
        assert!(session.state().in_flight);

        // In flight: ingestion continues but no re-entry
        for i in 0..10 {
            assert!(session.on_tick(&tick(90.0 - i as f64 * 0.1)).is_none());
        }
    }

    #[test]
    fn lifecycle_notes_advance_the_status() {
        let mut session = TradingSession::new(SessionPolicy::default());
        session.start();
        fire_signal(&mut session, 100.0);
        session.note_submitted();
        assert_eq!(session.status(), SessionStatus::Executing);
        session.note_contract_open();
        assert_eq!(session.status(), SessionStatus::Settling);
    }

    #[test]
    fn winning_settlement_reaching_target_stops_the_session() {
        let mut session = TradingSession::new(SessionPolicy::default());
        session.start();
        fire_signal(&mut session, 100.0);

        let result = session.on_settlement(&settled(0.52)).expect("in flight");
        assert_eq!(result.outcome, TradeOutcome::Win);
        assert_eq!(result.new_stake, 0.35);
        assert_eq!(result.session_profit, 0.52);
        assert_eq!(result.stop, Some(StopReason::TargetReached));
        assert_eq!(session.status(), SessionStatus::Stopped);
    }

    #[test]
    fn losses_reaching_stop_loss_stop_the_session() {
        let policy = SessionPolicy {
            target_profit: 100.0,
            ..Default::default()
        };
        let mut session = TradingSession::new(policy);
        session.start();

        fire_signal(&mut session, 100.0);
        let first = session.on_settlement(&settled(-1.3)).expect("in flight");
        assert_eq!(first.outcome, TradeOutcome::Loss);
        assert_eq!(first.new_stake, 0.49);
        assert_eq!(first.stop, None);
        assert_eq!(session.status(), SessionStatus::Scanning);

        fire_signal(&mut session, 90.0);
        let second = session.on_settlement(&settled(-1.3)).expect("in flight");
        assert_eq!(second.session_profit, -2.6);
        assert_eq!(second.stop, Some(StopReason::StopLossReached));
        assert_eq!(session.status(), SessionStatus::Stopped);
    }

    #[test]
    fn stake_ceiling_is_fatal_by_default() {
        let policy = SessionPolicy {
            max_stake: 1.0,
            target_profit: 100.0,
            stop_loss: 100.0,
            ..Default::default()
        };
        let mut session = TradingSession::new(policy);
        session.start();

        // Ladder: 0.49, 0.69, 0.96; the fourth loss has nowhere to go.
        let mut start = 100.0;
        for loss in [-0.35, -0.49, -0.69] {
            fire_signal(&mut session, start);
            let result = session.on_settlement(&settled(loss)).expect("in flight");
            assert_eq!(result.stop, None);
            start -= 10.0;
        }
        fire_signal(&mut session, start);
        let result = session.on_settlement(&settled(-0.96)).expect("in flight");
        assert_eq!(result.stop, Some(StopReason::StakeCeiling));
        assert_eq!(session.status(), SessionStatus::Stopped);
        assert_eq!(result.new_stake, 0.96);
    }

    #[test]
    fn breakeven_leaves_the_ladder_alone() {
        let policy = SessionPolicy {
            target_profit: 100.0,
            ..Default::default()
        };
        let mut session = TradingSession::new(policy);
        session.start();

        fire_signal(&mut session, 100.0);
        let result = session.on_settlement(&settled(0.0)).expect("in flight");
        assert_eq!(result.outcome, TradeOutcome::Breakeven);
        assert_eq!(result.new_stake, 0.35);
        assert_eq!(result.stop, None);

        // A later loss starts the ladder from the base, not from a streak
        fire_signal(&mut session, 90.0);
        let result = session.on_settlement(&settled(-0.35)).expect("in flight");
        assert_eq!(result.new_stake, 0.49);
    }

    #[test]
    fn rejection_releases_the_latch_and_scanning_resumes() {
        let mut session = TradingSession::new(SessionPolicy::default());
        session.start();
        fire_signal(&mut session, 100.0);
        assert!(session.state().in_flight);

        session.release_in_flight();
        assert!(!session.state().in_flight);
        assert_eq!(session.status(), SessionStatus::Scanning);
        assert_eq!(session.state().session_profit, 0.0);

        // The next falling tick fires again
        assert!(matches!(
            session.on_tick(&tick(80.0)),
            Some(TickCommand::Fire { .. })
        ));
    }

    #[test]
    fn settlement_without_a_trade_in_flight_is_ignored() {
        let mut session = TradingSession::new(SessionPolicy::default());
        session.start();
        assert!(session.on_settlement(&settled(1.0)).is_none());
        assert_eq!(session.state().trade_count, 0);
    }

    #[test]
    fn stopped_session_ignores_ticks() {
        let mut session = TradingSession::new(SessionPolicy::default());
        session.start();
        session.stop(StopReason::UserStop);
        for i in 0..30 {
            assert!(session.on_tick(&tick(100.0 - i as f64)).is_none());
        }
        assert_eq!(session.status(), SessionStatus::Stopped);
    }

    #[test]
    fn window_is_bounded_by_policy() {
        let mut session = TradingSession::new(SessionPolicy::default());
        session.start();
        // Flat tape keeps RSI at 100 only after warmup; use alternating
        // quotes inside every band so nothing fires while we overfill.
        for i in 0..80 {
            let quote = if i % 2 == 0 { 100.0 } else { 100.01 };
            session.on_tick(&tick(quote));
            if session.state().in_flight {
                session.release_in_flight();
            }
        }
        assert_eq!(session.window_len(), 50);
    }
}
