use anyhow::{bail, Result};
use clap::Parser;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{error, info};

use ticksniper::execution::{
    EngineConfig, ExecutionEngine, SimulatedConnector, SubmitOutcome, TickEvent,
};
use ticksniper::streams::{spawn_simulated_feed, FeedEvent, SimFeedConfig};
use ticksniper::trading_core::{CeilingPolicy, SessionPolicy, TickCommand, TradingSession};
use ticksniper::types::{BotEvent, Direction, StopReason};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Symbol to trade
    #[arg(long, default_value = "R_100")]
    symbol: String,

    /// Base stake in account currency
    #[arg(long, default_value = "0.35")]
    base_stake: f64,

    /// Stake ceiling
    #[arg(long, default_value = "10.0")]
    max_stake: f64,

    /// Session profit target
    #[arg(long, default_value = "0.5")]
    target_profit: f64,

    /// Session stop-loss
    #[arg(long, default_value = "2.6")]
    stop_loss: f64,

    /// Martingale multiplier applied after a loss
    #[arg(long, default_value = "1.4")]
    multiplier: f64,

    /// Clamp at the stake ceiling instead of stopping the session
    #[arg(long)]
    clamp_at_ceiling: bool,

    /// Contract duration in ticks
    #[arg(long, default_value = "5")]
    duration_ticks: u32,

    /// Delay in milliseconds between signal and order submission
    #[arg(long, default_value = "500")]
    entry_delay_ms: u64,

    /// Simulated feed cadence in milliseconds
    #[arg(long, default_value = "1000")]
    tick_interval_ms: u64,

    /// End the feed after this many ticks (0 = run until target/stop-loss)
    #[arg(long, default_value = "0")]
    max_ticks: u64,

    /// RNG seed for the simulated feed (random when omitted)
    #[arg(long, env = "TICKSNIPER_SEED")]
    seed: Option<u64>,

    /// Payout ratio of the simulated broker
    #[arg(long, default_value = "0.95")]
    payout: f64,

    /// Trade journal CSV path
    #[arg(long, default_value = "trades.csv")]
    journal: PathBuf,

    /// Mirror bot events to stdout as JSON lines
    #[arg(long)]
    json_events: bool,
}

/// Append-only CSV journal of trade lifecycle events
struct TradeJournal {
    file: std::fs::File,
}

impl TradeJournal {
    fn new(path: &Path) -> Result<Self> {
        // Create file if it doesn't exist
        let _ = OpenOptions::new().create(true).append(true).open(path)?;

        // Write the header on first use
        let metadata = std::fs::metadata(path)?;
        if metadata.len() == 0 {
            let mut file = OpenOptions::new().write(true).open(path)?;
            writeln!(
                file,
                "timestamp,event,rule,direction,stake,profit,session_profit,reason"
            )?;
        }

        let file = OpenOptions::new().append(true).open(path)?;
        Ok(Self { file })
    }

    fn stamp() -> String {
        chrono::Utc::now().format("%Y-%m-%d %H:%M:%S").to_string()
    }

    fn log_signal(&mut self, rule: &str, direction: Direction) {
        let _ = writeln!(self.file, "{},SIGNAL,{},{},,,,", Self::stamp(), rule, direction);
        let _ = self.file.flush();
    }

    fn log_order(&mut self, rule: &str, direction: Direction, stake: f64) {
        let _ = writeln!(
            self.file,
            "{},ORDER,{},{},{:.2},,,",
            Self::stamp(),
            rule,
            direction,
            stake
        );
        let _ = self.file.flush();
    }

    fn log_settled(&mut self, rule: &str, profit: f64, session_profit: f64) {
        let _ = writeln!(
            self.file,
            "{},SETTLED,{},,,{:.2},{:.2},",
            Self::stamp(),
            rule,
            profit,
            session_profit
        );
        let _ = self.file.flush();
    }

    fn log_stop(&mut self, reason: StopReason) {
        let _ = writeln!(self.file, "{},STOP,,,,,,{}", Self::stamp(), reason);
        let _ = self.file.flush();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("ticksniper=info".parse()?),
        )
        .init();

    let args = Args::parse();

    info!("Starting ticksniper");
    info!(
        "Symbol: {} | base stake {:.2} | target {:.2} | stop-loss {:.2} | martingale x{}",
        args.symbol, args.base_stake, args.target_profit, args.stop_loss, args.multiplier
    );

    let policy = SessionPolicy {
        base_stake: args.base_stake,
        max_stake: args.max_stake,
        target_profit: args.target_profit,
        stop_loss: args.stop_loss,
        martingale_multiplier: args.multiplier,
        ceiling_policy: if args.clamp_at_ceiling {
            CeilingPolicy::ClampAndContinue
        } else {
            CeilingPolicy::StopSession
        },
        ..Default::default()
    };
    let engine_config = EngineConfig {
        symbol: args.symbol.clone(),
        duration_ticks: args.duration_ticks,
        entry_delay: Duration::from_millis(args.entry_delay_ms),
        ..Default::default()
    };

    let mut session = TradingSession::new(policy);
    let mut engine = ExecutionEngine::new(
        engine_config,
        Box::new(SimulatedConnector::new(args.payout)),
    );
    let Some(mut entry_rx) = engine.take_entry_rx() else {
        bail!("entry channel already taken");
    };
    info!(
        "Contracts: {} ticks | entry delay {:?} | payout x{:.2} (paper)",
        engine.config().duration_ticks,
        engine.config().entry_delay,
        args.payout
    );

    // Mirror events to stdout as JSON lines for downstream consumers
    if args.json_events {
        let mut events = engine.subscribe();
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => {
                        if let Ok(line) = serde_json::to_string(&event) {
                            println!("{line}");
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
    }

    let (mut feed_rx, feed_handle) = spawn_simulated_feed(SimFeedConfig {
        interval: Duration::from_millis(args.tick_interval_ms),
        max_ticks: (args.max_ticks > 0).then_some(args.max_ticks),
        seed: args.seed,
        ..Default::default()
    });

    let mut journal = TradeJournal::new(&args.journal)?;
    // Rule behind the trade currently pending or in flight, for the journal
    let mut active_rule: Option<&'static str> = None;

    session.start();

    loop {
        tokio::select! {
            maybe_event = feed_rx.recv() => match maybe_event {
                Some(FeedEvent::Tick(tick)) => {
                    // Settlements and the stall watchdog ride the tick first,
                    // so a trade closed on this tick frees the latch before
                    // the session scans again.
                    match engine.on_tick(&tick) {
                        TickEvent::Settled(result) => {
                            if let Some(settled) = session.on_settlement(&result) {
                                engine.emit(BotEvent::TradeSettled {
                                    profit: settled.profit,
                                    new_stake: settled.new_stake,
                                    session_profit: settled.session_profit,
                                });
                                journal.log_settled(
                                    active_rule.take().unwrap_or(""),
                                    settled.profit,
                                    settled.session_profit,
                                );
                                if let Some(reason) = settled.stop {
                                    engine.cancel_pending();
                                    engine.emit(BotEvent::SessionStopped { reason });
                                    journal.log_stop(reason);
                                    break;
                                }
                            }
                        }
                        TickEvent::StallReleased => {
                            session.release_in_flight();
                            active_rule = None;
                        }
                        TickEvent::None => {}
                    }

                    match session.on_tick(&tick) {
                        Some(TickCommand::Fire { signal, stake }) => {
                            active_rule = Some(signal.rule);
                            journal.log_signal(signal.rule, signal.direction);
                            engine.schedule_entry(signal, stake);
                        }
                        Some(TickCommand::Stop { reason }) => {
                            engine.cancel_pending();
                            engine.emit(BotEvent::SessionStopped { reason });
                            journal.log_stop(reason);
                            break;
                        }
                        None => {}
                    }
                }
                Some(FeedEvent::Error(message)) => {
                    error!("feed error: {message}; pausing until the stream recovers");
                    engine.emit(BotEvent::FeedError { message });
                }
                Some(FeedEvent::Closed) | None => {
                    info!("feed closed");
                    break;
                }
            },
            maybe_due = entry_rx.recv() => {
                if maybe_due.is_some() {
                    match engine.submit_pending().await {
                        SubmitOutcome::Submitted { direction, stake } => {
                            session.note_submitted();
                            session.note_contract_open();
                            journal.log_order(active_rule.unwrap_or(""), direction, stake);
                        }
                        SubmitOutcome::Rejected => {
                            session.release_in_flight();
                            active_rule = None;
                        }
                        SubmitOutcome::NotPending => {}
                    }
                }
            },
            _ = tokio::signal::ctrl_c() => {
                info!("interrupt received, stopping session");
                session.stop(StopReason::UserStop);
                engine.cancel_pending();
                engine.emit(BotEvent::SessionStopped { reason: StopReason::UserStop });
                journal.log_stop(StopReason::UserStop);
                break;
            }
        }
    }

    feed_handle.abort();

    let summary = session.summary();
    info!(
        "Session over: {} trades | {}W/{}L/{}B | win rate {:.1}% | net {:+.2} | final stake {:.2}",
        summary.trades,
        summary.wins,
        summary.losses,
        summary.breakevens,
        summary.win_rate,
        summary.session_profit,
        summary.final_stake
    );

    Ok(())
}
