//! The signal bank: ten ordered rules mapping (window, RSI, SMA) to an
//! optional contract direction
//!
//! Evaluation order is a contract, not an accident of declaration: the
//! arbiter takes the FIRST rule that fires, so the bank is an explicit
//! ordered list. Rules that index back into the window return `None` on
//! short windows instead of failing.

use crate::types::{Direction, Signal};

/// Epsilon for comparing the latest quote against the window max/min in the
/// range-breakout rule. Quotes are fixed-decimal, so this only absorbs
/// representation noise rather than changing semantics.
const BREAKOUT_EPS: f64 = 1e-9;

/// Minimum width of the 5-sample range before a breakout is tradeable;
/// anything narrower is noise.
const BREAKOUT_MIN_RANGE: f64 = 0.2;

/// Displacement versus three ticks back that counts as a momentum burst.
const MOMENTUM_DELTA: f64 = 0.5;

/// Distance from the SMA that qualifies as a reversal extreme.
const REVERSAL_DISTANCE: f64 = 1.5;

/// A named rule evaluated against the current window and indicators.
pub struct Rule {
    pub name: &'static str,
    pub eval: fn(&[f64], f64, f64) -> Option<Direction>,
}

/// The bank in evaluation order. First match wins.
pub fn default_bank() -> Vec<Rule> {
    vec![
        Rule { name: "RSI_OVERSOLD", eval: rsi_oversold },
        Rule { name: "RSI_OVERBOUGHT", eval: rsi_overbought },
        Rule { name: "SMA_CROSS_UP", eval: sma_cross_up },
        Rule { name: "SMA_CROSS_DOWN", eval: sma_cross_down },
        Rule { name: "MOMENTUM_BURST", eval: momentum_burst },
        Rule { name: "REVERSAL_EXTREME", eval: reversal_extreme },
        Rule { name: "PATTERN_3_CROWS", eval: three_crows },
        Rule { name: "PATTERN_3_SOLDIERS", eval: three_soldiers },
        Rule { name: "CONSERVATIVE_TREND", eval: conservative_trend },
        Rule { name: "RANGE_BREAKOUT", eval: range_breakout },
    ]
}

/// Evaluate the bank in order, returning the first signal that fires.
pub fn scan(bank: &[Rule], window: &[f64], rsi: f64, sma: f64) -> Option<Signal> {
    for rule in bank {
        if let Some(direction) = (rule.eval)(window, rsi, sma) {
            return Some(Signal {
                direction,
                rule: rule.name,
            });
        }
    }
    None
}

fn rsi_oversold(_window: &[f64], rsi: f64, _sma: f64) -> Option<Direction> {
    (rsi < 25.0).then_some(Direction::Call)
}

fn rsi_overbought(_window: &[f64], rsi: f64, _sma: f64) -> Option<Direction> {
    (rsi > 75.0).then_some(Direction::Put)
}

fn sma_cross_up(window: &[f64], _rsi: f64, sma: f64) -> Option<Direction> {
    let n = window.len();
    if n < 2 {
        return None;
    }
    let (prev, last) = (window[n - 2], window[n - 1]);
    (prev < sma && last > sma).then_some(Direction::Call)
}

fn sma_cross_down(window: &[f64], _rsi: f64, sma: f64) -> Option<Direction> {
    let n = window.len();
    if n < 2 {
        return None;
    }
    let (prev, last) = (window[n - 2], window[n - 1]);
    (prev > sma && last < sma).then_some(Direction::Put)
}

fn momentum_burst(window: &[f64], _rsi: f64, _sma: f64) -> Option<Direction> {
    let n = window.len();
    if n < 4 {
        return None;
    }
    let last = window[n - 1];
    let back3 = window[n - 4];
    if last > back3 + MOMENTUM_DELTA {
        return Some(Direction::Call);
    }
    if last < back3 - MOMENTUM_DELTA {
        return Some(Direction::Put);
    }
    None
}

fn reversal_extreme(window: &[f64], rsi: f64, sma: f64) -> Option<Direction> {
    let last = *window.last()?;
    if last > sma + REVERSAL_DISTANCE && rsi > 80.0 {
        return Some(Direction::Put);
    }
    if last < sma - REVERSAL_DISTANCE && rsi < 20.0 {
        return Some(Direction::Call);
    }
    None
}

fn three_crows(window: &[f64], rsi: f64, _sma: f64) -> Option<Direction> {
    let n = window.len();
    if n < 3 {
        return None;
    }
    let falling = window[n - 1] < window[n - 2] && window[n - 2] < window[n - 3];
    (falling && rsi > 30.0).then_some(Direction::Put)
}

fn three_soldiers(window: &[f64], rsi: f64, _sma: f64) -> Option<Direction> {
    let n = window.len();
    if n < 3 {
        return None;
    }
    let rising = window[n - 1] > window[n - 2] && window[n - 2] > window[n - 3];
    (rising && rsi < 70.0).then_some(Direction::Call)
}

fn conservative_trend(window: &[f64], rsi: f64, sma: f64) -> Option<Direction> {
    let last = *window.last()?;
    if last > sma && rsi > 50.0 && rsi < 65.0 {
        return Some(Direction::Call);
    }
    if last < sma && rsi < 50.0 && rsi > 35.0 {
        return Some(Direction::Put);
    }
    None
}

fn range_breakout(window: &[f64], _rsi: f64, _sma: f64) -> Option<Direction> {
    let n = window.len();
    if n < 5 {
        return None;
    }
    let tail = &window[n - 5..];
    let max = tail.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let min = tail.iter().cloned().fold(f64::INFINITY, f64::min);
    if max - min < BREAKOUT_MIN_RANGE {
        return None;
    }
    let last = window[n - 1];
    if (last - max).abs() < BREAKOUT_EPS {
        return Some(Direction::Call);
    }
    if (last - min).abs() < BREAKOUT_EPS {
        return Some(Direction::Put);
    }
    None
}
