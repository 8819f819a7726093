//! SMA and RSI over the rolling tick window
//!
//! Both functions are pure and O(period). They keep the degenerate
//! fallbacks of the strategy contract: a window shorter than the SMA period
//! yields the latest quote, and a window too short for RSI yields the
//! neutral midpoint 50. These fallbacks are intentional, not errors.

/// Arithmetic mean of the last `period` samples.
///
/// With fewer than `period` samples the most recent sample is returned
/// (short-window fallback). An empty window yields 0.0.
pub fn sma(window: &[f64], period: usize) -> f64 {
    let n = window.len();
    if n == 0 || period == 0 {
        return 0.0;
    }
    if n < period {
        return window[n - 1];
    }
    window[n - period..].iter().sum::<f64>() / period as f64
}

/// RSI over the last `period` deltas, bounded to [0, 100].
///
/// Positive deltas sum into gains, negated negative deltas into losses.
/// A window with zero losses (including a flat window) reads 100; fewer
/// than `period + 1` samples read the neutral 50.
pub fn rsi(window: &[f64], period: usize) -> f64 {
    let n = window.len();
    if period == 0 || n < period + 1 {
        return 50.0;
    }

    let mut gains = 0.0;
    let mut losses = 0.0;
    for i in n - period - 1..n - 1 {
        let diff = window[i + 1] - window[i];
        if diff > 0.0 {
            gains += diff;
        } else {
            losses -= diff;
        }
    }

    if losses == 0.0 {
        return 100.0;
    }
    100.0 - 100.0 / (1.0 + gains / losses)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sma_of_constant_window_is_the_constant() {
        let window = vec![42.0; 25];
        assert_eq!(sma(&window, 20), 42.0);
    }

    #[test]
    fn sma_averages_the_tail_only() {
        // 1..=6 with period 3: mean of 4, 5, 6
        let window = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        assert_eq!(sma(&window, 3), 5.0);
    }

    #[test]
    fn sma_short_window_falls_back_to_latest() {
        let window = vec![1.0, 2.0, 3.0];
        assert_eq!(sma(&window, 20), 3.0);
    }

    #[test]
    fn rsi_is_100_when_every_delta_is_a_gain() {
        let window: Vec<f64> = (0..16).map(|i| 100.0 + i as f64 * 0.1).collect();
        assert_eq!(rsi(&window, 14), 100.0);
    }

    #[test]
    fn rsi_is_zero_when_every_delta_is_a_loss() {
        let window: Vec<f64> = (0..16).map(|i| 100.0 - i as f64 * 0.1).collect();
        assert_eq!(rsi(&window, 14), 0.0);
    }

    #[test]
    fn rsi_short_window_is_neutral() {
        let window = vec![100.0; 10];
        assert_eq!(rsi(&window, 14), 50.0);
    }

    #[test]
    fn rsi_flat_window_counts_as_all_gain() {
        // Zero losses reads 100 by contract, even with zero gains.
        let window = vec![100.0; 20];
        assert_eq!(rsi(&window, 14), 100.0);
    }

    #[test]
    fn rsi_balanced_deltas_read_midpoint() {
        // Alternating +1/-1 over 14 deltas: gains == losses
        let window: Vec<f64> = (0..15).map(|i| if i % 2 == 0 { 100.0 } else { 101.0 }).collect();
        assert_eq!(rsi(&window, 14), 50.0);
    }

    #[test]
    fn rsi_stays_in_bounds_on_mixed_data() {
        let window = vec![
            100.0, 100.4, 99.8, 100.9, 101.3, 100.7, 101.8, 102.2, 101.5, 102.9, 103.1, 102.4,
            103.8, 104.0, 103.2, 104.5,
        ];
        let value = rsi(&window, 14);
        assert!((0.0..=100.0).contains(&value));
        assert!(value > 50.0, "uptrending window should read above 50, got {value}");
    }
}
