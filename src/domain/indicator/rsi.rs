//! RSI (Relative Strength Index) using Wilder's smoothing.
//!
//! - Seed: simple mean of gains/losses over the first n price changes
//! - Subsequent: avg = (prev_avg * (n-1) + current) / n
//!
//! Formula: RSI = 100 - (100 / (1 + avg_gain / avg_loss))
//! If avg_loss == 0: RSI = 100
//!
//! Warmup: the first n prices have no value (n changes are needed for the seed).

use crate::domain::error::MetalwatchError;
use crate::domain::indicator::{IndicatorSeries, IndicatorType};

pub const DEFAULT_RSI_PERIOD: usize = 14;
pub const OVERBOUGHT: f64 = 70.0;
pub const OVERSOLD: f64 = 30.0;

/// Momentum reading derived from an RSI value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RsiZone {
    Overbought,
    Neutral,
    Oversold,
}

impl RsiZone {
    pub fn classify(rsi: f64) -> Self {
        if rsi > OVERBOUGHT {
            RsiZone::Overbought
        } else if rsi < OVERSOLD {
            RsiZone::Oversold
        } else {
            RsiZone::Neutral
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RsiZone::Overbought => "overbought",
            RsiZone::Neutral => "neutral",
            RsiZone::Oversold => "oversold",
        }
    }
}

/// RSI as of the last price.
pub fn calculate_rsi(prices: &[f64], period: usize) -> Result<f64, MetalwatchError> {
    check_period(period)?;
    if prices.len() < period + 1 {
        return Err(MetalwatchError::InsufficientData {
            available: prices.len(),
            needed: period + 1,
        });
    }

    let mut smoother = WilderAverages::seed(&prices[..=period], period);
    for pair in prices[period..].windows(2) {
        smoother.update(pair[1] - pair[0]);
    }
    Ok(smoother.rsi())
}

/// RSI at every position; position i equals `calculate_rsi(&prices[..=i])`.
///
/// Too-short input yields an all-`None` series rather than an error, so
/// charts can be drawn during a cold start.
pub fn calculate_rsi_series(
    prices: &[f64],
    period: usize,
) -> Result<IndicatorSeries, MetalwatchError> {
    check_period(period)?;

    let mut values = vec![None; prices.len()];
    if prices.len() > period {
        let mut smoother = WilderAverages::seed(&prices[..=period], period);
        values[period] = Some(smoother.rsi());
        for i in (period + 1)..prices.len() {
            smoother.update(prices[i] - prices[i - 1]);
            values[i] = Some(smoother.rsi());
        }
    }

    Ok(IndicatorSeries {
        indicator_type: IndicatorType::Rsi(period),
        values,
    })
}

fn check_period(period: usize) -> Result<(), MetalwatchError> {
    if period == 0 {
        return Err(MetalwatchError::invalid_parameter(
            "period",
            "RSI period must be positive",
        ));
    }
    Ok(())
}

struct WilderAverages {
    period: f64,
    avg_gain: f64,
    avg_loss: f64,
}

impl WilderAverages {
    /// `head` holds exactly `period + 1` prices.
    fn seed(head: &[f64], period: usize) -> Self {
        let mut gains = 0.0;
        let mut losses = 0.0;
        for pair in head.windows(2) {
            let change = pair[1] - pair[0];
            if change > 0.0 {
                gains += change;
            } else {
                losses -= change;
            }
        }
        let n = period as f64;
        Self {
            period: n,
            avg_gain: gains / n,
            avg_loss: losses / n,
        }
    }

    fn update(&mut self, change: f64) {
        let gain = change.max(0.0);
        let loss = (-change).max(0.0);
        self.avg_gain = (self.avg_gain * (self.period - 1.0) + gain) / self.period;
        self.avg_loss = (self.avg_loss * (self.period - 1.0) + loss) / self.period;
    }

    fn rsi(&self) -> f64 {
        if self.avg_loss == 0.0 {
            100.0
        } else {
            100.0 - (100.0 / (1.0 + self.avg_gain / self.avg_loss))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rising(n: usize) -> Vec<f64> {
        (0..n).map(|i| 100.0 + i as f64).collect()
    }

    #[test]
    fn rsi_all_gains_is_exactly_100() {
        let rsi = calculate_rsi(&rising(15), 14).unwrap();
        assert_eq!(rsi, 100.0);
    }

    #[test]
    fn rsi_all_losses_is_zero() {
        let prices: Vec<f64> = (0..15).map(|i| 100.0 - i as f64).collect();
        let rsi = calculate_rsi(&prices, 14).unwrap();
        assert!(rsi.abs() < f64::EPSILON);
    }

    #[test]
    fn rsi_flat_prices_do_not_panic() {
        let rsi = calculate_rsi(&[50.0; 20], 14).unwrap();
        assert_eq!(rsi, 100.0);
    }

    #[test]
    fn rsi_insufficient_data() {
        let result = calculate_rsi(&rising(14), 14);
        match result {
            Err(MetalwatchError::InsufficientData { available, needed }) => {
                assert_eq!(available, 14);
                assert_eq!(needed, 15);
            }
            other => panic!("expected InsufficientData, got {other:?}"),
        }
        assert!(calculate_rsi(&[], 14).is_err());
    }

    #[test]
    fn rsi_zero_period_is_invalid() {
        assert!(matches!(
            calculate_rsi(&rising(5), 0),
            Err(MetalwatchError::InvalidParameter { .. })
        ));
        assert!(calculate_rsi_series(&rising(5), 0).is_err());
    }

    #[test]
    fn rsi_known_calculation() {
        // Period 2: changes +2, -1, +1.
        // seed: gain (2+0)/2 = 1, loss (0+1)/2 = 0.5
        // next: gain (1*1 + 1)/2 = 1, loss (0.5*1 + 0)/2 = 0.25 → RS 4 → RSI 80
        let rsi = calculate_rsi(&[10.0, 12.0, 11.0, 12.0], 2).unwrap();
        assert!((rsi - 80.0).abs() < 1e-12);
    }

    #[test]
    fn rsi_bullish_sample_in_range() {
        let prices = [
            44.0, 44.25, 44.50, 43.75, 44.50, 44.25, 44.75, 45.25, 45.50, 45.25, 45.50, 46.0,
            46.25, 46.0, 46.50,
        ];
        let rsi = calculate_rsi(&prices, 14).unwrap();
        assert!(rsi > 50.0 && rsi < 100.0, "RSI {} should be bullish", rsi);
    }

    #[test]
    fn rsi_series_warmup_and_alignment() {
        let prices: Vec<f64> = (0..20).map(|i| 100.0 + (i % 7) as f64 * 2.0 - 6.0).collect();
        let series = calculate_rsi_series(&prices, 14).unwrap();

        assert_eq!(series.len(), prices.len());
        for i in 0..14 {
            assert!(series.values[i].is_none(), "index {} should be warmup", i);
        }
        for i in 14..prices.len() {
            let expected = calculate_rsi(&prices[..=i], 14).unwrap();
            let actual = series.values[i].unwrap();
            assert!((expected - actual).abs() < 1e-9);
            assert!((0.0..=100.0).contains(&actual));
        }
    }

    #[test]
    fn rsi_series_short_input_is_all_none() {
        let series = calculate_rsi_series(&rising(5), 14).unwrap();
        assert_eq!(series.values, vec![None; 5]);
        assert_eq!(series.indicator_type, IndicatorType::Rsi(14));
    }

    #[test]
    fn rsi_zone_thresholds() {
        assert_eq!(RsiZone::classify(70.1), RsiZone::Overbought);
        assert_eq!(RsiZone::classify(70.0), RsiZone::Neutral);
        assert_eq!(RsiZone::classify(30.0), RsiZone::Neutral);
        assert_eq!(RsiZone::classify(29.9), RsiZone::Oversold);
        assert_eq!(RsiZone::Oversold.label(), "oversold");
    }
}
