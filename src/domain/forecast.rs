//! Linear-trend forecast with heuristic confidence bands.
//!
//! An ordinary least squares line is fitted to the most recent prices
//! (x = 0..n-1) and extrapolated `horizon` steps ahead. Bands are the point
//! forecast ± `band_multiplier` × residual standard error. The multiplier is a
//! fixed heuristic (1.5 by default), not a calibrated confidence level.

use crate::domain::error::MetalwatchError;

pub const DEFAULT_TRAINING_WINDOW: usize = 90;
pub const DEFAULT_BAND_MULTIPLIER: f64 = 1.5;
pub const DEFAULT_HORIZON: usize = 7;
/// Longest forecast, in steps, that is accepted.
pub const MAX_HORIZON: usize = 365;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForecastConfig {
    pub training_window: usize,
    pub band_multiplier: f64,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            training_window: DEFAULT_TRAINING_WINDOW,
            band_multiplier: DEFAULT_BAND_MULTIPLIER,
        }
    }
}

impl ForecastConfig {
    pub fn validate(&self) -> Result<(), MetalwatchError> {
        if self.training_window == 0 {
            return Err(MetalwatchError::invalid_parameter(
                "training_window",
                "must be at least 1",
            ));
        }
        if !self.band_multiplier.is_finite() || self.band_multiplier < 0.0 {
            return Err(MetalwatchError::invalid_parameter(
                "band_multiplier",
                "must be finite and non-negative",
            ));
        }
        Ok(())
    }
}

/// Fitted trend line over a training window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrendFit {
    pub slope: f64,
    pub intercept: f64,
    pub standard_error: f64,
    pub samples: usize,
}

impl TrendFit {
    /// Fits y against x = 0..y.len(). Returns `None` for an empty slice.
    ///
    /// A single point has no x-variance; the fit degenerates to a flat line
    /// through that point with zero error.
    pub fn fit(y: &[f64]) -> Option<Self> {
        let n = y.len();
        let last = *y.last()?;

        let x_mean = (n as f64 - 1.0) / 2.0;
        let y_mean = y.iter().sum::<f64>() / n as f64;

        let mut sxy = 0.0;
        let mut sxx = 0.0;
        for (i, &yi) in y.iter().enumerate() {
            let dx = i as f64 - x_mean;
            sxy += dx * (yi - y_mean);
            sxx += dx * dx;
        }

        if sxx == 0.0 {
            return Some(Self {
                slope: 0.0,
                intercept: last,
                standard_error: 0.0,
                samples: n,
            });
        }

        let slope = sxy / sxx;
        let intercept = y_mean - slope * x_mean;

        let residual_sum: f64 = y
            .iter()
            .enumerate()
            .map(|(i, &yi)| {
                let r = yi - (slope * i as f64 + intercept);
                r * r
            })
            .sum();
        let dof = n.saturating_sub(2).max(1) as f64;

        Some(Self {
            slope,
            intercept,
            standard_error: (residual_sum / dof).sqrt(),
            samples: n,
        })
    }

    pub fn value_at(&self, x: f64) -> f64 {
        self.slope * x + self.intercept
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ForecastResult {
    pub predictions: Vec<f64>,
    pub upper_band: Vec<f64>,
    pub lower_band: Vec<f64>,
}

impl ForecastResult {
    pub fn horizon(&self) -> usize {
        self.predictions.len()
    }
}

/// Forecast with the default window and band multiplier.
pub fn forecast(
    prices: &[f64],
    horizon: usize,
    adjustment: Option<&[f64]>,
) -> Result<ForecastResult, MetalwatchError> {
    forecast_with(prices, horizon, adjustment, &ForecastConfig::default())
}

/// Forecasts `horizon` steps past the end of `prices`.
///
/// `adjustment`, when given, holds one percentage delta per step applied as
/// `prediction * (1 + delta / 100)` before banding. Steps with no delta, or a
/// non-finite one, are left unchanged; extra deltas are ignored.
pub fn forecast_with(
    prices: &[f64],
    horizon: usize,
    adjustment: Option<&[f64]>,
    config: &ForecastConfig,
) -> Result<ForecastResult, MetalwatchError> {
    config.validate()?;
    if horizon == 0 || horizon > MAX_HORIZON {
        return Err(MetalwatchError::invalid_parameter(
            "horizon",
            format!("must be between 1 and {MAX_HORIZON}, got {horizon}"),
        ));
    }
    if prices.len() < 2 {
        return Err(MetalwatchError::InsufficientData {
            available: prices.len(),
            needed: 2,
        });
    }

    let train = &prices[prices.len() - config.training_window.min(prices.len())..];
    let fit = TrendFit::fit(train).ok_or(MetalwatchError::InsufficientData {
        available: 0,
        needed: 2,
    })?;
    tracing::debug!(
        samples = fit.samples,
        slope = fit.slope,
        intercept = fit.intercept,
        standard_error = fit.standard_error,
        "trend fitted"
    );

    if let Some(deltas) = adjustment.filter(|d| d.len() != horizon) {
        tracing::debug!(
            expected = horizon,
            got = deltas.len(),
            "forecast adjustment length differs from horizon"
        );
    }

    let margin = config.band_multiplier * fit.standard_error;
    let mut result = ForecastResult {
        predictions: Vec::with_capacity(horizon),
        upper_band: Vec::with_capacity(horizon),
        lower_band: Vec::with_capacity(horizon),
    };

    for step in 1..=horizon {
        let mut prediction = fit.value_at((fit.samples + step - 1) as f64);
        let delta = adjustment.and_then(|d| d.get(step - 1)).copied();
        if let Some(delta) = delta.filter(|d| d.is_finite()) {
            prediction *= 1.0 + delta / 100.0;
        }
        result.predictions.push(prediction);
        result.upper_band.push(prediction + margin);
        result.lower_band.push(prediction - margin);
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn one_to(n: usize) -> Vec<f64> {
        (1..=n).map(|i| i as f64).collect()
    }

    #[test]
    fn linear_series_extrapolates_exactly() {
        let result = forecast(&one_to(20), 3, None).unwrap();
        let expected = [21.0, 22.0, 23.0];
        for i in 0..3 {
            assert!((result.predictions[i] - expected[i]).abs() < 1e-9);
            assert!(result.upper_band[i] >= result.predictions[i]);
            assert!(result.predictions[i] >= result.lower_band[i]);
        }
    }

    #[test]
    fn noisy_series_has_strict_bands() {
        let prices: Vec<f64> = (0..30)
            .map(|i| 100.0 + i as f64 * 0.5 + if i % 2 == 0 { 0.8 } else { -0.8 })
            .collect();
        let result = forecast(&prices, 5, None).unwrap();
        assert_eq!(result.horizon(), 5);
        for i in 0..5 {
            assert!(result.upper_band[i] > result.predictions[i]);
            assert!(result.predictions[i] > result.lower_band[i]);
            let width = result.upper_band[i] - result.lower_band[i];
            assert!((width - (result.upper_band[0] - result.lower_band[0])).abs() < 1e-9);
        }
    }

    #[test]
    fn single_point_window_is_flat() {
        let config = ForecastConfig {
            training_window: 1,
            ..ForecastConfig::default()
        };
        let result = forecast_with(&[10.0, 12.0, 15.0], 4, None, &config).unwrap();
        for i in 0..4 {
            assert_eq!(result.predictions[i], 15.0);
            assert_eq!(result.upper_band[i], 15.0);
            assert_eq!(result.lower_band[i], 15.0);
        }
    }

    #[test]
    fn training_window_uses_most_recent_points() {
        // Old regime falls steeply; the last 90 points rise by 1 per step.
        let mut prices: Vec<f64> = (0..50).map(|i| 500.0 - i as f64 * 5.0).collect();
        prices.extend((0..90).map(|i| 100.0 + i as f64));
        let result = forecast(&prices, 1, None).unwrap();
        assert!((result.predictions[0] - 190.0).abs() < 1e-9);
    }

    #[test]
    fn two_points_have_zero_error() {
        let result = forecast(&[1.0, 3.0], 2, None).unwrap();
        assert!((result.predictions[0] - 5.0).abs() < 1e-12);
        assert!((result.predictions[1] - 7.0).abs() < 1e-12);
        assert_eq!(result.upper_band[0], result.predictions[0]);
    }

    #[test]
    fn adjustment_scales_before_banding() {
        let plain = forecast(&one_to(20), 2, None).unwrap();
        let adjusted = forecast(&one_to(20), 2, Some(&[10.0, -50.0])).unwrap();
        assert!((adjusted.predictions[0] - plain.predictions[0] * 1.1).abs() < 1e-9);
        assert!((adjusted.predictions[1] - plain.predictions[1] * 0.5).abs() < 1e-9);
        let width = adjusted.upper_band[1] - adjusted.lower_band[1];
        let plain_width = plain.upper_band[1] - plain.lower_band[1];
        assert!((width - plain_width).abs() < 1e-12);
    }

    #[test]
    fn short_adjustment_applies_to_leading_steps() {
        let result = forecast(&one_to(20), 3, Some(&[10.0])).unwrap();
        assert!((result.predictions[0] - 23.1).abs() < 1e-9);
        assert!((result.predictions[1] - 22.0).abs() < 1e-9);
        assert!((result.predictions[2] - 23.0).abs() < 1e-9);
    }

    #[test]
    fn long_adjustment_uses_first_horizon_deltas() {
        let deltas = [-1.2, 0.5, 1.8, 2.0, -3.0, 0.0, 4.0];
        let result = forecast(&one_to(20), 2, Some(&deltas)).unwrap();
        assert_eq!(result.horizon(), 2);
        assert!((result.predictions[0] - 21.0 * 0.988).abs() < 1e-9);
        assert!((result.predictions[1] - 22.0 * 1.005).abs() < 1e-9);
    }

    #[test]
    fn non_finite_deltas_are_skipped() {
        let plain = forecast(&one_to(20), 3, None).unwrap();
        let with_nan = forecast(&one_to(20), 3, Some(&[f64::NAN, 0.0, f64::INFINITY])).unwrap();
        assert_eq!(plain, with_nan);
    }

    #[test]
    fn insufficient_data() {
        assert!(matches!(
            forecast(&[5.0], 3, None),
            Err(MetalwatchError::InsufficientData {
                available: 1,
                needed: 2
            })
        ));
        assert!(forecast(&[], 3, None).unwrap_err().is_insufficient_data());
    }

    #[test]
    fn invalid_parameters() {
        assert!(matches!(
            forecast(&one_to(5), 0, None),
            Err(MetalwatchError::InvalidParameter { .. })
        ));
        assert!(matches!(
            forecast(&one_to(5), usize::MAX, None),
            Err(MetalwatchError::InvalidParameter { .. })
        ));
        assert_eq!(forecast(&one_to(5), MAX_HORIZON, None).unwrap().horizon(), MAX_HORIZON);
        let config = ForecastConfig {
            training_window: 0,
            ..ForecastConfig::default()
        };
        assert!(forecast_with(&one_to(5), 1, None, &config).is_err());
        let config = ForecastConfig {
            band_multiplier: -1.0,
            ..ForecastConfig::default()
        };
        assert!(forecast_with(&one_to(5), 1, None, &config).is_err());
    }

    #[test]
    fn trend_fit_empty_is_none() {
        assert!(TrendFit::fit(&[]).is_none());
        let fit = TrendFit::fit(&[2.0, 4.0, 6.0]).unwrap();
        assert!((fit.slope - 2.0).abs() < 1e-12);
        assert!((fit.intercept - 2.0).abs() < 1e-12);
    }
}
