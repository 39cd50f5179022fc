//! Simple moving average.
//!
//! SMA(n)[i] = mean(P[i-n+1..=i]); the first n-1 positions have no value.
//! Each window is summed directly rather than through a running total so that
//! long series do not accumulate floating-point drift.

use crate::domain::error::MetalwatchError;
use crate::domain::indicator::{IndicatorSeries, IndicatorType};

pub fn calculate_sma(prices: &[f64], period: usize) -> Result<IndicatorSeries, MetalwatchError> {
    if period == 0 {
        return Err(MetalwatchError::invalid_parameter(
            "period",
            "SMA period must be positive",
        ));
    }

    let mut values = vec![None; prices.len()];
    for (offset, window) in prices.windows(period).enumerate() {
        values[offset + period - 1] = Some(window.iter().sum::<f64>() / period as f64);
    }

    Ok(IndicatorSeries {
        indicator_type: IndicatorType::Sma(period),
        values,
    })
}
