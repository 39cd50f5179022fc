//! Technical indicator implementations.
//!
//! Indicators are pure functions over a chronologically ordered price slice.
//! Series outputs line up 1:1 with their input:
//! - `IndicatorType`: indicator identity + parameters (usable as a HashMap key)
//! - `IndicatorSeries`: one `Option<f64>` per input price, `None` during warmup

pub mod rsi;
pub mod sma;

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndicatorType {
    Sma(usize),
    Rsi(usize),
}

impl IndicatorType {
    /// Number of leading positions without a value.
    pub fn warmup(&self) -> usize {
        match self {
            IndicatorType::Sma(period) => period.saturating_sub(1),
            IndicatorType::Rsi(period) => *period,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorSeries {
    pub indicator_type: IndicatorType,
    pub values: Vec<Option<f64>>,
}

impl IndicatorSeries {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Value at the newest position, if it is past warmup.
    pub fn last(&self) -> Option<f64> {
        self.values.last().copied().flatten()
    }

    pub fn valid_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_some()).count()
    }
}

impl fmt::Display for IndicatorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndicatorType::Sma(period) => write!(f, "SMA({})", period),
            IndicatorType::Rsi(period) => write!(f, "RSI({})", period),
        }
    }
}
