//! Technical snapshot: the latest SMA pair and RSI over a price series.

use crate::domain::error::MetalwatchError;
use crate::domain::indicator::rsi::{DEFAULT_RSI_PERIOD, RsiZone, calculate_rsi};
use crate::domain::indicator::sma::calculate_sma;

pub const DEFAULT_MIN_POINTS: usize = 50;
pub const DEFAULT_SMA_SHORT: usize = 20;
pub const DEFAULT_SMA_LONG: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalysisConfig {
    pub min_points: usize,
    pub sma_short: usize,
    pub sma_long: usize,
    pub rsi_period: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            min_points: DEFAULT_MIN_POINTS,
            sma_short: DEFAULT_SMA_SHORT,
            sma_long: DEFAULT_SMA_LONG,
            rsi_period: DEFAULT_RSI_PERIOD,
        }
    }
}

impl AnalysisConfig {
    pub fn validate(&self) -> Result<(), MetalwatchError> {
        if self.sma_short == 0 || self.sma_long == 0 || self.rsi_period == 0 {
            return Err(MetalwatchError::invalid_parameter(
                "period",
                "indicator periods must be positive",
            ));
        }
        if self.sma_short >= self.sma_long {
            return Err(MetalwatchError::invalid_parameter(
                "sma_short",
                format!(
                    "short SMA period {} must be below long period {}",
                    self.sma_short, self.sma_long
                ),
            ));
        }
        Ok(())
    }

    /// Points needed before every indicator in the snapshot has a value.
    pub fn required_points(&self) -> usize {
        self.min_points
            .max(self.sma_long)
            .max(self.rsi_period + 1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TechnicalSnapshot {
    pub price: f64,
    pub sma_short: f64,
    pub sma_long: f64,
    pub rsi: f64,
    pub zone: RsiZone,
    /// First-to-last change over the analysed series, in percent.
    pub change_pct: f64,
}

impl TechnicalSnapshot {
    /// Returns `InsufficientData` while history is still being collected.
    pub fn compute(prices: &[f64], config: &AnalysisConfig) -> Result<Self, MetalwatchError> {
        config.validate()?;
        let needed = config.required_points();
        if prices.len() < needed {
            return Err(MetalwatchError::InsufficientData {
                available: prices.len(),
                needed,
            });
        }

        let missing = || MetalwatchError::InsufficientData {
            available: prices.len(),
            needed,
        };
        let sma_short = calculate_sma(prices, config.sma_short)?.last().ok_or_else(missing)?;
        let sma_long = calculate_sma(prices, config.sma_long)?.last().ok_or_else(missing)?;
        let rsi = calculate_rsi(prices, config.rsi_period)?;

        let first = prices[0];
        let price = prices[prices.len() - 1];
        let snapshot = Self {
            price,
            sma_short,
            sma_long,
            rsi,
            zone: RsiZone::classify(rsi),
            change_pct: (price - first) / first * 100.0,
        };
        tracing::debug!(
            points = prices.len(),
            sma_short,
            sma_long,
            rsi,
            "technical snapshot computed"
        );
        Ok(snapshot)
    }

    pub fn is_bullish(&self) -> bool {
        self.sma_short > self.sma_long
    }

    /// Rule-based reading used when no commentary is available.
    pub fn note(&self) -> String {
        let mut note = String::new();
        if self.is_bullish() {
            note.push_str("Short-term trend is bullish (short SMA above long SMA). ");
        } else {
            note.push_str("Short-term trend is bearish (short SMA below long SMA). ");
        }
        match self.zone {
            RsiZone::Overbought => note.push_str("RSI indicates overbought conditions."),
            RsiZone::Oversold => note.push_str("RSI indicates oversold conditions."),
            RsiZone::Neutral => note.push_str("RSI shows neutral momentum."),
        }
        note
    }

    pub fn prompt(&self, metal: &str, config: &AnalysisConfig) -> String {
        format!(
            "As a technical analyst, provide a brief analysis (3-4 sentences) for {metal}:\n\
             - Current Price: ${:.2}\n\
             - SMA({}): ${:.2}\n\
             - SMA({}): ${:.2}\n\
             - RSI({}): {:.1}\n\
             - Price Change: {:.2}%\n\
             Focus on: trend direction, momentum, and immediate trading signal (buy/hold/sell).",
            self.price,
            config.sma_short,
            self.sma_short,
            config.sma_long,
            self.sma_long,
            config.rsi_period,
            self.rsi,
            self.change_pct,
        )
    }
}
