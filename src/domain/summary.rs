//! Period summaries and cross-metal market statistics.

use crate::domain::history::{HistoryStore, TimeWindow};
use crate::domain::tick::{Instrument, Tick};
use chrono::{DateTime, Utc};

/// Change (in percent) beyond which a period is considered trending.
pub const TREND_THRESHOLD: f64 = 0.5;
/// Ticks per metal used for the short-horizon market stats.
pub const STATS_LOOKBACK: usize = 7;
/// Price within this percentage of the day's high counts as near the high.
pub const NEAR_HIGH_PCT: f64 = 98.0;

/// Standard report periods, shortest first.
pub const REPORT_PERIODS: [(TimeWindow, &str); 4] = [
    (TimeWindow::ONE_HOUR, "Last Hour"),
    (TimeWindow::SIX_HOURS, "Last 6 Hours"),
    (TimeWindow::ONE_DAY, "Last 24 Hours"),
    (TimeWindow::SEVEN_DAYS, "Last 7 Days"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trend {
    Up,
    Down,
    Flat,
}

impl Trend {
    pub fn classify(change_pct: f64) -> Self {
        if change_pct > TREND_THRESHOLD {
            Trend::Up
        } else if change_pct < -TREND_THRESHOLD {
            Trend::Down
        } else {
            Trend::Flat
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Trend::Up => "bullish",
            Trend::Down => "bearish",
            Trend::Flat => "stable",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PeriodSummary {
    pub points: usize,
    pub low: f64,
    pub high: f64,
    pub change_pct: f64,
    /// Population standard deviation over the mean, in percent.
    pub volatility_pct: f64,
    pub trend: Trend,
}

impl PeriodSummary {
    /// Summary of a chronological price series; `None` when empty.
    pub fn from_prices(prices: &[f64]) -> Option<Self> {
        let first = *prices.first()?;
        let last = *prices.last()?;
        let n = prices.len() as f64;

        let low = prices.iter().copied().fold(f64::INFINITY, f64::min);
        let high = prices.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let mean = prices.iter().sum::<f64>() / n;
        let variance = prices.iter().map(|p| (p - mean).powi(2)).sum::<f64>() / n;
        let change_pct = (last - first) / first * 100.0;

        Some(Self {
            points: prices.len(),
            low,
            high,
            change_pct,
            volatility_pct: variance.sqrt() / mean * 100.0,
            trend: Trend::classify(change_pct),
        })
    }

    pub fn for_window(
        history: &HistoryStore,
        instrument: Instrument,
        window: TimeWindow,
        now: DateTime<Utc>,
    ) -> Option<Self> {
        Self::from_prices(&history.prices(instrument, window, now))
    }

    /// One-sentence reading used when no commentary is available.
    pub fn insight(&self) -> String {
        if self.volatility_pct > 2.0 {
            format!(
                "High volatility ({:.1}%) with significant price swings.",
                self.volatility_pct
            )
        } else if self.change_pct > 1.0 {
            format!("Strong upward momentum with {:.2}% gain.", self.change_pct)
        } else if self.change_pct < -1.0 {
            format!("Downward pressure with {:.2}% decline.", self.change_pct)
        } else {
            "Stable trading with minimal movement.".to_string()
        }
    }

    pub fn prompt(&self, metal: &str, period: &str) -> String {
        format!(
            "Analyze {metal} price for {period}: Range ${:.2}-${:.2}, Change {:.2}%, \
             Volatility {:.2}%. Give 1 short sentence insight (max 15 words).",
            self.low, self.high, self.change_pct, self.volatility_pct
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolatilityLevel {
    Low,
    Medium,
    High,
}

impl VolatilityLevel {
    pub fn classify(movement_pct: f64) -> Self {
        if movement_pct < 2.0 {
            VolatilityLevel::Low
        } else if movement_pct < 5.0 {
            VolatilityLevel::Medium
        } else {
            VolatilityLevel::High
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            VolatilityLevel::Low => "Low",
            VolatilityLevel::Medium => "Medium",
            VolatilityLevel::High => "High",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MarketStats {
    /// Latest gold price over latest silver price.
    pub gold_silver_ratio: Option<f64>,
    pub volatility: VolatilityLevel,
    pub gold_change_pct: f64,
    pub silver_change_pct: f64,
    /// From the reported daily change of the latest quotes.
    pub market_trend: Trend,
    /// Any latest quote within 2% of its reported high.
    pub near_high: bool,
}

impl MarketStats {
    pub fn compute(history: &HistoryStore) -> Self {
        let gold = history.latest(Instrument::Gold);
        let silver = history.latest(Instrument::Silver);
        let gold_silver_ratio = match (gold, silver) {
            (Some(g), Some(s)) => Some(g.price / s.price),
            _ => None,
        };

        let gold_change_pct = lookback_change(history, Instrument::Gold);
        let silver_change_pct = lookback_change(history, Instrument::Silver);
        let movement = (gold_change_pct.abs() + silver_change_pct.abs()) / 2.0;

        let daily = |t: Option<&Tick>| t.and_then(|t| t.percent_change).unwrap_or(0.0);
        let market_trend = Trend::classify((daily(gold) + daily(silver)) / 2.0);
        let near_high = gold.into_iter().chain(silver).any(is_near_high);

        Self {
            gold_silver_ratio,
            volatility: VolatilityLevel::classify(movement),
            gold_change_pct,
            silver_change_pct,
            market_trend,
            near_high,
        }
    }
}

/// First-to-last change over the newest `STATS_LOOKBACK` ticks of one metal.
fn lookback_change(history: &HistoryStore, instrument: Instrument) -> f64 {
    let rows = history.recent(Some(instrument), STATS_LOOKBACK);
    match (rows.last(), rows.first()) {
        (Some(oldest), Some(newest)) if rows.len() > 1 => {
            (newest.tick.price - oldest.tick.price) / oldest.tick.price * 100.0
        }
        _ => 0.0,
    }
}

/// Whether the quote sits within 2% of its reported high. A quote with no
/// high is its own high.
pub fn is_near_high(tick: &Tick) -> bool {
    let high = tick.high_price.unwrap_or(tick.price);
    high > 0.0 && tick.price / high * 100.0 > NEAR_HIGH_PCT
}
