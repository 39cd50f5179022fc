//! Price tick representation and the flat record used for persistence.

use crate::domain::error::MetalwatchError;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Grams per troy ounce.
pub const TROY_OUNCE_GRAMS: f64 = 31.1035;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Instrument {
    #[serde(rename = "XAU")]
    Gold,
    #[serde(rename = "XAG")]
    Silver,
}

impl Instrument {
    pub const ALL: [Instrument; 2] = [Instrument::Gold, Instrument::Silver];

    pub fn symbol(&self) -> &'static str {
        match self {
            Instrument::Gold => "XAU",
            Instrument::Silver => "XAG",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Instrument::Gold => "Gold",
            Instrument::Silver => "Silver",
        }
    }

    /// Price per gram to start from when nothing is known about the instrument.
    pub fn reference_price(&self) -> f64 {
        match self {
            Instrument::Gold => 2650.0 / TROY_OUNCE_GRAMS,
            Instrument::Silver => 31.5 / TROY_OUNCE_GRAMS,
        }
    }
}

impl fmt::Display for Instrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

impl FromStr for Instrument {
    type Err = MetalwatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "XAU" | "GOLD" => Ok(Instrument::Gold),
            "XAG" | "SILVER" => Ok(Instrument::Silver),
            other => Err(MetalwatchError::invalid_parameter(
                "instrument",
                format!("unknown symbol {other:?}"),
            )),
        }
    }
}

/// One observed price sample, price per gram.
#[derive(Debug, Clone, PartialEq)]
pub struct Tick {
    pub instrument: Instrument,
    pub price: f64,
    pub timestamp: DateTime<Utc>,
    pub high_price: Option<f64>,
    pub low_price: Option<f64>,
    pub percent_change: Option<f64>,
}

impl Tick {
    pub fn new(instrument: Instrument, price: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            instrument,
            price,
            timestamp,
            high_price: None,
            low_price: None,
            percent_change: None,
        }
    }

    /// Builds a tick from a millisecond Unix timestamp, rejecting instants chrono cannot represent.
    pub fn from_millis(
        instrument: Instrument,
        price: f64,
        millis: i64,
    ) -> Result<Self, MetalwatchError> {
        let timestamp =
            DateTime::from_timestamp_millis(millis).ok_or_else(|| MetalwatchError::InvalidTick {
                reason: format!("timestamp {millis} is out of range"),
            })?;
        Ok(Self::new(instrument, price, timestamp))
    }

    pub fn with_range(mut self, high: f64, low: f64) -> Self {
        self.high_price = Some(high);
        self.low_price = Some(low);
        self
    }

    pub fn with_percent_change(mut self, pct: f64) -> Self {
        self.percent_change = Some(pct);
        self
    }

    pub fn timestamp_millis(&self) -> i64 {
        self.timestamp.timestamp_millis()
    }

    /// ISO-8601 date with millisecond precision, e.g. `2024-03-01T12:00:00.000Z`.
    pub fn iso_date(&self) -> String {
        self.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    pub fn validate(&self) -> Result<(), MetalwatchError> {
        if !self.price.is_finite() || self.price <= 0.0 {
            return Err(MetalwatchError::InvalidTick {
                reason: format!("price must be positive and finite, got {}", self.price),
            });
        }
        if self.timestamp_millis() < 0 {
            return Err(MetalwatchError::InvalidTick {
                reason: format!("timestamp {} predates the Unix epoch", self.iso_date()),
            });
        }
        Ok(())
    }
}

/// Flat stored form of a tick. Field names and order are shared with existing history files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickRecord {
    pub symbol: Instrument,
    pub price: f64,
    pub timestamp: i64,
    pub date: String,
}

impl From<&Tick> for TickRecord {
    fn from(tick: &Tick) -> Self {
        Self {
            symbol: tick.instrument,
            price: tick.price,
            timestamp: tick.timestamp_millis(),
            date: tick.iso_date(),
        }
    }
}

impl TryFrom<TickRecord> for Tick {
    type Error = MetalwatchError;

    fn try_from(record: TickRecord) -> Result<Self, Self::Error> {
        let tick = Tick::from_millis(record.symbol, record.price, record.timestamp)?;
        tick.validate()?;
        Ok(tick)
    }
}
