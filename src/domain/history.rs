//! Bounded, append-only tick log shared by all instruments.
//!
//! The store keeps ticks in insertion order and evicts the oldest entries once
//! the combined count exceeds its capacity. Reads for an instrument are always
//! returned in timestamp order, so late or out-of-order ticks are tolerated.

use crate::domain::error::MetalwatchError;
use crate::domain::tick::{Instrument, Tick};
use crate::ports::history_port::HistoryPort;
use chrono::{DateTime, Duration, Utc};
use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_CAPACITY: usize = 1000;

/// Look-back window for history reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeWindow {
    Hours(i64),
    Days(i64),
    All,
}

impl TimeWindow {
    pub const ONE_HOUR: TimeWindow = TimeWindow::Hours(1);
    pub const SIX_HOURS: TimeWindow = TimeWindow::Hours(6);
    pub const ONE_DAY: TimeWindow = TimeWindow::Days(1);
    pub const SEVEN_DAYS: TimeWindow = TimeWindow::Days(7);
    pub const ONE_MONTH: TimeWindow = TimeWindow::Days(30);
    pub const ONE_YEAR: TimeWindow = TimeWindow::Days(365);

    /// `None` for `All` and for spans too long to represent.
    pub fn duration(&self) -> Option<Duration> {
        match self {
            TimeWindow::Hours(h) => Duration::try_hours(*h),
            TimeWindow::Days(d) => Duration::try_days(*d),
            TimeWindow::All => None,
        }
    }

    /// A window reaching back past the earliest representable instant has no
    /// lower bound.
    pub fn contains(&self, timestamp: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        if *self == TimeWindow::All {
            return true;
        }
        let start = self.duration().and_then(|span| now.checked_sub_signed(span));
        start.is_none_or(|start| timestamp >= start) && timestamp <= now
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeWindow::All => write!(f, "ALL"),
            TimeWindow::Hours(h) => write!(f, "{}H", h),
            TimeWindow::Days(365) => write!(f, "1Y"),
            TimeWindow::Days(30) => write!(f, "1M"),
            TimeWindow::Days(d) => write!(f, "{}D", d),
        }
    }
}

impl FromStr for TimeWindow {
    type Err = MetalwatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let label = s.trim().to_uppercase();
        match label.as_str() {
            "ALL" => return Ok(TimeWindow::All),
            "1M" => return Ok(TimeWindow::ONE_MONTH),
            "1Y" => return Ok(TimeWindow::ONE_YEAR),
            _ => {}
        }

        let invalid = || {
            MetalwatchError::invalid_parameter(
                "timeframe",
                format!("expected e.g. 1H, 7D, 1M, 1Y or ALL, got {s:?}"),
            )
        };
        if label.len() < 2 {
            return Err(invalid());
        }
        let (count, unit) = label.split_at(label.len() - 1);
        let count: i64 = count.parse().map_err(|_| invalid())?;
        if count <= 0 {
            return Err(invalid());
        }
        let window = match unit {
            "H" => TimeWindow::Hours(count),
            "D" => TimeWindow::Days(count),
            _ => return Err(invalid()),
        };
        if window.duration().is_none() {
            return Err(MetalwatchError::invalid_parameter(
                "timeframe",
                format!("{s:?} is too long"),
            ));
        }
        Ok(window)
    }
}

pub struct HistoryStore {
    ticks: VecDeque<Tick>,
    capacity: usize,
    port: Option<Box<dyn HistoryPort>>,
}

impl fmt::Debug for HistoryStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HistoryStore")
            .field("len", &self.ticks.len())
            .field("capacity", &self.capacity)
            .field("persistent", &self.port.is_some())
            .finish()
    }
}

impl HistoryStore {
    /// In-memory store with no backing persistence.
    pub fn new(capacity: usize) -> Self {
        Self {
            ticks: VecDeque::with_capacity(capacity.min(DEFAULT_CAPACITY)),
            capacity: capacity.max(1),
            port: None,
        }
    }

    /// Restores the log from `port` and persists every later mutation to it.
    ///
    /// Stored ticks that fail validation are skipped; if the stored log is
    /// longer than `capacity`, only the newest entries are kept.
    pub fn open(capacity: usize, port: Box<dyn HistoryPort>) -> Result<Self, MetalwatchError> {
        let stored = port.load_history()?;
        let mut store = Self::new(capacity);
        let mut skipped = 0usize;
        for tick in stored {
            if tick.validate().is_err() {
                skipped += 1;
                continue;
            }
            store.push_bounded(tick);
        }
        if skipped > 0 {
            tracing::warn!(skipped, "ignored invalid ticks in stored history");
        }
        tracing::debug!(restored = store.len(), capacity = store.capacity, "history restored");
        store.port = Some(port);
        Ok(store)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.ticks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ticks.is_empty()
    }

    /// Appends a tick and returns how many old ticks were evicted.
    pub fn append(&mut self, tick: Tick) -> Result<usize, MetalwatchError> {
        tick.validate()?;
        let evicted = self.push_bounded(tick);
        self.persist();
        Ok(evicted)
    }

    /// Removes every tick and persists the empty log.
    pub fn clear(&mut self) {
        self.ticks.clear();
        self.persist();
    }

    /// Ticks for `instrument` inside `window`, oldest first.
    pub fn query(
        &self,
        instrument: Instrument,
        window: TimeWindow,
        now: DateTime<Utc>,
    ) -> impl Iterator<Item = &Tick> + '_ {
        let mut selected: Vec<&Tick> = self
            .ticks
            .iter()
            .filter(|t| t.instrument == instrument && window.contains(t.timestamp, now))
            .collect();
        // Stable sort keeps insertion order among equal timestamps.
        selected.sort_by_key(|t| t.timestamp);
        selected.into_iter()
    }

    /// Chronological prices for `instrument` inside `window`.
    pub fn prices(&self, instrument: Instrument, window: TimeWindow, now: DateTime<Utc>) -> Vec<f64> {
        self.query(instrument, window, now).map(|t| t.price).collect()
    }

    /// Newest tick for `instrument` by timestamp.
    pub fn latest(&self, instrument: Instrument) -> Option<&Tick> {
        self.ticks
            .iter()
            .filter(|t| t.instrument == instrument)
            .max_by_key(|t| t.timestamp)
    }

    /// Every retained tick in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Tick> + '_ {
        self.ticks.iter()
    }

    /// Newest-first rows with the percent change against the previous tick of
    /// the same instrument. `filter = None` includes every instrument.
    pub fn recent(&self, filter: Option<Instrument>, limit: usize) -> Vec<HistoryRow> {
        let mut ordered: Vec<&Tick> = self
            .ticks
            .iter()
            .filter(|t| filter.is_none_or(|i| t.instrument == i))
            .collect();
        ordered.sort_by_key(|t| t.timestamp);

        let mut rows = Vec::with_capacity(limit.min(ordered.len()));
        for (i, tick) in ordered.iter().enumerate().rev() {
            if rows.len() == limit {
                break;
            }
            let previous = ordered[..i]
                .iter()
                .rev()
                .find(|p| p.instrument == tick.instrument);
            let change_pct = previous.map(|p| (tick.price - p.price) / p.price * 100.0);
            rows.push(HistoryRow {
                tick: (*tick).clone(),
                change_pct,
            });
        }
        rows
    }

    fn push_bounded(&mut self, tick: Tick) -> usize {
        self.ticks.push_back(tick);
        let mut evicted = 0;
        while self.ticks.len() > self.capacity {
            self.ticks.pop_front();
            evicted += 1;
        }
        evicted
    }

    fn persist(&self) {
        let Some(port) = &self.port else {
            return;
        };
        let (head, tail) = self.ticks.as_slices();
        let result = if tail.is_empty() {
            port.save_history(head)
        } else {
            let contiguous: Vec<Tick> = self.ticks.iter().cloned().collect();
            port.save_history(&contiguous)
        };
        if let Err(e) = result {
            tracing::warn!(error = %e, "failed to persist history; keeping in-memory log");
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HistoryRow {
    pub tick: Tick,
    pub change_pct: Option<f64>,
}
