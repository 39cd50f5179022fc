//! Offline price feed: a bounded random walk per instrument.
//!
//! Each quote moves at most ±1.5% from the previous one (or from the
//! instrument's reference price when nothing is known yet). The reported
//! high and low sit within 1.2% of the quoted price.

use crate::domain::error::MetalwatchError;
use crate::domain::history::HistoryStore;
use crate::domain::tick::{Instrument, Tick};
use crate::ports::price_feed_port::PriceFeedPort;
use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;

const MAX_STEP: f64 = 0.015;
const MAX_RANGE: f64 = 0.012;
const BACKFILL_SPREAD: f64 = 0.02;

pub struct SimulatedFeed {
    rng: StdRng,
    last: HashMap<Instrument, f64>,
}

impl SimulatedFeed {
    pub fn new() -> Self {
        Self::from_rng(StdRng::from_entropy())
    }

    /// Deterministic feed for tests and reproducible demos.
    pub fn seeded(seed: u64) -> Self {
        Self::from_rng(StdRng::seed_from_u64(seed))
    }

    fn from_rng(rng: StdRng) -> Self {
        Self {
            rng,
            last: HashMap::new(),
        }
    }

    /// Continues the walk from the newest stored price of each instrument.
    pub fn resume_from(mut self, history: &HistoryStore) -> Self {
        for instrument in Instrument::ALL {
            if let Some(tick) = history.latest(instrument) {
                self.last.insert(instrument, tick.price);
            }
        }
        self
    }

    pub fn last_price(&self, instrument: Instrument) -> f64 {
        self.last
            .get(&instrument)
            .copied()
            .unwrap_or_else(|| instrument.reference_price())
    }

    /// One back-dated tick per instrument per day for the `days` days before
    /// `now`, oldest first, scattered around each reference price.
    pub fn backfill(&mut self, days: u32, now: DateTime<Utc>) -> Vec<Tick> {
        let day_ms = Duration::days(1).num_milliseconds();
        let mut ticks = Vec::with_capacity(days as usize * Instrument::ALL.len());

        for offset in (1..=i64::from(days)).rev() {
            let jitter = self.rng.gen_range(0..day_ms);
            let timestamp = now - Duration::milliseconds(offset * day_ms + jitter);
            for instrument in Instrument::ALL {
                let spread = self.rng.gen_range(-BACKFILL_SPREAD..=BACKFILL_SPREAD);
                let price = instrument.reference_price() * (1.0 + spread);
                self.last.insert(instrument, price);
                ticks.push(Tick::new(instrument, price, timestamp));
            }
        }

        tracing::debug!(days, ticks = ticks.len(), "generated backfill");
        ticks
    }
}

impl Default for SimulatedFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl PriceFeedPort for SimulatedFeed {
    fn name(&self) -> &str {
        "simulated"
    }

    fn fetch_quote(
        &mut self,
        instrument: Instrument,
        now: DateTime<Utc>,
    ) -> Result<Tick, MetalwatchError> {
        let reference = self.last_price(instrument);
        let step = self.rng.gen_range(-MAX_STEP..=MAX_STEP);
        let price = reference * (1.0 + step);
        let high = price * (1.0 + self.rng.gen_range(0.0..=MAX_RANGE));
        let low = price * (1.0 - self.rng.gen_range(0.0..=MAX_RANGE));

        self.last.insert(instrument, price);
        Ok(Tick::new(instrument, price, now)
            .with_range(high, low)
            .with_percent_change(step * 100.0))
    }
}
