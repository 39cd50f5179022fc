#![allow(dead_code)]

use chrono::{DateTime, Duration, Utc};
use metalwatch::domain::error::MetalwatchError;
use metalwatch::domain::rate_limit::QuotaState;
pub use metalwatch::domain::tick::{Instrument, Tick};
use metalwatch::ports::commentary_port::CommentaryPort;
use metalwatch::ports::history_port::HistoryPort;
use metalwatch::ports::price_feed_port::PriceFeedPort;
use metalwatch::ports::session_port::SessionPort;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

pub const BASE_SECS: i64 = 1_709_294_400;

/// 2024-03-01T12:00:00Z plus `seconds`.
pub fn at(seconds: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(BASE_SECS + seconds, 0).unwrap()
}

pub fn make_tick(instrument: Instrument, price: f64, seconds: i64) -> Tick {
    Tick::new(instrument, price, at(seconds))
}

/// One tick per minute for each price, starting at `at(0)`.
pub fn make_series(instrument: Instrument, prices: &[f64]) -> Vec<Tick> {
    prices
        .iter()
        .enumerate()
        .map(|(i, &p)| Tick::new(instrument, p, at(0) + Duration::minutes(i as i64)))
        .collect()
}

/// Feed returning fixed prices, optionally failing for some instruments.
pub struct MockFeed {
    pub prices: HashMap<Instrument, f64>,
    pub failing: Vec<Instrument>,
    pub calls: usize,
}

impl MockFeed {
    pub fn new() -> Self {
        Self {
            prices: HashMap::new(),
            failing: Vec::new(),
            calls: 0,
        }
    }

    pub fn with_price(mut self, instrument: Instrument, price: f64) -> Self {
        self.prices.insert(instrument, price);
        self
    }

    pub fn failing(mut self, instrument: Instrument) -> Self {
        self.failing.push(instrument);
        self
    }
}

impl PriceFeedPort for MockFeed {
    fn name(&self) -> &str {
        "mock"
    }

    fn fetch_quote(
        &mut self,
        instrument: Instrument,
        now: DateTime<Utc>,
    ) -> Result<Tick, MetalwatchError> {
        self.calls += 1;
        if self.failing.contains(&instrument) {
            return Err(MetalwatchError::ExternalResourceUnavailable {
                resource: "mock".into(),
                reason: "connection refused".into(),
            });
        }
        let price = self
            .prices
            .get(&instrument)
            .copied()
            .unwrap_or_else(|| instrument.reference_price());
        Ok(Tick::new(instrument, price, now).with_percent_change(0.25))
    }
}

pub struct MockCommentary {
    pub reply: Option<String>,
    pub calls: Cell<usize>,
    pub prompts: RefCell<Vec<String>>,
}

impl MockCommentary {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: Some(reply.to_string()),
            calls: Cell::new(0),
            prompts: RefCell::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            reply: None,
            calls: Cell::new(0),
            prompts: RefCell::new(Vec::new()),
        }
    }
}

impl CommentaryPort for MockCommentary {
    fn complete(&self, prompt: &str) -> Result<String, MetalwatchError> {
        self.calls.set(self.calls.get() + 1);
        self.prompts.borrow_mut().push(prompt.to_string());
        self.reply
            .clone()
            .ok_or_else(|| MetalwatchError::ExternalResourceUnavailable {
                resource: "commentary".into(),
                reason: "rate limited".into(),
            })
    }
}

/// In-memory persistence shared between clones, so a test can reopen a store
/// against the same backing data.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    pub ticks: Rc<RefCell<Vec<Tick>>>,
    pub quotas: Rc<RefCell<HashMap<String, QuotaState>>>,
    pub quotes: Rc<RefCell<HashMap<Instrument, Tick>>>,
    pub saves: Rc<Cell<usize>>,
    pub fail_saves: Rc<Cell<bool>>,
}

impl HistoryPort for MemoryStorage {
    fn load_history(&self) -> Result<Vec<Tick>, MetalwatchError> {
        Ok(self.ticks.borrow().clone())
    }

    fn save_history(&self, ticks: &[Tick]) -> Result<(), MetalwatchError> {
        if self.fail_saves.get() {
            return Err(MetalwatchError::Storage {
                reason: "disk full".into(),
            });
        }
        self.saves.set(self.saves.get() + 1);
        *self.ticks.borrow_mut() = ticks.to_vec();
        Ok(())
    }
}

impl SessionPort for MemoryStorage {
    fn load_quota(&self, resource: &str) -> Result<Option<QuotaState>, MetalwatchError> {
        Ok(self.quotas.borrow().get(resource).copied())
    }

    fn save_quota(&self, resource: &str, state: &QuotaState) -> Result<(), MetalwatchError> {
        self.quotas.borrow_mut().insert(resource.to_string(), *state);
        Ok(())
    }

    fn load_cached_quote(&self, instrument: Instrument) -> Result<Option<Tick>, MetalwatchError> {
        Ok(self.quotes.borrow().get(&instrument).cloned())
    }

    fn save_cached_quote(&self, quote: &Tick) -> Result<(), MetalwatchError> {
        self.quotes
            .borrow_mut()
            .insert(quote.instrument, quote.clone());
        Ok(())
    }
}
