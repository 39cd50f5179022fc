//! Storage port for session state: quota counters and last-known-good quotes.

use crate::domain::error::MetalwatchError;
use crate::domain::rate_limit::QuotaState;
use crate::domain::tick::{Instrument, Tick};

pub trait SessionPort {
    fn load_quota(&self, resource: &str) -> Result<Option<QuotaState>, MetalwatchError>;

    fn save_quota(&self, resource: &str, state: &QuotaState) -> Result<(), MetalwatchError>;

    fn load_cached_quote(&self, instrument: Instrument) -> Result<Option<Tick>, MetalwatchError>;

    fn save_cached_quote(&self, quote: &Tick) -> Result<(), MetalwatchError>;
}
