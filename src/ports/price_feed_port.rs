//! Live spot price source.

use crate::domain::error::MetalwatchError;
use crate::domain::tick::{Instrument, Tick};
use chrono::{DateTime, Utc};

pub trait PriceFeedPort {
    /// Human-readable source name, used in logs.
    fn name(&self) -> &str;

    /// Fetches the current quote. Failures are reported as
    /// [`MetalwatchError::ExternalResourceUnavailable`].
    fn fetch_quote(
        &mut self,
        instrument: Instrument,
        now: DateTime<Utc>,
    ) -> Result<Tick, MetalwatchError>;
}
