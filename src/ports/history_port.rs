//! Durable storage port for the bounded tick log.

use crate::domain::error::MetalwatchError;
use crate::domain::tick::Tick;

pub trait HistoryPort {
    /// Loads the stored log in its stored (insertion) order.
    fn load_history(&self) -> Result<Vec<Tick>, MetalwatchError>;

    /// Replaces the stored log with `ticks`.
    fn save_history(&self, ticks: &[Tick]) -> Result<(), MetalwatchError>;
}
