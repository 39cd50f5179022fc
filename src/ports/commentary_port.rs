//! Free-text commentary source (market notes, forecast adjustments).

use crate::domain::error::MetalwatchError;

pub trait CommentaryPort {
    fn complete(&self, prompt: &str) -> Result<String, MetalwatchError>;
}
