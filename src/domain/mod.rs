//! Core domain types and logic.

pub mod tick;
pub mod history;
pub mod indicator;
pub mod forecast;
pub mod adjustment;
pub mod rate_limit;
pub mod session;
pub mod analysis;
pub mod summary;
pub mod config_validation;
pub mod error;
