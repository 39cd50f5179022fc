//! Port traits: the boundary between the analytics core and its collaborators.

pub mod commentary_port;
pub mod config_port;
pub mod history_port;
pub mod price_feed_port;
pub mod session_port;
