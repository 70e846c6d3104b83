//! API endpoint handlers, one module per resource.

pub mod documents;
pub mod health;
pub mod tickets;
pub mod trackers;
