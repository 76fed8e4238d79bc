//! Target catalog for PulseWatch.
//!
//! Holds the set of URLs scheduled for probing, loaded from a static file
//! and grown by discovery.

mod models;
mod store;

pub use models::*;
pub use store::*;
