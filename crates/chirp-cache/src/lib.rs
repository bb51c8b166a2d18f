//! An in-memory, single-flight fetch cache.
//!
//! The [`FetchCache`] collapses concurrent requests for the same key into one
//! underlying fetch, and keeps successful results in memory so later requests
//! are served without fetching again. Failed fetches are evicted so that a
//! subsequent request retries.

#![warn(missing_docs)]

mod error;
mod fetch;

pub use error::*;
pub use fetch::*;
