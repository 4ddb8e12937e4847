//! Shared data model for the certificate watcher: certificate snapshots,
//! watchlist rows and their live-status projection, and the date handling
//! every other crate agrees on.

pub mod datetime;
pub mod types;
