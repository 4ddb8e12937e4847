//! Durable storage for certificate-check history and the watchlist.
//!
//! Both relations live in one SQLite database owned by [`cert_store::CertStore`].
//! History is an append-only log; watchlist rows are unique per domain and
//! carry their own notification policy and optional manual expiry dates.

pub mod cert_store;
pub mod error;
mod history;
mod watchlist;


pub use cert_store::{CertStore, CheckTarget};
pub use error::{Result, StorageError};
pub use history::DEFAULT_HISTORY_LIMIT;
