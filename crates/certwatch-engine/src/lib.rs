//! Certificate probing, batch checks, the live watchlist and the public
//! operation surface of certwatch.

pub mod api;
pub mod cert;
pub mod config;
pub mod watchlist;

pub use api::CertWatchApp;
pub use cert::checker::{CertificateProbe, ProbeError, TlsProbe};
pub use config::CertWatchConfig;
