//! Mailwarden — phishing risk-fusion engine.

pub mod analysis;
pub mod config;
pub mod detector;
pub mod error;
pub mod fusion;
pub mod ingest;
pub mod model;
pub mod probe;
pub mod scorer;
pub mod store;
pub mod worker;
