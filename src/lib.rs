//! rookdb - query ingestion core of a distributed document database
//!
//! Takes client queries from their wire encoding to validated,
//! arena-backed expression trees ready for evaluation or inter-node
//! replay.

pub mod backtrace;
pub mod datum;
pub mod query;
