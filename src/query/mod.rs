//! # Query ingestion
//!
//! Accepts a client-submitted query envelope, validates it, parses the
//! expression tree into arena-backed terms, and tracks query identity
//! for per-connection ordering guarantees.
//!
//! ## Architecture
//!
//! - **TermArena**: owns every term of one query; stable handles
//! - **TermParser**: textual (document) form into the arena
//! - **wire**: binary form, legacy nested and streaming layouts
//! - **MiniDriver**: canonical server-synthesized sub-trees
//! - **QueryIdRegistry**: monotonic per-connection ids and the
//!   noreply-wait watermark
//! - **QueryParams**: the envelope wrapper tying the above together
//!
//! The evaluator, connection framing, and response encoding are external
//! consumers of this module.

pub mod errors;
pub mod minidriver;
pub mod opcode;
pub mod params;
pub mod parser;
pub mod registry;
pub mod term;
pub mod wire;

pub use errors::{QueryError, QueryResult};
pub use minidriver::MiniDriver;
pub use opcode::{Opcode, QueryKind};
pub use params::QueryParams;
pub use parser::TermParser;
pub use registry::{QueryId, QueryIdRegistry};
pub use term::{TermArena, TermId};
pub use wire::{decode_term, encode_term};
