//! Protocol engine for Maieutic Socratic tutoring sessions.
//!
//! The oracle (an LLM) drives the dialogue and reports assessment metadata
//! through tagged blocks embedded in its text. Everything in this crate
//! treats that metadata as a suggestion: phases, exchange counts, and
//! closing commitments are re-derived and validated mechanically from the
//! turn log, never trusted from the oracle's self-reporting.

pub mod authenticity;
pub mod engine;
pub mod error;
pub mod metadata;
pub mod parser;
pub mod phase;
pub mod projection;
pub mod scoring;
pub mod session;
pub mod signals;
